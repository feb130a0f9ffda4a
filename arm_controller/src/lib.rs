//! # Arm Controller
//!
//! Drives the arm from per-frame detections: a scripted pick-and-place
//! sequence, an image-space push servo, and the arbitrator that decides
//! which of them runs.

pub mod arbitrator;
pub mod frame_source;
pub mod gateway;
pub mod keyboard;
pub mod pick_place;
pub mod visual_push;

pub use arbitrator::*;
pub use frame_source::*;
pub use gateway::*;
pub use keyboard::*;
pub use pick_place::*;
pub use visual_push::*;
