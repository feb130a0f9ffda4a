//! # Zone Detector
//!
//! Per-frame perception for the pick-and-place controller. Every function
//! here is pure: a frame goes in, geometry comes out. Drawing annotations is
//! left to whoever consumes the results.

pub mod contours;
pub mod detector;
pub mod hsv;
pub mod mask;

pub use contours::*;
pub use detector::*;
pub use hsv::*;
pub use mask::*;
