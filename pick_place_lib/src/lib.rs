//! # Pick Place Library
//!
//! Shared types and utilities for the vision-guided pick-and-place system.
//! This library is used by the perception crate and the arm controller.

pub mod types;
pub mod utils;

// Re-export everything for convenience
pub use types::*;
pub use utils::*;
