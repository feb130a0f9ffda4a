pub mod arm_command;
pub mod config;
pub mod detection_types;
pub mod feedback;
pub mod geometry;
pub mod system_state;
pub mod telemetry;

pub use arm_command::*;
pub use config::*;
pub use detection_types::*;
pub use feedback::*;
pub use geometry::*;
pub use system_state::*;
pub use telemetry::*;
