//! Capability interface to the arm.
//!
//! Implementors only provide [`MotionGateway::send`]; the motion operations
//! are built on top of it so every backend shares the same failure contract.

mod error;
mod roarm;
#[cfg(test)]
pub(crate) mod testing;

pub use error::*;
pub use roarm::*;

use pick_place_lib::{ArmCommand, CartesianGoal, Feedback, JointPose};

/// Blocking round-trip access to the arm.
pub trait MotionGateway: Send + Sync {
    /// Send one command and return the raw response body.
    fn send(&self, command: &ArmCommand) -> Result<String, MotionError>;

    fn initialize(&self) -> Result<(), MotionError> {
        self.send(&ArmCommand::MoveInit).map(|_| ())
    }

    fn move_to_joint_pose(
        &self,
        pose: &JointPose,
        speed: f64,
        accel: f64,
    ) -> Result<(), MotionError> {
        self.send(&ArmCommand::JointAngles {
            pose: *pose,
            speed,
            accel,
        })
        .map(|_| ())
    }

    fn move_to_cartesian(&self, goal: CartesianGoal, speed: f64) -> Result<(), MotionError> {
        self.send(&ArmCommand::CartesianMove { goal, speed })
            .map(|_| ())
    }

    fn set_gripper(&self, angle: f64, speed: f64, accel: f64) -> Result<(), MotionError> {
        self.send(&ArmCommand::Gripper {
            angle,
            speed,
            accel,
        })
        .map(|_| ())
    }

    /// Query the end-effector position. An unreadable payload comes back as
    /// `Feedback::Absent`/`Feedback::Malformed`; only transport faults are
    /// errors.
    fn read_feedback(&self) -> Result<Feedback, MotionError> {
        self.send(&ArmCommand::FeedbackQuery)
            .map(|raw| Feedback::parse(&raw))
    }
}
