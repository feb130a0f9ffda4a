use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Joint angles `[base, shoulder, elbow, hand]` in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JointPose(pub [f64; 4]);

impl JointPose {
    pub fn new(base: f64, shoulder: f64, elbow: f64, hand: f64) -> Self {
        Self([base, shoulder, elbow, hand])
    }

    pub fn base(&self) -> f64 {
        self.0[0]
    }

    pub fn shoulder(&self) -> f64 {
        self.0[1]
    }

    pub fn elbow(&self) -> f64 {
        self.0[2]
    }

    pub fn hand(&self) -> f64 {
        self.0[3]
    }
}

/// Workspace goal for the end effector: position in mm plus the
/// orientation parameter `t` in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartesianGoal {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub t: f64,
}

impl CartesianGoal {
    pub fn new(x: f64, y: f64, z: f64, t: f64) -> Self {
        Self { x, y, z, t }
    }
}

/// Commands understood by the arm's JSON endpoint. Each maps to a numeric
/// command type (`T`) on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArmCommand {
    /// Move to the firmware's initial position
    MoveInit,
    JointAngles {
        pose: JointPose,
        speed: f64,
        accel: f64,
    },
    CartesianMove {
        goal: CartesianGoal,
        speed: f64,
    },
    /// End-effector clamp angle in radians
    Gripper {
        angle: f64,
        speed: f64,
        accel: f64,
    },
    FeedbackQuery,
}

impl ArmCommand {
    pub const T_MOVE_INIT: u16 = 100;
    pub const T_CARTESIAN: u16 = 104;
    pub const T_FEEDBACK: u16 = 105;
    pub const T_GRIPPER: u16 = 106;
    pub const T_JOINT_ANGLES: u16 = 122;

    pub fn command_type(&self) -> u16 {
        match self {
            ArmCommand::MoveInit => Self::T_MOVE_INIT,
            ArmCommand::JointAngles { .. } => Self::T_JOINT_ANGLES,
            ArmCommand::CartesianMove { .. } => Self::T_CARTESIAN,
            ArmCommand::Gripper { .. } => Self::T_GRIPPER,
            ArmCommand::FeedbackQuery => Self::T_FEEDBACK,
        }
    }

    /// JSON payload as sent to the arm.
    pub fn to_payload(&self) -> Value {
        let t = self.command_type();
        match self {
            ArmCommand::MoveInit | ArmCommand::FeedbackQuery => json!({ "T": t }),
            ArmCommand::JointAngles { pose, speed, accel } => json!({
                "T": t,
                "b": pose.base(),
                "s": pose.shoulder(),
                "e": pose.elbow(),
                "h": pose.hand(),
                "spd": speed,
                "acc": accel,
            }),
            ArmCommand::CartesianMove { goal, speed } => json!({
                "T": t,
                "x": goal.x,
                "y": goal.y,
                "z": goal.z,
                "t": goal.t,
                "spd": speed,
            }),
            ArmCommand::Gripper { angle, speed, accel } => json!({
                "T": t,
                "cmd": angle,
                "spd": speed,
                "acc": accel,
            }),
        }
    }

    pub fn is_feedback_query(&self) -> bool {
        matches!(self, ArmCommand::FeedbackQuery)
    }
}

impl fmt::Display for ArmCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_payload())
    }
}
