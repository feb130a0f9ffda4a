use serde::{Deserialize, Serialize};

use crate::{Point2D, ZoneBox};

/// Everything the perception layer extracted from a single frame.
///
/// Values are recomputed for every frame and carry no identity across frames.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDetections {
    pub origin: Option<ZoneBox>,
    pub target: Option<ZoneBox>,
    /// Object center, only searched for inside the origin zone
    pub object: Option<Point2D>,
    /// End-effector marker center
    pub tip: Option<Point2D>,
}

impl FrameDetections {
    /// Both zones and the object are visible, so a routine may be dispatched.
    pub fn ready_for_dispatch(&self) -> bool {
        self.origin.is_some() && self.target.is_some() && self.object.is_some()
    }

    /// Short list of what is missing, for log lines.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.origin.is_none() {
            missing.push("origin");
        }
        if self.target.is_none() {
            missing.push("target");
        }
        if self.object.is_none() {
            missing.push("object");
        }
        missing
    }
}
