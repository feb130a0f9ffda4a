use pick_place_lib::{CartesianGoal, ControllerConfig, Feedback, JointPose};
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

use crate::{MotionError, MotionGateway};

/// Named joint-space poses of the scripted routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Waypoint {
    Home,
    AboveOrigin,
    PickPose,
    AboveTarget,
    PlacePose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Move(Waypoint),
    /// Optional vertical hop from measured feedback
    ZLift,
    GripClose,
    GripOpen,
}

/// Legs between the two Home terminals of a pick-and-place run.
pub const TRANSFER_SEQUENCE: [Step; 12] = [
    Step::Move(Waypoint::AboveOrigin),
    Step::ZLift,
    Step::Move(Waypoint::PickPose),
    Step::GripClose,
    Step::Move(Waypoint::AboveOrigin),
    Step::ZLift,
    Step::Move(Waypoint::AboveTarget),
    Step::ZLift,
    Step::Move(Waypoint::PlacePose),
    Step::GripOpen,
    Step::Move(Waypoint::AboveTarget),
    Step::ZLift,
];

#[derive(Debug, Clone, PartialEq)]
pub enum LiftOutcome {
    Disabled,
    Applied(CartesianGoal),
    /// Feedback was unusable or the hop itself failed; the sequence carries
    /// on from the last commanded pose.
    Skipped(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PickPlaceReport {
    pub lifts_applied: u32,
    pub lifts_skipped: u32,
}

/// Deterministic joint-space pick-and-place with time-based settling.
pub struct PickPlaceController<G: MotionGateway> {
    arm: Arc<G>,
    config: ControllerConfig,
}

impl<G: MotionGateway> PickPlaceController<G> {
    pub fn new(arm: Arc<G>, config: ControllerConfig) -> Self {
        Self { arm, config }
    }

    /// Single move to the home pose followed by the settle pause.
    pub fn go_home(&self) -> Result<(), MotionError> {
        self.move_to(Waypoint::Home)
    }

    /// Home, run the transfer legs, return home.
    ///
    /// A failed mandatory step aborts the rest of the run and leaves the arm
    /// at its last successfully commanded pose.
    pub fn execute(&self) -> Result<PickPlaceReport, MotionError> {
        self.go_home()?;
        let report = self.transfer()?;
        self.go_home()?;
        Ok(report)
    }

    /// Pick at the origin and place at the target, without the Home legs.
    pub fn transfer(&self) -> Result<PickPlaceReport, MotionError> {
        let mut report = PickPlaceReport::default();

        for step in TRANSFER_SEQUENCE {
            debug!("Pick-place step: {:?}", step);
            match step {
                Step::Move(waypoint) => self.move_to(waypoint)?,
                Step::GripClose => self.grip(self.config.grip_closed_rad)?,
                Step::GripOpen => self.grip(self.config.grip_open_rad)?,
                Step::ZLift => match self.z_lift() {
                    LiftOutcome::Disabled => {}
                    LiftOutcome::Applied(_) => report.lifts_applied += 1,
                    LiftOutcome::Skipped(reason) => {
                        warn!("Z-lift skipped: {}", reason);
                        report.lifts_skipped += 1;
                    }
                },
            }
        }

        info!(
            "Transfer complete (lifts applied: {}, skipped: {})",
            report.lifts_applied, report.lifts_skipped
        );
        Ok(report)
    }

    /// Hop `z_lift_mm` up from the measured position, keeping x, y and the
    /// current orientation. Never fails the sequence.
    pub fn z_lift(&self) -> LiftOutcome {
        if self.config.z_lift_mm == 0.0 {
            return LiftOutcome::Disabled;
        }

        let snapshot = match self.arm.read_feedback() {
            Ok(Feedback::Present(s)) => s,
            Ok(Feedback::Absent) => return LiftOutcome::Skipped("no feedback".to_string()),
            Ok(Feedback::Malformed(reason)) => {
                return LiftOutcome::Skipped(format!("malformed feedback: {}", reason))
            }
            Err(e) => return LiftOutcome::Skipped(e.to_string()),
        };

        let goal = CartesianGoal::new(
            snapshot.x,
            snapshot.y,
            snapshot.z + self.config.z_lift_mm,
            snapshot.t,
        );
        if let Err(e) = self.arm.move_to_cartesian(goal, self.config.lift_speed) {
            return LiftOutcome::Skipped(e.to_string());
        }
        self.settle();
        LiftOutcome::Applied(goal)
    }

    fn pose(&self, waypoint: Waypoint) -> &JointPose {
        match waypoint {
            Waypoint::Home => &self.config.pose_home,
            Waypoint::AboveOrigin => &self.config.pose_above_origin,
            Waypoint::PickPose => &self.config.pose_pick_origin,
            Waypoint::AboveTarget => &self.config.pose_above_target,
            Waypoint::PlacePose => &self.config.pose_place_target,
        }
    }

    fn move_to(&self, waypoint: Waypoint) -> Result<(), MotionError> {
        self.arm.move_to_joint_pose(
            self.pose(waypoint),
            self.config.speed_deg_per_s,
            self.config.acc_deg_per_s2,
        )?;
        self.settle();
        Ok(())
    }

    fn grip(&self, angle: f64) -> Result<(), MotionError> {
        self.arm
            .set_gripper(angle, self.config.grip_speed, self.config.grip_acc)?;
        self.settle();
        Ok(())
    }

    fn settle(&self) {
        let pause = self.config.step_pause();
        if !pause.is_zero() {
            thread::sleep(pause);
        }
    }
}
