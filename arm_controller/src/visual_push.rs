use nalgebra as na;
use pick_place_lib::{CartesianGoal, Feedback, Point2D, PushConfig};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{MotionError, MotionGateway};

/// Fixed linear pixel -> millimetre mapping with a per-step length clamp.
///
/// Image right (+u) maps to +x and image down (+v) maps to +y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelMapping {
    gain: f64,
    max_step: f64,
}

impl PixelMapping {
    pub fn new(gain: f64, max_step: f64) -> Self {
        Self { gain, max_step }
    }

    pub fn from_config(config: &PushConfig) -> Self {
        Self::new(config.gain_xy, config.max_step_mm)
    }

    /// Scale a pixel delta and truncate its length to `max_step`, keeping the
    /// direction.
    pub fn workspace_delta(&self, du: f64, dv: f64) -> na::Vector2<f64> {
        let delta = na::Vector2::new(du, dv) * self.gain;
        let magnitude = delta.norm();
        if magnitude > self.max_step && magnitude > 0.0 {
            delta * (self.max_step / magnitude)
        } else {
            delta
        }
    }
}

/// Re-measures the tip marker between alignment iterations.
pub trait TipTracker {
    fn locate_tip(&mut self) -> Option<Point2D>;
}

impl<F> TipTracker for F
where
    F: FnMut() -> Option<Point2D>,
{
    fn locate_tip(&mut self) -> Option<Point2D> {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PushOutcome {
    Pushed { iterations: u32, moves: u32 },
    TipLost { iterations: u32 },
    NotAligned { iterations: u32 },
}

/// Image-space proportional servo holding Z at `safe_z`.
pub struct VisualPushController<G: MotionGateway> {
    arm: Arc<G>,
    config: PushConfig,
    mapping: PixelMapping,
}

impl<G: MotionGateway> VisualPushController<G> {
    pub fn new(arm: Arc<G>, config: PushConfig) -> Self {
        let mapping = PixelMapping::from_config(&config);
        Self {
            arm,
            config,
            mapping,
        }
    }

    /// One proportional step of the tracked point toward `goal`.
    ///
    /// Returns `true` without moving when both pixel errors are strictly
    /// inside the tolerance. Does not iterate or re-sample vision.
    pub fn align(&self, tracked: Point2D, goal: Point2D) -> Result<bool, MotionError> {
        let (du, dv) = tracked.delta_to(&goal);
        let tolerance = self.config.align_tolerance_px;

        if du.abs() < tolerance && dv.abs() < tolerance {
            return Ok(true);
        }

        debug!("Align error: du={}, dv={}", du, dv);
        self.nudge(du, dv)?;
        Ok(false)
    }

    /// `push_steps` fixed-direction moves along `from -> to`, each one based on
    /// freshly read feedback. Returns the number of moves issued.
    pub fn push(&self, from: Point2D, to: Point2D) -> Result<u32, MotionError> {
        let (du, dv) = from.delta_to(&to);
        let direction = na::Vector2::new(du, dv);
        let norm = direction.norm();
        if norm == 0.0 {
            debug!("Push skipped: origin and target centers coincide");
            return Ok(0);
        }

        let step = direction / norm * self.config.push_step_px;
        let mut moves = 0;
        for _ in 0..self.config.push_steps {
            if self.nudge(step.x, step.y)? {
                moves += 1;
            }
        }

        info!("Push issued {}/{} moves", moves, self.config.push_steps);
        Ok(moves)
    }

    /// Align the tip onto the object, then push from the origin center toward
    /// the target center.
    ///
    /// Only the tip is re-measured between iterations; the object center is
    /// taken once from the dispatching frame.
    pub fn run<T: TipTracker + ?Sized>(
        &self,
        object: Point2D,
        origin_center: Point2D,
        target_center: Point2D,
        initial_tip: Point2D,
        tracker: &mut T,
    ) -> Result<PushOutcome, MotionError> {
        let budget = self.config.align_max_iterations;
        let mut tip = initial_tip;

        for iteration in 1..=budget {
            if self.align(tip, object)? {
                info!("Tip aligned with object after {} iteration(s)", iteration);
                let moves = self.push(origin_center, target_center)?;
                return Ok(PushOutcome::Pushed {
                    iterations: iteration,
                    moves,
                });
            }

            if iteration == budget {
                break;
            }

            match tracker.locate_tip() {
                Some(measured) => tip = measured,
                None => {
                    warn!("Tip marker lost during alignment");
                    return Ok(PushOutcome::TipLost {
                        iterations: iteration,
                    });
                }
            }
        }

        warn!("Tip not aligned within {} iterations", budget);
        Ok(PushOutcome::NotAligned { iterations: budget })
    }

    /// Returns `false` when feedback is unusable and the step was skipped.
    fn nudge(&self, du: f64, dv: f64) -> Result<bool, MotionError> {
        let snapshot = match self.arm.read_feedback()? {
            Feedback::Present(snapshot) => snapshot,
            Feedback::Absent => {
                warn!("Servo step skipped: no feedback");
                return Ok(false);
            }
            Feedback::Malformed(reason) => {
                warn!("Servo step skipped: malformed feedback: {}", reason);
                return Ok(false);
            }
        };

        let delta = self.mapping.workspace_delta(du, dv);
        let goal = CartesianGoal::new(
            snapshot.x + delta.x,
            snapshot.y + delta.y,
            self.config.safe_z,
            snapshot.t,
        );
        self.arm
            .move_to_cartesian(goal, self.config.cartesian_speed)?;
        Ok(true)
    }
}
