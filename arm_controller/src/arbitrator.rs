use pick_place_lib::{
    Admission, ControlMode, ControllerConfig, EventKind, FrameDetections, Point2D, PushConfig,
    SystemState, TelemetryEvent, TelemetrySink, ZoneBox,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{MotionGateway, PickPlaceController, PushOutcome, TipTracker, VisualPushController};

/// What the arbitrator did with one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Startup homing did not succeed; automation is disabled.
    NotReady,
    /// Another routine holds the busy lock.
    Busy,
    /// Zones or object not visible.
    Waiting,
    /// Visual-push mode without a tip marker; skipped, not an error.
    TipNotVisible,
    Completed(ControlMode),
    /// Visual push ran but lost the tip or never aligned.
    Abandoned(ControlMode),
    /// A motion command failed mid-routine.
    Failed(ControlMode),
}

/// Geometry a routine was dispatched with.
struct Scene {
    origin: ZoneBox,
    target: ZoneBox,
    object: Point2D,
    tip: Option<Point2D>,
}

impl Scene {
    fn from_detections(detections: &FrameDetections) -> Option<Self> {
        Some(Self {
            origin: detections.origin?,
            target: detections.target?,
            object: detections.object?,
            tip: detections.tip,
        })
    }

    fn to_json(&self) -> Value {
        json!({
            "origin": self.origin,
            "target": self.target,
            "object": self.object,
            "tip": self.tip,
        })
    }
}

/// Releases the busy lock when a routine ends, however it ends.
struct BusyGuard<'a> {
    state: &'a Mutex<SystemState>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finish_routine();
    }
}

/// Owns the system state and decides, per frame, whether and which routine
/// runs. At most one routine is in flight at a time.
pub struct ModeArbitrator<G: MotionGateway> {
    state: Mutex<SystemState>,
    pick_place: PickPlaceController<G>,
    visual_push: VisualPushController<G>,
    telemetry: Arc<dyn TelemetrySink>,
    tip_skip_reported: AtomicBool,
}

impl<G: MotionGateway> ModeArbitrator<G> {
    pub fn new(
        arm: Arc<G>,
        controller: ControllerConfig,
        push: PushConfig,
        mode: ControlMode,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            state: Mutex::new(SystemState::new(mode)),
            pick_place: PickPlaceController::new(arm.clone(), controller),
            visual_push: VisualPushController::new(arm, push),
            telemetry,
            tip_skip_reported: AtomicBool::new(false),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SystemState {
        self.lock_state().clone()
    }

    /// Home the arm once at process start. A failure leaves the system
    /// NotReady for the rest of the process lifetime.
    pub fn startup(&self) -> bool {
        if self.lock_state().begin_override().is_err() {
            warn!("Startup homing requested while a routine is in flight");
            return false;
        }

        let homed = {
            let _busy = BusyGuard { state: &self.state };
            self.home("startup")
        };

        let ready = self.lock_state().complete_startup(homed);
        if ready {
            info!("System ready");
        } else {
            error!("Startup homing failed, automation disabled until restart");
        }
        ready
    }

    /// Evaluate one frame and run at most one routine to completion.
    pub fn on_frame(
        &self,
        detections: &FrameDetections,
        tracker: &mut dyn TipTracker,
    ) -> CycleOutcome {
        if detections.tip.is_some() {
            self.tip_skip_reported.store(false, Ordering::SeqCst);
        }

        let (mode, scene) = match self.admit(detections) {
            Ok(admitted) => admitted,
            Err(outcome) => return outcome,
        };
        let _busy = BusyGuard { state: &self.state };

        match mode {
            ControlMode::Scripted => self.run_pick_place(&scene),
            ControlMode::VisualPush => self.run_visual_push(&scene, tracker),
        }
    }

    /// Flip between scripted and visual-push dispatch.
    pub fn toggle_mode(&self) -> Result<ControlMode, Admission> {
        let result = self.lock_state().toggle_mode();
        match result {
            Ok(mode) => {
                info!("Control mode: {}", mode);
                self.record(EventKind::ModeChanged, json!({ "mode": mode }));
            }
            Err(reason) => self.reject("toggle_mode", reason),
        }
        result
    }

    /// User-triggered homing. Holds the busy lock while moving and never
    /// changes readiness.
    pub fn manual_home(&self) -> Result<bool, Admission> {
        if let Err(reason) = self.lock_state().begin_override() {
            self.reject("manual_home", reason);
            return Err(reason);
        }

        let _busy = BusyGuard { state: &self.state };
        Ok(self.home("manual"))
    }

    fn lock_state(&self) -> MutexGuard<'_, SystemState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check-and-set of the busy flag happens under a single lock.
    fn admit(&self, detections: &FrameDetections) -> Result<(ControlMode, Scene), CycleOutcome> {
        let mut state = self.lock_state();

        if !state.is_ready() {
            return Err(CycleOutcome::NotReady);
        }
        if state.is_busy() {
            return Err(CycleOutcome::Busy);
        }

        if !detections.ready_for_dispatch() {
            debug!("Waiting for {}", detections.missing().join(", "));
            return Err(CycleOutcome::Waiting);
        }
        let Some(scene) = Scene::from_detections(detections) else {
            return Err(CycleOutcome::Waiting);
        };

        if state.mode() == ControlMode::VisualPush && scene.tip.is_none() {
            drop(state);
            self.report_tip_skip(&scene);
            return Err(CycleOutcome::TipNotVisible);
        }

        match state.begin_routine() {
            Ok(mode) => Ok((mode, scene)),
            Err(Admission::Busy) => Err(CycleOutcome::Busy),
            Err(Admission::NotReady) => Err(CycleOutcome::NotReady),
        }
    }

    fn report_tip_skip(&self, scene: &Scene) {
        if self.tip_skip_reported.swap(true, Ordering::SeqCst) {
            debug!("Visual push still waiting for tip marker");
            return;
        }

        warn!("Visual push skipped: tip not visible");
        let mut data = scene.to_json();
        data["reason"] = json!("tip not visible");
        self.record(EventKind::VisualPushSkip, data);
    }

    fn run_pick_place(&self, scene: &Scene) -> CycleOutcome {
        let run_id = Uuid::new_v4();
        info!(
            "Pick-place run {}: object at ({}, {})",
            run_id, scene.object.u, scene.object.v
        );
        self.record_run(run_id, EventKind::PickPlaceStart, scene.to_json());

        match self.pick_place.execute() {
            Ok(report) => {
                info!("Pick-place run {} complete", run_id);
                self.record_run(run_id, EventKind::PickPlaceSuccess, json!(report));
                CycleOutcome::Completed(ControlMode::Scripted)
            }
            Err(e) => {
                error!("Pick-place run {} failed: {}", run_id, e);
                self.record_run(
                    run_id,
                    EventKind::PickPlaceError,
                    json!({ "error": e.to_string(), "command": e.command }),
                );
                CycleOutcome::Failed(ControlMode::Scripted)
            }
        }
    }

    fn run_visual_push(&self, scene: &Scene, tracker: &mut dyn TipTracker) -> CycleOutcome {
        // admit() only lets visual push through with a tip
        let Some(tip) = scene.tip else {
            return CycleOutcome::TipNotVisible;
        };

        let run_id = Uuid::new_v4();
        info!(
            "Visual push run {}: tip ({}, {}) -> object ({}, {})",
            run_id, tip.u, tip.v, scene.object.u, scene.object.v
        );
        self.record_run(run_id, EventKind::VisualPushStart, scene.to_json());

        let result = self.visual_push.run(
            scene.object,
            scene.origin.center(),
            scene.target.center(),
            tip,
            tracker,
        );

        match result {
            Ok(outcome @ PushOutcome::Pushed { .. }) => {
                info!("Visual push run {} complete: {:?}", run_id, outcome);
                self.record_run(run_id, EventKind::VisualPushSuccess, json!(outcome));
                CycleOutcome::Completed(ControlMode::VisualPush)
            }
            Ok(outcome) => {
                warn!("Visual push run {} abandoned: {:?}", run_id, outcome);
                self.record_run(run_id, EventKind::VisualPushError, json!(outcome));
                CycleOutcome::Abandoned(ControlMode::VisualPush)
            }
            Err(e) => {
                error!("Visual push run {} failed: {}", run_id, e);
                self.record_run(
                    run_id,
                    EventKind::VisualPushError,
                    json!({ "error": e.to_string(), "command": e.command }),
                );
                CycleOutcome::Failed(ControlMode::VisualPush)
            }
        }
    }

    /// Caller holds the busy lock.
    fn home(&self, trigger: &str) -> bool {
        info!("Homing ({})", trigger);
        self.record(EventKind::HomingStart, json!({ "trigger": trigger }));

        match self.pick_place.go_home() {
            Ok(()) => {
                info!("Homing complete");
                self.record(EventKind::HomingSuccess, json!({ "trigger": trigger }));
                true
            }
            Err(e) => {
                error!("Homing failed: {}", e);
                self.record(
                    EventKind::HomingError,
                    json!({ "trigger": trigger, "error": e.to_string() }),
                );
                false
            }
        }
    }

    fn reject(&self, action: &str, reason: Admission) {
        warn!("Ignoring {}: {}", action, reason);
        self.record(
            EventKind::OverrideRejected,
            json!({ "action": action, "reason": reason }),
        );
    }

    fn record(&self, kind: EventKind, data: Value) {
        self.telemetry.record(TelemetryEvent::new(kind, data));
    }

    fn record_run(&self, run_id: Uuid, kind: EventKind, data: Value) {
        self.telemetry
            .record(TelemetryEvent::new(kind, data).with_run(run_id));
    }
}
