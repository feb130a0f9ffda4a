use serde::{Deserialize, Serialize};
use std::fmt;

/// Which routine the arbitrator dispatches when the scene is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    Scripted,
    VisualPush,
}

impl ControlMode {
    pub fn toggled(self) -> Self {
        match self {
            ControlMode::Scripted => ControlMode::VisualPush,
            ControlMode::VisualPush => ControlMode::Scripted,
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMode::Scripted => write!(f, "scripted"),
            ControlMode::VisualPush => write!(f, "visual-push"),
        }
    }
}

/// Readiness/busy combination the arbitrator is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotReady,
    Idle,
    Busy,
}

/// Why a request to start a routine or apply an override was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    NotReady,
    Busy,
}

impl fmt::Display for Admission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Admission::NotReady => write!(f, "system not ready"),
            Admission::Busy => write!(f, "routine in flight"),
        }
    }
}

/// Control-loop state. All mutation goes through the transition methods so
/// the admission rules can be tested without a camera or an arm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemState {
    ready: bool,
    busy: bool,
    mode: ControlMode,
    startup_resolved: bool,
}

impl SystemState {
    pub fn new(mode: ControlMode) -> Self {
        Self {
            ready: false,
            busy: false,
            mode,
            startup_resolved: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        match (self.ready, self.busy) {
            (_, true) => Phase::Busy,
            (true, false) => Phase::Idle,
            (false, false) => Phase::NotReady,
        }
    }

    /// Record the outcome of startup homing. Only the first call has any
    /// effect: a failed startup keeps automation disabled for the process
    /// lifetime.
    pub fn complete_startup(&mut self, homed: bool) -> bool {
        if !self.startup_resolved {
            self.startup_resolved = true;
            self.ready = homed;
        }
        self.ready
    }

    /// Take the busy lock for an automated routine.
    pub fn begin_routine(&mut self) -> Result<ControlMode, Admission> {
        if !self.ready {
            return Err(Admission::NotReady);
        }
        self.begin_override()?;
        Ok(self.mode)
    }

    /// Take the busy lock for a user-triggered motion (manual homing). Does
    /// not require readiness.
    pub fn begin_override(&mut self) -> Result<(), Admission> {
        if self.busy {
            return Err(Admission::Busy);
        }
        self.busy = true;
        Ok(())
    }

    /// Release the busy lock, whatever the routine outcome was.
    pub fn finish_routine(&mut self) {
        self.busy = false;
    }

    /// Flip the dispatch mode. Refused while a routine is in flight.
    pub fn toggle_mode(&mut self) -> Result<ControlMode, Admission> {
        if self.busy {
            return Err(Admission::Busy);
        }
        self.mode = self.mode.toggled();
        Ok(self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_success_enables_dispatch() {
        let mut state = SystemState::new(ControlMode::Scripted);
        assert_eq!(state.phase(), Phase::NotReady);
        assert_eq!(state.begin_routine(), Err(Admission::NotReady));

        assert!(state.complete_startup(true));
        assert_eq!(state.phase(), Phase::Idle);

        assert_eq!(state.begin_routine(), Ok(ControlMode::Scripted));
        assert_eq!(state.phase(), Phase::Busy);
        assert_eq!(state.begin_routine(), Err(Admission::Busy));

        state.finish_routine();
        assert_eq!(state.phase(), Phase::Idle);
    }

    #[test]
    fn test_startup_failure_is_permanent() {
        let mut state = SystemState::new(ControlMode::Scripted);
        assert!(!state.complete_startup(false));
        // A later successful homing does not re-enable automation
        assert!(!state.complete_startup(true));
        assert_eq!(state.begin_routine(), Err(Admission::NotReady));
        assert!(!state.is_busy());
    }

    #[test]
    fn test_overrides_rejected_while_busy() {
        let mut state = SystemState::new(ControlMode::Scripted);
        state.complete_startup(true);
        state.begin_routine().unwrap();

        assert_eq!(state.toggle_mode(), Err(Admission::Busy));
        assert_eq!(state.begin_override(), Err(Admission::Busy));
        assert_eq!(state.mode(), ControlMode::Scripted);

        state.finish_routine();
        assert_eq!(state.toggle_mode(), Ok(ControlMode::VisualPush));
        assert_eq!(state.toggle_mode(), Ok(ControlMode::Scripted));
    }

    #[test]
    fn test_manual_override_allowed_when_not_ready() {
        let mut state = SystemState::new(ControlMode::VisualPush);
        state.complete_startup(false);
        assert_eq!(state.begin_override(), Ok(()));
        assert_eq!(state.phase(), Phase::Busy);
        state.finish_routine();
        assert_eq!(state.phase(), Phase::NotReady);
    }
}
