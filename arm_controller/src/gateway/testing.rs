use pick_place_lib::ArmCommand;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

use super::{MotionError, MotionGateway, TransportError};

pub(crate) const GOOD_FEEDBACK: &str = r#"{"T":1051,"x":200.0,"y":10.0,"z":100.0,"t":3.0}"#;

/// Gateway double that records every command it receives.
pub(crate) struct RecordingGateway {
    commands: Mutex<Vec<ArmCommand>>,
    feedback: Mutex<VecDeque<String>>,
    fail_on_action: Option<usize>,
    gate: Option<Gate>,
}

struct Gate {
    at: usize,
    armed: AtomicBool,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

/// Test-side end of a blocking gateway.
pub(crate) struct GateHandle {
    pub entered: Receiver<()>,
    pub release: Sender<()>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            feedback: Mutex::new(VecDeque::new()),
            fail_on_action: None,
            gate: None,
        }
    }

    /// Feedback bodies served in order; `GOOD_FEEDBACK` once exhausted.
    pub fn with_feedback(self, bodies: &[&str]) -> Self {
        *self.feedback.lock().unwrap() = bodies.iter().map(|b| b.to_string()).collect();
        self
    }

    /// Fail the n-th (0-based) non-feedback command.
    pub fn failing_on_action(mut self, index: usize) -> Self {
        self.fail_on_action = Some(index);
        self
    }

    /// Block the n-th (0-based) command of any kind until the handle
    /// releases it.
    pub fn blocking_call(mut self, index: usize) -> (Self, GateHandle) {
        let (entered_tx, entered_rx) = channel();
        let (release_tx, release_rx) = channel();
        self.gate = Some(Gate {
            at: index,
            armed: AtomicBool::new(true),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        (
            self,
            GateHandle {
                entered: entered_rx,
                release: release_tx,
            },
        )
    }

    pub fn commands(&self) -> Vec<ArmCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// Everything except feedback queries.
    pub fn actions(&self) -> Vec<ArmCommand> {
        self.commands()
            .into_iter()
            .filter(|c| !c.is_feedback_query())
            .collect()
    }

    pub fn count_type(&self, command_type: u16) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.command_type() == command_type)
            .count()
    }
}

impl MotionGateway for RecordingGateway {
    fn send(&self, command: &ArmCommand) -> Result<String, MotionError> {
        if let Some(gate) = &self.gate {
            let index = self.commands.lock().unwrap().len();
            if index == gate.at && gate.armed.swap(false, Ordering::SeqCst) {
                gate.entered.lock().unwrap().send(()).unwrap();
                gate.release.lock().unwrap().recv().unwrap();
            }
        }

        let action_index = {
            let mut commands = self.commands.lock().unwrap();
            commands.push(command.clone());
            commands.iter().filter(|c| !c.is_feedback_query()).count()
        };

        if command.is_feedback_query() {
            let body = self.feedback.lock().unwrap().pop_front();
            return Ok(body.unwrap_or_else(|| GOOD_FEEDBACK.to_string()));
        }

        if self.fail_on_action == Some(action_index - 1) {
            return Err(MotionError::new(
                command,
                TransportError::Unavailable("simulated timeout".to_string()),
            ));
        }

        Ok(String::new())
    }
}
