use std::io::{self, BufRead};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread;
use tracing::{debug, info, warn};

use crate::{ModeArbitrator, MotionGateway};

/// Operator commands read from stdin, one per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    ToggleMode,
    Home,
    Quit,
}

impl KeyCommand {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "m" | "mode" => Some(KeyCommand::ToggleMode),
            "h" | "home" => Some(KeyCommand::Home),
            "q" | "quit" | "exit" => Some(KeyCommand::Quit),
            _ => None,
        }
    }
}

/// Read stdin on a background thread. The control loop drains the receiver
/// between frames, so commands never interrupt a running routine.
pub fn spawn_stdin_listener() -> Receiver<KeyCommand> {
    let (tx, rx) = channel();
    thread::spawn(move || forward_lines(io::stdin().lock(), tx));
    rx
}

fn forward_lines(reader: impl BufRead, tx: Sender<KeyCommand>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match KeyCommand::parse(&line) {
            Some(command) => {
                let quit = command == KeyCommand::Quit;
                if tx.send(command).is_err() || quit {
                    break;
                }
            }
            None => debug!("Unknown key command: {:?}", line.trim()),
        }
    }
}

/// Apply queued operator commands. Returns `false` on quit.
pub fn apply_pending_keys<G: MotionGateway>(
    arbitrator: &ModeArbitrator<G>,
    keys: &Receiver<KeyCommand>,
) -> bool {
    loop {
        match keys.try_recv() {
            Ok(KeyCommand::ToggleMode) => {
                // Rejections are logged and recorded by the arbitrator
                if let Ok(mode) = arbitrator.toggle_mode() {
                    info!("Control mode switched to {}", mode);
                }
            }
            Ok(KeyCommand::Home) => match arbitrator.manual_home() {
                Ok(true) => info!("Manual homing complete"),
                Ok(false) => warn!("Manual homing failed"),
                Err(_) => {}
            },
            Ok(KeyCommand::Quit) => {
                info!("Quit requested");
                return false;
            }
            Err(TryRecvError::Empty) => return true,
            // stdin closed; keep running on frames alone
            Err(TryRecvError::Disconnected) => return true,
        }
    }
}
