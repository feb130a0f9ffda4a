use pick_place_lib::ArmCommand;
use thiserror::Error;

/// The single failure type of every gateway operation.
#[derive(Debug, Error)]
#[error("motion command failed: {command}: {source}")]
pub struct MotionError {
    pub command: ArmCommand,
    #[source]
    pub source: TransportError,
}

impl MotionError {
    pub fn new(command: &ArmCommand, source: impl Into<TransportError>) -> Self {
        Self {
            command: command.clone(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("arm answered with HTTP status {0}")]
    Status(u16),

    #[error("arm unavailable: {0}")]
    Unavailable(String),
}
