use std::time::Duration;

use thiserror::Error;

use crate::wizard::WizardStep;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    /// A simulation completed after the wizard moved on. Never shown to the user.
    #[error("stale simulation response: token {token}, current {current:?}")]
    StaleResponse { token: u64, current: Option<u64> },

    #[error("config error: {0}")]
    Config(String),

    #[error("render error: {0}")]
    Render(#[from] image::ImageError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Rejected locally, before anything is sent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("no disaster has been chosen")]
    NoDisasterChosen,

    #[error("operation requires step {expected:?}, wizard is at {actual:?}")]
    WrongStep {
        expected: WizardStep,
        actual: WizardStep,
    },

    #[error("a simulation request is already in flight")]
    SimulationInFlight,

    #[error("radius must be finite and positive, got {0}")]
    RadiusOutOfRange(f64),

    #[error("intensity must be within [0, 100], got {0}")]
    IntensityOutOfRange(f64),

    #[error("invalid coordinate ({lat}, {lng})")]
    InvalidCoordinate { lat: f64, lng: f64 },
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
