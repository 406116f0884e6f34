//! Error types for MargaNav

use thiserror::Error;

use crate::planning::CellId;

/// MargaNav error type
#[derive(Error, Debug)]
pub enum MargaError {
    #[error("no route from cell {start} to cell {goal}")]
    NoPathFound { start: usize, goal: usize },

    #[error("cell {0} is not a routable destination")]
    InvalidDestination(CellId),

    #[error("calibration did not converge within {0:.1}s")]
    CalibrationTimeout(f32),

    #[error("calibration failed: {0}")]
    CalibrationFailed(String),

    #[error("gave up after {0} replans")]
    ReplanLimitExceeded(u32),

    #[error("run cancelled")]
    Cancelled,

    #[error("transport failure: {0}")]
    Transport(#[from] setu_io::Error),

    #[error("Connection failed: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for MargaError {
    fn from(e: toml::de::Error) -> Self {
        MargaError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MargaError>;
