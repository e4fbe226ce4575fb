use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the kernel.
///
/// Every variant is a precondition failure: the kernel never retries or
/// recovers from one, it only hands it back to the caller.
#[derive(Debug, Error)]
pub enum MindError {
    #[error("duplicate node path: {path}")]
    DuplicateNode { path: String },

    #[error("node not found: {path}")]
    NodeNotFound { path: String },

    #[error("{what} does not belong to {mind}")]
    ForeignWiring { what: String, mind: String },

    #[error("{what} value {value} outside [0, 1]")]
    OutOfRange { what: &'static str, value: f32 },

    #[error("{path}: duration must be positive, got {ticks}")]
    InvalidDuration { path: String, ticks: u32 },

    #[error("{path}: period must be even, got {period}")]
    InvalidPeriod { path: String, period: u32 },

    #[error("failed to read config from {}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[source] serde_yaml::Error),

    #[error("config key {key} has an unexpected type: {source}")]
    ConfigType {
        key: String,
        #[source]
        source: serde_yaml::Error,
    },
}

pub type Result<T> = std::result::Result<T, MindError>;

/// Checks that a signal lies in `[0, 1]`.
pub fn check_unit(what: &'static str, value: f32) -> Result<f32> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(MindError::OutOfRange { what, value })
    }
}
