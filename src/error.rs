use thiserror::Error;
use crate::basket::BasketKind;
use crate::types::timestamp::Timestamp;

#[derive(Error, Debug)]
pub enum Error {
    // Tick Pipeline Errors
    #[error("Upstream unavailable ({provider}): {reason}")]
    UpstreamUnavailable {
        provider: String,
        reason: String,
    },

    #[error("Insufficient {basket} coverage: {coverage:.4} below threshold {threshold:.4}")]
    InsufficientCoverage {
        basket: BasketKind,
        coverage: f64,
        threshold: f64,
    },

    #[error("Invalid composite: wf_smoothed={wf_smoothed}, wc_adjusted={wc_adjusted}")]
    InvalidComposite {
        wf_smoothed: f64,
        wc_adjusted: f64,
    },

    // History Errors
    #[error("Out-of-order tick: timestamp={timestamp}, latest={latest}")]
    OutOfOrderTick {
        timestamp: Timestamp,
        latest: Timestamp,
    },

    // Configuration Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    #[error("Config version conflict: expected={expected}, current={current}")]
    ConfigVersionConflict {
        expected: u64,
        current: u64,
    },

    // IO Errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization failed: {0}")]
    DeserializationError(String),

    // System Errors
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl Error {
    /// Pipeline stage an error belongs to, used as the skip reason label.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::UpstreamUnavailable { .. } => "fetch",
            Error::InsufficientCoverage { .. } => "aggregate",
            Error::InvalidComposite { .. } => "compose",
            Error::OutOfOrderTick { .. } => "append",
            Error::ConfigError(_)
            | Error::InvalidConfig { .. }
            | Error::ConfigVersionConflict { .. } => "config",
            Error::IoError(_)
            | Error::SerializationError(_)
            | Error::DeserializationError(_) => "storage",
            Error::TaskFailed(_) => "runtime",
        }
    }

    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
