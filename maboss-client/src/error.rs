//! Client error types.

use crate::config::ConfigError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Transport and process failures.
///
/// Protocol failures are not errors here; they come back inside the decoded
/// `ResponseEnvelope`.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to start server {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("server on {endpoint} not started after {waited:?} ({attempts} attempts)")]
    StartupTimeout {
        endpoint: String,
        attempts: u32,
        waited: Duration,
    },

    #[error("server startup on {endpoint} cancelled")]
    StartupCancelled { endpoint: String },

    #[error("server unreachable at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("session already completed its exchange")]
    ExchangeCompleted,

    #[error("session closed")]
    SessionClosed,
}

impl ClientError {
    /// Returns whether the failure happened while bringing a session up.
    pub fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            ClientError::Spawn { .. }
                | ClientError::StartupTimeout { .. }
                | ClientError::StartupCancelled { .. }
                | ClientError::Connect { .. }
        )
    }
}
