use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    /// Malformed or unrecognized record. Dropped and logged.
    Protocol,
    /// Local model diverged from the server's. Logged at error level.
    Desync,
    /// Caller passed an argument outside the local model. A local bug.
    Validation,
    /// Send/open/close against a connection in the wrong state.
    Connection,
    /// Lookup against the static catalog failed.
    Catalog,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncError {
    pub kind: SyncErrorKind,
    pub message: String,
}

impl SyncError {
    pub fn new(kind: SyncErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SyncError {}

pub fn protocol_error(message: impl Into<String>) -> SyncError {
    SyncError::new(SyncErrorKind::Protocol, message)
}

pub fn desync(message: impl Into<String>) -> SyncError {
    SyncError::new(SyncErrorKind::Desync, message)
}

pub fn validation_error(message: impl Into<String>) -> SyncError {
    SyncError::new(SyncErrorKind::Validation, message)
}

pub fn connection_error(message: impl Into<String>) -> SyncError {
    SyncError::new(SyncErrorKind::Connection, message)
}

pub fn catalog_error(message: impl Into<String>) -> SyncError {
    SyncError::new(SyncErrorKind::Catalog, message)
}

/// Logs a handler failure the way the listener wrappers do and reports
/// whether the UI layer should hear about it.
pub(crate) fn log_handler_error(target_module: &'static str, handler: &str, err: &SyncError) -> bool {
    match err.kind {
        SyncErrorKind::Desync => {
            tracing::error!(
                target: "reconcile",
                module = target_module,
                handler = handler,
                error = %err,
                "desync_detected"
            );
            true
        }
        SyncErrorKind::Protocol | SyncErrorKind::Catalog => {
            tracing::warn!(
                target: "reconcile",
                module = target_module,
                handler = handler,
                error = %err,
                "record_dropped"
            );
            false
        }
        SyncErrorKind::Validation | SyncErrorKind::Connection => {
            tracing::warn!(
                target: "reconcile",
                module = target_module,
                handler = handler,
                error = %err,
                "handler_failed"
            );
            true
        }
    }
}
