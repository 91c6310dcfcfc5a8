//! Session lifecycle and supervisor errors.

use crate::common::ErrorSeverity;
use crate::device::DeviceError;
use crate::handshake::HandshakeError;

/// Errors starting, controlling or stopping a panel session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A session for this device id is already active
    #[error("Session for device '{0}' is already running")]
    AlreadyRunning(String),

    /// Another device id already owns this location
    #[error("Location {location} is already in use by device '{owner}'")]
    LocationInUse {
        /// Device location
        location: String,
        /// Device id holding the location
        owner: String,
    },

    /// No session registered for this device id
    #[error("No session for device '{0}'")]
    NotRunning(String),

    /// Transport could not be opened
    #[error("Failed to open transport: {0}")]
    Open(#[from] DeviceError),

    /// Handshake failed, so the send loop never started
    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    /// Worker thread could not be spawned
    #[error("Failed to spawn {thread} thread: {reason}")]
    Spawn {
        /// Thread role
        thread: &'static str,
        /// OS error text
        reason: String,
    },

    /// Worker threads did not exit within the join bound
    #[error("Session '{0}' did not stop within the join timeout")]
    JoinTimeout(String),

    /// Session control channel closed
    #[error("Session '{0}' control channel closed")]
    ControlClosed(String),

    /// Configuration record rejected
    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),
}

impl SessionError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SessionError::Open(e) => e.severity(),
            SessionError::Handshake(e) => e.severity(),
            SessionError::AlreadyRunning(_)
            | SessionError::LocationInUse { .. }
            | SessionError::NotRunning(_) => ErrorSeverity::Warning,
            SessionError::Spawn { .. }
            | SessionError::JoinTimeout(_)
            | SessionError::ControlClosed(_)
            | SessionError::InvalidConfig(_) => ErrorSeverity::Error,
        }
    }
}
