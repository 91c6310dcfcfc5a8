//! Common error types used across all PanelStream crates.
//!
//! This module provides the top-level error enum that wraps every sub-error,
//! along with category and severity classification.

use core::fmt;

use crate::{DeviceError, HandshakeError, ProtocolError, SessionError};

/// Top-level error type that can wrap all PanelStream sub-errors.
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    /// Transport and device I/O errors
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Wire-format errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Model identification errors
    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Session lifecycle errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Frame encoding errors
    #[error("Encode error: {0}")]
    Encode(String),

    /// Renderer collaborator errors
    #[error("Render error: {0}")]
    Render(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors outside of device transports
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),
}

impl PanelError {
    /// Get the error category for classification.
    pub fn category(&self) -> ErrorCategory {
        match self {
            PanelError::Device(_) => ErrorCategory::Device,
            PanelError::Protocol(_) => ErrorCategory::Protocol,
            PanelError::Handshake(_) => ErrorCategory::Handshake,
            PanelError::Session(_) => ErrorCategory::Session,
            PanelError::Encode(_) | PanelError::Render(_) => ErrorCategory::Frame,
            PanelError::Config(_) => ErrorCategory::Config,
            PanelError::Io(_) => ErrorCategory::IO,
        }
    }

    /// Get the error severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PanelError::Device(e) => e.severity(),
            PanelError::Handshake(e) => e.severity(),
            PanelError::Session(e) => e.severity(),
            PanelError::Protocol(_)
            | PanelError::Encode(_)
            | PanelError::Render(_)
            | PanelError::Config(_)
            | PanelError::Io(_) => ErrorSeverity::Error,
        }
    }

    /// Check if this error leaves the owning session able to continue.
    pub fn is_recoverable(&self) -> bool {
        self.severity() < ErrorSeverity::Critical
    }

    /// Create an encode error with a message.
    pub fn encode(msg: impl Into<String>) -> Self {
        PanelError::Encode(msg.into())
    }

    /// Create a render error with a message.
    pub fn render(msg: impl Into<String>) -> Self {
        PanelError::Render(msg.into())
    }

    /// Create a configuration error with a message.
    pub fn config(msg: impl Into<String>) -> Self {
        PanelError::Config(msg.into())
    }
}

impl From<std::io::Error> for PanelError {
    fn from(e: std::io::Error) -> Self {
        PanelError::Io(e)
    }
}

/// Error category for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCategory {
    /// Transport and device errors
    Device = 0,
    /// Wire-format errors
    Protocol = 1,
    /// Handshake errors
    Handshake = 2,
    /// Session errors
    Session = 3,
    /// Render/encode errors
    Frame = 4,
    /// Configuration errors
    Config = 5,
    /// I/O errors
    IO = 6,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Device => write!(f, "Device"),
            ErrorCategory::Protocol => write!(f, "Protocol"),
            ErrorCategory::Handshake => write!(f, "Handshake"),
            ErrorCategory::Session => write!(f, "Session"),
            ErrorCategory::Frame => write!(f, "Frame"),
            ErrorCategory::Config => write!(f, "Config"),
            ErrorCategory::IO => write!(f, "IO"),
        }
    }
}

/// Error severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ErrorSeverity {
    /// Informational, no action required
    Info = 0,
    /// Warning, the current frame or attempt failed
    Warning = 1,
    /// Error, the operation failed
    Error = 2,
    /// Critical, the device is gone and the session must end
    Critical = 3,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Device.to_string(), "Device");
        assert_eq!(ErrorCategory::Handshake.to_string(), "Handshake");
        assert_eq!(ErrorCategory::Frame.to_string(), "Frame");
    }

    #[test]
    fn test_error_severity_ordering() {
        assert!(ErrorSeverity::Critical > ErrorSeverity::Error);
        assert!(ErrorSeverity::Error > ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning > ErrorSeverity::Info);
    }

    #[test]
    fn test_panel_error_category() {
        let err: PanelError = DeviceError::disconnected("/dev/sg2").into();
        assert_eq!(err.category(), ErrorCategory::Device);

        let err = PanelError::config("bad frame rate");
        assert_eq!(err.category(), ErrorCategory::Config);
    }

    #[test]
    fn test_disconnect_is_not_recoverable() {
        let err: PanelError = DeviceError::disconnected("usb:1-4").into();
        assert!(!err.is_recoverable());

        let err: PanelError = DeviceError::timeout("usb:1-4", 100).into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_panel_error_is_std_error() {
        let err = PanelError::render("renderer went away");
        let _: &dyn std::error::Error = &err;
    }
}
