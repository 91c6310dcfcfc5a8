//! Error types for panelctl

use panelstream_errors::{DeviceError, ErrorCategory, HandshakeError, PanelError, SessionError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Session error: {0}")]
    SessionFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::DeviceNotFound(_) => 2,
            CliError::ValidationError(_) | CliError::JsonError(_) => 4,
            CliError::PermissionDenied(_) => 6,
            _ => 1,
        }
    }
}

impl From<DeviceError> for CliError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::NotFound(_) | DeviceError::Disconnected(_) => {
                CliError::DeviceNotFound(err.to_string())
            }
            DeviceError::PermissionDenied(_) => CliError::PermissionDenied(err.to_string()),
            other => CliError::SessionFailed(other.to_string()),
        }
    }
}

impl From<HandshakeError> for CliError {
    fn from(err: HandshakeError) -> Self {
        match err {
            HandshakeError::Transport(e) => e.into(),
            other => CliError::HandshakeFailed(other.to_string()),
        }
    }
}

impl From<SessionError> for CliError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Open(e) => e.into(),
            SessionError::Handshake(e) => e.into(),
            SessionError::InvalidConfig(_) => CliError::ValidationError(err.to_string()),
            other => CliError::SessionFailed(other.to_string()),
        }
    }
}

impl From<PanelError> for CliError {
    fn from(err: PanelError) -> Self {
        if err.category() == ErrorCategory::Config {
            return CliError::ValidationError(err.to_string());
        }
        match err {
            PanelError::Device(e) => e.into(),
            PanelError::Handshake(e) => e.into(),
            PanelError::Session(e) => e.into(),
            PanelError::Io(e) => CliError::IoError(e),
            other => CliError::SessionFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_kind() {
        let not_found: CliError = DeviceError::not_found("/dev/sg3").into();
        assert_eq!(not_found.exit_code(), 2);
        let denied: CliError = SessionError::Open(DeviceError::permission_denied("/dev/hidraw0")).into();
        assert_eq!(denied.exit_code(), 6);
        let invalid: CliError = SessionError::InvalidConfig("target_fps".into()).into();
        assert_eq!(invalid.exit_code(), 4);
        let timeout: CliError = DeviceError::timeout("usb:1-4", 1000).into();
        assert_eq!(timeout.exit_code(), 1);
    }

    #[test]
    fn panel_errors_map_by_category() {
        let config: CliError = PanelError::config("Duplicate device id: a").into();
        assert!(matches!(config, CliError::ValidationError(ref m) if m.contains("Duplicate device id")));
        assert_eq!(config.exit_code(), 4);

        let io: CliError = PanelError::from(std::io::Error::from(std::io::ErrorKind::Other)).into();
        assert!(matches!(io, CliError::IoError(_)));
        assert_eq!(io.exit_code(), 1);

        let gone: CliError = PanelError::from(DeviceError::not_found("/dev/sg4")).into();
        assert_eq!(gone.exit_code(), 2);
    }
}
