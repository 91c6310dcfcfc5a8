//! Transport and device I/O error types.
//!
//! Every transport (USB bulk, HID, serial, SCSI generic) reports failures as
//! [`DeviceError`] so that the pipeline can decide uniformly whether a failure
//! costs one frame or the whole session.

use crate::common::ErrorSeverity;

/// Udev guidance appended to permission errors.
const UDEV_HINT: &str =
    "install a udev rule granting access for this vendor/product id, then replug the device";

/// Result alias for transport operations.
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Device and transport errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// Device not found at the requested location
    #[error("Device not found: {0}")]
    NotFound(String),

    /// Device disconnected while in use
    #[error("Device disconnected: {0}")]
    Disconnected(String),

    /// Device node exists but is not accessible to this user
    #[error("Permission denied for device {0}: {UDEV_HINT}")]
    PermissionDenied(String),

    /// Opening the transport failed for another reason
    #[error("Failed to open device {device}: {reason}")]
    OpenFailed {
        /// Device location
        device: String,
        /// Failure reason
        reason: String,
    },

    /// Blocking I/O exceeded its deadline
    #[error("Device {device} timeout after {timeout_ms}ms")]
    Timeout {
        /// Device location
        device: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// Device or interface claimed by someone else
    #[error("Device {0} is busy")]
    Busy(String),

    /// Transfer completed with fewer bytes than requested
    #[error("Short write to device {device}: wrote {written} of {expected} bytes")]
    ShortWrite {
        /// Device location
        device: String,
        /// Bytes requested
        expected: usize,
        /// Bytes accepted by the device
        written: usize,
    },

    /// SCSI command finished with a non-zero status
    #[error(
        "SCSI command failed on {device}: status={status:#04x} host={host_status:#06x} driver={driver_status:#06x}"
    )]
    ScsiStatus {
        /// Device location
        device: String,
        /// SCSI status byte
        status: u8,
        /// Host adapter status
        host_status: u16,
        /// Driver status
        driver_status: u16,
    },

    /// Operation not supported by this transport
    #[error("Operation '{operation}' not supported by {transport} transport")]
    Unsupported {
        /// Transport name
        transport: &'static str,
        /// Operation name
        operation: &'static str,
    },

    /// Transport-level I/O failure that may clear on retry
    #[error("I/O error on device {device}: {message}")]
    Io {
        /// Device location
        device: String,
        /// Error message
        message: String,
    },
}

impl DeviceError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DeviceError::Disconnected(_)
            | DeviceError::NotFound(_)
            | DeviceError::PermissionDenied(_) => ErrorSeverity::Critical,
            DeviceError::OpenFailed { .. } => ErrorSeverity::Error,
            DeviceError::Unsupported { .. } => ErrorSeverity::Error,
            DeviceError::Timeout { .. }
            | DeviceError::Busy(_)
            | DeviceError::ShortWrite { .. }
            | DeviceError::ScsiStatus { .. }
            | DeviceError::Io { .. } => ErrorSeverity::Warning,
        }
    }

    /// Check if this error indicates the device is unavailable.
    ///
    /// A session that sees one of these stops instead of retrying.
    pub fn is_device_unavailable(&self) -> bool {
        matches!(
            self,
            DeviceError::NotFound(_)
                | DeviceError::Disconnected(_)
                | DeviceError::PermissionDenied(_)
        )
    }

    /// Check if retrying the operation on the next cycle might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeviceError::Timeout { .. }
                | DeviceError::Busy(_)
                | DeviceError::ShortWrite { .. }
                | DeviceError::ScsiStatus { .. }
                | DeviceError::Io { .. }
        )
    }

    /// Create a not found error.
    pub fn not_found(device: impl Into<String>) -> Self {
        DeviceError::NotFound(device.into())
    }

    /// Create a disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        DeviceError::Disconnected(device.into())
    }

    /// Create a permission denied error.
    pub fn permission_denied(device: impl Into<String>) -> Self {
        DeviceError::PermissionDenied(device.into())
    }

    /// Create a timeout error.
    pub fn timeout(device: impl Into<String>, timeout_ms: u64) -> Self {
        DeviceError::Timeout {
            device: device.into(),
            timeout_ms,
        }
    }

    /// Create a generic I/O error.
    pub fn io(device: impl Into<String>, message: impl Into<String>) -> Self {
        DeviceError::Io {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create an open failure.
    pub fn open_failed(device: impl Into<String>, reason: impl Into<String>) -> Self {
        DeviceError::OpenFailed {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(transport: &'static str, operation: &'static str) -> Self {
        DeviceError::Unsupported {
            transport,
            operation,
        }
    }

    /// Map an OS-level I/O error onto the device taxonomy.
    pub fn from_io(device: impl Into<String>, err: &std::io::Error) -> Self {
        use std::io::ErrorKind;

        let device = device.into();
        match err.kind() {
            ErrorKind::NotFound => DeviceError::NotFound(device),
            ErrorKind::PermissionDenied => DeviceError::PermissionDenied(device),
            ErrorKind::TimedOut | ErrorKind::WouldBlock => DeviceError::Timeout {
                device,
                timeout_ms: 0,
            },
            ErrorKind::BrokenPipe | ErrorKind::NotConnected | ErrorKind::UnexpectedEof => {
                DeviceError::Disconnected(device)
            }
            _ => match err.raw_os_error() {
                // ENODEV / ENXIO: node is present but the device behind it is gone.
                Some(19) | Some(6) => DeviceError::Disconnected(device),
                Some(16) => DeviceError::Busy(device),
                _ => DeviceError::Io {
                    device,
                    message: err.to_string(),
                },
            },
        }
    }
}
