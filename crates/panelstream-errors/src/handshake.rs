//! Handshake (model identification) errors.
//!
//! None of these are fatal to the process: a failed handshake only means the
//! session for that device does not start.

use crate::common::ErrorSeverity;
use crate::device::DeviceError;

/// Failures while confirming which panel model is attached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    /// Transport failed while sending the init command or reading the reply
    #[error("Transport failure during handshake: {0}")]
    Transport(#[from] DeviceError),

    /// No reply within the response timeout and vid/pid alone is ambiguous
    #[error("No handshake response from {device} and vid/pid {vendor_id:04x}:{product_id:04x} is ambiguous")]
    NoResponse {
        /// Device location
        device: String,
        /// USB vendor ID
        vendor_id: u16,
        /// USB product ID
        product_id: u16,
    },

    /// Device kept answering with the booting sentinel
    #[error("Device {device} still booting after {attempts} attempts")]
    StillBooting {
        /// Device location
        device: String,
        /// Number of polls performed
        attempts: u32,
    },

    /// Reply parsed but matched no catalog entry and no fallback guess exists
    #[error("Unrecognized panel on {device}: identifier={identifier:?} mode={mode_byte:?}")]
    Unrecognized {
        /// Device location
        device: String,
        /// Identifier string from the reply
        identifier: Option<String>,
        /// Mode byte from the reply
        mode_byte: Option<u8>,
    },

    /// Reply too short or malformed
    #[error("Malformed handshake response from {device}: {reason}")]
    Malformed {
        /// Device location
        device: String,
        /// What was wrong
        reason: String,
    },
}

impl HandshakeError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            HandshakeError::Transport(e) => e.severity(),
            HandshakeError::StillBooting { .. } => ErrorSeverity::Warning,
            HandshakeError::NoResponse { .. }
            | HandshakeError::Unrecognized { .. }
            | HandshakeError::Malformed { .. } => ErrorSeverity::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_response_display_includes_ids() {
        let err = HandshakeError::NoResponse {
            device: "usb:3-1".into(),
            vendor_id: 0x87AD,
            product_id: 0x70DB,
        };
        let msg = err.to_string();
        assert!(msg.contains("87ad:70db"));
    }

    #[test]
    fn test_transport_severity_passes_through() {
        let err: HandshakeError = DeviceError::disconnected("usb:3-1").into();
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }
}
