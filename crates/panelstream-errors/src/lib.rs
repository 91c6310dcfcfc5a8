//! Centralized error types for PanelStream
//!
//! This crate provides the error taxonomy shared by every PanelStream crate,
//! from raw transport I/O up to session supervision.
//!
//! # Architecture
//!
//! - [`common`]: Top-level [`PanelError`], categories and severity levels
//! - [`device`]: Transport and device I/O errors ([`DeviceError`])
//! - [`protocol`]: Wire-format encode/decode errors ([`ProtocolError`])
//! - [`handshake`]: Model identification failures ([`HandshakeError`])
//! - [`session`]: Session lifecycle and supervisor errors ([`SessionError`])
//!
//! # Recoverability
//!
//! Panels glitch routinely. [`DeviceError::is_retryable`] marks errors that
//! only cost the current frame, while [`DeviceError::is_device_unavailable`]
//! marks errors that end a session.
//!
//! # Example
//!
//! ```
//! use panelstream_errors::prelude::*;
//!
//! fn check_frame(len: usize) -> Result<()> {
//!     if len == 0 {
//!         return Err(ProtocolError::EmptyPayload.into());
//!     }
//!     Ok(())
//! }
//! assert!(check_frame(0).is_err());
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod common;
pub mod device;
pub mod handshake;
pub mod prelude;
pub mod protocol;
pub mod session;

pub use common::{ErrorCategory, ErrorSeverity, PanelError};
pub use device::{DeviceError, DeviceResult};
pub use handshake::HandshakeError;
pub use protocol::ProtocolError;
pub use session::SessionError;

/// A specialized `Result` type for PanelStream operations.
pub type Result<T> = std::result::Result<T, PanelError>;
