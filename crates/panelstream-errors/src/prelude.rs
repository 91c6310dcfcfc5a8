//! Prelude module for convenient error handling imports.
//!
//! # Example
//!
//! ```
//! use panelstream_errors::prelude::*;
//!
//! fn open(path: &str) -> DeviceResult<()> {
//!     Err(DeviceError::not_found(path))
//! }
//! assert!(open("/dev/sg9").is_err());
//! ```

pub use crate::{
    Result,
    common::{ErrorCategory, ErrorSeverity, PanelError},
    device::{DeviceError, DeviceResult},
    handshake::HandshakeError,
    protocol::ProtocolError,
    session::SessionError,
};
