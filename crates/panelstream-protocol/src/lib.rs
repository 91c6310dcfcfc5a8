//! LCD panel wire protocols.
//!
//! This crate is I/O-free. It builds and parses the exact bytes each panel
//! family expects so that drivers only have to move buffers through a
//! transport.
//!
//! - [`header`]: 64-byte init/display header (bulk and HID families)
//! - [`bulk`]: single-write frames and the identifier reply
//! - [`hid`]: indexed 513-byte output reports
//! - [`scsi`]: vendor CDBs and 64 KiB frame chunking
//! - [`serial`]: 6-byte command words
//! - [`response`]: booting sentinel and reply-to-model resolution

#![deny(static_mut_refs)]

pub mod bulk;
pub mod header;
pub mod hid;
pub mod response;
pub mod scsi;
pub mod serial;

pub use header::{Command, FrameHeader, HEADER_LEN, MAGIC, pixel_format_code};
pub use response::{
    BOOTING_SENTINEL, HandshakeReply, InitResponse, is_booting, resolve_model,
};
