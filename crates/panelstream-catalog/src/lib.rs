//! Static model database for USB, HID, serial and SCSI LCD panels.
//!
//! This crate is I/O-free. It holds one authoritative table of known panel
//! models and the lookups used by discovery and handshake to turn a vid/pid
//! pair, an identifier string, or a mode byte into a [`PanelModel`].

#![deny(static_mut_refs)]

pub mod catalog;
pub mod ids;
pub mod model;
pub mod table;

pub use catalog::Catalog;
pub use model::{ModelId, PanelModel, PixelFormat, ProtocolKind, TransportKind};
pub use table::MODELS;
