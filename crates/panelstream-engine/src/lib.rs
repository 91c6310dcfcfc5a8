//! Discovery, handshake and frame streaming for USB LCD panels.
//!
//! A [`PanelSession`] owns one panel: it opens the transport, runs the
//! family handshake to confirm the model, then drives two threads. The
//! render thread paints and encodes at the target rate into a
//! single-frame [`FrameSlot`]; the send thread drains the slot and pushes
//! frames through the transport as fast as the panel accepts them. A slow
//! panel therefore drops stale frames instead of building latency.
//!
//! [`SessionRegistry`] keeps at most one session per device id and per
//! location. [`DiscoveryService`] scans a [`DeviceBus`] for known panels.
//!
//! [`DeviceBus`]: panelstream_transport::DeviceBus

#![deny(static_mut_refs)]
#![deny(clippy::await_holding_lock)]

pub mod cancel;
pub mod config;
pub mod discovery;
pub mod drivers;
pub mod encode;
pub mod frame_slot;
pub mod pacing;
mod pipeline;
pub mod renderer;
pub mod session;
pub mod supervisor;

pub use cancel::CancelToken;
pub use config::{DeviceConfig, DiscoveryOptions, HandshakeOptions, PanelStreamConfig, PipelineOptions};
pub use discovery::{DiscoveredDevice, DiscoveryService};
pub use drivers::{DeviceHint, HandshakeOutcome, Resolution};
pub use encode::{Bitmap, BitmapFormat, FrameEncoder};
pub use frame_slot::{EncodedFrame, FrameSlot};
pub use renderer::{FrameRenderer, RenderRequest, Rotation, TestPatternRenderer};
pub use session::{PanelSession, SessionControl, SessionOptions, SessionStatus};
pub use supervisor::SessionRegistry;
