//! Protocol drivers: handshake and frame send per panel family.
//!
//! Each family module is a set of free functions over [`Transport`], so the
//! same code runs against real devices and [`panelstream_transport::mock`].
//!
//! The handshake is a small state machine shared by every family:
//!
//! 1. send the init command and await a reply within the response timeout
//! 2. a booting sentinel is polled again after a delay, up to the retry limit
//! 3. a reply is resolved against the catalog
//! 4. no reply, a malformed reply or an unknown reply falls back to the best
//!    prior guess when one exists and fails otherwise

pub mod bulk;
pub mod hid;
pub mod scsi;
pub mod serial;

use std::thread;
use std::time::Duration;

use panelstream_catalog::{Catalog, PanelModel, ProtocolKind};
use panelstream_errors::{DeviceError, HandshakeError, PanelError};
use panelstream_protocol::{HandshakeReply, InitResponse, resolve_model};
use panelstream_transport::Transport;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::HandshakeOptions;
use crate::frame_slot::EncodedFrame;

/// What the caller knows about a device before the handshake.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceHint {
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    /// Model recorded by discovery or configuration.
    pub model: Option<PanelModel>,
}

impl DeviceHint {
    pub fn from_model(model: PanelModel) -> Self {
        Self {
            vendor_id: Some(model.vendor_id),
            product_id: Some(model.product_id),
            model: Some(model),
        }
    }

    /// Best guess before talking to the device: the recorded model, else a
    /// unique vid/pid match.
    pub fn best_guess(&self, catalog: &Catalog<'_>) -> Option<PanelModel> {
        if let Some(model) = self.model {
            return Some(model);
        }
        let (vid, pid) = (self.vendor_id?, self.product_id?);
        catalog.lookup_by_vid_pid(vid, pid).copied()
    }
}

/// How the final model was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The device's reply identified the model.
    Handshake,
    /// The reply was missing or unusable; the prior guess was kept.
    Fallback,
}

/// Handshake result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeOutcome {
    pub model: PanelModel,
    pub resolution: Resolution,
    /// Parsed reply, when one arrived.
    pub response: Option<InitResponse>,
    /// Init exchanges performed, including booting polls.
    pub attempts: u32,
}

impl HandshakeOutcome {
    pub fn display_name(&self) -> &'static str {
        self.model.name
    }
}

/// One init exchange for a family.
fn init_exchange<T: Transport + ?Sized>(
    transport: &mut T,
    protocol: ProtocolKind,
    options: &HandshakeOptions,
) -> Result<HandshakeReply, PanelError> {
    match protocol {
        ProtocolKind::BulkDisplay => bulk::init_exchange(transport, options),
        ProtocolKind::HidReport => hid::init_exchange(transport, options),
        ProtocolKind::ScsiLcd => scsi::init_exchange(transport, options),
        ProtocolKind::SerialLcd => serial::init_exchange(transport, options),
    }
}

fn fallback(
    guess: Option<PanelModel>,
    response: Option<InitResponse>,
    attempts: u32,
    err: HandshakeError,
) -> Result<HandshakeOutcome, HandshakeError> {
    match guess {
        Some(model) => {
            warn!(error = %err, model = model.name, "Handshake inconclusive, keeping prior model");
            Ok(HandshakeOutcome {
                model,
                resolution: Resolution::Fallback,
                response,
                attempts,
            })
        }
        None => Err(err),
    }
}

/// Confirm or refine which model is attached.
///
/// # Errors
///
/// Transport failures while writing, and any inconclusive reply when there is
/// no prior guess to fall back to.
pub fn handshake<T: Transport + ?Sized>(
    transport: &mut T,
    protocol: ProtocolKind,
    hint: &DeviceHint,
    catalog: &Catalog<'_>,
    options: &HandshakeOptions,
) -> Result<HandshakeOutcome, HandshakeError> {
    let device = transport.location().to_owned();
    let guess = hint.best_guess(catalog);
    let max_attempts = options.boot_retries.saturating_add(1);

    for attempt in 1..=max_attempts {
        debug!(device = %device, ?protocol, attempt, "Sending init command");
        let reply = match init_exchange(transport, protocol, options) {
            Ok(reply) => reply,
            Err(PanelError::Device(DeviceError::Timeout { .. })) => {
                let err = HandshakeError::NoResponse {
                    device: device.clone(),
                    vendor_id: hint.vendor_id.unwrap_or_default(),
                    product_id: hint.product_id.unwrap_or_default(),
                };
                return fallback(guess, None, attempt, err);
            }
            Err(PanelError::Device(e)) => return Err(HandshakeError::Transport(e)),
            Err(other) => {
                let err = HandshakeError::Malformed {
                    device: device.clone(),
                    reason: other.to_string(),
                };
                return fallback(guess, None, attempt, err);
            }
        };

        let response = match reply {
            HandshakeReply::Booting => {
                if attempt < max_attempts {
                    debug!(device = %device, attempt, "Device still booting, polling again");
                    thread::sleep(options.boot_retry_delay());
                }
                continue;
            }
            HandshakeReply::Ready(response) => response,
        };

        return match resolve_model(catalog, protocol, &response) {
            Some(model) => {
                info!(
                    device = %device,
                    model = model.name,
                    identifier = ?response.identifier,
                    mode_byte = ?response.mode_byte,
                    "Panel identified"
                );
                Ok(HandshakeOutcome {
                    model: *model,
                    resolution: Resolution::Handshake,
                    response: Some(response),
                    attempts: attempt,
                })
            }
            None => {
                let err = HandshakeError::Unrecognized {
                    device: device.clone(),
                    identifier: response.identifier.clone(),
                    mode_byte: response.mode_byte,
                };
                fallback(guess, Some(response), attempt, err)
            }
        };
    }

    Err(HandshakeError::StillBooting {
        device,
        attempts: max_attempts,
    })
}

/// Transmit one encoded frame.
///
/// # Errors
///
/// Any transport or framing failure aborts this frame only; the caller
/// decides whether the error ends the session.
pub fn send_frame<T: Transport + ?Sized>(
    transport: &mut T,
    protocol: ProtocolKind,
    frame: &EncodedFrame,
    timeout: Duration,
) -> Result<(), PanelError> {
    if let Some(expected) = frame.format.raw_frame_len(frame.width, frame.height) {
        if frame.data.len() != expected {
            return Err(PanelError::encode(format!(
                "raw {}x{} frame must be {expected} bytes, got {}",
                frame.width,
                frame.height,
                frame.data.len()
            )));
        }
    }
    match protocol {
        ProtocolKind::BulkDisplay => bulk::send_frame(transport, frame, timeout),
        ProtocolKind::HidReport => hid::send_frame(transport, frame, timeout),
        ProtocolKind::ScsiLcd => scsi::send_frame(transport, frame, timeout),
        ProtocolKind::SerialLcd => serial::send_frame(transport, frame, timeout),
    }
}

/// Whether an error from [`send_frame`] means the device is gone.
pub fn is_fatal(err: &PanelError) -> bool {
    !err.is_recoverable()
}
