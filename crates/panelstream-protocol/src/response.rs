//! Handshake response model and model resolution.

use panelstream_catalog::{Catalog, PanelModel, ProtocolKind};

/// Bytes at offset 4..8 of a response while the device firmware is booting.
pub const BOOTING_SENTINEL: [u8; 4] = [0xA1, 0xA2, 0xA3, 0xA4];

/// Offset of the booting sentinel in every family's response.
pub const BOOTING_OFFSET: usize = 4;

/// Whether a raw response carries the booting sentinel.
///
/// Only bytes 4..8 are inspected; anything after is ignored.
pub fn is_booting(response: &[u8]) -> bool {
    response.get(BOOTING_OFFSET..BOOTING_OFFSET + 4) == Some(&BOOTING_SENTINEL[..])
}

/// Fields extracted from a handshake reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InitResponse {
    /// ASCII identifier, NUL padding stripped.
    pub identifier: Option<String>,
    /// Mode ("PM") byte, `None` when the device reported zero.
    pub mode_byte: Option<u8>,
}

impl InitResponse {
    pub fn with_mode(mode_byte: u8) -> Self {
        Self {
            identifier: None,
            mode_byte: non_zero(mode_byte),
        }
    }

    /// Neither an identifier nor a mode byte.
    pub fn is_empty(&self) -> bool {
        self.identifier.is_none() && self.mode_byte.is_none()
    }
}

/// Handshake parse outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeReply {
    /// Firmware not ready; poll again.
    Booting,
    /// Device answered with identity fields.
    Ready(InitResponse),
}

/// Resolve a parsed reply to a catalog entry of the given protocol family.
///
/// Returns `None` for an unrecognized reply; never fails.
pub fn resolve_model<'a>(
    catalog: &Catalog<'a>,
    protocol: ProtocolKind,
    response: &InitResponse,
) -> Option<&'a PanelModel> {
    let resolved = catalog.resolve(protocol, response.identifier.as_deref(), response.mode_byte);
    if resolved.is_none() {
        tracing::debug!(
            ?protocol,
            identifier = ?response.identifier,
            mode_byte = ?response.mode_byte,
            "Handshake reply matches no catalog entry"
        );
    }
    resolved
}

pub(crate) const fn non_zero(byte: u8) -> Option<u8> {
    if byte == 0 { None } else { Some(byte) }
}

/// Extract a NUL-padded printable ASCII field.
///
/// Returns `None` if the field is empty or contains non-printable bytes.
pub(crate) fn ascii_field(field: &[u8]) -> Option<String> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let bytes = field.get(..end)?;
    if bytes.is_empty() || !bytes.iter().all(|b| b.is_ascii_graphic()) {
        return None;
    }
    core::str::from_utf8(bytes).ok().map(str::to_owned)
}
