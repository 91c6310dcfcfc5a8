//! Lookups over a model table.

use crate::model::{ModelId, PanelModel, ProtocolKind, TransportKind};
use crate::table::MODELS;

/// Read-only view over a model table.
///
/// [`Catalog::builtin`] wraps the static table; tests may build a catalog
/// over any slice to exercise ambiguity rules.
#[derive(Debug, Clone, Copy)]
pub struct Catalog<'a> {
    models: &'a [PanelModel],
}

impl Catalog<'static> {
    /// Catalog over the built-in model table.
    pub const fn builtin() -> Self {
        Self { models: MODELS }
    }
}

impl Default for Catalog<'static> {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Returns the single element of an iterator, or `None` for zero or many.
fn unique<'a>(mut it: impl Iterator<Item = &'a PanelModel>) -> Option<&'a PanelModel> {
    let first = it.next()?;
    match it.next() {
        Some(_) => None,
        None => Some(first),
    }
}

impl<'a> Catalog<'a> {
    pub const fn new(models: &'a [PanelModel]) -> Self {
        Self { models }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a PanelModel> + 'a {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn by_id(&self, id: ModelId) -> Option<&'a PanelModel> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Model for a vid/pid pair, only when exactly one entry has that pair.
    ///
    /// A shared pair returns `None`; the caller must handshake to resolve it.
    pub fn lookup_by_vid_pid(&self, vid: u16, pid: u16) -> Option<&'a PanelModel> {
        unique(self.models.iter().filter(|m| m.matches_vid_pid(vid, pid)))
    }

    /// Model whose identifier string equals `text`, when exactly one does.
    pub fn lookup_by_identifier(&self, text: &str) -> Option<&'a PanelModel> {
        unique(self.models.iter().filter(|m| m.identifier == Some(text)))
    }

    /// Model whose mode byte equals `byte`, when exactly one does.
    pub fn lookup_by_mode_byte(&self, byte: u8) -> Option<&'a PanelModel> {
        unique(self.models.iter().filter(|m| m.mode_byte == Some(byte)))
    }

    /// Every entry sharing a vid/pid pair.
    pub fn candidates_for_vid_pid(
        &self,
        vid: u16,
        pid: u16,
    ) -> impl Iterator<Item = &'a PanelModel> + 'a {
        self.models
            .iter()
            .filter(move |m| m.matches_vid_pid(vid, pid))
    }

    /// Whether any entry uses this vid/pid pair.
    pub fn is_known_vid_pid(&self, vid: u16, pid: u16) -> bool {
        self.models.iter().any(|m| m.matches_vid_pid(vid, pid))
    }

    /// Whether any entry reachable over `transport` uses this vid/pid pair.
    pub fn is_known_for_transport(&self, transport: TransportKind, vid: u16, pid: u16) -> bool {
        self.models
            .iter()
            .any(|m| m.transport == transport && m.matches_vid_pid(vid, pid))
    }

    /// Entries reachable over `transport`.
    pub fn by_transport(
        &self,
        transport: TransportKind,
    ) -> impl Iterator<Item = &'a PanelModel> + 'a {
        self.models.iter().filter(move |m| m.transport == transport)
    }

    /// Resolve a handshake result to a model within one protocol family.
    ///
    /// The identifier wins when present. Entries sharing it are refined by
    /// mode byte. Without an identifier the mode byte alone is used. An
    /// identifier that matches nothing resolves to `None` even when the mode
    /// byte would match.
    pub fn resolve(
        &self,
        protocol: ProtocolKind,
        identifier: Option<&str>,
        mode_byte: Option<u8>,
    ) -> Option<&'a PanelModel> {
        let family = || self.models.iter().filter(move |m| m.protocol == protocol);

        match identifier {
            Some(text) => {
                let by_ident = || family().filter(move |m| m.identifier == Some(text));
                if let Some(m) = unique(by_ident()) {
                    return Some(m);
                }
                let byte = mode_byte?;
                unique(by_ident().filter(|m| m.mode_byte == Some(byte)))
            }
            None => {
                let byte = mode_byte?;
                unique(family().filter(|m| m.mode_byte == Some(byte)))
            }
        }
    }
}
