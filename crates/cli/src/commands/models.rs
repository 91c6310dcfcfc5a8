//! List the built-in model catalog

use anyhow::Result;
use panelstream_catalog::{Catalog, PanelModel, TransportKind};

use crate::output;

pub fn execute(transport: Option<TransportKind>, json: bool) -> Result<()> {
    let catalog = Catalog::builtin();
    let models: Vec<PanelModel> = match transport {
        Some(kind) => catalog.by_transport(kind).copied().collect(),
        None => catalog.iter().copied().collect(),
    };
    output::print_models(&models, json);
    Ok(())
}
