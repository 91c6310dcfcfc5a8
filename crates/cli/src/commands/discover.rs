//! Scan the host for attached panels

use std::sync::Arc;

use anyhow::Result;
use panelstream_engine::{DiscoveryOptions, DiscoveryService};
use panelstream_transport::SystemBus;
use tracing::debug;

use crate::output;

pub async fn execute(no_wake: bool, json: bool) -> Result<()> {
    let options = DiscoveryOptions {
        serial_wake: !no_wake,
        ..DiscoveryOptions::default()
    };
    let bus = SystemBus::new().with_scsi_node_limit(options.scsi_node_limit);
    let service = DiscoveryService::new(Arc::new(bus), options);

    let devices = service.discover().await;
    debug!(count = devices.len(), "Discovery finished");
    output::print_discovered(&devices, json);
    Ok(())
}
