//! Open one panel and run the handshake without streaming

use anyhow::{Context, Result};
use panelstream_catalog::{Catalog, PanelModel, ProtocolKind, TransportKind};
use panelstream_engine::drivers::{self, DeviceHint, Resolution};
use panelstream_engine::HandshakeOptions;
use panelstream_transport::{DeviceBus, SystemBus, Transport};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CliError;
use crate::output;

/// Handshake result as reported to the user.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub location: String,
    pub transport: TransportKind,
    pub model: PanelModel,
    pub resolution: Resolution,
    pub identifier: Option<String>,
    pub mode_byte: Option<u8>,
    pub attempts: u32,
}

pub async fn execute(location: String, transport: TransportKind, json: bool) -> Result<()> {
    let report = tokio::task::spawn_blocking(move || probe(&SystemBus::new(), &location, transport))
        .await
        .context("probe worker failed")??;
    output::print_probe(&report, json);
    Ok(())
}

/// Vid/pid for `location`, if the bus lists it.
fn hint_for(bus: &dyn DeviceBus, kind: TransportKind, location: &str) -> DeviceHint {
    let nodes = match bus.enumerate(kind) {
        Ok(nodes) => nodes,
        Err(e) => {
            warn!(transport = %kind, error = %e, "Enumeration failed, probing without ids");
            return DeviceHint::default();
        }
    };
    nodes
        .into_iter()
        .find(|n| n.location == location)
        .map(|n| DeviceHint {
            vendor_id: n.vendor_id,
            product_id: n.product_id,
            model: None,
        })
        .unwrap_or_default()
}

pub fn probe(bus: &dyn DeviceBus, location: &str, kind: TransportKind) -> Result<ProbeReport, CliError> {
    let catalog = Catalog::builtin();
    let hint = hint_for(bus, kind, location);
    debug!(location, transport = %kind, ?hint, "Probing panel");

    let mut transport = bus.open(kind, location)?;
    let outcome = drivers::handshake(
        &mut transport,
        ProtocolKind::for_transport(kind),
        &hint,
        &catalog,
        &HandshakeOptions::default(),
    );
    if let Err(e) = transport.close() {
        warn!(location, error = %e, "Close after probe failed");
    }
    let outcome = outcome?;

    let (identifier, mode_byte) = outcome
        .response
        .map(|r| (r.identifier, r.mode_byte))
        .unwrap_or_default();
    Ok(ProbeReport {
        location: location.to_owned(),
        transport: kind,
        model: outcome.model,
        resolution: outcome.resolution,
        identifier,
        mode_byte,
        attempts: outcome.attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelstream_catalog::ModelId;
    use panelstream_catalog::ids::hid;
    use panelstream_protocol::hid::encode_response;
    use panelstream_transport::BusNode;
    use panelstream_transport::mock::MockBus;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn probe_reports_handshake_model() -> TestResult {
        let bus = MockBus::new();
        let device = bus.add_device(
            BusNode::new(TransportKind::Hid, "/dev/hidraw2").with_ids(hid::VENDOR_ID, hid::PRODUCT_ID),
        );
        device.queue_read(encode_response(0x11).to_vec());

        let report = probe(&bus, "/dev/hidraw2", TransportKind::Hid)?;
        assert_eq!(report.model.id, ModelId::HidSquare320);
        assert_eq!(report.resolution, Resolution::Handshake);
        assert_eq!(report.mode_byte, Some(0x11));
        assert!(device.is_closed());
        Ok(())
    }

    #[test]
    fn probe_of_missing_node_is_not_found() {
        let bus = MockBus::new();
        let err = probe(&bus, "/dev/hidraw9", TransportKind::Hid);
        assert!(matches!(err, Err(CliError::DeviceNotFound(_))));
    }
}
