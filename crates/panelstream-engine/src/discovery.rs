//! Device discovery across every transport.
//!
//! Scanning is side-effect free apart from the optional serial wake, which
//! opens and closes candidate ports without writing. Individual nodes that
//! cannot be read are logged and skipped; a scan never fails as a whole.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use panelstream_catalog::ids::scsi::VENDOR_MARKER;
use panelstream_catalog::{Catalog, ModelId, PanelModel, TransportKind};
use panelstream_transport::{BusNode, DeviceBus};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DiscoveryOptions;
use crate::drivers::DeviceHint;

/// One panel seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    pub transport: TransportKind,
    /// Where to re-open the device.
    pub location: String,
    /// Stable across scans; duplicates collapse on it.
    pub identity: String,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    /// SCSI INQUIRY vendor string.
    pub vendor: Option<String>,
    /// Model when vid/pid alone is unambiguous.
    pub model: Option<PanelModel>,
    /// Every catalog entry the vid/pid could be.
    pub candidates: Vec<ModelId>,
    /// The node exists but the current user cannot open it.
    pub permission_denied: bool,
}

impl DiscoveredDevice {
    fn from_node(node: BusNode, catalog: &Catalog<'_>) -> Self {
        let (model, candidates) = match node.vid_pid() {
            Some((vid, pid)) => (
                catalog.lookup_by_vid_pid(vid, pid).copied(),
                catalog
                    .candidates_for_vid_pid(vid, pid)
                    .filter(|m| m.transport == node.transport)
                    .map(|m| m.id)
                    .collect(),
            ),
            None => (None, Vec::new()),
        };
        Self {
            transport: node.transport,
            location: node.location,
            identity: node.identity,
            vendor_id: node.vendor_id,
            product_id: node.product_id,
            vendor: node.vendor,
            model,
            candidates,
            permission_denied: node.permission_denied,
        }
    }

    /// Seed for the handshake.
    pub fn hint(&self) -> DeviceHint {
        DeviceHint {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            model: self.model,
        }
    }

    /// Label for logs and listings.
    pub fn display_name(&self) -> String {
        match (&self.model, self.vid_pid()) {
            (Some(model), _) => model.name.to_string(),
            (None, Some((vid, pid))) => format!("Unidentified panel {vid:04x}:{pid:04x}"),
            (None, None) => format!("Unidentified {} panel", self.transport),
        }
    }

    pub fn vid_pid(&self) -> Option<(u16, u16)> {
        Some((self.vendor_id?, self.product_id?))
    }
}

fn enumerate_or_empty(bus: &dyn DeviceBus, kind: TransportKind) -> Vec<BusNode> {
    match bus.enumerate(kind) {
        Ok(nodes) => nodes,
        Err(e) => {
            warn!(transport = %kind, error = %e, "Enumeration failed, skipping transport");
            Vec::new()
        }
    }
}

/// Whether a serial node is worth waking: ids unknown, or a known panel bridge.
fn wake_candidate(node: &BusNode, catalog: &Catalog<'_>) -> bool {
    match node.vid_pid() {
        Some((vid, pid)) => catalog.is_known_for_transport(TransportKind::Serial, vid, pid),
        None => true,
    }
}

/// Open and close each candidate serial port, retrying a few times.
pub fn wake_serial_bridges(bus: &dyn DeviceBus, catalog: &Catalog<'_>, options: &DiscoveryOptions) {
    for node in enumerate_or_empty(bus, TransportKind::Serial) {
        if node.permission_denied || !wake_candidate(&node, catalog) {
            continue;
        }
        for attempt in 1..=options.wake_attempts {
            match bus.wake_serial(&node.location, options.wake_baud) {
                Ok(()) => {
                    debug!(port = %node.location, attempt, "Serial bridge touched");
                    break;
                }
                Err(e) => {
                    debug!(port = %node.location, attempt, error = %e, "Serial wake failed");
                    if attempt < options.wake_attempts {
                        thread::sleep(options.wake_delay());
                    }
                }
            }
        }
    }
}

fn accept(node: &BusNode, catalog: &Catalog<'_>) -> bool {
    match node.transport {
        TransportKind::Scsi => {
            let marked = node
                .vendor
                .as_deref()
                .is_some_and(|v| v.contains(VENDOR_MARKER));
            if !marked {
                debug!(node = %node.location, vendor = ?node.vendor, "SCSI node without panel vendor marker");
            }
            marked
        }
        kind => match node.vid_pid() {
            Some((vid, pid)) if catalog.is_known_for_transport(kind, vid, pid) => true,
            Some((vid, pid)) => {
                debug!(node = %node.location, "Skipping unknown device {vid:04x}:{pid:04x}");
                false
            }
            None => {
                debug!(node = %node.location, "Skipping node without USB ids");
                false
            }
        },
    }
}

/// Scan every configured transport once.
///
/// Returns an empty list, never an error, when nothing is attached.
pub fn scan(bus: &dyn DeviceBus, catalog: &Catalog<'_>, options: &DiscoveryOptions) -> Vec<DiscoveredDevice> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for &kind in &options.transports {
        if kind == TransportKind::Serial && options.serial_wake {
            wake_serial_bridges(bus, catalog, options);
        }
        for node in enumerate_or_empty(bus, kind) {
            if !accept(&node, catalog) {
                continue;
            }
            if !seen.insert((node.transport, node.identity.clone())) {
                debug!(identity = %node.identity, "Duplicate node collapsed");
                continue;
            }
            if node.permission_denied {
                warn!(
                    node = %node.location,
                    "Panel found but not accessible; install the udev rule for this device"
                );
            }
            found.push(DiscoveredDevice::from_node(node, catalog));
        }
    }

    info!(count = found.len(), "Discovery scan complete");
    found
}

/// Serialised discovery over a shared bus.
///
/// Concurrent callers queue on one async mutex, so enumeration calls never
/// overlap. Each scan runs on a blocking worker.
pub struct DiscoveryService {
    bus: Arc<dyn DeviceBus>,
    catalog: Catalog<'static>,
    options: DiscoveryOptions,
    scan_lock: tokio::sync::Mutex<()>,
}

impl DiscoveryService {
    pub fn new(bus: Arc<dyn DeviceBus>, options: DiscoveryOptions) -> Self {
        Self {
            bus,
            catalog: Catalog::builtin(),
            options,
            scan_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    pub async fn discover(&self) -> Vec<DiscoveredDevice> {
        let _guard = self.scan_lock.lock().await;
        let bus = Arc::clone(&self.bus);
        let catalog = self.catalog;
        let options = self.options.clone();
        match tokio::task::spawn_blocking(move || scan(bus.as_ref(), &catalog, &options)).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Discovery worker failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelstream_catalog::ids::{bulk, hid, scsi, serial};
    use panelstream_transport::mock::MockBus;

    fn quick() -> DiscoveryOptions {
        DiscoveryOptions {
            wake_delay_ms: 1,
            ..DiscoveryOptions::default()
        }
    }

    #[test]
    fn filters_unknown_usb_devices() {
        let bus = MockBus::new();
        bus.add_device(BusNode::new(TransportKind::UsbBulk, "usb:1-1").with_ids(bulk::VENDOR_ID, bulk::PRODUCT_ID));
        bus.add_device(BusNode::new(TransportKind::UsbBulk, "usb:1-2").with_ids(0x046D, 0xC52B));
        bus.add_device(BusNode::new(TransportKind::Hid, "/dev/hidraw1").with_ids(hid::VENDOR_ID, hid::PRODUCT_ID));
        let found = scan(&bus, &Catalog::builtin(), &quick());
        let locations: Vec<_> = found.iter().map(|d| d.location.as_str()).collect();
        assert_eq!(locations, ["usb:1-1", "/dev/hidraw1"]);
        assert!(found.iter().all(|d| d.model.is_none()));
        assert_eq!(found[1].candidates.len(), 3);
    }

    #[test]
    fn scsi_requires_vendor_marker() {
        let bus = MockBus::new();
        bus.add_device(BusNode::new(TransportKind::Scsi, "/dev/sg0").with_vendor("ATA"));
        bus.add_device(
            BusNode::new(TransportKind::Scsi, "/dev/sg1")
                .with_vendor("USBLCD")
                .with_ids(scsi::LARGE_VENDOR_ID, scsi::LARGE_PRODUCT_ID),
        );
        let found = scan(&bus, &Catalog::builtin(), &quick());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].model.map(|m| m.id), Some(ModelId::ScsiSquare480));
    }

    #[test]
    fn duplicates_collapse_by_identity() {
        let bus = MockBus::new();
        for loc in ["usb:1-1", "usb:1:7"] {
            bus.add_device(
                BusNode::new(TransportKind::UsbBulk, loc)
                    .with_ids(bulk::VENDOR_ID, bulk::PRODUCT_ID)
                    .with_identity("87ad:70db#A001"),
            );
        }
        assert_eq!(scan(&bus, &Catalog::builtin(), &quick()).len(), 1);
    }

    #[test]
    fn failing_transport_is_skipped() {
        let bus = MockBus::new();
        bus.fail_enumeration(TransportKind::Hid);
        bus.add_device(BusNode::new(TransportKind::UsbBulk, "usb:1-1").with_ids(bulk::VENDOR_ID, bulk::PRODUCT_ID));
        assert_eq!(scan(&bus, &Catalog::builtin(), &quick()).len(), 1);
    }

    #[test]
    fn empty_bus_is_empty_list() {
        assert!(scan(&MockBus::new(), &Catalog::builtin(), &quick()).is_empty());
    }

    #[test]
    fn sleeping_serial_bridge_found_after_wake() {
        let bus = MockBus::new();
        bus.add_sleeping_serial("/dev/ttyUSB0", serial::VENDOR_ID, serial::PRODUCT_ID, 2);
        let found = scan(&bus, &Catalog::builtin(), &quick());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].vid_pid(), Some((serial::VENDOR_ID, serial::PRODUCT_ID)));
        assert_eq!(bus.wake_log().len(), 3);
    }

    #[test]
    fn wake_gives_up_after_attempts() {
        let bus = MockBus::new();
        bus.add_sleeping_serial("/dev/ttyUSB0", serial::VENDOR_ID, serial::PRODUCT_ID, 10);
        assert!(scan(&bus, &Catalog::builtin(), &quick()).is_empty());
        assert_eq!(bus.wake_log().len(), 3);
    }

    #[test]
    fn wake_disabled_leaves_bridge_asleep() {
        let bus = MockBus::new();
        bus.add_sleeping_serial("/dev/ttyUSB0", serial::VENDOR_ID, serial::PRODUCT_ID, 0);
        let options = DiscoveryOptions {
            serial_wake: false,
            ..quick()
        };
        assert!(scan(&bus, &Catalog::builtin(), &options).is_empty());
        assert!(bus.wake_log().is_empty());
    }

    #[test]
    fn permission_denied_is_reported() {
        let bus = MockBus::new();
        let mut node = BusNode::new(TransportKind::Hid, "/dev/hidraw2")
            .with_ids(hid::LANDSCAPE_VENDOR_ID, hid::LANDSCAPE_PRODUCT_ID);
        node.permission_denied = true;
        bus.add_device(node);
        let found = scan(&bus, &Catalog::builtin(), &quick());
        assert!(found[0].permission_denied);
        assert_eq!(found[0].model.map(|m| m.id), Some(ModelId::HidLandscape320));
    }

    /// Host bus over a fixture tree that records wakes instead of opening ports.
    #[cfg(target_os = "linux")]
    struct FixtureBus {
        inner: panelstream_transport::SystemBus,
        woken: parking_lot::Mutex<Vec<String>>,
    }

    #[cfg(target_os = "linux")]
    impl DeviceBus for FixtureBus {
        fn enumerate(&self, kind: TransportKind) -> panelstream_errors::DeviceResult<Vec<BusNode>> {
            self.inner.enumerate(kind)
        }

        fn wake_serial(&self, location: &str, _baud: u32) -> panelstream_errors::DeviceResult<()> {
            self.woken.lock().push(location.to_owned());
            Ok(())
        }

        fn open(
            &self,
            kind: TransportKind,
            location: &str,
        ) -> panelstream_errors::DeviceResult<panelstream_transport::PanelTransport> {
            self.inner.open(kind, location)
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn host_serial_node_without_ids_is_woken() -> Result<(), std::io::Error> {
        use panelstream_transport::SystemBus;
        use panelstream_transport::sysfs::SysfsScanner;

        let tmp = tempfile::tempdir()?;
        let sys = tmp.path().join("sys");
        let dev = tmp.path().join("dev");
        std::fs::create_dir_all(sys.join("class/tty/ttyUSB0"))?;
        std::fs::create_dir_all(&dev)?;
        std::fs::write(dev.join("ttyUSB0"), b"")?;

        let bus = FixtureBus {
            inner: SystemBus::new().with_sysfs(SysfsScanner::new(&sys, &dev)),
            woken: parking_lot::Mutex::new(Vec::new()),
        };
        let options = DiscoveryOptions {
            transports: vec![TransportKind::Serial],
            ..quick()
        };
        // Still asleep after the touch, so nothing is reported.
        assert!(scan(&bus, &Catalog::builtin(), &options).is_empty());
        let woken = bus.woken.lock().clone();
        assert_eq!(woken, [dev.join("ttyUSB0").to_string_lossy().into_owned()]);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_discovery_serialises() {
        let bus = MockBus::new();
        bus.add_device(BusNode::new(TransportKind::UsbBulk, "usb:1-1").with_ids(bulk::VENDOR_ID, bulk::PRODUCT_ID));
        let service = Arc::new(DiscoveryService::new(Arc::new(bus), quick()));
        let (a, b) = tokio::join!(service.discover(), service.discover());
        assert_eq!(a, b);
        assert_eq!(a.len(), 1);
    }
}
