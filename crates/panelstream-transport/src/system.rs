//! Device bus backed by the host OS.

use panelstream_catalog::TransportKind;
use panelstream_catalog::ids::serial::BAUD_RATE;
use panelstream_errors::DeviceResult;

use crate::hid::{self, HidTransport};
use crate::scsi::ScsiTransport;
use crate::serial::{self, SerialTransport};
use crate::sysfs::SysfsScanner;
use crate::traits::{BusNode, DeviceBus};
use crate::usb::{self, UsbBulkTransport};
use crate::PanelTransport;

/// Default number of `/dev/sg*` nodes inspected.
pub const DEFAULT_SCSI_NODE_LIMIT: usize = 16;

/// Real USB, HID, serial and SCSI generic enumeration.
#[derive(Debug, Clone)]
pub struct SystemBus {
    sysfs: SysfsScanner,
    scsi_node_limit: usize,
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBus {
    pub fn new() -> Self {
        Self {
            sysfs: SysfsScanner::default(),
            scsi_node_limit: DEFAULT_SCSI_NODE_LIMIT,
        }
    }

    pub fn with_scsi_node_limit(mut self, limit: usize) -> Self {
        self.scsi_node_limit = limit;
        self
    }

    /// Scan a different sysfs and /dev tree.
    pub fn with_sysfs(mut self, sysfs: SysfsScanner) -> Self {
        self.sysfs = sysfs;
        self
    }

    #[cfg(target_os = "linux")]
    fn serial_nodes(&self) -> DeviceResult<Vec<BusNode>> {
        Ok(self.sysfs.serial_nodes())
    }

    #[cfg(not(target_os = "linux"))]
    fn serial_nodes(&self) -> DeviceResult<Vec<BusNode>> {
        use panelstream_errors::DeviceError;

        let ports = serialport::available_ports()
            .map_err(|e| DeviceError::io("serial", e.to_string()))?;
        Ok(ports
            .into_iter()
            .filter_map(|p| match p.port_type {
                serialport::SerialPortType::UsbPort(usb) => {
                    let identity = match &usb.serial_number {
                        Some(s) => format!("{:04x}:{:04x}#{s}", usb.vid, usb.pid),
                        None => format!("{:04x}:{:04x}@{}", usb.vid, usb.pid, p.port_name),
                    };
                    Some(
                        BusNode::new(TransportKind::Serial, p.port_name)
                            .with_ids(usb.vid, usb.pid)
                            .with_identity(identity),
                    )
                }
                _ => None,
            })
            .collect())
    }

    #[cfg(target_os = "linux")]
    fn scsi_nodes(&self) -> DeviceResult<Vec<BusNode>> {
        Ok(self.sysfs.scsi_nodes(self.scsi_node_limit))
    }

    #[cfg(not(target_os = "linux"))]
    fn scsi_nodes(&self) -> DeviceResult<Vec<BusNode>> {
        Ok(Vec::new())
    }
}

impl DeviceBus for SystemBus {
    fn enumerate(&self, kind: TransportKind) -> DeviceResult<Vec<BusNode>> {
        match kind {
            TransportKind::UsbBulk => usb::enumerate(),
            TransportKind::Hid => hid::enumerate(),
            TransportKind::Serial => self.serial_nodes(),
            TransportKind::Scsi => self.scsi_nodes(),
        }
    }

    fn wake_serial(&self, location: &str, baud: u32) -> DeviceResult<()> {
        serial::wake(location, baud)
    }

    fn open(&self, kind: TransportKind, location: &str) -> DeviceResult<PanelTransport> {
        Ok(match kind {
            TransportKind::UsbBulk => PanelTransport::UsbBulk(UsbBulkTransport::open(location)?),
            TransportKind::Hid => PanelTransport::Hid(HidTransport::open(location)?),
            TransportKind::Serial => {
                PanelTransport::Serial(SerialTransport::open(location, BAUD_RATE)?)
            }
            TransportKind::Scsi => PanelTransport::Scsi(ScsiTransport::open(location)?),
        })
    }
}
