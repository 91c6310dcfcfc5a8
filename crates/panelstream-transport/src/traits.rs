//! Transport capability interface and enumeration port.

use std::time::Duration;

use panelstream_catalog::TransportKind;
use panelstream_errors::{DeviceError, DeviceResult};

use crate::PanelTransport;

/// Data phase of a SCSI pass-through command.
#[derive(Debug)]
pub enum ScsiData<'a> {
    None,
    ToDevice(&'a [u8]),
    FromDevice(&'a mut [u8]),
}

impl ScsiData<'_> {
    pub fn len(&self) -> usize {
        match self {
            ScsiData::None => 0,
            ScsiData::ToDevice(b) => b.len(),
            ScsiData::FromDevice(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Byte-moving capability shared by every transport.
///
/// Every blocking call takes a timeout so a wedged device cannot hang the
/// calling thread.
pub trait Transport: Send {
    fn kind(&self) -> TransportKind;

    /// Location the transport was opened at.
    fn location(&self) -> &str;

    /// Write bytes, returning how many the device accepted.
    fn write(&mut self, data: &[u8], timeout: Duration) -> DeviceResult<usize>;

    /// Read into `buf`, returning the number of bytes received.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> DeviceResult<usize>;

    /// Issue a SCSI command with an optional data phase.
    ///
    /// Succeeds only if SCSI, host and driver status are all zero.
    fn scsi_command(
        &mut self,
        _cdb: &[u8],
        _data: ScsiData<'_>,
        _timeout: Duration,
    ) -> DeviceResult<()> {
        Err(DeviceError::unsupported(self.kind().as_str(), "scsi_command"))
    }

    /// Write all of `data` or fail with [`DeviceError::ShortWrite`].
    fn write_all(&mut self, data: &[u8], timeout: Duration) -> DeviceResult<()> {
        let written = self.write(data, timeout)?;
        if written != data.len() {
            return Err(DeviceError::ShortWrite {
                device: self.location().to_owned(),
                expected: data.len(),
                written,
            });
        }
        Ok(())
    }

    /// Release the device. Dropping also releases it.
    fn close(&mut self) -> DeviceResult<()> {
        Ok(())
    }
}

/// One node seen while enumerating a bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusNode {
    pub transport: TransportKind,
    /// Path or bus address that [`DeviceBus::open`] accepts.
    pub location: String,
    /// Stable identity used to collapse duplicates across scans.
    pub identity: String,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    /// Vendor string (SCSI INQUIRY vendor, USB manufacturer).
    pub vendor: Option<String>,
    pub product: Option<String>,
    /// Kernel driver bound to the node, where known.
    pub driver: Option<String>,
    /// Node exists but the current user cannot open it read/write.
    pub permission_denied: bool,
}

impl BusNode {
    pub fn new(transport: TransportKind, location: impl Into<String>) -> Self {
        let location = location.into();
        Self {
            transport,
            identity: location.clone(),
            location,
            vendor_id: None,
            product_id: None,
            vendor: None,
            product: None,
            driver: None,
            permission_denied: false,
        }
    }

    pub fn with_ids(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.vendor_id = Some(vendor_id);
        self.product_id = Some(product_id);
        self
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    pub fn vid_pid(&self) -> Option<(u16, u16)> {
        Some((self.vendor_id?, self.product_id?))
    }
}

/// Enumeration and open port over the host's device buses.
///
/// Enumeration never opens a device for writing.
pub trait DeviceBus: Send + Sync {
    /// List nodes reachable over `kind`.
    ///
    /// Unreadable individual nodes are skipped; only a failure of the whole
    /// enumeration mechanism is an error.
    fn enumerate(&self, kind: TransportKind) -> DeviceResult<Vec<BusNode>>;

    /// Open and immediately close a serial port to wake a sleeping bridge.
    fn wake_serial(&self, location: &str, baud: u32) -> DeviceResult<()>;

    /// Open a transport at a location returned by [`DeviceBus::enumerate`].
    fn open(&self, kind: TransportKind, location: &str) -> DeviceResult<PanelTransport>;
}
