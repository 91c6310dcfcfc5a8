//! Closed set of transport variants.

use std::time::Duration;

use panelstream_catalog::TransportKind;
use panelstream_errors::DeviceResult;

use crate::hid::HidTransport;
use crate::mock::MockTransport;
use crate::scsi::ScsiTransport;
use crate::serial::SerialTransport;
use crate::traits::{ScsiData, Transport};
use crate::usb::UsbBulkTransport;

/// Any transport a panel session can own.
#[derive(Debug)]
pub enum PanelTransport {
    UsbBulk(UsbBulkTransport),
    Hid(HidTransport),
    Serial(SerialTransport),
    Scsi(ScsiTransport),
    Mock(MockTransport),
}

macro_rules! dispatch {
    ($self:ident, $t:ident => $body:expr) => {
        match $self {
            PanelTransport::UsbBulk($t) => $body,
            PanelTransport::Hid($t) => $body,
            PanelTransport::Serial($t) => $body,
            PanelTransport::Scsi($t) => $body,
            PanelTransport::Mock($t) => $body,
        }
    };
}

impl Transport for PanelTransport {
    fn kind(&self) -> TransportKind {
        dispatch!(self, t => t.kind())
    }

    fn location(&self) -> &str {
        dispatch!(self, t => t.location())
    }

    fn write(&mut self, data: &[u8], timeout: Duration) -> DeviceResult<usize> {
        dispatch!(self, t => t.write(data, timeout))
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> DeviceResult<usize> {
        dispatch!(self, t => t.read(buf, timeout))
    }

    fn scsi_command(
        &mut self,
        cdb: &[u8],
        data: ScsiData<'_>,
        timeout: Duration,
    ) -> DeviceResult<()> {
        dispatch!(self, t => t.scsi_command(cdb, data, timeout))
    }

    fn close(&mut self) -> DeviceResult<()> {
        dispatch!(self, t => t.close())
    }
}

impl From<MockTransport> for PanelTransport {
    fn from(t: MockTransport) -> Self {
        PanelTransport::Mock(t)
    }
}
