//! Raw USB bulk transport over libusb.

use std::time::Duration;

use panelstream_catalog::TransportKind;
use panelstream_errors::{DeviceError, DeviceResult};
use rusb::{Device, DeviceHandle, Direction, GlobalContext, TransferType};
use tracing::{debug, warn};

use crate::os::{NodeAccess, check_access};
use crate::traits::{BusNode, Transport};

/// Location string for a USB device: `usb:<bus>-<port>[.<port>...]`.
///
/// Port paths survive re-enumeration, unlike device addresses.
pub fn usb_location(device: &Device<GlobalContext>) -> String {
    let bus = device.bus_number();
    match device.port_numbers() {
        Ok(ports) if !ports.is_empty() => {
            let path: Vec<String> = ports.iter().map(u8::to_string).collect();
            format!("usb:{bus}-{}", path.join("."))
        }
        _ => format!("usb:{bus}:{}", device.address()),
    }
}

pub(crate) fn map_usb_error(location: &str, err: rusb::Error, timeout: Duration) -> DeviceError {
    match err {
        rusb::Error::Timeout => DeviceError::timeout(location, timeout.as_millis() as u64),
        rusb::Error::NoDevice => DeviceError::disconnected(location),
        rusb::Error::NotFound => DeviceError::not_found(location),
        rusb::Error::Access => DeviceError::permission_denied(location),
        rusb::Error::Busy => DeviceError::Busy(location.to_owned()),
        other => DeviceError::io(location, other.to_string()),
    }
}

/// List every USB device on the host.
pub(crate) fn enumerate() -> DeviceResult<Vec<BusNode>> {
    let devices = rusb::devices().map_err(|e| DeviceError::io("usb", e.to_string()))?;
    let mut nodes = Vec::new();
    for device in devices.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(d) => d,
            Err(e) => {
                debug!(bus = device.bus_number(), address = device.address(), error = %e, "Skipping USB device without descriptor");
                continue;
            }
        };
        let (vid, pid) = (descriptor.vendor_id(), descriptor.product_id());
        let location = usb_location(&device);
        let dev_node = format!(
            "/dev/bus/usb/{:03}/{:03}",
            device.bus_number(),
            device.address()
        );
        let permission_denied = matches!(
            check_access(std::path::Path::new(&dev_node)),
            NodeAccess::Denied
        );
        nodes.push(
            BusNode {
                permission_denied,
                ..BusNode::new(TransportKind::UsbBulk, location.clone())
            }
            .with_ids(vid, pid)
            .with_identity(format!("{vid:04x}:{pid:04x}@{location}")),
        );
    }
    Ok(nodes)
}

/// Bulk endpoint pair of a claimed interface.
#[derive(Debug, Clone, Copy)]
struct BulkEndpoints {
    interface: u8,
    out_ep: u8,
    in_ep: Option<u8>,
}

fn find_bulk_endpoints(device: &Device<GlobalContext>) -> Option<BulkEndpoints> {
    let config = device
        .active_config_descriptor()
        .or_else(|_| device.config_descriptor(0))
        .ok()?;
    for interface in config.interfaces() {
        for alt in interface.descriptors() {
            let mut out_ep = None;
            let mut in_ep = None;
            for ep in alt.endpoint_descriptors() {
                if ep.transfer_type() != TransferType::Bulk {
                    continue;
                }
                match ep.direction() {
                    Direction::Out if out_ep.is_none() => out_ep = Some(ep.address()),
                    Direction::In if in_ep.is_none() => in_ep = Some(ep.address()),
                    _ => {}
                }
            }
            if let Some(out_ep) = out_ep {
                return Some(BulkEndpoints {
                    interface: alt.interface_number(),
                    out_ep,
                    in_ep,
                });
            }
        }
    }
    None
}

/// Claimed bulk interface of one USB device.
pub struct UsbBulkTransport {
    handle: DeviceHandle<GlobalContext>,
    location: String,
    endpoints: BulkEndpoints,
    claimed: bool,
}

impl std::fmt::Debug for UsbBulkTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsbBulkTransport")
            .field("location", &self.location)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

impl UsbBulkTransport {
    /// Open the device at `location` and claim its first bulk interface.
    pub fn open(location: &str) -> DeviceResult<Self> {
        let open_timeout = Duration::ZERO;
        let devices =
            rusb::devices().map_err(|e| map_usb_error(location, e, open_timeout))?;
        let device = devices
            .iter()
            .find(|d| usb_location(d) == location)
            .ok_or_else(|| DeviceError::not_found(location))?;

        let endpoints = find_bulk_endpoints(&device).ok_or_else(|| {
            DeviceError::open_failed(location, "no bulk OUT endpoint on any interface")
        })?;

        let mut handle = device
            .open()
            .map_err(|e| map_usb_error(location, e, open_timeout))?;
        if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
            debug!(location, error = %e, "Kernel driver auto-detach unavailable");
        }
        handle
            .claim_interface(endpoints.interface)
            .map_err(|e| map_usb_error(location, e, open_timeout))?;

        debug!(
            location,
            interface = endpoints.interface,
            out_ep = endpoints.out_ep,
            "Opened USB bulk transport"
        );
        Ok(Self {
            handle,
            location: location.to_owned(),
            endpoints,
            claimed: true,
        })
    }
}

impl Transport for UsbBulkTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::UsbBulk
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn write(&mut self, data: &[u8], timeout: Duration) -> DeviceResult<usize> {
        self.handle
            .write_bulk(self.endpoints.out_ep, data, timeout)
            .map_err(|e| map_usb_error(&self.location, e, timeout))
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> DeviceResult<usize> {
        let Some(in_ep) = self.endpoints.in_ep else {
            return Err(DeviceError::unsupported("usb-bulk", "read without IN endpoint"));
        };
        self.handle
            .read_bulk(in_ep, buf, timeout)
            .map_err(|e| map_usb_error(&self.location, e, timeout))
    }

    fn close(&mut self) -> DeviceResult<()> {
        if self.claimed {
            self.claimed = false;
            self.handle
                .release_interface(self.endpoints.interface)
                .map_err(|e| map_usb_error(&self.location, e, Duration::ZERO))?;
        }
        Ok(())
    }
}

impl Drop for UsbBulkTransport {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(location = %self.location, error = %e, "Failed to release USB interface");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usb_errors_map_onto_device_taxonomy() {
        let t = Duration::from_millis(250);
        assert_eq!(
            map_usb_error("usb:1-2", rusb::Error::Timeout, t),
            DeviceError::timeout("usb:1-2", 250)
        );
        assert!(map_usb_error("usb:1-2", rusb::Error::NoDevice, t).is_device_unavailable());
        assert!(matches!(
            map_usb_error("usb:1-2", rusb::Error::Access, t),
            DeviceError::PermissionDenied(_)
        ));
        assert!(map_usb_error("usb:1-2", rusb::Error::Pipe, t).is_retryable());
    }
}
