//! Linux sysfs walking for serial and SCSI generic nodes.
//!
//! Both node kinds are found under `/sys/class/<subsystem>/<name>`. The owning
//! USB device is located by ascending from the node's `device` link until a
//! directory carrying `idVendor` and `idProduct` is reached.

use std::fs;
use std::path::{Path, PathBuf};

use panelstream_catalog::TransportKind;
use tracing::{debug, warn};

use crate::os::{NodeAccess, check_access};
use crate::traits::BusNode;

/// Kernel drivers backing USB-serial and CDC-ACM ttys.
pub const SERIAL_DRIVERS: &[&str] = &["ch341-uart", "ch341", "cp210x", "ftdi_sio", "pl2303", "cdc_acm"];

/// sysfs and /dev roots; overridable so scans can run against a fixture tree.
#[derive(Debug, Clone)]
pub struct SysfsScanner {
    sys_root: PathBuf,
    dev_root: PathBuf,
}

impl Default for SysfsScanner {
    fn default() -> Self {
        Self::new("/sys", "/dev")
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    let s = fs::read_to_string(path).ok()?;
    let s = s.trim();
    if s.is_empty() { None } else { Some(s.to_owned()) }
}

fn read_hex_u16(path: &Path) -> Option<u16> {
    u16::from_str_radix(&read_trimmed(path)?, 16).ok()
}

/// USB identity found by ascending the device tree.
#[derive(Debug, Clone, PartialEq, Eq)]
struct UsbAncestor {
    vendor_id: u16,
    product_id: u16,
    serial: Option<String>,
    devpath: String,
}

fn find_usb_ancestor(start: &Path) -> Option<UsbAncestor> {
    let mut dir = fs::canonicalize(start).ok()?;
    loop {
        let vendor = dir.join("idVendor");
        let product = dir.join("idProduct");
        if vendor.is_file() && product.is_file() {
            return Some(UsbAncestor {
                vendor_id: read_hex_u16(&vendor)?,
                product_id: read_hex_u16(&product)?,
                serial: read_trimmed(&dir.join("serial")),
                devpath: dir.file_name()?.to_string_lossy().into_owned(),
            });
        }
        if !dir.pop() {
            return None;
        }
    }
}

fn link_name(path: &Path) -> Option<String> {
    let target = fs::read_link(path).ok()?;
    Some(target.file_name()?.to_string_lossy().into_owned())
}

/// `ttyUSBn` and `ttyACMn`: names the kernel gives USB-serial and CDC-ACM ports.
fn is_usb_tty_name(name: &str) -> bool {
    ["ttyUSB", "ttyACM"]
        .iter()
        .any(|prefix| name.strip_prefix(prefix).is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit())))
}

/// Index of an `sgN` node name.
fn sg_index(name: &str) -> Option<u32> {
    name.strip_prefix("sg")?.parse().ok()
}

impl SysfsScanner {
    pub fn new(sys_root: impl Into<PathBuf>, dev_root: impl Into<PathBuf>) -> Self {
        Self {
            sys_root: sys_root.into(),
            dev_root: dev_root.into(),
        }
    }

    fn class_entries(&self, class: &str) -> Vec<String> {
        let dir = self.sys_root.join("class").join(class);
        match fs::read_dir(&dir) {
            Ok(entries) => entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "sysfs class directory unavailable");
                Vec::new()
            }
        }
    }

    /// Resolve `/dev/<name>` and drop it if the node is missing.
    fn dev_node(&self, name: &str) -> Option<(String, bool)> {
        let path = self.dev_root.join(name);
        match check_access(&path) {
            NodeAccess::Missing => {
                debug!(node = %path.display(), "Device node missing, skipping");
                None
            }
            NodeAccess::Denied => {
                warn!(
                    node = %path.display(),
                    "Device node not accessible; install a udev rule granting read/write access"
                );
                Some((path.to_string_lossy().into_owned(), true))
            }
            NodeAccess::Accessible => Some((path.to_string_lossy().into_owned(), false)),
        }
    }

    /// TTY nodes bound to a USB-serial or CDC-ACM driver, or named like one.
    ///
    /// A bridge that has not enumerated fully yet has no driver link or no
    /// readable USB ancestor. It is still listed, without ids, so discovery
    /// can wake it.
    pub fn serial_nodes(&self) -> Vec<BusNode> {
        let mut names = self.class_entries("tty");
        names.sort();
        let mut nodes = Vec::new();
        for name in names {
            let device = self.sys_root.join("class/tty").join(&name).join("device");
            let driver = link_name(&device.join("driver"));
            let bound = driver
                .as_deref()
                .is_some_and(|d| SERIAL_DRIVERS.contains(&d));
            if !bound && !is_usb_tty_name(&name) {
                continue;
            }
            let Some((location, permission_denied)) = self.dev_node(&name) else {
                continue;
            };
            let mut node = match find_usb_ancestor(&device) {
                Some(usb) => {
                    let identity = match &usb.serial {
                        Some(serial) => format!("{:04x}:{:04x}#{serial}", usb.vendor_id, usb.product_id),
                        None => format!("{:04x}:{:04x}@{}", usb.vendor_id, usb.product_id, usb.devpath),
                    };
                    BusNode::new(TransportKind::Serial, location)
                        .with_ids(usb.vendor_id, usb.product_id)
                        .with_identity(identity)
                }
                None => {
                    debug!(tty = %name, driver = ?driver, "Serial node without USB ids, listed for wake");
                    BusNode::new(TransportKind::Serial, location).with_identity(format!("tty@{name}"))
                }
            };
            if let Some(driver) = driver {
                node = node.with_driver(driver);
            }
            node.permission_denied = permission_denied;
            nodes.push(node);
        }
        nodes
    }

    /// The first `limit` SCSI generic nodes, with INQUIRY vendor/model strings.
    pub fn scsi_nodes(&self, limit: usize) -> Vec<BusNode> {
        let mut names: Vec<(u32, String)> = self
            .class_entries("scsi_generic")
            .into_iter()
            .filter_map(|n| Some((sg_index(&n)?, n)))
            .collect();
        names.sort();

        let mut nodes = Vec::new();
        for (_, name) in names.into_iter().take(limit) {
            let device = self
                .sys_root
                .join("class/scsi_generic")
                .join(&name)
                .join("device");
            let Some(vendor) = read_trimmed(&device.join("vendor")) else {
                debug!(node = %name, "SCSI node without vendor string, skipping");
                continue;
            };
            let Some((location, permission_denied)) = self.dev_node(&name) else {
                continue;
            };
            let usb = find_usb_ancestor(&device);
            let identity = match &usb {
                Some(u) => match &u.serial {
                    Some(serial) => format!("{:04x}:{:04x}#{serial}", u.vendor_id, u.product_id),
                    None => format!("{:04x}:{:04x}@{}", u.vendor_id, u.product_id, u.devpath),
                },
                None => format!("scsi:{vendor}@{name}"),
            };
            let mut node = BusNode::new(TransportKind::Scsi, location)
                .with_identity(identity)
                .with_vendor(vendor);
            node.product = read_trimmed(&device.join("model"));
            node.permission_denied = permission_denied;
            if let Some(u) = usb {
                node = node.with_ids(u.vendor_id, u.product_id);
            }
            nodes.push(node);
        }
        nodes
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    /// Build a fixture: usb device dir with ids, child interface dir, and a
    /// class entry whose `device` link points at the interface.
    fn usb_device(root: &Path, devpath: &str, vid: &str, pid: &str) -> std::io::Result<PathBuf> {
        let dev = root.join("devices/pci0000:00/usb1").join(devpath);
        fs::create_dir_all(&dev)?;
        fs::write(dev.join("idVendor"), format!("{vid}\n"))?;
        fs::write(dev.join("idProduct"), format!("{pid}\n"))?;
        let iface = dev.join(format!("{devpath}:1.0"));
        fs::create_dir_all(&iface)?;
        Ok(iface)
    }

    #[test]
    fn serial_scan_filters_by_driver_and_reads_ids() -> TestResult {
        let tmp = tempfile::tempdir()?;
        let sys = tmp.path().join("sys");
        let dev = tmp.path().join("dev");
        fs::create_dir_all(&dev)?;

        let iface = usb_device(&sys, "1-3", "1a86", "5722")?;
        let drivers = sys.join("bus/usb-serial/drivers/ch341-uart");
        fs::create_dir_all(&drivers)?;
        let tty_dev = iface.join("ttyUSB0");
        fs::create_dir_all(&tty_dev)?;
        symlink(&drivers, tty_dev.join("driver"))?;
        fs::create_dir_all(sys.join("class/tty/ttyUSB0"))?;
        symlink(&tty_dev, sys.join("class/tty/ttyUSB0/device"))?;
        fs::write(dev.join("ttyUSB0"), b"")?;

        // A console tty without a driver link is ignored.
        fs::create_dir_all(sys.join("class/tty/tty0"))?;

        let nodes = SysfsScanner::new(&sys, &dev).serial_nodes();
        assert_eq!(nodes.len(), 1);
        let node = &nodes[0];
        assert_eq!(node.vid_pid(), Some((0x1A86, 0x5722)));
        assert_eq!(node.driver.as_deref(), Some("ch341-uart"));
        assert!(node.location.ends_with("ttyUSB0"));
        assert_eq!(node.identity, "1a86:5722@1-3");
        assert!(!node.permission_denied);
        Ok(())
    }

    #[test]
    fn unbound_usb_tty_is_listed_without_ids() -> TestResult {
        let tmp = tempfile::tempdir()?;
        let sys = tmp.path().join("sys");
        let dev = tmp.path().join("dev");
        fs::create_dir_all(&dev)?;

        // Bridge still asleep: class entry and device node, nothing else.
        fs::create_dir_all(sys.join("class/tty/ttyUSB1"))?;
        fs::write(dev.join("ttyUSB1"), b"")?;
        // Platform UART and console stay out.
        fs::create_dir_all(sys.join("class/tty/ttyS0"))?;
        fs::write(dev.join("ttyS0"), b"")?;
        fs::create_dir_all(sys.join("class/tty/tty0"))?;

        let nodes = SysfsScanner::new(&sys, &dev).serial_nodes();
        assert_eq!(nodes.len(), 1);
        let node = &nodes[0];
        assert!(node.location.ends_with("ttyUSB1"));
        assert_eq!(node.vid_pid(), None);
        assert_eq!(node.driver, None);
        assert_eq!(node.identity, "tty@ttyUSB1");
        Ok(())
    }

    #[test]
    fn usb_tty_names() {
        assert!(is_usb_tty_name("ttyUSB0"));
        assert!(is_usb_tty_name("ttyACM12"));
        assert!(!is_usb_tty_name("ttyUSB"));
        assert!(!is_usb_tty_name("ttyS0"));
        assert!(!is_usb_tty_name("ttyUSBx"));
    }

    #[test]
    fn scsi_scan_reads_vendor_and_respects_limit() -> TestResult {
        let tmp = tempfile::tempdir()?;
        let sys = tmp.path().join("sys");
        let dev = tmp.path().join("dev");
        fs::create_dir_all(&dev)?;

        for (i, vendor) in ["ATA     ", "USBLCD  ", "USBLCD  "].iter().enumerate() {
            let name = format!("sg{i}");
            let iface = usb_device(&sys, &format!("2-{i}"), "0402", "3922")?;
            let scsi_dev = iface.join(format!("host{i}/target/{i}:0:0:0"));
            fs::create_dir_all(&scsi_dev)?;
            fs::write(scsi_dev.join("vendor"), vendor)?;
            fs::write(scsi_dev.join("model"), "LCD DISPLAY\n")?;
            fs::create_dir_all(sys.join("class/scsi_generic").join(&name))?;
            symlink(&scsi_dev, sys.join("class/scsi_generic").join(&name).join("device"))?;
            fs::write(dev.join(&name), b"")?;
        }

        let scanner = SysfsScanner::new(&sys, &dev);
        let nodes = scanner.scsi_nodes(2);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].vendor.as_deref(), Some("ATA"));
        assert_eq!(nodes[1].vendor.as_deref(), Some("USBLCD"));
        assert_eq!(nodes[1].product.as_deref(), Some("LCD DISPLAY"));
        assert_eq!(nodes[1].vid_pid(), Some((0x0402, 0x3922)));
        assert_eq!(scanner.scsi_nodes(16).len(), 3);
        Ok(())
    }

    #[test]
    fn missing_dev_node_is_skipped() -> TestResult {
        let tmp = tempfile::tempdir()?;
        let sys = tmp.path().join("sys");
        let iface = usb_device(&sys, "3-1", "0402", "3922")?;
        fs::write(iface.join("vendor"), "USBLCD")?;
        fs::create_dir_all(sys.join("class/scsi_generic/sg0"))?;
        symlink(&iface, sys.join("class/scsi_generic/sg0/device"))?;

        let nodes = SysfsScanner::new(&sys, tmp.path().join("dev")).scsi_nodes(8);
        assert!(nodes.is_empty());
        Ok(())
    }

    #[test]
    fn sg_index_parses_node_names() {
        assert_eq!(sg_index("sg12"), Some(12));
        assert_eq!(sg_index("sgx"), None);
        assert_eq!(sg_index("ttyUSB0"), None);
    }
}
