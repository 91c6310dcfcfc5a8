//! Transports for USB, HID, serial and SCSI-attached LCD panels.
//!
//! Every transport implements [`Transport`]: open/close plus bounded-time
//! `write`/`read`, and `scsi_command` for SCSI generic nodes. A session owns
//! exactly one [`PanelTransport`], the closed set of variants.
//!
//! Enumeration goes through the [`DeviceBus`] port. [`SystemBus`] walks the
//! host (libusb, hidapi, sysfs); [`mock::MockBus`] simulates a bus in memory.
//!
//! # Permissions
//!
//! Non-root access to `/dev/bus/usb`, `/dev/hidraw*`, `/dev/tty*` and
//! `/dev/sg*` needs udev rules for each panel family. A missing rule surfaces
//! as [`panelstream_errors::DeviceError::PermissionDenied`] on open and as
//! [`BusNode::permission_denied`] during enumeration.

pub mod hid;
pub mod mock;
pub mod os;
pub mod panel;
pub mod scsi;
pub mod serial;
pub mod sysfs;
pub mod system;
pub mod traits;
pub mod usb;

pub use panel::PanelTransport;
pub use system::SystemBus;
pub use traits::{BusNode, DeviceBus, ScsiData, Transport};
