//! HID report transport over hidapi.

use std::ffi::CString;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::time::{Duration, Instant};

use hidapi::{HidApi, HidDevice, HidError};
use panelstream_catalog::TransportKind;
use panelstream_errors::{DeviceError, DeviceResult};
use parking_lot::Mutex;
use tracing::debug;

use crate::os::{NodeAccess, check_access};
use crate::traits::{BusNode, Transport};

/// hidapi enumeration and open are not re-entrant on every backend.
static HIDAPI_LOCK: Mutex<()> = Mutex::new(());

pub(crate) fn map_hid_error(location: &str, err: &HidError) -> DeviceError {
    match err {
        HidError::IoError { error } => DeviceError::from_io(location, error),
        HidError::HidApiError { message } => {
            let lower = message.to_ascii_lowercase();
            if lower.contains("permission denied") {
                DeviceError::permission_denied(location)
            } else if lower.contains("no such device") || lower.contains("not found") {
                DeviceError::disconnected(location)
            } else {
                DeviceError::io(location, message.clone())
            }
        }
        other => DeviceError::io(location, other.to_string()),
    }
}

fn init_api() -> DeviceResult<HidApi> {
    HidApi::new().map_err(|e| DeviceError::io("hidapi", e.to_string()))
}

/// List every HID interface on the host.
pub(crate) fn enumerate() -> DeviceResult<Vec<BusNode>> {
    let _guard = HIDAPI_LOCK.lock();
    let api = init_api()?;
    let mut nodes = Vec::new();
    for info in api.device_list() {
        let Ok(path) = info.path().to_str() else {
            debug!(path = ?info.path(), "Skipping HID device with non-UTF-8 path");
            continue;
        };
        let (vid, pid) = (info.vendor_id(), info.product_id());
        let identity = match info.serial_number() {
            Some(serial) if !serial.is_empty() => format!("{vid:04x}:{pid:04x}#{serial}"),
            _ => format!("{vid:04x}:{pid:04x}@{path}"),
        };
        let permission_denied = path.starts_with("/dev/")
            && matches!(check_access(std::path::Path::new(path)), NodeAccess::Denied);

        let mut node = BusNode::new(TransportKind::Hid, path)
            .with_ids(vid, pid)
            .with_identity(identity);
        node.vendor = info.manufacturer_string().map(str::to_owned);
        node.product = info.product_string().map(str::to_owned);
        node.permission_denied = permission_denied;
        nodes.push(node);
    }
    Ok(nodes)
}

/// Pause between attempts while a non-blocking write is refused.
const WRITE_RETRY_BACKOFF: Duration = Duration::from_millis(1);

/// Retry a non-blocking write until the device accepts it or `timeout`
/// passes.
pub(crate) fn write_before_deadline<W: Write>(
    writer: &mut W,
    data: &[u8],
    timeout: Duration,
    location: &str,
) -> DeviceResult<usize> {
    let deadline = Instant::now() + timeout;
    loop {
        match writer.write(data) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                    return Err(DeviceError::timeout(location, ms));
                }
                std::thread::sleep(WRITE_RETRY_BACKOFF);
            }
            Err(e) => return Err(DeviceError::from_io(location, &e)),
        }
    }
}

/// Second handle on a hidraw node, opened `O_NONBLOCK` for writes.
#[cfg(target_os = "linux")]
fn open_raw_writer(location: &str) -> Option<File> {
    use std::fs::OpenOptions;
    use std::os::unix::fs::OpenOptionsExt;

    if !location.starts_with("/dev/hidraw") {
        return None;
    }
    match OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(location)
    {
        Ok(file) => Some(file),
        Err(e) => {
            debug!(location, error = %e, "No non-blocking hidraw handle, writes go through hidapi");
            None
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn open_raw_writer(_location: &str) -> Option<File> {
    None
}

/// Open HID interface exchanging fixed-size reports.
///
/// On Linux, report writes go through a non-blocking hidraw handle and are
/// bounded by the caller's timeout. Elsewhere hidapi writes directly; the
/// Windows backend bounds them internally.
pub struct HidTransport {
    device: HidDevice,
    raw_writer: Option<File>,
    location: String,
}

impl std::fmt::Debug for HidTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HidTransport")
            .field("location", &self.location)
            .finish()
    }
}

impl HidTransport {
    pub fn open(location: &str) -> DeviceResult<Self> {
        let path = CString::new(location)
            .map_err(|e| DeviceError::open_failed(location, e.to_string()))?;
        let _guard = HIDAPI_LOCK.lock();
        let api = init_api()?;
        let device = api
            .open_path(&path)
            .map_err(|e| map_hid_error(location, &e))?;
        let raw_writer = open_raw_writer(location);
        debug!(location, nonblocking = raw_writer.is_some(), "Opened HID transport");
        Ok(Self {
            device,
            raw_writer,
            location: location.to_owned(),
        })
    }
}

impl Transport for HidTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Hid
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn write(&mut self, data: &[u8], timeout: Duration) -> DeviceResult<usize> {
        match self.raw_writer.as_mut() {
            Some(file) => write_before_deadline(file, data, timeout, &self.location),
            None => self
                .device
                .write(data)
                .map_err(|e| map_hid_error(&self.location, &e)),
        }
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> DeviceResult<usize> {
        let ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let n = self
            .device
            .read_timeout(buf, ms)
            .map_err(|e| map_hid_error(&self.location, &e))?;
        if n == 0 {
            return Err(DeviceError::timeout(&self.location, u64::from(ms.unsigned_abs())));
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Refuses `refusals` writes with `WouldBlock`, then accepts everything.
    struct BackedUpWriter {
        refusals: usize,
        attempts: usize,
    }

    impl Write for BackedUpWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.attempts += 1;
            if self.refusals > 0 {
                self.refusals -= 1;
                return Err(ErrorKind::WouldBlock.into());
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn wedged_device_write_times_out() {
        let mut writer = BackedUpWriter {
            refusals: usize::MAX,
            attempts: 0,
        };
        let started = Instant::now();
        let result = write_before_deadline(&mut writer, &[0; 513], Duration::from_millis(20), "/dev/hidraw4");
        assert!(matches!(
            result,
            Err(DeviceError::Timeout { ref device, timeout_ms: 20 }) if device == "/dev/hidraw4"
        ));
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(writer.attempts > 1);
    }

    #[test]
    fn write_retries_until_accepted() -> DeviceResult<()> {
        let mut writer = BackedUpWriter {
            refusals: 3,
            attempts: 0,
        };
        let n = write_before_deadline(&mut writer, &[0; 513], Duration::from_secs(1), "/dev/hidraw4")?;
        assert_eq!(n, 513);
        assert_eq!(writer.attempts, 4);
        Ok(())
    }

    #[test]
    fn hard_write_error_is_not_retried() {
        struct Unplugged;
        impl Write for Unplugged {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(ErrorKind::BrokenPipe.into())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let result = write_before_deadline(&mut Unplugged, &[0; 8], Duration::from_secs(5), "/dev/hidraw4");
        assert!(matches!(result, Err(e) if e.is_device_unavailable()));
    }

    #[test]
    fn hidapi_messages_are_classified() {
        let denied = HidError::HidApiError {
            message: "Permission denied".into(),
        };
        assert!(matches!(
            map_hid_error("/dev/hidraw2", &denied),
            DeviceError::PermissionDenied(_)
        ));
        let gone = HidError::HidApiError {
            message: "No such device".into(),
        };
        assert!(map_hid_error("/dev/hidraw2", &gone).is_device_unavailable());
    }
}
