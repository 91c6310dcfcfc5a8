//! Serial transport for panels behind USB-serial bridges.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use panelstream_catalog::TransportKind;
use panelstream_errors::{DeviceError, DeviceResult};
use serialport::SerialPort;
use tracing::debug;

use crate::traits::Transport;

/// Timeout applied while opening a port.
const OPEN_TIMEOUT: Duration = Duration::from_millis(1000);

pub(crate) fn map_serial_error(location: &str, err: &serialport::Error) -> DeviceError {
    match err.kind() {
        serialport::ErrorKind::NoDevice => DeviceError::not_found(location),
        serialport::ErrorKind::Io(kind) => {
            DeviceError::from_io(location, &std::io::Error::new(kind, err.description.clone()))
        }
        _ => DeviceError::open_failed(location, err.description.clone()),
    }
}

fn open_port(location: &str, baud: u32) -> DeviceResult<Box<dyn SerialPort>> {
    serialport::new(location, baud)
        .timeout(OPEN_TIMEOUT)
        .open()
        .map_err(|e| map_serial_error(location, &e))
}

/// Open and immediately close a port so a sleeping bridge announces itself.
pub(crate) fn wake(location: &str, baud: u32) -> DeviceResult<()> {
    let port = open_port(location, baud)?;
    drop(port);
    debug!(location, baud, "Touched serial port");
    Ok(())
}

/// Open serial line.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    location: String,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("location", &self.location)
            .finish()
    }
}

impl SerialTransport {
    pub fn open(location: &str, baud: u32) -> DeviceResult<Self> {
        let port = open_port(location, baud)?;
        debug!(location, baud, "Opened serial transport");
        Ok(Self {
            port,
            location: location.to_owned(),
        })
    }

    fn set_timeout(&mut self, timeout: Duration) -> DeviceResult<()> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| map_serial_error(&self.location, &e))
    }
}

impl Transport for SerialTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    fn location(&self) -> &str {
        &self.location
    }

    /// Writes until all bytes are accepted or `timeout` elapses.
    fn write(&mut self, data: &[u8], timeout: Duration) -> DeviceResult<usize> {
        let deadline = Instant::now() + timeout;
        let mut written = 0;
        while written < data.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            self.set_timeout(remaining)?;
            match self.port.write(&data[written..]) {
                Ok(0) => return Err(DeviceError::disconnected(&self.location)),
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) => return Err(DeviceError::from_io(&self.location, &e)),
            }
        }
        if written == 0 && !data.is_empty() {
            return Err(DeviceError::timeout(&self.location, timeout.as_millis() as u64));
        }
        Ok(written)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> DeviceResult<usize> {
        self.set_timeout(timeout)?;
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::TimedOut => Err(DeviceError::timeout(
                &self.location,
                timeout.as_millis() as u64,
            )),
            Err(e) => Err(DeviceError::from_io(&self.location, &e)),
        }
    }

    fn close(&mut self) -> DeviceResult<()> {
        self.port
            .flush()
            .map_err(|e| DeviceError::from_io(&self.location, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_errors_map_onto_device_taxonomy() {
        let err = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        assert!(matches!(
            map_serial_error("/dev/ttyUSB0", &err),
            DeviceError::NotFound(_)
        ));

        let err = serialport::Error::new(
            serialport::ErrorKind::Io(ErrorKind::PermissionDenied),
            "EACCES",
        );
        assert!(matches!(
            map_serial_error("/dev/ttyUSB0", &err),
            DeviceError::PermissionDenied(_)
        ));
    }
}
