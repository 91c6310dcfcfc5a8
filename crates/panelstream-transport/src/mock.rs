//! In-memory transport and bus for tests and simulation.
//!
//! [`MockTransport`] is a cheap handle over shared state: clone it before
//! handing it to a session and keep the clone to inspect what was written.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use panelstream_catalog::TransportKind;
use panelstream_errors::{DeviceError, DeviceResult};
use parking_lot::Mutex;

use crate::PanelTransport;
use crate::traits::{BusNode, DeviceBus, ScsiData, Transport};

/// Data phase recorded for a SCSI command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScsiPhase {
    None,
    ToDevice(Vec<u8>),
    FromDevice(usize),
}

/// One SCSI command seen by a [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScsiRecord {
    pub cdb: Vec<u8>,
    pub phase: ScsiPhase,
}

#[derive(Debug)]
struct MockState {
    writes: Vec<Vec<u8>>,
    read_queue: VecDeque<Vec<u8>>,
    scsi_log: Vec<ScsiRecord>,
    scsi_replies: VecDeque<Vec<u8>>,
    write_failures: VecDeque<DeviceError>,
    scsi_failures: VecDeque<DeviceError>,
    connected: bool,
    closed: bool,
    write_delay: Duration,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            writes: Vec::new(),
            read_queue: VecDeque::new(),
            scsi_log: Vec::new(),
            scsi_replies: VecDeque::new(),
            write_failures: VecDeque::new(),
            scsi_failures: VecDeque::new(),
            connected: true,
            closed: false,
            write_delay: Duration::ZERO,
        }
    }
}

/// Recording transport with scripted replies.
#[derive(Debug, Clone)]
pub struct MockTransport {
    kind: TransportKind,
    location: String,
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new(kind: TransportKind, location: impl Into<String>) -> Self {
        Self {
            kind,
            location: location.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Queue bytes returned by the next `read`.
    pub fn queue_read(&self, data: impl Into<Vec<u8>>) {
        self.state.lock().read_queue.push_back(data.into());
    }

    /// Queue bytes returned by the next SCSI command with a from-device phase.
    pub fn queue_scsi_reply(&self, data: impl Into<Vec<u8>>) {
        self.state.lock().scsi_replies.push_back(data.into());
    }

    /// Fail the next `write` with `err`.
    pub fn fail_next_write(&self, err: DeviceError) {
        self.state.lock().write_failures.push_back(err);
    }

    /// Fail the next SCSI command with `err`.
    pub fn fail_next_scsi(&self, err: DeviceError) {
        self.state.lock().scsi_failures.push_back(err);
    }

    /// Sleep this long inside every `write` to simulate a slow device.
    pub fn set_write_delay(&self, delay: Duration) {
        self.state.lock().write_delay = delay;
    }

    pub fn disconnect(&self) {
        self.state.lock().connected = false;
    }

    pub fn reconnect(&self) {
        self.state.lock().connected = true;
    }

    pub fn write_history(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    /// Most recent write, without copying the whole history.
    pub fn last_write(&self) -> Option<Vec<u8>> {
        self.state.lock().writes.last().cloned()
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().writes.len()
    }

    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }

    pub fn scsi_log(&self) -> Vec<ScsiRecord> {
        self.state.lock().scsi_log.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn check_connected(&self, state: &MockState) -> DeviceResult<()> {
        if state.connected {
            Ok(())
        } else {
            Err(DeviceError::disconnected(&self.location))
        }
    }
}

impl Transport for MockTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn write(&mut self, data: &[u8], _timeout: Duration) -> DeviceResult<usize> {
        let delay = {
            let mut state = self.state.lock();
            self.check_connected(&state)?;
            if let Some(err) = state.write_failures.pop_front() {
                return Err(err);
            }
            state.writes.push(data.to_vec());
            state.write_delay
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> DeviceResult<usize> {
        let mut state = self.state.lock();
        self.check_connected(&state)?;
        let Some(data) = state.read_queue.pop_front() else {
            return Err(DeviceError::timeout(
                &self.location,
                timeout.as_millis() as u64,
            ));
        };
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    fn scsi_command(
        &mut self,
        cdb: &[u8],
        data: ScsiData<'_>,
        timeout: Duration,
    ) -> DeviceResult<()> {
        if self.kind != TransportKind::Scsi {
            return Err(DeviceError::unsupported(self.kind.as_str(), "scsi_command"));
        }
        let mut state = self.state.lock();
        self.check_connected(&state)?;
        if let Some(err) = state.scsi_failures.pop_front() {
            return Err(err);
        }
        let phase = match data {
            ScsiData::None => ScsiPhase::None,
            ScsiData::ToDevice(buf) => ScsiPhase::ToDevice(buf.to_vec()),
            ScsiData::FromDevice(buf) => {
                let Some(reply) = state.scsi_replies.pop_front() else {
                    return Err(DeviceError::timeout(
                        &self.location,
                        timeout.as_millis() as u64,
                    ));
                };
                let n = reply.len().min(buf.len());
                buf[..n].copy_from_slice(&reply[..n]);
                ScsiPhase::FromDevice(buf.len())
            }
        };
        state.scsi_log.push(ScsiRecord {
            cdb: cdb.to_vec(),
            phase,
        });
        Ok(())
    }

    fn close(&mut self) -> DeviceResult<()> {
        self.state.lock().closed = true;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MockBusState {
    nodes: Vec<BusNode>,
    transports: HashMap<String, MockTransport>,
    /// Serial nodes hiding their ids until woken, with remaining wake failures.
    sleeping: HashMap<String, (u16, u16, u32)>,
    wake_log: Vec<(String, u32)>,
    failing_kinds: HashSet<TransportKind>,
    open_log: Vec<String>,
}

/// Scriptable [`DeviceBus`].
#[derive(Debug, Clone, Default)]
pub struct MockBus {
    state: Arc<Mutex<MockBusState>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device and return the transport handle it will open to.
    pub fn add_device(&self, node: BusNode) -> MockTransport {
        let transport = MockTransport::new(node.transport, node.location.clone());
        let mut state = self.state.lock();
        state
            .transports
            .insert(node.location.clone(), transport.clone());
        state.nodes.push(node);
        transport
    }

    /// Attach a serial bridge that reports no ids until woken.
    ///
    /// The first `failures` wake attempts fail.
    pub fn add_sleeping_serial(
        &self,
        location: &str,
        vendor_id: u16,
        product_id: u16,
        failures: u32,
    ) -> MockTransport {
        let transport = self.add_device(BusNode::new(TransportKind::Serial, location));
        self.state
            .lock()
            .sleeping
            .insert(location.to_owned(), (vendor_id, product_id, failures));
        transport
    }

    /// Unplug the device at `location`.
    pub fn remove_device(&self, location: &str) {
        let mut state = self.state.lock();
        state.nodes.retain(|n| n.location != location);
        if let Some(t) = state.transports.remove(location) {
            t.disconnect();
        }
    }

    /// Make enumeration of `kind` fail as a whole.
    pub fn fail_enumeration(&self, kind: TransportKind) {
        self.state.lock().failing_kinds.insert(kind);
    }

    pub fn wake_log(&self) -> Vec<(String, u32)> {
        self.state.lock().wake_log.clone()
    }

    pub fn open_log(&self) -> Vec<String> {
        self.state.lock().open_log.clone()
    }

    pub fn transport(&self, location: &str) -> Option<MockTransport> {
        self.state.lock().transports.get(location).cloned()
    }
}

impl DeviceBus for MockBus {
    fn enumerate(&self, kind: TransportKind) -> DeviceResult<Vec<BusNode>> {
        let state = self.state.lock();
        if state.failing_kinds.contains(&kind) {
            return Err(DeviceError::io(kind.as_str(), "enumeration failed"));
        }
        Ok(state
            .nodes
            .iter()
            .filter(|n| n.transport == kind)
            .cloned()
            .collect())
    }

    fn wake_serial(&self, location: &str, baud: u32) -> DeviceResult<()> {
        let mut state = self.state.lock();
        state.wake_log.push((location.to_owned(), baud));
        let Some(&(vid, pid, failures)) = state.sleeping.get(location) else {
            return if state.transports.contains_key(location) {
                Ok(())
            } else {
                Err(DeviceError::not_found(location))
            };
        };
        if failures > 0 {
            state
                .sleeping
                .insert(location.to_owned(), (vid, pid, failures - 1));
            return Err(DeviceError::Busy(location.to_owned()));
        }
        state.sleeping.remove(location);
        if let Some(node) = state.nodes.iter_mut().find(|n| n.location == location) {
            node.vendor_id = Some(vid);
            node.product_id = Some(pid);
            node.identity = format!("{vid:04x}:{pid:04x}@{location}");
        }
        Ok(())
    }

    fn open(&self, kind: TransportKind, location: &str) -> DeviceResult<PanelTransport> {
        let mut state = self.state.lock();
        state.open_log.push(location.to_owned());
        match state.transports.get(location) {
            Some(t) if t.kind == kind => Ok(PanelTransport::Mock(t.clone())),
            Some(_) => Err(DeviceError::open_failed(
                location,
                format!("not a {kind} device"),
            )),
            None => Err(DeviceError::not_found(location)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_records_writes_and_serves_reads() -> DeviceResult<()> {
        let handle = MockTransport::new(TransportKind::Hid, "/dev/hidraw0");
        let mut t = handle.clone();
        handle.queue_read(vec![1, 2, 3]);
        t.write_all(&[9, 9], Duration::from_millis(10))?;
        let mut buf = [0u8; 8];
        assert_eq!(t.read(&mut buf, Duration::from_millis(10))?, 3);
        assert_eq!(handle.write_history(), vec![vec![9, 9]]);
        assert_eq!(handle.last_write(), Some(vec![9, 9]));
        assert!(t.read(&mut buf, Duration::from_millis(10)).is_err());
        Ok(())
    }

    #[test]
    fn disconnect_is_fatal() {
        let handle = MockTransport::new(TransportKind::UsbBulk, "usb:1-1");
        let mut t = handle.clone();
        handle.disconnect();
        let err = t.write(&[0], Duration::ZERO);
        assert!(matches!(err, Err(e) if e.is_device_unavailable()));
    }

    #[test]
    fn scsi_only_on_scsi_mocks() {
        let mut t = MockTransport::new(TransportKind::Hid, "/dev/hidraw0");
        let r = t.scsi_command(&[0xF5], ScsiData::None, Duration::ZERO);
        assert!(matches!(r, Err(DeviceError::Unsupported { .. })));
    }

    #[test]
    fn sleeping_serial_reveals_ids_after_wake() -> DeviceResult<()> {
        let bus = MockBus::new();
        bus.add_sleeping_serial("/dev/ttyUSB0", 0x1A86, 0x5722, 1);
        assert!(bus.wake_serial("/dev/ttyUSB0", 115_200).is_err());
        assert_eq!(bus.enumerate(TransportKind::Serial)?[0].vid_pid(), None);
        bus.wake_serial("/dev/ttyUSB0", 115_200)?;
        assert_eq!(
            bus.enumerate(TransportKind::Serial)?[0].vid_pid(),
            Some((0x1A86, 0x5722))
        );
        assert_eq!(bus.wake_log().len(), 2);
        Ok(())
    }

    #[test]
    fn open_checks_kind() {
        let bus = MockBus::new();
        bus.add_device(BusNode::new(TransportKind::Scsi, "/dev/sg1"));
        assert!(bus.open(TransportKind::Scsi, "/dev/sg1").is_ok());
        assert!(bus.open(TransportKind::Hid, "/dev/sg1").is_err());
        assert!(bus.open(TransportKind::Scsi, "/dev/sg9").is_err());
    }
}
