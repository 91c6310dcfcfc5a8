//! Session registry: at most one live session per device id and location.

use std::collections::HashMap;
use std::sync::Arc;

use panelstream_errors::SessionError;
use panelstream_transport::DeviceBus;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::renderer::FrameRenderer;
use crate::session::{PanelSession, SessionControl, SessionOptions, SessionStatus};

#[derive(Debug)]
enum Entry {
    /// Reserved while open and handshake run outside the lock.
    Starting { location: String },
    Active(PanelSession),
}

impl Entry {
    fn location(&self) -> &str {
        match self {
            Entry::Starting { location } => location,
            Entry::Active(session) => session.location(),
        }
    }

    fn is_live(&self) -> bool {
        match self {
            Entry::Starting { .. } => true,
            Entry::Active(session) => session.is_running(),
        }
    }
}

/// Owns every panel session in the process.
pub struct SessionRegistry {
    bus: Arc<dyn DeviceBus>,
    renderer: Arc<dyn FrameRenderer>,
    options: SessionOptions,
    entries: Mutex<HashMap<String, Entry>>,
    /// Last configuration per device id, for restarts.
    configs: Mutex<HashMap<String, DeviceConfig>>,
}

impl SessionRegistry {
    pub fn new(bus: Arc<dyn DeviceBus>, renderer: Arc<dyn FrameRenderer>, options: SessionOptions) -> Self {
        Self {
            bus,
            renderer,
            options,
            entries: Mutex::new(HashMap::new()),
            configs: Mutex::new(HashMap::new()),
        }
    }

    /// Start a session for `config`.
    ///
    /// A registered session that already died is replaced.
    ///
    /// # Errors
    ///
    /// [`SessionError::AlreadyRunning`] or [`SessionError::LocationInUse`]
    /// when the device is taken, otherwise whatever
    /// [`PanelSession::start`] reports.
    pub fn start(&self, config: DeviceConfig) -> Result<SessionStatus, SessionError> {
        config.validate()?;
        let id = config.device_id.clone();

        let stale = {
            let mut entries = self.entries.lock();
            if entries.get(&id).is_some_and(Entry::is_live) {
                return Err(SessionError::AlreadyRunning(id));
            }
            let owner = entries
                .iter()
                .find(|(other, e)| **other != id && e.is_live() && e.location() == config.location)
                .map(|(other, _)| other.clone());
            if let Some(owner) = owner {
                return Err(SessionError::LocationInUse {
                    location: config.location.clone(),
                    owner,
                });
            }
            entries.insert(
                id.clone(),
                Entry::Starting {
                    location: config.location.clone(),
                },
            )
        };
        if let Some(Entry::Active(mut dead)) = stale {
            debug!(device = %id, "Replacing stopped session");
            if let Err(e) = dead.stop() {
                warn!(device = %id, error = %e, "Stopped session did not join");
            }
        }

        self.configs.lock().insert(id.clone(), config.clone());
        let result = PanelSession::start(&config, self.bus.as_ref(), Arc::clone(&self.renderer), &self.options);

        let mut entries = self.entries.lock();
        match result {
            Ok(session) => {
                let status = session.status();
                entries.insert(id, Entry::Active(session));
                Ok(status)
            }
            Err(e) => {
                entries.remove(&id);
                Err(e)
            }
        }
    }

    /// Start every enabled device, collecting per-device results.
    pub fn start_all<I>(&self, configs: I) -> Vec<(String, Result<SessionStatus, SessionError>)>
    where
        I: IntoIterator<Item = DeviceConfig>,
    {
        configs
            .into_iter()
            .filter(|c| c.enabled)
            .map(|c| (c.device_id.clone(), self.start(c)))
            .collect()
    }

    /// Stop and unregister a session, returning its final status.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotRunning`] for an unknown or still-starting id,
    /// [`SessionError::JoinTimeout`] if the threads did not exit in time.
    pub fn stop(&self, device_id: &str) -> Result<SessionStatus, SessionError> {
        let entry = {
            let mut entries = self.entries.lock();
            match entries.remove(device_id) {
                Some(starting @ Entry::Starting { .. }) => {
                    entries.insert(device_id.to_owned(), starting);
                    None
                }
                other => other,
            }
        };
        let Some(Entry::Active(mut session)) = entry else {
            return Err(SessionError::NotRunning(device_id.to_owned()));
        };
        session.stop()?;
        Ok(session.status())
    }

    /// Stop everything, returning the sessions that failed to stop cleanly.
    pub fn stop_all(&self) -> Vec<(String, SessionError)> {
        let active: Vec<(String, PanelSession)> = {
            let mut entries = self.entries.lock();
            let ids: Vec<String> = entries
                .iter()
                .filter(|(_, e)| matches!(e, Entry::Active(_)))
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| match entries.remove(&id) {
                    Some(Entry::Active(s)) => Some((id, s)),
                    _ => None,
                })
                .collect()
        };
        info!(count = active.len(), "Stopping all panel sessions");
        active
            .into_iter()
            .filter_map(|(id, mut session)| session.stop().err().map(|e| (id, e)))
            .collect()
    }

    /// Stop a session if registered, then start it again from its last
    /// configuration.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotRunning`] when the id was never started, otherwise
    /// any start error.
    pub fn restart(&self, device_id: &str) -> Result<SessionStatus, SessionError> {
        let Some(config) = self.configs.lock().get(device_id).cloned() else {
            return Err(SessionError::NotRunning(device_id.to_owned()));
        };
        match self.stop(device_id) {
            Ok(_) | Err(SessionError::NotRunning(_)) => {}
            Err(e) => return Err(e),
        }
        info!(device = %device_id, "Restarting panel session");
        self.start(config)
    }

    /// Forward a runtime change and remember it for restarts.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotRunning`] for an unknown id, otherwise
    /// [`PanelSession::control`] errors.
    pub fn control(&self, device_id: &str, msg: SessionControl) -> Result<(), SessionError> {
        {
            let entries = self.entries.lock();
            let Some(Entry::Active(session)) = entries.get(device_id) else {
                return Err(SessionError::NotRunning(device_id.to_owned()));
            };
            session.control(msg.clone())?;
        }
        if let Some(config) = self.configs.lock().get_mut(device_id) {
            match msg {
                SessionControl::SetFrameRate(fps) => config.target_fps = fps,
                SessionControl::SetRotation(rotation) => config.rotation = rotation,
                SessionControl::SetProfile(profile) => config.profile = profile,
                SessionControl::SetResolution { .. } | SessionControl::Stop => {}
            }
        }
        Ok(())
    }

    pub fn status(&self, device_id: &str) -> Option<SessionStatus> {
        match self.entries.lock().get(device_id) {
            Some(Entry::Active(session)) => Some(session.status()),
            _ => None,
        }
    }

    /// Status of every registered session, sorted by device id.
    pub fn statuses(&self) -> Vec<(String, SessionStatus)> {
        let mut all: Vec<_> = self
            .entries
            .lock()
            .iter()
            .filter_map(|(id, e)| match e {
                Entry::Active(session) => Some((id.clone(), session.status())),
                Entry::Starting { .. } => None,
            })
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Sessions whose loops are still running.
    pub fn running_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|e| matches!(e, Entry::Active(s) if s.is_running()))
            .count()
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        for (id, e) in self.stop_all() {
            warn!(device = %id, error = %e, "Session did not stop cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelstream_catalog::TransportKind;
    use panelstream_catalog::ids::hid;
    use panelstream_protocol::hid::encode_response;
    use panelstream_transport::BusNode;
    use panelstream_transport::mock::{MockBus, MockTransport};
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::config::{HandshakeOptions, PipelineOptions};
    use crate::renderer::TestPatternRenderer;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn registry(bus: &MockBus) -> SessionRegistry {
        let options = SessionOptions {
            handshake: HandshakeOptions {
                response_timeout_ms: 10,
                write_timeout_ms: 10,
                boot_retries: 0,
                boot_retry_delay_ms: 1,
            },
            pipeline: PipelineOptions {
                signal_wait_ms: 10,
                ..PipelineOptions::default()
            },
            ..SessionOptions::default()
        };
        SessionRegistry::new(Arc::new(bus.clone()), Arc::new(TestPatternRenderer::new()), options)
    }

    fn hid_panel(bus: &MockBus, location: &str) -> MockTransport {
        let device = bus.add_device(BusNode::new(TransportKind::Hid, location).with_ids(hid::VENDOR_ID, hid::PRODUCT_ID));
        device.queue_read(encode_response(0x12).to_vec());
        device
    }

    fn config(id: &str, location: &str) -> DeviceConfig {
        DeviceConfig::new(id, TransportKind::Hid, location).with_target_fps(60)
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn second_start_rejected() -> TestResult {
        let bus = MockBus::new();
        hid_panel(&bus, "/dev/hidraw0");
        let registry = registry(&bus);
        registry.start(config("a", "/dev/hidraw0"))?;
        assert!(matches!(
            registry.start(config("a", "/dev/hidraw0")),
            Err(SessionError::AlreadyRunning(_))
        ));
        assert!(matches!(
            registry.start(config("b", "/dev/hidraw0")),
            Err(SessionError::LocationInUse { owner, .. }) if owner == "a"
        ));
        assert_eq!(bus.open_log().len(), 1);
        Ok(())
    }

    #[test]
    fn statuses_sorted_and_stop_all() -> TestResult {
        let bus = MockBus::new();
        hid_panel(&bus, "/dev/hidraw1");
        hid_panel(&bus, "/dev/hidraw0");
        let registry = registry(&bus);
        let results = registry.start_all([config("zeta", "/dev/hidraw1"), config("alpha", "/dev/hidraw0")]);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
        let ids: Vec<_> = registry.statuses().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["alpha", "zeta"]);
        assert_eq!(registry.running_count(), 2);
        assert!(registry.stop_all().is_empty());
        assert!(registry.statuses().is_empty());
        Ok(())
    }

    #[test]
    fn failed_start_is_not_registered() {
        let bus = MockBus::new();
        bus.add_device(BusNode::new(TransportKind::Hid, "/dev/hidraw0").with_ids(hid::VENDOR_ID, hid::PRODUCT_ID));
        let registry = registry(&bus);
        assert!(registry.start(config("a", "/dev/hidraw0")).is_err());
        assert!(registry.status("a").is_none());
        assert!(matches!(registry.stop("a"), Err(SessionError::NotRunning(_))));
    }

    #[test]
    fn dead_session_can_be_restarted() -> TestResult {
        let bus = MockBus::new();
        let device = hid_panel(&bus, "/dev/hidraw0");
        let registry = registry(&bus);
        registry.start(config("a", "/dev/hidraw0"))?;
        registry.control("a", SessionControl::SetFrameRate(20))?;
        device.disconnect();
        assert!(wait_for(|| registry.running_count() == 0));
        assert!(registry.status("a").is_some_and(|s| !s.is_running && s.last_error.is_some()));

        device.reconnect();
        device.queue_read(encode_response(0x12).to_vec());
        let status = registry.restart("a")?;
        assert!(status.is_running);
        assert_eq!(status.target_fps, 20);
        Ok(())
    }

    #[test]
    fn stop_returns_final_status() -> TestResult {
        let bus = MockBus::new();
        hid_panel(&bus, "/dev/hidraw0");
        let registry = registry(&bus);
        registry.start(config("a", "/dev/hidraw0"))?;
        let status = registry.stop("a")?;
        assert!(!status.is_running);
        assert!(registry.control("a", SessionControl::Stop).is_err());
        Ok(())
    }
}
