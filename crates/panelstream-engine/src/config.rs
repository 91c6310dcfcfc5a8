//! Device and pipeline configuration.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use panelstream_catalog::ids::serial::BAUD_RATE;
use panelstream_catalog::{ModelId, TransportKind};
use panelstream_errors::{PanelError, SessionError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::encode::DEFAULT_JPEG_QUALITY;
use crate::pacing::MAX_TARGET_FPS;
use crate::renderer::Rotation;
use crate::session::SessionOptions;

/// Current configuration schema.
pub const SCHEMA_VERSION: &str = "panelstream.config/1";

fn default_true() -> bool {
    true
}

fn default_fps() -> u32 {
    30
}

/// One configured panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Stable id chosen by the configuration store.
    pub device_id: String,
    /// Location as reported by discovery.
    pub location: String,
    pub transport: TransportKind,
    /// Model guess from discovery; refined by the handshake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelId>,
    /// Profile reference handed to the renderer.
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default = "default_fps")]
    pub target_fps: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl DeviceConfig {
    pub fn new(device_id: impl Into<String>, transport: TransportKind, location: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            location: location.into(),
            transport,
            model: None,
            profile: String::new(),
            rotation: Rotation::Deg0,
            target_fps: default_fps(),
            enabled: true,
        }
    }

    pub fn with_model(mut self, model: ModelId) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps;
        self
    }

    /// Check one record in isolation.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.device_id.trim().is_empty() {
            return Err(SessionError::InvalidConfig("device_id is empty".into()));
        }
        if self.location.trim().is_empty() {
            return Err(SessionError::InvalidConfig(format!(
                "device '{}' has no location",
                self.device_id
            )));
        }
        validate_fps(self.target_fps).map_err(|msg| {
            SessionError::InvalidConfig(format!("device '{}': {msg}", self.device_id))
        })
    }
}

/// Frame rate must be in 1..=120.
pub fn validate_fps(fps: u32) -> Result<(), String> {
    if fps == 0 || fps > MAX_TARGET_FPS {
        return Err(format!("target_fps {fps} outside 1..={MAX_TARGET_FPS}"));
    }
    Ok(())
}

/// Discovery behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryOptions {
    /// Transports scanned, in order.
    pub transports: Vec<TransportKind>,
    /// Touch USB-serial bridges once before scanning.
    pub serial_wake: bool,
    pub wake_baud: u32,
    pub wake_attempts: u32,
    pub wake_delay_ms: u64,
    /// Upper bound on `/dev/sg*` nodes inspected.
    pub scsi_node_limit: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            transports: TransportKind::ALL.to_vec(),
            serial_wake: true,
            wake_baud: BAUD_RATE,
            wake_attempts: 3,
            wake_delay_ms: 100,
            scsi_node_limit: 16,
        }
    }
}

impl DiscoveryOptions {
    pub fn wake_delay(&self) -> Duration {
        Duration::from_millis(self.wake_delay_ms)
    }
}

/// Handshake timeouts and boot polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeOptions {
    pub response_timeout_ms: u64,
    pub write_timeout_ms: u64,
    /// Extra polls while the device reports the booting sentinel.
    pub boot_retries: u32,
    pub boot_retry_delay_ms: u64,
}

impl Default for HandshakeOptions {
    fn default() -> Self {
        Self {
            response_timeout_ms: 1000,
            write_timeout_ms: 1000,
            boot_retries: 5,
            boot_retry_delay_ms: 500,
        }
    }
}

impl HandshakeOptions {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn boot_retry_delay(&self) -> Duration {
        Duration::from_millis(self.boot_retry_delay_ms)
    }
}

/// Render/send pipeline tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    pub jpeg_quality: u8,
    /// Timeout applied to every frame write.
    pub send_timeout_ms: u64,
    /// How long the sender waits for a frame before re-checking cancellation.
    pub signal_wait_ms: u64,
    /// Bound on joining the session threads at stop.
    pub join_timeout_ms: u64,
    /// Frames in the rolling FPS window.
    pub fps_window: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            send_timeout_ms: 1000,
            signal_wait_ms: 100,
            join_timeout_ms: 2000,
            fps_window: 30,
        }
    }
}

impl PipelineOptions {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn signal_wait(&self) -> Duration {
        Duration::from_millis(self.signal_wait_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// Complete configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelStreamConfig {
    pub schema_version: String,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    pub discovery: DiscoveryOptions,
    #[serde(default)]
    pub handshake: HandshakeOptions,
    #[serde(default)]
    pub pipeline: PipelineOptions,
}

impl Default for PanelStreamConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            devices: Vec::new(),
            discovery: DiscoveryOptions::default(),
            handshake: HandshakeOptions::default(),
            pipeline: PipelineOptions::default(),
        }
    }
}

impl PanelStreamConfig {
    /// Read a configuration file and validate it.
    ///
    /// A missing file is replaced by the default configuration, written back
    /// so there is something to edit.
    ///
    /// # Errors
    ///
    /// [`PanelError::Io`] if the file cannot be read or created,
    /// [`PanelError::Config`] if it is malformed or fails validation.
    pub async fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, PanelError> {
        let path = path.as_ref();
        let config = match tokio::fs::read_to_string(path).await {
            Ok(text) => Self::from_json(&text)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "No panel configuration, writing defaults");
                let config = Self::default();
                config.save_to_path(path).await?;
                config
            }
            Err(e) => return Err(e.into()),
        };
        debug!(
            path = %path.display(),
            devices = config.devices.len(),
            enabled = config.enabled_devices().count(),
            "Loaded panel configuration"
        );
        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn from_json(text: &str) -> Result<Self, PanelError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| PanelError::config(format!("malformed configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate, then replace the file at `path` through a sibling temp file
    /// so a crash never leaves half a device list behind.
    pub async fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), PanelError> {
        let path = path.as_ref();
        self.validate()?;
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| PanelError::config(format!("cannot serialize configuration: {e}")))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, text).await?;
        tokio::fs::rename(&staging, path).await?;
        debug!(path = %path.display(), devices = self.devices.len(), "Saved panel configuration");
        Ok(())
    }

    /// `panelstream/config.json` under the per-user configuration directory:
    /// `$XDG_CONFIG_HOME` or `~/.config`, `%APPDATA%` on Windows.
    pub fn default_config_path() -> Result<PathBuf, PanelError> {
        let dir = if cfg!(windows) {
            std::env::var_os("APPDATA").map(PathBuf::from)
        } else {
            std::env::var_os("XDG_CONFIG_HOME")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        };
        dir.map(|d| d.join("panelstream").join("config.json"))
            .ok_or_else(|| PanelError::config("no per-user configuration directory"))
    }

    /// Validate the whole file.
    pub fn validate(&self) -> Result<(), PanelError> {
        if !self.schema_version.starts_with("panelstream.config/") {
            return Err(PanelError::config(format!(
                "Invalid schema version: {}",
                self.schema_version
            )));
        }

        let mut ids = HashSet::new();
        let mut locations = HashSet::new();
        for device in &self.devices {
            device.validate().map_err(|e| match e {
                SessionError::InvalidConfig(msg) => PanelError::Config(msg),
                other => other.into(),
            })?;
            if !ids.insert(device.device_id.as_str()) {
                return Err(PanelError::config(format!("Duplicate device id: {}", device.device_id)));
            }
            if !locations.insert(device.location.as_str()) {
                return Err(PanelError::config(format!(
                    "Duplicate device location: {}",
                    device.location
                )));
            }
        }

        if !(1..=100).contains(&self.pipeline.jpeg_quality) {
            return Err(PanelError::config(format!(
                "Invalid JPEG quality: {}",
                self.pipeline.jpeg_quality
            )));
        }
        if self.pipeline.signal_wait_ms == 0 {
            return Err(PanelError::config("signal_wait_ms must be positive"));
        }
        if self.discovery.serial_wake && self.discovery.wake_attempts == 0 {
            return Err(PanelError::config(
                "wake_attempts must be positive when serial_wake is enabled",
            ));
        }
        Ok(())
    }

    /// Enabled device records.
    pub fn enabled_devices(&self) -> impl Iterator<Item = &DeviceConfig> {
        self.devices.iter().filter(|d| d.enabled)
    }

    /// Session tuning with the built-in catalog.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            handshake: self.handshake,
            pipeline: self.pipeline,
            ..SessionOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelstream_errors::ErrorCategory;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn sample() -> PanelStreamConfig {
        PanelStreamConfig {
            devices: vec![
                DeviceConfig::new("left", TransportKind::UsbBulk, "usb:1-2")
                    .with_model(ModelId::BulkSquare480),
                DeviceConfig::new("right", TransportKind::Scsi, "/dev/sg2")
                    .with_rotation(Rotation::Deg180)
                    .with_target_fps(15),
            ],
            ..PanelStreamConfig::default()
        }
    }

    #[test]
    fn default_config_is_valid() -> TestResult {
        PanelStreamConfig::default().validate()?;
        sample().validate()?;
        Ok(())
    }

    #[test]
    fn duplicate_ids_and_locations_rejected() {
        let mut config = sample();
        config.devices[1].device_id = "left".into();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.devices[1].location = "usb:1-2".into();
        let err = config.validate();
        assert!(matches!(err, Err(PanelError::Config(msg)) if msg.contains("Duplicate device location")));
    }

    #[test]
    fn frame_rate_bounds() {
        assert!(validate_fps(0).is_err());
        assert!(validate_fps(1).is_ok());
        assert!(validate_fps(120).is_ok());
        assert!(validate_fps(121).is_err());
        let device = DeviceConfig::new("a", TransportKind::Hid, "/dev/hidraw0").with_target_fps(500);
        assert!(matches!(device.validate(), Err(SessionError::InvalidConfig(_))));
    }

    #[test]
    fn bad_device_record_is_config_error() {
        let mut config = sample();
        config.devices[0].target_fps = 0;
        let err = config.validate().err();
        assert_eq!(err.map(|e| e.category()), Some(ErrorCategory::Config));
    }

    #[test]
    fn jpeg_quality_bounds() {
        let mut config = sample();
        config.pipeline.jpeg_quality = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_schema_rejected() {
        let config = PanelStreamConfig {
            schema_version: "other/1".into(),
            ..PanelStreamConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn minimal_json_fills_defaults() -> TestResult {
        let json = r#"{
            "schema_version": "panelstream.config/1",
            "devices": [
                { "device_id": "bar", "location": "usb:3-1", "transport": "usb_bulk", "rotation": 90 }
            ]
        }"#;
        let config = PanelStreamConfig::from_json(json)?;
        let device = &config.devices[0];
        assert_eq!(device.rotation, Rotation::Deg90);
        assert_eq!(device.target_fps, 30);
        assert!(device.enabled);
        assert_eq!(config.handshake, HandshakeOptions::default());
        Ok(())
    }

    #[test]
    fn malformed_json_is_config_error() {
        let err = PanelStreamConfig::from_json("{ \"schema_version\": ");
        assert!(matches!(err, Err(PanelError::Config(msg)) if msg.starts_with("malformed configuration")));
    }

    #[tokio::test]
    async fn save_then_load() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("config.json");
        let config = sample();
        config.save_to_path(&path).await?;
        assert!(!path.with_extension("json.tmp").exists());
        let loaded = PanelStreamConfig::load_from_path(&path).await?;
        assert_eq!(loaded, config);
        Ok(())
    }

    #[tokio::test]
    async fn invalid_config_is_not_saved() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.json");
        let mut config = sample();
        config.devices[1].location = "usb:1-2".into();
        assert!(config.save_to_path(&path).await.is_err());
        assert!(!path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn invalid_file_fails_to_load() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.json");
        let json = r#"{
            "schema_version": "panelstream.config/1",
            "devices": [{ "device_id": "a", "location": "/dev/hidraw0", "transport": "hid", "target_fps": 500 }]
        }"#;
        tokio::fs::write(&path, json).await?;
        let err = PanelStreamConfig::load_from_path(&path).await;
        assert!(matches!(err, Err(PanelError::Config(_))));
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_creates_default() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.json");
        let loaded = PanelStreamConfig::load_from_path(&path).await?;
        assert_eq!(loaded, PanelStreamConfig::default());
        assert!(path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_path_is_io_error() -> TestResult {
        let dir = tempfile::tempdir()?;
        // A directory where the file should be.
        let err = PanelStreamConfig::load_from_path(dir.path()).await;
        assert_eq!(err.err().map(|e| e.category()), Some(ErrorCategory::IO));
        Ok(())
    }
}
