//! One active panel: open, handshake, then a render thread and a send thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use panelstream_catalog::{Catalog, ModelId, PanelModel, ProtocolKind};
use panelstream_errors::SessionError;
use panelstream_transport::{DeviceBus, PanelTransport, Transport};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::{DeviceConfig, HandshakeOptions, PipelineOptions, validate_fps};
use crate::drivers::{self, DeviceHint, HandshakeOutcome};
use crate::encode::FrameEncoder;
use crate::pacing::FpsCounter;
use crate::pipeline::{RenderLoop, RenderSettings, SendLoop, Shared};
use crate::renderer::{FrameRenderer, Rotation};

/// Live status surfaced to the UI.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SessionStatus {
    pub is_running: bool,
    /// Rolling delivered frames per second.
    pub frame_rate: f64,
    /// Render start to send complete for the last delivered frame.
    pub frame_time_ms: f64,
    pub last_error: Option<String>,
    /// Model name confirmed by the handshake.
    pub resolved_display_name: String,
    pub model: Option<ModelId>,
    pub render_width: u32,
    pub render_height: u32,
    pub rotation: Rotation,
    pub target_fps: u32,
    pub frames_sent: u64,
    /// Frames overwritten in the slot before transmission.
    pub frames_dropped: u64,
    pub consecutive_errors: u32,
}

/// Runtime reconfiguration, applied by the render loop between frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionControl {
    SetFrameRate(u32),
    SetRotation(Rotation),
    /// Re-render at a new size; the handshake is not repeated.
    SetResolution { width: u32, height: u32 },
    SetProfile(String),
    Stop,
}

/// Everything a session needs besides its device record.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub catalog: Catalog<'static>,
    pub handshake: HandshakeOptions,
    pub pipeline: PipelineOptions,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            catalog: Catalog::builtin(),
            handshake: HandshakeOptions::default(),
            pipeline: PipelineOptions::default(),
        }
    }
}

/// Handle to a running session.
///
/// Dropping the handle stops the session.
pub struct PanelSession {
    device_id: String,
    location: String,
    model: PanelModel,
    shared: Arc<Shared>,
    control_tx: Sender<SessionControl>,
    cancel: CancelToken,
    done_rx: Receiver<()>,
    threads: Option<(JoinHandle<()>, JoinHandle<()>)>,
    join_timeout: Duration,
}

impl std::fmt::Debug for PanelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelSession")
            .field("device_id", &self.device_id)
            .field("location", &self.location)
            .field("model", &self.model.name)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn close_quietly(transport: &mut PanelTransport) {
    if let Err(e) = transport.close() {
        debug!(device = transport.location(), error = %e, "Close after failed start");
    }
}

/// Handshake hint for a configured device: the recorded model, plus ids
/// read from the bus when no model is recorded.
fn hint_for(config: &DeviceConfig, bus: &dyn DeviceBus, recorded: Option<PanelModel>) -> DeviceHint {
    if let Some(model) = recorded {
        return DeviceHint::from_model(model);
    }
    let node = bus
        .enumerate(config.transport)
        .ok()
        .and_then(|nodes| nodes.into_iter().find(|n| n.location == config.location));
    DeviceHint {
        vendor_id: node.as_ref().and_then(|n| n.vendor_id),
        product_id: node.as_ref().and_then(|n| n.product_id),
        model: None,
    }
}

impl PanelSession {
    /// Open the device, run the handshake and start streaming.
    ///
    /// # Errors
    ///
    /// Invalid configuration, open failure or handshake failure. No thread is
    /// started on error and the transport is closed.
    pub fn start(
        config: &DeviceConfig,
        bus: &dyn DeviceBus,
        renderer: Arc<dyn FrameRenderer>,
        options: &SessionOptions,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let catalog = options.catalog;
        let recorded = config.model.and_then(|id| catalog.by_id(id)).copied();
        if let Some(model) = recorded {
            if model.transport != config.transport {
                return Err(SessionError::InvalidConfig(format!(
                    "device '{}': model {} is a {} panel, not {}",
                    config.device_id, model.name, model.transport, config.transport
                )));
            }
        }
        let protocol = ProtocolKind::for_transport(config.transport);
        let hint = hint_for(config, bus, recorded);

        info!(device = %config.device_id, location = %config.location, transport = %config.transport, "Starting panel session");
        let mut transport = bus.open(config.transport, &config.location)?;
        let outcome = match drivers::handshake(&mut transport, protocol, &hint, &catalog, &options.handshake) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(device = %config.device_id, error = %e, "Handshake failed, session not started");
                close_quietly(&mut transport);
                return Err(e.into());
            }
        };

        Self::spawn(config, transport, outcome, renderer, &options.pipeline)
    }

    fn spawn(
        config: &DeviceConfig,
        transport: PanelTransport,
        outcome: HandshakeOutcome,
        renderer: Arc<dyn FrameRenderer>,
        pipeline: &PipelineOptions,
    ) -> Result<Self, SessionError> {
        let model = outcome.model;
        let (width, height) = model.render_size();
        let shared = Arc::new(Shared::new(SessionStatus {
            is_running: true,
            resolved_display_name: model.name.to_string(),
            model: Some(model.id),
            render_width: width,
            render_height: height,
            rotation: config.rotation,
            target_fps: config.target_fps,
            ..SessionStatus::default()
        }));

        let (control_tx, control_rx) = channel::unbounded();
        let (done_tx, done_rx) = channel::bounded::<()>(0);
        let cancel = CancelToken::new();

        let send_loop = SendLoop {
            device_id: config.device_id.clone(),
            transport,
            protocol: model.protocol,
            shared: Arc::clone(&shared),
            cancel: cancel.child(),
            shutdown: cancel.clone(),
            fps: FpsCounter::new(pipeline.fps_window),
            send_timeout: pipeline.send_timeout(),
            signal_wait: pipeline.signal_wait(),
        };
        let send_done = done_tx.clone();
        let send_thread = thread::Builder::new()
            .name(format!("panel-send-{}", config.device_id))
            .spawn(move || {
                send_loop.run();
                drop(send_done);
            })
            .map_err(|e| SessionError::Spawn {
                thread: "send",
                reason: e.to_string(),
            })?;

        let render_loop = RenderLoop {
            device_id: config.device_id.clone(),
            settings: RenderSettings {
                profile: config.profile.clone(),
                width,
                height,
                rotation: config.rotation,
                pixel_format: model.pixel_format,
                target_fps: config.target_fps,
            },
            renderer,
            encoder: FrameEncoder::new(pipeline.jpeg_quality),
            shared: Arc::clone(&shared),
            control: control_rx,
            cancel: cancel.clone(),
            poll: pipeline.signal_wait(),
        };
        let render_thread = match thread::Builder::new()
            .name(format!("panel-render-{}", config.device_id))
            .spawn(move || {
                render_loop.run();
                drop(done_tx);
            }) {
            Ok(handle) => handle,
            Err(e) => {
                cancel.cancel();
                if send_thread.join().is_err() {
                    warn!(device = %config.device_id, "Send thread panicked during aborted start");
                }
                return Err(SessionError::Spawn {
                    thread: "render",
                    reason: e.to_string(),
                });
            }
        };

        info!(
            device = %config.device_id,
            model = model.name,
            width,
            height,
            fps = config.target_fps,
            "Panel session running"
        );

        Ok(Self {
            device_id: config.device_id.clone(),
            location: config.location.clone(),
            model,
            shared,
            control_tx,
            cancel,
            done_rx,
            threads: Some((render_thread, send_thread)),
            join_timeout: pipeline.join_timeout(),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Model confirmed by the handshake.
    pub fn model(&self) -> &PanelModel {
        &self.model
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.status.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.status.read().is_running && !self.cancel.is_cancelled()
    }

    /// Deliver a runtime change to the render loop.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidConfig`] for an out-of-range frame rate,
    /// [`SessionError::ControlClosed`] once the session has stopped.
    pub fn control(&self, msg: SessionControl) -> Result<(), SessionError> {
        if let SessionControl::SetFrameRate(fps) = msg {
            validate_fps(fps).map_err(SessionError::InvalidConfig)?;
        }
        if self.control_tx.send(msg).is_err() {
            return Err(SessionError::ControlClosed(self.device_id.clone()));
        }
        Ok(())
    }

    /// Cancel both loops and join them within the join timeout.
    ///
    /// # Errors
    ///
    /// [`SessionError::JoinTimeout`] if a loop is wedged; its thread is
    /// detached.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        let Some((render, send)) = self.threads.take() else {
            return Ok(());
        };
        info!(device = %self.device_id, "Stopping panel session");
        self.cancel.cancel();

        let result = match self.done_rx.recv_timeout(self.join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                for (name, handle) in [("render", render), ("send", send)] {
                    if handle.join().is_err() {
                        warn!(device = %self.device_id, thread = name, "Session thread panicked");
                    }
                }
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(device = %self.device_id, timeout = ?self.join_timeout, "Session threads did not stop in time");
                Err(SessionError::JoinTimeout(self.device_id.clone()))
            }
        };
        self.shared.status.write().is_running = false;
        result
    }
}

impl Drop for PanelSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(device = %self.device_id, error = %e, "Session did not stop cleanly on drop");
        }
    }
}
