//! Render and send loops for one session.
//!
//! The loops share only the [`FrameSlot`], the status record and the last
//! observed end-to-end frame time. The render loop owns the control channel;
//! the send loop owns the transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError};
use panelstream_catalog::{PixelFormat, ProtocolKind};
use panelstream_errors::{ErrorSeverity, PanelError};
use panelstream_transport::{PanelTransport, Transport};
use parking_lot::RwLock;
use tracing::{debug, error, info, trace, warn};

use crate::cancel::CancelToken;
use crate::config::validate_fps;
use crate::drivers;
use crate::encode::FrameEncoder;
use crate::frame_slot::{EncodedFrame, FrameSlot};
use crate::pacing::{FpsCounter, Pacer};
use crate::renderer::{FrameRenderer, RenderRequest, Rotation};
use crate::session::{SessionControl, SessionStatus};

/// State shared by the two loops and the session handle.
#[derive(Debug)]
pub(crate) struct Shared {
    pub slot: FrameSlot,
    pub status: RwLock<SessionStatus>,
    /// Microseconds; zero until the first frame is sent.
    last_frame_us: AtomicU64,
}

impl Shared {
    pub fn new(status: SessionStatus) -> Self {
        Self {
            slot: FrameSlot::new(),
            status: RwLock::new(status),
            last_frame_us: AtomicU64::new(0),
        }
    }

    fn set_last_frame_time(&self, t: Duration) {
        let us = u64::try_from(t.as_micros()).unwrap_or(u64::MAX).max(1);
        self.last_frame_us.store(us, Ordering::Relaxed);
    }

    fn last_frame_time(&self) -> Option<Duration> {
        match self.last_frame_us.load(Ordering::Relaxed) {
            0 => None,
            us => Some(Duration::from_micros(us)),
        }
    }

    fn record_error(&self, err: &PanelError) {
        let mut status = self.status.write();
        status.last_error = Some(err.to_string());
        status.consecutive_errors = status.consecutive_errors.saturating_add(1);
    }
}

/// What the render loop paints, adjustable at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RenderSettings {
    pub profile: String,
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
    pub pixel_format: PixelFormat,
    pub target_fps: u32,
}

pub(crate) struct RenderLoop {
    pub device_id: String,
    pub settings: RenderSettings,
    pub renderer: Arc<dyn FrameRenderer>,
    pub encoder: FrameEncoder,
    pub shared: Arc<Shared>,
    pub control: Receiver<SessionControl>,
    pub cancel: CancelToken,
    /// Upper bound on one wait, so cancellation is seen promptly.
    pub poll: Duration,
}

impl RenderLoop {
    pub fn run(mut self) {
        info!(device = %self.device_id, fps = self.settings.target_fps, "Render loop started");
        let mut pacer = Pacer::new(self.settings.target_fps);
        let mut sequence = 0u64;

        while !self.cancel.is_cancelled() {
            let cycle_start = Instant::now();
            self.render_once(sequence, cycle_start);
            sequence = sequence.wrapping_add(1);

            if let Some(t) = self.shared.last_frame_time() {
                pacer.observe(t);
            }
            let deadline = cycle_start + pacer.interval();
            if !self.wait_until(deadline, &mut pacer) {
                break;
            }
        }

        // Linked: the send loop stops with us.
        self.cancel.cancel();
        debug!(device = %self.device_id, frames = sequence, "Render loop exited");
    }

    fn render_once(&self, sequence: u64, started: Instant) {
        let s = &self.settings;
        let request = RenderRequest {
            profile: &s.profile,
            width: s.width,
            height: s.height,
            rotation: s.rotation,
            pixel_format: s.pixel_format,
        };
        let encoded = self.renderer.render(&request).and_then(|bitmap| {
            let data = self.encoder.encode(&bitmap, s.pixel_format)?;
            Ok(EncodedFrame {
                data,
                width: bitmap.width(),
                height: bitmap.height(),
                format: s.pixel_format,
                sequence,
                rendered_at: started,
            })
        });
        match encoded {
            Ok(frame) => {
                if let Some(stale) = self.shared.slot.store(frame) {
                    trace!(device = %self.device_id, sequence = stale.sequence, "Unsent frame replaced");
                    self.shared.status.write().frames_dropped = self.shared.slot.dropped();
                }
            }
            Err(e) => {
                warn!(device = %self.device_id, error = %e, "Render failed, skipping frame");
                self.shared.record_error(&e);
            }
        }
    }

    /// Sleep until `deadline`, applying control messages as they arrive.
    ///
    /// Returns `false` when the loop should stop.
    fn wait_until(&mut self, deadline: Instant, pacer: &mut Pacer) -> bool {
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return true;
            }
            match self.control.recv_timeout(remaining.min(self.poll)) {
                Ok(SessionControl::Stop) => return false,
                Ok(msg) => self.apply(msg, pacer),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    fn apply(&mut self, msg: SessionControl, pacer: &mut Pacer) {
        debug!(device = %self.device_id, ?msg, "Applying session control");
        let mut status = self.shared.status.write();
        match msg {
            SessionControl::SetFrameRate(fps) => {
                if let Err(reason) = validate_fps(fps) {
                    warn!(device = %self.device_id, %reason, "Ignoring frame rate change");
                    return;
                }
                self.settings.target_fps = fps;
                pacer.set_target_fps(fps);
                status.target_fps = fps;
            }
            SessionControl::SetRotation(rotation) => {
                self.settings.rotation = rotation;
                status.rotation = rotation;
            }
            SessionControl::SetResolution { width, height } => {
                if width == 0 || height == 0 {
                    warn!(device = %self.device_id, width, height, "Ignoring empty resolution");
                    return;
                }
                self.settings.width = width;
                self.settings.height = height;
                status.render_width = width;
                status.render_height = height;
            }
            SessionControl::SetProfile(profile) => {
                self.settings.profile = profile;
            }
            SessionControl::Stop => self.cancel.cancel(),
        }
    }
}

pub(crate) struct SendLoop {
    pub device_id: String,
    pub transport: PanelTransport,
    pub protocol: ProtocolKind,
    pub shared: Arc<Shared>,
    /// Observed; cancelled with the render loop.
    pub cancel: CancelToken,
    /// Cancelled on a fatal error so the render loop stops too.
    pub shutdown: CancelToken,
    pub fps: FpsCounter,
    pub send_timeout: Duration,
    pub signal_wait: Duration,
}

impl SendLoop {
    pub fn run(mut self) {
        info!(device = %self.device_id, protocol = ?self.protocol, "Send loop started");
        let mut last_sent: Option<Instant> = None;

        while !self.cancel.is_cancelled() {
            let Some(frame) = self.shared.slot.wait_take(self.signal_wait) else {
                continue;
            };
            let started = Instant::now();
            match drivers::send_frame(&mut self.transport, self.protocol, &frame, self.send_timeout) {
                Ok(()) => {
                    let now = Instant::now();
                    let interval = now.duration_since(last_sent.unwrap_or(started));
                    last_sent = Some(now);
                    self.fps.record(interval);
                    let frame_time = now.duration_since(frame.rendered_at);
                    self.shared.set_last_frame_time(frame_time);

                    let mut status = self.shared.status.write();
                    status.frames_sent = status.frames_sent.saturating_add(1);
                    status.frame_rate = self.fps.fps();
                    status.frame_time_ms = frame_time.as_secs_f64() * 1000.0;
                    status.consecutive_errors = 0;
                }
                Err(e) if drivers::is_fatal(&e) => {
                    error!(device = %self.device_id, error = %e, "Panel lost, ending session");
                    self.shared.record_error(&e);
                    break;
                }
                Err(e) => {
                    if e.severity() >= ErrorSeverity::Error {
                        warn!(device = %self.device_id, sequence = frame.sequence, category = %e.category(), error = %e, "Frame rejected");
                    } else {
                        debug!(device = %self.device_id, sequence = frame.sequence, error = %e, "Frame dropped");
                    }
                    self.shared.record_error(&e);
                }
            }
        }

        self.shutdown.cancel();
        if let Err(e) = self.transport.close() {
            warn!(device = %self.device_id, error = %e, "Transport close failed");
        }
        self.shared.status.write().is_running = false;
        debug!(device = %self.device_id, "Send loop exited");
    }
}
