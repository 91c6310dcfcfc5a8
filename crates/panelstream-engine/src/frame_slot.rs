//! Single-slot, overwrite-on-store frame buffer between render and send.
//!
//! The slot never queues. Storing a frame replaces any frame the sender has
//! not taken yet, so the device always receives the newest render and memory
//! stays bounded to one pending frame.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use panelstream_catalog::PixelFormat;
use parking_lot::{Condvar, Mutex};

/// An encoded frame ready for the protocol driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Render sequence number, starting at 0 per session.
    pub sequence: u64,
    /// When the render for this frame began.
    pub rendered_at: Instant,
}

impl EncodedFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            format,
            sequence,
            rendered_at: Instant::now(),
        }
    }
}

#[derive(Debug, Default)]
pub struct FrameSlot {
    slot: Mutex<Option<EncodedFrame>>,
    ready: Condvar,
    stored: AtomicU64,
    dropped: AtomicU64,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `frame` in the slot and wake the sender.
    ///
    /// Returns the unsent frame it replaced, which counts as dropped.
    pub fn store(&self, frame: EncodedFrame) -> Option<EncodedFrame> {
        let replaced = self.slot.lock().replace(frame);
        self.stored.fetch_add(1, Ordering::Relaxed);
        if replaced.is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.ready.notify_one();
        replaced
    }

    /// Take the pending frame without waiting.
    pub fn take(&self) -> Option<EncodedFrame> {
        self.slot.lock().take()
    }

    /// Take the pending frame, waiting up to `timeout` for one to arrive.
    pub fn wait_take(&self, timeout: Duration) -> Option<EncodedFrame> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        while slot.is_none() {
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        slot.take()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }

    /// Frames stored since creation.
    pub fn stored(&self) -> u64 {
        self.stored.load(Ordering::Relaxed)
    }

    /// Frames overwritten before the sender took them.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
