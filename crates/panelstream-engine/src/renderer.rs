//! Renderer collaborator interface.
//!
//! The engine never paints. It asks a [`FrameRenderer`] for a bitmap of the
//! session's render size and rotation on every cycle.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use panelstream_catalog::PixelFormat;
use panelstream_errors::PanelError;
use serde::{Deserialize, Serialize};

use crate::encode::{Bitmap, BitmapFormat, rgb565};

/// Clockwise panel rotation, serialized as degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub const fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Whether the rotation swaps the panel's axes.
    pub const fn is_quarter_turn(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(format!("rotation must be 0, 90, 180 or 270, got {other}")),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(r: Rotation) -> Self {
        r.degrees()
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// One render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRequest<'a> {
    /// Opaque reference into the profile store.
    pub profile: &'a str,
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
    /// Format the panel accepts; raw formats may be returned pre-converted.
    pub pixel_format: PixelFormat,
}

/// Paints a profile into a bitmap.
///
/// Called from the render thread at up to the session frame rate; must not
/// block indefinitely.
pub trait FrameRenderer: Send + Sync {
    fn render(&self, request: &RenderRequest<'_>) -> Result<Bitmap, PanelError>;
}

/// Moving colour bars, used when no real renderer is attached.
#[derive(Debug, Default)]
pub struct TestPatternRenderer {
    frame: AtomicU64,
}

const BARS: [[u8; 3]; 8] = [
    [0xFF, 0xFF, 0xFF],
    [0xFF, 0xFF, 0x00],
    [0x00, 0xFF, 0xFF],
    [0x00, 0xFF, 0x00],
    [0xFF, 0x00, 0xFF],
    [0xFF, 0x00, 0x00],
    [0x00, 0x00, 0xFF],
    [0x00, 0x00, 0x00],
];

impl TestPatternRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frame.load(Ordering::Relaxed)
    }

    fn colour_at(x: u32, y: u32, width: u32, height: u32, rotation: Rotation, offset: u64) -> [u8; 3] {
        // Bars run along the logical horizontal axis after rotation.
        let (pos, span) = match rotation {
            Rotation::Deg0 => (x, width),
            Rotation::Deg90 => (y, height),
            Rotation::Deg180 => (width - 1 - x, width),
            Rotation::Deg270 => (height - 1 - y, height),
        };
        let bar_width = u64::from((span / BARS.len() as u32).max(1));
        let idx = ((u64::from(pos) + offset) / bar_width) % BARS.len() as u64;
        BARS[idx as usize]
    }
}

impl FrameRenderer for TestPatternRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<Bitmap, PanelError> {
        let RenderRequest {
            width,
            height,
            rotation,
            ..
        } = *request;
        if width == 0 || height == 0 {
            return Err(PanelError::render(format!("empty render target {width}x{height}")));
        }
        let offset = self.frame.fetch_add(1, Ordering::Relaxed) * 4;
        let format = BitmapFormat::preferred_for(request.pixel_format);
        let mut data = Vec::with_capacity(width as usize * height as usize * format.bytes_per_pixel());
        for y in 0..height {
            for x in 0..width {
                let [r, g, b] = Self::colour_at(x, y, width, height, rotation, offset);
                match format {
                    BitmapFormat::Rgba8 => data.extend_from_slice(&[r, g, b, 0xFF]),
                    BitmapFormat::Rgb565Le => data.extend_from_slice(&rgb565(r, g, b).to_le_bytes()),
                    BitmapFormat::Rgb565Be => data.extend_from_slice(&rgb565(r, g, b).to_be_bytes()),
                }
            }
        }
        Bitmap::new(width, height, format, data)
    }
}
