//! Bitmap to panel payload encoding.
//!
//! Photographic panels take baseline JPEG; the rest take raw RGB565 in the
//! byte order the model declares. A renderer may hand back pixels already in
//! the target raw format, in which case they pass through untouched.

use image::ImageEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use panelstream_catalog::PixelFormat;
use panelstream_errors::PanelError;

/// Default JPEG quality for panel frames.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Pixel layout of a rendered bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapFormat {
    /// 8-bit RGBA, row major
    Rgba8,
    /// RGB565 little-endian
    Rgb565Le,
    /// RGB565 big-endian
    Rgb565Be,
}

impl BitmapFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            BitmapFormat::Rgba8 => 4,
            BitmapFormat::Rgb565Le | BitmapFormat::Rgb565Be => 2,
        }
    }

    /// Raw layout a renderer should produce for a panel format.
    pub const fn preferred_for(format: PixelFormat) -> Self {
        match format {
            PixelFormat::Jpeg => BitmapFormat::Rgba8,
            PixelFormat::Rgb565 => BitmapFormat::Rgb565Le,
            PixelFormat::Rgb565BigEndian => BitmapFormat::Rgb565Be,
        }
    }
}

/// A rendered frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    format: BitmapFormat,
    data: Vec<u8>,
}

impl Bitmap {
    /// Wrap pixel data, checking its length against the geometry.
    pub fn new(width: u32, height: u32, format: BitmapFormat, data: Vec<u8>) -> Result<Self, PanelError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(format.bytes_per_pixel()))
            .ok_or_else(|| PanelError::render(format!("bitmap {width}x{height} too large")))?;
        if width == 0 || height == 0 {
            return Err(PanelError::render(format!("empty bitmap {width}x{height}")));
        }
        if data.len() != expected {
            return Err(PanelError::render(format!(
                "bitmap {width}x{height} {format:?} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Solid-colour RGBA bitmap.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self, PanelError> {
        let len = (width as usize) * (height as usize);
        Self::new(width, height, BitmapFormat::Rgba8, rgba.repeat(len))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> BitmapFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Pack 8-bit RGB into a 5-6-5 word.
pub const fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3)
}

/// Expand a 5-6-5 word to 8-bit RGB.
pub const fn rgb888(word: u16) -> [u8; 3] {
    let r = ((word >> 11) & 0x1F) as u8;
    let g = ((word >> 5) & 0x3F) as u8;
    let b = (word & 0x1F) as u8;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
}

fn rgba_to_rgb565(rgba: &[u8], big_endian: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgba.len() / 2);
    for px in rgba.chunks_exact(4) {
        let word = rgb565(px[0], px[1], px[2]);
        let bytes = if big_endian {
            word.to_be_bytes()
        } else {
            word.to_le_bytes()
        };
        out.extend_from_slice(&bytes);
    }
    out
}

fn swap_pairs(data: &[u8]) -> Vec<u8> {
    data.chunks_exact(2).flat_map(|p| [p[1], p[0]]).collect()
}

fn to_rgb888(bitmap: &Bitmap) -> Vec<u8> {
    match bitmap.format {
        BitmapFormat::Rgba8 => bitmap
            .data
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect(),
        BitmapFormat::Rgb565Le => bitmap
            .data
            .chunks_exact(2)
            .flat_map(|p| rgb888(u16::from_le_bytes([p[0], p[1]])))
            .collect(),
        BitmapFormat::Rgb565Be => bitmap
            .data
            .chunks_exact(2)
            .flat_map(|p| rgb888(u16::from_be_bytes([p[0], p[1]])))
            .collect(),
    }
}

/// Turns rendered bitmaps into panel payloads.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    jpeg_quality: u8,
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameEncoder {
    /// Encoder with a JPEG quality clamped to 1..=100.
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Encode `bitmap` into the payload format a panel accepts.
    pub fn encode(&self, bitmap: &Bitmap, target: PixelFormat) -> Result<Vec<u8>, PanelError> {
        match (target, bitmap.format) {
            (PixelFormat::Jpeg, _) => self.encode_jpeg(bitmap),
            (PixelFormat::Rgb565, BitmapFormat::Rgb565Le)
            | (PixelFormat::Rgb565BigEndian, BitmapFormat::Rgb565Be) => Ok(bitmap.data.clone()),
            (PixelFormat::Rgb565, BitmapFormat::Rgb565Be)
            | (PixelFormat::Rgb565BigEndian, BitmapFormat::Rgb565Le) => Ok(swap_pairs(&bitmap.data)),
            (PixelFormat::Rgb565, BitmapFormat::Rgba8) => Ok(rgba_to_rgb565(&bitmap.data, false)),
            (PixelFormat::Rgb565BigEndian, BitmapFormat::Rgba8) => {
                Ok(rgba_to_rgb565(&bitmap.data, true))
            }
        }
    }

    fn encode_jpeg(&self, bitmap: &Bitmap) -> Result<Vec<u8>, PanelError> {
        let rgb = to_rgb888(bitmap);
        let mut out = Vec::with_capacity(rgb.len() / 8);
        JpegEncoder::new_with_quality(&mut out, self.jpeg_quality)
            .write_image(&rgb, bitmap.width, bitmap.height, ExtendedColorType::Rgb8)
            .map_err(|e| PanelError::encode(format!("JPEG encode failed: {e}")))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb565_packs_primaries() {
        assert_eq!(rgb565(0xFF, 0, 0), 0xF800);
        assert_eq!(rgb565(0, 0xFF, 0), 0x07E0);
        assert_eq!(rgb565(0, 0, 0xFF), 0x001F);
        assert_eq!(rgb888(0xFFFF), [0xFF, 0xFF, 0xFF]);
        assert_eq!(rgb888(0), [0, 0, 0]);
    }

    #[test]
    fn rgba_to_raw_formats() -> Result<(), PanelError> {
        let bitmap = Bitmap::filled(2, 2, [0xFF, 0, 0, 0xFF])?;
        let encoder = FrameEncoder::default();
        let le = encoder.encode(&bitmap, PixelFormat::Rgb565)?;
        assert_eq!(le, [0x00, 0xF8].repeat(4));
        let be = encoder.encode(&bitmap, PixelFormat::Rgb565BigEndian)?;
        assert_eq!(be, [0xF8, 0x00].repeat(4));
        Ok(())
    }

    #[test]
    fn matching_raw_format_passes_through() -> Result<(), PanelError> {
        let data = vec![1, 2, 3, 4];
        let bitmap = Bitmap::new(2, 1, BitmapFormat::Rgb565Le, data.clone())?;
        let encoder = FrameEncoder::default();
        assert_eq!(encoder.encode(&bitmap, PixelFormat::Rgb565)?, data);
        assert_eq!(
            encoder.encode(&bitmap, PixelFormat::Rgb565BigEndian)?,
            vec![2, 1, 4, 3]
        );
        Ok(())
    }

    #[test]
    fn jpeg_output_has_soi_marker() -> Result<(), PanelError> {
        let bitmap = Bitmap::filled(16, 16, [10, 200, 30, 0xFF])?;
        let jpeg = FrameEncoder::new(85).encode(&bitmap, PixelFormat::Jpeg)?;
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
        Ok(())
    }

    #[test]
    fn bitmap_length_checked() {
        assert!(Bitmap::new(2, 2, BitmapFormat::Rgba8, vec![0; 15]).is_err());
        assert!(Bitmap::new(0, 2, BitmapFormat::Rgba8, Vec::new()).is_err());
    }

    #[test]
    fn quality_clamped() {
        assert_eq!(FrameEncoder::new(0).jpeg_quality(), 1);
        assert_eq!(FrameEncoder::new(200).jpeg_quality(), 100);
    }
}
