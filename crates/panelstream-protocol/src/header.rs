//! Generic 64-byte command header shared by the bulk and HID families.
//!
//! # Wire layout (little-endian `u32` fields)
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0..4   | magic `12 34 56 78` |
//! | 4..8   | command code |
//! | 8..12  | width |
//! | 12..16 | height |
//! | 16..20 | mode |
//! | 56..60 | command code (repeated) |
//! | 60..64 | payload length |
//!
//! All other bytes are zero.

use panelstream_catalog::PixelFormat;
use panelstream_errors::ProtocolError;

/// Header size in bytes.
pub const HEADER_LEN: usize = 64;

/// Leading magic marker.
pub const MAGIC: [u8; 4] = [0x12, 0x34, 0x56, 0x78];

/// Init-header mode asking the device to report its identity.
pub const INIT_MODE_QUERY: u32 = 1;

const CMD_OFFSET: usize = 4;
const WIDTH_OFFSET: usize = 8;
const HEIGHT_OFFSET: usize = 12;
const MODE_OFFSET: usize = 16;
const CMD_REPEAT_OFFSET: usize = 56;
const LEN_OFFSET: usize = 60;

/// Header command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Command {
    /// Identify / wake the device
    Init = 1,
    /// Display the attached payload
    Display = 2,
}

impl Command {
    pub const fn code(self) -> u32 {
        self as u32
    }

    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Command::Init),
            2 => Some(Command::Display),
            _ => None,
        }
    }
}

/// Display-header mode code for a pixel format.
pub const fn pixel_format_code(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Jpeg => 0,
        PixelFormat::Rgb565 => 1,
        PixelFormat::Rgb565BigEndian => 2,
    }
}

/// Decoded header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub command: Command,
    pub width: u32,
    pub height: u32,
    pub mode: u32,
    pub payload_len: u32,
}

impl FrameHeader {
    /// Init header: zero geometry, identity query, no payload.
    pub const fn init() -> Self {
        Self {
            command: Command::Init,
            width: 0,
            height: 0,
            mode: INIT_MODE_QUERY,
            payload_len: 0,
        }
    }

    /// Display header for a payload of `payload_len` bytes.
    pub fn display(
        width: u32,
        height: u32,
        format: PixelFormat,
        payload_len: usize,
    ) -> Result<Self, ProtocolError> {
        let Ok(len) = u32::try_from(payload_len) else {
            return Err(ProtocolError::PayloadTooLarge {
                len: payload_len,
                max: u32::MAX as usize,
            });
        };
        Ok(Self {
            command: Command::Display,
            width,
            height,
            mode: pixel_format_code(format),
            payload_len: len,
        })
    }

    /// Serialize to the 64-byte wire form.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&MAGIC);
        put_u32(&mut out, CMD_OFFSET, self.command.code());
        put_u32(&mut out, WIDTH_OFFSET, self.width);
        put_u32(&mut out, HEIGHT_OFFSET, self.height);
        put_u32(&mut out, MODE_OFFSET, self.mode);
        put_u32(&mut out, CMD_REPEAT_OFFSET, self.command.code());
        put_u32(&mut out, LEN_OFFSET, self.payload_len);
        out
    }

    /// Parse the first 64 bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let header: &[u8; HEADER_LEN] = buf
            .get(..HEADER_LEN)
            .and_then(|b| b.try_into().ok())
            .ok_or(ProtocolError::ShortBuffer {
                needed: HEADER_LEN,
                actual: buf.len(),
            })?;

        let magic = [header[0], header[1], header[2], header[3]];
        if magic != MAGIC {
            return Err(ProtocolError::BadMagic { found: magic });
        }

        let code = get_u32(header, CMD_OFFSET);
        let command = Command::from_code(code).ok_or(ProtocolError::UnknownCommand(code))?;

        Ok(Self {
            command,
            width: get_u32(header, WIDTH_OFFSET),
            height: get_u32(header, HEIGHT_OFFSET),
            mode: get_u32(header, MODE_OFFSET),
            payload_len: get_u32(header, LEN_OFFSET),
        })
    }
}

fn put_u32(buf: &mut [u8; HEADER_LEN], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn get_u32(buf: &[u8; HEADER_LEN], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_header_layout() -> Result<(), ProtocolError> {
        let h = FrameHeader::display(480, 480, PixelFormat::Rgb565, 460_800)?.encode();
        assert_eq!(&h[0..4], &MAGIC);
        assert_eq!(&h[4..8], &2u32.to_le_bytes());
        assert_eq!(&h[8..12], &480u32.to_le_bytes());
        assert_eq!(&h[12..16], &480u32.to_le_bytes());
        assert_eq!(&h[16..20], &1u32.to_le_bytes());
        assert_eq!(&h[56..60], &2u32.to_le_bytes());
        assert_eq!(&h[60..64], &460_800u32.to_le_bytes());
        assert!(h[20..56].iter().all(|&b| b == 0));
        Ok(())
    }

    #[test]
    fn init_header_layout() {
        let h = FrameHeader::init().encode();
        assert_eq!(&h[4..8], &1u32.to_le_bytes());
        assert_eq!(&h[8..16], &[0u8; 8]);
        assert_eq!(&h[16..20], &INIT_MODE_QUERY.to_le_bytes());
        assert_eq!(&h[60..64], &[0u8; 4]);
    }

    #[test]
    fn decode_rejects_short_and_bad_magic() {
        assert!(matches!(
            FrameHeader::decode(&[0u8; 10]),
            Err(ProtocolError::ShortBuffer { needed: 64, actual: 10 })
        ));
        assert!(matches!(
            FrameHeader::decode(&[0u8; 64]),
            Err(ProtocolError::BadMagic { .. })
        ));
    }

    #[test]
    fn format_codes() {
        assert_eq!(pixel_format_code(PixelFormat::Jpeg), 0);
        assert_eq!(pixel_format_code(PixelFormat::Rgb565), 1);
        assert_eq!(pixel_format_code(PixelFormat::Rgb565BigEndian), 2);
    }
}
