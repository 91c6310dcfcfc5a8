//! HID-report family.
//!
//! A stream (64-byte header followed by the payload) is cut into chunks of
//! [`CHUNK_DATA_LEN`] bytes. Each chunk travels in one output report:
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0      | report id (`0x00`) |
//! | 1..3   | chunk index, u16 LE |
//! | 3..5   | chunk length, u16 LE |
//! | 5..513 | chunk bytes, zero padded |
//!
//! The init reply is one 512-byte input report: magic echo at 0..4, booting
//! sentinel at 4..8, mode byte at 8.

use panelstream_catalog::PixelFormat;
use panelstream_errors::ProtocolError;

use crate::header::{FrameHeader, HEADER_LEN, MAGIC};
use crate::response::{HandshakeReply, InitResponse, is_booting};

/// Report ID prefixed to every output report.
pub const REPORT_ID: u8 = 0x00;
/// Report data size (without the report ID byte).
pub const REPORT_DATA_LEN: usize = 512;
/// Bytes written per output report.
pub const REPORT_LEN: usize = REPORT_DATA_LEN + 1;
/// Stream bytes carried by one report.
pub const CHUNK_DATA_LEN: usize = REPORT_DATA_LEN - 4;
/// Size of an input report.
pub const RESPONSE_LEN: usize = REPORT_DATA_LEN;

const MODE_OFFSET: usize = 8;

/// Largest stream expressible with a u16 chunk index.
pub const MAX_STREAM_LEN: usize = (u16::MAX as usize + 1) * CHUNK_DATA_LEN;

/// Number of reports needed for a stream of `len` bytes.
pub const fn report_count(len: usize) -> usize {
    len.div_ceil(CHUNK_DATA_LEN)
}

/// Build one output report for chunk `index`.
pub fn encode_report(index: u16, chunk: &[u8]) -> Result<[u8; REPORT_LEN], ProtocolError> {
    if chunk.len() > CHUNK_DATA_LEN {
        return Err(ProtocolError::PayloadTooLarge {
            len: chunk.len(),
            max: CHUNK_DATA_LEN,
        });
    }
    let mut report = [0u8; REPORT_LEN];
    report[0] = REPORT_ID;
    report[1..3].copy_from_slice(&index.to_le_bytes());
    // Bounded by CHUNK_DATA_LEN above.
    report[3..5].copy_from_slice(&(chunk.len() as u16).to_le_bytes());
    report[5..5 + chunk.len()].copy_from_slice(chunk);
    Ok(report)
}

/// Split a stream into output reports.
pub fn encode_stream(stream: &[u8]) -> Result<Vec<[u8; REPORT_LEN]>, ProtocolError> {
    if stream.len() > MAX_STREAM_LEN {
        return Err(ProtocolError::PayloadTooLarge {
            len: stream.len(),
            max: MAX_STREAM_LEN,
        });
    }
    stream
        .chunks(CHUNK_DATA_LEN)
        .zip(0..=u16::MAX)
        .map(|(chunk, index)| encode_report(index, chunk))
        .collect()
}

/// Init command: one report carrying the init header.
pub fn init_reports() -> Result<Vec<[u8; REPORT_LEN]>, ProtocolError> {
    encode_stream(&FrameHeader::init().encode())
}

/// Reports for one frame: display header + payload.
pub fn encode_frame(
    payload: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<[u8; REPORT_LEN]>, ProtocolError> {
    if payload.is_empty() {
        return Err(ProtocolError::EmptyPayload);
    }
    let header = FrameHeader::display(width, height, format, payload.len())?;
    let mut stream = Vec::with_capacity(HEADER_LEN + payload.len());
    stream.extend_from_slice(&header.encode());
    stream.extend_from_slice(payload);
    encode_stream(&stream)
}

/// Decoded report fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportView<'a> {
    pub index: u16,
    pub chunk: &'a [u8],
}

/// Decode an output report (with report ID).
pub fn decode_report(report: &[u8]) -> Result<ReportView<'_>, ProtocolError> {
    if report.len() < REPORT_LEN {
        return Err(ProtocolError::ShortBuffer {
            needed: REPORT_LEN,
            actual: report.len(),
        });
    }
    let index = u16::from_le_bytes([report[1], report[2]]);
    let len = usize::from(u16::from_le_bytes([report[3], report[4]]));
    let chunk = report
        .get(5..5 + len.min(CHUNK_DATA_LEN))
        .ok_or(ProtocolError::ShortBuffer {
            needed: 5 + len,
            actual: report.len(),
        })?;
    Ok(ReportView { index, chunk })
}

/// Parse an init reply.
pub fn parse_response(buf: &[u8]) -> Result<HandshakeReply, ProtocolError> {
    if is_booting(buf) {
        return Ok(HandshakeReply::Booting);
    }
    if buf.len() <= MODE_OFFSET {
        return Err(ProtocolError::ShortBuffer {
            needed: MODE_OFFSET + 1,
            actual: buf.len(),
        });
    }
    let magic = [buf[0], buf[1], buf[2], buf[3]];
    if magic != MAGIC {
        return Err(ProtocolError::BadMagic { found: magic });
    }
    Ok(HandshakeReply::Ready(InitResponse::with_mode(buf[MODE_OFFSET])))
}

/// Build a reply as a device would; used by simulated transports.
pub fn encode_response(mode_byte: u8) -> [u8; RESPONSE_LEN] {
    let mut out = [0u8; RESPONSE_LEN];
    out[0..4].copy_from_slice(&MAGIC);
    out[MODE_OFFSET] = mode_byte;
    out
}
