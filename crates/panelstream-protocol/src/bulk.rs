//! Bulk-transfer family: one write per frame, header + payload.
//!
//! The init reply is up to [`RESPONSE_LEN`] bytes:
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0..4   | magic echo |
//! | 4..8   | booting sentinel (while booting) |
//! | 20..28 | ASCII identifier, NUL padded |
//! | 28     | mode byte (`0` = absent) |

use panelstream_catalog::PixelFormat;
use panelstream_errors::ProtocolError;

use crate::header::{FrameHeader, HEADER_LEN, MAGIC};
use crate::response::{HandshakeReply, InitResponse, ascii_field, is_booting, non_zero};

/// Maximum size of an init reply.
pub const RESPONSE_LEN: usize = 1024;

const IDENT_RANGE: core::ops::Range<usize> = 20..28;
const MODE_OFFSET: usize = 28;

/// Init command: the 64-byte init header.
pub fn init_command() -> [u8; HEADER_LEN] {
    FrameHeader::init().encode()
}

/// Build the single bulk write for a frame.
pub fn encode_frame(
    payload: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>, ProtocolError> {
    if payload.is_empty() {
        return Err(ProtocolError::EmptyPayload);
    }
    let header = FrameHeader::display(width, height, format, payload.len())?;
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Parse an init reply.
pub fn parse_response(buf: &[u8]) -> Result<HandshakeReply, ProtocolError> {
    if is_booting(buf) {
        return Ok(HandshakeReply::Booting);
    }
    let needed = MODE_OFFSET + 1;
    if buf.len() < needed {
        return Err(ProtocolError::ShortBuffer {
            needed,
            actual: buf.len(),
        });
    }
    let magic = [buf[0], buf[1], buf[2], buf[3]];
    if magic != MAGIC {
        return Err(ProtocolError::BadMagic { found: magic });
    }
    Ok(HandshakeReply::Ready(InitResponse {
        identifier: buf.get(IDENT_RANGE).and_then(ascii_field),
        mode_byte: non_zero(buf[MODE_OFFSET]),
    }))
}

/// Build a reply as a device would; used by simulated transports.
pub fn encode_response(identifier: &str, mode_byte: u8) -> [u8; RESPONSE_LEN] {
    let mut out = [0u8; RESPONSE_LEN];
    out[0..4].copy_from_slice(&MAGIC);
    let ident = identifier.as_bytes();
    let n = ident.len().min(IDENT_RANGE.len());
    out[IDENT_RANGE.start..IDENT_RANGE.start + n].copy_from_slice(&ident[..n]);
    out[MODE_OFFSET] = mode_byte;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_is_header_then_payload() -> Result<(), ProtocolError> {
        let payload = vec![0xAB; 100];
        let frame = encode_frame(&payload, 240, 240, PixelFormat::Jpeg)?;
        assert_eq!(frame.len(), 164);
        let header = FrameHeader::decode(&frame)?;
        assert_eq!(header.payload_len, 100);
        assert_eq!(&frame[64..], &payload[..]);
        Ok(())
    }

    #[test]
    fn empty_payload_rejected() {
        assert_eq!(
            encode_frame(&[], 1, 1, PixelFormat::Jpeg),
            Err(ProtocolError::EmptyPayload)
        );
    }

    #[test]
    fn parse_identifier_and_mode() -> Result<(), ProtocolError> {
        let reply = parse_response(&encode_response("SSCRM-V3", 0x02))?;
        assert_eq!(
            reply,
            HandshakeReply::Ready(InitResponse {
                identifier: Some("SSCRM-V3".into()),
                mode_byte: Some(0x02),
            })
        );
        Ok(())
    }

    #[test]
    fn parse_booting_before_magic_check() -> Result<(), ProtocolError> {
        let mut buf = [0u8; 16];
        buf[4..8].copy_from_slice(&crate::response::BOOTING_SENTINEL);
        assert_eq!(parse_response(&buf)?, HandshakeReply::Booting);
        Ok(())
    }

    #[test]
    fn parse_short_reply() {
        assert!(matches!(
            parse_response(&MAGIC),
            Err(ProtocolError::ShortBuffer { .. })
        ));
    }
}
