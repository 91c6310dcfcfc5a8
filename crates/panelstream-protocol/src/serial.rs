//! Serial family: 6-byte command words over a 115200-baud line.
//!
//! A command word packs a rectangle and an opcode:
//! `[x>>2, (x&3)<<6 | y>>4, (y&15)<<4 | ex>>6, (ex&63)<<2 | ey>>8, ey&0xFF, cmd]`.
//! Coordinates are 10 bits wide.

use panelstream_errors::ProtocolError;

use crate::response::InitResponse;

/// Command word length.
pub const COMMAND_LEN: usize = 6;
/// Hello opcode, sent as six identical bytes.
pub const HELLO_BYTE: u8 = 0x45;
/// Hello command.
pub const HELLO: [u8; COMMAND_LEN] = [HELLO_BYTE; COMMAND_LEN];
/// Display-bitmap opcode.
pub const CMD_DISPLAY: u8 = 0xC5;
/// Payload slice size per write.
pub const SLICE_LEN: usize = 4096;
/// Largest encodable coordinate.
pub const MAX_COORD: u16 = 0x3FF;

/// Pack a command word.
pub fn command_word(x: u16, y: u16, ex: u16, ey: u16, cmd: u8) -> Result<[u8; COMMAND_LEN], ProtocolError> {
    if [x, y, ex, ey].iter().any(|&c| c > MAX_COORD) {
        return Err(ProtocolError::BadGeometry {
            width: u32::from(ex) + 1,
            height: u32::from(ey) + 1,
        });
    }
    // Each operand is masked to one byte below.
    Ok([
        (x >> 2) as u8,
        (((x & 3) << 6) | (y >> 4)) as u8,
        (((y & 15) << 4) | (ex >> 6)) as u8,
        (((ex & 63) << 2) | (ey >> 8)) as u8,
        (ey & 0xFF) as u8,
        cmd,
    ])
}

/// Unpack a command word into `(x, y, ex, ey, cmd)`.
pub fn decode_command_word(word: &[u8; COMMAND_LEN]) -> (u16, u16, u16, u16, u8) {
    let b = word.map(u16::from);
    let x = (b[0] << 2) | (b[1] >> 6);
    let y = ((b[1] & 0x3F) << 4) | (b[2] >> 4);
    let ex = ((b[2] & 0x0F) << 6) | (b[3] >> 2);
    let ey = ((b[3] & 0x03) << 8) | b[4];
    (x, y, ex, ey, word[5])
}

/// Display command covering a full `width` x `height` frame.
pub fn display_command(width: u32, height: u32) -> Result<[u8; COMMAND_LEN], ProtocolError> {
    let bad = ProtocolError::BadGeometry { width, height };
    if width == 0 || height == 0 {
        return Err(bad);
    }
    let ex = u16::try_from(width - 1).ok();
    let ey = u16::try_from(height - 1).ok();
    match (ex, ey) {
        (Some(ex), Some(ey)) => command_word(0, 0, ex, ey, CMD_DISPLAY),
        _ => Err(bad),
    }
}

/// Parse a hello reply: six bytes all equal to the mode byte.
pub fn parse_hello_response(buf: &[u8]) -> Result<InitResponse, ProtocolError> {
    let reply = buf.get(..COMMAND_LEN).ok_or(ProtocolError::ShortBuffer {
        needed: COMMAND_LEN,
        actual: buf.len(),
    })?;
    let first = reply[0];
    if first == HELLO_BYTE || reply.iter().any(|&b| b != first) {
        tracing::debug!(?reply, "Serial hello reply is not a mode-byte echo");
        return Ok(InitResponse::default());
    }
    Ok(InitResponse::with_mode(first))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_command_for_320x480() -> Result<(), ProtocolError> {
        let word = display_command(320, 480)?;
        assert_eq!(word[5], CMD_DISPLAY);
        assert_eq!(decode_command_word(&word), (0, 0, 319, 479, CMD_DISPLAY));
        Ok(())
    }

    #[test]
    fn coordinates_over_ten_bits_rejected() {
        assert!(command_word(0, 0, 1024, 0, CMD_DISPLAY).is_err());
        assert!(display_command(0, 10).is_err());
        assert!(display_command(2000, 10).is_err());
    }

    #[test]
    fn hello_reply_mode_byte() -> Result<(), ProtocolError> {
        assert_eq!(parse_hello_response(&[0x35; 6])?.mode_byte, Some(0x35));
        assert!(parse_hello_response(&[0x35, 0x35, 0, 0x35, 0x35, 0x35])?.is_empty());
        // A bare echo of the hello is no identity at all.
        assert!(parse_hello_response(&HELLO)?.is_empty());
        assert!(parse_hello_response(&[0x35; 3]).is_err());
        Ok(())
    }
}
