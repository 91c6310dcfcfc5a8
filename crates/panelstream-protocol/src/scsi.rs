//! SCSI LCD family: vendor commands over SG_IO.
//!
//! # Command descriptor block (16 bytes)
//!
//! | Byte   | Field |
//! |--------|-------|
//! | 0      | protocol marker `0xF5` |
//! | 1      | direction (`0` poll/read, `1` write) |
//! | 2      | sub-mode (`0` poll/init, `1` frame) |
//! | 3      | chunk index |
//! | 12..16 | transfer length, u32 LE |
//!
//! The poll reply is [`POLL_LEN`] bytes: mode byte at 0, booting sentinel at 4..8.

use panelstream_errors::ProtocolError;

use crate::response::{HandshakeReply, InitResponse, is_booting};

/// CDB length.
pub const CDB_LEN: usize = 16;
/// First CDB byte of every vendor command.
pub const MARKER: u8 = 0xF5;
/// Poll/init data block size.
pub const POLL_LEN: usize = 0xE100;
/// Frame chunk size.
pub const CHUNK_LEN: usize = 0x10000;
/// Chunk index is one byte.
pub const MAX_CHUNKS: usize = 256;
/// Largest frame payload.
pub const MAX_FRAME_LEN: usize = CHUNK_LEN * MAX_CHUNKS;

/// Data direction encoded in CDB byte 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Read = 0,
    Write = 1,
}

/// Sub-mode encoded in CDB byte 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SubMode {
    PollOrInit = 0,
    Frame = 1,
}

/// Vendor command descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cdb {
    pub direction: Direction,
    pub sub_mode: SubMode,
    pub chunk_index: u8,
    pub transfer_len: u32,
}

impl Cdb {
    /// Poll: read [`POLL_LEN`] bytes.
    pub const fn poll() -> Self {
        Self {
            direction: Direction::Read,
            sub_mode: SubMode::PollOrInit,
            chunk_index: 0,
            transfer_len: POLL_LEN as u32,
        }
    }

    /// Init: write [`POLL_LEN`] zero bytes.
    pub const fn init() -> Self {
        Self {
            direction: Direction::Write,
            sub_mode: SubMode::PollOrInit,
            chunk_index: 0,
            transfer_len: POLL_LEN as u32,
        }
    }

    /// Frame chunk write.
    pub const fn frame_chunk(chunk_index: u8, len: u32) -> Self {
        Self {
            direction: Direction::Write,
            sub_mode: SubMode::Frame,
            chunk_index,
            transfer_len: len,
        }
    }

    pub fn encode(&self) -> [u8; CDB_LEN] {
        let mut cdb = [0u8; CDB_LEN];
        cdb[0] = MARKER;
        cdb[1] = self.direction as u8;
        cdb[2] = self.sub_mode as u8;
        cdb[3] = self.chunk_index;
        cdb[12..16].copy_from_slice(&self.transfer_len.to_le_bytes());
        cdb
    }

    pub fn decode(cdb: &[u8]) -> Result<Self, ProtocolError> {
        let cdb: &[u8; CDB_LEN] =
            cdb.get(..CDB_LEN)
                .and_then(|b| b.try_into().ok())
                .ok_or(ProtocolError::ShortBuffer {
                    needed: CDB_LEN,
                    actual: cdb.len(),
                })?;
        if cdb[0] != MARKER {
            return Err(ProtocolError::BadMagic {
                found: [cdb[0], cdb[1], cdb[2], cdb[3]],
            });
        }
        let direction = if cdb[1] == 0 {
            Direction::Read
        } else {
            Direction::Write
        };
        let sub_mode = if cdb[2] == 0 {
            SubMode::PollOrInit
        } else {
            SubMode::Frame
        };
        Ok(Self {
            direction,
            sub_mode,
            chunk_index: cdb[3],
            transfer_len: u32::from_le_bytes([cdb[12], cdb[13], cdb[14], cdb[15]]),
        })
    }
}

/// Number of chunks for a payload of `len` bytes.
pub const fn chunk_count(len: usize) -> usize {
    len.div_ceil(CHUNK_LEN)
}

/// One frame chunk ready to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameChunk<'a> {
    pub index: u8,
    pub data: &'a [u8],
}

impl FrameChunk<'_> {
    pub fn cdb(&self) -> Cdb {
        // data.len() <= CHUNK_LEN
        Cdb::frame_chunk(self.index, self.data.len() as u32)
    }
}

/// Split a frame payload into sequentially indexed chunks.
pub fn frame_chunks(payload: &[u8]) -> Result<impl Iterator<Item = FrameChunk<'_>>, ProtocolError> {
    if payload.is_empty() {
        return Err(ProtocolError::EmptyPayload);
    }
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }
    Ok(payload
        .chunks(CHUNK_LEN)
        .zip(0u8..=u8::MAX)
        .map(|(data, index)| FrameChunk { index, data }))
}

/// Parse a poll reply.
pub fn parse_poll_response(buf: &[u8]) -> Result<HandshakeReply, ProtocolError> {
    if is_booting(buf) {
        return Ok(HandshakeReply::Booting);
    }
    let Some(&mode) = buf.first() else {
        return Err(ProtocolError::ShortBuffer {
            needed: 1,
            actual: 0,
        });
    };
    Ok(HandshakeReply::Ready(InitResponse::with_mode(mode)))
}

/// Build a poll reply as a device would; used by simulated transports.
pub fn encode_poll_response(mode_byte: u8) -> Vec<u8> {
    let mut out = vec![0u8; POLL_LEN];
    out[0] = mode_byte;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_cdb_layout() {
        let cdb = Cdb::poll().encode();
        assert_eq!(cdb[0], 0xF5);
        assert_eq!(cdb[1], 0);
        assert_eq!(cdb[2], 0);
        assert_eq!(&cdb[12..16], &0xE100u32.to_le_bytes());
    }

    #[test]
    fn frame_cdb_round_trip() -> Result<(), ProtocolError> {
        let cdb = Cdb::frame_chunk(7, 0x10000);
        let bytes = cdb.encode();
        assert_eq!(bytes[1], 1);
        assert_eq!(bytes[2], 1);
        assert_eq!(bytes[3], 7);
        assert_eq!(Cdb::decode(&bytes)?, cdb);
        Ok(())
    }

    #[test]
    fn chunking_exact_multiple() -> Result<(), ProtocolError> {
        let payload = vec![1u8; CHUNK_LEN * 2];
        let chunks: Vec<_> = frame_chunks(&payload)?.collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].data.len(), CHUNK_LEN);
        assert_eq!(chunks[1].index, 1);
        Ok(())
    }

    #[test]
    fn chunking_limits() {
        assert!(frame_chunks(&[]).is_err());
        let too_big = vec![0u8; MAX_FRAME_LEN + 1];
        assert!(frame_chunks(&too_big).is_err());
    }

    #[test]
    fn poll_reply_reads_mode_byte() -> Result<(), ProtocolError> {
        assert_eq!(
            parse_poll_response(&encode_poll_response(0x64))?,
            HandshakeReply::Ready(InitResponse::with_mode(0x64))
        );
        Ok(())
    }
}
