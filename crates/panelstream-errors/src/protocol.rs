//! Wire-format errors raised by the I/O-free protocol codecs.

/// Protocol encode/decode errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Buffer shorter than the structure being decoded
    #[error("Buffer too short: need {needed} bytes, got {actual}")]
    ShortBuffer {
        /// Minimum length required
        needed: usize,
        /// Actual length
        actual: usize,
    },

    /// Magic marker mismatch
    #[error("Bad magic marker: {found:02x?}")]
    BadMagic {
        /// Bytes found where the marker was expected
        found: [u8; 4],
    },

    /// Header command code not recognised
    #[error("Unknown command code {0:#x}")]
    UnknownCommand(u32),

    /// Payload cannot be expressed by the frame protocol
    #[error("Payload of {len} bytes exceeds the protocol limit of {max} bytes")]
    PayloadTooLarge {
        /// Payload length
        len: usize,
        /// Protocol limit
        max: usize,
    },

    /// Frame payload is empty
    #[error("Empty frame payload")]
    EmptyPayload,

    /// Geometry outside the range the command word can encode
    #[error("Geometry {width}x{height} not encodable")]
    BadGeometry {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
}
