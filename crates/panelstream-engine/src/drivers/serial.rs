//! Serial family: six-byte command words, raw RGB565 in 4 KiB slices.

use std::time::{Duration, Instant};

use panelstream_errors::{DeviceError, PanelError};
use panelstream_protocol::HandshakeReply;
use panelstream_protocol::serial::{COMMAND_LEN, HELLO, SLICE_LEN, display_command, parse_hello_response};
use panelstream_transport::Transport;

use crate::config::HandshakeOptions;
use crate::frame_slot::EncodedFrame;

/// Read exactly `buf.len()` bytes before `timeout` elapses.
fn read_exact<T: Transport + ?Sized>(
    transport: &mut T,
    buf: &mut [u8],
    timeout: Duration,
) -> Result<(), DeviceError> {
    let deadline = Instant::now() + timeout;
    let mut filled = 0;
    while filled < buf.len() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(DeviceError::timeout(
                transport.location(),
                timeout.as_millis() as u64,
            ));
        }
        let Some(rest) = buf.get_mut(filled..) else {
            break;
        };
        filled += transport.read(rest, remaining)?;
    }
    Ok(())
}

pub fn init_exchange<T: Transport + ?Sized>(
    transport: &mut T,
    options: &HandshakeOptions,
) -> Result<HandshakeReply, PanelError> {
    transport.write_all(&HELLO, options.write_timeout())?;
    let mut reply = [0u8; COMMAND_LEN];
    read_exact(transport, &mut reply, options.response_timeout())?;
    Ok(HandshakeReply::Ready(parse_hello_response(&reply)?))
}

pub fn send_frame<T: Transport + ?Sized>(
    transport: &mut T,
    frame: &EncodedFrame,
    timeout: Duration,
) -> Result<(), PanelError> {
    let command = display_command(frame.width, frame.height)?;
    transport.write_all(&command, timeout)?;
    for slice in frame.data.chunks(SLICE_LEN) {
        transport.write_all(slice, timeout)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelstream_catalog::{PixelFormat, TransportKind};
    use panelstream_protocol::serial::{CMD_DISPLAY, decode_command_word};
    use panelstream_transport::mock::MockTransport;

    #[test]
    fn hello_reply_split_across_reads() -> Result<(), PanelError> {
        let handle = MockTransport::new(TransportKind::Serial, "/dev/ttyUSB0");
        handle.queue_read(vec![0x35; 2]);
        handle.queue_read(vec![0x35; 4]);
        let mut t = handle.clone();
        let reply = init_exchange(&mut t, &HandshakeOptions::default())?;
        assert!(matches!(reply, HandshakeReply::Ready(ref r) if r.mode_byte == Some(0x35)));
        assert_eq!(handle.write_history(), vec![HELLO.to_vec()]);
        Ok(())
    }

    #[test]
    fn missing_reply_times_out() {
        let mut t = MockTransport::new(TransportKind::Serial, "/dev/ttyUSB0");
        let err = init_exchange(&mut t, &HandshakeOptions::default());
        assert!(matches!(err, Err(PanelError::Device(DeviceError::Timeout { .. }))));
    }

    #[test]
    fn frame_is_command_then_slices() -> Result<(), PanelError> {
        let handle = MockTransport::new(TransportKind::Serial, "/dev/ttyUSB0");
        let mut t = handle.clone();
        let frame = EncodedFrame::new(vec![0; 320 * 480 * 2], 320, 480, PixelFormat::Rgb565, 0);
        send_frame(&mut t, &frame, Duration::from_millis(5))?;
        let writes = handle.write_history();
        let command: [u8; COMMAND_LEN] = writes[0]
            .as_slice()
            .try_into()
            .map_err(|e| PanelError::encode(format!("{e}")))?;
        assert_eq!(decode_command_word(&command), (0, 0, 319, 479, CMD_DISPLAY));
        assert_eq!(writes.len(), 1 + (320 * 480 * 2usize).div_ceil(SLICE_LEN));
        assert!(writes[1..].iter().all(|w| w.len() <= SLICE_LEN));
        Ok(())
    }
}
