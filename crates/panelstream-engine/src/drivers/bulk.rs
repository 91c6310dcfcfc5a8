//! Bulk family: init header out, identity reply in, one write per frame.

use std::time::Duration;

use panelstream_errors::PanelError;
use panelstream_protocol::HandshakeReply;
use panelstream_protocol::bulk::{RESPONSE_LEN, encode_frame, init_command, parse_response};
use panelstream_transport::Transport;

use crate::config::HandshakeOptions;
use crate::frame_slot::EncodedFrame;

pub fn init_exchange<T: Transport + ?Sized>(
    transport: &mut T,
    options: &HandshakeOptions,
) -> Result<HandshakeReply, PanelError> {
    transport.write_all(&init_command(), options.write_timeout())?;
    let mut reply = vec![0u8; RESPONSE_LEN];
    let n = transport.read(&mut reply, options.response_timeout())?;
    reply.truncate(n);
    Ok(parse_response(&reply)?)
}

pub fn send_frame<T: Transport + ?Sized>(
    transport: &mut T,
    frame: &EncodedFrame,
    timeout: Duration,
) -> Result<(), PanelError> {
    let data = encode_frame(&frame.data, frame.width, frame.height, frame.format)?;
    transport.write_all(&data, timeout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelstream_catalog::{PixelFormat, TransportKind};
    use panelstream_protocol::{FrameHeader, HEADER_LEN};
    use panelstream_transport::mock::MockTransport;

    #[test]
    fn frame_is_one_write() -> Result<(), PanelError> {
        let handle = MockTransport::new(TransportKind::UsbBulk, "usb:1-1");
        let mut t = handle.clone();
        let frame = EncodedFrame::new(vec![7; 300], 10, 10, PixelFormat::Jpeg, 0);
        send_frame(&mut t, &frame, Duration::from_millis(5))?;
        let writes = handle.write_history();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].len(), HEADER_LEN + 300);
        let header = FrameHeader::decode(&writes[0])?;
        assert_eq!((header.width, header.height, header.payload_len), (10, 10, 300));
        Ok(())
    }

    #[test]
    fn short_reply_is_protocol_error() {
        let handle = MockTransport::new(TransportKind::UsbBulk, "usb:1-1");
        handle.queue_read(vec![0x12, 0x34]);
        let mut t = handle.clone();
        let err = init_exchange(&mut t, &HandshakeOptions::default());
        assert!(matches!(err, Err(PanelError::Protocol(_))));
    }
}
