//! HID family: header and payload chunked into indexed 513-byte reports.

use std::time::Duration;

use panelstream_errors::PanelError;
use panelstream_protocol::HandshakeReply;
use panelstream_protocol::hid::{RESPONSE_LEN, encode_frame, init_reports, parse_response};
use panelstream_transport::Transport;

use crate::config::HandshakeOptions;
use crate::frame_slot::EncodedFrame;

pub fn init_exchange<T: Transport + ?Sized>(
    transport: &mut T,
    options: &HandshakeOptions,
) -> Result<HandshakeReply, PanelError> {
    for report in init_reports()? {
        transport.write_all(&report, options.write_timeout())?;
    }
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
    for report in encode_frame(&frame.data, frame.width, frame.height, frame.format)? {
        transport.write_all(&report, timeout)?;
    }
    Ok(())
}
