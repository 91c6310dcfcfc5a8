//! SCSI family: vendor CDBs over SG_IO, 64 KiB frame chunks.
//!
//! Every command must complete with clean SCSI, host and driver status. The
//! transport turns anything else into an error, which aborts the frame.

use std::time::Duration;

use panelstream_errors::PanelError;
use panelstream_protocol::HandshakeReply;
use panelstream_protocol::scsi::{Cdb, POLL_LEN, frame_chunks, parse_poll_response};
use panelstream_transport::{ScsiData, Transport};
use tracing::trace;

use crate::config::HandshakeOptions;
use crate::frame_slot::EncodedFrame;

/// Poll for the mode byte, then send the init block once the device is up.
pub fn init_exchange<T: Transport + ?Sized>(
    transport: &mut T,
    options: &HandshakeOptions,
) -> Result<HandshakeReply, PanelError> {
    let mut poll = vec![0u8; POLL_LEN];
    transport.scsi_command(
        &Cdb::poll().encode(),
        ScsiData::FromDevice(&mut poll),
        options.response_timeout(),
    )?;
    let reply = parse_poll_response(&poll)?;
    if reply == HandshakeReply::Booting {
        return Ok(reply);
    }
    let init = vec![0u8; POLL_LEN];
    transport.scsi_command(
        &Cdb::init().encode(),
        ScsiData::ToDevice(&init),
        options.write_timeout(),
    )?;
    Ok(reply)
}

pub fn send_frame<T: Transport + ?Sized>(
    transport: &mut T,
    frame: &EncodedFrame,
    timeout: Duration,
) -> Result<(), PanelError> {
    for chunk in frame_chunks(&frame.data)? {
        trace!(index = chunk.index, len = chunk.data.len(), "Sending frame chunk");
        transport.scsi_command(&chunk.cdb().encode(), ScsiData::ToDevice(chunk.data), timeout)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelstream_catalog::{PixelFormat, TransportKind};
    use panelstream_errors::DeviceError;
    use panelstream_protocol::scsi::{CHUNK_LEN, Direction, SubMode, encode_poll_response};
    use panelstream_transport::mock::{MockTransport, ScsiPhase};

    #[test]
    fn poll_then_init() -> Result<(), PanelError> {
        let handle = MockTransport::new(TransportKind::Scsi, "/dev/sg1");
        handle.queue_scsi_reply(encode_poll_response(0x64));
        let mut t = handle.clone();
        let reply = init_exchange(&mut t, &HandshakeOptions::default())?;
        assert!(matches!(reply, HandshakeReply::Ready(ref r) if r.mode_byte == Some(0x64)));
        let log = handle.scsi_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].phase, ScsiPhase::FromDevice(POLL_LEN));
        let init = Cdb::decode(&log[1].cdb)?;
        assert_eq!(init.direction, Direction::Write);
        assert_eq!(init.sub_mode, SubMode::PollOrInit);
        Ok(())
    }

    #[test]
    fn booting_poll_skips_init() -> Result<(), PanelError> {
        let handle = MockTransport::new(TransportKind::Scsi, "/dev/sg1");
        let mut poll = encode_poll_response(0);
        poll[4..8].copy_from_slice(&panelstream_protocol::BOOTING_SENTINEL);
        handle.queue_scsi_reply(poll);
        let mut t = handle.clone();
        assert_eq!(init_exchange(&mut t, &HandshakeOptions::default())?, HandshakeReply::Booting);
        assert_eq!(handle.scsi_log().len(), 1);
        Ok(())
    }

    #[test]
    fn frame_chunks_sequential() -> Result<(), PanelError> {
        let handle = MockTransport::new(TransportKind::Scsi, "/dev/sg1");
        let mut t = handle.clone();
        let data = vec![0x5A; 320 * 320 * 2];
        let frame = EncodedFrame::new(data, 320, 320, PixelFormat::Rgb565BigEndian, 0);
        send_frame(&mut t, &frame, Duration::from_millis(5))?;
        let log = handle.scsi_log();
        assert_eq!(log.len(), 4);
        for (i, record) in log.iter().enumerate() {
            let cdb = Cdb::decode(&record.cdb)?;
            assert_eq!(usize::from(cdb.chunk_index), i);
            assert_eq!(cdb.sub_mode, SubMode::Frame);
        }
        assert!(matches!(&log[3].phase, ScsiPhase::ToDevice(d) if d.len() == 204_800 - 3 * CHUNK_LEN));
        Ok(())
    }

    #[test]
    fn bad_status_aborts_frame() {
        let handle = MockTransport::new(TransportKind::Scsi, "/dev/sg1");
        handle.fail_next_scsi(DeviceError::ScsiStatus {
            device: "/dev/sg1".into(),
            status: 2,
            host_status: 0,
            driver_status: 0,
        });
        let mut t = handle.clone();
        let frame = EncodedFrame::new(vec![1; 200_000], 1, 1, PixelFormat::Jpeg, 0);
        assert!(send_frame(&mut t, &frame, Duration::from_millis(5)).is_err());
        assert!(handle.scsi_log().is_empty());
    }
}
