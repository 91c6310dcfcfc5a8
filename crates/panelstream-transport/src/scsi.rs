//! SCSI generic pass-through transport (`/dev/sg*`, SG_IO ioctl).

use std::time::Duration;

use panelstream_catalog::TransportKind;
use panelstream_errors::{DeviceError, DeviceResult};

use crate::traits::{ScsiData, Transport};

/// Open SCSI generic node.
#[derive(Debug)]
pub struct ScsiTransport {
    #[cfg(target_os = "linux")]
    file: std::fs::File,
    location: String,
}

#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
mod sg {
    use std::os::unix::io::AsRawFd;
    use std::time::Duration;

    use panelstream_errors::{DeviceError, DeviceResult};

    use crate::traits::ScsiData;

    /// SG_IO request number from `<scsi/sg.h>`.
    const SG_IO: libc::c_ulong = 0x2285;
    const SG_DXFER_NONE: libc::c_int = -1;
    const SG_DXFER_TO_DEV: libc::c_int = -2;
    const SG_DXFER_FROM_DEV: libc::c_int = -3;
    const SENSE_LEN: usize = 32;

    /// `struct sg_io_hdr` from `<scsi/sg.h>`.
    #[repr(C)]
    struct SgIoHdr {
        interface_id: libc::c_int,
        dxfer_direction: libc::c_int,
        cmd_len: libc::c_uchar,
        mx_sb_len: libc::c_uchar,
        iovec_count: libc::c_ushort,
        dxfer_len: libc::c_uint,
        dxferp: *mut libc::c_void,
        cmdp: *mut libc::c_uchar,
        sbp: *mut libc::c_uchar,
        timeout: libc::c_uint,
        flags: libc::c_uint,
        pack_id: libc::c_int,
        usr_ptr: *mut libc::c_void,
        status: libc::c_uchar,
        masked_status: libc::c_uchar,
        msg_status: libc::c_uchar,
        sb_len_wr: libc::c_uchar,
        host_status: libc::c_ushort,
        driver_status: libc::c_ushort,
        resid: libc::c_int,
        duration: libc::c_uint,
        info: libc::c_uint,
    }

    pub(super) fn execute(
        file: &std::fs::File,
        location: &str,
        cdb: &[u8],
        data: ScsiData<'_>,
        timeout: Duration,
    ) -> DeviceResult<()> {
        let mut cdb_buf = cdb.to_vec();
        let cmd_len = u8::try_from(cdb_buf.len())
            .map_err(|e| DeviceError::io(location, format!("CDB too long: {e}")))?;
        let mut sense = [0u8; SENSE_LEN];

        let (direction, dxferp, dxfer_len) = match data {
            ScsiData::None => (SG_DXFER_NONE, std::ptr::null_mut(), 0usize),
            // SG_IO does not write through the pointer for TO_DEV transfers.
            ScsiData::ToDevice(buf) => (
                SG_DXFER_TO_DEV,
                buf.as_ptr().cast_mut().cast::<libc::c_void>(),
                buf.len(),
            ),
            ScsiData::FromDevice(buf) => (
                SG_DXFER_FROM_DEV,
                buf.as_mut_ptr().cast::<libc::c_void>(),
                buf.len(),
            ),
        };
        let dxfer_len = libc::c_uint::try_from(dxfer_len)
            .map_err(|e| DeviceError::io(location, format!("transfer too long: {e}")))?;
        let timeout_ms =
            libc::c_uint::try_from(timeout.as_millis()).unwrap_or(libc::c_uint::MAX);

        let mut hdr = SgIoHdr {
            interface_id: libc::c_int::from(b'S'),
            dxfer_direction: direction,
            cmd_len,
            mx_sb_len: SENSE_LEN as libc::c_uchar,
            iovec_count: 0,
            dxfer_len,
            dxferp,
            cmdp: cdb_buf.as_mut_ptr(),
            sbp: sense.as_mut_ptr(),
            timeout: timeout_ms,
            flags: 0,
            pack_id: 0,
            usr_ptr: std::ptr::null_mut(),
            status: 0,
            masked_status: 0,
            msg_status: 0,
            sb_len_wr: 0,
            host_status: 0,
            driver_status: 0,
            resid: 0,
            duration: 0,
            info: 0,
        };

        // SAFETY: `hdr` is a valid sg_io_hdr; the CDB, sense and data buffers it
        // points at live on this stack frame or in `data` for the whole call.
        let rc = unsafe { libc::ioctl(file.as_raw_fd(), SG_IO as _, &mut hdr) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            return Err(DeviceError::from_io(location, &err));
        }

        if hdr.status != 0 || hdr.host_status != 0 || hdr.driver_status != 0 {
            tracing::debug!(
                location,
                status = hdr.status,
                host_status = hdr.host_status,
                driver_status = hdr.driver_status,
                sense = ?&sense[..usize::from(hdr.sb_len_wr).min(SENSE_LEN)],
                "SCSI command failed"
            );
            return Err(DeviceError::ScsiStatus {
                device: location.to_owned(),
                status: hdr.status,
                host_status: hdr.host_status,
                driver_status: hdr.driver_status,
            });
        }
        Ok(())
    }
}

impl ScsiTransport {
    #[cfg(target_os = "linux")]
    pub fn open(location: &str) -> DeviceResult<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(location)
            .map_err(|e| DeviceError::from_io(location, &e))?;
        tracing::debug!(location, "Opened SCSI generic transport");
        Ok(Self {
            file,
            location: location.to_owned(),
        })
    }

    #[cfg(not(target_os = "linux"))]
    pub fn open(_location: &str) -> DeviceResult<Self> {
        Err(DeviceError::unsupported("scsi", "open"))
    }
}

impl Transport for ScsiTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Scsi
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn write(&mut self, _data: &[u8], _timeout: Duration) -> DeviceResult<usize> {
        Err(DeviceError::unsupported("scsi", "write"))
    }

    fn read(&mut self, _buf: &mut [u8], _timeout: Duration) -> DeviceResult<usize> {
        Err(DeviceError::unsupported("scsi", "read"))
    }

    #[cfg(target_os = "linux")]
    fn scsi_command(
        &mut self,
        cdb: &[u8],
        data: ScsiData<'_>,
        timeout: Duration,
    ) -> DeviceResult<()> {
        sg::execute(&self.file, &self.location, cdb, data, timeout)
    }
}
