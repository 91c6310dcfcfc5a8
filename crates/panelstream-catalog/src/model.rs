//! Catalog entry types.

use core::fmt;

use serde::{Deserialize, Serialize};

/// OS-level mechanism used to reach a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Raw USB bulk endpoints
    UsbBulk,
    /// HID output/input reports
    Hid,
    /// USB-serial or CDC-ACM tty
    Serial,
    /// SCSI generic pass-through
    Scsi,
}

impl TransportKind {
    /// All transport kinds, in discovery order.
    pub const ALL: [TransportKind; 4] = [
        TransportKind::UsbBulk,
        TransportKind::Hid,
        TransportKind::Serial,
        TransportKind::Scsi,
    ];

    /// Short lowercase name used in logs and on the command line.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransportKind::UsbBulk => "usb-bulk",
            TransportKind::Hid => "hid",
            TransportKind::Serial => "serial",
            TransportKind::Scsi => "scsi",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "usb-bulk" | "usb_bulk" | "bulk" => Ok(TransportKind::UsbBulk),
            "hid" => Ok(TransportKind::Hid),
            "serial" | "tty" => Ok(TransportKind::Serial),
            "scsi" | "sg" => Ok(TransportKind::Scsi),
            other => Err(format!("unknown transport kind '{other}'")),
        }
    }
}

/// Wire protocol family. One driver per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    /// 64-byte header + payload in one bulk write
    BulkDisplay,
    /// 64-byte header + payload split across indexed HID reports
    HidReport,
    /// Vendor SCSI commands with 64 KiB chunks
    ScsiLcd,
    /// 6-byte command words over a serial line
    SerialLcd,
}

impl ProtocolKind {
    /// Transport this protocol runs over.
    pub const fn transport(&self) -> TransportKind {
        match self {
            ProtocolKind::BulkDisplay => TransportKind::UsbBulk,
            ProtocolKind::HidReport => TransportKind::Hid,
            ProtocolKind::ScsiLcd => TransportKind::Scsi,
            ProtocolKind::SerialLcd => TransportKind::Serial,
        }
    }

    /// Protocol spoken over a given transport.
    pub const fn for_transport(kind: TransportKind) -> Self {
        match kind {
            TransportKind::UsbBulk => ProtocolKind::BulkDisplay,
            TransportKind::Hid => ProtocolKind::HidReport,
            TransportKind::Scsi => ProtocolKind::ScsiLcd,
            TransportKind::Serial => ProtocolKind::SerialLcd,
        }
    }
}

/// Pixel encoding a panel accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Baseline JPEG
    Jpeg,
    /// 16-bit 5-6-5, little-endian
    Rgb565,
    /// 16-bit 5-6-5, big-endian
    Rgb565BigEndian,
}

impl PixelFormat {
    /// Bytes per pixel for raw formats, `None` for compressed ones.
    pub const fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            PixelFormat::Jpeg => None,
            PixelFormat::Rgb565 | PixelFormat::Rgb565BigEndian => Some(2),
        }
    }

    /// Exact payload size of a raw frame, `None` for compressed formats.
    pub fn raw_frame_len(&self, width: u32, height: u32) -> Option<usize> {
        let bpp = self.bytes_per_pixel()?;
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(bpp)
    }
}

/// Stable tag for every catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelId {
    /// Bulk, `SSCRM-V1`, 480x480
    BulkSquare480,
    /// Bulk, `SSCRM-V3` mode 0x01, 320x320
    BulkSquare320,
    /// Bulk, `SSCRM-V3` mode 0x02, 240x240
    BulkSquare240,
    /// Bulk, `SSCRM-V4`, 1920x480 bar
    BulkBar1920,
    /// HID mode 0x10, 240x320
    HidPortrait240,
    /// HID mode 0x11, 320x320
    HidSquare320,
    /// HID mode 0x12, 480x480
    HidSquare480,
    /// HID 0418:5303, 320x240
    HidLandscape320,
    /// SCSI mode 0x24, 240x240
    ScsiSquare240,
    /// SCSI mode 0x32, 320x240
    ScsiLandscape320,
    /// SCSI mode 0x64, 320x320
    ScsiSquare320,
    /// SCSI 0416:5406, 480x480
    ScsiSquare480,
    /// Serial mode 0x35, 320x480
    SerialPortrait320,
    /// Serial mode 0x50, 480x800
    SerialPortrait480,
}

/// Immutable catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PanelModel {
    pub id: ModelId,
    pub name: &'static str,
    pub native_width: u32,
    pub native_height: u32,
    /// Encode resolution; may be smaller than the physical panel.
    pub render_width: u32,
    pub render_height: u32,
    pub vendor_id: u16,
    pub product_id: u16,
    pub transport: TransportKind,
    pub protocol: ProtocolKind,
    pub pixel_format: PixelFormat,
    /// ASCII identifier returned in the handshake response.
    pub identifier: Option<&'static str>,
    /// Mode ("PM") byte returned in the handshake response.
    pub mode_byte: Option<u8>,
}

impl PanelModel {
    /// Render resolution as `(width, height)`.
    pub const fn render_size(&self) -> (u32, u32) {
        (self.render_width, self.render_height)
    }

    /// Whether this entry matches a vid/pid pair.
    pub const fn matches_vid_pid(&self, vid: u16, pid: u16) -> bool {
        self.vendor_id == vid && self.product_id == pid
    }
}

impl fmt::Display for PanelModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}x{}, {:04x}:{:04x}, {})",
            self.name,
            self.native_width,
            self.native_height,
            self.vendor_id,
            self.product_id,
            self.transport
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_kind_parses_cli_aliases() -> Result<(), String> {
        assert_eq!("bulk".parse::<TransportKind>()?, TransportKind::UsbBulk);
        assert_eq!("SG".parse::<TransportKind>()?, TransportKind::Scsi);
        assert!("firewire".parse::<TransportKind>().is_err());
        Ok(())
    }

    #[test]
    fn protocol_transport_mapping_is_bijective() {
        for kind in TransportKind::ALL {
            assert_eq!(ProtocolKind::for_transport(kind).transport(), kind);
        }
    }

    #[test]
    fn raw_frame_len_for_rgb565() {
        assert_eq!(PixelFormat::Rgb565.raw_frame_len(480, 480), Some(460_800));
        assert_eq!(PixelFormat::Jpeg.raw_frame_len(480, 480), None);
    }
}
