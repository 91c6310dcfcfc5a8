//! Authoritative model table.

use crate::ids::{bulk, hid, identifiers, scsi, serial};
use crate::model::{ModelId, PanelModel, PixelFormat, ProtocolKind};

#[allow(clippy::too_many_arguments)]
const fn entry(
    id: ModelId,
    name: &'static str,
    native: (u32, u32),
    render: (u32, u32),
    usb: (u16, u16),
    protocol: ProtocolKind,
    pixel_format: PixelFormat,
    identifier: Option<&'static str>,
    mode_byte: Option<u8>,
) -> PanelModel {
    PanelModel {
        id,
        name,
        native_width: native.0,
        native_height: native.1,
        render_width: render.0,
        render_height: render.1,
        vendor_id: usb.0,
        product_id: usb.1,
        transport: protocol.transport(),
        protocol,
        pixel_format,
        identifier,
        mode_byte,
    }
}

const BULK: (u16, u16) = (bulk::VENDOR_ID, bulk::PRODUCT_ID);
const HID: (u16, u16) = (hid::VENDOR_ID, hid::PRODUCT_ID);
const HID_LANDSCAPE: (u16, u16) = (hid::LANDSCAPE_VENDOR_ID, hid::LANDSCAPE_PRODUCT_ID);
const SCSI: (u16, u16) = (scsi::VENDOR_ID, scsi::PRODUCT_ID);
const SCSI_LARGE: (u16, u16) = (scsi::LARGE_VENDOR_ID, scsi::LARGE_PRODUCT_ID);
const SERIAL: (u16, u16) = (serial::VENDOR_ID, serial::PRODUCT_ID);

/// Every known panel model.
pub static MODELS: &[PanelModel] = &[
    // ── Bulk ────────────────────────────────────────────────────────
    entry(
        ModelId::BulkSquare480,
        "Bulk LCD 2.8\" 480x480",
        (480, 480),
        (480, 480),
        BULK,
        ProtocolKind::BulkDisplay,
        PixelFormat::Rgb565,
        Some(identifiers::SSCRM_V1),
        None,
    ),
    entry(
        ModelId::BulkSquare320,
        "Bulk LCD 2.1\" 320x320",
        (320, 320),
        (320, 320),
        BULK,
        ProtocolKind::BulkDisplay,
        PixelFormat::Jpeg,
        Some(identifiers::SSCRM_V3),
        Some(0x01),
    ),
    entry(
        ModelId::BulkSquare240,
        "Bulk LCD 1.5\" 240x240",
        (240, 240),
        (240, 240),
        BULK,
        ProtocolKind::BulkDisplay,
        PixelFormat::Jpeg,
        Some(identifiers::SSCRM_V3),
        Some(0x02),
    ),
    entry(
        ModelId::BulkBar1920,
        "Bulk LCD 9.2\" 1920x480 bar",
        (1920, 480),
        (960, 240),
        BULK,
        ProtocolKind::BulkDisplay,
        PixelFormat::Jpeg,
        Some(identifiers::SSCRM_V4),
        None,
    ),
    // ── HID ─────────────────────────────────────────────────────────
    entry(
        ModelId::HidPortrait240,
        "HID LCD 2.4\" 240x320",
        (240, 320),
        (240, 320),
        HID,
        ProtocolKind::HidReport,
        PixelFormat::Jpeg,
        None,
        Some(0x10),
    ),
    entry(
        ModelId::HidSquare320,
        "HID LCD 2.1\" 320x320",
        (320, 320),
        (320, 320),
        HID,
        ProtocolKind::HidReport,
        PixelFormat::Jpeg,
        None,
        Some(0x11),
    ),
    entry(
        ModelId::HidSquare480,
        "HID LCD 2.8\" 480x480",
        (480, 480),
        (480, 480),
        HID,
        ProtocolKind::HidReport,
        PixelFormat::Jpeg,
        None,
        Some(0x12),
    ),
    entry(
        ModelId::HidLandscape320,
        "HID LCD 2.4\" 320x240",
        (320, 240),
        (320, 240),
        HID_LANDSCAPE,
        ProtocolKind::HidReport,
        PixelFormat::Jpeg,
        None,
        Some(0x13),
    ),
    // ── SCSI ────────────────────────────────────────────────────────
    entry(
        ModelId::ScsiSquare240,
        "USBLCD 1.5\" 240x240",
        (240, 240),
        (240, 240),
        SCSI,
        ProtocolKind::ScsiLcd,
        PixelFormat::Rgb565,
        None,
        Some(0x24),
    ),
    entry(
        ModelId::ScsiLandscape320,
        "USBLCD 2.4\" 320x240",
        (320, 240),
        (320, 240),
        SCSI,
        ProtocolKind::ScsiLcd,
        PixelFormat::Rgb565BigEndian,
        None,
        Some(0x32),
    ),
    entry(
        ModelId::ScsiSquare320,
        "USBLCD 2.1\" 320x320",
        (320, 320),
        (320, 320),
        SCSI,
        ProtocolKind::ScsiLcd,
        PixelFormat::Rgb565BigEndian,
        None,
        Some(0x64),
    ),
    entry(
        ModelId::ScsiSquare480,
        "USBLCD 2.8\" 480x480",
        (480, 480),
        (480, 480),
        SCSI_LARGE,
        ProtocolKind::ScsiLcd,
        PixelFormat::Rgb565BigEndian,
        None,
        Some(0x65),
    ),
    // ── Serial ──────────────────────────────────────────────────────
    entry(
        ModelId::SerialPortrait320,
        "Serial LCD 3.5\" 320x480",
        (320, 480),
        (320, 480),
        SERIAL,
        ProtocolKind::SerialLcd,
        PixelFormat::Rgb565,
        None,
        Some(0x35),
    ),
    entry(
        ModelId::SerialPortrait480,
        "Serial LCD 5\" 480x800",
        (480, 800),
        (480, 800),
        SERIAL,
        ProtocolKind::SerialLcd,
        PixelFormat::Rgb565,
        None,
        Some(0x50),
    ),
];
