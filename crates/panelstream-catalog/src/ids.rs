//! Vendor ID and product ID constants for the supported panel families.
//!
//! Several families reuse one vid/pid pair for multiple physical panels. Those
//! pairs can only be resolved to a model through a live handshake.

/// Bulk-transfer panels (one vid/pid shared by every model in the family).
pub mod bulk {
    /// Vendor ID.
    pub const VENDOR_ID: u16 = 0x87AD;
    /// Product ID shared by all bulk models.
    pub const PRODUCT_ID: u16 = 0x70DB;
}

/// HID-report panels.
pub mod hid {
    /// Vendor ID of the multi-model HID bridge.
    pub const VENDOR_ID: u16 = 0x0416;
    /// Product ID of the multi-model HID bridge.
    pub const PRODUCT_ID: u16 = 0x5302;
    /// Vendor ID of the single-model landscape HID panel.
    pub const LANDSCAPE_VENDOR_ID: u16 = 0x0418;
    /// Product ID of the single-model landscape HID panel.
    pub const LANDSCAPE_PRODUCT_ID: u16 = 0x5303;
}

/// Panels emulating USB mass storage, driven through SCSI generic.
pub mod scsi {
    /// Vendor ID of the multi-model SCSI bridge.
    pub const VENDOR_ID: u16 = 0x0402;
    /// Product ID of the multi-model SCSI bridge.
    pub const PRODUCT_ID: u16 = 0x3922;
    /// Vendor ID of the 480x480 SCSI panel.
    pub const LARGE_VENDOR_ID: u16 = 0x0416;
    /// Product ID of the 480x480 SCSI panel.
    pub const LARGE_PRODUCT_ID: u16 = 0x5406;
    /// Substring of the SCSI INQUIRY vendor field identifying the family.
    pub const VENDOR_MARKER: &str = "USBLCD";
}

/// Panels behind a USB-serial bridge.
pub mod serial {
    /// Vendor ID of the USB-serial bridge.
    pub const VENDOR_ID: u16 = 0x1A86;
    /// Product ID of the USB-serial bridge.
    pub const PRODUCT_ID: u16 = 0x5722;
    /// Line rate the panels expect.
    pub const BAUD_RATE: u32 = 115_200;
}

/// Device identifier strings reported by the bulk family during handshake.
pub mod identifiers {
    /// 480x480 uncompressed panel.
    pub const SSCRM_V1: &str = "SSCRM-V1";
    /// Small square JPEG panels, disambiguated by mode byte.
    pub const SSCRM_V3: &str = "SSCRM-V3";
    /// 1920x480 bar panel.
    pub const SSCRM_V4: &str = "SSCRM-V4";
}
