//! NOLO protocol constants.
//!
//! Every request travels as a vendor control transfer on the claimed
//! interface; the boot loader answers queries in the data stage.

use std::time::Duration;

// ============================================================================
// Control request types (bmRequestType)
// ============================================================================

/// Host to device, vendor, device recipient.
pub const REQUEST_TYPE_WRITE: u8 = 64;
/// Device to host, vendor, device recipient.
pub const REQUEST_TYPE_QUERY: u8 = 192;

/// Timeout applied to every control transfer.
pub const CONTROL_TIMEOUT: Duration = Duration::from_millis(2000);

// ============================================================================
// Request codes (bRequest)
// ============================================================================

/// Boot-loader status word, polled until zero.
pub const REQ_STATUS: u8 = 1;
/// Packed NOLO version word.
pub const REQ_GET_VERSION: u8 = 3;
/// Key/value identification block.
pub const REQ_IDENTIFY: u8 = 4;
/// Write a register (value in wValue, register in wIndex).
pub const REQ_SET: u8 = 16;
/// Read a register (register in wIndex).
pub const REQ_GET: u8 = 17;
/// Select the key for a subsequent string get/set.
pub const REQ_SELECT_STRING: u8 = 18;
/// Store a string under the selected key.
pub const REQ_SET_STRING: u8 = 19;
/// Fetch the string under the selected key.
pub const REQ_GET_STRING: u8 = 20;
/// Boot the kernel (mode in wValue, cmdline in the data stage).
pub const REQ_BOOT: u8 = 130;
/// Reboot the device.
pub const REQ_REBOOT: u8 = 131;

// ============================================================================
// Register indexes (wIndex for REQ_SET / REQ_GET)
// ============================================================================

pub const REG_RD_MODE: u16 = 0;
pub const REG_ROOT_DEVICE: u16 = 1;
pub const REG_USB_HOST_MODE: u16 = 2;
pub const REG_ADD_RD_FLAGS: u16 = 3;
pub const REG_DEL_RD_FLAGS: u16 = 4;

// ============================================================================
// Boot modes (wValue for REQ_BOOT)
// ============================================================================

pub const BOOT_MODE_NORMAL: u16 = 0;
pub const BOOT_MODE_UPDATE: u16 = 1;

// ============================================================================
// Buffer sizes
// ============================================================================

/// Length requested for the identification block.
pub const IDENTIFY_BUFFER_LEN: usize = 512;
/// Length requested for string values.
pub const STRING_BUFFER_LEN: usize = 512;
/// Longest accepted `version:<key>` suffix.
pub const VERSION_KEY_MAX: usize = 500;
