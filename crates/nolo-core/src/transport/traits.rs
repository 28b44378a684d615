//! USB transport layer abstraction.
//!
//! `UsbHost` enumerates the bus tree and opens devices; `UsbDeviceHandle`
//! covers the bring-up calls and vendor control transfers an open device
//! needs. Both have a production implementation (nusb) and a scripted mock.

use std::time::Duration;

use thiserror::Error;

use super::bus::{UsbBus, UsbDeviceNode};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("device not found: VID={vendor_id:04x} PID={product_id:04x}")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("bus enumeration failed: {0}")]
    EnumerationFailed(String),

    #[error("failed to open device: {0}")]
    OpenFailed(String),

    #[error("failed to claim interface {interface}: {message}")]
    ClaimInterfaceFailed { interface: u8, message: String },

    #[error("failed to set alternate setting {alt_setting}: {message}")]
    AltSettingFailed { alt_setting: u8, message: String },

    #[error("failed to set configuration {configuration}: {message}")]
    ConfigurationFailed { configuration: u8, message: String },

    #[error("no interface claimed")]
    InterfaceNotClaimed,

    #[error("control transfer failed: {0}")]
    TransferFailed(String),
}

/// Host-side view of the USB subsystem.
///
/// `enumerate_buses` takes a fresh snapshot on every call; discovery never
/// caches a previous scan. `open` resolves a node from the most recent
/// snapshot.
pub trait UsbHost: Send {
    type Handle: UsbDeviceHandle;

    /// Snapshot all buses with their device trees.
    fn enumerate_buses(&mut self) -> Result<Vec<UsbBus>, TransportError>;

    /// Open the device that `node` described in the last snapshot.
    fn open(&mut self, node: &UsbDeviceNode) -> Result<Self::Handle, TransportError>;
}

/// An open USB device.
///
/// Dropping the handle releases the claimed interface and the device.
pub trait UsbDeviceHandle: Send {
    /// Ask the OS to detach its kernel driver from `interface`.
    ///
    /// Best effort: returns `false` where the platform cannot do this or
    /// the detach fails. Bring-up continues either way.
    fn detach_kernel_driver(&mut self, interface: u8) -> bool {
        let _ = interface;
        false
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), TransportError>;

    /// Select an alternate setting on the claimed interface.
    fn set_alt_setting(&mut self, alt_setting: u8) -> Result<(), TransportError>;

    fn set_configuration(&mut self, configuration: u8) -> Result<(), TransportError>;

    /// Vendor control transfer, device to host.
    fn control_in(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        length: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;

    /// Vendor control transfer, host to device. Returns the bytes accepted.
    fn control_out(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;
}
