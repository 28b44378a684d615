//! nusb-based USB host implementation.
//!
//! nusb 0.2 API patterns used here:
//! - `list_devices().wait()` for a blocking enumeration snapshot
//! - `device_info.open().wait()` / `device.claim_interface(n).wait()`
//! - `interface.control_in(ControlIn { .. }, timeout).wait()` for vendor
//!   control transfers (likewise `control_out`)

use std::collections::HashMap;
use std::time::Duration;

use nusb::transfer::{ControlIn, ControlOut, ControlType, Recipient};
use nusb::{Device, DeviceInfo, Interface, MaybeFuture, list_devices};
use tracing::debug;

use super::bus::{EnumeratedDevice, UsbBus, UsbDeviceNode, assemble_buses};
use super::traits::{TransportError, UsbDeviceHandle, UsbHost};

/// USB host backed by nusb.
#[derive(Default)]
pub struct NusbHost {
    /// Devices from the most recent scan, keyed by bus id and address.
    seen: HashMap<(String, u8), DeviceInfo>,
}

impl NusbHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UsbHost for NusbHost {
    type Handle = NusbHandle;

    fn enumerate_buses(&mut self) -> Result<Vec<UsbBus>, TransportError> {
        let infos = list_devices()
            .wait()
            .map_err(|e| TransportError::EnumerationFailed(e.to_string()))?;

        self.seen.clear();
        let mut flat = Vec::new();
        for info in infos {
            let bus_id = info.bus_id().to_string();
            flat.push(EnumeratedDevice {
                bus_id: bus_id.clone(),
                address: info.device_address(),
                port_chain: info.port_chain().iter().map(|&p| u32::from(p)).collect(),
                vendor_id: info.vendor_id(),
                product_id: info.product_id(),
            });
            self.seen.insert((bus_id, info.device_address()), info);
        }
        debug!(devices = flat.len(), "USB enumeration snapshot");
        Ok(assemble_buses(flat))
    }

    fn open(&mut self, node: &UsbDeviceNode) -> Result<Self::Handle, TransportError> {
        let info = self
            .seen
            .get(&(node.bus_id.clone(), node.address))
            .ok_or(TransportError::DeviceNotFound {
                vendor_id: node.vendor_id,
                product_id: node.product_id,
            })?;

        let device = info
            .open()
            .wait()
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        Ok(NusbHandle {
            device,
            interface: None,
        })
    }
}

/// An open nusb device.
///
/// The claimed interface lives next to the device; dropping the handle
/// releases both.
pub struct NusbHandle {
    device: Device,
    interface: Option<Interface>,
}

impl NusbHandle {
    fn interface(&self) -> Result<&Interface, TransportError> {
        self.interface
            .as_ref()
            .ok_or(TransportError::InterfaceNotClaimed)
    }
}

impl UsbDeviceHandle for NusbHandle {
    fn detach_kernel_driver(&mut self, interface: u8) -> bool {
        #[cfg(target_os = "linux")]
        {
            self.device.detach_kernel_driver(interface).is_ok()
        }
        #[cfg(not(target_os = "linux"))]
        {
            let _ = interface;
            false
        }
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        let claimed = self.device.claim_interface(interface).wait().map_err(|e| {
            TransportError::ClaimInterfaceFailed {
                interface,
                message: e.to_string(),
            }
        })?;
        self.interface = Some(claimed);
        Ok(())
    }

    fn set_alt_setting(&mut self, alt_setting: u8) -> Result<(), TransportError> {
        self.interface()?
            .set_alt_setting(alt_setting)
            .wait()
            .map_err(|e| TransportError::AltSettingFailed {
                alt_setting,
                message: e.to_string(),
            })
    }

    fn set_configuration(&mut self, configuration: u8) -> Result<(), TransportError> {
        self.device
            .set_configuration(configuration)
            .wait()
            .map_err(|e| TransportError::ConfigurationFailed {
                configuration,
                message: e.to_string(),
            })
    }

    fn control_in(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        length: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let data = self
            .interface()?
            .control_in(
                ControlIn {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request,
                    value,
                    index,
                    length: length as u16,
                },
                timeout,
            )
            .wait()
            .map_err(|e| TransportError::TransferFailed(e.to_string()))?;
        debug!(request, len = data.len(), "control-in complete");
        Ok(data)
    }

    fn control_out(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        self.interface()?
            .control_out(
                ControlOut {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request,
                    value,
                    index,
                    data,
                },
                timeout,
            )
            .wait()
            .map_err(|e| TransportError::TransferFailed(e.to_string()))?;
        debug!(request, len = data.len(), "control-out complete");
        Ok(data.len())
    }
}
