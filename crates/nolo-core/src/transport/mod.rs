//! Transport layer module.

pub mod bus;
pub mod mock;
pub mod nusb;
pub mod traits;

pub use bus::{Preorder, UsbBus, UsbDeviceNode};
pub use mock::{MockHandle, MockHost, MockTransfer, SetupCall};
pub use nusb::{NusbHandle, NusbHost};
pub use traits::{TransportError, UsbDeviceHandle, UsbHost};
