//! NOLO-Core: client for the NOLO boot loader on Nokia internet tablets.
//!
//! This crate implements the USB maintenance protocol the boot loader
//! exposes while a tablet sits in flashing mode: discovering the device,
//! claiming its vendor interface and driving queries and register writes
//! over control transfers.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Catalog**: Known USB signatures and the device models behind them
//! - **Protocol**: Constants, control commands, R&D flags, version words
//! - **Transport**: USB communication abstraction (nusb, mock) and bus topology
//! - **Discovery**: Wait for a catalog device and bring it up
//! - **Session**: An opened, claimed device
//! - **Client**: The NOLO maintenance operations
//! - **Events**: Observer pattern for UI decoupling
//! - **Config**: Optional TOML settings
//!
//! # Example
//!
//! ```no_run
//! use nolo_core::client::NoloClient;
//! use nolo_core::discovery::DeviceDiscovery;
//! use nolo_core::transport::NusbHost;
//!
//! let mut discovery = DeviceDiscovery::new(NusbHost::new());
//! let session = discovery.discover_and_open().expect("no usable device");
//!
//! let mut client = NoloClient::new(session);
//! client.initialize().expect("boot loader not ready");
//! println!("NOLO {}", client.nolo_version().expect("version query failed"));
//! ```

pub mod catalog;
pub mod client;
pub mod config;
pub mod discovery;
pub mod events;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use catalog::{DeviceCatalog, DeviceModel, DeviceSignature, FlashProtocol};
pub use client::{BootMode, NoloClient};
pub use config::FlasherConfig;
pub use discovery::DeviceDiscovery;
pub use events::{NoloEvent, NoloObserver, NullObserver, SetupStep, TracingObserver};
pub use protocol::{ControlCommand, ProtocolError, RdFlagSet, VersionTriple};
pub use session::DeviceSession;
pub use transport::{MockHandle, MockHost, NusbHost, TransportError, UsbDeviceHandle, UsbHost};
