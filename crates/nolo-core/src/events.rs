//! Event system for UI decoupling.
//!
//! Discovery reports its progress through an observer instead of printing;
//! a CLI can render ticks as a replace-in-place status line, a GUI can feed
//! them to a widget, tests can ignore them.

use std::fmt;

/// Bring-up steps performed on a matched device, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    /// Opening the USB device.
    Open,
    /// Detaching the kernel driver from the interface (best effort).
    DetachKernelDriver,
    /// Claiming the interface.
    ClaimInterface,
    /// Selecting the alternate setting.
    SetAltSetting,
    /// Selecting the configuration.
    SetConfiguration,
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupStep::Open => write!(f, "Opening USB device"),
            SetupStep::DetachKernelDriver => write!(f, "Detaching kernel driver"),
            SetupStep::ClaimInterface => write!(f, "Claiming USB interface"),
            SetupStep::SetAltSetting => write!(f, "Setting alternate interface"),
            SetupStep::SetConfiguration => write!(f, "Setting USB configuration"),
        }
    }
}

/// Events emitted while waiting for and bringing up a device.
#[derive(Debug, Clone)]
pub enum NoloEvent {
    /// One scan pass is starting. Transient status; `spinner` rotates
    /// through `/ - \ |`.
    ScanTick { spinner: char },
    /// A catalog signature matched an enumerated device.
    DeviceFound {
        /// Identification line, e.g.
        /// `SU-18/RX-44/RX-48/RX-51 (0x0421:0x0105) in NOLO mode`.
        summary: String,
        vendor_id: u16,
        product_id: u16,
    },
    /// A bring-up step is starting. Transient status.
    Setup { step: SetupStep },
    /// The device is open, claimed and configured.
    SessionOpened { vendor_id: u16, product_id: u16 },
}

/// Observer trait for receiving discovery events.
///
/// Implement this in the UI layer to receive updates.
pub trait NoloObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &NoloEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl NoloObserver for NullObserver {
    fn on_event(&self, _event: &NoloEvent) {
        // Do nothing
    }
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl NoloObserver for TracingObserver {
    fn on_event(&self, event: &NoloEvent) {
        match event {
            NoloEvent::ScanTick { .. } => {
                tracing::trace!("Scanning USB buses");
            }
            NoloEvent::DeviceFound {
                summary,
                vendor_id,
                product_id,
            } => {
                tracing::info!(
                    vid = %format!("{:04x}", vendor_id),
                    pid = %format!("{:04x}", product_id),
                    "Found USB device {}",
                    summary
                );
            }
            NoloEvent::Setup { step } => {
                tracing::debug!("{}", step);
            }
            NoloEvent::SessionOpened {
                vendor_id,
                product_id,
            } => {
                tracing::info!(
                    vid = %format!("{:04x}", vendor_id),
                    pid = %format!("{:04x}", product_id),
                    "Device ready"
                );
            }
        }
    }
}
