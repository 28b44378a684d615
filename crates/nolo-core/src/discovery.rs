//! Device discovery: wait for a catalog device and bring it up.
//!
//! Every scan takes a fresh bus snapshot and walks it in pre-order. Nothing
//! matching is the normal case and retries forever; once a signature
//! matches, any failure in the bring-up sequence ends discovery with an
//! error instead of falling back to waiting.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::catalog::{DeviceCatalog, DeviceSignature};
use crate::events::{NoloEvent, NoloObserver, SetupStep, TracingObserver};
use crate::session::DeviceSession;
use crate::transport::bus::UsbDeviceNode;
use crate::transport::{UsbDeviceHandle, UsbHost};

/// Spinner glyphs for the waiting status line.
const SPINNER: [char; 4] = ['/', '-', '\\', '|'];

/// Pause between scans.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct DeviceDiscovery<U: UsbHost, O: NoloObserver> {
    host: U,
    catalog: DeviceCatalog,
    observer: Arc<O>,
    poll_interval: Duration,
}

impl<U: UsbHost> DeviceDiscovery<U, TracingObserver> {
    /// Discovery over the built-in catalog, reporting through tracing.
    pub fn new(host: U) -> Self {
        Self::with_observer(host, Arc::new(TracingObserver))
    }
}

impl<U: UsbHost, O: NoloObserver> DeviceDiscovery<U, O> {
    pub fn with_observer(host: U, observer: Arc<O>) -> Self {
        Self {
            host,
            catalog: DeviceCatalog::builtin(),
            observer,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Replace the built-in signature catalog.
    pub fn set_catalog(&mut self, catalog: DeviceCatalog) {
        self.catalog = catalog;
    }

    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    /// Block until a catalog device appears, then open and bring it up.
    #[instrument(skip(self))]
    pub fn discover_and_open(&mut self) -> Result<DeviceSession<U::Handle>> {
        info!("Waiting for USB device");
        let mut tick = 0usize;
        loop {
            self.observer.on_event(&NoloEvent::ScanTick {
                spinner: SPINNER[tick % SPINNER.len()],
            });
            tick = tick.wrapping_add(1);

            let buses = self.host.enumerate_buses()?;
            let matched = buses.iter().find_map(|bus| {
                bus.preorder().find_map(|node| {
                    self.catalog
                        .find(node.vendor_id, node.product_id)
                        .map(|signature| (node, signature))
                })
            });

            if let Some((node, signature)) = matched {
                self.observer.on_event(&NoloEvent::DeviceFound {
                    summary: signature.description(),
                    vendor_id: signature.vendor_id,
                    product_id: signature.product_id,
                });
                return self.bring_up(node, signature);
            }

            thread::sleep(self.poll_interval);
        }
    }

    /// Open, detach, claim and configure a matched device, in that order.
    /// Any failure past the match is final; the handle drops and the device
    /// is released.
    fn bring_up(
        &mut self,
        node: &UsbDeviceNode,
        signature: &'static DeviceSignature,
    ) -> Result<DeviceSession<U::Handle>> {
        self.emit_setup(SetupStep::Open);
        let mut handle = self.host.open(node)?;

        self.emit_setup(SetupStep::DetachKernelDriver);
        if !handle.detach_kernel_driver(signature.interface) {
            debug!(interface = signature.interface, "kernel driver not detached");
        }

        self.emit_setup(SetupStep::ClaimInterface);
        handle.claim_interface(signature.interface)?;

        if let Some(alt_setting) = signature.alt_setting {
            self.emit_setup(SetupStep::SetAltSetting);
            handle.set_alt_setting(alt_setting)?;
        }

        if let Some(configuration) = signature.configuration {
            self.emit_setup(SetupStep::SetConfiguration);
            handle.set_configuration(configuration)?;
        }

        self.observer.on_event(&NoloEvent::SessionOpened {
            vendor_id: signature.vendor_id,
            product_id: signature.product_id,
        });
        Ok(DeviceSession::new(handle, signature))
    }

    fn emit_setup(&self, step: SetupStep) {
        self.observer.on_event(&NoloEvent::Setup { step });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::catalog::{DeviceModel, FlashProtocol};
    use crate::events::NullObserver;
    use crate::transport::bus::UsbBus;
    use crate::transport::mock::{MockHost, SetupCall};

    fn node(
        address: u8,
        vendor_id: u16,
        product_id: u16,
        children: Vec<UsbDeviceNode>,
    ) -> UsbDeviceNode {
        UsbDeviceNode {
            bus_id: "001".to_string(),
            address,
            vendor_id,
            product_id,
            children,
        }
    }

    fn bus(devices: Vec<UsbDeviceNode>) -> Vec<UsbBus> {
        vec![UsbBus {
            id: "001".to_string(),
            devices,
        }]
    }

    fn quick(host: MockHost) -> DeviceDiscovery<MockHost, NullObserver> {
        let mut discovery = DeviceDiscovery::with_observer(host, Arc::new(NullObserver));
        discovery.set_poll_interval(Duration::ZERO);
        discovery
    }

    static DISK_WITH_CONFIG: [DeviceSignature; 1] = [DeviceSignature {
        vendor_id: 0x1234,
        product_id: 0x0001,
        interface: 0,
        alt_setting: None,
        configuration: Some(1),
        protocol: FlashProtocol::Disk,
        models: &[DeviceModel::Rx51],
    }];

    #[test]
    fn finds_device_nested_in_tree() {
        // The only match below the root hub sits on the last child of a
        // chained hub, two levels down; a second match waits as a later
        // sibling of the root.
        let host = MockHost::new();
        host.push_scan(bus(vec![node(
            1,
            0x1d6b,
            0x0002,
            vec![
                node(
                    2,
                    0x05e3,
                    0x0608,
                    vec![node(
                        3,
                        0x05e3,
                        0x0610,
                        vec![node(4, 0xffff, 0xffff, vec![]), node(5, 0x0421, 0x0105, vec![])],
                    )],
                ),
                node(6, 0x0421, 0x0105, vec![]),
            ],
        )]));

        let probe = host.clone();
        let session = quick(host).discover_and_open().unwrap();
        assert_eq!(session.signature().product_id, 0x0105);
        // Pre-order exhausts the hub chain and reaches address 5 before the
        // later sibling at address 6.
        assert_eq!(probe.opens(), vec![("001".to_string(), 5)]);
    }

    #[test]
    fn nolo_setup_sequence_is_detach_claim_alt() {
        let host = MockHost::new();
        host.push_scan(bus(vec![node(2, 0x0421, 0x0105, vec![])]));
        let handle = host.handle();

        quick(host).discover_and_open().unwrap();
        assert_eq!(
            handle.setup_calls(),
            vec![
                SetupCall::DetachKernelDriver(2),
                SetupCall::ClaimInterface(2),
                SetupCall::SetAltSetting(1),
            ]
        );
    }

    #[test]
    fn configuration_is_applied_when_the_signature_asks() {
        let host = MockHost::new();
        host.push_scan(bus(vec![node(2, 0x1234, 0x0001, vec![])]));
        let handle = host.handle();

        let mut discovery = quick(host);
        discovery.set_catalog(DeviceCatalog::new(&DISK_WITH_CONFIG));
        discovery.discover_and_open().unwrap();

        assert_eq!(
            handle.setup_calls(),
            vec![
                SetupCall::DetachKernelDriver(0),
                SetupCall::ClaimInterface(0),
                SetupCall::SetConfiguration(1),
            ]
        );
    }

    #[test]
    fn claim_failure_aborts_discovery() {
        let host = MockHost::new();
        host.push_scan(bus(vec![
            node(2, 0x0421, 0x0105, vec![]),
            node(3, 0x0421, 0x0106, vec![]),
        ]));
        host.handle().fail_claim();

        let probe = host.clone();
        assert!(quick(host).discover_and_open().is_err());
        // No fallback to the second candidate.
        assert_eq!(probe.opens().len(), 1);
    }

    #[test]
    fn open_failure_aborts_discovery() {
        let host = MockHost::new();
        host.push_scan(bus(vec![node(2, 0x0421, 0x0105, vec![])]));
        host.fail_open();

        assert!(quick(host).discover_and_open().is_err());
    }

    #[test]
    fn alt_setting_failure_aborts_discovery() {
        let host = MockHost::new();
        host.push_scan(bus(vec![node(2, 0x0421, 0x0105, vec![])]));
        host.handle().fail_alt_setting();

        assert!(quick(host).discover_and_open().is_err());
    }

    #[test]
    fn configuration_failure_aborts_discovery() {
        let host = MockHost::new();
        host.push_scan(bus(vec![node(2, 0x1234, 0x0001, vec![])]));
        host.handle().fail_configuration();

        let mut discovery = quick(host);
        discovery.set_catalog(DeviceCatalog::new(&DISK_WITH_CONFIG));
        assert!(discovery.discover_and_open().is_err());
    }

    #[test]
    fn empty_scan_retries_until_the_device_appears() {
        let host = MockHost::new();
        host.push_scan(Vec::new());
        host.push_scan(bus(vec![node(2, 0x0421, 0x3f00, vec![])]));

        let probe = host.clone();
        let session = quick(host).discover_and_open().unwrap();
        assert_eq!(session.signature().product_id, 0x3f00);
        assert_eq!(probe.scan_count(), 2);
    }

    #[test]
    fn enumeration_failure_is_fatal() {
        // No scans queued: the first enumeration fails.
        let host = MockHost::new();
        assert!(quick(host).discover_and_open().is_err());
    }

    struct Recorder(Mutex<Vec<NoloEvent>>);

    impl NoloObserver for Recorder {
        fn on_event(&self, event: &NoloEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn events_trace_the_whole_discovery() {
        let host = MockHost::new();
        host.push_scan(Vec::new());
        host.push_scan(bus(vec![node(2, 0x0421, 0x0105, vec![])]));

        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let mut discovery = DeviceDiscovery::with_observer(host, recorder.clone());
        discovery.set_poll_interval(Duration::ZERO);
        discovery.discover_and_open().unwrap();

        let events = recorder.0.lock().unwrap();
        let spinners: Vec<char> = events
            .iter()
            .filter_map(|e| match e {
                NoloEvent::ScanTick { spinner } => Some(*spinner),
                _ => None,
            })
            .collect();
        assert_eq!(spinners, vec!['/', '-']);

        let steps: Vec<SetupStep> = events
            .iter()
            .filter_map(|e| match e {
                NoloEvent::Setup { step } => Some(*step),
                _ => None,
            })
            .collect();
        assert_eq!(
            steps,
            vec![
                SetupStep::Open,
                SetupStep::DetachKernelDriver,
                SetupStep::ClaimInterface,
                SetupStep::SetAltSetting,
            ]
        );
        assert!(matches!(events.last(), Some(NoloEvent::SessionOpened { .. })));
    }
}
