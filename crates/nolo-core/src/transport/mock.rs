//! Mock USB host and device handle for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::bus::{UsbBus, UsbDeviceNode};
use super::traits::{TransportError, UsbDeviceHandle, UsbHost};

/// One recorded control transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockTransfer {
    In {
        request: u8,
        value: u16,
        index: u16,
        length: usize,
    },
    Out {
        request: u8,
        value: u16,
        index: u16,
        data: Vec<u8>,
    },
}

/// One recorded bring-up call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupCall {
    DetachKernelDriver(u8),
    ClaimInterface(u8),
    SetAltSetting(u8),
    SetConfiguration(u8),
}

#[derive(Default)]
struct HandleState {
    /// Queued responses for control-in transfers.
    responses: VecDeque<Vec<u8>>,
    /// Every control transfer, in order.
    transfers: Vec<MockTransfer>,
    /// Every bring-up call, in order.
    setup_calls: Vec<SetupCall>,
    detach_succeeds: bool,
    fail_claim: bool,
    fail_alt_setting: bool,
    fail_configuration: bool,
}

/// Scripted device handle. Clones share state, so tests keep a probe after
/// moving a clone into a session.
#[derive(Clone, Default)]
pub struct MockHandle {
    inner: Arc<Mutex<HandleState>>,
}

impl MockHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the response for the next control-in transfer.
    pub fn queue_response(&self, bytes: &[u8]) {
        self.inner.lock().unwrap().responses.push_back(bytes.to_vec());
    }

    /// All control transfers seen so far.
    pub fn transfers(&self) -> Vec<MockTransfer> {
        self.inner.lock().unwrap().transfers.clone()
    }

    /// All bring-up calls seen so far.
    pub fn setup_calls(&self) -> Vec<SetupCall> {
        self.inner.lock().unwrap().setup_calls.clone()
    }

    /// Make `detach_kernel_driver` report success.
    pub fn support_detach(&self) {
        self.inner.lock().unwrap().detach_succeeds = true;
    }

    pub fn fail_claim(&self) {
        self.inner.lock().unwrap().fail_claim = true;
    }

    pub fn fail_alt_setting(&self) {
        self.inner.lock().unwrap().fail_alt_setting = true;
    }

    pub fn fail_configuration(&self) {
        self.inner.lock().unwrap().fail_configuration = true;
    }
}

impl UsbDeviceHandle for MockHandle {
    fn detach_kernel_driver(&mut self, interface: u8) -> bool {
        let mut state = self.inner.lock().unwrap();
        state.setup_calls.push(SetupCall::DetachKernelDriver(interface));
        state.detach_succeeds
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        let mut state = self.inner.lock().unwrap();
        state.setup_calls.push(SetupCall::ClaimInterface(interface));
        if state.fail_claim {
            return Err(TransportError::ClaimInterfaceFailed {
                interface,
                message: "scripted failure".into(),
            });
        }
        Ok(())
    }

    fn set_alt_setting(&mut self, alt_setting: u8) -> Result<(), TransportError> {
        let mut state = self.inner.lock().unwrap();
        state.setup_calls.push(SetupCall::SetAltSetting(alt_setting));
        if state.fail_alt_setting {
            return Err(TransportError::AltSettingFailed {
                alt_setting,
                message: "scripted failure".into(),
            });
        }
        Ok(())
    }

    fn set_configuration(&mut self, configuration: u8) -> Result<(), TransportError> {
        let mut state = self.inner.lock().unwrap();
        state.setup_calls.push(SetupCall::SetConfiguration(configuration));
        if state.fail_configuration {
            return Err(TransportError::ConfigurationFailed {
                configuration,
                message: "scripted failure".into(),
            });
        }
        Ok(())
    }

    fn control_in(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        length: usize,
        _timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let mut state = self.inner.lock().unwrap();
        state.transfers.push(MockTransfer::In {
            request,
            value,
            index,
            length,
        });
        let mut response = state
            .responses
            .pop_front()
            .ok_or_else(|| TransportError::TransferFailed("no queued response".into()))?;
        response.truncate(length);
        Ok(response)
    }

    fn control_out(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        let mut state = self.inner.lock().unwrap();
        state.transfers.push(MockTransfer::Out {
            request,
            value,
            index,
            data: data.to_vec(),
        });
        Ok(data.len())
    }
}

#[derive(Default)]
struct HostState {
    /// Bus snapshots handed out per scan, in order.
    scans: VecDeque<Vec<UsbBus>>,
    /// Opened (bus, address) pairs.
    opens: Vec<(String, u8)>,
    fail_open: bool,
    scan_count: usize,
}

/// Scripted USB host. Clones share state.
///
/// Every `enumerate_buses` call consumes one queued scan; running out of
/// script is an enumeration error so a mis-scripted test fails instead of
/// spinning in the discovery loop.
#[derive(Clone, Default)]
pub struct MockHost {
    inner: Arc<Mutex<HostState>>,
    handle: MockHandle,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the snapshot returned by the next scan.
    pub fn push_scan(&self, buses: Vec<UsbBus>) {
        self.inner.lock().unwrap().scans.push_back(buses);
    }

    /// The handle every successful `open` returns a clone of.
    pub fn handle(&self) -> MockHandle {
        self.handle.clone()
    }

    pub fn fail_open(&self) {
        self.inner.lock().unwrap().fail_open = true;
    }

    pub fn opens(&self) -> Vec<(String, u8)> {
        self.inner.lock().unwrap().opens.clone()
    }

    pub fn scan_count(&self) -> usize {
        self.inner.lock().unwrap().scan_count
    }
}

impl UsbHost for MockHost {
    type Handle = MockHandle;

    fn enumerate_buses(&mut self) -> Result<Vec<UsbBus>, TransportError> {
        let mut state = self.inner.lock().unwrap();
        state.scan_count += 1;
        state
            .scans
            .pop_front()
            .ok_or_else(|| TransportError::EnumerationFailed("scan script exhausted".into()))
    }

    fn open(&mut self, node: &UsbDeviceNode) -> Result<Self::Handle, TransportError> {
        let mut state = self.inner.lock().unwrap();
        state.opens.push((node.bus_id.clone(), node.address));
        if state.fail_open {
            return Err(TransportError::OpenFailed("scripted failure".into()));
        }
        Ok(self.handle.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_responses_come_back_in_order() {
        let mut handle = MockHandle::new();
        handle.queue_response(&[1, 0, 0, 0]);
        handle.queue_response(&[0, 0, 0, 0]);

        let timeout = Duration::from_millis(2000);
        assert_eq!(
            handle.control_in(1, 0, 0, 4, timeout).unwrap(),
            vec![1, 0, 0, 0]
        );
        assert_eq!(
            handle.control_in(1, 0, 0, 4, timeout).unwrap(),
            vec![0, 0, 0, 0]
        );
        assert!(handle.control_in(1, 0, 0, 4, timeout).is_err());
    }

    #[test]
    fn responses_are_truncated_to_requested_length() {
        let mut handle = MockHandle::new();
        handle.queue_response(&[1, 2, 3, 4, 5, 6]);
        let out = handle
            .control_in(17, 0, 1, 1, Duration::from_millis(2000))
            .unwrap();
        assert_eq!(out, vec![1]);
    }

    #[test]
    fn transfers_and_setup_calls_are_captured() {
        let mut handle = MockHandle::new();
        handle.claim_interface(2).unwrap();
        handle
            .control_out(16, 1, 0, &[], Duration::from_millis(2000))
            .unwrap();

        assert_eq!(handle.setup_calls(), vec![SetupCall::ClaimInterface(2)]);
        assert_eq!(
            handle.transfers(),
            vec![MockTransfer::Out {
                request: 16,
                value: 1,
                index: 0,
                data: vec![],
            }]
        );
    }

    #[test]
    fn scripted_claim_failure_is_reported() {
        let mut handle = MockHandle::new();
        handle.fail_claim();
        assert!(matches!(
            handle.claim_interface(2),
            Err(TransportError::ClaimInterfaceFailed { interface: 2, .. })
        ));
    }

    #[test]
    fn detach_is_unsupported_unless_scripted() {
        let mut handle = MockHandle::new();
        assert!(!handle.detach_kernel_driver(2));
        handle.support_detach();
        assert!(handle.detach_kernel_driver(2));
    }

    #[test]
    fn exhausted_scan_script_is_an_enumeration_error() {
        let mut host = MockHost::new();
        host.push_scan(Vec::new());
        assert!(host.enumerate_buses().is_ok());
        assert!(matches!(
            host.enumerate_buses(),
            Err(TransportError::EnumerationFailed(_))
        ));
    }
}
