//! An opened, claimed and configured device.
//!
//! `DeviceSession` is what discovery hands back: the open handle plus the
//! catalog signature that matched. The protocol client drives it through
//! `submit`. Closing consumes the session, so the handle is released exactly
//! once and a closed session cannot be reused.

use tracing::{debug, info};

use crate::catalog::DeviceSignature;
use crate::protocol::{CONTROL_TIMEOUT, CommandData, ControlCommand};
use crate::transport::{TransportError, UsbDeviceHandle};

pub struct DeviceSession<H: UsbDeviceHandle> {
    handle: H,
    signature: &'static DeviceSignature,
}

impl<H: UsbDeviceHandle> DeviceSession<H> {
    pub fn new(handle: H, signature: &'static DeviceSignature) -> Self {
        Self { handle, signature }
    }

    /// The catalog entry this device matched.
    pub fn signature(&self) -> &'static DeviceSignature {
        self.signature
    }

    /// Run one control transfer. Queries return the response bytes; writes
    /// return an empty buffer.
    pub fn submit(&mut self, command: &ControlCommand<'_>) -> Result<Vec<u8>, TransportError> {
        debug!(
            request = command.request,
            value = command.value,
            index = command.index,
            direction = ?command.direction(),
            "control transfer"
        );
        match command.data {
            CommandData::Query { length } => {
                let data = self.handle.control_in(
                    command.request,
                    command.value,
                    command.index,
                    length,
                    CONTROL_TIMEOUT,
                )?;
                Ok(data)
            }
            CommandData::Write(payload) => {
                self.handle.control_out(
                    command.request,
                    command.value,
                    command.index,
                    payload,
                    CONTROL_TIMEOUT,
                )?;
                Ok(Vec::new())
            }
        }
    }

    /// Release the device.
    pub fn close(self) {
        info!(
            vid = %format!("{:04x}", self.signature.vendor_id),
            pid = %format!("{:04x}", self.signature.product_id),
            "Closing USB device"
        );
        drop(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DeviceCatalog;
    use crate::transport::mock::{MockHandle, MockTransfer};

    fn nolo_session() -> (MockHandle, DeviceSession<MockHandle>) {
        let handle = MockHandle::new();
        let signature = DeviceCatalog::builtin().find(0x0421, 0x0105).unwrap();
        (handle.clone(), DeviceSession::new(handle, signature))
    }

    #[test]
    fn query_routes_to_control_in() {
        let (handle, mut session) = nolo_session();
        handle.queue_response(&[0, 0, 0, 0]);

        let data = session.submit(&ControlCommand::query(1, 0, 0, 4)).unwrap();
        assert_eq!(data, vec![0, 0, 0, 0]);
        assert_eq!(
            handle.transfers(),
            vec![MockTransfer::In {
                request: 1,
                value: 0,
                index: 0,
                length: 4,
            }]
        );
    }

    #[test]
    fn write_routes_to_control_out_and_returns_empty() {
        let (handle, mut session) = nolo_session();

        let data = session
            .submit(&ControlCommand::write(19, 0, 0, b"ask"))
            .unwrap();
        assert!(data.is_empty());
        assert_eq!(
            handle.transfers(),
            vec![MockTransfer::Out {
                request: 19,
                value: 0,
                index: 0,
                data: b"ask".to_vec(),
            }]
        );
    }

    #[test]
    fn transport_failures_surface_as_errors() {
        let (_handle, mut session) = nolo_session();
        // Nothing queued: the mock fails the transfer.
        assert!(session.submit(&ControlCommand::query(1, 0, 0, 4)).is_err());
    }
}
