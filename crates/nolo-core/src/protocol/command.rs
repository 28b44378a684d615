//! Typed control-transfer command.
//!
//! A `ControlCommand` is built per operation, handed to
//! `DeviceSession::submit` and dropped; nothing retains one.

use super::constants::{REQUEST_TYPE_QUERY, REQUEST_TYPE_WRITE};

/// Transfer direction, fixing the request-type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to device.
    Write,
    /// Device to host.
    Query,
}

impl Direction {
    /// The bmRequestType byte this direction puts on the wire.
    pub const fn request_type(self) -> u8 {
        match self {
            Direction::Write => REQUEST_TYPE_WRITE,
            Direction::Query => REQUEST_TYPE_QUERY,
        }
    }
}

/// Data stage of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandData<'a> {
    /// Outbound payload (may be empty).
    Write(&'a [u8]),
    /// Expected response length.
    Query { length: usize },
}

/// One NOLO control request: request code, wValue, wIndex and a data stage.
#[derive(Debug, Clone, Copy)]
pub struct ControlCommand<'a> {
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub data: CommandData<'a>,
}

impl<'a> ControlCommand<'a> {
    /// Host-to-device command carrying `payload`.
    pub fn write(request: u8, value: u16, index: u16, payload: &'a [u8]) -> Self {
        ControlCommand {
            request,
            value,
            index,
            data: CommandData::Write(payload),
        }
    }

    /// Device-to-host command expecting up to `length` bytes back.
    pub fn query(request: u8, value: u16, index: u16, length: usize) -> Self {
        ControlCommand {
            request,
            value,
            index,
            data: CommandData::Query { length },
        }
    }

    pub fn direction(&self) -> Direction {
        match self.data {
            CommandData::Write(_) => Direction::Write,
            CommandData::Query { .. } => Direction::Query,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_maps_to_request_type_bytes() {
        let set = ControlCommand::write(16, 1, 2, &[]);
        assert_eq!(set.direction(), Direction::Write);
        assert_eq!(set.direction().request_type(), 64);

        let get = ControlCommand::query(17, 0, 2, 4);
        assert_eq!(get.direction(), Direction::Query);
        assert_eq!(get.direction().request_type(), 192);
    }

    #[test]
    fn constructors_carry_fields_through() {
        let payload = b"root=/dev/mmcblk0";
        let cmd = ControlCommand::write(130, 1, 0, payload);
        assert_eq!(cmd.request, 130);
        assert_eq!(cmd.value, 1);
        assert_eq!(cmd.index, 0);
        assert_eq!(cmd.data, CommandData::Write(payload.as_slice()));
    }
}
