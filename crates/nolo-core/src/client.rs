//! NOLO protocol client.
//!
//! Typed operations over an open `DeviceSession`: status polling,
//! identification fields, the select-then-transfer string store, version
//! numbers, the simple registers and the boot/reboot requests.
//!
//! With simulation enabled the client still performs every read but logs
//! mutating register writes instead of sending them.

use std::fmt;

use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, info};

use crate::catalog::DeviceModel;
use crate::protocol::constants::{
    BOOT_MODE_NORMAL, BOOT_MODE_UPDATE, IDENTIFY_BUFFER_LEN, REG_ADD_RD_FLAGS, REG_DEL_RD_FLAGS,
    REG_RD_MODE, REG_ROOT_DEVICE, REG_USB_HOST_MODE, REQ_BOOT, REQ_GET, REQ_GET_STRING,
    REQ_GET_VERSION, REQ_IDENTIFY, REQ_REBOOT, REQ_SELECT_STRING, REQ_SET, REQ_SET_STRING,
    REQ_STATUS, STRING_BUFFER_LEN, VERSION_KEY_MAX,
};
use crate::protocol::{ControlCommand, ProtocolError, RdFlagSet, VersionTriple};
use crate::session::DeviceSession;
use crate::transport::UsbDeviceHandle;

/// Kernel boot mode carried in the boot request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMode {
    Normal,
    Update,
}

impl BootMode {
    pub const fn value(self) -> u16 {
        match self {
            BootMode::Normal => BOOT_MODE_NORMAL,
            BootMode::Update => BOOT_MODE_UPDATE,
        }
    }
}

impl fmt::Display for BootMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootMode::Normal => write!(f, "normal"),
            BootMode::Update => write!(f, "update"),
        }
    }
}

pub struct NoloClient<H: UsbDeviceHandle> {
    session: DeviceSession<H>,
    simulate: bool,
}

impl<H: UsbDeviceHandle> NoloClient<H> {
    pub fn new(session: DeviceSession<H>) -> Self {
        Self::with_simulation(session, false)
    }

    /// A client that suppresses mutating register writes when `simulate`
    /// is set.
    pub fn with_simulation(session: DeviceSession<H>, simulate: bool) -> Self {
        Self { session, simulate }
    }

    /// Give the session back, e.g. to close it.
    pub fn into_session(self) -> DeviceSession<H> {
        self.session
    }

    /// Release the device.
    pub fn close(self) {
        self.session.close();
    }

    /// Poll the boot-loader status word until it reports idle.
    pub fn initialize(&mut self) -> Result<()> {
        info!("Initializing NOLO");
        loop {
            let resp = self.session.submit(&ControlCommand::query(REQ_STATUS, 0, 0, 4))?;
            if resp.len() < 4 {
                return Err(ProtocolError::Truncated {
                    expected: 4,
                    actual: resp.len(),
                }
                .into());
            }
            let status = LittleEndian::read_u32(&resp);
            if status == 0 {
                return Ok(());
            }
            debug!(status, "Boot loader busy");
        }
    }

    /// Read one field of the identification block.
    ///
    /// The block is a packed sequence of `key`/`value` runs separated by
    /// control bytes. The value is the printable run after the matched key
    /// and its separator.
    pub fn identify_field(&mut self, key: &str) -> Result<String> {
        let resp = self
            .session
            .submit(&ControlCommand::query(REQ_IDENTIFY, 0, 0, IDENTIFY_BUFFER_LEN))?;
        Ok(extract_identify_value(&resp, key)?)
    }

    /// Which model the device reports in `prod_code`.
    pub fn device_model(&mut self) -> Result<DeviceModel> {
        let code = self.identify_field("prod_code")?;
        DeviceModel::from_product_code(&code)
            .ok_or_else(|| ProtocolError::UnknownModel { code }.into())
    }

    /// Hardware revision from the identification block.
    pub fn hardware_revision(&mut self) -> Result<String> {
        self.identify_field("hw_rev")
    }

    /// Fetch the string stored under `key`.
    ///
    /// Select and fetch are two separate transfers; another host talking to
    /// the device in between can change which key is selected.
    pub fn get_text(&mut self, key: &str) -> Result<String> {
        self.select_key(key)?;
        let resp = self
            .session
            .submit(&ControlCommand::query(REQ_GET_STRING, 0, 0, STRING_BUFFER_LEN))?;
        let end = resp.iter().position(|&b| b == 0).unwrap_or(resp.len());
        Ok(String::from_utf8_lossy(&resp[..end]).into_owned())
    }

    /// Store `value` under `key`. Same two-transfer caveat as `get_text`.
    pub fn set_text(&mut self, key: &str, value: &str) -> Result<()> {
        self.select_key(key)?;
        self.session
            .submit(&ControlCommand::write(REQ_SET_STRING, 0, 0, value.as_bytes()))?;
        Ok(())
    }

    fn select_key(&mut self, key: &str) -> Result<()> {
        self.session
            .submit(&ControlCommand::write(REQ_SELECT_STRING, 0, 0, key.as_bytes()))?;
        Ok(())
    }

    /// Fetch the `version:<key>` string. Empty answers are an error here;
    /// a version the device knows about is never blank.
    pub fn get_version_text(&mut self, key: &str) -> Result<String> {
        if key.len() > VERSION_KEY_MAX {
            return Err(ProtocolError::KeyTooLong {
                key: key.to_string(),
                limit: VERSION_KEY_MAX,
            }
            .into());
        }
        let value = self.get_text(&format!("version:{key}"))?;
        if value.is_empty() {
            return Err(ProtocolError::EmptyValue {
                key: key.to_string(),
            }
            .into());
        }
        Ok(value)
    }

    pub fn kernel_version(&mut self) -> Result<String> {
        self.get_version_text("kernel")
    }

    pub fn software_release(&mut self) -> Result<String> {
        self.get_version_text("sw-release")
    }

    pub fn content_version(&mut self) -> Result<String> {
        self.get_version_text("content")
    }

    /// The boot loader's own version, from the packed version word.
    pub fn nolo_version(&mut self) -> Result<VersionTriple> {
        let resp = self
            .session
            .submit(&ControlCommand::query(REQ_GET_VERSION, 0, 0, 4))?;
        if resp.len() < 4 {
            return Err(ProtocolError::Truncated {
                expected: 4,
                actual: resp.len(),
            }
            .into());
        }
        Ok(VersionTriple::from_packed(LittleEndian::read_u32(&resp))?)
    }

    /// Index of the device the kernel boots from.
    pub fn root_device(&mut self) -> Result<u8> {
        let resp = self
            .session
            .submit(&ControlCommand::query(REQ_GET, 0, REG_ROOT_DEVICE, 1))?;
        resp.first().copied().ok_or_else(|| {
            ProtocolError::Truncated {
                expected: 1,
                actual: 0,
            }
            .into()
        })
    }

    pub fn set_root_device(&mut self, device: u8) -> Result<()> {
        info!(device, "Setting root device");
        if self.simulate {
            return Ok(());
        }
        self.session
            .submit(&ControlCommand::write(REQ_SET, device as u16, REG_ROOT_DEVICE, &[]))?;
        Ok(())
    }

    pub fn usb_host_mode(&mut self) -> Result<bool> {
        let resp = self
            .session
            .submit(&ControlCommand::query(REQ_GET, 0, REG_USB_HOST_MODE, 4))?;
        if resp.len() < 4 {
            return Err(ProtocolError::Truncated {
                expected: 4,
                actual: resp.len(),
            }
            .into());
        }
        Ok(LittleEndian::read_u32(&resp) != 0)
    }

    pub fn set_usb_host_mode(&mut self, enable: bool) -> Result<()> {
        info!("{} USB host mode", if enable { "Enabling" } else { "Disabling" });
        if self.simulate {
            return Ok(());
        }
        self.session.submit(&ControlCommand::write(
            REQ_SET,
            enable as u16,
            REG_USB_HOST_MODE,
            &[],
        ))?;
        Ok(())
    }

    pub fn rd_mode(&mut self) -> Result<bool> {
        let resp = self
            .session
            .submit(&ControlCommand::query(REQ_GET, 0, REG_RD_MODE, 1))?;
        resp.first().map(|&b| b != 0).ok_or_else(|| {
            ProtocolError::Truncated {
                expected: 1,
                actual: 0,
            }
            .into()
        })
    }

    pub fn set_rd_mode(&mut self, enable: bool) -> Result<()> {
        info!("{} R&D mode", if enable { "Enabling" } else { "Disabling" });
        if self.simulate {
            return Ok(());
        }
        self.session
            .submit(&ControlCommand::write(REQ_SET, enable as u16, REG_RD_MODE, &[]))?;
        Ok(())
    }

    /// Current R&D flag mask. Bits outside the known set are dropped.
    pub fn rd_flags(&mut self) -> Result<RdFlagSet> {
        let resp = self
            .session
            .submit(&ControlCommand::query(REQ_GET, 0, REG_ADD_RD_FLAGS, 2))?;
        if resp.len() < 2 {
            return Err(ProtocolError::Truncated {
                expected: 2,
                actual: resp.len(),
            }
            .into());
        }
        Ok(RdFlagSet::from_bits_truncate(LittleEndian::read_u16(&resp)))
    }

    /// Replace the whole R&D flag mask with `flags`.
    ///
    /// Two writes: the wanted flags are added, then the complement is
    /// deleted, so together they cover every known flag. The pair is not
    /// transactional; if the delete fails the add has already happened.
    pub fn set_rd_flags(&mut self, flags: RdFlagSet) -> Result<()> {
        if flags.is_empty() {
            info!("Clearing all R&D flags");
        } else {
            info!(flags = %flags, "Setting R&D flags");
        }
        let delete = !flags;
        if self.simulate {
            return Ok(());
        }
        self.session
            .submit(&ControlCommand::write(REQ_SET, flags.bits(), REG_ADD_RD_FLAGS, &[]))?;
        self.session
            .submit(&ControlCommand::write(REQ_SET, delete.bits(), REG_DEL_RD_FLAGS, &[]))?;
        Ok(())
    }

    /// Boot the kernel.
    ///
    /// A cmdline starting with the `update` token (alone or followed by a
    /// separator) selects update mode; the rest of the line, if any,
    /// replaces the default cmdline. Any other non-empty cmdline boots
    /// normally with that line; `None` or empty boots with the default.
    pub fn boot(&mut self, cmdline: Option<&str>) -> Result<()> {
        let (mode, payload) = derive_boot_request(cmdline);
        if payload.is_empty() {
            info!(mode = %mode, "Booting kernel with default cmdline");
        } else {
            info!(
                mode = %mode,
                cmdline = %String::from_utf8_lossy(&payload),
                "Booting kernel"
            );
        }
        self.session
            .submit(&ControlCommand::write(REQ_BOOT, mode.value(), 0, &payload))?;
        Ok(())
    }

    /// Reboot the device.
    pub fn reboot(&mut self) -> Result<()> {
        info!("Rebooting device");
        self.session
            .submit(&ControlCommand::write(REQ_REBOOT, 0, 0, &[]))?;
        Ok(())
    }

    /// Present in the boot-loader command surface; performs no transfer.
    pub fn load_image(&mut self, _image: &[u8]) -> Result<()> {
        Err(ProtocolError::Unimplemented {
            operation: "image loading",
        }
        .into())
    }

    /// Present in the boot-loader command surface; performs no transfer.
    pub fn flash_image(&mut self, _image: &[u8]) -> Result<()> {
        Err(ProtocolError::Unimplemented {
            operation: "image flashing",
        }
        .into())
    }

    /// Present in the boot-loader command surface; performs no transfer.
    pub fn set_hardware_revision(&mut self, _revision: &str) -> Result<()> {
        Err(ProtocolError::Unimplemented {
            operation: "setting the hardware revision",
        }
        .into())
    }

    /// Present in the boot-loader command surface; performs no transfer.
    pub fn set_kernel_version(&mut self, _version: &str) -> Result<()> {
        Err(ProtocolError::Unimplemented {
            operation: "setting the kernel version",
        }
        .into())
    }

    /// Present in the boot-loader command surface; performs no transfer.
    pub fn set_nolo_version(&mut self, _version: &str) -> Result<()> {
        Err(ProtocolError::Unimplemented {
            operation: "setting the NOLO version",
        }
        .into())
    }

    /// Present in the boot-loader command surface; performs no transfer.
    pub fn set_software_release(&mut self, _version: &str) -> Result<()> {
        Err(ProtocolError::Unimplemented {
            operation: "setting the software release version",
        }
        .into())
    }

    /// Present in the boot-loader command surface; performs no transfer.
    pub fn set_content_version(&mut self, _version: &str) -> Result<()> {
        Err(ProtocolError::Unimplemented {
            operation: "setting the content version",
        }
        .into())
    }
}

/// Pull the value for `key` out of an identification block.
fn extract_identify_value(buffer: &[u8], key: &str) -> Result<String, ProtocolError> {
    let pattern = key.as_bytes();
    if pattern.is_empty() {
        return Err(ProtocolError::MarkerNotFound {
            key: key.to_string(),
        });
    }
    let start = buffer
        .windows(pattern.len())
        .position(|window| window == pattern)
        .ok_or_else(|| ProtocolError::MarkerNotFound {
            key: key.to_string(),
        })?;

    let sep = start + pattern.len();
    if sep >= buffer.len() {
        return Err(ProtocolError::Truncated {
            expected: sep + 1,
            actual: buffer.len(),
        });
    }
    if buffer[sep] >= 32 {
        return Err(ProtocolError::MissingSeparator {
            key: key.to_string(),
        });
    }

    let mut pos = sep + 1;
    while pos < buffer.len() && buffer[pos] < 32 {
        pos += 1;
    }
    let end = buffer[pos..]
        .iter()
        .position(|&b| b < 32)
        .map(|offset| pos + offset)
        .unwrap_or(buffer.len());

    let value = &buffer[pos..end];
    if value.is_empty() {
        return Err(ProtocolError::EmptyValue {
            key: key.to_string(),
        });
    }
    Ok(String::from_utf8_lossy(value).into_owned())
}

/// Turn a cmdline into the boot mode and data-stage payload.
///
/// Update-mode payloads carry no terminating NUL; normal-mode payloads do.
fn derive_boot_request(cmdline: Option<&str>) -> (BootMode, Vec<u8>) {
    const TOKEN: &[u8] = b"update";

    let bytes = cmdline.unwrap_or("").as_bytes();
    let update = bytes.starts_with(TOKEN)
        && bytes.get(TOKEN.len()).is_none_or(|&after| after <= 32);

    if update {
        let rest = &bytes[TOKEN.len()..];
        let start = rest
            .iter()
            .position(|&b| b > 32)
            .unwrap_or(rest.len());
        (BootMode::Update, rest[start..].to_vec())
    } else if !bytes.is_empty() {
        let mut payload = bytes.to_vec();
        payload.push(0);
        (BootMode::Normal, payload)
    } else {
        (BootMode::Normal, Vec::new())
    }
}
