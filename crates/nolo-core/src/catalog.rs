//! Catalog of known flashable devices.
//!
//! Discovery matches enumerated USB devices against this table. The catalog
//! is an immutable value: callers inject `DeviceCatalog::builtin()` (or a
//! custom static table) into `DeviceDiscovery` instead of consulting a
//! process-wide global.

use std::fmt;

/// Nokia internet tablet hardware generations, by product code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceModel {
    /// Nokia 770.
    Su18,
    /// Nokia N800.
    Rx34,
    /// Nokia N810.
    Rx44,
    /// Nokia N810 WiMAX edition.
    Rx48,
    /// Nokia N900.
    Rx51,
}

impl DeviceModel {
    /// Product code as the boot loader reports it in `prod_code`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceModel::Su18 => "SU-18",
            DeviceModel::Rx34 => "RX-34",
            DeviceModel::Rx44 => "RX-44",
            DeviceModel::Rx48 => "RX-48",
            DeviceModel::Rx51 => "RX-51",
        }
    }

    /// Resolve a reported product code. Returns `None` for codes this
    /// catalog does not know about.
    pub fn from_product_code(code: &str) -> Option<Self> {
        match code {
            "SU-18" => Some(DeviceModel::Su18),
            "RX-34" => Some(DeviceModel::Rx34),
            "RX-44" => Some(DeviceModel::Rx44),
            "RX-48" => Some(DeviceModel::Rx48),
            "RX-51" => Some(DeviceModel::Rx51),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which maintenance protocol a signature speaks once opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashProtocol {
    /// NOLO second-stage boot loader, vendor control transfers.
    Nolo,
    /// Cold flashing of a bricked device.
    Cold,
    /// Mk II protocol of the RX-51 update mode.
    Mkii,
    /// Device exposed as a raw USB mass-storage disk.
    Disk,
}

impl fmt::Display for FlashProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashProtocol::Nolo => write!(f, "NOLO"),
            FlashProtocol::Cold => write!(f, "Cold flashing"),
            FlashProtocol::Mkii => write!(f, "Mk II"),
            FlashProtocol::Disk => write!(f, "RAW disk"),
        }
    }
}

/// One row of the catalog: how to recognise a device on the bus and how to
/// bring it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSignature {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Interface to claim after opening.
    pub interface: u8,
    /// Alternate setting to select, when the mode requires one.
    pub alt_setting: Option<u8>,
    /// Configuration to select, when the mode requires one.
    pub configuration: Option<u8>,
    pub protocol: FlashProtocol,
    /// Models that enumerate with this vendor/product pair.
    pub models: &'static [DeviceModel],
}

impl DeviceSignature {
    /// One-line identification, e.g.
    /// `SU-18/RX-44/RX-48/RX-51 (0x0421:0x0105) in NOLO mode`.
    pub fn description(&self) -> String {
        let models = self
            .models
            .iter()
            .map(DeviceModel::as_str)
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{} ({:#06x}:{:#06x}) in {} mode",
            models, self.vendor_id, self.product_id, self.protocol
        )
    }
}

/// Every vendor/product pair the Nokia maintenance modes enumerate with.
///
/// 0x0421:0x01c8 reports no interface number of its own; it exposes a single
/// interface, claimed as 0.
static BUILTIN_SIGNATURES: [DeviceSignature; 6] = [
    DeviceSignature {
        vendor_id: 0x0421,
        product_id: 0x0105,
        interface: 2,
        alt_setting: Some(1),
        configuration: None,
        protocol: FlashProtocol::Nolo,
        models: &[
            DeviceModel::Su18,
            DeviceModel::Rx44,
            DeviceModel::Rx48,
            DeviceModel::Rx51,
        ],
    },
    DeviceSignature {
        vendor_id: 0x0421,
        product_id: 0x0106,
        interface: 0,
        alt_setting: None,
        configuration: None,
        protocol: FlashProtocol::Cold,
        models: &[DeviceModel::Rx51],
    },
    DeviceSignature {
        vendor_id: 0x0421,
        product_id: 0x01c7,
        interface: 0,
        alt_setting: None,
        configuration: None,
        protocol: FlashProtocol::Disk,
        models: &[DeviceModel::Rx51],
    },
    DeviceSignature {
        vendor_id: 0x0421,
        product_id: 0x01c8,
        interface: 0,
        alt_setting: None,
        configuration: None,
        protocol: FlashProtocol::Mkii,
        models: &[DeviceModel::Rx51],
    },
    DeviceSignature {
        vendor_id: 0x0421,
        product_id: 0x0431,
        interface: 0,
        alt_setting: None,
        configuration: None,
        protocol: FlashProtocol::Disk,
        models: &[DeviceModel::Su18, DeviceModel::Rx34],
    },
    DeviceSignature {
        vendor_id: 0x0421,
        product_id: 0x3f00,
        interface: 2,
        alt_setting: Some(1),
        configuration: None,
        protocol: FlashProtocol::Nolo,
        models: &[DeviceModel::Rx34],
    },
];

/// Immutable signature lookup table.
#[derive(Debug, Clone, Copy)]
pub struct DeviceCatalog {
    entries: &'static [DeviceSignature],
}

impl DeviceCatalog {
    /// The built-in table of all known signatures.
    pub fn builtin() -> Self {
        DeviceCatalog {
            entries: &BUILTIN_SIGNATURES,
        }
    }

    /// A catalog over a caller-provided table.
    pub fn new(entries: &'static [DeviceSignature]) -> Self {
        DeviceCatalog { entries }
    }

    /// First signature matching the vendor/product pair, if any.
    pub fn find(&self, vendor_id: u16, product_id: u16) -> Option<&'static DeviceSignature> {
        self.entries
            .iter()
            .find(|sig| sig.vendor_id == vendor_id && sig.product_id == product_id)
    }

    pub fn entries(&self) -> &'static [DeviceSignature] {
        self.entries
    }
}

impl Default for DeviceCatalog {
    fn default() -> Self {
        DeviceCatalog::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_known_signatures() {
        let catalog = DeviceCatalog::builtin();
        let sig = catalog.find(0x0421, 0x0105).unwrap();
        assert_eq!(sig.protocol, FlashProtocol::Nolo);
        assert_eq!(sig.interface, 2);
        assert_eq!(sig.alt_setting, Some(1));
        assert_eq!(sig.configuration, None);
        assert_eq!(sig.models.len(), 4);

        let cold = catalog.find(0x0421, 0x0106).unwrap();
        assert_eq!(cold.protocol, FlashProtocol::Cold);
        assert_eq!(cold.alt_setting, None);
    }

    #[test]
    fn unknown_pairs_do_not_match() {
        let catalog = DeviceCatalog::builtin();
        assert!(catalog.find(0x0421, 0x9999).is_none());
        assert!(catalog.find(0x1d6b, 0x0002).is_none());
    }

    #[test]
    fn description_lists_models_and_protocol() {
        let catalog = DeviceCatalog::builtin();
        let sig = catalog.find(0x0421, 0x0105).unwrap();
        assert_eq!(
            sig.description(),
            "SU-18/RX-44/RX-48/RX-51 (0x0421:0x0105) in NOLO mode"
        );
    }

    #[test]
    fn vendor_product_pairs_are_unique() {
        let entries = DeviceCatalog::builtin().entries();
        for (i, a) in entries.iter().enumerate() {
            assert!(!a.models.is_empty());
            for b in &entries[i + 1..] {
                assert!(
                    (a.vendor_id, a.product_id) != (b.vendor_id, b.product_id),
                    "duplicate signature {:#06x}:{:#06x}",
                    a.vendor_id,
                    a.product_id
                );
            }
        }
    }

    #[test]
    fn product_codes_round_trip() {
        for model in [
            DeviceModel::Su18,
            DeviceModel::Rx34,
            DeviceModel::Rx44,
            DeviceModel::Rx48,
            DeviceModel::Rx51,
        ] {
            assert_eq!(DeviceModel::from_product_code(model.as_str()), Some(model));
        }
        assert_eq!(DeviceModel::from_product_code("RX-71"), None);
    }
}
