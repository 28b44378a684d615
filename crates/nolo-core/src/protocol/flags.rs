//! R&D mode flag register.
//!
//! The boot loader stores these as a 16-bit mask; the text form is a
//! comma-separated list in the canonical order below.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Flags of the R&D mode register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RdFlagSet: u16 {
        /// Disable the OMAP watchdog.
        const NO_OMAP_WD       = 0x002;
        /// Disable the external watchdog.
        const NO_EXT_WD        = 0x004;
        /// Disable the lifeguard reset.
        const NO_LIFEGUARD_RESET = 0x008;
        /// Enable the serial console.
        const SERIAL_CONSOLE   = 0x010;
        /// Disable the USB timeout.
        const NO_USB_TIMEOUT   = 0x020;
        /// Enable the STI console.
        const STI_CONSOLE      = 0x040;
        /// Disable charging.
        const NO_CHARGING      = 0x080;
        /// Force power key boot reason.
        const FORCE_POWER_KEY  = 0x100;
    }
}

/// Canonical encoding order; also the vocabulary accepted by `from_text`.
const FLAG_NAMES: [(RdFlagSet, &str); 8] = [
    (RdFlagSet::NO_OMAP_WD, "no-omap-wd"),
    (RdFlagSet::NO_EXT_WD, "no-ext-wd"),
    (RdFlagSet::NO_LIFEGUARD_RESET, "no-lifeguard-reset"),
    (RdFlagSet::SERIAL_CONSOLE, "serial-console"),
    (RdFlagSet::NO_USB_TIMEOUT, "no-usb-timeout"),
    (RdFlagSet::STI_CONSOLE, "sti-console"),
    (RdFlagSet::NO_CHARGING, "no-charging"),
    (RdFlagSet::FORCE_POWER_KEY, "force-power-key"),
];

impl RdFlagSet {
    /// Parse a comma-separated flag list. Unknown tokens and stray
    /// whitespace or control bytes around tokens are ignored.
    pub fn from_text(text: &str) -> Self {
        let mut set = RdFlagSet::empty();
        for token in text.split(',') {
            let token = token.trim_matches(|c: char| (c as u32) <= 32);
            if let Some((flag, _)) = FLAG_NAMES.iter().find(|(_, name)| *name == token) {
                set |= *flag;
            }
        }
        set
    }

    /// Comma-separated list of the set flags in canonical order. Empty
    /// string for an empty set.
    pub fn to_text(&self) -> String {
        FLAG_NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for RdFlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_follows_canonical_order() {
        let set = RdFlagSet::FORCE_POWER_KEY | RdFlagSet::NO_OMAP_WD | RdFlagSet::STI_CONSOLE;
        assert_eq!(set.to_text(), "no-omap-wd,sti-console,force-power-key");
    }

    #[test]
    fn empty_set_encodes_as_empty_string() {
        assert_eq!(RdFlagSet::empty().to_text(), "");
        assert_eq!(RdFlagSet::from_text(""), RdFlagSet::empty());
    }

    #[test]
    fn round_trips_over_every_subset() {
        for bits in 0..256u16 {
            let mut set = RdFlagSet::empty();
            for (i, (flag, _)) in FLAG_NAMES.iter().enumerate() {
                if bits & (1 << i) != 0 {
                    set |= *flag;
                }
            }
            assert_eq!(RdFlagSet::from_text(&set.to_text()), set);
        }
    }

    #[test]
    fn unknown_tokens_are_ignored() {
        let set = RdFlagSet::from_text("no-omap-wd,warp-drive,serial-console");
        assert_eq!(set, RdFlagSet::NO_OMAP_WD | RdFlagSet::SERIAL_CONSOLE);
    }

    #[test]
    fn tokens_survive_surrounding_whitespace() {
        let set = RdFlagSet::from_text(" no-ext-wd ,\tno-charging");
        assert_eq!(set, RdFlagSet::NO_EXT_WD | RdFlagSet::NO_CHARGING);
    }

    #[test]
    fn unknown_bits_are_dropped_on_decode() {
        let set = RdFlagSet::from_bits_truncate(0xFFFF);
        assert_eq!(set, RdFlagSet::all());
        assert_eq!(set.bits(), 0x3FE);
    }
}
