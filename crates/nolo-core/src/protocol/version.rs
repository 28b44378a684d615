//! Version number handling.

use std::fmt;
use std::str::FromStr;

use super::ProtocolError;

/// A dotted `major.minor.patch` version.
///
/// The boot loader reports its own version packed into a 32-bit word:
/// major in bits 20..24, minor in bits 16..20, patch in bits 8..16. The low
/// byte is a validity marker and must be 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionTriple {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl VersionTriple {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Decode a packed NOLO version word.
    pub fn from_packed(word: u32) -> Result<Self, ProtocolError> {
        if word & 0xFF > 1 {
            return Err(ProtocolError::InvalidVersionWord { word });
        }
        Ok(Self {
            major: (word >> 20) & 0x0F,
            minor: (word >> 16) & 0x0F,
            patch: (word >> 8) & 0xFF,
        })
    }
}

impl fmt::Display for VersionTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for VersionTriple {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let mut next = || {
            parts
                .next()
                .and_then(|p| p.parse::<u32>().ok())
                .ok_or_else(|| ProtocolError::MalformedVersion(s.to_string()))
        };
        let triple = Self {
            major: next()?,
            minor: next()?,
            patch: next()?,
        };
        if parts.next().is_some() {
            return Err(ProtocolError::MalformedVersion(s.to_string()));
        }
        Ok(triple)
    }
}
