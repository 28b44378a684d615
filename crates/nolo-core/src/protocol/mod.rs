//! NOLO protocol definitions: wire constants, command values, the R&D flag
//! register and version numbers.

use thiserror::Error;

pub mod command;
pub mod constants;
pub mod flags;
pub mod version;

pub use command::{CommandData, ControlCommand, Direction};
pub use constants::*;
pub use flags::RdFlagSet;
pub use version::VersionTriple;

/// A response that could not be interpreted, or an operation the boot
/// loader interface defines but this client does not carry out.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("`{key}` not found in identification block")]
    MarkerNotFound { key: String },

    #[error("no separator after `{key}` in identification block")]
    MissingSeparator { key: String },

    #[error("response truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("empty value for `{key}`")]
    EmptyValue { key: String },

    #[error("key `{key}` exceeds {limit} bytes")]
    KeyTooLong { key: String, limit: usize },

    #[error("invalid NOLO version word {word:#010x}")]
    InvalidVersionWord { word: u32 },

    #[error("malformed version string `{0}`")]
    MalformedVersion(String),

    #[error("unknown product code `{code}`")]
    UnknownModel { code: String },

    #[error("{operation} is not implemented")]
    Unimplemented { operation: &'static str },
}
