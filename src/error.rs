//! Error types for the peer-session layer

use thiserror::Error;

use crate::interface::{Interface, Slot};

/// Main error type for the crate
///
/// Variants are grouped the way callers handle them: usage errors, lifecycle
/// errors, slot bookkeeping errors and engine rejections. Match on the variant,
/// never on the rendered message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Usage errors
    #[error("context is nil")]
    ContextNil,

    #[error("endpoint is nil")]
    EndpointNil,

    #[error("frame is nil")]
    FrameNil,

    #[error("malformed uri: {0}")]
    MalformedUri(String),

    #[error("invalid {field}: unexpected zero byte in the string")]
    InvalidString { field: &'static str },

    #[error("invalid {field}: too long ({len} bytes, max {max})")]
    StringTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Lifecycle errors
    #[error("context is closed")]
    ContextClosed,

    #[error("peer is closed")]
    PeerClosed,

    #[error("context is busy: {0} peer(s) still attached")]
    ResourceBusy(usize),

    // Slot bookkeeping
    #[error("unknown slot: {0}")]
    UnknownSlot(Slot),

    #[error("slot {0} is broken and must be unlinked before reuse")]
    SlotBroken(Slot),

    #[error("interface {interface} of slot {slot} is already bound or connected")]
    InterfaceLinked { slot: Slot, interface: Interface },

    #[error("interface {interface} conflicts with interfaces already used on slot {slot}")]
    InterfaceConflict { slot: Slot, interface: Interface },

    // Engine rejections
    #[error("{op} failed with code {code}")]
    Engine { op: &'static str, code: i32 },

    // Configuration loading
    #[error("configuration error: {0}")]
    Config(String),

    #[error("toml error: {0}")]
    Toml(String),

    /// `std::io::Error` is neither `Clone` nor `PartialEq`, so only its kind
    /// and message are kept
    #[error("IO error: {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
    },
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Toml(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Toml(err.to_string())
    }
}

impl Error {
    /// True for errors caused by operating on a closed context or peer
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::ContextClosed | Error::PeerClosed)
    }

    /// Native code, if the error came from the engine
    pub fn engine_code(&self) -> Option<i32> {
        match self {
            Error::Engine { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
