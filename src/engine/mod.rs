//! Media engine boundary
//!
//! The engine does the actual audio work: encoding, FEC, pacing and network
//! transport. This layer only drives its lifecycle through the [`Engine`]
//! trait and never looks inside its handles.
//!
//! Engine calls fail with an [`EngineCode`]. Negative codes are argument or
//! state rejections and become [`Error::Engine`]; any other code means the
//! engine broke its own contract and the process cannot trust its handles
//! anymore, so [`check`] panics.

pub mod clock;
pub mod loopback;
pub mod packet;

pub use loopback::LoopbackEngine;

use std::fmt;

use crate::config::{ContextConfig, InterfaceConfig, MediaEncoding, PeerConfig};
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::interface::{Interface, Slot};

/// Opaque token for an engine context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(u64);

/// Opaque token for an engine peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerHandle(u64);

impl ContextHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl PeerHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Failure code returned by an engine call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineCode(pub i32);

impl EngineCode {
    /// Argument rejected
    pub const INVALID_ARGUMENT: EngineCode = EngineCode(-1);
    /// Operation or protocol not provided by this engine
    pub const UNSUPPORTED: EngineCode = EngineCode(-2);
    /// Address could not be resolved, bound or connected
    pub const ADDRESS_UNAVAILABLE: EngineCode = EngineCode(-3);
    /// Resource still in use
    pub const BUSY: EngineCode = EngineCode(-4);
    /// Handle or slot not known to the engine
    pub const NOT_FOUND: EngineCode = EngineCode(-5);

    pub fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Display for EngineCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine code {}", self.0)
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineCode>;

/// Operations the session layer needs from a media engine
///
/// Implementations must be callable from any thread. Calls on different
/// peers may run concurrently; calls on one peer may also overlap (slot
/// operations alongside frame I/O).
pub trait Engine: Send + Sync {
    fn context_open(&self, config: &ContextConfig) -> EngineResult<ContextHandle>;

    fn context_register_encoding(
        &self,
        context: ContextHandle,
        id: i32,
        encoding: &MediaEncoding,
    ) -> EngineResult<()>;

    /// Must refuse with [`EngineCode::BUSY`] while peers are attached
    fn context_close(&self, context: ContextHandle) -> EngineResult<()>;

    /// Open a peer and attach it to the context
    fn peer_open(&self, context: ContextHandle, config: &PeerConfig) -> EngineResult<PeerHandle>;

    fn peer_configure(
        &self,
        peer: PeerHandle,
        slot: Slot,
        interface: Interface,
        config: &InterfaceConfig,
    ) -> EngineResult<()>;

    /// Bind an interface and return the endpoint actually bound
    fn peer_bind(
        &self,
        peer: PeerHandle,
        slot: Slot,
        interface: Interface,
        endpoint: &Endpoint,
    ) -> EngineResult<Endpoint>;

    fn peer_connect(
        &self,
        peer: PeerHandle,
        slot: Slot,
        interface: Interface,
        endpoint: &Endpoint,
    ) -> EngineResult<()>;

    /// Tear down every interface of the slot
    fn peer_unlink(&self, peer: PeerHandle, slot: Slot) -> EngineResult<()>;

    /// Close the peer and detach it from its context
    fn peer_close(&self, peer: PeerHandle) -> EngineResult<()>;

    fn frame_read(&self, peer: PeerHandle, frame: &mut [f32]) -> EngineResult<()>;

    fn frame_write(&self, peer: PeerHandle, frame: &[f32]) -> EngineResult<()>;
}

/// Turn an engine result into a crate result
///
/// # Panics
///
/// If the engine reports a non-negative failure code.
pub(crate) fn check<T>(op: &'static str, result: EngineResult<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(EngineCode(code)) if code < 0 => Err(Error::Engine { op, code }),
        Err(EngineCode(code)) => {
            tracing::error!(op, code, "engine violated its contract");
            panic!("{op} returned code {code}, which is outside of the engine contract")
        }
    }
}
