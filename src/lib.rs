//! # Audio Peer Session
//!
//! Lifecycle layer for real-time audio streaming peers: contexts, senders,
//! receivers, their slots and interfaces, and the endpoints they are wired to.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                               Context                                │
//! │        engine handle  ·  attached peer count  ·  closed fence        │
//! └───────────────┬──────────────────────────────────────┬───────────────┘
//!                 │ attach                               │ attach
//!                 ▼                                      ▼
//! ┌───────────────────────────────┐      ┌───────────────────────────────┐
//! │            Sender             │      │           Receiver            │
//! │  ┌─────────────────────────┐  │      │  ┌─────────────────────────┐  │
//! │  │ Slot #0                 │  │      │  │ Slot #0                 │  │
//! │  │  audio-source  ─connect─┼──┼─UDP──┼─►│─bind─  audio-source     │  │
//! │  │  audio-repair  ─connect─┼──┼─UDP──┼─►│─bind─  audio-repair     │  │
//! │  │  audio-control          │  │      │  │        audio-control    │  │
//! │  └─────────────────────────┘  │      │  └─────────────────────────┘  │
//! │  Slot #1 ...                  │      │  Slot #1 ...                  │
//! │                               │      │                               │
//! │  write_frame ──► engine       │      │  engine ──► read_frame        │
//! └───────────────────────────────┘      └───────────────────────────────┘
//!                 │                                      │
//!                 ▼                                      ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │            Engine trait (LoopbackEngine or a native engine)          │
//! │      encoding · FEC · pacing · sockets  (opaque handles only)        │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! 1. [`Context::open`]
//! 2. [`Sender::open`] / [`Receiver::open`] against the context
//! 3. optionally `configure`, then `connect` (sender) or `bind` (receiver)
//!    each [`Interface`] of each [`Slot`] to an [`Endpoint`]
//! 4. `write_frame` / `read_frame` in a loop
//! 5. close peers, then the context
//!
//! Closing is idempotent. Every other call on a closed object fails with
//! [`Error::PeerClosed`] or [`Error::ContextClosed`].

pub mod config;
pub mod context;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod interface;
pub mod log;
pub mod peer;

pub use config::{
    ChannelLayout, ClockSource, ContextConfig, FecEncoding, Format, InterfaceConfig,
    LatencyTunerBackend, LatencyTunerProfile, MediaEncoding, PacketEncoding, ReceiverConfig,
    ResamplerBackend, ResamplerProfile, SenderConfig, SessionConfig,
};
pub use context::Context;
pub use endpoint::{Endpoint, Protocol, PORT_EPHEMERAL, PORT_UNSPECIFIED};
pub use engine::{Engine, EngineCode, LoopbackEngine};
pub use error::{Error, Result};
pub use interface::{Interface, Slot};
pub use log::{LogConfig, LogLevel};
pub use peer::InterfaceState;
#[cfg(feature = "receiver")]
pub use peer::receiver::Receiver;
#[cfg(feature = "sender")]
pub use peer::sender::Sender;

/// Library-wide constants
pub mod constants {
    /// Sample rate of the built-in AVP L16 packet encodings
    pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

    /// Audio per packet when the sender config leaves it at zero
    pub const DEFAULT_PACKET_LENGTH_MS: u64 = 5;

    /// Receiver prebuffer when the config leaves it at zero
    pub const DEFAULT_TARGET_LATENCY_MS: u64 = 20;

    /// Largest receiver prebuffer accepted
    pub const MAX_TARGET_LATENCY_MS: u64 = 10_000;

    /// Packet size limit when the context config leaves it at zero
    pub const DEFAULT_MAX_PACKET_SIZE: usize = 2048;

    /// Smallest non-zero `max_packet_size` accepted
    pub const MIN_PACKET_SIZE: usize = 128;

    /// Smallest non-zero `max_frame_size` accepted
    pub const MIN_FRAME_SIZE: usize = 64;

    /// Range of ids for custom encodings
    pub const ENCODING_ID_MIN: i32 = 100;
    pub const ENCODING_ID_MAX: i32 = 127;

    /// Longest address string in an interface config
    pub const MAX_ADDRESS_LEN: usize = 47;

    /// Maximum track count of a multitrack encoding
    pub const MAX_TRACKS: u32 = 1024;
}
