//! Slots and interfaces
//!
//! A peer owns any number of slots, numbered from zero and created on first
//! use. Each slot has one interface of every [`Interface`] kind, and each
//! interface can be bound (receiver) or connected (sender) exactly once until
//! the slot is unlinked.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::endpoint::Protocol;

/// Index of a peer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(pub u32);

impl Slot {
    /// Slot zero, enough for simple one-to-one setups
    pub const DEFAULT: Slot = Slot(0);

    pub fn index(self) -> u32 {
        self.0
    }
}

impl From<u32> for Slot {
    fn from(index: u32) -> Self {
        Slot(index)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Role of an interface within a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interface {
    /// Signaling plus all media streams (e.g. RTSP).
    /// Mutually exclusive with the lower-level interfaces.
    Consolidated,
    /// Audio source packets
    AudioSource,
    /// FEC repair packets
    AudioRepair,
    /// Control messages (RTCP)
    AudioControl,
}

impl Interface {
    pub const ALL: [Interface; 4] = [
        Interface::Consolidated,
        Interface::AudioSource,
        Interface::AudioRepair,
        Interface::AudioControl,
    ];

    /// Whether endpoints of `protocol` may be used with this interface
    pub fn supports(self, protocol: Protocol) -> bool {
        match self {
            Interface::Consolidated => matches!(protocol, Protocol::Rtsp),
            Interface::AudioSource => matches!(
                protocol,
                Protocol::Rtp | Protocol::RtpRs8mSource | Protocol::RtpLdpcSource
            ),
            Interface::AudioRepair => {
                matches!(protocol, Protocol::Rs8mRepair | Protocol::LdpcRepair)
            }
            Interface::AudioControl => matches!(protocol, Protocol::Rtcp),
        }
    }

    /// Whether the two interfaces may coexist on one slot
    pub fn compatible_with(self, other: Interface) -> bool {
        (self == Interface::Consolidated) == (other == Interface::Consolidated)
    }

    pub fn name(self) -> &'static str {
        match self {
            Interface::Consolidated => "consolidated",
            Interface::AudioSource => "audio-source",
            Interface::AudioRepair => "audio-repair",
            Interface::AudioControl => "audio-control",
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
