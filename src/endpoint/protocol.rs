//! Network protocols (URI schemes) understood by endpoints

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Network protocol of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// RTSP 1.0 (RFC 2326) or RTSP 2.0 (RFC 7826), consolidated signaling + media
    Rtsp,
    /// RTP over UDP (RFC 3550), no FEC
    Rtp,
    /// RTP source packet + FECFRAME Reed-Solomon footer (RFC 6865), m=8
    RtpRs8mSource,
    /// FEC repair packet + FECFRAME Reed-Solomon header (RFC 6865), m=8
    Rs8mRepair,
    /// RTP source packet + FECFRAME LDPC-Staircase footer (RFC 6816)
    RtpLdpcSource,
    /// FEC repair packet + FECFRAME LDPC-Staircase header (RFC 6816)
    LdpcRepair,
    /// RTCP over UDP (RFC 3550)
    Rtcp,
}

impl Protocol {
    pub const ALL: [Protocol; 7] = [
        Protocol::Rtsp,
        Protocol::Rtp,
        Protocol::RtpRs8mSource,
        Protocol::Rs8mRepair,
        Protocol::RtpLdpcSource,
        Protocol::LdpcRepair,
        Protocol::Rtcp,
    ];

    /// URI scheme
    pub fn scheme(self) -> &'static str {
        match self {
            Protocol::Rtsp => "rtsp",
            Protocol::Rtp => "rtp",
            Protocol::RtpRs8mSource => "rtp+rs8m",
            Protocol::Rs8mRepair => "rs8m",
            Protocol::RtpLdpcSource => "rtp+ldpc",
            Protocol::LdpcRepair => "ldpc",
            Protocol::Rtcp => "rtcp",
        }
    }

    pub fn from_scheme(scheme: &str) -> Option<Protocol> {
        Self::ALL.into_iter().find(|p| p.scheme() == scheme)
    }

    /// Standard port, if the protocol defines one
    pub fn default_port(self) -> Option<u16> {
        match self {
            Protocol::Rtsp => Some(554),
            _ => None,
        }
    }

    /// Whether path and query components are allowed
    pub fn supports_resource(self) -> bool {
        matches!(self, Protocol::Rtsp)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Protocol::from_scheme(s).ok_or_else(|| Error::MalformedUri(format!("unknown scheme {s:?}")))
    }
}
