//! Configuration for contexts, peers and interfaces
//!
//! Every struct can be zero-initialized with `Default`; zero values mean
//! "let the engine pick". Only the frame encoding of a peer must be set.
//! The whole set can be loaded from a TOML file through [`SessionConfig`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{DEFAULT_SAMPLE_RATE, MAX_ADDRESS_LEN};
use crate::endpoint::{ensure_no_nul, Protocol};
use crate::error::{Error, Result};
use crate::log::LogConfig;

/// Context configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Maximum size in bytes of a network packet, zero for default
    pub max_packet_size: u32,
    /// Maximum size in bytes of an intermediate frame, zero for default
    pub max_frame_size: u32,
}

/// Sample format of frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// Interleaved 32-bit floats in [-1; 1]
    #[default]
    PcmFloat32,
}

/// Channel layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLayout {
    /// Independent tracks, count given by `MediaEncoding::tracks`
    Multitrack,
    Mono,
    #[default]
    Stereo,
}

/// Sample rate, format and channels of an audio stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaEncoding {
    /// Samples per channel per second
    pub rate: u32,
    pub format: Format,
    pub channels: ChannelLayout,
    /// Track count, only for `ChannelLayout::Multitrack`
    pub tracks: u32,
}

impl MediaEncoding {
    pub fn new(rate: u32, channels: ChannelLayout) -> Self {
        Self {
            rate,
            format: Format::PcmFloat32,
            channels,
            tracks: 0,
        }
    }

    pub fn stereo(rate: u32) -> Self {
        Self::new(rate, ChannelLayout::Stereo)
    }

    pub fn multitrack(rate: u32, tracks: u32) -> Self {
        Self {
            tracks,
            ..Self::new(rate, ChannelLayout::Multitrack)
        }
    }

    /// Number of interleaved channels in a frame
    pub fn channel_count(&self) -> usize {
        match self.channels {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
            ChannelLayout::Multitrack => self.tracks as usize,
        }
    }
}

/// Encoding of network packets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketEncoding {
    /// RTP A/V profile L16, 44100 Hz, one channel
    AvpL16Mono,
    /// RTP A/V profile L16, 44100 Hz, two channels
    AvpL16Stereo,
    /// Custom encoding registered on the context under this id
    Registered(i32),
}

impl PacketEncoding {
    /// Encoding of the built-in variants, `None` for registered ids
    pub fn builtin(self) -> Option<MediaEncoding> {
        match self {
            PacketEncoding::AvpL16Mono => Some(MediaEncoding::new(DEFAULT_SAMPLE_RATE, ChannelLayout::Mono)),
            PacketEncoding::AvpL16Stereo => Some(MediaEncoding::stereo(DEFAULT_SAMPLE_RATE)),
            PacketEncoding::Registered(_) => None,
        }
    }
}

/// Forward error correction scheme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FecEncoding {
    /// No FEC, pairs with `rtp` only
    Disable,
    /// Currently Reed-Solomon
    #[default]
    Default,
    /// Reed-Solomon (RFC 6865) with m=8, pairs `rtp+rs8m` with `rs8m`
    Rs8m,
    /// LDPC-Staircase (RFC 6816), pairs `rtp+ldpc` with `ldpc`
    LdpcStaircase,
}

impl FecEncoding {
    /// Replace `Default` with the concrete scheme
    pub fn resolve(self) -> FecEncoding {
        match self {
            FecEncoding::Default => FecEncoding::Rs8m,
            other => other,
        }
    }

    pub fn is_enabled(self) -> bool {
        self.resolve() != FecEncoding::Disable
    }

    /// Protocol required on the audio source interface
    pub fn source_protocol(self) -> Protocol {
        match self.resolve() {
            FecEncoding::Disable => Protocol::Rtp,
            FecEncoding::LdpcStaircase => Protocol::RtpLdpcSource,
            _ => Protocol::RtpRs8mSource,
        }
    }

    /// Protocol required on the audio repair interface, if any
    pub fn repair_protocol(self) -> Option<Protocol> {
        match self.resolve() {
            FecEncoding::Disable => None,
            FecEncoding::LdpcStaircase => Some(Protocol::LdpcRepair),
            _ => Some(Protocol::Rs8mRepair),
        }
    }
}

/// Who paces frame I/O
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockSource {
    /// The caller invokes read/write at the sample rate; I/O never waits
    #[default]
    External,
    /// The engine blocks read/write until the next frame is due
    Internal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResamplerBackend {
    #[default]
    Default,
    Builtin,
    Speex,
    SpeexDec,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResamplerProfile {
    #[default]
    Default,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyTunerBackend {
    #[default]
    Default,
    /// Based on network incoming queue length
    Niq,
    /// Based on end-to-end latency reports
    E2e,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyTunerProfile {
    #[default]
    Default,
    /// No tuning or bounding
    Intact,
    Responsive,
    Gradual,
}

/// Sender configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Encoding of frames written by the caller, must be set
    pub frame_encoding: MediaEncoding,
    /// Encoding of produced packets, `None` to match the frame encoding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packet_encoding: Option<PacketEncoding>,
    /// Audio duration per packet, zero for default
    #[serde(with = "millis", rename = "packet_length_ms")]
    pub packet_length: Duration,
    /// Shuffle packets before sending
    pub packet_interleaving: bool,
    pub fec_encoding: FecEncoding,
    /// Source packets per FEC block, zero for default
    pub fec_block_source_packets: u32,
    /// Repair packets per FEC block, zero for default
    pub fec_block_repair_packets: u32,
    pub clock_source: ClockSource,
    pub latency_tuner_backend: LatencyTunerBackend,
    pub latency_tuner_profile: LatencyTunerProfile,
    pub resampler_backend: ResamplerBackend,
    pub resampler_profile: ResamplerProfile,
    #[serde(with = "millis", rename = "target_latency_ms")]
    pub target_latency: Duration,
    #[serde(with = "millis", rename = "latency_tolerance_ms")]
    pub latency_tolerance: Duration,
}

/// Receiver configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Encoding of frames returned to the caller, must be set
    pub frame_encoding: MediaEncoding,
    pub clock_source: ClockSource,
    pub latency_tuner_backend: LatencyTunerBackend,
    pub latency_tuner_profile: LatencyTunerProfile,
    pub resampler_backend: ResamplerBackend,
    pub resampler_profile: ResamplerProfile,
    /// Latency accumulated before playback starts, zero for default
    #[serde(with = "millis", rename = "target_latency_ms")]
    pub target_latency: Duration,
    #[serde(with = "millis", rename = "latency_tolerance_ms")]
    pub latency_tolerance: Duration,
    /// Session is dropped after this long without playback, zero for default
    #[serde(with = "millis", rename = "no_playback_timeout_ms")]
    pub no_playback_timeout: Duration,
    /// Session is dropped after this long of choppy playback, zero for default
    #[serde(with = "millis", rename = "choppy_playback_timeout_ms")]
    pub choppy_playback_timeout: Duration,
}

/// Configuration handed to the engine when a peer opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerConfig {
    Sender(SenderConfig),
    Receiver(ReceiverConfig),
}

impl PeerConfig {
    pub fn frame_encoding(&self) -> &MediaEncoding {
        match self {
            PeerConfig::Sender(config) => &config.frame_encoding,
            PeerConfig::Receiver(config) => &config.frame_encoding,
        }
    }

    pub fn clock_source(&self) -> ClockSource {
        match self {
            PeerConfig::Sender(config) => config.clock_source,
            PeerConfig::Receiver(config) => config.clock_source,
        }
    }
}

/// Per-interface socket options, applied before bind or connect
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    /// Local address to send from, empty for any
    pub outgoing_address: String,
    /// Multicast group to join (receiver) or send to via (sender), empty for none
    pub multicast_group: String,
    /// Set SO_REUSEADDR on the socket
    pub reuse_address: bool,
}

impl InterfaceConfig {
    /// Check string fields before they reach the engine
    pub fn validate(&self) -> Result<()> {
        check_address("outgoing_address", &self.outgoing_address)?;
        check_address("multicast_group", &self.multicast_group)
    }
}

fn check_address(field: &'static str, value: &str) -> Result<()> {
    ensure_no_nul(field, value)?;
    if value.len() > MAX_ADDRESS_LEN {
        return Err(Error::StringTooLong {
            field,
            len: value.len(),
            max: MAX_ADDRESS_LEN,
        });
    }
    Ok(())
}

/// Everything needed to set up a session, as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub context: ContextConfig,
    pub sender: SenderConfig,
    pub receiver: ReceiverConfig,
    pub log: LogConfig,
}

impl SessionConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Per-user location of the session file
    pub fn default_path() -> Result<PathBuf> {
        directories::ProjectDirs::from("org", "lan-audio", "audio-peer-session")
            .map(|dirs| dirs.config_dir().join("session.toml"))
            .ok_or_else(|| Error::Config("no home directory to place the session file".into()))
    }

    /// Load from [`SessionConfig::default_path`], or defaults if the file is absent
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
