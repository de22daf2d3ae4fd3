//! Datagram format of the loopback engine
//!
//! ```text
//! 0       2   3   4        8       12      16
//! +-------+---+---+--------+-------+-------+---------------------+
//! | magic |ver|knd| stream |  seq  | count | count x f32 (BE)    |
//! +-------+---+---+--------+-------+-------+---------------------+
//! ```
//!
//! `stream` is picked at random by each sender, so a receiver can tell a
//! restarted sender from late packets of the previous one.

use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const MAGIC: u16 = 0xA51C;
pub const VERSION: u8 = 2;
pub const HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    Source = 0,
    Repair = 1,
}

impl PacketKind {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(PacketKind::Source),
            1 => Some(PacketKind::Repair),
            _ => None,
        }
    }
}

/// Decoded datagram
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPacket {
    pub kind: PacketKind,
    pub stream: u32,
    pub seq: u32,
    /// Interleaved samples
    pub samples: Vec<f32>,
}

/// Serialize one packet worth of samples
pub fn encode(kind: PacketKind, stream: u32, seq: u32, samples: &[f32]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + samples.len() * 4);
    buf.put_u16(MAGIC);
    buf.put_u8(VERSION);
    buf.put_u8(kind as u8);
    buf.put_u32(stream);
    buf.put_u32(seq);
    buf.put_u32(samples.len() as u32);
    for &sample in samples {
        buf.put_f32(sample);
    }
    buf.freeze()
}

/// Parse a datagram, `None` if it is not a well-formed packet
pub fn decode(mut buf: &[u8]) -> Option<AudioPacket> {
    if buf.len() < HEADER_LEN || buf.get_u16() != MAGIC || buf.get_u8() != VERSION {
        return None;
    }
    let kind = PacketKind::from_u8(buf.get_u8())?;
    let stream = buf.get_u32();
    let seq = buf.get_u32();
    let count = buf.get_u32() as usize;
    if buf.remaining() != count * 4 {
        return None;
    }

    let samples = (0..count).map(|_| buf.get_f32()).collect();
    Some(AudioPacket {
        kind,
        stream,
        seq,
        samples,
    })
}

/// Samples that fit in a datagram of `max_packet_size` bytes
pub fn max_samples(max_packet_size: usize) -> usize {
    max_packet_size.saturating_sub(HEADER_LEN) / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let bytes = encode(PacketKind::Repair, 0xDEAD_BEEF, 7, &[0.5, -0.5]);
        assert_eq!(bytes.len(), HEADER_LEN + 8);
        assert_eq!(&bytes[..4], &[0xA5, 0x1C, VERSION, 1]);

        let packet = decode(&bytes).unwrap();
        assert_eq!(packet.kind, PacketKind::Repair);
        assert_eq!(packet.stream, 0xDEAD_BEEF);
        assert_eq!(packet.seq, 7);
        assert_eq!(packet.samples, vec![0.5, -0.5]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode(&[]).is_none());
        assert!(decode(&[0u8; HEADER_LEN]).is_none());

        let bytes = encode(PacketKind::Source, 3, 1, &[1.0, 2.0]);
        assert!(decode(&bytes[..bytes.len() - 1]).is_none());

        let mut bad_kind = bytes.to_vec();
        bad_kind[3] = 9;
        assert!(decode(&bad_kind).is_none());
    }

    #[test]
    fn test_max_samples() {
        assert_eq!(max_samples(2048), (2048 - HEADER_LEN) / 4);
        assert_eq!(max_samples(4), 0);
    }
}
