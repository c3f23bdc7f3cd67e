use std::ops::Range;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::constant::MAX_PACKET_PAYLOAD;

/// Packet header (zero-copy)
///
/// Layout matches the wire:
/// - length: 3 bytes (little-endian, payload length)
/// - sequence_id: 1 byte
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, IntoBytes)]
pub struct PacketHeader {
    pub length: [u8; 3],
    pub sequence_id: u8,
}

impl PacketHeader {
    pub const SIZE: usize = 4;

    pub fn encode(length: usize, sequence_id: u8) -> Self {
        let len = u32::to_le_bytes(length as u32);
        Self {
            length: [len[0], len[1], len[2]],
            sequence_id,
        }
    }

    pub fn length(&self) -> usize {
        u32::from_le_bytes([self.length[0], self.length[1], self.length[2], 0]) as usize
    }
}

/// A complete packet found in a receive buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sequence_id: u8,
    /// Payload position relative to the scanned slice
    pub payload: Range<usize>,
}

impl Frame {
    /// Number of buffer bytes (header included) occupied by this packet
    pub fn end(&self) -> usize {
        self.payload.end
    }

    /// Whether the payload continues in the next packet
    pub fn continues(&self) -> bool {
        self.payload.len() == MAX_PACKET_PAYLOAD
    }
}

/// Look for one complete packet at the start of `buf`.
///
/// Returns `None` when more bytes are needed.
pub fn scan_frame(buf: &[u8]) -> Option<Frame> {
    let (header, rest) = PacketHeader::ref_from_prefix(buf).ok()?;
    let length = header.length();
    if rest.len() < length {
        return None;
    }
    Some(Frame {
        sequence_id: header.sequence_id,
        payload: PacketHeader::SIZE..PacketHeader::SIZE + length,
    })
}

/// Append `payload` to `out` as one or more packets starting at `sequence_id`.
///
/// A payload that is a multiple of 16MB is terminated by an empty packet.
/// Returns the sequence id following the last packet written.
pub fn write_packets(out: &mut Vec<u8>, payload: &[u8], mut sequence_id: u8) -> u8 {
    let mut chunks = payload.chunks(MAX_PACKET_PAYLOAD);
    let mut last_len = 0;
    for chunk in chunks.by_ref() {
        out.extend_from_slice(PacketHeader::encode(chunk.len(), sequence_id).as_bytes());
        out.extend_from_slice(chunk);
        sequence_id = sequence_id.wrapping_add(1);
        last_len = chunk.len();
    }
    if payload.is_empty() || last_len == MAX_PACKET_PAYLOAD {
        out.extend_from_slice(PacketHeader::encode(0, sequence_id).as_bytes());
        sequence_id = sequence_id.wrapping_add(1);
    }
    sequence_id
}
