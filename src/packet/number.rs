//! # Packet Number Encoding (RFC 9000 Section 12.3, A.2)
//!
//! Packet numbers are written truncated to 1-4 bytes; the packet-number
//! manager chooses a length long enough to disambiguate from packets the
//! peer has already acknowledged. Only the send side lives here.

#![forbid(unsafe_code)]

use crate::types::PacketNumber;
use bytes::BufMut;

/// On-wire length of a truncated packet number.
///
/// The packet-number manager picks the shortest length that still
/// disambiguates the number from everything the peer has acknowledged;
/// the packer overrides it to [`PacketNumberLen::Four`] in long headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketNumberLen {
    One = 1,
    Two = 2,
    Three = 3,
    Four = 4,
}

impl PacketNumberLen {
    /// Length in bytes.
    pub fn len(self) -> usize {
        self as usize
    }

    /// The two packet-number-length bits of a header's first byte, which
    /// encode `length - 1`.
    pub fn to_bits(self) -> u8 {
        self as u8 - 1
    }
}

/// Write a packet number truncated to `len` bytes, big-endian.
pub fn encode_packet_number<B: BufMut>(buf: &mut B, pn: PacketNumber, len: PacketNumberLen) {
    match len {
        PacketNumberLen::One => buf.put_u8(pn as u8),
        PacketNumberLen::Two => buf.put_u16(pn as u16),
        PacketNumberLen::Three => {
            buf.put_u8((pn >> 16) as u8);
            buf.put_u16(pn as u16);
        }
        PacketNumberLen::Four => buf.put_u32(pn as u32),
    }
}
