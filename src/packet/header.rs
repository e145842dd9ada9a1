//! # Extended Packet Header (RFC 9000 Section 17)
//!
//! The in-memory representation of an outgoing packet header and its
//! serializer. "Extended" means it carries the packet number and its
//! length alongside the invariant header fields.

#![forbid(unsafe_code)]

use crate::packet::number::{encode_packet_number, PacketNumberLen};
use crate::types::{ConnectionId, PacketNumber, VarIntCodec, Version};
use bytes::{BufMut, Bytes};

/// Long Packet Type (RFC 9000 Section 17.2)
///
/// Encoded in bits 4-5 of the first byte for long header packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Initial packet (0x00)
    Initial = 0x00,
    /// 0-RTT packet (0x01)
    ZeroRtt = 0x01,
    /// Handshake packet (0x02)
    Handshake = 0x02,
    /// Retry packet (0x03)
    Retry = 0x03,
}

/// Outgoing QUIC packet header
///
/// Long headers carry version, both connection IDs, an optional token
/// (Initial only), and a Length field. Short headers carry only the
/// destination connection ID and the key-phase bit.
#[derive(Debug, Clone)]
pub struct ExtendedHeader {
    /// Header form; short headers are 1-RTT only
    pub is_long_header: bool,

    /// Packet type; only meaningful for long headers
    pub ty: PacketType,

    /// QUIC version (long headers only on the wire)
    pub version: Version,

    /// Destination Connection ID
    pub dest_connection_id: ConnectionId,

    /// Source Connection ID (long headers only)
    pub src_connection_id: ConnectionId,

    /// Address-validation token (client Initial packets only)
    pub token: Option<Bytes>,

    /// Length field: packet number plus payload plus AEAD tag (long only)
    pub length: u64,

    /// Full packet number; truncated to `packet_number_len` on the wire
    pub packet_number: PacketNumber,

    /// On-wire packet number length
    pub packet_number_len: PacketNumberLen,

    /// Key phase bit (RFC 9001 Section 6; short headers only)
    pub key_phase: bool,
}

impl ExtendedHeader {
    /// Serialized header length in bytes, including the packet number.
    ///
    /// Must match `write` exactly; the packer budgets payloads against it
    /// before any byte is written.
    pub fn wire_len(&self, _version: Version) -> usize {
        let pn_len = self.packet_number_len.len();
        if !self.is_long_header {
            return 1 + self.dest_connection_id.len() + pn_len;
        }
        let mut len = 1 + 4; // first byte + version
        len += 1 + self.dest_connection_id.len();
        len += 1 + self.src_connection_id.len();
        if self.ty == PacketType::Initial {
            let token_len = self.token.as_ref().map(|t| t.len()).unwrap_or(0);
            len += VarIntCodec::size(token_len as u64) + token_len;
        }
        len += VarIntCodec::size(self.length);
        len + pn_len
    }

    /// Serialize the header, packet number included.
    pub fn write<B: BufMut>(&self, buf: &mut B, _version: Version) {
        if self.is_long_header {
            let mut first_byte = 0x80 | 0x40;
            first_byte |= (self.ty as u8) << 4;
            first_byte |= self.packet_number_len.to_bits();
            buf.put_u8(first_byte);

            buf.put_u32(self.version);

            buf.put_u8(self.dest_connection_id.len() as u8);
            buf.put_slice(self.dest_connection_id.as_bytes());
            buf.put_u8(self.src_connection_id.len() as u8);
            buf.put_slice(self.src_connection_id.as_bytes());

            if self.ty == PacketType::Initial {
                let token = self.token.as_deref().unwrap_or(&[]);
                VarIntCodec::put(buf, token.len() as u64);
                buf.put_slice(token);
            }

            VarIntCodec::put(buf, self.length);
        } else {
            let mut first_byte = 0x40;
            if self.key_phase {
                first_byte |= 0x04;
            }
            first_byte |= self.packet_number_len.to_bits();
            buf.put_u8(first_byte);

            buf.put_slice(self.dest_connection_id.as_bytes());
        }

        encode_packet_number(buf, self.packet_number, self.packet_number_len);
    }
}
