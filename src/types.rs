//! # Core QUIC Types (RFC 8999, RFC 9000)
//!
//! Fundamental types shared by the packet assembly pipeline: the
//! variable-length integer codec, connection IDs, packet numbers, and the
//! protocol constants that bound packet sizes.

#![forbid(unsafe_code)]

use bytes::{BufMut, Bytes};

// ============================================================================
// Variable-Length Integer Encoding (RFC 9000 Section 16)
// ============================================================================

/// Variable-Length Integer (RFC 9000 Section 16)
///
/// QUIC uses a variable-length encoding for integers. The first two bits
/// indicate the length: 00=1 byte, 01=2 bytes, 10=4 bytes, 11=8 bytes.
/// Maximum value: 2^62 - 1
pub type VarInt = u64;

/// Maximum value for VarInt (2^62 - 1)
pub const VARINT_MAX: u64 = (1u64 << 62) - 1;

/// VarInt encoding utilities
///
/// Only the write side is provided here; the packet assembly core never
/// decodes varints.
pub struct VarIntCodec;

impl VarIntCodec {
    /// Calculate the encoded size for a given value
    pub fn size(value: VarInt) -> usize {
        if value < 0x40 {
            1
        } else if value < 0x4000 {
            2
        } else if value < 0x4000_0000 {
            4
        } else {
            8
        }
    }

    /// Write a VarInt into a buffer using the shortest encoding
    ///
    /// Values above VARINT_MAX are truncated to the 62-bit range.
    pub fn put<B: BufMut>(buf: &mut B, value: VarInt) {
        let value = value & VARINT_MAX;
        if value < 0x40 {
            buf.put_u8(value as u8);
        } else if value < 0x4000 {
            buf.put_u16((value as u16) | 0x4000);
        } else if value < 0x4000_0000 {
            buf.put_u32((value as u32) | 0x8000_0000);
        } else {
            buf.put_u64(value | 0xC000_0000_0000_0000);
        }
    }
}

// ============================================================================
// Connection ID (RFC 9000 Section 5.1)
// ============================================================================

/// Connection ID (RFC 9000 Section 5.1)
///
/// An opaque identifier of up to 20 bytes, negotiated by the peers. The
/// packer copies it into every header it builds and never looks inside.
/// The zero-length ID (`ConnectionId::default()`) is valid: an endpoint
/// that does not need to be routed by connection ID may use it.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Bytes);

impl ConnectionId {
    /// Longest connection ID the wire format allows.
    pub const MAX_LEN: usize = 20;

    /// Wrap `bytes` as a connection ID; `None` if longer than [`Self::MAX_LEN`].
    pub fn new(bytes: Bytes) -> Option<Self> {
        (bytes.len() <= Self::MAX_LEN).then(|| Self(bytes))
    }

    /// Copy a connection ID out of a borrowed slice.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        Self::new(Bytes::copy_from_slice(slice))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl core::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.iter().try_for_each(|byte| write!(f, "{:02x}", byte))
    }
}

impl core::fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ConnectionId({})", self)
    }
}

// ============================================================================
// Packet Number, Stream ID, Version (RFC 9000 Section 2.1, 12.3, 15)
// ============================================================================

/// Packet Number - Monotonically increasing per packet number space
///
/// Packet numbers are 62-bit integers (0 to 2^62-1) that increase
/// monotonically within each packet number space.
pub type PacketNumber = u64;

/// Stream ID (RFC 9000 Section 2.1)
pub type StreamId = u64;

/// Application or transport error code carried in frames
pub type ErrorCode = u64;

/// QUIC Protocol Version (RFC 9000 Section 15)
pub type Version = u32;

/// QUIC Version 1 (RFC 9000)
pub const VERSION_1: Version = 0x0000_0001;

// ============================================================================
// Perspective
// ============================================================================

/// The role an endpoint plays on a connection
///
/// Some packing rules differ between the two: only a client pads Initial
/// packets to the minimum size and attaches a retry token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perspective {
    /// The endpoint initiated the connection
    Client,
    /// The endpoint accepted the connection
    Server,
}

// ============================================================================
// Size Constants
// ============================================================================

/// Minimum size of a client Initial packet (RFC 9000 Section 14.1)
///
/// Client Initials are padded to this size to exercise path-MTU adequacy
/// and mitigate amplification attacks.
pub const MIN_INITIAL_PACKET_SIZE: usize = 1200;

/// Maximum packet size for IPv4 paths (1280 minimum MTU minus overheads)
pub const MAX_PACKET_SIZE_IPV4: usize = 1252;

/// Maximum packet size for IPv6 paths
pub const MAX_PACKET_SIZE_IPV6: usize = 1232;

/// Capacity of a pooled packet buffer; an upper bound on any packet we send
pub const MAX_PACKET_BUFFER_SIZE: usize = 1452;

/// Number of consecutive non-ACK-eliciting packets after which a PING frame
/// is inserted to force the peer to acknowledge (RFC 9002 Section 7.2 note)
pub const MAX_NON_ACK_ELICITING_ACKS: usize = 19;

/// Below this remaining budget it is not worth starting another STREAM frame
pub const MIN_STREAM_FRAME_SIZE: usize = 128;

// ============================================================================
// Unit Tests
// ============================================================================
