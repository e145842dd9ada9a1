//! # Frame Definitions (RFC 9000 Section 19)
//!
//! Owned frame structures queued by frame producers and assembled into
//! packets. STREAM frames additionally support splitting, which the
//! retransmission path uses when a frame no longer fits.

#![forbid(unsafe_code)]

use crate::types::{ConnectionId, ErrorCode, PacketNumber, StreamId, VarInt, Version};
use bytes::Bytes;

/// ACK Frame (RFC 9000 Section 19.3)
///
/// Acknowledges receipt of packets. Contains ranges of acknowledged packet
/// numbers, ordered from the largest downwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckFrame {
    /// Largest packet number being acknowledged
    pub largest_ack: PacketNumber,

    /// Encoded ACK delay (already scaled by the ack_delay_exponent)
    pub ack_delay: VarInt,

    /// First ACK Range (number of packets before largest_ack)
    pub first_ack_range: VarInt,

    /// Additional ACK Ranges (Gap, Range pairs)
    pub ack_ranges: tinyvec::TinyVec<[AckRange; 8]>,

    /// ECN counts (only present in ACK_ECN frames)
    pub ecn_counts: Option<EcnCounts>,
}

impl AckFrame {
    /// An ACK for a single packet number, with no further ranges.
    pub fn for_single_packet(largest_ack: PacketNumber) -> Self {
        Self {
            largest_ack,
            ack_delay: 0,
            first_ack_range: 0,
            ack_ranges: tinyvec::TinyVec::new(),
            ecn_counts: None,
        }
    }
}

/// ACK Range (RFC 9000 Section 19.3.1)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AckRange {
    /// Gap before this range (packet numbers NOT acknowledged)
    pub gap: VarInt,

    /// Length of this range (packet numbers acknowledged)
    pub length: VarInt,
}

/// ECN Counts (RFC 9000 Section 19.3.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcnCounts {
    pub ect0_count: VarInt,
    pub ect1_count: VarInt,
    pub ce_count: VarInt,
}

/// RESET_STREAM Frame (RFC 9000 Section 19.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetStreamFrame {
    pub stream_id: StreamId,
    pub error_code: ErrorCode,
    pub final_size: VarInt,
}

/// STOP_SENDING Frame (RFC 9000 Section 19.5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopSendingFrame {
    pub stream_id: StreamId,
    pub error_code: ErrorCode,
}

/// CRYPTO Frame (RFC 9000 Section 19.6)
///
/// Carries cryptographic handshake messages. Similar to a STREAM frame,
/// but the length field is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoFrame {
    /// Byte offset in the crypto stream
    pub offset: VarInt,

    /// Crypto data
    pub data: Bytes,
}

/// NEW_TOKEN Frame (RFC 9000 Section 19.7)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTokenFrame {
    pub token: Bytes,
}

/// STREAM Frame (RFC 9000 Section 19.8)
///
/// Carries application data on a stream. This is the primary data-carrying
/// frame.
///
/// `data_len_present` mirrors the LEN bit of the wire type byte. The frame
/// producers size STREAM frames with the length field included; the packer
/// clears the flag on the final STREAM frame of a packet, whose length is
/// then inferred from the packet boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    /// Stream ID
    pub stream_id: StreamId,

    /// Byte offset in the stream
    pub offset: VarInt,

    /// Stream data
    pub data: Bytes,

    /// FIN bit: no data follows this frame on the stream
    pub fin: bool,

    /// Whether the explicit length field is serialized
    pub data_len_present: bool,
}

impl StreamFrame {
    /// Split off a frame carrying the leading part of this frame's data so
    /// that the split-off frame serializes to at most `max_size` bytes.
    ///
    /// Returns `None` if the whole frame already fits, or if `max_size`
    /// leaves no room for any data. On a split, `self` keeps the remainder:
    /// its offset advances and the FIN bit stays with it.
    pub fn maybe_split_off(&mut self, max_size: usize, version: Version) -> Option<StreamFrame> {
        let frame_len = self.wire_len(version);
        if max_size >= frame_len {
            return None;
        }
        let header_len = frame_len - self.data.len();
        if max_size <= header_len {
            return None;
        }
        let n = max_size - header_len;
        let split = StreamFrame {
            stream_id: self.stream_id,
            offset: self.offset,
            data: self.data.split_to(n),
            fin: false,
            data_len_present: self.data_len_present,
        };
        self.offset += n as u64;
        Some(split)
    }
}

/// MAX_DATA Frame (RFC 9000 Section 19.9)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxDataFrame {
    pub maximum_data: VarInt,
}

/// MAX_STREAM_DATA Frame (RFC 9000 Section 19.10)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxStreamDataFrame {
    pub stream_id: StreamId,
    pub maximum_stream_data: VarInt,
}

/// MAX_STREAMS Frame (RFC 9000 Section 19.11)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxStreamsFrame {
    pub maximum_streams: VarInt,

    /// True for bidirectional, false for unidirectional
    pub bidirectional: bool,
}

/// DATA_BLOCKED Frame (RFC 9000 Section 19.12)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataBlockedFrame {
    pub data_limit: VarInt,
}

/// STREAM_DATA_BLOCKED Frame (RFC 9000 Section 19.13)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDataBlockedFrame {
    pub stream_id: StreamId,
    pub stream_data_limit: VarInt,
}

/// STREAMS_BLOCKED Frame (RFC 9000 Section 19.14)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamsBlockedFrame {
    pub stream_limit: VarInt,
    pub bidirectional: bool,
}

/// NEW_CONNECTION_ID Frame (RFC 9000 Section 19.15)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConnectionIdFrame {
    pub sequence_number: VarInt,
    pub retire_prior_to: VarInt,
    pub connection_id: ConnectionId,
    pub stateless_reset_token: [u8; 16],
}

/// RETIRE_CONNECTION_ID Frame (RFC 9000 Section 19.16)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetireConnectionIdFrame {
    pub sequence_number: VarInt,
}

/// PATH_CHALLENGE Frame (RFC 9000 Section 19.17)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathChallengeFrame {
    pub data: [u8; 8],
}

/// PATH_RESPONSE Frame (RFC 9000 Section 19.18)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathResponseFrame {
    pub data: [u8; 8],
}

/// CONNECTION_CLOSE Frame (RFC 9000 Section 19.19)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionCloseFrame {
    /// Error code
    pub error_code: VarInt,

    /// Frame type that triggered close (only for QUIC-level close)
    pub frame_type: Option<VarInt>,

    /// Human-readable reason (UTF-8)
    pub reason: Bytes,

    /// True if application-level close (0x1d), false if QUIC-level (0x1c)
    pub application_close: bool,
}

/// Unified Frame Type (RFC 9000 Section 19)
///
/// Discriminated union of all QUIC frame types the send path produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// PADDING frame (0x00)
    Padding,

    /// PING frame (0x01)
    Ping,

    /// ACK frame (0x02 or 0x03)
    Ack(AckFrame),

    /// RESET_STREAM frame (0x04)
    ResetStream(ResetStreamFrame),

    /// STOP_SENDING frame (0x05)
    StopSending(StopSendingFrame),

    /// CRYPTO frame (0x06)
    Crypto(CryptoFrame),

    /// NEW_TOKEN frame (0x07)
    NewToken(NewTokenFrame),

    /// STREAM frame (0x08-0x0f)
    Stream(StreamFrame),

    /// MAX_DATA frame (0x10)
    MaxData(MaxDataFrame),

    /// MAX_STREAM_DATA frame (0x11)
    MaxStreamData(MaxStreamDataFrame),

    /// MAX_STREAMS frame (0x12 or 0x13)
    MaxStreams(MaxStreamsFrame),

    /// DATA_BLOCKED frame (0x14)
    DataBlocked(DataBlockedFrame),

    /// STREAM_DATA_BLOCKED frame (0x15)
    StreamDataBlocked(StreamDataBlockedFrame),

    /// STREAMS_BLOCKED frame (0x16 or 0x17)
    StreamsBlocked(StreamsBlockedFrame),

    /// NEW_CONNECTION_ID frame (0x18)
    NewConnectionId(NewConnectionIdFrame),

    /// RETIRE_CONNECTION_ID frame (0x19)
    RetireConnectionId(RetireConnectionIdFrame),

    /// PATH_CHALLENGE frame (0x1a)
    PathChallenge(PathChallengeFrame),

    /// PATH_RESPONSE frame (0x1b)
    PathResponse(PathResponseFrame),

    /// CONNECTION_CLOSE frame (0x1c or 0x1d)
    ConnectionClose(ConnectionCloseFrame),

    /// HANDSHAKE_DONE frame (0x1e)
    HandshakeDone,
}

impl Frame {
    /// Returns true if this frame is ACK-eliciting (RFC 9000 Section 13.2)
    ///
    /// PADDING, ACK, and CONNECTION_CLOSE are not ACK-eliciting.
    pub fn is_ack_eliciting(&self) -> bool {
        !matches!(
            self,
            Frame::Padding | Frame::Ack(_) | Frame::ConnectionClose(_)
        )
    }
}

/// Returns true if any frame in the slice is ACK-eliciting.
pub fn has_ack_eliciting_frames(frames: &[Frame]) -> bool {
    frames.iter().any(Frame::is_ack_eliciting)
}
