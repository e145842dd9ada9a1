//! # QUIC Frame Types and Serialization (RFC 9000 Section 19)
//!
//! Owned frame representations for the send path. Every frame knows its
//! serialized length for a protocol version and how to write itself into a
//! packet buffer; decoding received frames is handled elsewhere.

#![forbid(unsafe_code)]

pub mod encode;
pub mod types;

pub use types::{
    has_ack_eliciting_frames, AckFrame, AckRange, ConnectionCloseFrame, CryptoFrame,
    DataBlockedFrame, EcnCounts, Frame, MaxDataFrame, MaxStreamDataFrame, MaxStreamsFrame,
    NewConnectionIdFrame, NewTokenFrame, PathChallengeFrame, PathResponseFrame,
    ResetStreamFrame, RetireConnectionIdFrame, StopSendingFrame, StreamDataBlockedFrame,
    StreamFrame, StreamsBlockedFrame,
};
