//! # Frame Serialization (RFC 9000 Section 19)
//!
//! Writer-side encoding for every frame type. Sizing and writing must stay
//! in lockstep: the packer budgets payloads with `wire_len` and verifies the
//! final packet size after writing.

#![forbid(unsafe_code)]

use crate::error::{Error, Result};
use crate::frames::types::*;
use crate::types::{VarIntCodec, Version};
use bytes::BufMut;

pub const FRAME_TYPE_PADDING: u8 = 0x00;
pub const FRAME_TYPE_PING: u8 = 0x01;
pub const FRAME_TYPE_ACK: u8 = 0x02;
pub const FRAME_TYPE_ACK_ECN: u8 = 0x03;
pub const FRAME_TYPE_RESET_STREAM: u8 = 0x04;
pub const FRAME_TYPE_STOP_SENDING: u8 = 0x05;
pub const FRAME_TYPE_CRYPTO: u8 = 0x06;
pub const FRAME_TYPE_NEW_TOKEN: u8 = 0x07;
pub const FRAME_TYPE_STREAM_BASE: u8 = 0x08; // 0x08-0x0f
pub const FRAME_TYPE_MAX_DATA: u8 = 0x10;
pub const FRAME_TYPE_MAX_STREAM_DATA: u8 = 0x11;
pub const FRAME_TYPE_MAX_STREAMS_BIDI: u8 = 0x12;
pub const FRAME_TYPE_MAX_STREAMS_UNI: u8 = 0x13;
pub const FRAME_TYPE_DATA_BLOCKED: u8 = 0x14;
pub const FRAME_TYPE_STREAM_DATA_BLOCKED: u8 = 0x15;
pub const FRAME_TYPE_STREAMS_BLOCKED_BIDI: u8 = 0x16;
pub const FRAME_TYPE_STREAMS_BLOCKED_UNI: u8 = 0x17;
pub const FRAME_TYPE_NEW_CONNECTION_ID: u8 = 0x18;
pub const FRAME_TYPE_RETIRE_CONNECTION_ID: u8 = 0x19;
pub const FRAME_TYPE_PATH_CHALLENGE: u8 = 0x1a;
pub const FRAME_TYPE_PATH_RESPONSE: u8 = 0x1b;
pub const FRAME_TYPE_CONNECTION_CLOSE_QUIC: u8 = 0x1c;
pub const FRAME_TYPE_CONNECTION_CLOSE_APP: u8 = 0x1d;
pub const FRAME_TYPE_HANDSHAKE_DONE: u8 = 0x1e;

/// STREAM frame flag bits, encoded in the type byte (RFC 9000 Section 19.8)
pub const STREAM_FRAME_BIT_FIN: u8 = 0x01;
pub const STREAM_FRAME_BIT_LEN: u8 = 0x02;
pub const STREAM_FRAME_BIT_OFF: u8 = 0x04;

impl AckFrame {
    pub fn wire_len(&self, _version: Version) -> usize {
        let mut len = 1
            + VarIntCodec::size(self.largest_ack)
            + VarIntCodec::size(self.ack_delay)
            + VarIntCodec::size(self.ack_ranges.len() as u64)
            + VarIntCodec::size(self.first_ack_range);
        for range in &self.ack_ranges {
            len += VarIntCodec::size(range.gap) + VarIntCodec::size(range.length);
        }
        if let Some(ecn) = &self.ecn_counts {
            len += VarIntCodec::size(ecn.ect0_count)
                + VarIntCodec::size(ecn.ect1_count)
                + VarIntCodec::size(ecn.ce_count);
        }
        len
    }

    pub fn write<B: BufMut>(&self, buf: &mut B, _version: Version) {
        buf.put_u8(if self.ecn_counts.is_some() {
            FRAME_TYPE_ACK_ECN
        } else {
            FRAME_TYPE_ACK
        });
        VarIntCodec::put(buf, self.largest_ack);
        VarIntCodec::put(buf, self.ack_delay);
        VarIntCodec::put(buf, self.ack_ranges.len() as u64);
        VarIntCodec::put(buf, self.first_ack_range);
        for range in &self.ack_ranges {
            VarIntCodec::put(buf, range.gap);
            VarIntCodec::put(buf, range.length);
        }
        if let Some(ecn) = &self.ecn_counts {
            VarIntCodec::put(buf, ecn.ect0_count);
            VarIntCodec::put(buf, ecn.ect1_count);
            VarIntCodec::put(buf, ecn.ce_count);
        }
    }
}

impl CryptoFrame {
    pub fn wire_len(&self, _version: Version) -> usize {
        1 + VarIntCodec::size(self.offset)
            + VarIntCodec::size(self.data.len() as u64)
            + self.data.len()
    }

    pub fn write<B: BufMut>(&self, buf: &mut B, _version: Version) {
        buf.put_u8(FRAME_TYPE_CRYPTO);
        VarIntCodec::put(buf, self.offset);
        VarIntCodec::put(buf, self.data.len() as u64);
        buf.put_slice(&self.data);
    }
}

impl StreamFrame {
    pub fn wire_len(&self, _version: Version) -> usize {
        let mut len = 1 + VarIntCodec::size(self.stream_id);
        if self.offset > 0 {
            len += VarIntCodec::size(self.offset);
        }
        if self.data_len_present {
            len += VarIntCodec::size(self.data.len() as u64);
        }
        len + self.data.len()
    }

    pub fn write<B: BufMut>(&self, buf: &mut B, _version: Version) {
        let mut type_byte = FRAME_TYPE_STREAM_BASE;
        if self.fin {
            type_byte |= STREAM_FRAME_BIT_FIN;
        }
        if self.data_len_present {
            type_byte |= STREAM_FRAME_BIT_LEN;
        }
        if self.offset > 0 {
            type_byte |= STREAM_FRAME_BIT_OFF;
        }
        buf.put_u8(type_byte);
        VarIntCodec::put(buf, self.stream_id);
        if self.offset > 0 {
            VarIntCodec::put(buf, self.offset);
        }
        if self.data_len_present {
            VarIntCodec::put(buf, self.data.len() as u64);
        }
        buf.put_slice(&self.data);
    }
}

impl ConnectionCloseFrame {
    pub fn wire_len(&self, _version: Version) -> usize {
        let mut len = 1 + VarIntCodec::size(self.error_code);
        if !self.application_close {
            len += VarIntCodec::size(self.frame_type.unwrap_or(0));
        }
        len + VarIntCodec::size(self.reason.len() as u64) + self.reason.len()
    }

    pub fn write<B: BufMut>(&self, buf: &mut B, _version: Version) {
        buf.put_u8(if self.application_close {
            FRAME_TYPE_CONNECTION_CLOSE_APP
        } else {
            FRAME_TYPE_CONNECTION_CLOSE_QUIC
        });
        VarIntCodec::put(buf, self.error_code);
        if !self.application_close {
            VarIntCodec::put(buf, self.frame_type.unwrap_or(0));
        }
        VarIntCodec::put(buf, self.reason.len() as u64);
        buf.put_slice(&self.reason);
    }
}

impl Frame {
    /// Serialized length of this frame for the given protocol version.
    pub fn wire_len(&self, version: Version) -> usize {
        match self {
            Frame::Padding => 1,
            Frame::Ping => 1,
            Frame::Ack(f) => f.wire_len(version),
            Frame::ResetStream(f) => {
                1 + VarIntCodec::size(f.stream_id)
                    + VarIntCodec::size(f.error_code)
                    + VarIntCodec::size(f.final_size)
            }
            Frame::StopSending(f) => {
                1 + VarIntCodec::size(f.stream_id) + VarIntCodec::size(f.error_code)
            }
            Frame::Crypto(f) => f.wire_len(version),
            Frame::NewToken(f) => {
                1 + VarIntCodec::size(f.token.len() as u64) + f.token.len()
            }
            Frame::Stream(f) => f.wire_len(version),
            Frame::MaxData(f) => 1 + VarIntCodec::size(f.maximum_data),
            Frame::MaxStreamData(f) => {
                1 + VarIntCodec::size(f.stream_id) + VarIntCodec::size(f.maximum_stream_data)
            }
            Frame::MaxStreams(f) => 1 + VarIntCodec::size(f.maximum_streams),
            Frame::DataBlocked(f) => 1 + VarIntCodec::size(f.data_limit),
            Frame::StreamDataBlocked(f) => {
                1 + VarIntCodec::size(f.stream_id) + VarIntCodec::size(f.stream_data_limit)
            }
            Frame::StreamsBlocked(f) => 1 + VarIntCodec::size(f.stream_limit),
            Frame::NewConnectionId(f) => {
                1 + VarIntCodec::size(f.sequence_number)
                    + VarIntCodec::size(f.retire_prior_to)
                    + 1
                    + f.connection_id.len()
                    + 16
            }
            Frame::RetireConnectionId(f) => 1 + VarIntCodec::size(f.sequence_number),
            Frame::PathChallenge(_) | Frame::PathResponse(_) => 1 + 8,
            Frame::ConnectionClose(f) => f.wire_len(version),
            Frame::HandshakeDone => 1,
        }
    }

    /// Serialize this frame into `buf`.
    ///
    /// PADDING is rejected: the packer emits padding as raw zero bytes
    /// ahead of the frames, never as a queued frame.
    pub fn write<B: BufMut>(&self, buf: &mut B, version: Version) -> Result<()> {
        match self {
            Frame::Padding => {
                return Err(Error::FrameEncoding(
                    "PADDING is written as raw bytes, not as a frame",
                ))
            }
            Frame::Ping => buf.put_u8(FRAME_TYPE_PING),
            Frame::Ack(f) => f.write(buf, version),
            Frame::ResetStream(f) => {
                buf.put_u8(FRAME_TYPE_RESET_STREAM);
                VarIntCodec::put(buf, f.stream_id);
                VarIntCodec::put(buf, f.error_code);
                VarIntCodec::put(buf, f.final_size);
            }
            Frame::StopSending(f) => {
                buf.put_u8(FRAME_TYPE_STOP_SENDING);
                VarIntCodec::put(buf, f.stream_id);
                VarIntCodec::put(buf, f.error_code);
            }
            Frame::Crypto(f) => f.write(buf, version),
            Frame::NewToken(f) => {
                buf.put_u8(FRAME_TYPE_NEW_TOKEN);
                VarIntCodec::put(buf, f.token.len() as u64);
                buf.put_slice(&f.token);
            }
            Frame::Stream(f) => f.write(buf, version),
            Frame::MaxData(f) => {
                buf.put_u8(FRAME_TYPE_MAX_DATA);
                VarIntCodec::put(buf, f.maximum_data);
            }
            Frame::MaxStreamData(f) => {
                buf.put_u8(FRAME_TYPE_MAX_STREAM_DATA);
                VarIntCodec::put(buf, f.stream_id);
                VarIntCodec::put(buf, f.maximum_stream_data);
            }
            Frame::MaxStreams(f) => {
                buf.put_u8(if f.bidirectional {
                    FRAME_TYPE_MAX_STREAMS_BIDI
                } else {
                    FRAME_TYPE_MAX_STREAMS_UNI
                });
                VarIntCodec::put(buf, f.maximum_streams);
            }
            Frame::DataBlocked(f) => {
                buf.put_u8(FRAME_TYPE_DATA_BLOCKED);
                VarIntCodec::put(buf, f.data_limit);
            }
            Frame::StreamDataBlocked(f) => {
                buf.put_u8(FRAME_TYPE_STREAM_DATA_BLOCKED);
                VarIntCodec::put(buf, f.stream_id);
                VarIntCodec::put(buf, f.stream_data_limit);
            }
            Frame::StreamsBlocked(f) => {
                buf.put_u8(if f.bidirectional {
                    FRAME_TYPE_STREAMS_BLOCKED_BIDI
                } else {
                    FRAME_TYPE_STREAMS_BLOCKED_UNI
                });
                VarIntCodec::put(buf, f.stream_limit);
            }
            Frame::NewConnectionId(f) => {
                buf.put_u8(FRAME_TYPE_NEW_CONNECTION_ID);
                VarIntCodec::put(buf, f.sequence_number);
                VarIntCodec::put(buf, f.retire_prior_to);
                buf.put_u8(f.connection_id.len() as u8);
                buf.put_slice(f.connection_id.as_bytes());
                buf.put_slice(&f.stateless_reset_token);
            }
            Frame::RetireConnectionId(f) => {
                buf.put_u8(FRAME_TYPE_RETIRE_CONNECTION_ID);
                VarIntCodec::put(buf, f.sequence_number);
            }
            Frame::PathChallenge(f) => {
                buf.put_u8(FRAME_TYPE_PATH_CHALLENGE);
                buf.put_slice(&f.data);
            }
            Frame::PathResponse(f) => {
                buf.put_u8(FRAME_TYPE_PATH_RESPONSE);
                buf.put_slice(&f.data);
            }
            Frame::ConnectionClose(f) => f.write(buf, version),
            Frame::HandshakeDone => buf.put_u8(FRAME_TYPE_HANDSHAKE_DONE),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConnectionId, VERSION_1};
    use bytes::{Bytes, BytesMut};
    use tinyvec::{tiny_vec, TinyVec};

    fn assert_len_matches(frame: Frame) {
        let mut buf = BytesMut::new();
        frame.write(&mut buf, VERSION_1).unwrap();
        assert_eq!(
            buf.len(),
            frame.wire_len(VERSION_1),
            "wire_len mismatch for {:?}",
            frame
        );
    }

    #[test]
    fn test_wire_len_matches_written_len() {
        assert_len_matches(Frame::Ping);
        assert_len_matches(Frame::HandshakeDone);
        assert_len_matches(Frame::Ack(AckFrame {
            largest_ack: 100_000,
            ack_delay: 85,
            first_ack_range: 12,
            ack_ranges: tiny_vec![
                [AckRange; 8] =>
                AckRange { gap: 2, length: 5 },
                AckRange { gap: 100, length: 1 }
            ],
            ecn_counts: Some(EcnCounts {
                ect0_count: 1,
                ect1_count: 0,
                ce_count: 99,
            }),
        }));
        assert_len_matches(Frame::ResetStream(ResetStreamFrame {
            stream_id: 4,
            error_code: 0x1234,
            final_size: 70_000,
        }));
        assert_len_matches(Frame::StopSending(StopSendingFrame {
            stream_id: 8,
            error_code: 7,
        }));
        assert_len_matches(Frame::Crypto(CryptoFrame {
            offset: 16384,
            data: Bytes::from(vec![1u8; 300]),
        }));
        assert_len_matches(Frame::NewToken(NewTokenFrame {
            token: Bytes::from(vec![9u8; 64]),
        }));
        assert_len_matches(Frame::MaxData(MaxDataFrame { maximum_data: 1 << 20 }));
        assert_len_matches(Frame::MaxStreamData(MaxStreamDataFrame {
            stream_id: 12,
            maximum_stream_data: 1 << 30,
        }));
        assert_len_matches(Frame::MaxStreams(MaxStreamsFrame {
            maximum_streams: 100,
            bidirectional: true,
        }));
        assert_len_matches(Frame::DataBlocked(DataBlockedFrame { data_limit: 63 }));
        assert_len_matches(Frame::StreamDataBlocked(StreamDataBlockedFrame {
            stream_id: 3,
            stream_data_limit: 64,
        }));
        assert_len_matches(Frame::StreamsBlocked(StreamsBlockedFrame {
            stream_limit: 10,
            bidirectional: false,
        }));
        assert_len_matches(Frame::NewConnectionId(NewConnectionIdFrame {
            sequence_number: 3,
            retire_prior_to: 1,
            connection_id: ConnectionId::from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap(),
            stateless_reset_token: [0xaa; 16],
        }));
        assert_len_matches(Frame::RetireConnectionId(RetireConnectionIdFrame {
            sequence_number: 2,
        }));
        assert_len_matches(Frame::PathChallenge(PathChallengeFrame { data: [1; 8] }));
        assert_len_matches(Frame::PathResponse(PathResponseFrame { data: [2; 8] }));
        assert_len_matches(Frame::ConnectionClose(ConnectionCloseFrame {
            error_code: 0x0a,
            frame_type: Some(0x06),
            reason: Bytes::from_static(b"handshake failed"),
            application_close: false,
        }));
        assert_len_matches(Frame::ConnectionClose(ConnectionCloseFrame {
            error_code: 0x17,
            frame_type: None,
            reason: Bytes::new(),
            application_close: true,
        }));
    }

    #[test]
    fn test_stream_frame_type_bits() {
        let frame = StreamFrame {
            stream_id: 4,
            offset: 0,
            data: Bytes::from_static(b"hi"),
            fin: false,
            data_len_present: false,
        };
        let mut buf = BytesMut::new();
        frame.write(&mut buf, VERSION_1);
        assert_eq!(buf[0], 0x08);

        let frame = StreamFrame {
            stream_id: 4,
            offset: 10,
            data: Bytes::from_static(b"hi"),
            fin: true,
            data_len_present: true,
        };
        let mut buf = BytesMut::new();
        frame.write(&mut buf, VERSION_1);
        assert_eq!(buf[0], 0x08 | 0x04 | 0x02 | 0x01);
    }

    #[test]
    fn test_stream_frame_wire_len_tracks_data_len_flag() {
        let mut frame = StreamFrame {
            stream_id: 4,
            offset: 0,
            data: Bytes::from(vec![0u8; 100]),
            fin: false,
            data_len_present: true,
        };
        let with_len = frame.wire_len(VERSION_1);
        frame.data_len_present = false;
        let without_len = frame.wire_len(VERSION_1);
        // a 100-byte length field takes 2 varint bytes
        assert_eq!(with_len, without_len + 2);
    }

    #[test]
    fn test_ack_frame_wire_format() {
        let ack = AckFrame {
            largest_ack: 9,
            ack_delay: 0,
            first_ack_range: 3,
            ack_ranges: TinyVec::new(),
            ecn_counts: None,
        };
        let mut buf = BytesMut::new();
        ack.write(&mut buf, VERSION_1);
        assert_eq!(&buf[..], &[0x02, 0x09, 0x00, 0x00, 0x03]);
    }

    #[test]
    fn test_padding_frame_write_is_rejected() {
        let mut buf = BytesMut::new();
        assert!(Frame::Padding.write(&mut buf, VERSION_1).is_err());
        assert!(buf.is_empty());
    }
}
