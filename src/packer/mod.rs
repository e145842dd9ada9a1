//! # Packet Assembly (RFC 9000 Section 12.2)
//!
//! The [`Packer`] composes outgoing packets from queued frames: it selects
//! the encryption level, builds the matching header, gathers frames under
//! the path-MTU byte budget, seals the payload, and applies header
//! protection. It performs no I/O and no retransmission scheduling; the
//! send loop drives it sequentially and ships the packets it returns.

#![forbid(unsafe_code)]

use crate::crypto::{
    CryptoStream, EncryptionLevel, Sealer, SealingManager, HEADER_PROTECTION_SAMPLE_LEN,
};
use crate::error::{Error, Result};
use crate::frames::{
    has_ack_eliciting_frames, AckFrame, ConnectionCloseFrame, Frame, StreamFrame,
};
use crate::packet::{ExtendedHeader, PacketBuffer, PacketNumberLen, PacketType};
use crate::types::{
    ConnectionId, PacketNumber, Perspective, Version, MAX_NON_ACK_ELICITING_ACKS,
    MAX_PACKET_SIZE_IPV4, MAX_PACKET_SIZE_IPV6, MIN_INITIAL_PACKET_SIZE, MIN_STREAM_FRAME_SIZE,
};
use bytes::{BufMut, Bytes};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{debug, trace};


// ============================================================================
// Collaborator Interfaces
// ============================================================================

/// Per-level packet number allocation
///
/// `peek` returns the number the next packet will carry without consuming
/// it; `pop` consumes it. The packer pops only after a packet has been
/// sealed, so a failed pack never leaves a gap in the number space.
pub trait PacketNumberManager {
    /// Next packet number for the level, and the minimum on-wire length
    /// sufficient to disambiguate it from already-acked packets.
    fn peek_packet_number(&self, level: EncryptionLevel) -> (PacketNumber, PacketNumberLen);

    /// Consume the next packet number for the level.
    fn pop_packet_number(&mut self, level: EncryptionLevel) -> PacketNumber;
}

/// Control- and stream-frame producers for 1-RTT payloads
///
/// Both methods append as many frames as fit into `max_len` bytes and
/// return the serialized length they added.
pub trait FrameSource {
    fn append_control_frames(&mut self, frames: &mut Vec<Frame>, max_len: usize) -> usize;
    fn append_stream_frames(&mut self, frames: &mut Vec<Frame>, max_len: usize) -> usize;
}

/// ACK generator
///
/// Returning a frame marks it as in flight; the caller must send it.
pub trait AckFrameSource {
    fn get_ack_frame(&mut self, level: EncryptionLevel) -> Option<AckFrame>;
}

/// Peer transport parameters the packer cares about
#[derive(Debug, Clone, Default)]
pub struct TransportParameters {
    /// Peer-advertised maximum UDP payload it will accept
    pub max_packet_size: Option<usize>,
}

/// Maximum packet size for a path towards `addr`.
pub fn max_packet_size_for_addr(addr: SocketAddr) -> usize {
    if addr.is_ipv4() {
        MAX_PACKET_SIZE_IPV4
    } else {
        MAX_PACKET_SIZE_IPV6
    }
}

// ============================================================================
// Payload and Packet Artifacts
// ============================================================================

/// An ordered frame sequence plus the cached total of their serialized
/// lengths, as budgeted during composition.
#[derive(Debug, Default)]
struct Payload {
    frames: Vec<Frame>,
    length: usize,
}

/// A sealed, wire-ready packet.
///
/// The frame list is retained for loss-recovery inspection and must be
/// treated as immutable after sealing. The backing buffer returns to the
/// pool when the packet is dropped, after the UDP write.
#[derive(Debug)]
pub struct PackedPacket {
    /// Header metadata the packet was built from
    pub header: ExtendedHeader,
    frames: Vec<Frame>,
    buffer: PacketBuffer,
}

impl PackedPacket {
    /// The sealed wire bytes.
    pub fn raw(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// The frames the payload was assembled from.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Encryption level, derived from the header form and type.
    pub fn encryption_level(&self) -> EncryptionLevel {
        if !self.header.is_long_header {
            return EncryptionLevel::OneRtt;
        }
        match self.header.ty {
            PacketType::Initial => EncryptionLevel::Initial,
            PacketType::Handshake => EncryptionLevel::Handshake,
            _ => EncryptionLevel::Unspecified,
        }
    }

    pub fn is_ack_eliciting(&self) -> bool {
        has_ack_eliciting_frames(&self.frames)
    }

    /// Convert into the record the loss-recovery module tracks.
    ///
    /// A leading ACK frame is split into its own field so it can be dropped
    /// independently of the retransmittable frames.
    pub fn to_sent_packet(&self) -> SentPacket {
        let (ack, frames) = match self.frames.split_first() {
            Some((Frame::Ack(ack), rest)) => (Some(ack.clone()), rest.to_vec()),
            _ => (None, self.frames.clone()),
        };
        SentPacket {
            packet_number: self.header.packet_number,
            ack,
            frames,
            length: self.buffer.len(),
            encryption_level: self.encryption_level(),
            send_time: Instant::now(),
        }
    }
}

/// A previously sent packet, as tracked by loss recovery.
#[derive(Debug, Clone)]
pub struct SentPacket {
    pub packet_number: PacketNumber,
    pub ack: Option<AckFrame>,
    pub frames: Vec<Frame>,
    pub length: usize,
    pub encryption_level: EncryptionLevel,
    pub send_time: Instant,
}

// ============================================================================
// Packer
// ============================================================================

/// Assembles outgoing packets for one connection.
///
/// Single-threaded with respect to itself: the connection's send loop
/// calls its operations sequentially.
pub struct Packer {
    dest_conn_id: ConnectionId,
    src_conn_id: ConnectionId,

    perspective: Perspective,
    version: Version,
    crypto_setup: Box<dyn SealingManager>,

    initial_stream: Box<dyn CryptoStream>,
    handshake_stream: Box<dyn CryptoStream>,

    token: Bytes,

    pn_manager: Box<dyn PacketNumberManager>,
    framer: Box<dyn FrameSource>,
    acks: Box<dyn AckFrameSource>,

    max_packet_size: usize,
    num_non_ack_eliciting_acks: usize,
}

impl Packer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dest_conn_id: ConnectionId,
        src_conn_id: ConnectionId,
        initial_stream: Box<dyn CryptoStream>,
        handshake_stream: Box<dyn CryptoStream>,
        pn_manager: Box<dyn PacketNumberManager>,
        remote_addr: SocketAddr,
        crypto_setup: Box<dyn SealingManager>,
        framer: Box<dyn FrameSource>,
        acks: Box<dyn AckFrameSource>,
        perspective: Perspective,
        version: Version,
    ) -> Self {
        Self {
            dest_conn_id,
            src_conn_id,
            perspective,
            version,
            crypto_setup,
            initial_stream,
            handshake_stream,
            token: Bytes::new(),
            pn_manager,
            framer,
            acks,
            max_packet_size: max_packet_size_for_addr(remote_addr),
            num_non_ack_eliciting_acks: 0,
        }
    }

    /// Pack the next ordinary packet.
    ///
    /// A pending crypto packet takes precedence; otherwise a 1-RTT packet
    /// is composed from the ACK, control, and stream frame sources.
    /// Returns `None` when there is nothing to send this tick.
    pub fn pack_packet(&mut self) -> Result<Option<PackedPacket>> {
        if let Some(packet) = self.maybe_pack_crypto_packet()? {
            return Ok(Some(packet));
        }

        let (enc_level, sealer) = self.crypto_setup.get_sealer();
        let header = self.get_header(enc_level);
        let header_len = header.wire_len(self.version);

        let max_frame_size = self
            .max_packet_size
            .saturating_sub(sealer.overhead())
            .saturating_sub(header_len);
        let mut payload = self.compose_next_packet(max_frame_size);

        if payload.frames.is_empty() {
            return Ok(None);
        }
        // An ACK-only packet does not get acknowledged by the peer. After
        // too many of them in a row, a PING forces an acknowledgment.
        if !has_ack_eliciting_frames(&payload.frames) {
            if self.num_non_ack_eliciting_acks >= MAX_NON_ACK_ELICITING_ACKS {
                payload.length += Frame::Ping.wire_len(self.version);
                payload.frames.push(Frame::Ping);
                self.num_non_ack_eliciting_acks = 0;
            } else {
                self.num_non_ack_eliciting_acks += 1;
            }
        } else {
            self.num_non_ack_eliciting_acks = 0;
        }

        self.write_and_seal_packet(header, payload, enc_level, &*sealer)
            .map(Some)
    }

    /// Pack a packet containing only a pending 1-RTT ACK, if one exists.
    pub fn maybe_pack_ack_packet(&mut self) -> Result<Option<PackedPacket>> {
        let ack = match self.acks.get_ack_frame(EncryptionLevel::OneRtt) {
            Some(ack) => ack,
            None => return Ok(None),
        };
        let sealer = self
            .crypto_setup
            .get_sealer_with_encryption_level(EncryptionLevel::OneRtt)?;
        let payload = Payload {
            length: ack.wire_len(self.version),
            frames: vec![Frame::Ack(ack)],
        };
        let header = self.get_header(EncryptionLevel::OneRtt);
        let packet =
            self.write_and_seal_packet(header, payload, EncryptionLevel::OneRtt, &*sealer)?;
        self.num_non_ack_eliciting_acks += 1;
        Ok(Some(packet))
    }

    /// Re-assemble the frames of a previously sent packet into one or more
    /// new packets at the original encryption level, with fresh packet
    /// numbers.
    ///
    /// STREAM frames are split across packets when the original no longer
    /// fits; CRYPTO and control frames are never split, since the header of
    /// a retransmission is never larger than the original's.
    pub fn pack_retransmission(&mut self, packet: &SentPacket) -> Result<Vec<PackedPacket>> {
        let mut control_frames: VecDeque<Frame> = VecDeque::new();
        let mut stream_frames: VecDeque<StreamFrame> = VecDeque::new();
        for frame in &packet.frames {
            // CRYPTO frames are treated as control frames here.
            match frame {
                Frame::Stream(sf) => {
                    let mut sf = sf.clone();
                    sf.data_len_present = true;
                    stream_frames.push_back(sf);
                }
                f => control_frames.push_back(f.clone()),
            }
        }

        let enc_level = packet.encryption_level;
        let sealer = self.crypto_setup.get_sealer_with_encryption_level(enc_level)?;

        let mut packets = Vec::new();
        while !control_frames.is_empty() || !stream_frames.is_empty() {
            let header = self.get_header(enc_level);
            let header_len = header.wire_len(self.version);
            let max_size = self
                .max_packet_size
                .saturating_sub(sealer.overhead())
                .saturating_sub(header_len);

            let mut frames = Vec::new();
            let mut length = 0usize;

            while let Some(frame) = control_frames.pop_front() {
                let frame_len = frame.wire_len(self.version);
                if length + frame_len > max_size {
                    control_frames.push_front(frame);
                    break;
                }
                length += frame_len;
                frames.push(frame);
            }

            while length + MIN_STREAM_FRAME_SIZE < max_size {
                let mut front = match stream_frames.pop_front() {
                    Some(front) => front,
                    None => break,
                };
                front.data_len_present = false;
                match front.maybe_split_off(max_size - length, self.version) {
                    Some(split) => {
                        front.data_len_present = true;
                        stream_frames.push_front(front);
                        length += split.wire_len(self.version);
                        frames.push(Frame::Stream(split));
                    }
                    None => {
                        front.data_len_present = true;
                        length += front.wire_len(self.version);
                        frames.push(Frame::Stream(front));
                    }
                }
            }

            if frames.is_empty() {
                // A frame that fits in no packet would loop forever.
                let size = control_frames
                    .front()
                    .map(|f| f.wire_len(self.version))
                    .or_else(|| stream_frames.front().map(|f| f.wire_len(self.version)))
                    .unwrap_or_default();
                return Err(Error::FrameTooLarge { size, max: max_size });
            }
            if let Some(Frame::Stream(sf)) = frames.last_mut() {
                sf.data_len_present = false;
            }

            let packed =
                self.write_and_seal_packet(header, Payload { frames, length }, enc_level, &*sealer)?;
            packets.push(packed);
        }
        debug!(
            packet_number = packet.packet_number,
            packets = packets.len(),
            "reassembled retransmission"
        );
        Ok(packets)
    }

    /// Pack a packet whose entire payload is the given CONNECTION_CLOSE
    /// frame, at the current default encryption level.
    pub fn pack_connection_close(&mut self, frame: ConnectionCloseFrame) -> Result<PackedPacket> {
        let payload = Payload {
            length: frame.wire_len(self.version),
            frames: vec![Frame::ConnectionClose(frame)],
        };
        let (enc_level, sealer) = self.crypto_setup.get_sealer();
        let header = self.get_header(enc_level);
        self.write_and_seal_packet(header, payload, enc_level, &*sealer)
    }

    /// Clamp the maximum packet size to what the peer advertised.
    pub fn handle_transport_parameters(&mut self, params: &TransportParameters) {
        if let Some(peer_max) = params.max_packet_size {
            let clamped = self.max_packet_size.min(peer_max);
            if clamped != self.max_packet_size {
                debug!(max_packet_size = clamped, "clamped max packet size");
                self.max_packet_size = clamped;
            }
        }
    }

    /// Replace the retry token used in subsequent client Initial packets.
    pub fn set_token(&mut self, token: Bytes) {
        self.token = token;
    }

    /// Use a new destination connection ID for all subsequent headers.
    pub fn change_dest_connection_id(&mut self, conn_id: ConnectionId) {
        self.dest_conn_id = conn_id;
    }

    /// Pack a crypto packet if handshake data or a handshake-level ACK is
    /// pending; Initial takes precedence over Handshake.
    ///
    /// The packet contains at most two frames: the pending ACK, then a
    /// single CRYPTO frame sized to fill the remaining budget.
    fn maybe_pack_crypto_packet(&mut self) -> Result<Option<PackedPacket>> {
        let mut enc_level = EncryptionLevel::Initial;
        let mut has_data = self.initial_stream.has_data();
        let mut ack = self.acks.get_ack_frame(EncryptionLevel::Initial);
        if !has_data && ack.is_none() {
            has_data = self.handshake_stream.has_data();
            ack = self.acks.get_ack_frame(EncryptionLevel::Handshake);
            enc_level = EncryptionLevel::Handshake;
            if !has_data && ack.is_none() {
                return Ok(None);
            }
        }

        let sealer = self.crypto_setup.get_sealer_with_encryption_level(enc_level)?;
        let header = self.get_header(enc_level);
        let header_len = header.wire_len(self.version);

        let mut frames = Vec::with_capacity(2);
        let mut length = 0usize;
        if let Some(ack) = ack {
            length += ack.wire_len(self.version);
            frames.push(Frame::Ack(ack));
        }
        if has_data {
            let budget = self
                .max_packet_size
                .saturating_sub(header_len)
                .saturating_sub(sealer.overhead())
                .saturating_sub(length);
            let stream = match enc_level {
                EncryptionLevel::Initial => &mut self.initial_stream,
                _ => &mut self.handshake_stream,
            };
            if let Some(frame) = stream.pop_crypto_frame(budget) {
                length += frame.wire_len(self.version);
                frames.push(Frame::Crypto(frame));
            }
        }
        self.write_and_seal_packet(header, Payload { frames, length }, enc_level, &*sealer)
            .map(Some)
    }

    /// Gather the 1-RTT payload under `max_frame_size` bytes.
    ///
    /// ACKs go first so they can be recognized in `to_sent_packet`.
    fn compose_next_packet(&mut self, mut max_frame_size: usize) -> Payload {
        let mut frames = Vec::new();
        let mut length = 0usize;

        if let Some(ack) = self.acks.get_ack_frame(EncryptionLevel::OneRtt) {
            length += ack.wire_len(self.version);
            frames.push(Frame::Ack(ack));
        }

        length += self
            .framer
            .append_control_frames(&mut frames, max_frame_size.saturating_sub(length));

        // Temporarily increase the budget by the minimum length of the
        // DataLen field. Packet length calculations are done with STREAM
        // frames that have DataLen set, but the last STREAM frame in the
        // packet omits it, yielding a packet of exactly the right size.
        max_frame_size += 1;

        let length_added = self
            .framer
            .append_stream_frames(&mut frames, max_frame_size.saturating_sub(length));
        if !frames.is_empty() {
            if let Some(Frame::Stream(sf)) = frames.last_mut() {
                sf.data_len_present = false;
            }
            length += length_added;
        }
        Payload { frames, length }
    }

    /// Build the header for an encryption level, peeking the packet number.
    fn get_header(&self, enc_level: EncryptionLevel) -> ExtendedHeader {
        let (pn, pn_len) = self.pn_manager.peek_packet_number(enc_level);
        let mut header = ExtendedHeader {
            is_long_header: false,
            ty: PacketType::Initial,
            version: self.version,
            dest_connection_id: self.dest_conn_id.clone(),
            src_connection_id: ConnectionId::default(),
            token: None,
            length: 0,
            packet_number: pn,
            packet_number_len: pn_len,
            key_phase: false,
        };

        if enc_level != EncryptionLevel::OneRtt {
            header.is_long_header = true;
            // Initial and Handshake packets always carry the maximum packet
            // number length. The header can then never grow, so CRYPTO
            // frames never have to be split on retransmission.
            header.packet_number_len = PacketNumberLen::Four;
            header.src_connection_id = self.src_conn_id.clone();
            // Pre-fill the Length field with the maximum packet size; the
            // real value is at most that, so the varint never changes size
            // after payload assembly.
            header.length = self.max_packet_size as u64;
            header.ty = match enc_level {
                EncryptionLevel::Initial => PacketType::Initial,
                _ => PacketType::Handshake,
            };
        }

        header
    }

    /// Finalize the Length field, compute padding, then serialize and seal.
    fn write_and_seal_packet(
        &mut self,
        mut header: ExtendedHeader,
        payload: Payload,
        enc_level: EncryptionLevel,
        sealer: &dyn Sealer,
    ) -> Result<PackedPacket> {
        let pn_len = header.packet_number_len.len();
        let mut padding_len = 0usize;

        if enc_level != EncryptionLevel::OneRtt {
            if self.perspective == Perspective::Client && header.ty == PacketType::Initial {
                header.token = Some(self.token.clone());
                let header_len = header.wire_len(self.version);
                header.length = (pn_len + MIN_INITIAL_PACKET_SIZE).saturating_sub(header_len) as u64;
                padding_len = (MIN_INITIAL_PACKET_SIZE - sealer.overhead())
                    .saturating_sub(header_len + payload.length);
            } else {
                header.length = (pn_len + sealer.overhead() + payload.length) as u64;
            }
        } else {
            // Keep at least 4 bytes after the packet number so the header
            // protection sample stays in bounds.
            let min_payload = 4usize.saturating_sub(pn_len);
            if payload.length < min_payload {
                padding_len = min_payload - payload.length;
            }
        }
        self.write_and_seal_packet_with_padding(header, payload, padding_len, enc_level, sealer)
    }

    fn write_and_seal_packet_with_padding(
        &mut self,
        header: ExtendedHeader,
        payload: Payload,
        padding_len: usize,
        enc_level: EncryptionLevel,
        sealer: &dyn Sealer,
    ) -> Result<PackedPacket> {
        let mut buffer = PacketBuffer::acquire();
        let buf = buffer.bytes_mut();

        header.write(buf, self.version);
        let payload_offset = buf.len();

        if padding_len > 0 {
            // PADDING frames are all-zero bytes.
            buf.put_bytes(0, padding_len);
        }
        for frame in &payload.frames {
            frame.write(buf, self.version)?;
        }

        let size = buf.len() + sealer.overhead();
        if size > self.max_packet_size {
            return Err(Error::PacketTooLarge {
                size,
                max: self.max_packet_size,
            });
        }

        // Seal in place: ciphertext plus tag replace the plaintext payload,
        // with the serialized header as associated data.
        buf.resize(size, 0);
        {
            let (associated_data, sealed) = buf.split_at_mut(payload_offset);
            sealer.seal_in_place(header.packet_number, associated_data, sealed)?;
        }

        // Header protection samples as if the packet number were 4 bytes
        // long, regardless of the actual length.
        let pn_len = header.packet_number_len.len();
        let pn_offset = payload_offset - pn_len;
        let mut sample = [0u8; HEADER_PROTECTION_SAMPLE_LEN];
        sample.copy_from_slice(&buf[pn_offset + 4..pn_offset + 4 + HEADER_PROTECTION_SAMPLE_LEN]);
        {
            let (head, tail) = buf.split_at_mut(pn_offset);
            sealer.encrypt_header(&sample, &mut head[0], &mut tail[..pn_len]);
        }

        let popped = self.pn_manager.pop_packet_number(enc_level);
        if popped != header.packet_number {
            return Err(Error::PacketNumberMismatch {
                peeked: header.packet_number,
                popped,
            });
        }

        trace!(
            packet_number = header.packet_number,
            level = ?enc_level,
            size,
            frames = payload.frames.len(),
            "sealed packet"
        );
        Ok(PackedPacket {
            header,
            frames: payload.frames,
            buffer,
        })
    }
}
