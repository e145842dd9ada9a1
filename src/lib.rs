//! # quicpack: QUIC Packet Assembly Core
//!
//! This crate implements the packet assembly subsystem of a QUIC transport
//! endpoint (RFC 9000, RFC 9001): composing outgoing packets from queued
//! frames, selecting the encryption level and packet-number encoding,
//! enforcing the path-MTU budget, AEAD-sealing the payload, and applying
//! header protection.
//!
//! ## Architecture Overview
//!
//! ```text
//! quicpack/
//! ├── error          - Unified error types; BUG-labelled invariant violations
//! ├── types          - VarInt codec, connection IDs, protocol constants
//! ├── frames         - Owned frame types, sizing, and serialization
//! ├── packet         - Extended headers, packet-number encoding, buffer pool
//! ├── crypto         - Sealer / sealing-manager / crypto-stream interfaces
//! └── packer         - The Packer and its collaborator traits
//! ```
//!
//! ## Design Principles
//!
//! 1. **Pure state machine**: No I/O, sockets, or event loops. A pack
//!    operation runs synchronously to completion and hands a wire-ready
//!    buffer to the caller's send path.
//!
//! 2. **Single-threaded core**: The connection's send loop drives the
//!    [`packer::Packer`] sequentially; no internal locking.
//!
//! 3. **Stable sizing model**: Long headers force 4-byte packet numbers and
//!    pre-fill the Length field, so a header never grows between budgeting
//!    and serialization. Divergence between the sizing model and the bytes
//!    actually written is a BUG-class error.
//!
//! 4. **Pluggable collaborators**: Packet numbers, frames, ACKs, and
//!    sealers are supplied through traits, enabling testability and keeping
//!    handshake, loss recovery, and flow control out of this crate.
//!
//! ## Usage Sketch
//!
//! ```rust,ignore
//! use quicpack::packer::Packer;
//!
//! let mut packer = Packer::new(
//!     dest_cid, src_cid,
//!     initial_stream, handshake_stream,
//!     pn_manager, remote_addr, crypto_setup, framer, acks,
//!     Perspective::Client, VERSION_1,
//! );
//!
//! while let Some(packet) = packer.pack_packet()? {
//!     let sent = packet.to_sent_packet();
//!     socket.send(packet.raw())?;
//!     loss_recovery.on_packet_sent(sent);
//! }
//! ```

#![forbid(unsafe_code)]

/// Error types for packet assembly
pub mod error;

/// Core QUIC types and protocol constants
pub mod types;

/// Sealing and crypto-stream interfaces (RFC 9001)
pub mod crypto;

/// QUIC frame types and serialization (RFC 9000 Section 19)
pub mod frames;

/// Outgoing packet headers, packet numbers, and buffers (RFC 9000 Section 17)
pub mod packet;

/// The packet packer (RFC 9000 Section 12.2)
pub mod packer;

pub use crypto::{CryptoStream, EncryptionLevel, Sealer, SealingManager};
pub use error::{Error, Result};
pub use frames::Frame;
pub use packer::{
    max_packet_size_for_addr, AckFrameSource, FrameSource, PackedPacket, Packer,
    PacketNumberManager, SentPacket, TransportParameters,
};
pub use packet::{ExtendedHeader, PacketBuffer, PacketNumberLen, PacketType};
pub use types::{ConnectionId, PacketNumber, Perspective, StreamId, VarInt, Version, VERSION_1};
