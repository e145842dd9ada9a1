//! # Sealing Interfaces (RFC 9001 Section 5)
//!
//! The packet assembly core does not manage keys or run the key schedule.
//! The handshake layer hands it sealer objects through the traits defined
//! here; one sealer bundles the AEAD key, nonce derivation, and header
//! protection key for one direction at one encryption level.

#![forbid(unsafe_code)]

use crate::error::Result;
use crate::frames::CryptoFrame;
use crate::types::PacketNumber;
use std::sync::Arc;

/// Sample length used for header protection (RFC 9001 Section 5.4.2)
pub const HEADER_PROTECTION_SAMPLE_LEN: usize = 16;

/// Encryption Level (RFC 9001 Section 2.1)
///
/// Each level has its own keys, packet-number space, and allowed frame
/// types. `Unspecified` marks invalid states, e.g. a long header whose type
/// maps to no level the packer handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncryptionLevel {
    Initial,
    Handshake,
    OneRtt,
    Unspecified,
}

/// AEAD sealing plus header protection for one encryption level
///
/// `seal_in_place` and `encrypt_header` operate directly on the packet
/// buffer; the packer guarantees the layout described on each method.
pub trait Sealer: Send + Sync {
    /// Length in bytes of the authentication tag appended by `seal_in_place`
    /// (16 for AEAD_AES_128_GCM).
    fn overhead(&self) -> usize;

    /// AEAD-seal the packet payload in place.
    ///
    /// `buf` holds the plaintext payload followed by `overhead()` spare
    /// bytes; on return the whole of `buf` is ciphertext plus tag.
    /// `associated_data` is the serialized header preceding the payload.
    fn seal_in_place(
        &self,
        packet_number: PacketNumber,
        associated_data: &[u8],
        buf: &mut [u8],
    ) -> Result<()>;

    /// Apply header protection (RFC 9001 Section 5.4.1).
    ///
    /// XORs a mask derived from `sample` into the low bits of `first_byte`
    /// and into `pn_bytes`.
    fn encrypt_header(
        &self,
        sample: &[u8; HEADER_PROTECTION_SAMPLE_LEN],
        first_byte: &mut u8,
        pn_bytes: &mut [u8],
    );
}

/// Access to the sealers the handshake layer has installed so far
///
/// Handles are reference-counted so a sealer obtained at the start of a
/// pack operation stays valid across the mutable work that follows.
pub trait SealingManager {
    /// The highest encryption level with sealing keys, and its sealer.
    fn get_sealer(&self) -> (EncryptionLevel, Arc<dyn Sealer>);

    /// A sealer for a specific level, or `Error::KeysUnavailable` when the
    /// keys were never installed or have been discarded.
    fn get_sealer_with_encryption_level(
        &self,
        level: EncryptionLevel,
    ) -> Result<Arc<dyn Sealer>>;
}

/// Outgoing side of one crypto stream (RFC 9000 Section 4.1.3)
///
/// One instance exists per handshake encryption level.
pub trait CryptoStream {
    /// Whether handshake bytes are queued for sending.
    fn has_data(&self) -> bool;

    /// Pop a CRYPTO frame sized to fit within `max_len` bytes, including
    /// the frame's own header.
    fn pop_crypto_frame(&mut self, max_len: usize) -> Option<CryptoFrame>;
}
