//! Error types for packet assembly operations.

use crate::crypto::EncryptionLevel;
use thiserror::Error;

/// Errors surfaced by the packet assembly core.
///
/// Variants labelled `BUG:` indicate that the packer's sizing model and
/// reality diverged; the connection should be terminated when one occurs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Keys for the requested encryption level are not (or no longer)
    /// available. The send loop typically drops the packet and retries.
    #[error("sealer for {0:?} encryption level not available")]
    KeysUnavailable(EncryptionLevel),

    /// A frame failed to serialize; indicates a frame mutated between
    /// sizing and writing.
    #[error("frame encoding error: {0}")]
    FrameEncoding(&'static str),

    /// The assembled packet exceeds the maximum packet size.
    #[error("BUG: packet too large ({size} bytes, allowed {max} bytes)")]
    PacketTooLarge { size: usize, max: usize },

    /// A queued frame fits into no packet at the current size budget.
    #[error("BUG: frame of {size} bytes does not fit into any packet (budget {max} bytes)")]
    FrameTooLarge { size: usize, max: usize },

    /// Peeked and popped packet numbers do not match.
    #[error("BUG: peeked and popped packet numbers do not match ({peeked} != {popped})")]
    PacketNumberMismatch { peeked: u64, popped: u64 },
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
