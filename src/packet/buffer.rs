//! # Packet Buffer Pool
//!
//! Outgoing packets are written into fixed-capacity buffers drawn from a
//! process-wide pool. A buffer is acquired inside the write-and-seal
//! routine and travels with the packed packet; dropping the buffer after
//! the UDP write returns its storage to the pool.

#![forbid(unsafe_code)]

use crate::types::MAX_PACKET_BUFFER_SIZE;
use bytes::BytesMut;
use once_cell::sync::Lazy;
use std::sync::Mutex;

/// Upper bound on pooled buffers kept around when idle.
const MAX_POOLED_BUFFERS: usize = 32;

static POOL: Lazy<Mutex<Vec<BytesMut>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// A fixed-capacity byte slab for one outgoing packet.
///
/// Deref gives access to the written bytes; the storage goes back to the
/// pool when the buffer is dropped.
#[derive(Debug)]
pub struct PacketBuffer {
    bytes: BytesMut,
}

impl PacketBuffer {
    /// Take a cleared buffer from the pool, allocating if the pool is empty.
    pub fn acquire() -> Self {
        let bytes = POOL
            .lock()
            .ok()
            .and_then(|mut pool| pool.pop())
            .unwrap_or_else(|| BytesMut::with_capacity(MAX_PACKET_BUFFER_SIZE));
        Self { bytes }
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut BytesMut {
        &mut self.bytes
    }

    /// The assembled packet bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Drop for PacketBuffer {
    fn drop(&mut self) {
        let mut bytes = std::mem::take(&mut self.bytes);
        bytes.clear();
        if bytes.capacity() >= MAX_PACKET_BUFFER_SIZE {
            let mut pool = match POOL.lock() {
                Ok(pool) => pool,
                Err(_) => return,
            };
            if pool.len() < MAX_POOLED_BUFFERS {
                pool.push(bytes);
            }
        }
    }
}
