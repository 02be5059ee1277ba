//! Generated 12-byte object identifiers
//!
//! Ids are derived with BLAKE3 from a process-global counter, so every
//! `ObjectId::new()` in a process is unique and cheap to produce.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// Global id counter, one sequence per process
static NEXT_OID_SEQ: AtomicU64 = AtomicU64::new(1);

/// 12-byte document identifier, assigned to inserted documents that do
/// not carry an `_id` of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Generate a fresh id from the process-global sequence.
    pub fn new() -> Self {
        let seq = NEXT_OID_SEQ.fetch_add(1, Ordering::Relaxed);
        let hash = blake3::hash(&seq.to_le_bytes());
        let mut bytes = [0u8; 12];
        bytes.copy_from_slice(&hash.as_bytes()[0..12]);
        ObjectId(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId(bytes)
    }

    pub fn bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        ObjectId([0u8; 12])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
