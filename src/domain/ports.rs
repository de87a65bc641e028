//! Domain Ports (Port/Adapter Pattern)
//!
//! This module defines the abstractions the FEC engine depends on. The
//! surrounding integrity layer (or the adapters in [`crate::adapters`])
//! provides the concrete implementations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        FEC Engine                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │  BlockDevice │ Digester │ DigestOracle │ BlockSink   │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │  MemoryDevice │ FileDevice │ Sha256Digester │ ...    │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! All ports are synchronous: repairs run inline on the thread that owns the
//! failing I/O, so every call here may block.

use bytes::Bytes;

use crate::error::Result;

/// Largest digest any [`Digester`] may produce (SHA-512 sized).
pub const MAX_DIGEST_SIZE: usize = 64;

// =============================================================================
// Value Objects
// =============================================================================

/// Which area of the protected space a block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    /// A block on the data device, indexed from the start of the data area
    Data,
    /// A hash tree (or trailing metadata) block, indexed on the hash device
    Metadata,
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockType::Data => write!(f, "data"),
            BlockType::Metadata => write!(f, "metadata"),
        }
    }
}

// =============================================================================
// Block Device Port
// =============================================================================

/// Port for reading fixed-size blocks from a device.
///
/// Implementations are expected to sit behind a read-through cache; the
/// returned [`Bytes`] may alias cached memory and is never written to.
pub trait BlockDevice: Send + Sync {
    /// Human-readable device identity, used in logs and status output.
    fn name(&self) -> &str;

    /// Size of every block in bytes.
    fn block_size(&self) -> usize;

    /// Number of whole blocks on the device.
    fn block_count(&self) -> u64;

    /// Read one block. The result is exactly `block_size()` bytes long.
    fn read_block(&self, index: u64) -> std::io::Result<Bytes>;
}

// =============================================================================
// Hashing Ports
// =============================================================================

/// Port for the integrity layer's block hash primitive.
pub trait Digester: Send + Sync {
    /// Digest length in bytes, at most [`MAX_DIGEST_SIZE`].
    fn digest_size(&self) -> usize;

    /// Hash `data` into `out`, which is exactly `digest_size()` bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Hash` if the digest cannot be computed.
    fn digest(&self, data: &[u8], out: &mut [u8]) -> Result<()>;
}

/// Port for looking up the pre-recorded digest of a block.
///
/// For [`BlockType::Data`] the index is a data block number; for
/// [`BlockType::Metadata`] it is a block number on the hash device.
pub trait DigestOracle: Send + Sync {
    /// Copy the expected digest of `block` into `out`.
    ///
    /// Returns `Ok(false)` when no verified digest is available for the
    /// block, in which case `out` is left untouched.
    fn expected_digest(&self, block_type: BlockType, block: u64, out: &mut [u8]) -> Result<bool>;
}

// =============================================================================
// Output Port
// =============================================================================

/// Port for delivering a corrected block piecewise, e.g. into the segments
/// of a scatter/gather request.
pub trait BlockSink {
    /// Next writable region, at most `max_len` bytes long, or `None` when
    /// the sink has no room left.
    fn next_segment(&mut self, max_len: usize) -> Option<&mut [u8]>;
}
