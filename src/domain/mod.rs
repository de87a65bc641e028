//! Domain Layer
//!
//! The traits the FEC engine consumes from its collaborators, and the small
//! value types shared across them.
//!
//! # Usage
//!
//! ```ignore
//! use verity_fec::domain::{BlockDevice, Digester};
//!
//! fn block_matches<D: BlockDevice, H: Digester>(dev: &D, hash: &H, index: u64, want: &[u8]) -> bool {
//!     let mut real = [0u8; 64];
//!     let real = &mut real[..hash.digest_size()];
//!     match dev.read_block(index) {
//!         Ok(data) => hash.digest(&data, real).is_ok() && real == want,
//!         Err(_) => false,
//!     }
//! }
//! ```

pub mod ports;

pub use ports::{BlockDevice, BlockSink, BlockType, DigestOracle, Digester, MAX_DIGEST_SIZE};
