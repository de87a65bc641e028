//! Infrastructure Adapters
//!
//! This module contains adapter implementations for the domain ports,
//! following the Port/Adapter (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │  BlockDevice │ Digester │ DigestOracle │ BlockSink         │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ MemoryDevice │ FileDevice │ Sha256Digester                 │ │
//! │  │ DigestTable │ SegmentCursor                                │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use verity_fec::adapters::{DigestTable, FileDevice, Sha256Digester};
//!
//! let data = FileDevice::open("data.img", 4096)?;
//! let hash = FileDevice::open("hash.img", 4096)?;
//! let digester = Sha256Digester::from_hex_salt("-")?;
//!
//! // Record digests while the image is known good
//! let table = DigestTable::build(&digester, &data, &hash, &layout)?;
//! table.save("digests.json")?;
//! ```

mod digest_table;
mod file;
mod memory;
mod segments;
mod sha256;

pub use digest_table::DigestTable;
pub use file::FileDevice;
pub use memory::MemoryDevice;
pub use segments::SegmentCursor;
pub use sha256::{Sha256Digester, SHA256_DIGEST_SIZE};
