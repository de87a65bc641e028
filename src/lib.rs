//! verity-fec - Forward Error Correction for Verity Devices
//!
//! Repairs blocks of a read-only, hash-verified block device whose contents
//! no longer match their expected digest. Redundancy lives on a companion
//! device as an interleaved Reed-Solomon parity stream; a repaired block is
//! re-verified before it is handed back.
//!
//! # Architecture
//!
//! ```text
//! integrity layer ──(hash mismatch)──► FecEngine::decode ──► verified block
//!                                          │
//!                      ┌───────────────────┼───────────────────┐
//!                      ▼                   ▼                   ▼
//!                 data device         hash device         FEC device
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Block devices, digesters and digest oracles
//! - [`domain`] - Ports the engine consumes
//! - [`error`] - Error types
//! - [`fec`] - Geometry, codec, buffer pool and the repair engine

pub mod adapters;
pub mod domain;
pub mod error;
pub mod fec;

// Re-export commonly used types
pub use domain::{BlockDevice, BlockSink, BlockType, DigestOracle, Digester};
pub use error::{ConfigError, Error, Result};
pub use fec::{Destination, FecDevices, FecEngine, FecOptions, PoolConfig, RepairOutcome, VerityLayout};
