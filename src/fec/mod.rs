//! Forward Error Correction Module
//!
//! Repairs blocks of a verity-protected device from an interleaved
//! Reed-Solomon parity stream kept on a separate redundancy device.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              FecEngine                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                          │
//! │  ┌──────────────┐    ┌──────────────┐    ┌───────────────────────────┐  │
//! │  │   Options    │───▶│   Geometry   │───▶│   Interleaver             │  │
//! │  │   (table)    │    │  (derived)   │    │  (symbol ↔ device byte)   │  │
//! │  └──────────────┘    └──────────────┘    └───────────────────────────┘  │
//! │                                                   │                      │
//! │  ┌──────────────┐    ┌──────────────┐    ┌────────┴──────────────────┐  │
//! │  │ Buffer Pool  │───▶│    Repair    │◀───│   Erasure Locator         │  │
//! │  │ (workspaces) │    │ (two passes) │    │  (digest oracle)          │  │
//! │  └──────────────┘    └──────┬───────┘    └───────────────────────────┘  │
//! │                             │                                            │
//! │                   ┌─────────┴─────────┐                                  │
//! │                   │  Codec (RS/GF256) │                                  │
//! │                   └───────────────────┘                                  │
//! │                                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - **Options** (`options.rs`): table option parsing and the status line.
//! - **Geometry** (`geometry.rs`): validated redundancy parameters and the
//!   mapping from covered blocks to devices.
//! - **Interleaver** (`interleave.rs`): where each codeword symbol lives.
//! - **Codec** (`codec.rs`, `gf256.rs`): RS(255, N) errors-and-erasures
//!   decoder, plus the encoder.
//! - **Buffer Pool** (`pool.rs`): per-session workspaces, never fails.
//! - **Erasure Locator** (`erasure.rs`): flags known-bad symbols.
//! - **Repair** (`repair.rs`): the two-attempt orchestrator.
//! - **Encoder** (`encoder.rs`): builds a parity stream for tooling.
//!
//! # Usage
//!
//! ```rust,ignore
//! use verity_fec::fec::{Destination, FecDevices, FecEngine, FecOptions, PoolConfig};
//!
//! let options = FecOptions::parse_args(table_args, layout.data_block_size)?;
//! let engine = FecEngine::new(&options, &layout, devices, digester, oracle, &PoolConfig::default())?;
//!
//! let mut block = vec![0u8; layout.data_block_size];
//! engine.decode(1234, BlockType::Data, Destination::Buffer(&mut block))?;
//! ```

pub mod codec;
pub mod encoder;
pub mod erasure;
pub mod geometry;
pub mod gf256;
pub mod interleave;
pub mod options;
pub mod pool;
pub mod ratelimit;
pub mod repair;
pub mod stats;

mod proptest;

pub use codec::{DecoderWorkspace, ReedSolomon};
pub use encoder::encode_parity;
pub use geometry::{BlockLocation, DeviceSizes, Geometry, VerityLayout};
pub use interleave::Interleaver;
pub use options::{FecOptions, StatusReport};
pub use pool::{BufferPool, Lease, PoolConfig, Workspace};
pub use repair::{Destination, FecDevices, FecEngine, RepairOutcome};
pub use stats::{FecStats, StatsSnapshot};
