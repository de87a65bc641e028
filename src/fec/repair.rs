//! Block Repair
//!
//! Reconstructs a block that failed verification from the interleaved
//! Reed-Solomon codewords covering it.
//!
//! # Flow
//!
//! ```text
//!   decode(block)
//!        │
//!        ▼
//!   ┌───────────────────────┐  per pass: read the N blocks sharing the
//!   │ attempt (no erasures) │  block's codewords, deinterleave, decode,
//!   └──────────┬────────────┘  keep symbol `residual` of each codeword
//!              │ digest mismatch, codeword failure, read or hash error
//!              ▼
//!   ┌───────────────────────┐  same passes, but unreadable blocks and
//!   │ attempt (erasures)    │  data blocks failing their digest are
//!   └──────────┬────────────┘  handed to the decoder as erasures
//!              │
//!              ▼
//!     verified block ──► Destination (buffer or sink)
//! ```
//!
//! Locating erasures costs one digest per contributing data block, which is
//! why the first attempt goes without.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use super::codec::ReedSolomon;
use super::erasure::ErasureLocator;
use super::geometry::{BlockLocation, DeviceSizes, Geometry, VerityLayout};
use super::interleave::Interleaver;
use super::options::{FecOptions, StatusReport, MAX_ROOTS};
use super::pool::{BufferPool, PoolConfig, Workspace, CODEWORDS_PER_BUFFER};
use super::ratelimit::{log_limited, LogRateLimit};
use super::stats::{FecStats, StatsSnapshot};
use crate::domain::{BlockDevice, BlockSink, BlockType, DigestOracle, Digester, MAX_DIGEST_SIZE};
use crate::error::{ConfigError, Error, Result};

// =============================================================================
// Public Types
// =============================================================================

/// The three devices a repair reads from.
#[derive(Clone)]
pub struct FecDevices {
    /// Data device
    pub data: Arc<dyn BlockDevice>,
    /// Hash device; also holds any trailing metadata
    pub hash: Arc<dyn BlockDevice>,
    /// Redundancy device holding the parity stream
    pub fec: Arc<dyn BlockDevice>,
}

impl FecDevices {
    fn sizes(&self) -> DeviceSizes {
        DeviceSizes {
            data: self.data.block_count(),
            hash: self.hash.block_count(),
            fec: self.fec.block_count(),
        }
    }
}

/// Where a corrected block is delivered.
pub enum Destination<'a> {
    /// A contiguous buffer of at least one block
    Buffer(&'a mut [u8]),
    /// Piecewise, e.g. into the segments of a scatter/gather request
    Sink(&'a mut dyn BlockSink),
}

/// Summary of a successful repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RepairOutcome {
    /// Symbols corrected across all codewords of the block
    pub corrected: usize,
    /// Largest erasure list handed to the decoder in any pass
    pub erasures: usize,
    /// Whether the erasure-aware attempt was needed
    pub used_erasures: bool,
}

// =============================================================================
// Engine
// =============================================================================

/// Forward error correction for one verity target.
///
/// Shared between I/O threads; every repair borrows its own workspace from
/// the pool and holds no lock while reading devices.
pub struct FecEngine {
    inner: Option<ActiveFec>,
}

struct ActiveFec {
    geometry: Geometry,
    interleaver: Interleaver,
    code: ReedSolomon,
    devices: FecDevices,
    digester: Arc<dyn Digester>,
    oracle: Arc<dyn DigestOracle>,
    pool: BufferPool,
    stats: FecStats,
    log_limit: LogRateLimit,
}

impl FecEngine {
    /// An engine with error correction turned off.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Validate the options against the target and its devices.
    ///
    /// Options that name no redundancy device leave FEC disabled; any other
    /// inconsistency is a [`ConfigError`].
    pub fn new(
        options: &FecOptions,
        layout: &VerityLayout,
        devices: FecDevices,
        digester: Arc<dyn Digester>,
        oracle: Arc<dyn DigestOracle>,
        pool: &PoolConfig,
    ) -> Result<Self> {
        if !options.is_enabled() {
            debug!("no redundancy device configured, FEC disabled");
            return Ok(Self::disabled());
        }

        let geometry = Geometry::derive(options, layout, &devices.sizes())?;
        for device in [&devices.data, &devices.hash, &devices.fec] {
            if device.block_size() != geometry.block_size() {
                return Err(ConfigError::Invalid {
                    option: "block size",
                    reason: format!(
                        "{} has {}-byte blocks, expected {}",
                        device.name(),
                        device.block_size(),
                        geometry.block_size()
                    ),
                }
                .into());
            }
        }
        if digester.digest_size() == 0 || digester.digest_size() > MAX_DIGEST_SIZE {
            return Err(ConfigError::Invalid {
                option: "digest",
                reason: format!(
                    "digest size {} outside 1..={}",
                    digester.digest_size(),
                    MAX_DIGEST_SIZE
                ),
            }
            .into());
        }

        let code = ReedSolomon::new(geometry.data_symbols(), geometry.roots())?;
        let pool = BufferPool::new(
            geometry.data_symbols(),
            geometry.roots(),
            geometry.block_size(),
            pool,
        );

        info!(
            device = geometry.device(),
            blocks = geometry.protected_blocks(),
            start = geometry.start(),
            roots = geometry.roots(),
            rounds = geometry.total_codewords(),
            "FEC enabled"
        );

        Ok(Self {
            inner: Some(ActiveFec {
                interleaver: Interleaver::new(&geometry),
                geometry,
                code,
                devices,
                digester,
                oracle,
                pool,
                stats: FecStats::default(),
                log_limit: LogRateLimit::default(),
            }),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Redundancy parameters, when enabled.
    pub fn geometry(&self) -> Option<&Geometry> {
        self.inner.as_ref().map(|fec| &fec.geometry)
    }

    /// Current configuration, when enabled.
    pub fn status_report(&self) -> Option<StatusReport> {
        self.inner.as_ref().map(|fec| fec.geometry.status())
    }

    /// Repair counters; all zero when disabled.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner
            .as_ref()
            .map(|fec| StatsSnapshot {
                log_suppressed: fec.log_limit.suppressed(),
                ..fec.stats.snapshot()
            })
            .unwrap_or_default()
    }

    /// Reconstruct `block` and deliver it to `destination`.
    ///
    /// Data blocks are indexed on the data device, metadata blocks on the
    /// hash device. The result has been verified against the block's
    /// expected digest. If the repair fails nothing is written to
    /// `destination`; a [`Destination::Sink`] that runs out of room before
    /// the whole block is delivered keeps the segments already filled and
    /// the call fails with [`Error::ShortDestination`].
    #[instrument(skip(self, block_type, destination), fields(block_type = %block_type))]
    pub fn decode(
        &self,
        block: u64,
        block_type: BlockType,
        destination: Destination<'_>,
    ) -> Result<RepairOutcome> {
        let fec = self.inner.as_ref().ok_or(Error::Disabled)?;
        fec.repair(block, block_type, destination)
    }
}

impl std::fmt::Debug for FecEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Some(fec) => f
                .debug_struct("FecEngine")
                .field("geometry", &fec.geometry)
                .field("pool", &fec.pool)
                .finish(),
            None => f.write_str("FecEngine(disabled)"),
        }
    }
}

// =============================================================================
// Repair Session
// =============================================================================

/// One block's codeword coordinates.
#[derive(Debug, Clone, Copy)]
struct Target {
    block: u64,
    rsb: u64,
    residual: usize,
}

impl ActiveFec {
    fn repair(
        &self,
        block: u64,
        block_type: BlockType,
        destination: Destination<'_>,
    ) -> Result<RepairOutcome> {
        let block_size = self.geometry.block_size();
        if let Destination::Buffer(ref buf) = destination {
            if buf.len() < block_size {
                return Err(Error::ShortDestination {
                    required: block_size,
                    available: buf.len(),
                });
            }
        }

        let linear = self.geometry.linear_index(block_type, block)?;
        let digest_size = self.digester.digest_size();
        let mut want = [0u8; MAX_DIGEST_SIZE];
        if !self
            .oracle
            .expected_digest(block_type, block, &mut want[..digest_size])?
        {
            return Err(Error::MissingDigest { block });
        }
        let want = &want[..digest_size];

        let (rsb, residual) = self.interleaver.codeword_base(linear);
        let target = Target {
            block,
            rsb,
            residual,
        };
        self.stats.record_attempt();

        let mut lease = self.pool.acquire();
        let mut retried = false;
        let result = match self.attempt(&mut lease, target, want, false) {
            Err(e) if e.is_retryable() => {
                debug!(block, error = %e, "retrying with erasures");
                retried = true;
                self.attempt(&mut lease, target, want, true)
            }
            result => result,
        };

        match result {
            Ok(outcome) => match deliver(lease.output(), destination) {
                Ok(()) => {
                    self.stats.record_success(outcome.corrected, retried);
                    Ok(outcome)
                }
                Err(e) => {
                    self.stats.record_failure(retried);
                    Err(e)
                }
            },
            Err(e) => {
                self.stats.record_failure(retried);
                Err(e)
            }
        }
    }

    /// Decode every codeword of the target block, then verify the result.
    fn attempt(
        &self,
        ws: &mut Workspace,
        target: Target,
        want: &[u8],
        use_erasures: bool,
    ) -> Result<RepairOutcome> {
        let block_size = self.geometry.block_size();
        let per_pass = ws.codewords_per_pass();
        let mut corrected = 0;
        let mut erasures = 0;

        let mut pos = 0;
        while pos < block_size {
            let count = per_pass.min(block_size - pos);
            self.stats.record_pass();

            for buffer in ws.buffers.iter_mut() {
                buffer.fill(0);
            }
            ws.erasures.clear();

            self.read_pass(ws, target, pos, count, use_erasures);
            let decoded = self.decode_pass(ws, target, pos, count, use_erasures);
            erasures = erasures.max(ws.erasures.len());
            corrected += decoded.map_err(|e| match e {
                Error::CodewordUncorrectable(_) => Error::Uncorrectable {
                    block: target.block,
                    erasures,
                },
                e => e,
            })?;

            pos += count;
        }

        let mut real = [0u8; MAX_DIGEST_SIZE];
        let real = &mut real[..want.len()];
        self.digester.digest(&ws.output, real)?;
        if real != want {
            log_limited!(
                self.log_limit,
                error!(
                    device = self.devices.data.name(),
                    rsb = target.rsb,
                    erasures,
                    "FEC failed to correct"
                )
            );
            return Err(Error::Uncorrectable {
                block: target.block,
                erasures,
            });
        }

        Ok(RepairOutcome {
            corrected,
            erasures,
            used_erasures: use_erasures,
        })
    }

    /// Read the blocks holding each data symbol of this pass's codewords
    /// and deinterleave bytes `pos..pos + count` of each into the buffers.
    fn read_pass(&self, ws: &mut Workspace, target: Target, pos: usize, count: usize, use_erasures: bool) {
        let data_symbols = self.geometry.data_symbols();
        let block_size = self.geometry.block_size() as u64;
        let locator = ErasureLocator::new(&*self.digester, &*self.oracle, self.geometry.roots());

        for symbol in 0..data_symbols {
            let linear = self.interleaver.symbol_offset(target.rsb, symbol) / block_size;
            let (device, index) = match self.geometry.map_block(linear) {
                BlockLocation::Data(index) => (&self.devices.data, index),
                BlockLocation::Hash(index) => (&self.devices.hash, index),
                // Encoded as zeros; the buffers are already zeroed
                BlockLocation::Padding => continue,
            };

            let data = match read_full(device.as_ref(), index) {
                Ok(data) => data,
                Err(e) => {
                    self.stats.record_read_failure();
                    log_limited!(
                        self.log_limit,
                        warn!(
                            device = device.name(),
                            rsb = target.rsb,
                            block = index,
                            error = %e,
                            use_erasures,
                            "FEC read failed"
                        )
                    );
                    if use_erasures {
                        locator.record(&mut ws.erasures, symbol);
                    }
                    continue;
                }
            };

            if use_erasures && matches!(self.geometry.map_block(linear), BlockLocation::Data(_)) {
                locator.check(&mut ws.erasures, symbol, index, &data);
            }

            for (j, &byte) in data[pos..pos + count].iter().enumerate() {
                let buffer = &mut ws.buffers[j / CODEWORDS_PER_BUFFER];
                buffer[(j % CODEWORDS_PER_BUFFER) * data_symbols + symbol] = byte;
            }
        }
    }

    /// Decode this pass's codewords and copy the target's symbol of each
    /// into the output block.
    fn decode_pass(
        &self,
        ws: &mut Workspace,
        target: Target,
        pos: usize,
        count: usize,
        use_erasures: bool,
    ) -> Result<usize> {
        let data_symbols = self.geometry.data_symbols();
        let roots = self.geometry.roots();
        let Workspace {
            buffers,
            decoder,
            output,
            erasures,
        } = ws;

        let first = target.rsb + pos as u64;
        let mut parity_cursor = ParityCursor::new(
            self.devices.fec.as_ref(),
            self.geometry.start(),
            self.interleaver.parity_offset(first),
        );
        let mut parity = [0u8; MAX_ROOTS as usize];
        let parity = &mut parity[..roots];
        let mut corrected = 0;

        for j in 0..count {
            parity_cursor.read_into(parity).inspect_err(|e| {
                error!(
                    device = self.devices.fec.name(),
                    rsb = target.rsb,
                    error = %e,
                    "FEC parity read failed"
                );
            })?;

            let slot = (j % CODEWORDS_PER_BUFFER) * data_symbols;
            let codeword = &mut buffers[j / CODEWORDS_PER_BUFFER][slot..slot + data_symbols];
            match self.code.decode(decoder, codeword, parity, erasures) {
                Ok(n) => corrected += n,
                Err(e) => {
                    if use_erasures {
                        log_limited!(
                            self.log_limit,
                            error!(
                                device = self.devices.data.name(),
                                rsb = target.rsb,
                                error = %e,
                                "FEC failed to correct"
                            )
                        );
                    }
                    return Err(e);
                }
            }
            output[pos + j] = codeword[target.residual];
        }

        if corrected > 0 {
            log_limited!(
                self.log_limit,
                warn!(
                    device = self.devices.data.name(),
                    rsb = target.rsb,
                    corrected,
                    "FEC corrected errors"
                )
            );
        }
        Ok(corrected)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Sequential reader over the parity stream; a codeword's parity may span
/// two blocks.
struct ParityCursor<'a> {
    device: &'a dyn BlockDevice,
    block: u64,
    offset: usize,
    /// Empty until the current block has been read
    current: Bytes,
}

impl<'a> ParityCursor<'a> {
    fn new(device: &'a dyn BlockDevice, start: u64, position: u64) -> Self {
        let block_size = device.block_size() as u64;
        Self {
            device,
            block: start + position / block_size,
            offset: (position % block_size) as usize,
            current: Bytes::new(),
        }
    }

    fn read_into(&mut self, out: &mut [u8]) -> Result<()> {
        let block_size = self.device.block_size();
        let mut filled = 0;
        while filled < out.len() {
            if self.offset == block_size {
                self.block += 1;
                self.offset = 0;
                self.current = Bytes::new();
            }
            if self.current.is_empty() {
                self.current =
                    read_full(self.device, self.block).map_err(|source| Error::Io {
                        device: self.device.name().to_string(),
                        block: self.block,
                        source,
                    })?;
            }

            let n = (out.len() - filled).min(block_size - self.offset);
            out[filled..filled + n]
                .copy_from_slice(&self.current[self.offset..self.offset + n]);
            filled += n;
            self.offset += n;
        }
        Ok(())
    }
}

/// Read a block, rejecting short reads.
fn read_full(device: &dyn BlockDevice, index: u64) -> std::io::Result<Bytes> {
    let data = device.read_block(index)?;
    if data.len() < device.block_size() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("short read: {} of {} bytes", data.len(), device.block_size()),
        ));
    }
    Ok(data)
}

fn deliver(block: &[u8], destination: Destination<'_>) -> Result<()> {
    match destination {
        Destination::Buffer(buf) => {
            buf[..block.len()].copy_from_slice(block);
        }
        Destination::Sink(sink) => {
            let mut written = 0;
            while written < block.len() {
                let segment = match sink.next_segment(block.len() - written) {
                    Some(segment) if !segment.is_empty() => segment,
                    _ => {
                        return Err(Error::ShortDestination {
                            required: block.len(),
                            available: written,
                        })
                    }
                };
                let n = segment.len().min(block.len() - written);
                segment[..n].copy_from_slice(&block[written..written + n]);
                written += n;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{DigestTable, MemoryDevice, SegmentCursor, Sha256Digester};
    use assert_matches::assert_matches;

    const BS: usize = 512;

    struct Fixture {
        engine: FecEngine,
        data: Arc<MemoryDevice>,
        original: Vec<Vec<u8>>,
    }

    /// Hashes like `inner` but fails on one exact block content.
    struct PoisonedDigester {
        inner: Sha256Digester,
        poison: Vec<u8>,
    }

    impl Digester for PoisonedDigester {
        fn digest_size(&self) -> usize {
            self.inner.digest_size()
        }

        fn digest(&self, data: &[u8], out: &mut [u8]) -> Result<()> {
            if data == self.poison.as_slice() {
                return Err(Error::Hash("hash engine fault".into()));
            }
            self.inner.digest(data, out)
        }
    }

    fn fixture(roots: u8) -> Fixture {
        fixture_with(roots, None)
    }

    /// 300 data blocks, no hash tree. With `poison`, the engine's digester
    /// fails on that block's original contents.
    fn fixture_with(roots: u8, poison: Option<usize>) -> Fixture {
        let blocks = 300u64;
        let original: Vec<Vec<u8>> = (0..blocks)
            .map(|b| (0..BS).map(|i| (b as usize * 7 + i * 13) as u8).collect())
            .collect();
        let data = Arc::new(MemoryDevice::from_blocks("data", BS, original.clone()));
        let hash = Arc::new(MemoryDevice::zeroed("hash", BS, 0));

        let layout = VerityLayout {
            data_block_size: BS,
            hash_block_size: BS,
            data_blocks: blocks,
            hash_start: 0,
            hash_end: 0,
        };
        let options = FecOptions {
            device: Some("fec".into()),
            blocks: Some(blocks),
            start: Some(0),
            roots: Some(roots),
        };
        let sizes = DeviceSizes {
            data: blocks,
            hash: 0,
            fec: u64::MAX,
        };
        let geometry = Geometry::derive(&options, &layout, &sizes).unwrap();
        let parity = super::super::encoder::encode_parity(&geometry, data.as_ref(), hash.as_ref()).unwrap();
        let fec = Arc::new(MemoryDevice::from_bytes("fec", BS, parity));

        let sha = Sha256Digester::new(b"salt".to_vec());
        let digests = Arc::new(
            DigestTable::build(&sha, data.as_ref(), hash.as_ref(), &layout).unwrap(),
        );
        let digester: Arc<dyn Digester> = match poison {
            Some(block) => Arc::new(PoisonedDigester {
                inner: sha,
                poison: original[block].clone(),
            }),
            None => Arc::new(sha),
        };

        let engine = FecEngine::new(
            &options,
            &layout,
            FecDevices {
                data: data.clone(),
                hash,
                fec,
            },
            digester,
            digests,
            &PoolConfig::minimal(1),
        )
        .unwrap();

        Fixture {
            engine,
            data,
            original,
        }
    }

    #[test]
    fn test_disabled_engine() {
        let engine = FecEngine::disabled();
        let mut out = vec![0u8; BS];
        assert!(!engine.is_enabled());
        assert!(engine.status_report().is_none());
        assert_matches!(
            engine.decode(0, BlockType::Data, Destination::Buffer(&mut out)),
            Err(Error::Disabled)
        );
    }

    #[test]
    fn test_intact_block_returned_unchanged() {
        let fx = fixture(2);
        let mut out = vec![0u8; BS];
        let outcome = fx
            .engine
            .decode(17, BlockType::Data, Destination::Buffer(&mut out))
            .unwrap();

        assert_eq!(out, fx.original[17]);
        assert_eq!(outcome.corrected, 0);
        assert!(!outcome.used_erasures);
    }

    #[test]
    fn test_repairs_corrupted_block() {
        let fx = fixture(2);
        let mut bad = fx.original[42].clone();
        bad[0] ^= 0xFF;
        bad[BS - 1] ^= 0x01;
        fx.data.write_block(42, &bad);

        let mut out = vec![0u8; BS];
        let outcome = fx
            .engine
            .decode(42, BlockType::Data, Destination::Buffer(&mut out))
            .unwrap();

        assert_eq!(out, fx.original[42]);
        assert_eq!(outcome.corrected, 2);
        assert_eq!(fx.engine.stats().repairs_succeeded, 1);
    }

    #[test]
    fn test_unreadable_neighbours_become_erasures() {
        let fx = fixture(4);
        let rounds = fx.engine.geometry().unwrap().total_codewords();
        assert_eq!(rounds, 2);

        // Blocks 10 + k * rounds share every codeword with block 10
        fx.data.fail_block(10 + rounds);
        fx.data.fail_block(10 + 2 * rounds);
        fx.data.fail_block(10 + 3 * rounds);
        let mut bad = fx.original[10].clone();
        bad.iter_mut().for_each(|b| *b = !*b);
        fx.data.write_block(10, &bad);

        let mut out = vec![0u8; BS];
        let outcome = fx
            .engine
            .decode(10, BlockType::Data, Destination::Buffer(&mut out))
            .unwrap();

        assert_eq!(out, fx.original[10]);
        assert!(outcome.used_erasures);
        assert_eq!(outcome.erasures, 4);
    }

    #[test]
    fn test_sink_destination() {
        let fx = fixture(2);
        let mut first = vec![0u8; 100];
        let mut second = vec![0u8; BS];
        let mut cursor = SegmentCursor::new(vec![&mut first[..], &mut second[..]]);

        fx.engine
            .decode(3, BlockType::Data, Destination::Sink(&mut cursor))
            .unwrap();

        assert_eq!(cursor.written(), BS);
        assert_eq!(&first[..], &fx.original[3][..100]);
        assert_eq!(&second[..BS - 100], &fx.original[3][100..]);
    }

    #[test]
    fn test_short_destinations() {
        let fx = fixture(2);
        let mut small = vec![0u8; BS - 1];
        assert_matches!(
            fx.engine
                .decode(3, BlockType::Data, Destination::Buffer(&mut small)),
            Err(Error::ShortDestination { .. })
        );

        let mut only = vec![0u8; 64];
        let mut cursor = SegmentCursor::new(vec![&mut only[..]]);
        assert_matches!(
            fx.engine.decode(3, BlockType::Data, Destination::Sink(&mut cursor)),
            Err(Error::ShortDestination { required: BS, available: 64 })
        );

        // Partial sink delivery is not a successful repair
        let stats = fx.engine.stats();
        assert_eq!(stats.repairs_succeeded, 0);
        assert_eq!(stats.repairs_failed, 1);
    }

    #[test]
    fn test_erasure_attempt_codeword_failure_is_uncorrectable() {
        let fx = fixture(4);
        // Five corrupt blocks share every codeword of block 10; only four
        // fit in the erasure list, leaving an error the code cannot absorb
        for block in [10, 12, 14, 16, 18] {
            let bad: Vec<u8> = fx.original[block].iter().map(|b| !b).collect();
            fx.data.write_block(block as u64, &bad);
        }

        let mut out = vec![0u8; BS];
        assert_matches!(
            fx.engine
                .decode(10, BlockType::Data, Destination::Buffer(&mut out)),
            Err(Error::Uncorrectable { block: 10, erasures: 4 })
        );
        assert!(out.iter().all(|&b| b == 0));
        assert_eq!(fx.engine.stats().erasure_retries, 1);
    }

    #[test]
    fn test_digest_failure_retries_then_propagates() {
        let fx = fixture_with(2, Some(100));
        let mut bad = fx.original[100].clone();
        bad[7] ^= 0x10;
        fx.data.write_block(100, &bad);

        let mut out = vec![0u8; BS];
        assert_matches!(
            fx.engine
                .decode(100, BlockType::Data, Destination::Buffer(&mut out)),
            Err(Error::Hash(_))
        );

        let stats = fx.engine.stats();
        assert_eq!(stats.repairs_total, 1);
        assert_eq!(stats.repairs_failed, 1);
        assert_eq!(stats.erasure_retries, 1);
        assert_eq!(stats.repairs_succeeded, 0);
    }

    #[test]
    fn test_suppressed_logs_reported() {
        let fx = fixture(2);
        let mut out = vec![0u8; BS];
        // Each repair logs one correction; more than a burst in one window
        for block in 100..115 {
            let mut bad = fx.original[block].clone();
            bad[0] ^= 0x01;
            fx.data.write_block(block as u64, &bad);
            fx.engine
                .decode(block as u64, BlockType::Data, Destination::Buffer(&mut out))
                .unwrap();
            fx.data.write_block(block as u64, &fx.original[block]);
        }

        let stats = fx.engine.stats();
        assert_eq!(stats.repairs_succeeded, 15);
        assert!(stats.log_suppressed > 0);
    }

    #[test]
    fn test_out_of_range_block() {
        let fx = fixture(2);
        let mut out = vec![0u8; BS];
        assert_matches!(
            fx.engine
                .decode(300, BlockType::Data, Destination::Buffer(&mut out)),
            Err(Error::BlockOutOfRange { block: 300, .. })
        );
    }
}
