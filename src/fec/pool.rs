//! Repair Buffer Pool
//!
//! Every repair session needs a [`Workspace`]: at least one codeword buffer,
//! decoder scratch, an erasure list and a block-sized output buffer. The pool
//! hands them out in two tiers:
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │  Reserve (guaranteed)        │   │  Extras (best effort)        │
//! │  ArrayQueue<Box<Workspace>>  │   │  ArrayQueue<Option<Buffer>>  │
//! │  built eagerly, one buffer   │   │  Some = recycled buffer      │
//! │  each; built on demand when  │   │  None = slot that may be     │
//! │  the queue runs dry          │   │  allocated                   │
//! └──────────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! More buffers mean fewer passes over the contributing blocks, but a
//! session makes progress with just the workspace's own buffer, so
//! acquisition never fails and never blocks. Both queues are lock-free.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::ArrayQueue;
use tracing::debug;

use super::codec::DecoderWorkspace;

/// log2 of the number of codewords held by one buffer.
pub const BUFFER_RS_BITS: u32 = 4;

/// Codewords per buffer.
pub const CODEWORDS_PER_BUFFER: usize = 1 << BUFFER_RS_BITS;

/// Upper bound on buffers per session.
pub const MAX_BUFFERS: usize = 256;

/// Buffers every workspace owns outright.
pub const PREALLOC_BUFFERS: usize = 1;

/// Buffers a session can use at most for the given block size: enough to
/// hold one codeword per byte of the block.
pub fn buffer_count(block_size: usize) -> usize {
    block_size.div_ceil(CODEWORDS_PER_BUFFER).clamp(PREALLOC_BUFFERS, MAX_BUFFERS)
}

// =============================================================================
// Configuration
// =============================================================================

/// Pool sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Workspaces built up front and kept for reuse
    pub reserve: usize,
    /// Extra codeword buffers shared by all sessions
    pub extra_buffers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let reserve = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            reserve,
            extra_buffers: reserve * (MAX_BUFFERS - PREALLOC_BUFFERS),
        }
    }
}

impl PoolConfig {
    /// Config with the given reserve and no shared extras.
    pub fn minimal(reserve: usize) -> Self {
        Self {
            reserve,
            extra_buffers: 0,
        }
    }
}

// =============================================================================
// Workspace
// =============================================================================

/// Scratch state for one repair session.
#[derive(Debug)]
pub struct Workspace {
    /// Codeword buffers; the first is owned, the rest are leased extras
    pub(crate) buffers: Vec<Box<[u8]>>,
    pub(crate) decoder: DecoderWorkspace,
    pub(crate) output: Box<[u8]>,
    pub(crate) erasures: Vec<usize>,
}

impl Workspace {
    fn new(buffer_len: usize, roots: usize, block_size: usize, max_buffers: usize) -> Self {
        let mut buffers = Vec::with_capacity(max_buffers);
        buffers.push(vec![0u8; buffer_len].into_boxed_slice());
        Self {
            buffers,
            decoder: DecoderWorkspace::new(roots),
            output: vec![0u8; block_size].into_boxed_slice(),
            erasures: Vec::with_capacity(roots),
        }
    }

    /// Codeword buffers held by this session.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Codewords decoded per pass.
    pub fn codewords_per_pass(&self) -> usize {
        self.buffers.len() * CODEWORDS_PER_BUFFER
    }

    /// The corrected block.
    pub fn output(&self) -> &[u8] {
        &self.output
    }
}

// =============================================================================
// Pool
// =============================================================================

/// Two-tier pool of repair workspaces.
pub struct BufferPool {
    buffer_len: usize,
    roots: usize,
    block_size: usize,
    max_buffers: usize,
    reserve: ArrayQueue<Box<Workspace>>,
    extras: ArrayQueue<Option<Box<[u8]>>>,
    overflow_builds: AtomicU64,
}

impl BufferPool {
    /// Create a pool for codes with `data_symbols` data symbols and `roots`
    /// parity symbols over blocks of `block_size` bytes.
    pub fn new(data_symbols: usize, roots: usize, block_size: usize, config: &PoolConfig) -> Self {
        let buffer_len = data_symbols * CODEWORDS_PER_BUFFER;
        let max_buffers = buffer_count(block_size);

        let reserve = ArrayQueue::new(config.reserve.max(1));
        for _ in 0..config.reserve {
            let _ = reserve.push(Box::new(Workspace::new(
                buffer_len,
                roots,
                block_size,
                max_buffers,
            )));
        }

        let extras = ArrayQueue::new(config.extra_buffers.max(1));
        for _ in 0..config.extra_buffers {
            let _ = extras.push(None);
        }

        debug!(
            reserve = config.reserve,
            extra_buffers = config.extra_buffers,
            buffer_len,
            max_buffers,
            "FEC buffer pool created"
        );

        Self {
            buffer_len,
            roots,
            block_size,
            max_buffers,
            reserve,
            extras,
            overflow_builds: AtomicU64::new(0),
        }
    }

    /// Lease a workspace with as many extra buffers as are available.
    pub fn acquire(&self) -> Lease<'_> {
        let mut workspace = self.reserve.pop().unwrap_or_else(|| {
            self.overflow_builds.fetch_add(1, Ordering::Relaxed);
            Box::new(Workspace::new(
                self.buffer_len,
                self.roots,
                self.block_size,
                self.max_buffers,
            ))
        });

        while workspace.buffers.len() < self.max_buffers {
            match self.extras.pop() {
                Some(Some(buffer)) => workspace.buffers.push(buffer),
                Some(None) => workspace
                    .buffers
                    .push(vec![0u8; self.buffer_len].into_boxed_slice()),
                None => break,
            }
        }

        Lease {
            pool: self,
            workspace: Some(workspace),
        }
    }

    /// Most buffers a single lease can hold.
    pub fn max_buffers(&self) -> usize {
        self.max_buffers
    }

    /// Workspaces currently idle in the reserve.
    pub fn idle_workspaces(&self) -> usize {
        self.reserve.len()
    }

    /// Extra buffer slots (recycled or unallocated) not leased out.
    pub fn idle_extras(&self) -> usize {
        self.extras.len()
    }

    /// Workspaces built because the reserve was empty.
    pub fn overflow_builds(&self) -> u64 {
        self.overflow_builds.load(Ordering::Relaxed)
    }

    fn release(&self, mut workspace: Box<Workspace>) {
        for buffer in workspace.buffers.drain(PREALLOC_BUFFERS..) {
            let _ = self.extras.push(Some(buffer));
        }
        workspace.erasures.clear();
        // A full reserve drops the surplus workspace
        let _ = self.reserve.push(workspace);
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("buffer_len", &self.buffer_len)
            .field("max_buffers", &self.max_buffers)
            .field("idle_workspaces", &self.reserve.len())
            .field("idle_extras", &self.extras.len())
            .finish()
    }
}

/// A leased workspace; everything goes back to the pool on drop.
pub struct Lease<'a> {
    pool: &'a BufferPool,
    workspace: Option<Box<Workspace>>,
}

impl Deref for Lease<'_> {
    type Target = Workspace;

    fn deref(&self) -> &Workspace {
        // Only `drop` takes the workspace
        self.workspace.as_deref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for Lease<'_> {
    fn deref_mut(&mut self) -> &mut Workspace {
        self.workspace.as_deref_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if let Some(workspace) = self.workspace.take() {
            self.pool.release(workspace);
        }
    }
}
