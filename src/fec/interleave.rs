//! Interleaving
//!
//! Each codeword's data symbols are spread one per round span, so a burst
//! of damage on the device touches many codewords lightly instead of one
//! codeword heavily.
//!
//! ```text
//!   R = total_codewords * block_size
//!
//!   codeword c:  [ s0   s1     s2      ...  s(N-1)        | parity ]
//!   device byte:   c    c + R  c + 2R  ...  c + (N-1)R
//! ```
//!
//! The parity stream is flat: codeword `c` owns `roots` bytes at
//! `c * roots`, starting at `fec_start` on the redundancy device.

use super::geometry::Geometry;

/// Mapping between codeword symbols and device byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interleaver {
    data_symbols: u64,
    roots: u64,
    round_span: u64,
    block_size: u64,
}

impl Interleaver {
    pub fn new(geometry: &Geometry) -> Self {
        Self {
            data_symbols: geometry.data_symbols() as u64,
            roots: geometry.roots() as u64,
            round_span: geometry.round_span(),
            block_size: geometry.block_size() as u64,
        }
    }

    /// Device byte offset of symbol `offset % N` of codeword `offset / N`.
    #[inline]
    pub fn interleave(&self, offset: u64) -> u64 {
        offset / self.data_symbols + (offset % self.data_symbols) * self.round_span
    }

    /// Inverse of [`interleave`](Self::interleave).
    #[inline]
    pub fn deinterleave(&self, position: u64) -> u64 {
        (position % self.round_span) * self.data_symbols + position / self.round_span
    }

    /// First codeword protecting `linear_block` and the symbol index the
    /// block occupies within each of its codewords.
    ///
    /// Byte `j` of the block is symbol `residual` of codeword `rsb + j`.
    #[inline]
    pub fn codeword_base(&self, linear_block: u64) -> (u64, usize) {
        let offset = linear_block * self.block_size;
        let residual = offset / self.round_span;
        (offset % self.round_span, residual as usize)
    }

    /// Device byte offset of `symbol` of codeword `codeword`.
    #[inline]
    pub fn symbol_offset(&self, codeword: u64, symbol: usize) -> u64 {
        self.interleave(codeword * self.data_symbols + symbol as u64)
    }

    /// Byte offset of codeword `codeword`'s parity in the parity stream.
    #[inline]
    pub fn parity_offset(&self, codeword: u64) -> u64 {
        codeword * self.roots
    }

    /// Number of distinct device positions: `R * N`.
    pub fn span(&self) -> u64 {
        self.round_span * self.data_symbols
    }
}
