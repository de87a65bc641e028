//! Erasure Locator
//!
//! Knowing which symbols are bad halves their cost to the decoder: `roots`
//! parity symbols fix `roots` erasures but only `roots / 2` unknown errors.
//! Contributing blocks are flagged when they cannot be read, or when they
//! sit on the data device and no longer match their recorded digest.

use tracing::debug;

use crate::domain::{BlockType, DigestOracle, Digester, MAX_DIGEST_SIZE};

/// Flags contributing blocks as erasures, up to the code's capacity.
pub struct ErasureLocator<'a> {
    digester: &'a dyn Digester,
    oracle: &'a dyn DigestOracle,
    limit: usize,
}

impl<'a> ErasureLocator<'a> {
    /// `limit` is the number of parity symbols; no more erasures than that
    /// are ever recorded.
    pub fn new(digester: &'a dyn Digester, oracle: &'a dyn DigestOracle, limit: usize) -> Self {
        Self {
            digester,
            oracle,
            limit,
        }
    }

    /// Record symbol `position` as erased. Returns false once the list is
    /// full.
    pub fn record(&self, erasures: &mut Vec<usize>, position: usize) -> bool {
        if erasures.len() < self.limit {
            erasures.push(position);
            true
        } else {
            false
        }
    }

    /// Whether the contents of data block `block` disagree with its
    /// recorded digest. Blocks without a digest, and blocks whose digest
    /// cannot be computed, are given the benefit of the doubt.
    pub fn is_corrupt(&self, block: u64, data: &[u8]) -> bool {
        let size = self.digester.digest_size();
        let mut want = [0u8; MAX_DIGEST_SIZE];
        let mut real = [0u8; MAX_DIGEST_SIZE];

        match self
            .oracle
            .expected_digest(BlockType::Data, block, &mut want[..size])
        {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                debug!(block, error = %e, "no digest to check erasure candidate");
                return false;
            }
        }

        if let Err(e) = self.digester.digest(data, &mut real[..size]) {
            debug!(block, error = %e, "digest failed while locating erasures");
            return false;
        }

        want[..size] != real[..size]
    }

    /// Check a data block and record it if corrupt.
    pub fn check(&self, erasures: &mut Vec<usize>, position: usize, block: u64, data: &[u8]) {
        if erasures.len() < self.limit && self.is_corrupt(block, data) {
            erasures.push(position);
        }
    }
}
