//! Flat digest table
//!
//! A [`DigestOracle`] backed by one recorded digest per block. It stands in
//! for a verified hash tree when repairing images offline: record the table
//! while the image is known good, and it answers "what should this block
//! hash to" afterwards.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{BlockDevice, BlockType, DigestOracle, Digester};
use crate::error::{Error, Result};
use crate::fec::VerityLayout;

/// Recorded digests for the data blocks and the hash device blocks from
/// `hash_start` on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestTable {
    digest_size: usize,
    hash_start: u64,
    data: Vec<u8>,
    metadata: Vec<u8>,
}

impl DigestTable {
    /// Hash every data block and every hash device block from
    /// `layout.hash_start` to the end of the device.
    pub fn build(
        digester: &dyn Digester,
        data: &dyn BlockDevice,
        hash: &dyn BlockDevice,
        layout: &VerityLayout,
    ) -> Result<Self> {
        let digest_size = digester.digest_size();
        let data_digests = digest_range(digester, data, 0..layout.data_blocks)?;
        let metadata_digests =
            digest_range(digester, hash, layout.hash_start..hash.block_count())?;

        info!(
            data_blocks = layout.data_blocks,
            metadata_blocks = metadata_digests.len() / digest_size.max(1),
            "digest table recorded"
        );

        Ok(Self {
            digest_size,
            hash_start: layout.hash_start,
            data: data_digests,
            metadata: metadata_digests,
        })
    }

    /// A table with no recorded digests; every lookup answers "absent".
    pub fn empty(digest_size: usize) -> Self {
        Self {
            digest_size,
            hash_start: 0,
            data: Vec::new(),
            metadata: Vec::new(),
        }
    }

    /// Load a table written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn digest_size(&self) -> usize {
        self.digest_size
    }

    /// Number of data blocks with a recorded digest.
    pub fn data_blocks(&self) -> u64 {
        (self.data.len() / self.digest_size.max(1)) as u64
    }

    fn lookup(&self, block_type: BlockType, block: u64) -> Option<&[u8]> {
        let (digests, index) = match block_type {
            BlockType::Data => (&self.data, block),
            BlockType::Metadata => (&self.metadata, block.checked_sub(self.hash_start)?),
        };
        let start = usize::try_from(index).ok()?.checked_mul(self.digest_size)?;
        digests.get(start..start + self.digest_size)
    }
}

impl DigestOracle for DigestTable {
    fn expected_digest(&self, block_type: BlockType, block: u64, out: &mut [u8]) -> Result<bool> {
        if out.len() != self.digest_size {
            return Err(Error::Hash(format!(
                "table holds {}-byte digests, caller wants {}",
                self.digest_size,
                out.len()
            )));
        }
        match self.lookup(block_type, block) {
            Some(digest) => {
                out.copy_from_slice(digest);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn digest_range(
    digester: &dyn Digester,
    device: &dyn BlockDevice,
    blocks: std::ops::Range<u64>,
) -> Result<Vec<u8>> {
    let size = digester.digest_size();
    let mut out = vec![0u8; blocks.clone().count() * size];
    for (slot, block) in out.chunks_exact_mut(size.max(1)).zip(blocks) {
        let data = device.read_block(block).map_err(|source| Error::Io {
            device: device.name().to_string(),
            block,
            source,
        })?;
        digester.digest(&data, slot)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryDevice, Sha256Digester};

    fn table() -> (DigestTable, Sha256Digester) {
        let digester = Sha256Digester::default();
        let data = MemoryDevice::from_blocks("data", 16, vec![vec![1; 16], vec![2; 16]]);
        let hash = MemoryDevice::from_blocks("hash", 16, vec![vec![0; 16], vec![3; 16], vec![4; 16]]);
        let layout = VerityLayout {
            data_block_size: 16,
            hash_block_size: 16,
            data_blocks: 2,
            hash_start: 1,
            hash_end: 3,
        };
        (DigestTable::build(&digester, &data, &hash, &layout).unwrap(), digester)
    }

    #[test]
    fn test_lookup_by_block_type() {
        let (table, digester) = table();
        let mut want = [0u8; 32];
        let mut out = [0u8; 32];

        digester.digest(&[2; 16], &mut want).unwrap();
        assert!(table.expected_digest(BlockType::Data, 1, &mut out).unwrap());
        assert_eq!(out, want);

        digester.digest(&[3; 16], &mut want).unwrap();
        assert!(table.expected_digest(BlockType::Metadata, 1, &mut out).unwrap());
        assert_eq!(out, want);

        assert!(!table.expected_digest(BlockType::Metadata, 0, &mut out).unwrap());
        assert!(!table.expected_digest(BlockType::Data, 2, &mut out).unwrap());
        assert!(table.expected_digest(BlockType::Data, 0, &mut [0u8; 8]).is_err());
        assert_eq!(table.data_blocks(), 2);

        let empty = DigestTable::empty(32);
        assert!(!empty.expected_digest(BlockType::Data, 0, &mut out).unwrap());
        assert_eq!(empty.data_blocks(), 0);
    }

    #[test]
    fn test_save_and_load() {
        let (table, _) = table();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("digests.json");

        table.save(&path).unwrap();
        assert_eq!(DigestTable::load(&path).unwrap(), table);
    }
}
