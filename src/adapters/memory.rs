//! In-memory block device
//!
//! Backs tests and the tooling paths that load small images whole. Blocks
//! can be overwritten or marked unreadable to simulate media damage.

use std::collections::HashSet;
use std::io;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::domain::BlockDevice;

/// Block device held entirely in memory.
#[derive(Debug)]
pub struct MemoryDevice {
    name: String,
    block_size: usize,
    blocks: RwLock<Vec<Bytes>>,
    failed: RwLock<HashSet<u64>>,
}

impl MemoryDevice {
    /// Device of `count` zero blocks.
    pub fn zeroed(name: impl Into<String>, block_size: usize, count: u64) -> Self {
        let zero = Bytes::from(vec![0u8; block_size]);
        Self::with_blocks(name, block_size, vec![zero; count as usize])
    }

    /// Device from individual blocks; each is zero padded or truncated to
    /// `block_size`.
    pub fn from_blocks(name: impl Into<String>, block_size: usize, blocks: Vec<Vec<u8>>) -> Self {
        let blocks = blocks
            .into_iter()
            .map(|mut block| {
                block.resize(block_size, 0);
                Bytes::from(block)
            })
            .collect();
        Self::with_blocks(name, block_size, blocks)
    }

    /// Device from a flat image; a trailing partial block is zero padded.
    pub fn from_bytes(name: impl Into<String>, block_size: usize, image: Vec<u8>) -> Self {
        let blocks = image.chunks(block_size).map(<[u8]>::to_vec).collect();
        Self::from_blocks(name, block_size, blocks)
    }

    fn with_blocks(name: impl Into<String>, block_size: usize, blocks: Vec<Bytes>) -> Self {
        Self {
            name: name.into(),
            block_size,
            blocks: RwLock::new(blocks),
            failed: RwLock::new(HashSet::new()),
        }
    }

    /// Replace the contents of block `index`. Writes past the end are
    /// ignored.
    pub fn write_block(&self, index: u64, data: &[u8]) {
        let mut block = data.to_vec();
        block.resize(self.block_size, 0);
        if let Some(slot) = self.blocks.write().get_mut(index as usize) {
            *slot = Bytes::from(block);
        }
    }

    /// Make reads of block `index` fail until [`heal_block`](Self::heal_block).
    pub fn fail_block(&self, index: u64) {
        self.failed.write().insert(index);
    }

    pub fn heal_block(&self, index: u64) {
        self.failed.write().remove(&index);
    }

    /// Copy of the whole device contents.
    pub fn to_vec(&self) -> Vec<u8> {
        self.blocks.read().iter().flat_map(|b| b.iter().copied()).collect()
    }
}

impl BlockDevice for MemoryDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        self.blocks.read().len() as u64
    }

    fn read_block(&self, index: u64) -> io::Result<Bytes> {
        if self.failed.read().contains(&index) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("injected read failure at block {}", index),
            ));
        }
        self.blocks
            .read()
            .get(index as usize)
            .cloned()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("block {} beyond end of {}", index, self.name),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_pads_tail() {
        let dev = MemoryDevice::from_bytes("img", 4, vec![1, 2, 3, 4, 5]);
        assert_eq!(dev.block_count(), 2);
        assert_eq!(&dev.read_block(1).unwrap()[..], &[5, 0, 0, 0]);
        assert!(dev.read_block(2).is_err());
    }

    #[test]
    fn test_write_and_fail() {
        let dev = MemoryDevice::zeroed("img", 4, 3);
        dev.write_block(1, &[9, 9]);
        assert_eq!(&dev.read_block(1).unwrap()[..], &[9, 9, 0, 0]);

        dev.fail_block(1);
        assert!(dev.read_block(1).is_err());
        dev.heal_block(1);
        assert!(dev.read_block(1).is_ok());
        assert_eq!(dev.to_vec().len(), 12);
    }
}
