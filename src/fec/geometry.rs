//! FEC Geometry
//!
//! Derived, immutable parameters of the redundancy layout. FEC covers
//! `fec_blocks` logical blocks laid out as:
//!
//! ```text
//!  data blocks | hash blocks | metadata (optional)
//!  data device | hash device, from hash_start
//! ```
//!
//! The covered blocks are split into `total_codewords` interleaving rounds
//! of `data_symbols` blocks each; the last round is zero padded.

use super::options::{
    FecOptions, StatusReport, OPT_FEC_BLOCKS, OPT_FEC_DEVICE, OPT_FEC_ROOTS, OPT_FEC_START,
};
use super::options::{MAX_ROOTS, MIN_ROOTS, RS_CODEWORD_SIZE};
use crate::domain::BlockType;
use crate::error::{ConfigError, Error, Result};

/// Smallest block size the sector-based option checks can express.
pub const MIN_BLOCK_SIZE: usize = 512;

/// Shape of the verity target FEC is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerityLayout {
    /// Data device block size in bytes
    pub data_block_size: usize,
    /// Hash device block size in bytes
    pub hash_block_size: usize,
    /// Number of data blocks
    pub data_blocks: u64,
    /// First hash tree block on the hash device
    pub hash_start: u64,
    /// One past the last hash tree block on the hash device
    pub hash_end: u64,
}

impl VerityLayout {
    /// Number of hash tree blocks.
    pub fn hash_blocks(&self) -> u64 {
        self.hash_end.saturating_sub(self.hash_start)
    }
}

/// Sizes, in blocks, of the three devices involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSizes {
    pub data: u64,
    pub hash: u64,
    pub fec: u64,
}

/// Where a covered logical block physically lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLocation {
    /// Block index on the data device
    Data(u64),
    /// Block index on the hash device
    Hash(u64),
    /// Beyond the covered area; encoded as zeros
    Padding,
}

/// Immutable redundancy parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    device: String,
    block_size: usize,
    roots: usize,
    data_symbols: usize,
    protected_blocks: u64,
    total_codewords: u64,
    data_blocks: u64,
    hash_start: u64,
    hash_blocks: u64,
    start: u64,
}

impl Geometry {
    /// Validate `options` against the target layout and device sizes.
    pub fn derive(
        options: &FecOptions,
        layout: &VerityLayout,
        sizes: &DeviceSizes,
    ) -> std::result::Result<Self, ConfigError> {
        let device = options
            .device
            .clone()
            .ok_or(ConfigError::MissingParameter(OPT_FEC_DEVICE))?;

        if layout.data_block_size != layout.hash_block_size {
            return Err(ConfigError::Invalid {
                option: "block size",
                reason: "data and hash block sizes must match to use FEC".into(),
            });
        }
        let block_size = layout.data_block_size;
        if !block_size.is_power_of_two() || block_size < MIN_BLOCK_SIZE {
            return Err(ConfigError::Invalid {
                option: "block size",
                reason: format!("{} is not a power of two >= {}", block_size, MIN_BLOCK_SIZE),
            });
        }

        let roots = options
            .roots
            .ok_or(ConfigError::MissingParameter(OPT_FEC_ROOTS))?;
        if !(MIN_ROOTS..=MAX_ROOTS).contains(&roots) {
            return Err(ConfigError::Invalid {
                option: OPT_FEC_ROOTS,
                reason: format!("{} outside {}..={}", roots, MIN_ROOTS, MAX_ROOTS),
            });
        }
        let roots = roots as usize;
        let data_symbols = RS_CODEWORD_SIZE - roots;

        let protected_blocks = options
            .blocks
            .filter(|&blocks| blocks > 0)
            .ok_or(ConfigError::MissingParameter(OPT_FEC_BLOCKS))?;
        let total_codewords = protected_blocks.div_ceil(data_symbols as u64);
        total_codewords
            .checked_mul(block_size as u64)
            .ok_or_else(|| overflow(OPT_FEC_BLOCKS))?;

        let covered = layout
            .data_blocks
            .checked_add(layout.hash_blocks())
            .ok_or_else(|| overflow("hash_start"))?;
        if protected_blocks < covered || total_codewords == 0 {
            return Err(ConfigError::Invalid {
                option: OPT_FEC_BLOCKS,
                reason: format!(
                    "{} blocks do not cover {} data and hash blocks",
                    protected_blocks, covered
                ),
            });
        }

        // Everything past the data area, including trailing metadata, is
        // read from the hash device
        let hash_blocks = protected_blocks - layout.data_blocks;
        let hash_required = layout
            .hash_start
            .checked_add(hash_blocks)
            .ok_or_else(|| overflow("hash_start"))?;
        if sizes.hash < hash_required {
            return Err(ConfigError::DeviceTooSmall {
                device: "hash",
                required: hash_required,
                available: sizes.hash,
            });
        }

        let start = options.start.unwrap_or(0);
        let fec_required = total_codewords
            .checked_mul(roots as u64)
            .and_then(|parity| parity.checked_add(start))
            .ok_or_else(|| overflow(OPT_FEC_START))?;
        if sizes.fec < fec_required {
            return Err(ConfigError::DeviceTooSmall {
                device: "FEC",
                required: fec_required,
                available: sizes.fec,
            });
        }

        if sizes.data < layout.data_blocks {
            return Err(ConfigError::DeviceTooSmall {
                device: "data",
                required: layout.data_blocks,
                available: sizes.data,
            });
        }

        Ok(Self {
            device,
            block_size,
            roots,
            data_symbols,
            protected_blocks,
            total_codewords,
            data_blocks: layout.data_blocks,
            hash_start: layout.hash_start,
            hash_blocks,
            start,
        })
    }

    /// Redundancy device identity.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Block size shared by every device.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Parity symbols per codeword.
    pub fn roots(&self) -> usize {
        self.roots
    }

    /// Data symbols per codeword.
    pub fn data_symbols(&self) -> usize {
        self.data_symbols
    }

    /// Logical blocks covered by FEC.
    pub fn protected_blocks(&self) -> u64 {
        self.protected_blocks
    }

    /// Interleaving rounds; each round yields one codeword per block byte.
    pub fn total_codewords(&self) -> u64 {
        self.total_codewords
    }

    /// Bytes spanned by one symbol position across all rounds; also the
    /// number of physical codewords in the parity stream.
    pub fn round_span(&self) -> u64 {
        self.total_codewords * self.block_size as u64
    }

    /// First FEC block on the redundancy device.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Number of data blocks.
    pub fn data_blocks(&self) -> u64 {
        self.data_blocks
    }

    /// Blocks of the redundancy device occupied by parity.
    pub fn parity_blocks(&self) -> u64 {
        self.total_codewords * self.roots as u64
    }

    /// Translate a caller's block address into a linear covered index.
    pub fn linear_index(&self, block_type: BlockType, block: u64) -> Result<u64> {
        let linear = match block_type {
            BlockType::Data => Some(block),
            BlockType::Metadata => block
                .checked_sub(self.hash_start)
                .map(|offset| offset + self.data_blocks),
        };
        match linear {
            Some(linear) if linear < self.protected_blocks => Ok(linear),
            _ => Err(Error::BlockOutOfRange {
                block,
                limit: self.protected_blocks,
            }),
        }
    }

    /// Physical location of a linear covered block.
    pub fn map_block(&self, linear: u64) -> BlockLocation {
        if linear < self.data_blocks {
            BlockLocation::Data(linear)
        } else if linear - self.data_blocks < self.hash_blocks {
            BlockLocation::Hash(linear - self.data_blocks + self.hash_start)
        } else {
            BlockLocation::Padding
        }
    }

    /// Configuration summary for diagnostics.
    pub fn status(&self) -> StatusReport {
        StatusReport {
            device: self.device.clone(),
            blocks: self.protected_blocks,
            start: self.start,
            roots: self.roots as u8,
        }
    }
}

fn overflow(option: &'static str) -> ConfigError {
    ConfigError::Invalid {
        option,
        reason: "block range overflows a 64-bit block index".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn layout() -> VerityLayout {
        VerityLayout {
            data_block_size: 4096,
            hash_block_size: 4096,
            data_blocks: 1000,
            hash_start: 1,
            hash_end: 10,
        }
    }

    fn options(blocks: u64, roots: u8) -> FecOptions {
        FecOptions {
            device: Some("fec".into()),
            blocks: Some(blocks),
            start: Some(0),
            roots: Some(roots),
        }
    }

    fn roomy() -> DeviceSizes {
        DeviceSizes {
            data: 1000,
            hash: 1 << 20,
            fec: 1 << 20,
        }
    }

    #[test]
    fn test_derive_rounds_up_codewords() {
        let geometry = Geometry::derive(&options(1009, 2), &layout(), &roomy()).unwrap();
        assert_eq!(geometry.data_symbols(), 253);
        assert_eq!(geometry.total_codewords(), 4);
        assert_eq!(geometry.parity_blocks(), 8);
        assert_eq!(geometry.round_span(), 4 * 4096);
        assert!(geometry.total_codewords() * geometry.data_symbols() as u64 >= 1009);
    }

    #[test]
    fn test_missing_parameters() {
        let mut opts = options(1009, 2);
        opts.roots = None;
        assert_matches!(
            Geometry::derive(&opts, &layout(), &roomy()),
            Err(ConfigError::MissingParameter(OPT_FEC_ROOTS))
        );

        let mut opts = options(1009, 2);
        opts.blocks = None;
        assert_matches!(
            Geometry::derive(&opts, &layout(), &roomy()),
            Err(ConfigError::MissingParameter(OPT_FEC_BLOCKS))
        );
    }

    #[test]
    fn test_blocks_must_cover_data_and_hash() {
        assert_matches!(
            Geometry::derive(&options(1008, 2), &layout(), &roomy()),
            Err(ConfigError::Invalid { option: OPT_FEC_BLOCKS, .. })
        );
    }

    #[test]
    fn test_block_size_mismatch() {
        let mut bad = layout();
        bad.hash_block_size = 1024;
        assert_matches!(
            Geometry::derive(&options(1009, 2), &bad, &roomy()),
            Err(ConfigError::Invalid { .. })
        );
    }

    #[test]
    fn test_device_too_small() {
        let mut sizes = roomy();
        sizes.fec = 7;
        assert_matches!(
            Geometry::derive(&options(1009, 2), &layout(), &sizes),
            Err(ConfigError::DeviceTooSmall { device: "FEC", required: 8, available: 7 })
        );

        let mut sizes = roomy();
        sizes.hash = 9;
        assert_matches!(
            Geometry::derive(&options(1009, 2), &layout(), &sizes),
            Err(ConfigError::DeviceTooSmall { device: "hash", required: 10, .. })
        );

        let mut sizes = roomy();
        sizes.data = 999;
        assert_matches!(
            Geometry::derive(&options(1009, 2), &layout(), &sizes),
            Err(ConfigError::DeviceTooSmall { device: "data", .. })
        );
    }

    #[test]
    fn test_overflowing_offsets_rejected() {
        let mut opts = options(1009, 2);
        opts.start = Some(u64::MAX - 1);
        assert_matches!(
            Geometry::derive(&opts, &layout(), &roomy()),
            Err(ConfigError::Invalid { option: OPT_FEC_START, .. })
        );

        let mut far = layout();
        far.hash_start = u64::MAX - 2;
        far.hash_end = u64::MAX;
        let opts = options(1009, 2);
        assert_matches!(
            Geometry::derive(&opts, &far, &roomy()),
            Err(ConfigError::Invalid { option: "hash_start", .. })
        );

        assert_matches!(
            Geometry::derive(&options(u64::MAX, 2), &layout(), &roomy()),
            Err(ConfigError::Invalid { option: OPT_FEC_BLOCKS, .. })
        );
    }

    #[test]
    fn test_block_mapping() {
        // 1000 data + 9 hash + 11 trailing metadata blocks
        let geometry = Geometry::derive(&options(1020, 24), &layout(), &roomy()).unwrap();

        assert_eq!(geometry.map_block(0), BlockLocation::Data(0));
        assert_eq!(geometry.map_block(999), BlockLocation::Data(999));
        assert_eq!(geometry.map_block(1000), BlockLocation::Hash(1));
        assert_eq!(geometry.map_block(1019), BlockLocation::Hash(20));
        assert_eq!(geometry.map_block(1020), BlockLocation::Padding);

        assert_eq!(geometry.linear_index(BlockType::Data, 5).unwrap(), 5);
        assert_eq!(geometry.linear_index(BlockType::Metadata, 1).unwrap(), 1000);
        assert!(geometry.linear_index(BlockType::Metadata, 0).is_err());
        assert!(geometry.linear_index(BlockType::Data, 1020).is_err());
    }

    #[test]
    fn test_status_report() {
        let geometry = Geometry::derive(&options(1009, 2), &layout(), &roomy()).unwrap();
        let status = geometry.status();
        assert_eq!(status.device, "fec");
        assert_eq!(status.blocks, 1009);
        assert_eq!(status.roots, 2);
    }
}
