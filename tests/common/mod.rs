//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use verity_fec::adapters::{DigestTable, MemoryDevice, Sha256Digester};
use verity_fec::fec::{encode_parity, DeviceSizes, Geometry};
use verity_fec::{FecDevices, FecEngine, FecOptions, PoolConfig, VerityLayout};

pub const BLOCK_SIZE: usize = 512;

/// Shape of a generated image.
#[derive(Debug, Clone, Copy)]
pub struct ImageSpec {
    pub data_blocks: u64,
    /// Blocks ahead of the hash tree on the hash device (superblock etc.)
    pub hash_start: u64,
    pub hash_blocks: u64,
    pub fec_start: u64,
    pub roots: u8,
    pub seed: u64,
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self {
            data_blocks: 200,
            hash_start: 2,
            hash_blocks: 20,
            fec_start: 1,
            roots: 2,
            seed: 0x5eed,
        }
    }
}

/// A random verity image with its parity stream and recorded digests.
pub struct TestImage {
    pub spec: ImageSpec,
    pub layout: VerityLayout,
    pub options: FecOptions,
    pub data: Arc<MemoryDevice>,
    pub hash: Arc<MemoryDevice>,
    pub fec: Arc<MemoryDevice>,
    pub digester: Arc<Sha256Digester>,
    pub digests: Arc<DigestTable>,
    pub geometry: Geometry,
}

impl TestImage {
    pub fn build(spec: ImageSpec) -> Self {
        let mut rng = StdRng::seed_from_u64(spec.seed);
        let mut random_blocks = |count: u64| -> Vec<Vec<u8>> {
            (0..count)
                .map(|_| {
                    let mut block = vec![0u8; BLOCK_SIZE];
                    rng.fill_bytes(&mut block);
                    block
                })
                .collect()
        };

        let data = Arc::new(MemoryDevice::from_blocks(
            "data",
            BLOCK_SIZE,
            random_blocks(spec.data_blocks),
        ));
        let hash = Arc::new(MemoryDevice::from_blocks(
            "hash",
            BLOCK_SIZE,
            random_blocks(spec.hash_start + spec.hash_blocks),
        ));

        let layout = VerityLayout {
            data_block_size: BLOCK_SIZE,
            hash_block_size: BLOCK_SIZE,
            data_blocks: spec.data_blocks,
            hash_start: spec.hash_start,
            hash_end: spec.hash_start + spec.hash_blocks,
        };
        let options = FecOptions {
            device: Some("fec".into()),
            blocks: Some(spec.data_blocks + spec.hash_blocks),
            start: Some(spec.fec_start),
            roots: Some(spec.roots),
        };
        let sizes = DeviceSizes {
            data: spec.data_blocks,
            hash: spec.hash_start + spec.hash_blocks,
            fec: u64::MAX,
        };
        let geometry = Geometry::derive(&options, &layout, &sizes).expect("geometry");

        let mut fec_image = vec![0u8; spec.fec_start as usize * BLOCK_SIZE];
        fec_image.extend(encode_parity(&geometry, data.as_ref(), hash.as_ref()).expect("encode"));
        let fec = Arc::new(MemoryDevice::from_bytes("fec", BLOCK_SIZE, fec_image));

        let digester = Arc::new(Sha256Digester::new(b"integration".to_vec()));
        let digests = Arc::new(
            DigestTable::build(digester.as_ref(), data.as_ref(), hash.as_ref(), &layout)
                .expect("digests"),
        );

        Self {
            spec,
            layout,
            options,
            data,
            hash,
            fec,
            digester,
            digests,
            geometry,
        }
    }

    pub fn engine(&self) -> FecEngine {
        FecEngine::new(
            &self.options,
            &self.layout,
            FecDevices {
                data: self.data.clone(),
                hash: self.hash.clone(),
                fec: self.fec.clone(),
            },
            self.digester.clone(),
            self.digests.clone(),
            &PoolConfig::minimal(2),
        )
        .expect("engine")
    }

    pub fn data_block(&self, index: u64) -> Vec<u8> {
        read(&self.data, index)
    }

    pub fn hash_block(&self, index: u64) -> Vec<u8> {
        read(&self.hash, index)
    }
}

fn read(device: &MemoryDevice, index: u64) -> Vec<u8> {
    use verity_fec::BlockDevice;
    device.read_block(index).expect("read").to_vec()
}

/// Overwrite every byte of `block` with its complement.
pub fn invert(block: &[u8]) -> Vec<u8> {
    block.iter().map(|b| !b).collect()
}
