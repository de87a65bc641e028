//! Parity stream generation
//!
//! Produces the redundancy device contents for a verity target. The engine
//! itself only ever reads parity; this is for tooling and tests.

use bytes::Bytes;
use tracing::debug;

use super::codec::ReedSolomon;
use super::geometry::{BlockLocation, Geometry};
use crate::domain::BlockDevice;
use crate::error::{Error, Result};

/// Encode every codeword covering the protected blocks and return the flat
/// parity stream, `round_span() * roots()` bytes long. The stream belongs at
/// block `geometry.start()` of the redundancy device.
pub fn encode_parity(
    geometry: &Geometry,
    data: &dyn BlockDevice,
    hash: &dyn BlockDevice,
) -> Result<Vec<u8>> {
    let block_size = geometry.block_size();
    let data_symbols = geometry.data_symbols();
    let roots = geometry.roots();
    let rounds = geometry.total_codewords();
    let code = ReedSolomon::new(data_symbols, roots)?;

    let mut parity = vec![0u8; geometry.round_span() as usize * roots];
    let mut blocks: Vec<Bytes> = Vec::with_capacity(data_symbols);
    let mut codeword = vec![0u8; data_symbols];

    for round in 0..rounds {
        // Symbol i of this round's codewords comes from block round + i * rounds
        blocks.clear();
        for symbol in 0..data_symbols as u64 {
            let block = match geometry.map_block(round + symbol * rounds) {
                BlockLocation::Data(index) => read_block(data, index)?,
                BlockLocation::Hash(index) => read_block(hash, index)?,
                BlockLocation::Padding => Bytes::new(),
            };
            blocks.push(block);
        }

        for byte in 0..block_size {
            for (symbol, block) in blocks.iter().enumerate() {
                codeword[symbol] = block.get(byte).copied().unwrap_or(0);
            }
            let at = (round as usize * block_size + byte) * roots;
            code.encode(&codeword, &mut parity[at..at + roots])?;
        }
    }

    debug!(
        rounds,
        bytes = parity.len(),
        "parity stream encoded"
    );
    Ok(parity)
}

fn read_block(device: &dyn BlockDevice, index: u64) -> Result<Bytes> {
    let data = device.read_block(index).map_err(|source| Error::Io {
        device: device.name().to_string(),
        block: index,
        source,
    })?;
    if data.len() < device.block_size() {
        return Err(Error::Io {
            device: device.name().to_string(),
            block: index,
            source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short block read"),
        });
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryDevice;
    use crate::fec::geometry::{DeviceSizes, VerityLayout};
    use crate::fec::interleave::Interleaver;
    use crate::fec::options::FecOptions;

    #[test]
    fn test_every_codeword_is_valid() {
        let blocks: Vec<Vec<u8>> = (0..5u8).map(|b| vec![b.wrapping_mul(37) | 1; 512]).collect();
        let data = MemoryDevice::from_blocks("data", 512, blocks);
        let hash = MemoryDevice::zeroed("hash", 512, 0);

        let layout = VerityLayout {
            data_block_size: 512,
            hash_block_size: 512,
            data_blocks: 5,
            hash_start: 0,
            hash_end: 0,
        };
        let options = FecOptions {
            device: Some("fec".into()),
            blocks: Some(5),
            start: None,
            roots: Some(8),
        };
        let sizes = DeviceSizes { data: 5, hash: 0, fec: 8 };
        let geometry = Geometry::derive(&options, &layout, &sizes).unwrap();
        let parity = encode_parity(&geometry, &data, &hash).unwrap();
        assert_eq!(parity.len(), 512 * 8);

        // Rebuild codeword 3 by hand and check it decodes clean
        let il = Interleaver::new(&geometry);
        let code = ReedSolomon::new(247, 8).unwrap();
        let mut codeword = vec![0u8; 247];
        for (i, symbol) in codeword.iter_mut().enumerate() {
            let offset = il.symbol_offset(3, i);
            if offset < 5 * 512 {
                *symbol = data.read_block(offset / 512).unwrap()[(offset % 512) as usize];
            }
        }
        let mut ws = code.workspace();
        assert_eq!(
            code.decode(&mut ws, &mut codeword, &parity[3 * 8..4 * 8], &[]).unwrap(),
            0
        );
    }
}
