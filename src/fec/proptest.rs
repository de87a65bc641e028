//! Property-Based Tests for Forward Error Correction
//!
//! # Test Properties
//!
//! 1. **Geometry**: `total_codewords` is the smallest round count covering
//!    every protected block
//! 2. **Roundtrip**: a freshly encoded codeword decodes with no corrections
//! 3. **Capacity**: `2t + e <= roots` is corrected exactly, reporting `t + e`
//! 4. **Beyond capacity**: `2t + e > roots` never yields the original data
//! 5. **Interleaving**: `deinterleave` inverts `interleave` over the span

#![cfg(test)]

use proptest::prelude::*;

use super::codec::ReedSolomon;
use super::geometry::{DeviceSizes, Geometry, VerityLayout};
use super::interleave::Interleaver;
use super::options::{FecOptions, MAX_ROOTS, MIN_ROOTS, RS_CODEWORD_SIZE};

// =============================================================================
// Property Strategies
// =============================================================================

fn roots_strategy() -> impl Strategy<Value = usize> {
    (MIN_ROOTS as usize)..=(MAX_ROOTS as usize)
}

/// A code plus data filling it completely.
fn codeword_strategy() -> impl Strategy<Value = (usize, Vec<u8>)> {
    roots_strategy().prop_flat_map(|roots| {
        (
            Just(roots),
            prop::collection::vec(any::<u8>(), RS_CODEWORD_SIZE - roots),
        )
    })
}

/// Errors and erasures within capacity: `(roots, data, errors, erasures)`.
/// Positions are distinct and index the data symbols.
fn correctable_strategy() -> impl Strategy<Value = (usize, Vec<u8>, Vec<usize>, Vec<usize>)> {
    codeword_strategy()
        .prop_flat_map(|(roots, data)| (Just(roots), Just(data), 0..=roots))
        .prop_flat_map(|(roots, data, erasures)| {
            (Just(roots), Just(data), Just(erasures), 0..=(roots - erasures) / 2)
        })
        .prop_flat_map(|(roots, data, erasures, errors)| {
            let positions = (0..data.len()).collect::<Vec<_>>();
            (
                Just(roots),
                Just(data),
                prop::sample::subsequence(positions, errors + erasures),
                Just(errors),
            )
        })
        .prop_map(|(roots, data, positions, errors)| {
            let (errs, eras) = positions.split_at(errors);
            (roots, data, errs.to_vec(), eras.to_vec())
        })
}

fn encode(roots: usize, data: &[u8]) -> (ReedSolomon, Vec<u8>) {
    let code = ReedSolomon::new(data.len(), roots).unwrap();
    let mut parity = vec![0u8; roots];
    code.encode(data, &mut parity).unwrap();
    (code, parity)
}

// =============================================================================
// Geometry Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: rounds * N covers the protected blocks, one round fewer
    /// would not.
    #[test]
    fn prop_rounds_cover_protected_blocks(blocks in 1u64..1_000_000, roots in roots_strategy()) {
        let layout = VerityLayout {
            data_block_size: 4096,
            hash_block_size: 4096,
            data_blocks: blocks,
            hash_start: 0,
            hash_end: 0,
        };
        let options = FecOptions {
            device: Some("fec".into()),
            blocks: Some(blocks),
            start: None,
            roots: Some(roots as u8),
        };
        let sizes = DeviceSizes { data: blocks, hash: 0, fec: u64::MAX };
        let geometry = Geometry::derive(&options, &layout, &sizes).unwrap();

        let n = geometry.data_symbols() as u64;
        prop_assert_eq!(n, (RS_CODEWORD_SIZE - roots) as u64);
        prop_assert!(geometry.total_codewords() * n >= blocks);
        prop_assert!((geometry.total_codewords() - 1) * n < blocks);
    }

    /// Property: interleave is a bijection on [0, R * N).
    #[test]
    fn prop_interleave_roundtrip(blocks in 1u64..2000, roots in roots_strategy(), seed in any::<u64>()) {
        let layout = VerityLayout {
            data_block_size: 512,
            hash_block_size: 512,
            data_blocks: blocks,
            hash_start: 0,
            hash_end: 0,
        };
        let options = FecOptions {
            device: Some("fec".into()),
            blocks: Some(blocks),
            start: None,
            roots: Some(roots as u8),
        };
        let sizes = DeviceSizes { data: blocks, hash: 0, fec: u64::MAX };
        let il = Interleaver::new(&Geometry::derive(&options, &layout, &sizes).unwrap());

        let offset = seed % il.span();
        let position = il.interleave(offset);
        prop_assert!(position < il.span());
        prop_assert_eq!(il.deinterleave(position), offset);
        prop_assert_eq!(il.interleave(il.deinterleave(offset)), offset);
    }
}

// =============================================================================
// Codec Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: an untouched codeword decodes with zero corrections.
    #[test]
    fn prop_clean_roundtrip((roots, data) in codeword_strategy()) {
        let (code, parity) = encode(roots, &data);
        let mut ws = code.workspace();
        let mut received = data.clone();

        prop_assert_eq!(code.decode(&mut ws, &mut received, &parity, &[]).unwrap(), 0);
        prop_assert_eq!(received, data);
    }

    /// Property: within capacity, exactly t + e symbols are corrected.
    #[test]
    fn prop_within_capacity_corrects(
        (roots, data, errors, erasures) in correctable_strategy(),
        delta in 1u8..=255,
    ) {
        let (code, parity) = encode(roots, &data);
        let mut ws = code.workspace();
        let mut received = data.clone();
        for &pos in errors.iter().chain(&erasures) {
            received[pos] ^= delta;
        }

        let corrected = code.decode(&mut ws, &mut received, &parity, &erasures).unwrap();
        prop_assert_eq!(corrected, errors.len() + erasures.len());
        prop_assert_eq!(received, data);
    }

    /// Property: beyond capacity the original is never returned as a
    /// successful decode.
    #[test]
    fn prop_beyond_capacity_fails(
        (roots, data) in codeword_strategy(),
        extra in 1usize..4,
        delta in 1u8..=255,
    ) {
        let (code, parity) = encode(roots, &data);
        let mut ws = code.workspace();
        let errors = roots / 2 + extra;
        let mut received = data.clone();
        for k in 0..errors {
            received[k * 9] ^= delta;
        }

        if code.decode(&mut ws, &mut received, &parity, &[]).is_ok() {
            prop_assert_ne!(received, data);
        }
    }
}
