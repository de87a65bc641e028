//! Reed-Solomon Codeword Codec
//!
//! Systematic RS code over GF(2^8) with a configurable number of parity
//! symbols ("roots"). Generator roots are α^0, α^1, ..., α^(roots-1), which
//! matches the layout produced by the standard verity FEC tooling.
//!
//! A codeword is stored highest degree first: `data[0]` is the coefficient of
//! x^(N-1) and the last parity byte is the constant term, where
//! `N = data.len() + roots`. Shortened codes (`N < 255`) are supported.
//!
//! Decoding handles errors and erasures together: Berlekamp-Massey seeded
//! with the erasure locator, Chien search for the roots, Forney for the
//! magnitudes. All scratch state lives in a [`DecoderWorkspace`] so the hot
//! path never allocates.

use tracing::trace;

use super::gf256::{self, FIELD_ORDER};
use crate::error::{ConfigError, Error, Result};

/// Longest codeword the field supports.
pub const MAX_CODEWORD_SIZE: usize = FIELD_ORDER;

/// Reed-Solomon code description: generator polynomial and lengths.
#[derive(Debug, Clone)]
pub struct ReedSolomon {
    roots: usize,
    data_len: usize,
    /// g(x), lowest degree first, `roots + 1` coefficients, monic
    generator: Vec<u8>,
}

impl ReedSolomon {
    /// Create a code with `data_len` data symbols and `roots` parity symbols.
    pub fn new(data_len: usize, roots: usize) -> Result<Self> {
        if roots == 0 || roots >= MAX_CODEWORD_SIZE {
            return Err(ConfigError::Invalid {
                option: "fec_roots",
                reason: format!("{} parity symbols is not a usable code", roots),
            }
            .into());
        }
        if data_len == 0 || data_len + roots > MAX_CODEWORD_SIZE {
            return Err(ConfigError::Invalid {
                option: "fec_roots",
                reason: format!(
                    "codeword of {} data + {} parity symbols exceeds {}",
                    data_len, roots, MAX_CODEWORD_SIZE
                ),
            }
            .into());
        }

        let mut generator = vec![0u8; roots + 1];
        generator[0] = 1;
        for i in 0..roots {
            // g(x) *= (x + α^i)
            let root = gf256::alpha_pow(i as i64);
            for k in (0..=i + 1).rev() {
                let shifted = if k > 0 { generator[k - 1] } else { 0 };
                generator[k] = shifted ^ gf256::mul(generator[k], root);
            }
        }

        Ok(Self {
            roots,
            data_len,
            generator,
        })
    }

    /// Number of parity symbols per codeword.
    pub fn roots(&self) -> usize {
        self.roots
    }

    /// Number of data symbols per codeword.
    pub fn data_len(&self) -> usize {
        self.data_len
    }

    /// Total symbols per codeword.
    pub fn codeword_len(&self) -> usize {
        self.data_len + self.roots
    }

    /// Allocate scratch state sized for this code.
    pub fn workspace(&self) -> DecoderWorkspace {
        DecoderWorkspace::new(self.roots)
    }

    /// Compute the parity symbols for `data`.
    ///
    /// `data` may be shorter than `data_len()` (further shortening);
    /// `parity` must be exactly `roots()` bytes.
    pub fn encode(&self, data: &[u8], parity: &mut [u8]) -> Result<()> {
        self.check_lengths(data.len(), parity.len())?;

        let n = self.roots;
        parity.fill(0);
        for &symbol in data {
            let feedback = symbol ^ parity[0];
            for j in 0..n - 1 {
                parity[j] = parity[j + 1] ^ gf256::mul(feedback, self.generator[n - 1 - j]);
            }
            parity[n - 1] = gf256::mul(feedback, self.generator[0]);
        }
        Ok(())
    }

    /// Correct `data` in place using `parity` and the known-bad positions in
    /// `erasures` (indexes into the codeword, data first, then parity).
    ///
    /// Returns the number of symbol locations corrected (erasures plus
    /// located errors), or `Error::CodewordUncorrectable` when the damage
    /// exceeds what `roots()` parity symbols can fix. On failure `data` is
    /// left untouched.
    pub fn decode(
        &self,
        ws: &mut DecoderWorkspace,
        data: &mut [u8],
        parity: &[u8],
        erasures: &[usize],
    ) -> Result<usize> {
        self.check_lengths(data.len(), parity.len())?;
        if ws.roots != self.roots {
            *ws = self.workspace();
        }

        let n = self.roots;
        let len = data.len();
        let total = len + n;
        let e = erasures.len();

        if e > n {
            return Err(Error::CodewordUncorrectable("more erasures than parity symbols"));
        }
        if erasures.iter().any(|&pos| pos >= total) {
            return Err(Error::CodewordUncorrectable("erasure outside codeword"));
        }

        if !compute_syndromes(data, parity, &mut ws.syndromes) {
            return Ok(0);
        }

        // Λ(x) starts as the erasure locator Π(1 + X_k x)
        ws.lambda.fill(0);
        ws.lambda[0] = 1;
        for (k, &pos) in erasures.iter().enumerate() {
            let x = gf256::alpha_pow((total - 1 - pos) as i64);
            for j in (1..=k + 1).rev() {
                ws.lambda[j] ^= gf256::mul(x, ws.lambda[j - 1]);
            }
        }
        ws.b.copy_from_slice(&ws.lambda);

        // Berlekamp-Massey over the syndromes not consumed by erasures
        let mut el = e;
        for r in (e + 1)..=n {
            let mut discr = 0u8;
            for i in 0..r {
                discr ^= gf256::mul(ws.lambda[i], ws.syndromes[r - 1 - i]);
            }

            if discr == 0 {
                shift_up(&mut ws.b);
                continue;
            }

            ws.t[0] = ws.lambda[0];
            for i in 0..n {
                ws.t[i + 1] = ws.lambda[i + 1] ^ gf256::mul(discr, ws.b[i]);
            }
            if 2 * el < r + e {
                el = r + e - el;
                for i in 0..=n {
                    ws.b[i] = gf256::div(ws.lambda[i], discr);
                }
            } else {
                shift_up(&mut ws.b);
            }
            ws.lambda.copy_from_slice(&ws.t);
        }

        let degree = ws.lambda.iter().rposition(|&c| c != 0).unwrap_or(0);
        if degree == 0 || degree < e {
            return Err(Error::CodewordUncorrectable("no usable error locator"));
        }
        if 2 * (degree - e) + e > n {
            return Err(Error::CodewordUncorrectable("too many errors"));
        }

        // Chien search: roots of Λ at X^-1 for every position in the codeword
        ws.locations.clear();
        for loc in 0..total {
            let x_inv = gf256::alpha_pow(-(loc as i64));
            if gf256::poly_eval(&ws.lambda[..=degree], x_inv) == 0 {
                ws.locations.push(loc);
            }
        }
        if ws.locations.len() != degree {
            return Err(Error::CodewordUncorrectable("locator roots do not match its degree"));
        }

        // Ω(x) = S(x)Λ(x) mod x^n
        for i in 0..n {
            let mut acc = 0u8;
            for j in 0..=i.min(degree) {
                acc ^= gf256::mul(ws.lambda[j], ws.syndromes[i - j]);
            }
            ws.omega[i] = acc;
        }

        // Λ'(x): only odd-degree terms survive in characteristic 2
        for i in 0..degree {
            ws.derivative[i] = if i % 2 == 0 { ws.lambda[i + 1] } else { 0 };
        }

        ws.magnitudes.clear();
        for &loc in &ws.locations {
            let x_inv = gf256::alpha_pow(-(loc as i64));
            let numerator = gf256::poly_eval(&ws.omega[..n], x_inv);
            let denominator = gf256::poly_eval(&ws.derivative[..degree], x_inv);
            if denominator == 0 {
                return Err(Error::CodewordUncorrectable("zero locator derivative"));
            }
            let magnitude = gf256::mul(gf256::alpha_pow(loc as i64), gf256::div(numerator, denominator));
            ws.magnitudes.push(magnitude);
        }

        // The corrections must cancel every syndrome before anything is written
        for i in 0..n {
            let mut residual = ws.syndromes[i];
            for (&loc, &magnitude) in ws.locations.iter().zip(&ws.magnitudes) {
                residual ^= gf256::mul(magnitude, gf256::alpha_pow((i * loc) as i64));
            }
            if residual != 0 {
                return Err(Error::CodewordUncorrectable("syndromes remain after correction"));
            }
        }

        for (&loc, &magnitude) in ws.locations.iter().zip(&ws.magnitudes) {
            let pos = total - 1 - loc;
            if pos < len {
                data[pos] ^= magnitude;
            }
        }

        trace!(erasures = e, corrected = degree, "codeword corrected");
        Ok(degree)
    }

    fn check_lengths(&self, data_len: usize, parity_len: usize) -> Result<()> {
        if parity_len != self.roots {
            return Err(Error::CodewordUncorrectable("parity length does not match code"));
        }
        if data_len > self.data_len {
            return Err(Error::CodewordUncorrectable("data longer than code"));
        }
        Ok(())
    }
}

/// Scratch state for one decoder; owned by exactly one repair session at a
/// time.
#[derive(Debug, Clone)]
pub struct DecoderWorkspace {
    roots: usize,
    syndromes: Vec<u8>,
    lambda: Vec<u8>,
    b: Vec<u8>,
    t: Vec<u8>,
    omega: Vec<u8>,
    derivative: Vec<u8>,
    locations: Vec<usize>,
    magnitudes: Vec<u8>,
}

impl DecoderWorkspace {
    /// Allocate scratch state for a code with `roots` parity symbols.
    pub fn new(roots: usize) -> Self {
        Self {
            roots,
            syndromes: vec![0; roots],
            lambda: vec![0; roots + 1],
            b: vec![0; roots + 1],
            t: vec![0; roots + 1],
            omega: vec![0; roots],
            derivative: vec![0; roots + 1],
            locations: Vec::with_capacity(roots),
            magnitudes: Vec::with_capacity(roots),
        }
    }

    /// Parity length this workspace is sized for.
    pub fn roots(&self) -> usize {
        self.roots
    }
}

/// Fill `syndromes[i] = c(α^i)`; returns true if any is non-zero.
fn compute_syndromes(data: &[u8], parity: &[u8], syndromes: &mut [u8]) -> bool {
    let mut any = false;
    for (i, s) in syndromes.iter_mut().enumerate() {
        let x = gf256::alpha_pow(i as i64);
        *s = data
            .iter()
            .chain(parity)
            .fold(0u8, |acc, &c| gf256::mul(acc, x) ^ c);
        any |= *s != 0;
    }
    any
}

/// Multiply a polynomial by x, dropping the top coefficient.
fn shift_up(poly: &mut [u8]) {
    poly.copy_within(..poly.len() - 1, 1);
    poly[0] = 0;
}
