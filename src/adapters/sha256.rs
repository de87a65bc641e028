//! Salted SHA-256 block digester
//!
//! Matches the verity hash format: `sha256(salt || block)`.

use sha2::{Digest, Sha256};

use crate::domain::Digester;
use crate::error::{ConfigError, Error, Result};

/// Output size of SHA-256.
pub const SHA256_DIGEST_SIZE: usize = 32;

/// SHA-256 digester with an optional salt prefix.
#[derive(Debug, Clone, Default)]
pub struct Sha256Digester {
    salt: Vec<u8>,
}

impl Sha256Digester {
    pub fn new(salt: Vec<u8>) -> Self {
        Self { salt }
    }

    /// Parse a hex salt as it appears in a verity table; `-` means none.
    pub fn from_hex_salt(salt: &str) -> Result<Self> {
        if salt == "-" {
            return Ok(Self::default());
        }
        let invalid = || ConfigError::Invalid {
            option: "salt",
            reason: format!("'{}' is not an even-length hex string", salt),
        };
        if !salt.is_ascii() || salt.len() % 2 != 0 {
            return Err(invalid().into());
        }
        let bytes = (0..salt.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&salt[i..i + 2], 16).map_err(|_| invalid()))
            .collect::<std::result::Result<Vec<u8>, ConfigError>>()?;
        Ok(Self::new(bytes))
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }
}

impl Digester for Sha256Digester {
    fn digest_size(&self) -> usize {
        SHA256_DIGEST_SIZE
    }

    fn digest(&self, data: &[u8], out: &mut [u8]) -> Result<()> {
        if out.len() != SHA256_DIGEST_SIZE {
            return Err(Error::Hash(format!(
                "digest buffer is {} bytes, need {}",
                out.len(),
                SHA256_DIGEST_SIZE
            )));
        }
        let mut hasher = Sha256::new();
        hasher.update(&self.salt);
        hasher.update(data);
        out.copy_from_slice(&hasher.finalize());
        Ok(())
    }
}
