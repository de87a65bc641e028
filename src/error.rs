//! Error types for the verity FEC engine

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Setup-time configuration errors.
///
/// Any of these leaves error correction disabled; nothing is partially
/// configured.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required option was not supplied
    #[error("Missing {0}")]
    MissingParameter(&'static str),

    /// An option was supplied with an unusable value
    #[error("Invalid {option}: {reason}")]
    Invalid {
        option: &'static str,
        reason: String,
    },

    /// An option name this layer does not understand
    #[error("Unrecognized FEC option: {0}")]
    UnknownOption(String),

    /// A device cannot hold the footprint the options describe
    #[error("{device} device is too small: need {required} blocks, have {available}")]
    DeviceTooSmall {
        device: &'static str,
        required: u64,
        available: u64,
    },
}

/// Errors that can occur while configuring or running block repair
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Setup Errors
    // =========================================================================
    /// Configuration rejected
    #[error("FEC configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Repair was requested but FEC is not configured
    #[error("FEC is not enabled")]
    Disabled,

    // =========================================================================
    // Repair Errors
    // =========================================================================
    /// Device read failure
    #[error("Read failed on {device} device (block {block}): {source}")]
    Io {
        device: String,
        block: u64,
        #[source]
        source: std::io::Error,
    },

    /// Digest computation failure
    #[error("Hash computation failed: {0}")]
    Hash(String),

    /// No expected digest is known for the block being repaired
    #[error("No expected digest for block {block}")]
    MissingDigest { block: u64 },

    /// The block is outside the area covered by FEC
    #[error("Block {block} is outside the FEC-covered area ({limit} blocks)")]
    BlockOutOfRange { block: u64, limit: u64 },

    /// A single codeword could not be decoded
    #[error("Codeword uncorrectable: {0}")]
    CodewordUncorrectable(&'static str),

    /// The block could not be repaired even with erasure hints
    #[error("Block {block} uncorrectable ({erasures} erasures)")]
    Uncorrectable { block: u64, erasures: usize },

    /// The destination cannot hold a full block
    #[error("Destination too short: need {required} bytes, got {available}")]
    ShortDestination { required: usize, available: usize },

    // =========================================================================
    // Tooling Errors
    // =========================================================================
    /// I/O error outside block reads (opening images, writing output)
    #[error("I/O error: {0}")]
    File(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error ends a repair attempt but may succeed on the
    /// erasure-aware retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Io { .. }
                | Error::Hash(_)
                | Error::CodewordUncorrectable(_)
                | Error::Uncorrectable { .. }
        )
    }
}
