//! FEC table options and status reporting
//!
//! Options arrive as name/value pairs from the verity target's table line:
//!
//! ```text
//! use_fec_from_device /dev/sdb1 fec_blocks 126464 fec_start 0 fec_roots 2
//! ```
//!
//! Names are matched case-insensitively. Parsing only checks each value in
//! isolation; cross-checks against the device layout happen in
//! [`Geometry::derive`](super::geometry::Geometry::derive).

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// =============================================================================
// Constants
// =============================================================================

/// Option naming the redundancy device
pub const OPT_FEC_DEVICE: &str = "use_fec_from_device";

/// Short alias accepted for [`OPT_FEC_DEVICE`]
pub const OPT_FEC_DEVICE_ALIAS: &str = "fec_device";

/// Option giving the number of blocks covered by FEC
pub const OPT_FEC_BLOCKS: &str = "fec_blocks";

/// Option giving the first FEC block on the redundancy device
pub const OPT_FEC_START: &str = "fec_start";

/// Option giving the number of parity bytes per codeword
pub const OPT_FEC_ROOTS: &str = "fec_roots";

/// RS(M, N): M, the full codeword length
pub const RS_CODEWORD_SIZE: usize = 255;

/// Smallest supported N of RS(M, N)
pub const MIN_DATA_SYMBOLS: usize = 231;

/// Largest supported N of RS(M, N)
pub const MAX_DATA_SYMBOLS: usize = 253;

/// Fewest parity bytes per codeword
pub const MIN_ROOTS: u8 = (RS_CODEWORD_SIZE - MAX_DATA_SYMBOLS) as u8;

/// Most parity bytes per codeword
pub const MAX_ROOTS: u8 = (RS_CODEWORD_SIZE - MIN_DATA_SYMBOLS) as u8;

const SECTOR_SHIFT: u32 = 9;

// =============================================================================
// Options
// =============================================================================

/// FEC options as supplied by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FecOptions {
    /// Redundancy device identity
    pub device: Option<String>,
    /// Number of blocks covered (data + hash + optional metadata)
    pub blocks: Option<u64>,
    /// First block of FEC data on the redundancy device
    pub start: Option<u64>,
    /// Parity bytes per codeword
    pub roots: Option<u8>,
}

impl FecOptions {
    /// Whether `name` is one of the options handled here.
    pub fn is_fec_option(name: &str) -> bool {
        [
            OPT_FEC_DEVICE,
            OPT_FEC_DEVICE_ALIAS,
            OPT_FEC_BLOCKS,
            OPT_FEC_START,
            OPT_FEC_ROOTS,
        ]
        .iter()
        .any(|opt| opt.eq_ignore_ascii_case(name))
    }

    /// FEC is configured once a redundancy device is named.
    pub fn is_enabled(&self) -> bool {
        self.device.is_some()
    }

    /// Parse and store a single option. `block_size` is the data block size,
    /// used to reject block counts that overflow when expressed in sectors.
    pub fn parse_opt(
        &mut self,
        name: &str,
        value: &str,
        block_size: usize,
    ) -> Result<(), ConfigError> {
        if name.eq_ignore_ascii_case(OPT_FEC_DEVICE) || name.eq_ignore_ascii_case(OPT_FEC_DEVICE_ALIAS)
        {
            if value.is_empty() {
                return Err(ConfigError::Invalid {
                    option: OPT_FEC_DEVICE,
                    reason: "device name is empty".into(),
                });
            }
            self.device = Some(value.to_string());
        } else if name.eq_ignore_ascii_case(OPT_FEC_BLOCKS) {
            self.blocks = Some(parse_block_count(OPT_FEC_BLOCKS, value, block_size)?);
        } else if name.eq_ignore_ascii_case(OPT_FEC_START) {
            self.start = Some(parse_block_count(OPT_FEC_START, value, block_size)?);
        } else if name.eq_ignore_ascii_case(OPT_FEC_ROOTS) {
            self.roots = Some(parse_roots(value)?);
        } else {
            return Err(ConfigError::UnknownOption(name.to_string()));
        }
        Ok(())
    }

    /// Parse a flat `name value name value ...` argument list.
    pub fn parse_args<'a, I>(args: I, block_size: usize) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut options = Self::default();
        let mut args = args.into_iter();
        while let Some(name) = args.next() {
            let value = args.next().ok_or_else(|| ConfigError::Invalid {
                option: option_label(name),
                reason: "option requires a value".into(),
            })?;
            options.parse_opt(name, value, block_size)?;
        }
        Ok(options)
    }
}

fn option_label(name: &str) -> &'static str {
    [
        OPT_FEC_DEVICE,
        OPT_FEC_DEVICE_ALIAS,
        OPT_FEC_BLOCKS,
        OPT_FEC_START,
        OPT_FEC_ROOTS,
    ]
    .into_iter()
    .find(|opt| opt.eq_ignore_ascii_case(name))
    .unwrap_or("feature argument")
}

fn parse_block_count(
    option: &'static str,
    value: &str,
    block_size: usize,
) -> Result<u64, ConfigError> {
    let count: u64 = value.parse().map_err(|_| ConfigError::Invalid {
        option,
        reason: format!("'{}' is not a block count", value),
    })?;

    let block_bits = block_size.trailing_zeros();
    let shift = block_bits.saturating_sub(SECTOR_SHIFT);
    if (count << shift) >> shift != count {
        return Err(ConfigError::Invalid {
            option,
            reason: format!("{} blocks overflow the sector range", count),
        });
    }
    Ok(count)
}

fn parse_roots(value: &str) -> Result<u8, ConfigError> {
    let roots: u8 = value.parse().map_err(|_| ConfigError::Invalid {
        option: OPT_FEC_ROOTS,
        reason: format!("'{}' is not a parity byte count", value),
    })?;
    if !(MIN_ROOTS..=MAX_ROOTS).contains(&roots) {
        return Err(ConfigError::Invalid {
            option: OPT_FEC_ROOTS,
            reason: format!("{} outside {}..={}", roots, MIN_ROOTS, MAX_ROOTS),
        });
    }
    Ok(roots)
}

// =============================================================================
// Status
// =============================================================================

/// Current FEC configuration, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Redundancy device identity
    pub device: String,
    /// Blocks covered by FEC
    pub blocks: u64,
    /// First FEC block on the redundancy device
    pub start: u64,
    /// Parity bytes per codeword
    pub roots: u8,
}

impl std::fmt::Display for StatusReport {
    /// Renders the table fragment the options were parsed from.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {} {}",
            OPT_FEC_DEVICE,
            self.device,
            OPT_FEC_BLOCKS,
            self.blocks,
            OPT_FEC_START,
            self.start,
            OPT_FEC_ROOTS,
            self.roots
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_full_table() {
        let args = "use_fec_from_device /dev/vdc fec_blocks 5000 fec_start 8 fec_roots 2";
        let options = FecOptions::parse_args(args.split_whitespace(), 4096).unwrap();

        assert_eq!(options.device.as_deref(), Some("/dev/vdc"));
        assert_eq!(options.blocks, Some(5000));
        assert_eq!(options.start, Some(8));
        assert_eq!(options.roots, Some(2));
        assert!(options.is_enabled());
    }

    #[test]
    fn test_names_case_insensitive_and_alias() {
        let mut options = FecOptions::default();
        options.parse_opt("FEC_DEVICE", "fec.img", 4096).unwrap();
        options.parse_opt("Fec_Roots", "24", 4096).unwrap();
        assert_eq!(options.device.as_deref(), Some("fec.img"));
        assert_eq!(options.roots, Some(24));
    }

    #[test]
    fn test_roots_range() {
        let mut options = FecOptions::default();
        for bad in ["0", "1", "25", "255", "256", "x", "-2"] {
            assert_matches!(
                options.parse_opt(OPT_FEC_ROOTS, bad, 4096),
                Err(ConfigError::Invalid { option: OPT_FEC_ROOTS, .. })
            );
        }
        assert!(options.parse_opt(OPT_FEC_ROOTS, "2", 4096).is_ok());
    }

    #[test]
    fn test_block_count_overflow() {
        let mut options = FecOptions::default();
        // 4096-byte blocks are 8 sectors, so the top three bits must be clear
        let too_big = (u64::MAX >> 2).to_string();
        assert_matches!(
            options.parse_opt(OPT_FEC_BLOCKS, &too_big, 4096),
            Err(ConfigError::Invalid { option: OPT_FEC_BLOCKS, .. })
        );
        let fits = (u64::MAX >> 3).to_string();
        assert!(options.parse_opt(OPT_FEC_BLOCKS, &fits, 4096).is_ok());
        assert!(options.parse_opt(OPT_FEC_START, "12abc", 4096).is_err());
    }

    #[test]
    fn test_missing_value_and_unknown_option() {
        assert_matches!(
            FecOptions::parse_args(["fec_roots"], 4096),
            Err(ConfigError::Invalid { option: OPT_FEC_ROOTS, .. })
        );
        assert_matches!(
            FecOptions::parse_args(["ignore_zero_blocks", "1"], 4096),
            Err(ConfigError::UnknownOption(_))
        );
        assert!(FecOptions::is_fec_option("FEC_START"));
        assert!(!FecOptions::is_fec_option("restart_on_corruption"));
    }

    #[test]
    fn test_status_table_format() {
        let report = StatusReport {
            device: "/dev/vdc".into(),
            blocks: 5000,
            start: 0,
            roots: 2,
        };
        assert_eq!(
            report.to_string(),
            "use_fec_from_device /dev/vdc fec_blocks 5000 fec_start 0 fec_roots 2"
        );
    }
}
