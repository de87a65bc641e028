//! verity-fec
//!
//! Offline tooling around the FEC engine: build a parity stream for an
//! image, record its block digests, and later scan and repair it.
//!
//! # Workflow
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │   encode     │───▶│   digests    │───▶│    scan      │───▶│   repair     │
//! │ (parity out) │    │ (known good) │    │ (find + fix) │    │ (one block)  │
//! └──────────────┘    └──────────────┘    └──────────────┘    └──────────────┘
//! ```

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use verity_fec::adapters::{DigestTable, FileDevice, Sha256Digester};
use verity_fec::domain::{BlockDevice, BlockType, DigestOracle, Digester, MAX_DIGEST_SIZE};
use verity_fec::error::{Error, Result};
use verity_fec::fec::options::{OPT_FEC_BLOCKS, OPT_FEC_DEVICE, OPT_FEC_ROOTS, OPT_FEC_START};
use verity_fec::fec::{
    encode_parity, Destination, DeviceSizes, FecDevices, FecEngine, FecOptions, Geometry,
    PoolConfig, RepairOutcome, StatsSnapshot, StatusReport, VerityLayout,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// verity-fec - Reed-Solomon repair for verity-protected images
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "VERITY_FEC_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "VERITY_FEC_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the parity stream and write it to the FEC device
    Encode(ImageArgs),

    /// Record the digest of every block while the image is known good
    Digests {
        #[command(flatten)]
        image: ImageArgs,

        /// Where to write the digest table
        #[arg(long, env = "VERITY_FEC_DIGESTS")]
        output: PathBuf,
    },

    /// Print the FEC status line
    Status {
        #[command(flatten)]
        image: ImageArgs,

        /// Print a JSON report instead of the table line
        #[arg(long)]
        json: bool,
    },

    /// Verify every covered block and repair the ones that fail
    Scan {
        #[command(flatten)]
        image: ImageArgs,

        /// Digest table recorded with `digests`
        #[arg(long, env = "VERITY_FEC_DIGESTS")]
        digests: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Repair a single block
    Repair {
        #[command(flatten)]
        image: ImageArgs,

        /// Digest table recorded with `digests`
        #[arg(long, env = "VERITY_FEC_DIGESTS")]
        digests: PathBuf,

        /// Block to repair
        #[arg(long)]
        block: u64,

        /// Treat the block as a hash device (metadata) block
        #[arg(long)]
        metadata: bool,

        /// Write the repaired block here
        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },
}

/// Image and FEC table parameters shared by every command.
#[derive(Args, Debug)]
struct ImageArgs {
    /// Data device or image
    #[arg(long, env = "VERITY_FEC_DATA")]
    data: PathBuf,

    /// Hash device or image
    #[arg(long, env = "VERITY_FEC_HASH")]
    hash: PathBuf,

    /// Block size of both data and hash devices
    #[arg(long, env = "VERITY_FEC_BLOCK_SIZE", default_value = "4096")]
    block_size: usize,

    /// Number of data blocks [default: whole data device]
    #[arg(long, env = "VERITY_FEC_DATA_BLOCKS")]
    data_blocks: Option<u64>,

    /// First hash tree block on the hash device
    #[arg(long, env = "VERITY_FEC_HASH_START", default_value = "0")]
    hash_start: u64,

    /// One past the last hash tree block [default: end of the hash device]
    #[arg(long, env = "VERITY_FEC_HASH_END")]
    hash_end: Option<u64>,

    /// Hex salt prefixed to every block before hashing, or '-'
    #[arg(long, env = "VERITY_FEC_SALT", default_value = "-")]
    salt: String,

    /// Redundancy device or image
    #[arg(long, env = "VERITY_FEC_DEVICE")]
    fec_device: PathBuf,

    /// Blocks covered by FEC [default: data plus hash blocks]
    #[arg(long, env = "VERITY_FEC_BLOCKS")]
    fec_blocks: Option<u64>,

    /// First block of parity on the FEC device
    #[arg(long, env = "VERITY_FEC_START", default_value = "0")]
    fec_start: u64,

    /// Parity bytes per codeword (2-24)
    #[arg(long, env = "VERITY_FEC_ROOTS", default_value = "2")]
    fec_roots: u8,

    /// Workspaces kept ready for concurrent repairs [default: CPU count]
    #[arg(long, env = "VERITY_FEC_RESERVE")]
    reserve: Option<usize>,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli);

    match cli.command {
        Command::Encode(image) => run_encode(&image),
        Command::Digests { image, output } => run_digests(&image, &output),
        Command::Status { image, json } => run_status(&image, json),
        Command::Scan {
            image,
            digests,
            json,
        } => run_scan(&image, &digests, json),
        Command::Repair {
            image,
            digests,
            block,
            metadata,
            output,
            json,
        } => run_repair(&image, &digests, block, metadata, output.as_deref(), json),
    }
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(cli: &Cli) {
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Logs go to stderr so reports on stdout stay machine readable
    if cli.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

// =============================================================================
// Image Setup
// =============================================================================

struct Image {
    layout: VerityLayout,
    options: FecOptions,
    data: Arc<FileDevice>,
    hash: Arc<FileDevice>,
    digester: Arc<Sha256Digester>,
    pool: PoolConfig,
}

impl ImageArgs {
    fn open(&self) -> Result<Image> {
        let data = Arc::new(FileDevice::open(&self.data, self.block_size)?);
        let hash = Arc::new(FileDevice::open(&self.hash, self.block_size)?);

        let layout = VerityLayout {
            data_block_size: self.block_size,
            hash_block_size: self.block_size,
            data_blocks: self.data_blocks.unwrap_or(data.block_count()),
            hash_start: self.hash_start,
            hash_end: self.hash_end.unwrap_or(hash.block_count()),
        };

        // Feed the flags through the table parser so they get the same checks
        let fec_blocks = self
            .fec_blocks
            .unwrap_or(layout.data_blocks + layout.hash_blocks());
        let table = [
            (OPT_FEC_DEVICE, self.fec_device.display().to_string()),
            (OPT_FEC_BLOCKS, fec_blocks.to_string()),
            (OPT_FEC_START, self.fec_start.to_string()),
            (OPT_FEC_ROOTS, self.fec_roots.to_string()),
        ];
        let mut options = FecOptions::default();
        for (name, value) in &table {
            options.parse_opt(name, value, self.block_size)?;
        }

        let mut pool = PoolConfig::default();
        if let Some(reserve) = self.reserve {
            pool.reserve = reserve;
        }

        Ok(Image {
            layout,
            options,
            data,
            hash,
            digester: Arc::new(Sha256Digester::from_hex_salt(&self.salt)?),
            pool,
        })
    }
}

impl Image {
    fn engine(&self, fec_device: &Path, oracle: Arc<dyn DigestOracle>) -> Result<FecEngine> {
        let fec = Arc::new(FileDevice::open(fec_device, self.layout.data_block_size)?);
        FecEngine::new(
            &self.options,
            &self.layout,
            FecDevices {
                data: self.data.clone(),
                hash: self.hash.clone(),
                fec,
            },
            self.digester.clone(),
            oracle,
            &self.pool,
        )
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// =============================================================================
// Commands
// =============================================================================

fn run_encode(args: &ImageArgs) -> Result<()> {
    let image = args.open()?;
    let sizes = DeviceSizes {
        data: image.data.block_count(),
        hash: image.hash.block_count(),
        fec: u64::MAX,
    };
    let geometry = Geometry::derive(&image.options, &image.layout, &sizes)?;

    info!(
        blocks = geometry.protected_blocks(),
        roots = geometry.roots(),
        rounds = geometry.total_codewords(),
        "encoding parity"
    );
    let parity = encode_parity(&geometry, image.data.as_ref(), image.hash.as_ref())?;

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&args.fec_device)?;
    file.seek(SeekFrom::Start(geometry.start() * geometry.block_size() as u64))?;
    file.write_all(&parity)?;
    file.sync_all()?;

    info!(
        device = %args.fec_device.display(),
        parity_blocks = geometry.parity_blocks(),
        "parity written"
    );
    println!("{}", geometry.status());
    Ok(())
}

fn run_digests(args: &ImageArgs, output: &Path) -> Result<()> {
    let image = args.open()?;
    let table = DigestTable::build(
        image.digester.as_ref(),
        image.data.as_ref(),
        image.hash.as_ref(),
        &image.layout,
    )?;
    table.save(output)?;
    info!(path = %output.display(), "digest table written");
    Ok(())
}

#[derive(Serialize)]
struct StatusJson {
    status: StatusReport,
    rounds: u64,
    data_symbols: usize,
    parity_blocks: u64,
}

fn run_status(args: &ImageArgs, json: bool) -> Result<()> {
    let image = args.open()?;
    // Status needs no digests
    let oracle = Arc::new(DigestTable::empty(image.digester.digest_size()));
    let engine = image.engine(&args.fec_device, oracle)?;

    let (Some(status), Some(geometry)) = (engine.status_report(), engine.geometry()) else {
        println!("FEC disabled");
        return Ok(());
    };
    if json {
        print_json(&StatusJson {
            status,
            rounds: geometry.total_codewords(),
            data_symbols: geometry.data_symbols(),
            parity_blocks: geometry.parity_blocks(),
        })
    } else {
        println!("{}", status);
        Ok(())
    }
}

#[derive(Serialize, Default)]
struct ScanReport {
    checked: u64,
    corrupt: u64,
    repaired: u64,
    failed: Vec<u64>,
    stats: StatsSnapshot,
}

fn run_scan(args: &ImageArgs, digests: &Path, json: bool) -> Result<()> {
    let image = args.open()?;
    let table = Arc::new(DigestTable::load(digests)?);
    let engine = image.engine(&args.fec_device, table.clone())?;

    let size = image.digester.digest_size();
    let mut want = [0u8; MAX_DIGEST_SIZE];
    let mut real = [0u8; MAX_DIGEST_SIZE];
    let mut block_buf = vec![0u8; image.layout.data_block_size];
    let mut report = ScanReport::default();

    let covered = engine
        .geometry()
        .map(|g| g.protected_blocks())
        .unwrap_or(image.layout.data_blocks);
    let metadata_blocks = covered.saturating_sub(image.layout.data_blocks);

    let targets = (0..image.layout.data_blocks)
        .map(|b| (BlockType::Data, b, image.data.as_ref()))
        .chain((0..metadata_blocks).map(|b| {
            (
                BlockType::Metadata,
                image.layout.hash_start + b,
                image.hash.as_ref(),
            )
        }));

    for (block_type, block, device) in targets {
        if !table.expected_digest(block_type, block, &mut want[..size])? {
            continue;
        }
        report.checked += 1;

        let intact = match device.read_block(block) {
            Ok(data) => {
                image.digester.digest(&data, &mut real[..size])?;
                real[..size] == want[..size]
            }
            Err(e) => {
                warn!(%block_type, block, error = %e, "read failed");
                false
            }
        };
        if intact {
            continue;
        }

        report.corrupt += 1;
        match engine.decode(block, block_type, Destination::Buffer(&mut block_buf)) {
            Ok(outcome) => {
                report.repaired += 1;
                info!(%block_type, block, corrected = outcome.corrected, "block repaired");
            }
            Err(e) => {
                error!(%block_type, block, error = %e, "block could not be repaired");
                report.failed.push(block);
            }
        }
    }
    report.stats = engine.stats();

    if json {
        print_json(&report)?;
    } else {
        println!(
            "checked {} corrupt {} repaired {} failed {}",
            report.checked,
            report.corrupt,
            report.repaired,
            report.failed.len()
        );
    }

    match report.failed.first() {
        Some(&block) => Err(Error::Uncorrectable { block, erasures: 0 }),
        None => Ok(()),
    }
}

fn run_repair(
    args: &ImageArgs,
    digests: &Path,
    block: u64,
    metadata: bool,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let image = args.open()?;
    let table = Arc::new(DigestTable::load(digests)?);
    let engine = image.engine(&args.fec_device, table)?;

    let block_type = if metadata {
        BlockType::Metadata
    } else {
        BlockType::Data
    };
    let mut repaired = vec![0u8; image.layout.data_block_size];
    let outcome: RepairOutcome =
        engine.decode(block, block_type, Destination::Buffer(&mut repaired))?;

    if let Some(path) = output {
        std::fs::write(path, &repaired)?;
        info!(path = %path.display(), "repaired block written");
    }

    if json {
        print_json(&outcome)
    } else {
        println!(
            "{} block {}: corrected {} symbols ({} erasures{})",
            block_type,
            block,
            outcome.corrected,
            outcome.erasures,
            if outcome.used_erasures { ", erasure retry" } else { "" }
        );
        Ok(())
    }
}
