mod paths;
mod report;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;
use xxhash_rust::xxh3::Xxh3;

use paths::Direction;
use report::{human_bytes, ChunkTable, ConsoleProgress, HashingWriter};
use xzp_codecs::codec_by_name;
use xzp_core::{
    encode, Codec, ContainerHeader, EncodeOptions, EncodeVariant, NoProgress, Reader,
    READ_BLOCK_SIZE, WINDOW_SIZE,
};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xzptool",
    about = "Convert between raw .xzp payloads and chunked .xz_ containers",
    version
)]
struct Cli {
    /// Print every chunk and sector clear instead of a progress bar
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a .xzp file or decompress a .xz_ file, by extension
    Convert {
        /// File ending in .xzp or .xz_
        input: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        codec: CodecArgs,
        #[command(flatten)]
        layout: LayoutArgs,
    },
    /// Compress any file into an .xz_ container
    Compress {
        /// Raw payload to compress
        input: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        codec: CodecArgs,
        #[command(flatten)]
        layout: LayoutArgs,
    },
    /// Decompress an .xz_ container back to raw bytes
    Decompress {
        /// Container to decompress
        input: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        codec: CodecArgs,
    },
    /// Print header fields and optionally every chunk record
    Inspect {
        /// Container to inspect
        file: PathBuf,
        /// Print one row per chunk (decodes the whole container)
        #[arg(long)]
        chunks: bool,
        #[command(flatten)]
        codec: CodecArgs,
    },
    /// Decode without writing and print an xxh3-64 digest of the output
    Verify {
        /// Container to verify
        file: PathBuf,
        /// Raw file the decoded output must match
        #[arg(long)]
        against: Option<PathBuf>,
        #[command(flatten)]
        codec: CodecArgs,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Output path (default: the input with its extension swapped)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Overwrite an existing output without asking
    #[arg(short = 'y', long = "yes")]
    yes: bool,
}

#[derive(Args)]
struct CodecArgs {
    /// Codec for compressed chunks: lz4 | zstd | deflate | passthrough
    #[arg(short, long, default_value = "lz4")]
    codec: String,
    /// Compression level (zstd 1-22, deflate 0-9)
    #[arg(long)]
    level: Option<i32>,
}

#[derive(Args)]
struct LayoutArgs {
    /// Raw bytes per window (at most 32767)
    #[arg(long, default_value_t = WINDOW_SIZE)]
    window_size: u32,
    /// Bytes per read-block; a power of two, also the block alignment
    #[arg(long, default_value_t = READ_BLOCK_SIZE)]
    read_block_size: u32,
    /// Container layout to produce
    #[arg(long, value_enum, default_value_t = VariantArg::Complex)]
    variant: VariantArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum VariantArg {
    Complex,
    Simple,
    Auto,
}

impl LayoutArgs {
    fn options(&self) -> EncodeOptions {
        EncodeOptions {
            window_size: self.window_size,
            read_block_size: self.read_block_size,
            variant: match self.variant {
                VariantArg::Complex => EncodeVariant::Complex,
                VariantArg::Simple => EncodeVariant::Simple,
                VariantArg::Auto => EncodeVariant::Auto,
            },
        }
    }
}

impl CodecArgs {
    fn resolve(&self) -> anyhow::Result<std::sync::Arc<dyn Codec>> {
        codec_by_name(&self.codec, self.level)
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Validate the input and settle the output path; `None` means the user
/// declined to overwrite.
fn prepare_paths(
    input: &Path,
    output: &OutputArgs,
    direction: Direction,
) -> anyhow::Result<Option<PathBuf>> {
    paths::check_input(input)?;
    let path = output
        .output
        .clone()
        .unwrap_or_else(|| paths::default_output(input, direction));
    if paths::confirm_overwrite(input, &path, output.yes)? {
        Ok(Some(path))
    } else {
        Ok(None)
    }
}

fn open_container(
    path: &Path,
    codec: std::sync::Arc<dyn Codec>,
) -> anyhow::Result<Reader<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("opening container {:?}", path))?;
    let reader = Reader::open(BufReader::new(file), codec)
        .with_context(|| format!("reading header of {:?}", path))?;
    Ok(reader)
}

fn log_header(header: &ContainerHeader) {
    match header {
        ContainerHeader::Simple(h) => {
            info!("Simple container");
            info!("Decompressed size: {} bytes", h.decompressed_size);
        }
        ContainerHeader::Complex(h) => {
            info!("Decompressed size: {} bytes", h.decompressed_size);
            info!("Read block size: {} bytes", h.read_block_size);
            info!(
                "Decompression buffer size: {} bytes",
                h.decompression_buffer_size
            );
            info!("Window size: {} bytes", h.window_size);
        }
    }
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(
    input: PathBuf,
    output: OutputArgs,
    codec: CodecArgs,
    layout: LayoutArgs,
    verbose: bool,
) -> anyhow::Result<()> {
    let Some(output) = prepare_paths(&input, &output, Direction::Compress)? else {
        return Ok(());
    };
    let codec = codec.resolve()?;
    let codec_display = codec.name();
    let options = layout.options();

    let src = File::open(&input).with_context(|| format!("opening input file {:?}", input))?;
    let raw_size = src.metadata()?.len();
    let dst = File::create(&output).with_context(|| format!("creating output file {:?}", output))?;

    let t0 = Instant::now();
    let mut progress = ConsoleProgress::new(raw_size, verbose);
    let summary = encode(
        BufReader::new(src),
        raw_size,
        BufWriter::new(dst),
        codec,
        &options,
        &mut progress,
    )
    .with_context(|| format!("compressing {:?}", input))?;
    progress.finish();
    let elapsed = t0.elapsed();

    let ratio = if summary.container_len == 0 {
        1.0
    } else {
        raw_size as f64 / summary.container_len as f64
    };
    eprintln!("  codec       : {}", codec_display);
    eprintln!("  variant     : {:?}", summary.variant);
    eprintln!("  windows     : {} ({} stored raw)", summary.windows, summary.raw_chunks);
    eprintln!("  read blocks : {}", summary.blocks);
    eprintln!("  raw size    : {}", human_bytes(raw_size));
    eprintln!("  container   : {}", human_bytes(summary.container_len));
    eprintln!("  ratio       : {:.2}x", ratio);
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_decompress(
    input: PathBuf,
    output: OutputArgs,
    codec: CodecArgs,
    verbose: bool,
) -> anyhow::Result<()> {
    let Some(output) = prepare_paths(&input, &output, Direction::Decompress)? else {
        return Ok(());
    };
    let reader = open_container(&input, codec.resolve()?)?;
    log_header(reader.header());
    let raw_size = reader.header().decompressed_size() as u64;

    let dst = File::create(&output).with_context(|| format!("creating output file {:?}", output))?;

    let t0 = Instant::now();
    let mut progress = ConsoleProgress::new(raw_size, verbose);
    let summary = reader
        .decode_into(BufWriter::new(dst), &mut progress)
        .with_context(|| format!("decompressing {:?}", input))?;
    progress.finish();
    let elapsed = t0.elapsed();

    eprintln!("  read blocks : {}", summary.blocks);
    eprintln!(
        "  chunks      : {} ({} stored raw)",
        summary.raw_chunks + summary.compressed_chunks,
        summary.raw_chunks
    );
    eprintln!("  raw size    : {}", human_bytes(summary.decompressed_size));
    eprintln!(
        "  throughput  : {}/s",
        human_bytes((summary.decompressed_size as f64 / elapsed.as_secs_f64()) as u64)
    );
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_inspect(file: PathBuf, show_chunks: bool, codec: CodecArgs) -> anyhow::Result<()> {
    let reader = open_container(&file, codec.resolve()?)?;
    let file_size = std::fs::metadata(&file)?.len();

    println!("=== xz_ container: {:?} ===", file);
    println!();
    match reader.header() {
        ContainerHeader::Simple(h) => {
            println!("  variant                   : simple");
            println!("  decompressed size         : {}", human_bytes(h.decompressed_size as u64));
        }
        ContainerHeader::Complex(h) => {
            println!("  variant                   : complex (version {})", h.version);
            println!("  decompressed size         : {}", human_bytes(h.decompressed_size as u64));
            println!("  read block size           : {}", human_bytes(h.read_block_size as u64));
            println!(
                "  decompression buffer size : {}",
                human_bytes(h.decompression_buffer_size as u64)
            );
            println!("  window size               : {}", human_bytes(h.window_size as u64));
        }
    }
    println!("  file on disk              : {}", human_bytes(file_size));

    if show_chunks {
        println!();
        ChunkTable::print_heading();
        let mut table = ChunkTable::default();
        let summary = reader.decode_into(io::sink(), &mut table)?;
        println!();
        println!("  {} chunks in {} read blocks", table.rows, summary.blocks);
    }
    Ok(())
}

fn run_verify(file: PathBuf, against: Option<PathBuf>, codec: CodecArgs) -> anyhow::Result<()> {
    let reader = open_container(&file, codec.resolve()?)?;
    let mut hasher = HashingWriter::new();
    reader
        .decode_into(&mut hasher, &mut NoProgress)
        .with_context(|| format!("decoding {:?}", file))?;
    let digest = hasher.digest();
    println!("{:016x}  {}", digest, file.display());

    if let Some(raw) = against {
        let mut src = BufReader::new(
            File::open(&raw).with_context(|| format!("opening raw file {:?}", raw))?,
        );
        let mut expected = Xxh3::new();
        let mut buf = vec![0u8; 64 * 1024];
        let mut raw_len = 0u64;
        loop {
            let n = src.read(&mut buf)?;
            if n == 0 {
                break;
            }
            expected.update(&buf[..n]);
            raw_len += n as u64;
        }
        if raw_len != hasher.len || expected.digest() != digest {
            anyhow::bail!(
                "{:?} does not match {:?}: decoded {} bytes ({:016x}), raw file has {} bytes ({:016x})",
                file,
                raw,
                hasher.len,
                digest,
                raw_len,
                expected.digest()
            );
        }
        eprintln!("  matches {:?}", raw);
    }
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let verbose = cli.verbose;
    match cli.command {
        Commands::Convert {
            input,
            output,
            codec,
            layout,
        } => match Direction::from_path(&input)? {
            Direction::Compress => run_compress(input, output, codec, layout, verbose),
            Direction::Decompress => run_decompress(input, output, codec, verbose),
        },
        Commands::Compress {
            input,
            output,
            codec,
            layout,
        } => run_compress(input, output, codec, layout, verbose),
        Commands::Decompress {
            input,
            output,
            codec,
        } => run_decompress(input, output, codec, verbose),
        Commands::Inspect {
            file,
            chunks,
            codec,
        } => run_inspect(file, chunks, codec),
        Commands::Verify {
            file,
            against,
            codec,
        } => run_verify(file, against, codec),
    }
}
