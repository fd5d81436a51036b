use std::path::PathBuf;

use anyhow::Context;
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use k2sh_core::format::DEFAULT_ZSTD_LEVEL;
use k2sh_core::io::{read_bytes, write_atomic};
use k2sh_core::{
    decode, encode, inspect, validate, BatchOptions, EncodeOptions, ItemOutcome, Metadata,
    PayloadCodec, Value,
};
use k2sh_export::{convert, ExportFormat};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "k2sh",
    about = "Bundle a raster image with structured metadata into a K2SHBWI container, then validate, inspect, and export it",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a K2SHBWI container from an image file
    #[command(visible_alias = "encode")]
    Create {
        /// Source image (png, jpeg, gif, webp, bmp, tiff)
        #[arg(short, long)]
        input: PathBuf,
        /// Destination container file
        #[arg(short, long)]
        output: PathBuf,
        /// Title stored in the container metadata
        #[arg(short, long)]
        title: Option<String>,
        /// Stamp the current time into the metadata as created_at
        #[arg(long)]
        timestamp: bool,
        /// Payload codec: auto | store | zstd | deflate
        #[arg(short, long, default_value = "auto")]
        codec: String,
        /// Zstd compression level (1-22, only used with zstd)
        #[arg(long, default_value_t = DEFAULT_ZSTD_LEVEL)]
        zstd_level: i32,
    },
    /// Recover the original image bytes from a container
    Decode {
        /// Container file to unpack
        file: PathBuf,
        /// Destination for the recovered image
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print container header facts and metadata
    Info {
        /// Container file to inspect
        file: PathBuf,
    },
    /// Check a container's structure and checksum
    Validate {
        /// Container file to check
        file: PathBuf,
    },
    /// Encode every image in a directory into containers
    Batch {
        /// Directory holding source images (not recursed into)
        #[arg(short, long)]
        input: PathBuf,
        /// Directory for the containers (created if missing)
        #[arg(short, long)]
        output: PathBuf,
        /// Payload codec: auto | store | zstd | deflate
        #[arg(short, long, default_value = "auto")]
        codec: String,
        /// Zstd compression level (1-22, only used with zstd)
        #[arg(long, default_value_t = DEFAULT_ZSTD_LEVEL)]
        zstd_level: i32,
        /// Write a JSON run summary to this path
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Export a container to a document format
    Convert {
        /// Container file to export
        file: PathBuf,
        /// Target format: html | pdf | pptx
        #[arg(short, long)]
        format: ExportFormat,
        /// Destination document file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Render a container to a web page for viewing in a browser
    View {
        /// Container file to view
        file: PathBuf,
        /// Where to write the page (default: next to the container)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn encode_options(codec: &str, zstd_level: i32) -> anyhow::Result<EncodeOptions> {
    let codec = match codec {
        "auto" | "a" => None,
        name => match PayloadCodec::from_name(name) {
            Some(codec) => Some(codec),
            None => anyhow::bail!(
                "unknown codec '{}'. Valid options: auto, store, zstd, deflate",
                name
            ),
        },
    };
    Ok(EncodeOptions { codec, zstd_level })
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{n} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Str(text) => text.clone(),
        Value::Int(number) => number.to_string(),
        Value::Timestamp(secs) => Utc
            .timestamp_opt(*secs, 0)
            .single()
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| format!("{} (unix seconds)", secs)),
        Value::Unknown { tag, bytes } => format!("{} opaque bytes (tag {})", bytes.len(), tag),
    }
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_create(
    input: PathBuf,
    output: PathBuf,
    title: Option<String>,
    timestamp: bool,
    codec_name: &str,
    zstd_level: i32,
) -> anyhow::Result<()> {
    let options = encode_options(codec_name, zstd_level)?;
    let image_bytes = read_bytes(&input)?;

    let mut metadata = match title {
        Some(title) => Metadata::with_title(&title)?,
        None => Metadata::new(),
    };
    if timestamp {
        metadata.set_created_at(Utc::now().timestamp());
    }

    let container = encode(&image_bytes, metadata, &options)?;
    write_atomic(&output, &container)
        .with_context(|| format!("writing container {:?}", output))?;

    let info = inspect(&container)?;
    println!("[OK] Created: {}", output.display());
    println!("  source      : {} ({})", input.display(), human_bytes(image_bytes.len() as u64));
    println!("  container   : {}", human_bytes(container.len() as u64));
    println!("  codec       : {}", info.codec.name());
    Ok(())
}

fn run_decode(file: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let container = read_bytes(&file)?;
    let decoded = decode(&container)?;
    write_atomic(&output, &decoded.image)
        .with_context(|| format!("writing image {:?}", output))?;

    println!("[OK] Decoded: {}", output.display());
    println!("  image bytes : {}", human_bytes(decoded.image.len() as u64));
    if let Some(title) = decoded.metadata.title() {
        println!("  title       : {}", title);
    }
    Ok(())
}

fn run_info(file: PathBuf) -> anyhow::Result<()> {
    let container = read_bytes(&file)?;
    let info = inspect(&container)?;
    let ratio = info.payload_raw_len as f64 / info.payload_stored_len.max(1) as f64;

    println!("=== K2SHBWI Container: {} ===", file.display());
    println!();
    println!("  format version : {}", info.version);
    println!("  codec          : {} (id={})", info.codec.name(), info.codec.id());
    println!(
        "  metadata       : {} field(s), {}",
        info.metadata.len(),
        human_bytes(info.metadata_len as u64)
    );
    println!("  payload stored : {}", human_bytes(info.payload_stored_len));
    println!("  payload raw    : {}", human_bytes(info.payload_raw_len));
    println!("  ratio          : {:.2}x", ratio);
    println!("  checksum       : 0x{:016x}", info.checksum);
    println!("  file on disk   : {}", human_bytes(container.len() as u64));

    if !info.metadata.is_empty() {
        println!();
        println!("  metadata fields:");
        for (name, value) in info.metadata.iter() {
            println!("    {:<16} {}", name, display_value(value));
        }
    }
    Ok(())
}

fn run_validate(file: PathBuf) -> anyhow::Result<()> {
    let container = read_bytes(&file)?;
    match validate(&container).into_failure() {
        None => {
            println!("[OK] VALID: {}", file.display());
            Ok(())
        }
        Some(failure) => {
            println!("[FAIL] INVALID: {}", file.display());
            println!("  reason : {}", failure);
            anyhow::bail!("validation failed")
        }
    }
}

fn run_batch(
    input: PathBuf,
    output: PathBuf,
    codec_name: &str,
    zstd_level: i32,
    summary: Option<PathBuf>,
) -> anyhow::Result<()> {
    let options = BatchOptions {
        encode: encode_options(codec_name, zstd_level)?,
        cancel: None,
    };
    let report = k2sh_core::run_batch(&input, &output, &options)?;

    for item in &report.items {
        match &item.outcome {
            ItemOutcome::Created { output } => {
                println!("  [OK]   {} -> {}", item.input.display(), output.display());
            }
            ItemOutcome::Failed { error } => {
                println!("  [FAIL] {}: {}", item.input.display(), error);
            }
        }
    }
    println!();
    println!(
        "Batch finished: {} succeeded, {} failed, {} processed",
        report.succeeded(),
        report.failed(),
        report.total()
    );

    if let Some(path) = summary {
        let json = serde_json::to_string_pretty(&report.summary())?;
        std::fs::write(&path, json)
            .with_context(|| format!("writing summary {:?}", path))?;
        println!("  summary written to {}", path.display());
    }
    Ok(())
}

fn run_convert(file: PathBuf, format: ExportFormat, output: PathBuf) -> anyhow::Result<()> {
    if !format.available() {
        println!("[SKIP] {} export is not compiled into this build", format);
        anyhow::bail!("rebuild with the '{}' cargo feature enabled", format.name());
    }
    let container = read_bytes(&file)?;
    let report = convert(&container, format, &output)?;

    println!("[OK] Exported: {}", report.output.display());
    println!("  format : {}", report.format);
    println!("  size   : {}", human_bytes(report.bytes_written));
    Ok(())
}

fn run_view(file: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    let container = read_bytes(&file)?;
    let output = output.unwrap_or_else(|| file.with_extension("html"));
    let report = convert(&container, ExportFormat::Html, &output)?;

    println!("[OK] Wrote web page: {}", report.output.display());
    println!("  open it in your web browser");
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Create {
            input,
            output,
            title,
            timestamp,
            codec,
            zstd_level,
        } => run_create(input, output, title, timestamp, &codec, zstd_level),
        Commands::Decode { file, output } => run_decode(file, output),
        Commands::Info { file } => run_info(file),
        Commands::Validate { file } => run_validate(file),
        Commands::Batch {
            input,
            output,
            codec,
            zstd_level,
            summary,
        } => run_batch(input, output, &codec, zstd_level, summary),
        Commands::Convert {
            file,
            format,
            output,
        } => run_convert(file, format, output),
        Commands::View { file, output } => run_view(file, output),
    }
}
