//! zipbox CLI - Pack the asset boxes a program references into its binary.
//!
//! This is the build-time entry point: run it after `cargo build` with the
//! package directories to scan and the binary to append to.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use zipbox_build::{BuildConfig, Builder, ImportSpec};

/// zipbox - embed asset directories into a compiled binary
#[derive(Parser)]
#[command(name = "zipbox")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Only print warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Package directory to scan (repeatable)
    #[arg(short = 's', long = "search-path", visible_alias = "sp", default_value = ".")]
    search_paths: Vec<PathBuf>,

    /// Build tags gating #[cfg(..)] items (repeatable, comma-separated)
    #[arg(short = 't', long = "build-tags", visible_alias = "bt")]
    build_tags: Vec<String>,

    /// Name that qualifies lookups in scanned code
    #[arg(long, visible_alias = "in", default_value = "zipbox")]
    import_name: String,

    /// Path the runtime library is imported from
    #[arg(long, visible_alias = "ip", default_value = "zipbox")]
    import_path: String,

    /// Binary to append the archive to
    #[arg(short, long, visible_alias = "bf", env = "ZIPBOX_BIN_FILE")]
    bin_file: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    let import = ImportSpec::new(&cli.import_name, &cli.import_path)
        .context("Invalid import settings")?;
    let config = BuildConfig::new(import, &cli.build_tags);
    tracing::debug!(
        version = zipbox_build::VERSION,
        search_paths = ?cli.search_paths,
        tags = ?config.tags,
        "starting build"
    );

    let mut builder = Builder::new(config);
    for path in &cli.search_paths {
        builder.add_search_path(path);
    }

    let pb = if cli.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!("Packing boxes into {}", cli.bin_file.display()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let start = Instant::now();
    let result = builder
        .append_to(&cli.bin_file)
        .with_context(|| format!("Failed to append boxes to {}", cli.bin_file.display()));
    pb.finish_and_clear();
    let output = result?;

    if cli.quiet {
        return Ok(());
    }

    for packed in &output.boxes {
        println!(
            "{} -> {}: {} files, {} directories, {} bytes",
            packed.name, packed.key, packed.files, packed.dirs, packed.bytes
        );
    }
    println!(
        "Packed {} boxes ({} files, {} bytes, {} archive bytes) in {:?}",
        output.boxes.len(),
        output.files(),
        output.bytes(),
        output.archive.len(),
        start.elapsed()
    );

    Ok(())
}

fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
