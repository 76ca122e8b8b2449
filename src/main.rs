use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tablec::source::{self, Clock, SourceOptions};
use tablec::{Compiler, ExportConfig, Platform, TracingObserver};

/// Compile game-data tables into server/client headers and JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Workbook JSON file, or a directory of them
    input: PathBuf,

    /// Generate server artifacts
    #[arg(short, long)]
    server: bool,

    /// Generate client artifacts
    #[arg(short, long)]
    client: bool,

    /// TOML export config
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    server_header_dir: Option<PathBuf>,

    #[arg(long)]
    client_header_dir: Option<PathBuf>,

    #[arg(long)]
    server_json_dir: Option<PathBuf>,

    #[arg(long)]
    client_json_dir: Option<PathBuf>,

    /// Fixed export timestamp (RFC 3339) for reproducible output
    #[arg(long, value_name = "RFC3339")]
    pin_clock: Option<DateTime<Utc>>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn platforms(&self) -> Vec<Platform> {
        match (self.server, self.client) {
            (true, false) => vec![Platform::Server],
            (false, true) => vec![Platform::Client],
            _ => Platform::ALL.to_vec(),
        }
    }
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ExportConfig::load_from_file(path)?,
        None => ExportConfig::default(),
    };

    let input_dir = if args.input.is_dir() {
        args.input.as_path()
    } else {
        args.input.parent().unwrap_or(Path::new("."))
    };
    config.resolve_relative_to(input_dir);

    if let Some(dir) = &args.server_header_dir {
        config.server_header_dir = dir.clone();
    }
    if let Some(dir) = &args.client_header_dir {
        config.client_header_dir = dir.clone();
    }
    if let Some(dir) = &args.server_json_dir {
        config.server_json_dir = dir.clone();
    }
    if let Some(dir) = &args.client_json_dir {
        config.client_json_dir = dir.clone();
    }

    let options = SourceOptions {
        clock: args.pin_clock.map(Clock::Pinned).unwrap_or_default(),
    };
    let workbook = source::load(&args.input, &options)
        .with_context(|| format!("loading {}", args.input.display()))?;

    let platforms = args.platforms();
    tracing::info!(
        tables = workbook.tables.len(),
        platforms = ?platforms,
        "compiling"
    );

    let observer = TracingObserver;
    let compiler = Compiler::new(config, &observer);
    let artifacts = compiler.compile(workbook, &platforms)?;
    let written = compiler.write(&artifacts)?;

    tracing::info!(files = written.len(), "done");
    Ok(())
}
