use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use bookinfo_core::{AppConfig, BookInfo, FileFormat};
use bookinfo_resolve::extract::extract_cover_image;
use bookinfo_resolve::{GoogleBooksSource, Resolver, remote_cover_url_blocking, resolve_blocking};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "bookinfo",
    about = "Identify PDF/EPUB books and fetch their bibliographic records",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug output to stderr (RUST_LOG overrides).
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a single file and print the result as JSON.
    Info {
        file: PathBuf,
        /// Google Books API key. Defaults to the configured environment variable.
        #[arg(long)]
        api_key: Option<String>,
        /// Print every candidate instead of the best one.
        #[arg(long)]
        all: bool,
    },

    /// Rename every book in a directory to "ISBN - Title - Author".
    Rename {
        dir: PathBuf,
        #[arg(long)]
        api_key: Option<String>,
        /// Show what would be renamed without touching any file.
        #[arg(long)]
        dry_run: bool,
    },

    /// Extract the embedded cover image (EPUB) or render the first page (PDF).
    Cover {
        file: PathBuf,
        #[arg(long, short)]
        output: PathBuf,
        /// Without an embedded cover, print the Google Books cover link of the best match.
        #[arg(long)]
        remote: bool,
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Print the config file location.
    Path,
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = AppConfig::load().context("failed to load config")?;

    match cli.command {
        Commands::Info { file, api_key, all } => {
            let api_key = api_key.or_else(|| config.api_key()).unwrap_or_default();
            let resolver = Resolver::from_config(&config);
            let records = resolve_blocking(&resolver, &file, &api_key)
                .context("failed to start async runtime")?;

            if all {
                print_json(&serde_json::to_value(&records)?)?;
            } else if let Some(first) = records.first() {
                print_json(&serde_json::to_value(first)?)?;
            }
        }

        Commands::Rename {
            dir,
            api_key,
            dry_run,
        } => {
            let Some(api_key) = api_key.or_else(|| config.api_key()) else {
                bail!(
                    "no API key: pass --api-key or set {}",
                    config.lookup.api_key_env
                );
            };
            let resolver = Resolver::from_config(&config);
            rename_books(&resolver, &dir, &api_key, dry_run)?;
        }

        Commands::Cover {
            file,
            output,
            remote,
            api_key,
        } => {
            let Some(format) = FileFormat::from_path(&file) else {
                bail!("{} is not a PDF or EPUB file", file.display());
            };
            if let Some(bytes) = extract_cover_image(&file, format, &config.extraction) {
                std::fs::write(&output, &bytes)
                    .with_context(|| format!("failed to write {}", output.display()))?;
                println!("Wrote {} bytes to {}", bytes.len(), output.display());
                return Ok(());
            }

            if remote {
                let Some(api_key) = api_key.or_else(|| config.api_key()) else {
                    bail!(
                        "no API key: pass --api-key or set {}",
                        config.lookup.api_key_env
                    );
                };
                let source = GoogleBooksSource::from_config(&config);
                let url = remote_cover_url_blocking(&source, &file, &api_key)
                    .context("failed to start async runtime")?;
                if let Some(url) = url {
                    println!("{url}");
                    return Ok(());
                }
            }
            eprintln!("No cover image found for {}", file.display());
            std::process::exit(2);
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => print!("{}", config.to_toml()?),
            ConfigAction::Path => println!("{}", AppConfig::config_path().display()),
        },
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

// ─── Rename ─────────────────────────────────────────────────────────────────

fn rename_books(resolver: &Resolver, dir: &Path, api_key: &str, dry_run: bool) -> Result<()> {
    for path in book_files(dir)? {
        let records = resolve_blocking(resolver, &path, api_key)
            .context("failed to start async runtime")?;
        let Some(record) = records.into_iter().next() else {
            continue;
        };

        let Some(target) = rename_target(&path, &record) else {
            warn!(
                "Skipping {}: no title found ({})",
                path.display(),
                record.source
            );
            continue;
        };
        if target == path {
            continue;
        }
        if target.exists() {
            warn!(
                "Skipping {}: {} already exists",
                path.display(),
                target.display()
            );
            continue;
        }

        if dry_run {
            println!("{} -> {}", path.display(), target.display());
        } else {
            std::fs::rename(&path, &target).with_context(|| {
                format!("failed to rename {} to {}", path.display(), target.display())
            })?;
            info!("Renamed {} -> {}", path.display(), target.display());
        }
    }
    Ok(())
}

/// PDF/EPUB files directly inside `dir`, sorted by name.
fn book_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && FileFormat::from_path(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// New path next to `path`, or `None` when the record has no title.
fn rename_target(path: &Path, record: &BookInfo) -> Option<PathBuf> {
    record.title.as_ref()?;
    let ext = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    Some(path.with_file_name(record.file_name(&ext)))
}
