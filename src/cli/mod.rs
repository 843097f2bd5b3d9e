//! # CLI Module
//!
//! Command-line interface for the media mirror.
//!
//! ## Usage
//! ```bash
//! # Back up every album from a mounted card
//! media-mirror sync /media/palm
//!
//! # Copy into a specific mirror directory
//! media-mirror sync /media/palm --out ~/Backups/Media
//!
//! # JSON output
//! media-mirror sync /media/palm --output json
//!
//! # Inspect the fetch ledger
//! media-mirror store stats
//! ```

use media_mirror::core::device::LocalMountDevice;
use media_mirror::core::store::{FetchStore, SqliteStore};
use media_mirror::core::sync::{SyncConfig, SyncEngine, SyncReport};
use media_mirror::error::{MirrorError, Result};
use media_mirror::events::{DiscoverEvent, Event, EventChannel, FetchEvent, SyncEvent};
use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::thread;
use std::time::SystemTime;

/// Media Mirror - Back up device photos and videos, each file exactly once
///
/// Media lands under the mirror root in one directory per storage card
/// (Device, SDCard, card2, ...), with one subdirectory per album; files
/// stored loose on a card go directly into the card directory. Every
/// copied file is remembered in a fetch ledger by name and size, so a
/// file is downloaded only once even if it later moves to a different
/// album. Run `store clear` to forget the ledger and fetch everything
/// again.
#[derive(Parser, Debug)]
#[command(name = "media-mirror")]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy new media from mounted devices into the local mirror
    Sync {
        /// Mount points to back up
        #[arg(required = true)]
        mounts: Vec<PathBuf>,

        /// Mirror directory (defaults to ~/MediaMirror)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Device directory to search for albums (replaces the defaults)
        #[arg(long = "root")]
        roots: Vec<String>,

        /// Additional file extension to fetch
        #[arg(long = "ext")]
        extensions: Vec<String>,

        /// Additional album directory name to skip
        #[arg(long = "exclude-dir")]
        excluded_dirs: Vec<String>,

        /// Fetch ledger database path
        #[arg(long)]
        store: Option<PathBuf>,

        /// Skip the probe for a hidden first volume
        #[arg(long)]
        no_probe_hidden: bool,

        /// Output format
        #[arg(long, default_value = "pretty")]
        output: OutputFormat,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Inspect or reset the fetch ledger
    Store {
        /// Fetch ledger database path
        #[arg(long)]
        store: Option<PathBuf>,

        #[command(subcommand)]
        action: StoreAction,
    },
}

#[derive(Subcommand, Debug)]
enum StoreAction {
    /// Show how many files the ledger remembers
    Stats,
    /// Forget every fetched file (the next sync copies everything again)
    Clear,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// Minimal output (copied paths only)
    Minimal,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sync {
            mounts,
            out,
            roots,
            extensions,
            excluded_dirs,
            store,
            no_probe_hidden,
            output,
            verbose,
        } => run_sync(
            mounts,
            out,
            roots,
            extensions,
            excluded_dirs,
            store,
            no_probe_hidden,
            output,
            verbose,
        ),
        Commands::Store { store, action } => run_store(store, action),
    }
}

/// Open the ledger at an explicit path, or the per-user default.
fn open_ledger(path: Option<PathBuf>) -> Result<SqliteStore> {
    let store = match path {
        Some(path) => SqliteStore::open(&path)?,
        None => SqliteStore::open_default()?,
    };
    Ok(store)
}

#[allow(clippy::too_many_arguments)]
fn run_sync(
    mounts: Vec<PathBuf>,
    out: Option<PathBuf>,
    roots: Vec<String>,
    extensions: Vec<String>,
    excluded_dirs: Vec<String>,
    store_path: Option<PathBuf>,
    no_probe_hidden: bool,
    output: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let term = Term::stderr();

    // Print header
    if matches!(output, OutputFormat::Pretty) {
        term.write_line(&format!(
            "{} {}",
            style("Media Mirror").bold().cyan(),
            style("v0.1.0").dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    for mount in &mounts {
        if !mount.is_dir() {
            return Err(MirrorError::Config(format!(
                "mount point {} is not a directory",
                mount.display()
            )));
        }
    }

    let device = LocalMountDevice::from_mounts(&mounts);

    // Set up the fetch ledger
    let store = open_ledger(store_path)?;

    // Build the engine
    let mut config = SyncConfig::default();
    if let Some(out) = out {
        config.local_root = out;
    }
    if !roots.is_empty() {
        config.media_roots = roots;
    }
    config.extensions.extend(extensions);
    config.excluded_dirs.extend(excluded_dirs);
    config.probe_hidden_volume = !no_probe_hidden;

    let engine = SyncEngine::builder()
        .config(config)
        .store(Box::new(store))
        .build();

    // Set up event handling
    let (sender, receiver) = EventChannel::new();

    // Progress bar for pretty output
    let progress = if matches!(output, OutputFormat::Pretty) {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();
    let verbose_clone = verbose;

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || {
        let mut albums_done = 0u64;
        for event in receiver.iter() {
            match event {
                Event::Sync(SyncEvent::PhaseChanged { phase }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.set_message(format!("{}", phase));
                    }
                }
                Event::Discover(DiscoverEvent::Completed { total_albums }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.set_length(total_albums as u64);
                    }
                }
                Event::Fetch(FetchEvent::AlbumStarted { album, candidates }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.set_message(format!("{} ({} files)", album, candidates));
                    }
                }
                Event::Fetch(FetchEvent::FileCopied { name, .. }) => {
                    if verbose_clone {
                        if let Some(ref pb) = progress_clone {
                            pb.set_message(name);
                        }
                    }
                }
                Event::Fetch(FetchEvent::AlbumCompleted { .. }) => {
                    albums_done += 1;
                    if let Some(ref pb) = progress_clone {
                        pb.set_position(albums_done);
                    }
                }
                Event::Sync(SyncEvent::Completed { .. }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.finish_and_clear();
                    }
                }
                _ => {}
            }
        }
    });

    // Run the sync
    let report = engine.run_with_events(&device, &sender)?;

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();

    // Output results
    match output {
        OutputFormat::Pretty => print_pretty_results(&term, &report, verbose),
        OutputFormat::Json => print_json_results(&report),
        OutputFormat::Minimal => print_minimal_results(&report),
    }

    if !report.found_data() {
        return Err(MirrorError::NoMediaFound);
    }

    Ok(())
}

fn run_store(store_path: Option<PathBuf>, action: StoreAction) -> Result<()> {
    let term = Term::stderr();

    let store = open_ledger(store_path)?;

    match action {
        StoreAction::Stats => {
            let stats = store.stats()?;
            term.write_line(&format!(
                "{} {}",
                style("Ledger:").bold(),
                store.path().display()
            ))
            .ok();
            term.write_line(&format!(
                "  {} files remembered",
                style(stats.total_entries).cyan()
            ))
            .ok();
            if let Some(oldest) = stats.oldest_entry {
                term.write_line(&format!("  oldest fetch: {}", format_time(oldest)))
                    .ok();
            }
            if let Some(newest) = stats.newest_entry {
                term.write_line(&format!("  newest fetch: {}", format_time(newest)))
                    .ok();
            }
        }
        StoreAction::Clear => {
            store.clear()?;
            term.write_line(&format!(
                "{} Ledger cleared. The next sync copies everything again.",
                style("✓").green().bold()
            ))
            .ok();
        }
    }

    Ok(())
}

fn print_pretty_results(term: &Term, report: &SyncReport, verbose: bool) {
    term.write_line("").ok();
    term.write_line(&format!("{} Sync Complete", style("✓").green().bold()))
        .ok();
    term.write_line("").ok();

    // Summary
    term.write_line(&format!(
        "  {} volumes, {} albums in {:.1}s",
        style(report.volumes).cyan(),
        style(report.albums.len()).cyan(),
        report.duration_ms as f64 / 1000.0
    ))
    .ok();

    term.write_line(&format!(
        "  {} new files copied ({})",
        style(report.files_copied()).cyan(),
        style(format_bytes(report.bytes_copied())).yellow()
    ))
    .ok();

    term.write_line(&format!(
        "  {} already fetched, skipped",
        style(report.files_skipped()).dim()
    ))
    .ok();

    if report.files_failed() > 0 {
        term.write_line(&format!(
            "  {} files failed",
            style(report.files_failed()).red()
        ))
        .ok();
    }

    term.write_line("").ok();

    // Show albums
    if report.albums.is_empty() {
        term.write_line(&format!(
            "  {} No media found on the device.",
            style("!").yellow()
        ))
        .ok();
    } else {
        term.write_line(&format!("{}", style("Albums:").bold().underlined()))
            .ok();
        term.write_line("").ok();

        for album in &report.albums {
            let failures = if album.failed > 0 {
                format!(", {} failed", style(album.failed).red())
            } else {
                String::new()
            };

            term.write_line(&format!(
                "  {} {} copied, {} skipped{}",
                style(album.display_path()).bold(),
                album.copied,
                album.skipped,
                failures
            ))
            .ok();

            if verbose {
                for file in &album.copied_files {
                    term.write_line(&format!("    {} {}", style("+").green(), file.display()))
                        .ok();
                }
            }
        }

        term.write_line("").ok();
    }

    for error in &report.errors {
        term.write_line(&format!("  {} {}", style("✗").red(), error)).ok();
    }
    if !report.errors.is_empty() {
        term.write_line("").ok();
    }

    // Footer
    term.write_line(&format!(
        "{}",
        style("The device was not modified. Already-fetched files were left alone.").dim()
    ))
    .ok();
}

fn print_json_results(report: &SyncReport) {
    let output = serde_json::json!({
        "run_id": report.run_id,
        "volumes": report.volumes,
        "albums": report.albums.len(),
        "files_copied": report.files_copied(),
        "files_skipped": report.files_skipped(),
        "files_failed": report.files_failed(),
        "bytes_copied": report.bytes_copied(),
        "duration_ms": report.duration_ms,
        "album_reports": report.albums,
        "errors": report.errors,
    });

    println!("{}", serde_json::to_string_pretty(&output).unwrap());
}

fn print_minimal_results(report: &SyncReport) {
    for album in &report.albums {
        for file in &album.copied_files {
            println!("{}", file.display());
        }
    }
}

fn format_time(time: SystemTime) -> String {
    chrono::DateTime::<chrono::Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
