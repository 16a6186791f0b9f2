//! File logging under `~/.edito/`.
//!
//! Two append-only files, created on demand: `editor.log` collects
//! warnings and errors, `editor-debug.log` the verbose stream. Nothing is
//! written to the terminal, which belongs to the editor surface. Every
//! crate in the workspace emits `tracing` events, so the two fmt layers
//! see all of it directly.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

/// Install the global logger. `debug` raises the verbose file to TRACE.
pub fn init(debug: bool) -> io::Result<()> {
    let dir = log_dir()?;
    let log_file = open_append(dir.join("editor.log"))?;
    let debug_file = open_append(dir.join("editor-debug.log"))?;

    let verbose_level = if debug {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(log_file))
                .with_filter(LevelFilter::WARN),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(debug_file))
                .with_filter(verbose_level),
        )
        .init();
    Ok(())
}

/// `~/.edito`, created if missing; falls back to the working directory
/// when no home directory is available.
fn log_dir() -> io::Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let dir = home.join(".edito");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn open_append(path: PathBuf) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
