//! CLI command implementations

pub mod detect;
pub mod export;
pub mod import;
pub mod preview;
pub mod templates;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use ledgerport_core::services::{ProgressHandle, SourceFile};
use ledgerport_core::LedgerportContext;

/// Get the ledgerport directory from environment or default
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("LEDGERPORT_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".ledgerport"))
        .context("Could not find home directory; set LEDGERPORT_DIR")
}

/// Build a context for the data directory, creating it if needed
pub fn get_context(ndjson_output: Option<PathBuf>) -> Result<LedgerportContext> {
    let dir = get_data_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create ledgerport directory: {:?}", dir))?;
    LedgerportContext::new(&dir, ndjson_output).context("Failed to initialize ledgerport context")
}

/// Read a file as an upload
pub fn read_source(path: &Path) -> Result<SourceFile> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(SourceFile::new(name, bytes))
}

/// Drive a progress bar from a pipeline's progress channel until it closes
/// or reaches 100
pub async fn show_progress(mut handle: ProgressHandle, label: &str) {
    let bar = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}%") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_message(label.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.set_position(handle.current() as u64);

    while let Some(percent) = handle.changed().await {
        bar.set_position(percent as u64);
        if percent >= 100 {
            break;
        }
    }
    bar.finish_and_clear();
}
