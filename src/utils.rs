use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::OutputMode;
use crate::error::{Error, Result};
use crate::types::Partition;

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} {prefix:>5} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Progress bar for the annotations of one partition, prefixed with its directory name.
pub fn create_progress_bar(partition: Partition, len: u64) -> ProgressBar {
    let style = ProgressStyle::with_template(PROGRESS_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    ProgressBar::new(len)
        .with_style(style)
        .with_prefix(partition.dir_name())
}

/// Create an output directory. In overwrite mode an existing directory is deleted first.
pub fn create_output_directory(path: &Path, mode: OutputMode) -> Result<PathBuf> {
    if mode == OutputMode::Overwrite && path.exists() {
        log::warn!(
            "Directory {:?} already exists. Deleting and recreating it.",
            path
        );
        fs::remove_dir_all(path).map_err(|e| Error::io(path, e))?;
    }
    fs::create_dir_all(path).map_err(|e| Error::io(path, e))?;
    Ok(path.to_path_buf())
}
