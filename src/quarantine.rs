//! Quarantine for records that could not be resolved.
//!
//! A sidecar whose media cannot be found is copied, unchanged, into the
//! quarantine directory so it is not silently lost. The same handler takes
//! media files that no sidecar describes.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Copy `file` into `dir`, keeping its file name.
///
/// Creates `dir` (and parents) on first use. An earlier copy with the same name
/// is overwritten. The original is never modified or removed.
pub fn quarantine_file(file: &Path, dir: &Path) -> Result<PathBuf> {
    let name = file
        .file_name()
        .with_context(|| format!("{} has no file name", file.display()))?;
    let target = dir.join(name);

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create quarantine directory {}", dir.display()))?;
    std::fs::copy(file, &target)
        .with_context(|| format!("Failed to copy {} into quarantine", file.display()))?;

    log::debug!("Quarantined {} -> {}", file.display(), target.display());
    Ok(target)
}

/// Where [`quarantine_file`] would put `file`, without touching the filesystem.
pub fn quarantine_target(file: &Path, dir: &Path) -> Option<PathBuf> {
    file.file_name().map(|name| dir.join(name))
}
