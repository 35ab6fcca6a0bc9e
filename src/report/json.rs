use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ImpactError, Result};
use crate::types::model::ImpactSnapshot;

pub fn to_json(snapshot: &ImpactSnapshot) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string_pretty(snapshot)
}

/// Writes the snapshot next to `path` first and renames it into place, so a
/// reader never sees a half-written file.
pub fn write_snapshot(path: &Path, snapshot: &ImpactSnapshot) -> Result<()> {
    let rendered = to_json(snapshot)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let staging = staging_path(path);
    if let Err(err) = fs::write(&staging, rendered) {
        let _ = fs::remove_file(&staging);
        return Err(err.into());
    }
    fs::rename(&staging, path)?;
    debug!(path = %path.display(), "snapshot written");
    Ok(())
}

pub fn read_snapshot(path: &Path) -> Result<ImpactSnapshot> {
    if !path.exists() {
        return Err(ImpactError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("snapshot not found: {}", path.display()),
        )));
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
