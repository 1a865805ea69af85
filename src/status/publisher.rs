//! Status file writer
//!
//! Single writer for the status document. Every publish replaces the whole
//! file through a temp file and rename, so a reader sees either the previous
//! document or the new one. Windows refuses the rename while an overlay holds
//! the file open; the document is then overwritten in place instead.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::io;
use tracing::{debug, info, warn};

use super::record::StatusRecord;

/// Writes [`StatusRecord`]s to a fixed path
#[derive(Debug, Clone)]
pub struct StatusPublisher {
    path: PathBuf,
}

impl StatusPublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file with a cleared record if it does not exist yet
    ///
    /// Returns `true` when the file was created.
    pub fn ensure_initialized(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }

        self.publish(&StatusRecord::cleared())?;
        info!("Created initial status file at {}", self.path.display());
        Ok(true)
    }

    /// Overwrite the status file with `record`
    pub fn publish(&self, record: &StatusRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create status directory: {}", parent.display())
                })?;
            }
        }

        let content = serde_json::to_vec(record).context("Failed to serialize status")?;
        let tmp_path = self.tmp_path();

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        set_world_readable(&tmp_path)?;
        self.replace(&tmp_path, &content, |from, to| std::fs::rename(from, to))?;

        debug!(
            "Published status: {}",
            String::from_utf8_lossy(&content)
        );
        Ok(())
    }

    /// Read the current status document
    pub fn read(&self) -> Result<StatusRecord> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        serde_json::from_str(&content).context("Failed to parse status file")
    }

    /// Move `tmp_path` over the status file, or write `content` in place if that fails
    fn replace<F>(&self, tmp_path: &Path, content: &[u8], rename: F) -> Result<()>
    where
        F: Fn(&Path, &Path) -> io::Result<()>,
    {
        let Err(e) = rename(tmp_path, &self.path) else {
            return Ok(());
        };
        warn!(
            "Failed to replace {} ({}), overwriting in place",
            self.path.display(),
            e
        );

        let written = std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()));
        if let Err(e) = std::fs::remove_file(tmp_path) {
            debug!("Failed to remove {}: {}", tmp_path.display(), e);
        }
        written
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "status.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(unix)]
fn set_world_readable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn set_world_readable(_path: &Path) -> Result<()> {
    Ok(())
}
