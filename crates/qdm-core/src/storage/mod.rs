//! Partial-file lifecycle: `.part` staging, resume, and atomic finalize.
//!
//! Each download attempt opens a `FileSink`. The staging name carries a
//! short task-id suffix so two tasks that derive the same logical filename
//! never write the same `.part`; the final rename still targets the logical
//! name, and the last task to finalize wins (logged as a warning).

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::naming;

/// Staging suffix appended after the task-id tag.
pub const PART_SUFFIX: &str = ".part";

/// Staging path for (`name`, `task_id`) under `base`:
/// `<base>/<name>.<tag>.part`.
pub fn staging_path(base: &Path, name: &str, task_id: &str) -> PathBuf {
    base.join(format!(
        "{}.{}{}",
        name,
        naming::task_tag(task_id),
        PART_SUFFIX
    ))
}

/// Size of an existing staging file, or None when it does not exist.
pub fn staging_size(base: &Path, name: &str, task_id: &str) -> Option<u64> {
    fs::metadata(staging_path(base, name, task_id)).ok().map(|m| m.len())
}

/// Scoped writer for one download attempt. Append-only; finalize renames the
/// staging file over the logical name, close keeps it for a later resume,
/// discard deletes it.
pub struct FileSink {
    file: File,
    staging: PathBuf,
    final_path: PathBuf,
    written: u64,
}

impl FileSink {
    /// Open the sink. With `resume` and an existing staging file, appends and
    /// reports the existing bytes through `current_size`; otherwise the
    /// staging file is created fresh (truncated).
    pub fn open(base: &Path, name: &str, task_id: &str, resume: bool) -> Result<FileSink> {
        fs::create_dir_all(base)
            .with_context(|| format!("create download dir {}", base.display()))?;
        let staging = staging_path(base, name, task_id);
        let final_path = base.join(name);

        let (file, written) = if resume && staging.exists() {
            let len = fs::metadata(&staging)?.len();
            let file = OpenOptions::new()
                .append(true)
                .open(&staging)
                .with_context(|| format!("open staging for resume: {}", staging.display()))?;
            (file, len)
        } else {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&staging)
                .with_context(|| format!("create staging file: {}", staging.display()))?;
            (file, 0)
        };

        Ok(FileSink {
            file,
            staging,
            final_path,
            written,
        })
    }

    /// Append a chunk.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.file
            .write_all(data)
            .with_context(|| format!("write to {}", self.staging.display()))?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Bytes in the staging file. Authoritative for resume negotiation.
    pub fn current_size(&self) -> u64 {
        self.written
    }

    pub fn staging(&self) -> &Path {
        &self.staging
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Close and rename staging to the final name. Only called on successful
    /// completion. A pre-existing final file is replaced.
    pub fn finalize(self) -> Result<PathBuf> {
        self.file.sync_all().context("sync staging file")?;
        drop(self.file);
        if self.final_path.exists() {
            tracing::warn!(
                path = %self.final_path.display(),
                "replacing existing file at finalize"
            );
            fs::remove_file(&self.final_path)
                .with_context(|| format!("remove existing {}", self.final_path.display()))?;
        }
        fs::rename(&self.staging, &self.final_path).with_context(|| {
            format!(
                "rename {} to {}",
                self.staging.display(),
                self.final_path.display()
            )
        })?;
        Ok(self.final_path)
    }

    /// Close without renaming; the staging file stays for a later resume.
    pub fn close(self) {
        drop(self.file);
    }

    /// Close and delete the staging file (non-resumable pause, or abort).
    pub fn discard(self) -> Result<()> {
        let staging = self.staging.clone();
        drop(self.file);
        if staging.exists() {
            fs::remove_file(&staging)
                .with_context(|| format!("remove staging {}", staging.display()))?;
        }
        Ok(())
    }
}
