//! Backup artifacts: `backup_<YYYYMMDD_HHMMSS>.sql.gz`.
//!
//! Artifacts are created with create-new semantics and never touched
//! again. A second backup within the same second gets a `_1`, `_2`, ...
//! suffix instead of overwriting the first.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::{debug, warn};

use crate::error::{PmError, PmResult};

pub const BACKUP_PREFIX: &str = "backup_";
pub const BACKUP_EXTENSION: &str = "sql.gz";
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const BACKUP_FILE_MODE: u32 = 0o600;
const MAX_SUFFIX: u32 = 1000;

/// File name for the `n`th backup taken at `taken_at` (0 = no suffix).
pub fn backup_file_name(taken_at: NaiveDateTime, n: u32) -> String {
    let stamp = taken_at.format(TIMESTAMP_FORMAT);
    if n == 0 {
        format!("{BACKUP_PREFIX}{stamp}.{BACKUP_EXTENSION}")
    } else {
        format!("{BACKUP_PREFIX}{stamp}_{n}.{BACKUP_EXTENSION}")
    }
}

/// Create the first free artifact path for `taken_at` inside `dir`.
fn reserve(dir: &Path, taken_at: NaiveDateTime) -> PmResult<(PathBuf, File)> {
    fs::create_dir_all(dir).map_err(|e| {
        PmError::BackupFailed(format!("cannot create {}: {e}", dir.display()))
    })?;

    for n in 0..MAX_SUFFIX {
        let path = dir.join(backup_file_name(taken_at, n));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(BACKUP_FILE_MODE)
            .open(&path)
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "backup name taken");
            }
            Err(e) => {
                return Err(PmError::BackupFailed(format!(
                    "cannot create {}: {e}",
                    path.display()
                )));
            }
        }
    }

    Err(PmError::BackupFailed(format!(
        "too many backups for {} in {}",
        taken_at.format(TIMESTAMP_FORMAT),
        dir.display()
    )))
}

/// A reserved artifact being filled with a gzipped dump.
///
/// Bytes written go straight through the gzip encoder to disk. The
/// artifact only counts once [`finish`](Self::finish) succeeds; dropping
/// the writer or calling [`discard`](Self::discard) removes the file.
pub struct BackupWriter {
    path: PathBuf,
    encoder: Option<GzEncoder<File>>,
}

impl BackupWriter {
    pub fn create(dir: &Path, taken_at: NaiveDateTime) -> PmResult<Self> {
        let (path, file) = reserve(dir, taken_at)?;
        debug!(path = %path.display(), "backup reserved");
        Ok(Self {
            path,
            encoder: Some(GzEncoder::new(file, Compression::default())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush the gzip trailer and sync the file.
    pub fn finish(mut self) -> PmResult<PathBuf> {
        let result = match self.encoder.take() {
            Some(encoder) => encoder.finish().and_then(|file| file.sync_all()),
            None => Err(io::Error::other("backup writer already closed")),
        };
        match result {
            Ok(()) => Ok(std::mem::take(&mut self.path)),
            Err(e) => Err(PmError::BackupFailed(format!("compression failed: {e}"))),
        }
    }

    /// Drop the partial artifact.
    pub fn discard(self) {
        drop(self);
    }
}

impl Write for BackupWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.encoder.as_mut() {
            Some(encoder) => encoder.write(buf),
            None => Err(io::Error::other("backup writer already closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.encoder.as_mut() {
            Some(encoder) => encoder.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for BackupWriter {
    fn drop(&mut self) {
        // A finished writer has handed its path out and left it empty.
        if self.path.as_os_str().is_empty() {
            return;
        }
        self.encoder.take();
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "could not remove partial backup");
        } else {
            debug!(path = %self.path.display(), "partial backup removed");
        }
    }
}
