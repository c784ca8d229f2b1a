use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    process,
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use fs2::FileExt;

const LOCK_FILENAME: &str = ".spool.lock";

/// Exclusive lock on a spool directory so that only one worker consumes it.
/// Released when dropped.
#[derive(Debug)]
pub struct InstanceGuard {
    file: File,
    path: PathBuf,
}

impl InstanceGuard {
    pub fn acquire(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(LOCK_FILENAME);
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("failed to open lock file {}", path.display()))?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                let holder = fs::read_to_string(&path).unwrap_or_default();
                return Err(anyhow!(
                    "spool {} is already consumed by another worker ({})",
                    data_dir.display(),
                    holder.trim()
                ));
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to lock {}", path.display()))
            }
        }

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "pid={} since={}", process::id(), Utc::now().to_rfc3339())?;
        file.flush()?;

        tracing::info!(
            target: "lifecycle",
            pid = process::id(),
            path = %path.display(),
            "acquired spool lock"
        );
        Ok(Self { file, path })
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            tracing::warn!(
                target: "lifecycle",
                error = %err,
                path = %self.path.display(),
                "failed to release spool lock"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_guard_on_same_spool_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let first = InstanceGuard::acquire(dir.path()).unwrap();
        let err = InstanceGuard::acquire(dir.path()).unwrap_err();
        assert!(err.to_string().contains("already consumed"));

        drop(first);
        assert!(InstanceGuard::acquire(dir.path()).is_ok());
    }
}
