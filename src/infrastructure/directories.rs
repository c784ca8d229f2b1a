use std::{fs, path::PathBuf};

use anyhow::{Context, Result};

use crate::config::DirectoryConfig;

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub logs_dir: PathBuf,
    pub data_dir: PathBuf,
    pub inbox_dir: PathBuf,
    pub dead_letter_dir: PathBuf,
}

pub fn ensure_directories(cfg: &DirectoryConfig) -> Result<ResolvedPaths> {
    let logs_dir = ensure_dir(PathBuf::from(&cfg.logs_dir))?;
    let data_dir = ensure_dir(PathBuf::from(&cfg.data_dir))?;
    let inbox_dir = ensure_dir(data_dir.join("inbox"))?;
    let dead_letter_dir = ensure_dir(data_dir.join("dead-letter"))?;

    let probe_file = inbox_dir.join(".write-test");
    fs::write(&probe_file, b"ok")
        .with_context(|| format!("inbox {} is not writable", inbox_dir.display()))?;
    fs::remove_file(&probe_file)?;

    Ok(ResolvedPaths {
        logs_dir,
        data_dir,
        inbox_dir,
        dead_letter_dir,
    })
}

fn ensure_dir(dir: PathBuf) -> Result<PathBuf> {
    if !dir.exists() {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }
    Ok(dir.canonicalize().unwrap_or(dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_spool_layout() {
        let root = tempfile::tempdir().unwrap();
        let cfg = DirectoryConfig {
            logs_dir: root.path().join("logs").display().to_string(),
            data_dir: root.path().join("data").display().to_string(),
        };

        let paths = ensure_directories(&cfg).unwrap();

        assert!(paths.logs_dir.is_dir());
        assert!(paths.inbox_dir.is_dir());
        assert!(paths.dead_letter_dir.is_dir());
        assert!(paths.inbox_dir.starts_with(&paths.data_dir));
        assert!(!paths.inbox_dir.join(".write-test").exists());
    }
}
