use std::{fs, io, path::PathBuf};

use tracing::{info, warn};

use crate::error::{Error, Result};

/// The death count and the text file it lives in.
#[derive(Debug)]
pub struct DeathCounter {
    path: PathBuf,
    count: u64,
}

impl DeathCounter {
    /// Reads the stored count. A missing file is created holding `0`,
    /// anything unreadable counts as `0`.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let count = match fs::read_to_string(&path) {
            Ok(content) => parse_count(&content).unwrap_or_else(|| {
                warn!(path = %path.display(), content = content.trim(), "counter file is not a number, starting from 0");
                0
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "creating counter file");
                if let Err(err) = fs::write(&path, "0") {
                    warn!(path = %path.display(), %err, "failed to create counter file");
                }
                0
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to read counter file, starting from 0");
                0
            }
        };

        DeathCounter { path, count }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Bumps the count and overwrites the file with it. The in-memory count
    /// advances even when the write fails.
    pub fn increment(&mut self) -> Result<u64> {
        self.count += 1;
        fs::write(&self.path, self.count.to_string()).map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })?;

        Ok(self.count)
    }
}

pub fn parse_count(content: &str) -> Option<u64> {
    content.trim().parse().ok()
}

/// Lenient read used by the overlay, races with the detector's writes.
pub async fn read_count(path: PathBuf) -> u64 {
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => parse_count(&content).unwrap_or(0),
        Err(_) => 0,
    }
}
