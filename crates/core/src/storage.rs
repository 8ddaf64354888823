//! Date-partitioned artifact storage layout.
//!
//! Artifacts live under `root/YYYY/MM/DD/<job-id>.<ext>`, keyed by the
//! completion date, so a filename plus its date is enough to find the file.
//! Directories are created on first write.

use std::path::{Path, PathBuf};

use crate::types::{JobId, Timestamp};

/// URL prefix under which stored artifacts are served.
pub const PHOTO_URL_PREFIX: &str = "/photo/";

#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `YYYY/MM/DD` for the given instant.
    pub fn date_segment(at: Timestamp) -> String {
        at.format("%Y/%m/%d").to_string()
    }

    /// Absolute directory for artifacts completed at `at`.
    pub fn dir_for(&self, at: Timestamp) -> PathBuf {
        self.root
            .join(at.format("%Y").to_string())
            .join(at.format("%m").to_string())
            .join(at.format("%d").to_string())
    }

    /// Path relative to the root, with `/` separators: `YYYY/MM/DD/filename`.
    pub fn relative_path(filename: &str, at: Timestamp) -> String {
        format!("{}/{filename}", Self::date_segment(at))
    }

    pub fn absolute_path(&self, filename: &str, at: Timestamp) -> PathBuf {
        self.dir_for(at).join(filename)
    }

    /// Create the directory for `at` if it does not exist yet.
    pub async fn ensure_dir(&self, at: Timestamp) -> std::io::Result<PathBuf> {
        let dir = self.dir_for(at);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Write an artifact and return its relative path.
    pub async fn write_artifact(
        &self,
        filename: &str,
        at: Timestamp,
        bytes: &[u8],
    ) -> std::io::Result<String> {
        if !is_plain_filename(filename) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid artifact filename '{filename}'"),
            ));
        }
        let dir = self.ensure_dir(at).await?;
        tokio::fs::write(dir.join(filename), bytes).await?;
        Ok(Self::relative_path(filename, at))
    }
}

/// Artifact filename for a job: `<job-id>.<ext>`.
pub fn artifact_filename(job_id: JobId, extension: &str) -> String {
    format!("{job_id}.{}", extension.trim_start_matches('.'))
}

/// Public URL of an artifact stored at `relative_path`.
pub fn photo_url(relative_path: &str) -> String {
    format!("{PHOTO_URL_PREFIX}{relative_path}")
}

fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}
