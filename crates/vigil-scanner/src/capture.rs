//! Raw HTML capture.
//!
//! Each scan writes the page's serialized DOM to
//! `<capture_dir>/scan_<network location>.html`. Rescanning a domain
//! overwrites its previous capture.

use crate::error::Result;
use std::path::{Path, PathBuf};

/// Map every character outside `[A-Za-z0-9.-]` to `_`.
#[must_use]
pub fn sanitize_file_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// File name of the capture for a network location.
#[must_use]
pub fn capture_file_name(network_location: &str) -> String {
    format!("scan_{}.html", sanitize_file_component(network_location))
}

/// Writes page captures below one directory.
#[derive(Debug, Clone)]
pub struct HtmlCapture {
    dir: PathBuf,
}

impl HtmlCapture {
    /// Capture writer for `dir`, created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `html` for `network_location`, returning the file path.
    pub async fn write(&self, network_location: &str, html: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(capture_file_name(network_location));
        tokio::fs::write(&path, html).await?;
        Ok(path)
    }
}
