//! Binary uploads (booking photos, ID scans, profile photos).

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

const FALLBACK_MIME: &str = "application/octet-stream";

/// An in-memory file ready to be sent as a multipart part.
#[derive(Clone, PartialEq, Eq)]
pub struct Blob {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Blob {
    /// Creates a blob, sniffing the MIME type from its content.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mime_type = infer::get(&bytes).map_or(FALLBACK_MIME, |kind| kind.mime_type());
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.to_string(),
            bytes,
        }
    }

    /// Reads a blob from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read file {}", path.display()))?;
        let file_name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().to_string());
        Ok(Self::new(file_name, bytes))
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}
