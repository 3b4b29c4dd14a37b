use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::domain::FileKind;

/// What the workflow knows about an upload before it is stored.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub owner_id: String,
    pub kind: FileKind,
    pub version: i64,
    pub filename: String,
}

/// Descriptor returned by the store; the workflow records it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub path: String,
    pub checksum: String,
    pub size: i64,
}

pub trait FileStore: Send + Sync {
    fn persist(&self, bytes: &[u8], metadata: &FileMetadata) -> std::io::Result<StoredFile>;
}

/// Writes uploads below a root folder, one directory per manuscript.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileStore for LocalFileStore {
    fn persist(&self, bytes: &[u8], metadata: &FileMetadata) -> std::io::Result<StoredFile> {
        let dir = self.root.join(sanitize(&metadata.owner_id));
        std::fs::create_dir_all(&dir)?;

        let target = dir.join(format!(
            "{:?}-v{}-{}",
            metadata.kind,
            metadata.version,
            sanitize(&metadata.filename)
        ));

        // Write beside the target and rename, so readers never see a partial file.
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;

        Ok(StoredFile {
            path: target.to_string_lossy().into_owned(),
            checksum: checksum(bytes),
            size: bytes.len() as i64,
        })
    }
}

pub fn checksum(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// MIME type guessed from the file name.
pub fn detect_mime(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn ensure_dirs(upload_folder: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(upload_folder)
}
