use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::sanitize;

const GENERIC_CONTENT_TYPE: &str = "application/octet-stream";

/// An uploaded document saved for the duration of one job.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Name as sent by the client.
    pub filename: String,
    pub path: PathBuf,
    pub declared_type: Option<String>,
    pub size: u64,
}

/// Returns the client's content type, or one guessed from the file name when
/// the client sent none or only the generic binary type.
pub fn detect_content_type(filename: &str, declared: Option<&str>) -> Option<String> {
    match declared.map(str::trim) {
        Some(ct) if !ct.is_empty() && !ct.eq_ignore_ascii_case(GENERIC_CONTENT_TYPE) => {
            Some(ct.to_string())
        }
        _ => mime_guess::from_path(filename)
            .first()
            .map(|mime| mime.essence_str().to_string()),
    }
}

/// Writes uploads into a flat directory as `<uuid>_<sanitized name>`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    directory: PathBuf,
}

impl UploadStore {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn ensure_directory(&self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.directory).map_err(|e| StorageError::CreateDirectory {
            path: self.directory.clone(),
            source: e,
        })
    }

    pub fn save(
        &self,
        filename: &str,
        content_type: Option<&str>,
        content: &[u8],
    ) -> Result<StoredDocument, StorageError> {
        let safe_name = sanitize::sanitize_filename(filename)
            .ok_or_else(|| StorageError::InvalidFilename(filename.to_string()))?;

        self.ensure_directory()?;

        let path = self
            .directory
            .join(format!("{}_{}", uuid::Uuid::new_v4(), safe_name));

        // create_new: a uuid collision must never overwrite another job's file.
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| StorageError::WriteFile {
                path: path.clone(),
                source: e,
            })?;

        if let Err(e) = file.write_all(content) {
            drop(file);
            let _ = std::fs::remove_file(&path);
            return Err(StorageError::WriteFile { path, source: e });
        }

        log::debug!(
            "Stored upload {} ({} bytes)",
            sanitize::redact_path(&path),
            content.len()
        );

        Ok(StoredDocument {
            filename: filename.to_string(),
            path,
            declared_type: detect_content_type(filename, content_type),
            size: content.len() as u64,
        })
    }
}

/// Deletes a job's uploaded files when dropped, on every exit path.
///
/// Deletion failures are logged and never returned.
#[derive(Debug, Default)]
pub struct UploadCleanup {
    paths: Vec<PathBuf>,
}

impl UploadCleanup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn tracked(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Deletes tracked files now and returns how many were removed.
    pub fn run(&mut self) -> usize {
        let mut removed = 0;
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!(
                    "Failed to delete upload {}: {}",
                    sanitize::redact_path(&path),
                    e
                ),
            }
        }
        removed
    }
}

impl Drop for UploadCleanup {
    fn drop(&mut self) {
        if !self.paths.is_empty() {
            let removed = self.run();
            log::debug!("Cleaned up {} uploaded file(s)", removed);
        }
    }
}
