// # File State Store
//
// Flat-file implementation of StateStore.
//
// ## File Format
//
// The file holds only the dotted-quad, no trailing newline:
//
// ```text
// 203.0.113.5
// ```
//
// ## Reading
//
// - Missing file: `Absent`
// - First 15 characters, trailing whitespace stripped, checked as a dotted-quad
// - Anything else (including an unreadable file): `Malformed`
//
// ## Writing
//
// The save file itself is truncated and rewritten, so a symlinked save path
// keeps pointing at its target and only the file (not its directory) needs
// to be writable.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::Error;
use crate::ip::{MAX_DOTTED_QUAD_LEN, is_dotted_quad};
use crate::traits::state_store::{PersistedIp, StateStore};

/// Upper bound on bytes read from the save file (15 chars of up to 4 bytes)
const MAX_READ_BYTES: u64 = (MAX_DOTTED_QUAD_LEN * 4) as u64;

/// File-based state store
///
/// # Example
///
/// ```rust,no_run
/// use ipwatch_core::state::FileStateStore;
/// use ipwatch_core::traits::{PersistedIp, StateStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/lib/ipwatch/ip.txt");
///
///     store.write_current("203.0.113.5").await?;
///
///     let saved = store.read_previous().await;
///     assert_eq!(saved, PersistedIp::Valid("203.0.113.5".to_string()));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Create a store for the given save path
    ///
    /// Nothing is touched on disk until the first read or write.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read at most the first [`MAX_READ_BYTES`] bytes of the save file
    async fn read_head(&self) -> std::io::Result<Vec<u8>> {
        let file = fs::File::open(&self.path).await?;
        let mut head = Vec::with_capacity(MAX_READ_BYTES as usize);
        file.take(MAX_READ_BYTES).read_to_end(&mut head).await?;
        Ok(head)
    }

    fn write_error(&self, source: std::io::Error) -> Error {
        Error::Write {
            path: self.path.clone(),
            source,
        }
    }
}

/// Classify raw save-file bytes
fn classify(content: &[u8]) -> PersistedIp {
    let text = String::from_utf8_lossy(content);
    let head: String = text.chars().take(MAX_DOTTED_QUAD_LEN).collect();
    let candidate = head.trim_end();

    if is_dotted_quad(candidate) {
        PersistedIp::Valid(candidate.to_string())
    } else {
        PersistedIp::Malformed
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn read_previous(&self) -> PersistedIp {
        match fs::metadata(&self.path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                tracing::warn!(
                    "Save path {} is not a regular file, treating saved IP as malformed",
                    self.path.display()
                );
                return PersistedIp::Malformed;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Save file does not exist: {}", self.path.display());
                return PersistedIp::Absent;
            }
            Err(e) => {
                tracing::warn!(
                    "Cannot stat save file {}: {}. Treating saved IP as malformed",
                    self.path.display(),
                    e
                );
                return PersistedIp::Malformed;
            }
        }

        match self.read_head().await {
            Ok(content) => {
                let saved = classify(&content);
                if saved == PersistedIp::Malformed {
                    tracing::debug!("Save file {} holds no usable IP", self.path.display());
                }
                saved
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to read save file {}: {}. Treating saved IP as malformed",
                    self.path.display(),
                    e
                );
                PersistedIp::Malformed
            }
        }
    }

    async fn write_current(&self, ip: &str) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.write_error(e))?;
            }
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .await
            .map_err(|e| self.write_error(e))?;

        file.write_all(ip.as_bytes())
            .await
            .map_err(|e| self.write_error(e))?;
        file.flush().await.map_err(|e| self.write_error(e))?;

        tracing::trace!("Saved IP written to file: {}", self.path.display());
        Ok(())
    }
}
