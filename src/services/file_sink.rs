//! Writes streamed object content to local files.

use super::storage_client::ByteStream;
use futures::StreamExt;
use std::{
    future::Future,
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{DirBuilder, File},
    io::AsyncWriteExt,
    sync::Mutex,
};

/// Permissions for directories created beneath the output root.
#[cfg(unix)]
const DIR_MODE: u32 = 0o755;

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("failed to create directory {}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to create file {}", .path.display())]
    CreateFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed writing to file {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed reading object content for {}", .path.display())]
    ReadStream {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Destination for downloaded object content.
pub trait FileSink: Send + Sync {
    /// Stream `content` into the file at `path`, creating missing parent
    /// directories. Returns the number of bytes written.
    fn copy_to_file(
        &self,
        path: &Path,
        content: ByteStream,
    ) -> impl Future<Output = Result<u64, CopyError>> + Send;
}

/// Writes to the local filesystem.
///
/// Directory creation is serialized across all concurrent callers of one
/// sink, so overlapping trees are only ever built by a single task at a time.
#[derive(Debug, Default)]
pub struct OsFileSink {
    dir_lock: Mutex<()>,
}

impl OsFileSink {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_parent_dirs(&self, dir: &Path) -> io::Result<()> {
        let _guard = self.dir_lock.lock().await;
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(DIR_MODE);
        builder.create(dir).await
    }
}

impl FileSink for OsFileSink {
    async fn copy_to_file(&self, path: &Path, mut content: ByteStream) -> Result<u64, CopyError> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            self.create_parent_dirs(dir)
                .await
                .map_err(|source| CopyError::CreateDir {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let mut file = File::create(path)
            .await
            .map_err(|source| CopyError::CreateFile {
                path: path.to_path_buf(),
                source,
            })?;
        let write_err = |source| CopyError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut written: u64 = 0;
        while let Some(chunk) = content.next().await {
            let chunk = chunk.map_err(|source| CopyError::ReadStream {
                path: path.to_path_buf(),
                source,
            })?;
            file.write_all(&chunk).await.map_err(write_err)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(write_err)?;

        Ok(written)
    }
}
