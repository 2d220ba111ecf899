use crate::services::{file_sink::CopyError, storage_client::StoreError};
use std::io;
use thiserror::Error;

/// Every way a download run can fail.
///
/// Each variant names the object or path involved; the underlying cause is
/// kept as the error source so `{:#}` formatting prints the full chain.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{0}")]
    Config(String),

    #[error("failed to create storage client")]
    Connect(#[source] StoreError),

    #[error("failed to get objects")]
    Enumeration(#[source] StoreError),

    #[error("failed to get objects: exceeded the maximum number of objects ({limit})")]
    OverLimit { limit: usize },

    #[error("no objects found")]
    NotFound,

    #[error("failed to read object {name}")]
    Read {
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("failed writing to file {name}")]
    Write {
        name: String,
        #[source]
        source: CopyError,
    },

    #[error("object {name} would be written outside the output directory")]
    UnsafeObjectName { name: String },

    #[error("failed to write listing")]
    Listing(#[source] io::Error),

    #[error("download cancelled")]
    Cancelled,

    #[error("download task failed")]
    Task(#[from] tokio::task::JoinError),
}

impl DownloadError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
