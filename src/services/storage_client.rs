//! The storage capability the downloader needs from a remote object store.
//!
//! `StorageClient` is the seam between the download pipeline and a concrete
//! backend: [`super::gcs_client::GcsClient`] in production, an in-memory
//! mock in tests.

use crate::models::object::ObjectInfo;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::{future::Future, io, num::ParseIntError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),
    #[error("storage request failed")]
    Http(#[from] reqwest::Error),
    #[error("invalid storage endpoint `{endpoint}`")]
    Endpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
    #[error("listing reported an invalid size for `{name}`")]
    InvalidSize {
        name: String,
        #[source]
        source: ParseIntError,
    },
    #[error("storage client is not connected")]
    NotConnected,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Lazily produced object listing. Dropping the stream ends the walk.
pub type ObjectInfoStream = BoxStream<'static, StoreResult<ObjectInfo>>;

/// Content of a single object. Owned by whoever opened it.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Read-only access to a remote object store.
///
/// Implementations are shared by every download task, so any per-bucket
/// caching they do must be internally synchronized.
pub trait StorageClient: Send + Sync {
    /// Initialize the client, preferring authenticated access and falling
    /// back to anonymous access when no credentials are available.
    fn connect(&mut self) -> impl Future<Output = StoreResult<()>> + Send;

    /// Enumerate objects in `bucket` whose names start with `prefix`.
    fn walk(&self, bucket: &str, prefix: &str) -> ObjectInfoStream;

    /// Open the content of `name` in `bucket` for streaming.
    fn open(&self, bucket: &str, name: &str) -> impl Future<Output = StoreResult<ByteStream>> + Send;

    /// Release cached connection state.
    fn close(&self) -> StoreResult<()>;
}
