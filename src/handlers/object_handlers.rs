//! Per-object work run by the scheduler: download or dry-run one object.
//! Object bodies are streamed straight from the store into the sink.

use crate::{
    config::DownloadConfig,
    errors::DownloadError,
    models::object::ObjectInfo,
    services::{
        file_sink::{CopyError, FileSink},
        listing::Listing,
        path_mapper::{is_contained, map_path},
        storage_client::{StorageClient, StoreError},
    },
};
use std::path::PathBuf;
use tracing::debug;

/// Download `object` into the output directory and list it.
///
/// Returns the number of bytes written. The object's read stream is dropped
/// before returning on every path.
pub async fn download_object<C: StorageClient, S: FileSink>(
    client: &C,
    sink: &S,
    listing: &Listing,
    config: &DownloadConfig,
    object: &ObjectInfo,
) -> Result<u64, DownloadError> {
    let path = local_path(config, object)?;

    let content = client
        .open(&config.bucket, &object.name)
        .await
        .map_err(|source| DownloadError::Read {
            name: object.name.clone(),
            source,
        })?;

    let written = sink
        .copy_to_file(&path, content)
        .await
        .map_err(|err| match err {
            CopyError::ReadStream { source, .. } => DownloadError::Read {
                name: object.name.clone(),
                source: StoreError::Io(source),
            },
            other => DownloadError::Write {
                name: object.name.clone(),
                source: other,
            },
        })?;

    debug!(name = %object.name, path = %path.display(), written, "downloaded object");
    listing
        .record(&object.name, &path, written)
        .map_err(DownloadError::Listing)?;
    Ok(written)
}

/// List `object` as it would be downloaded, using its declared size.
pub fn dry_run_object(
    listing: &Listing,
    config: &DownloadConfig,
    object: &ObjectInfo,
) -> Result<(), DownloadError> {
    let path = local_path(config, object)?;
    listing
        .record(&object.name, &path, object.size)
        .map_err(DownloadError::Listing)
}

fn local_path(config: &DownloadConfig, object: &ObjectInfo) -> Result<PathBuf, DownloadError> {
    if !is_contained(&object.name, &config.prefix) {
        return Err(DownloadError::UnsafeObjectName {
            name: object.name.clone(),
        });
    }
    Ok(map_path(&object.name, &config.prefix, &config.output_dir))
}
