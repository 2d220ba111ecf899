//! Collects the batch of objects to download.

use super::storage_client::StorageClient;
use crate::{errors::DownloadError, models::object::ObjectInfo};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Walk `bucket` under `prefix` and return every downloadable object.
///
/// Directory markers are skipped. With `max_objects > 0`, finding more than
/// `max_objects` objects aborts the walk with [`DownloadError::OverLimit`];
/// the batch is never silently truncated.
pub async fn collect_objects<C: StorageClient>(
    client: &C,
    bucket: &str,
    prefix: &str,
    max_objects: usize,
    cancel: &CancellationToken,
) -> Result<Vec<ObjectInfo>, DownloadError> {
    let mut objects = Vec::new();
    let mut walk = client.walk(bucket, prefix);

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            next = walk.next() => next,
        };
        let Some(object) = next else {
            break;
        };
        let object = object.map_err(DownloadError::Enumeration)?;

        if object.is_directory_marker() {
            debug!(name = %object.name, "skipping directory marker");
            continue;
        }

        objects.push(object);
        if max_objects > 0 && objects.len() > max_objects {
            return Err(DownloadError::OverLimit { limit: max_objects });
        }
    }

    debug!(count = objects.len(), bucket, prefix, "collected objects");
    Ok(objects)
}
