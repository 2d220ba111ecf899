//! Runs one bulk download: connect to the store, collect
//! the batch, fan the per-object work out under the concurrency cap, and
//! close the client.

use super::{
    enumerator::collect_objects, file_sink::FileSink, listing::Listing, scheduler::run_bounded,
    storage_client::StorageClient,
};
use crate::{
    config::DownloadConfig,
    errors::DownloadError,
    handlers::object_handlers::{download_object, dry_run_object},
    models::object::ObjectInfo,
};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// What a successful run processed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub objects: usize,
    pub bytes: u64,
}

/// Shared state for every per-object task in a run.
pub struct DownloadService<C, S> {
    config: DownloadConfig,
    client: C,
    sink: S,
    listing: Listing,
    bytes_written: AtomicU64,
}

impl<C, S> DownloadService<C, S>
where
    C: StorageClient + 'static,
    S: FileSink + 'static,
{
    pub fn new(config: DownloadConfig, client: C, sink: S, listing: Listing) -> Self {
        Self {
            config,
            client,
            sink,
            listing,
            bytes_written: AtomicU64::new(0),
        }
    }

    /// Collect the batch and process every object in it.
    pub async fn run(self: &Arc<Self>, cancel: &CancellationToken) -> Result<RunSummary, DownloadError> {
        let cfg = &self.config;
        let objects = collect_objects(
            &self.client,
            &cfg.bucket,
            &cfg.prefix,
            cfg.max_objects,
            cancel,
        )
        .await?;

        if objects.is_empty() && cfg.not_found_is_error {
            return Err(DownloadError::NotFound);
        }

        info!(
            count = objects.len(),
            dry_run = cfg.dry_run,
            max_concurrent = cfg.max_concurrent,
            "processing objects"
        );

        let completed = run_bounded(objects, cfg.max_concurrent, cancel, |object| {
            let service = Arc::clone(self);
            async move { service.process(&object).await }
        })
        .await?;

        Ok(RunSummary {
            objects: completed,
            bytes: self.bytes_written.load(Ordering::Relaxed),
        })
    }

    async fn process(&self, object: &ObjectInfo) -> Result<(), DownloadError> {
        if self.config.dry_run {
            return dry_run_object(&self.listing, &self.config, object);
        }
        let written =
            download_object(&self.client, &self.sink, &self.listing, &self.config, object).await?;
        self.bytes_written.fetch_add(written, Ordering::Relaxed);
        Ok(())
    }
}

/// Connect `client`, run the download described by `config`, then close the
/// client whatever the outcome.
pub async fn execute<C, S>(
    config: DownloadConfig,
    mut client: C,
    sink: S,
    listing: Listing,
    cancel: &CancellationToken,
) -> Result<RunSummary, DownloadError>
where
    C: StorageClient + 'static,
    S: FileSink + 'static,
{
    client.connect().await.map_err(DownloadError::Connect)?;

    let service = Arc::new(DownloadService::new(config, client, sink, listing));
    let result = service.run(cancel).await;

    if let Err(err) = service.client.close() {
        warn!(error = %err, "failed to close storage client");
    }
    result
}
