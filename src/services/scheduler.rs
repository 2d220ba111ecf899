//! Bounded-concurrency task dispatch with fail-fast cancellation.

use crate::errors::DownloadError;
use std::{future::Future, sync::Arc};
use tokio::{
    sync::Semaphore,
    task::{JoinError, JoinSet},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Run `task` for every item with at most `max_concurrent` in flight
/// (`0` means no limit).
///
/// Items are dispatched in order, each at most once. The first failure
/// cancels the remaining work: nothing new is dispatched and in-flight tasks
/// stop at their next suspension point. Every spawned task is awaited before
/// returning, and the first failure is returned. Later failures are logged.
///
/// Returns the number of tasks that completed successfully.
pub async fn run_bounded<T, F, Fut>(
    items: Vec<T>,
    max_concurrent: usize,
    cancel: &CancellationToken,
    task: F,
) -> Result<usize, DownloadError>
where
    T: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<(), DownloadError>> + Send + 'static,
{
    let total = items.len();
    let cancel = cancel.child_token();
    let gate = (max_concurrent > 0).then(|| Arc::new(Semaphore::new(max_concurrent)));
    let mut tasks = JoinSet::new();
    let mut outcome = Outcome::default();

    for item in items {
        while let Some(joined) = tasks.try_join_next() {
            outcome.record(joined);
        }
        if outcome.failed() || cancel.is_cancelled() {
            break;
        }

        let permit = match &gate {
            Some(gate) => {
                let acquired = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    permit = Arc::clone(gate).acquire_owned() => permit,
                };
                match acquired {
                    Ok(permit) => Some(permit),
                    Err(_) => break,
                }
            }
            None => None,
        };

        let work = task(item);
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let _permit = permit;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(DownloadError::Cancelled),
                result = work => result,
            };
            if result.is_err() {
                cancel.cancel();
            }
            result
        });
    }

    debug!(in_flight = tasks.len(), "dispatch finished, draining");
    while let Some(joined) = tasks.join_next().await {
        outcome.record(joined);
    }

    match outcome.first_error {
        Some(err) => Err(err),
        None if outcome.completed < total => Err(DownloadError::Cancelled),
        None => Ok(outcome.completed),
    }
}

#[derive(Default)]
struct Outcome {
    completed: usize,
    first_error: Option<DownloadError>,
}

impl Outcome {
    fn failed(&self) -> bool {
        self.first_error.is_some()
    }

    fn record(&mut self, joined: Result<Result<(), DownloadError>, JoinError>) {
        let err = match joined {
            Ok(Ok(())) => {
                self.completed += 1;
                return;
            }
            Ok(Err(err)) => err,
            Err(join_err) => DownloadError::from(join_err),
        };

        // A sibling's cancellation can be reaped before the failure that
        // caused it, so a real error always displaces a cancellation.
        let replace = match &self.first_error {
            None => true,
            Some(first) => first.is_cancelled() && !err.is_cancelled(),
        };
        if replace {
            self.first_error = Some(err);
        } else if !err.is_cancelled() {
            warn!(error = ?err, "additional download failure");
        }
    }
}
