//! Bounded fan-out executor shared by all stages.
//!
//! Small batches run sequentially on the caller's task; larger batches are
//! spawned into a [`JoinSet`] gated by a [`Semaphore`] so at most
//! `max_workers` items are in flight. Results come back in completion order
//! on the concurrent path and in input order on the sequential path.
//! Counters, progress, and stats are the caller's business: the
//! `on_complete` hook fires on the orchestrating task as each item settles,
//! so callers never share mutable state with workers.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{ItemError, ItemResult};

/// Batches smaller than this skip the pool and run sequentially.
pub const SEQUENTIAL_THRESHOLD: usize = 10;

/// Runs `worker` over every item with at most `max_workers` in flight.
///
/// `on_complete` is invoked once per item, on the calling task, as each
/// result arrives. Per-item failures are values in the returned vector,
/// never early exits: one bad item cannot sink the batch. A worker task
/// that fails to complete at all is reported against a `None` item.
pub async fn fan_out<I, T, F, Fut, C>(
    items: Vec<I>,
    max_workers: usize,
    worker: F,
    mut on_complete: C,
) -> Vec<(Option<I>, ItemResult<T>)>
where
    I: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = ItemResult<T>> + Send + 'static,
    C: FnMut(Option<&I>, &ItemResult<T>),
{
    let total = items.len();
    let mut results = Vec::with_capacity(total);

    if total < SEQUENTIAL_THRESHOLD {
        debug!(total, "running batch sequentially");
        for item in items {
            let result = worker(item.clone()).await;
            on_complete(Some(&item), &result);
            results.push((Some(item), result));
        }
        return results;
    }

    debug!(total, max_workers, "running batch concurrently");
    let semaphore = Arc::new(Semaphore::new(max_workers));
    let mut tasks = JoinSet::new();

    for item in items {
        let permit_fut = Arc::clone(&semaphore).acquire_owned();
        let work = worker(item.clone());
        tasks.spawn(async move {
            let _permit = match permit_fut.await {
                Ok(permit) => permit,
                Err(_) => {
                    return (
                        item,
                        Err(ItemError::submission("worker pool semaphore closed")),
                    );
                }
            };
            (item, work.await)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (item, result) = match joined {
            Ok((item, result)) => (Some(item), result),
            Err(err) => {
                warn!(error = %err, "worker task failed to complete");
                (
                    None,
                    Err(ItemError::submission(format!("worker task failed: {err}"))),
                )
            }
        };
        on_complete(item.as_ref(), &result);
        results.push((item, result));
    }
    results
}
