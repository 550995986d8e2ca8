//! Bounded fan-out over one batch of parents
//!
//! Every branch of a batch is driven concurrently on the caller's task and
//! gated by a shared semaphore. Branches own their results; aggregation only
//! happens after the join barrier, so nothing is shared mutably.

use futures::future::join_all;
use std::future::Future;
use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::error::HarborError;
use crate::model::{sort_batch, Ordered};
use crate::pagination::{PageSource, Paginator};

/// Result of one branch, labelled for logging
#[derive(Debug)]
pub struct BranchOutcome<T> {
    pub label: String,
    pub result: Result<Vec<T>, HarborError>,
}

/// Run one branch per item, at most `semaphore`'s permits at a time, and wait
/// for all of them.
pub async fn run_branches<I, T, L, F, Fut>(
    items: Vec<I>,
    semaphore: &Semaphore,
    label: L,
    branch: F,
) -> Vec<BranchOutcome<T>>
where
    L: Fn(&I) -> String,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<Vec<T>, HarborError>>,
{
    let branches = items.into_iter().map(|item| {
        let label = label(&item);
        let work = branch(item);
        async move {
            let result = match semaphore.acquire().await {
                Ok(_permit) => work.await,
                Err(_) => Err(HarborError::Other(
                    "Semaphore closed unexpectedly".to_string(),
                )),
            };
            BranchOutcome { label, result }
        }
    });

    join_all(branches).await
}

/// Concatenate successful branches, log failed ones, and sort the batch
pub fn merge_batch<T: Ordered>(outcomes: Vec<BranchOutcome<T>>, what: &str) -> Vec<T> {
    let mut merged = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(records) => merged.extend(records),
            Err(e) => {
                // Isolated: the branch contributes nothing, siblings carry on
                log_fetch_failure(&format!("{what} for {}", outcome.label), &e);
            }
        }
    }
    sort_batch(&mut merged);
    merged
}

/// Credential rejections are logged as errors, other failures as warnings
pub(crate) fn log_fetch_failure(what: &str, e: &HarborError) {
    if e.is_auth_failure() {
        error!("Harbor rejected the credentials while fetching {}: {}", what, e);
    } else {
        warn!("Failed to fetch {}: {}", what, e);
    }
}

/// Drain a paginator, keeping whatever was fetched before a failure
pub async fn drain_logged<S: PageSource>(
    mut paginator: Paginator<S>,
    what: &str,
) -> Vec<S::Record> {
    let mut records = Vec::new();
    while let Some(page) = paginator.next_page().await {
        match page {
            Ok(page) => records.extend(page.records),
            Err(e) => {
                log_fetch_failure(what, &e);
                warn!("Continuing with {} {} fetched so far", records.len(), what);
                break;
            }
        }
    }
    records
}
