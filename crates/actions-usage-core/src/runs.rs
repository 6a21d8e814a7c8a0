//! Workflow run collection with retry on server-side failures.
//!
//! Every [`RunCollector::collect`] call owns a fresh retry budget. A page
//! request that fails with a 5xx status is re-issued until the budget is
//! spent; any other failure ends the call at once. The number of retries
//! actually taken is returned alongside the runs (or the error) so callers
//! can add them up without sharing a counter.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{cancellable, ActionsApi, ApiError};
use crate::model::{PageRequest, Repository, RunStatusFilter, WorkflowRun};

/// Retry budget for one collection call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of re-attempts after a transient failure.
    pub max_retries: u32,
    /// Pause before each re-attempt. Zero retries immediately.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_RETRIES: u32 = 5;

    /// Retry up to `max_retries` times with no delay.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Duration::ZERO,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::immediate(Self::DEFAULT_MAX_RETRIES)
    }
}

/// Runs gathered by a successful collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Collected {
    pub runs: Vec<WorkflowRun>,
    /// Transient failures that were retried along the way.
    pub retries: u32,
}

/// A collection that stopped on a non-retryable failure or an empty budget.
#[derive(Debug, Error)]
#[error("{source} (after {retries} retries)")]
pub struct RunCollectError {
    /// Runs from the pages fetched before the failure.
    pub partial: Vec<WorkflowRun>,
    pub retries: u32,
    #[source]
    pub source: ApiError,
}

/// Pages through one repository's workflow runs for a single status.
pub struct RunCollector {
    api: Arc<dyn ActionsApi>,
    policy: RetryPolicy,
}

impl RunCollector {
    pub fn new(api: Arc<dyn ActionsApi>, policy: RetryPolicy) -> Self {
        Self { api, policy }
    }

    /// Collect every run of `repository` currently in `status`.
    pub async fn collect(
        &self,
        repository: &Repository,
        status: RunStatusFilter,
        cancel: &CancellationToken,
    ) -> Result<Collected, RunCollectError> {
        let repo = repository.full_name.as_str();
        let mut runs = Vec::new();
        let mut retries = 0u32;
        let mut request = PageRequest::first();

        loop {
            let result =
                cancellable(cancel, self.api.list_workflow_runs(repo, status, request)).await;

            let page = match result {
                Ok(page) => page,
                Err(err) if err.is_transient() && retries < self.policy.max_retries => {
                    retries += 1;
                    warn!(
                        repo,
                        %status,
                        page = request.page,
                        attempt = retries,
                        error = %err,
                        "Transient failure listing runs, retrying"
                    );
                    if let Err(source) = self.pause(cancel).await {
                        return Err(RunCollectError {
                            partial: runs,
                            retries,
                            source,
                        });
                    }
                    continue;
                }
                Err(source) => {
                    return Err(RunCollectError {
                        partial: runs,
                        retries,
                        source,
                    })
                }
            };

            debug!(
                repo,
                %status,
                page = request.page,
                count = page.items.len(),
                "Fetched run page"
            );
            runs.extend(page.items);

            match page.next_page {
                Some(next) => request = request.at(next),
                None => break,
            }
        }

        Ok(Collected { runs, retries })
    }

    async fn pause(&self, cancel: &CancellationToken) -> Result<(), ApiError> {
        if self.policy.backoff.is_zero() {
            return Ok(());
        }
        let backoff = self.policy.backoff;
        cancellable(cancel, async move {
            tokio::time::sleep(backoff).await;
            Ok(())
        })
        .await
    }
}
