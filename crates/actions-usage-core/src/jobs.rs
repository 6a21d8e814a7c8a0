//! Per-run job tallies.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{cancellable, ActionsApi};
use crate::error::{UsageError, UsageResult};
use crate::model::{JobTally, PageRequest};

/// Counts the jobs of a workflow run by status.
pub struct JobAggregator {
    api: Arc<dyn ActionsApi>,
}

impl JobAggregator {
    pub fn new(api: Arc<dyn ActionsApi>) -> Self {
        Self { api }
    }

    /// Tally every job of `run_id` across all pages.
    ///
    /// Jobs in states other than queued, in progress or completed are
    /// skipped. Any page failure is returned as-is, without retry.
    pub async fn count_by_status(
        &self,
        repo_full_name: &str,
        run_id: u64,
        cancel: &CancellationToken,
    ) -> UsageResult<JobTally> {
        let mut tally = JobTally::default();
        let mut request = PageRequest::first();

        loop {
            let page = cancellable(cancel, self.api.list_run_jobs(repo_full_name, run_id, request))
                .await
                .map_err(|source| UsageError::JobFetch {
                    repository: repo_full_name.to_string(),
                    run_id,
                    source,
                })?;

            for job in &page.items {
                tally.record(job.status);
            }

            match page.next_page {
                Some(next) => request = request.at(next),
                None => break,
            }
        }

        debug!(repo = repo_full_name, run_id, ?tally, "Tallied jobs");
        Ok(tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::fakes::{Endpoint, FakeActionsApi};
    use crate::model::JobStatus;

    #[tokio::test]
    async fn test_tallies_jobs_across_pages() {
        let api = Arc::new(FakeActionsApi::new().with_page_size(3));
        api.add_jobs(
            42,
            &[
                JobStatus::Completed,
                JobStatus::Completed,
                JobStatus::InProgress,
                JobStatus::Queued,
                JobStatus::Queued,
                JobStatus::Completed,
                JobStatus::InProgress,
            ],
        );

        let tally = JobAggregator::new(api.clone())
            .count_by_status("acme/api", 42, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(tally, JobTally::new(2, 2, 3));
        assert_eq!(tally.total(), 7);
        assert_eq!(api.calls(Endpoint::Jobs), 3);
    }

    #[tokio::test]
    async fn test_unrecognized_statuses_count_nowhere() {
        let api = Arc::new(FakeActionsApi::new());
        api.add_jobs(7, &[JobStatus::Other, JobStatus::Completed, JobStatus::Other]);

        let tally = JobAggregator::new(api)
            .count_by_status("acme/api", 7, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(tally, JobTally::new(0, 0, 1));
    }

    #[tokio::test]
    async fn test_run_without_jobs_is_all_zero() {
        let api = Arc::new(FakeActionsApi::new());
        let tally = JobAggregator::new(api)
            .count_by_status("acme/api", 9, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(tally, JobTally::default());
    }

    #[tokio::test]
    async fn test_not_found_fails_without_retry() {
        let api = Arc::new(FakeActionsApi::new());
        api.add_jobs(42, &[JobStatus::Queued]);
        api.fail_next(Endpoint::Jobs, FakeActionsApi::status_error(404));

        let err = JobAggregator::new(api.clone())
            .count_by_status("acme/api", 42, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            UsageError::JobFetch {
                repository,
                run_id,
                source,
            } => {
                assert_eq!(repository, "acme/api");
                assert_eq!(run_id, 42);
                assert_eq!(source.status(), Some(404));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(api.calls(Endpoint::Jobs), 1);
    }

    #[tokio::test]
    async fn test_server_errors_are_not_retried_either() {
        let api = Arc::new(FakeActionsApi::new());
        api.fail_next(Endpoint::Jobs, FakeActionsApi::status_error(503));

        let err = JobAggregator::new(api.clone())
            .count_by_status("acme/api", 1, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err.api_error(),
            ApiError::Status { status: 503, .. }
        ));
        assert_eq!(api.calls(Endpoint::Jobs), 1);
    }
}
