//! Upstream Actions API abstraction.
//!
//! [`ActionsApi`] is the injectable data source for the whole pipeline.
//! [`crate::github::GitHubClient`] talks to the real REST API and
//! [`crate::fakes::FakeActionsApi`] serves scripted pages in tests.

use std::future::Future;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::model::{
    Page, PageRequest, Repository, RunStatusFilter, WorkflowDescriptor, WorkflowJob, WorkflowRun,
};

/// Failure of a single upstream call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server answered with a non-success status code.
    #[error("GET {url} returned {status}: {message}")]
    Status {
        status: u16,
        url: String,
        message: String,
    },

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The caller's cancellation token fired while the call was in flight.
    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    /// HTTP status code, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-side (5xx) failures are presumed recoverable by retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self.status(), Some(500..=599))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Result type for upstream calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Organization-scoped read access to GitHub Actions resources.
#[async_trait]
pub trait ActionsApi: Send + Sync {
    /// One page of the organization's repositories.
    async fn list_org_repositories(
        &self,
        org: &str,
        page: PageRequest,
    ) -> ApiResult<Page<Repository>>;

    /// One page of a repository's workflow runs with the given status.
    async fn list_workflow_runs(
        &self,
        repo_full_name: &str,
        status: RunStatusFilter,
        page: PageRequest,
    ) -> ApiResult<Page<WorkflowRun>>;

    /// One page of the jobs belonging to a workflow run.
    async fn list_run_jobs(
        &self,
        repo_full_name: &str,
        run_id: u64,
        page: PageRequest,
    ) -> ApiResult<Page<WorkflowJob>>;

    /// Fetch a workflow definition by its canonical resource URL.
    async fn get_workflow(&self, workflow_url: &str) -> ApiResult<WorkflowDescriptor>;
}

/// Race an upstream call against `cancel`.
///
/// When the token fires first the call future is dropped, aborting the
/// in-flight request, and [`ApiError::Cancelled`] is returned.
pub async fn cancellable<T, F>(cancel: &CancellationToken, call: F) -> ApiResult<T>
where
    F: Future<Output = ApiResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::Cancelled),
        result = call => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> ApiError {
        ApiError::Status {
            status: code,
            url: "https://api.github.com/orgs/o/repos".to_string(),
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_only_5xx_is_transient() {
        assert!(status(500).is_transient());
        assert!(status(503).is_transient());
        assert!(status(599).is_transient());
        assert!(!status(404).is_transient());
        assert!(!status(429).is_transient());
        assert!(!status(600).is_transient());
        assert!(!ApiError::Transport("connection reset".to_string()).is_transient());
        assert!(!ApiError::Cancelled.is_transient());
    }

    #[test]
    fn test_status_error_display_includes_code_and_url() {
        let msg = status(502).to_string();
        assert!(msg.contains("502"));
        assert!(msg.contains("/orgs/o/repos"));
    }

    #[tokio::test]
    async fn test_cancellable_passes_result_through() {
        let cancel = CancellationToken::new();
        let value = cancellable(&cancel, async { Ok::<_, ApiError>(42) }).await;
        assert_eq!(value, Ok(42));
    }

    #[tokio::test]
    async fn test_cancellable_aborts_pending_call() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: ApiResult<()> = cancellable(&cancel, std::future::pending()).await;
        assert_eq!(result, Err(ApiError::Cancelled));
    }
}
