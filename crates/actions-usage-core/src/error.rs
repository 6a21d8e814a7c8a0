//! Error types for the aggregation pipeline.

use thiserror::Error;

use crate::api::ApiError;
use crate::model::RunStatusFilter;

/// Errors that abort a usage aggregation. No partial report is produced.
#[derive(Debug, Error)]
pub enum UsageError {
    /// Listing the organization's repositories failed.
    #[error("failed to list repositories of {organization}: {source}")]
    Enumeration {
        organization: String,
        #[source]
        source: ApiError,
    },

    /// Listing workflow runs failed after `retries` re-attempts.
    #[error("failed to list {status} runs of {repository} after {retries} retries: {source}")]
    RunFetch {
        repository: String,
        status: RunStatusFilter,
        retries: u32,
        #[source]
        source: ApiError,
    },

    /// Listing the jobs of a workflow run failed.
    #[error("failed to list jobs of run {run_id} in {repository}: {source}")]
    JobFetch {
        repository: String,
        run_id: u64,
        #[source]
        source: ApiError,
    },

    /// Fetching a workflow descriptor failed.
    #[error("failed to fetch workflow {workflow_url}: {source}")]
    MetadataFetch {
        workflow_url: String,
        #[source]
        source: ApiError,
    },
}

impl UsageError {
    /// The upstream failure behind this error.
    pub fn api_error(&self) -> &ApiError {
        match self {
            UsageError::Enumeration { source, .. }
            | UsageError::RunFetch { source, .. }
            | UsageError::JobFetch { source, .. }
            | UsageError::MetadataFetch { source, .. } => source,
        }
    }

    /// Whether the failure came from the caller cancelling the operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.api_error(), ApiError::Cancelled)
    }
}

/// Convenience result alias.
pub type UsageResult<T> = std::result::Result<T, UsageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_fetch_error_displays_repo_status_and_retries() {
        let err = UsageError::RunFetch {
            repository: "org/api".to_string(),
            status: RunStatusFilter::Queued,
            retries: 5,
            source: ApiError::Status {
                status: 503,
                url: "https://api.github.com/repos/org/api/actions/runs".to_string(),
                message: "Service Unavailable".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("org/api"));
        assert!(msg.contains("queued"));
        assert!(msg.contains("5 retries"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn test_cancelled_is_detected_through_any_variant() {
        let err = UsageError::MetadataFetch {
            workflow_url: "https://api.github.com/repos/o/r/actions/workflows/1".to_string(),
            source: ApiError::Cancelled,
        };
        assert!(err.is_cancelled());

        let err = UsageError::Enumeration {
            organization: "o".to_string(),
            source: ApiError::Transport("reset".to_string()),
        };
        assert!(!err.is_cancelled());
    }
}
