//! actions-usage core library
//!
//! Reports the live state of GitHub Actions workflow runs across every
//! repository of an organization: for each queued or in-progress run, how
//! many of its jobs are queued, running or completed.
//!
//! ## Pipeline
//!
//! - [`RepositoryEnumerator`] lists the organization's repositories
//! - [`RunCollector`] pages through runs per status, retrying 5xx failures
//! - [`WorkflowMetadataCache`] memoizes workflow descriptors
//! - [`JobAggregator`] tallies a run's jobs by status
//! - [`AggregationDriver`] ties them together into a [`UsageReport`]
//!
//! All upstream access goes through the [`ActionsApi`] trait;
//! [`GitHubClient`] is the REST implementation and [`fakes`] holds an
//! in-memory one for tests.

pub mod api;
pub mod driver;
pub mod error;
pub mod fakes;
pub mod github;
pub mod jobs;
pub mod model;
pub mod repos;
pub mod runs;
pub mod telemetry;
pub mod workflow_cache;

pub use api::{cancellable, ActionsApi, ApiError, ApiResult};
pub use driver::{AggregationDriver, Clock, NoProgress, Progress, ProgressSink};
pub use error::{UsageError, UsageResult};
pub use github::{GitHubClient, GitHubConfig, DEFAULT_API_URL};
pub use jobs::JobAggregator;
pub use model::{
    JobStatus, JobTally, Page, PageRequest, Repository, RunRow, RunStatusFilter, UsageReport,
    WorkflowDescriptor, WorkflowJob, WorkflowRun, PER_PAGE,
};
pub use repos::RepositoryEnumerator;
pub use runs::{Collected, RetryPolicy, RunCollectError, RunCollector};
pub use telemetry::init_tracing;
pub use tokio_util::sync::CancellationToken;
pub use workflow_cache::WorkflowMetadataCache;

/// actions-usage version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
