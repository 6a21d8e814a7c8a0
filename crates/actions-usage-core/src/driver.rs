//! Organization-wide aggregation.
//!
//! [`AggregationDriver`] runs the pipeline in two sequential phases:
//!
//! 1. **Scan** every repository for `in_progress` then `queued` runs.
//! 2. **Analyze** each collected run: resolve its workflow through the
//!    cache, tally its jobs and fold the tally into the totals.
//!
//! Progress is reported through a [`ProgressSink`] so the caller decides
//! how (or whether) to render it. Any failure aborts the whole run and no
//! report is returned.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::ActionsApi;
use crate::error::{UsageError, UsageResult};
use crate::jobs::JobAggregator;
use crate::model::{
    age_in_minutes, JobTally, Repository, RunRow, RunStatusFilter, UsageReport, WorkflowRun,
};
use crate::repos::RepositoryEnumerator;
use crate::runs::{RetryPolicy, RunCollector};
use crate::workflow_cache::WorkflowMetadataCache;

/// Milestones emitted while the pipeline runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Repositories are known; the scan phase begins.
    ScanStarted {
        organization: String,
        repositories: usize,
    },
    /// Both status listings of one repository were fetched.
    RepositoryScanned { repository: String, retries: u32 },
    /// All runs are collected; the analysis phase begins.
    AnalysisStarted { runs: usize },
    /// One run was tallied.
    RunAnalyzed { sequence: usize, run_id: u64 },
}

/// Receives [`Progress`] events.
pub trait ProgressSink {
    fn report(&mut self, event: Progress);
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _event: Progress) {}
}

impl ProgressSink for Vec<Progress> {
    fn report(&mut self, event: Progress) {
        self.push(event);
    }
}

/// Source of "now" for run ages.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Drives enumeration, collection and analysis for one organization.
pub struct AggregationDriver {
    enumerator: RepositoryEnumerator,
    collector: RunCollector,
    jobs: JobAggregator,
    cache: WorkflowMetadataCache,
    cancel: CancellationToken,
    clock: Clock,
}

impl AggregationDriver {
    pub fn new(api: Arc<dyn ActionsApi>, policy: RetryPolicy) -> Self {
        Self {
            enumerator: RepositoryEnumerator::new(Arc::clone(&api)),
            collector: RunCollector::new(Arc::clone(&api), policy),
            jobs: JobAggregator::new(Arc::clone(&api)),
            cache: WorkflowMetadataCache::new(api),
            cancel: CancellationToken::new(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Abort in-flight upstream calls when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn cache(&self) -> &WorkflowMetadataCache {
        &self.cache
    }

    /// Build the full usage report for `org`.
    pub async fn run(
        &mut self,
        org: &str,
        progress: &mut dyn ProgressSink,
    ) -> UsageResult<UsageReport> {
        let repositories = self.enumerator.enumerate(org, &self.cancel).await?;
        info!(org, repositories = repositories.len(), "Enumerated repositories");
        progress.report(Progress::ScanStarted {
            organization: org.to_string(),
            repositories: repositories.len(),
        });

        let runs = self.collect_runs(&repositories, progress).await?;
        info!(org, runs = runs.len(), "Collected active workflow runs");
        progress.report(Progress::AnalysisStarted { runs: runs.len() });

        let (rows, totals) = self.analyze_runs(&runs, progress).await?;
        let generated_at = (self.clock)();
        info!(
            org,
            queued = totals.queued,
            in_progress = totals.in_progress,
            completed = totals.completed,
            "Aggregated job usage"
        );

        Ok(UsageReport {
            organization: org.to_string(),
            generated_at,
            rows,
            totals,
        })
    }

    /// Collect `in_progress` then `queued` runs of every repository, in order.
    pub async fn collect_runs(
        &self,
        repositories: &[Repository],
        progress: &mut dyn ProgressSink,
    ) -> UsageResult<Vec<WorkflowRun>> {
        let mut all_runs = Vec::new();

        for repository in repositories {
            let mut retries = 0u32;
            for status in RunStatusFilter::SCAN_ORDER {
                match self.collector.collect(repository, status, &self.cancel).await {
                    Ok(collected) => {
                        retries += collected.retries;
                        all_runs.extend(collected.runs);
                    }
                    Err(err) => {
                        progress.report(Progress::RepositoryScanned {
                            repository: repository.full_name.clone(),
                            retries: retries + err.retries,
                        });
                        return Err(UsageError::RunFetch {
                            repository: repository.full_name.clone(),
                            status,
                            retries: err.retries,
                            source: err.source,
                        });
                    }
                }
            }

            debug!(repo = %repository.full_name, retries, "Scanned repository");
            progress.report(Progress::RepositoryScanned {
                repository: repository.full_name.clone(),
                retries,
            });
        }

        Ok(all_runs)
    }

    /// Tally each run's jobs and build its report row. A run's age is read
    /// from the clock once its jobs are tallied.
    pub async fn analyze_runs(
        &mut self,
        runs: &[WorkflowRun],
        progress: &mut dyn ProgressSink,
    ) -> UsageResult<(Vec<RunRow>, JobTally)> {
        let mut rows = Vec::with_capacity(runs.len());
        let mut totals = JobTally::default();

        for (index, run) in runs.iter().enumerate() {
            let workflow = self.cache.resolve(&run.workflow_url, &self.cancel).await?;
            let tally = self
                .jobs
                .count_by_status(&run.repository.full_name, run.id, &self.cancel)
                .await?;
            totals += tally;

            let sequence = index + 1;
            rows.push(RunRow {
                sequence,
                run_id: run.id,
                tally,
                workflow_name: workflow.name,
                event: run.event.clone(),
                repository: run.repository.name.clone(),
                age_minutes: age_in_minutes(run.created_at, (self.clock)()),
                source: run.source(),
            });
            progress.report(Progress::RunAnalyzed {
                sequence,
                run_id: run.id,
            });
        }

        Ok((rows, totals))
    }
}
