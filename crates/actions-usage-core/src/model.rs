//! Upstream resource shapes and the structured report they are folded into.
//!
//! The upstream types deserialize straight from GitHub REST payloads and
//! ignore fields the pipeline does not read.

use std::ops::{Add, AddAssign};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Page size requested from every paginated listing.
pub const PER_PAGE: u32 = 100;

// ---------------------------------------------------------------------------
// Upstream resources
// ---------------------------------------------------------------------------

/// A repository owned by the organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Short name, e.g. `widgets`.
    pub name: String,
    /// Fully-qualified `owner/name`.
    pub full_name: String,
}

impl Repository {
    pub fn new(owner: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            full_name: format!("{owner}/{name}"),
        }
    }
}

/// Snapshot of one workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    pub repository: Repository,
    /// Absent when the head repository (usually a fork) was deleted.
    #[serde(default)]
    pub head_repository: Option<Repository>,
    #[serde(default)]
    pub head_branch: Option<String>,
    pub event: String,
    #[serde(default)]
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Canonical resource URL of the parent workflow.
    pub workflow_url: String,
}

impl WorkflowRun {
    /// `head-repository:head-branch`, with missing parts left empty.
    pub fn source(&self) -> String {
        let repo = self
            .head_repository
            .as_ref()
            .map(|r| r.full_name.as_str())
            .unwrap_or_default();
        let branch = self.head_branch.as_deref().unwrap_or_default();
        format!("{repo}:{branch}")
    }
}

/// Static metadata about a workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDescriptor {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub state: String,
}

/// Job lifecycle state as reported upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    /// `waiting`, `pending`, `requested` and anything newer.
    #[serde(other)]
    Other,
}

/// One unit of work inside a workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowJob {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub status: JobStatus,
}

/// Status filter applied to run listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatusFilter {
    InProgress,
    Queued,
}

impl RunStatusFilter {
    /// Order in which the driver collects runs for each repository.
    pub const SCAN_ORDER: [RunStatusFilter; 2] =
        [RunStatusFilter::InProgress, RunStatusFilter::Queued];

    /// Query-string value understood by the upstream API.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatusFilter::InProgress => "in_progress",
            RunStatusFilter::Queued => "queued",
        }
    }
}

impl std::fmt::Display for RunStatusFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Page coordinates for a listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn first() -> Self {
        Self {
            page: 1,
            per_page: PER_PAGE,
        }
    }

    pub fn at(self, page: u32) -> Self {
        Self { page, ..self }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first()
    }
}

/// One page of a listing plus the cursor to the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` when this is the last page.
    pub next_page: Option<u32>,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Per-status job counts for one run, or summed over many.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTally {
    pub queued: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl JobTally {
    pub fn new(queued: usize, in_progress: usize, completed: usize) -> Self {
        Self {
            queued,
            in_progress,
            completed,
        }
    }

    /// Count one job. Unrecognized statuses land in no bucket.
    pub fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Queued => self.queued += 1,
            JobStatus::InProgress => self.in_progress += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Other => {}
        }
    }

    pub fn total(&self) -> usize {
        self.queued + self.in_progress + self.completed
    }
}

impl Add for JobTally {
    type Output = JobTally;

    fn add(self, rhs: JobTally) -> JobTally {
        JobTally {
            queued: self.queued + rhs.queued,
            in_progress: self.in_progress + rhs.in_progress,
            completed: self.completed + rhs.completed,
        }
    }
}

impl AddAssign for JobTally {
    fn add_assign(&mut self, rhs: JobTally) {
        *self = *self + rhs;
    }
}

/// One line of the usage report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRow {
    /// 1-based position in the report.
    pub sequence: usize,
    pub run_id: u64,
    pub tally: JobTally,
    pub workflow_name: String,
    pub event: String,
    pub repository: String,
    /// Run age rounded to the nearest minute.
    pub age_minutes: i64,
    pub source: String,
}

/// Everything gathered for one organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    pub organization: String,
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<RunRow>,
    pub totals: JobTally,
}

impl UsageReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Whole minutes between `created_at` and `now`, rounded half away from zero.
///
/// Runs stamped in the future (clock skew) report an age of zero.
pub fn age_in_minutes(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (now - created_at).num_seconds();
    if seconds <= 0 {
        return 0;
    }
    (seconds + 30) / 60
}
