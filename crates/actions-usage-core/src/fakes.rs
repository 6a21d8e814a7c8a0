//! In-memory fake of the Actions API (testing only)
//!
//! [`FakeActionsApi`] serves repositories, runs, jobs and workflows from
//! maps and slices them into pages. Calls are counted per endpoint, and an
//! endpoint can be scripted to fail its next N calls or a given page.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::api::{ActionsApi, ApiError, ApiResult};
use crate::model::*;

/// Upstream operation, used to script failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Repositories,
    WorkflowRuns,
    Jobs,
    Workflow,
}

#[derive(Debug, Default)]
struct FakeState {
    repositories: HashMap<String, Vec<Repository>>,
    runs: HashMap<(String, RunStatusFilter), Vec<WorkflowRun>>,
    jobs: HashMap<u64, Vec<WorkflowJob>>,
    workflows: HashMap<String, WorkflowDescriptor>,
    failures: HashMap<Endpoint, VecDeque<ApiError>>,
    page_failures: HashMap<(Endpoint, u32), ApiError>,
    calls: HashMap<Endpoint, usize>,
    next_job_id: u64,
}

/// In-memory [`ActionsApi`] backed by `HashMap`s.
#[derive(Debug, Default)]
pub struct FakeActionsApi {
    state: Mutex<FakeState>,
    page_size: Option<usize>,
}

impl FakeActionsApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve pages of `size` items regardless of the requested page size.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size.max(1));
        self
    }

    /// A `Status` error with the given HTTP code.
    pub fn status_error(status: u16) -> ApiError {
        ApiError::Status {
            status,
            url: "https://api.github.com/fake".to_string(),
            message: format!("scripted {status}"),
        }
    }

    /// A run of `repo` with sensible defaults, created just now.
    pub fn workflow_run(repo: &Repository, id: u64, workflow_url: &str) -> WorkflowRun {
        WorkflowRun {
            id,
            name: Some(format!("run-{id}")),
            repository: repo.clone(),
            head_repository: Some(repo.clone()),
            head_branch: Some("main".to_string()),
            event: "push".to_string(),
            status: None,
            created_at: Utc::now(),
            workflow_url: workflow_url.to_string(),
        }
    }

    pub fn add_repository(&self, org: &str, name: &str) -> Repository {
        let repo = Repository::new(org, name);
        self.lock()
            .repositories
            .entry(org.to_string())
            .or_default()
            .push(repo.clone());
        repo
    }

    /// Register `run` under the listing for `status`.
    pub fn add_run(&self, status: RunStatusFilter, mut run: WorkflowRun) -> WorkflowRun {
        run.status = Some(status.as_str().to_string());
        self.lock()
            .runs
            .entry((run.repository.full_name.clone(), status))
            .or_default()
            .push(run.clone());
        run
    }

    /// Append one job per status to `run_id`.
    pub fn add_jobs(&self, run_id: u64, statuses: &[JobStatus]) {
        let mut state = self.lock();
        for status in statuses {
            state.next_job_id += 1;
            let job = WorkflowJob {
                id: state.next_job_id,
                name: format!("job-{}", state.next_job_id),
                status: *status,
            };
            state.jobs.entry(run_id).or_default().push(job);
        }
    }

    pub fn add_workflow(&self, workflow_url: &str, id: u64, name: &str) -> WorkflowDescriptor {
        let workflow = WorkflowDescriptor {
            id,
            name: name.to_string(),
            path: format!(".github/workflows/{id}.yml"),
            state: "active".to_string(),
        };
        self.lock()
            .workflows
            .insert(workflow_url.to_string(), workflow.clone());
        workflow
    }

    /// Fail the next call to `endpoint` with `error`.
    pub fn fail_next(&self, endpoint: Endpoint, error: ApiError) {
        self.fail_times(endpoint, 1, error);
    }

    /// Fail the next `times` calls to `endpoint` with `error`.
    pub fn fail_times(&self, endpoint: Endpoint, times: usize, error: ApiError) {
        let mut state = self.lock();
        let queue = state.failures.entry(endpoint).or_default();
        for _ in 0..times {
            queue.push_back(error.clone());
        }
    }

    /// Fail every request for `page` of `endpoint` with `error`.
    pub fn fail_on_page(&self, endpoint: Endpoint, page: u32, error: ApiError) {
        self.lock().page_failures.insert((endpoint, page), error);
    }

    /// Number of calls made to `endpoint` so far, failed ones included.
    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.lock().calls.get(&endpoint).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Count the call and return a scripted failure, if any.
    fn begin(&self, endpoint: Endpoint, page: u32) -> ApiResult<MutexGuard<'_, FakeState>> {
        let mut state = self.lock();
        *state.calls.entry(endpoint).or_default() += 1;
        if let Some(error) = state.failures.get_mut(&endpoint).and_then(|q| q.pop_front()) {
            return Err(error);
        }
        if let Some(error) = state.page_failures.get(&(endpoint, page)) {
            return Err(error.clone());
        }
        Ok(state)
    }

    fn paginate<T: Clone>(&self, items: &[T], request: PageRequest) -> Page<T> {
        let size = self
            .page_size
            .unwrap_or(request.per_page.max(1) as usize);
        let start = (request.page.max(1) as usize - 1) * size;
        let chunk: Vec<T> = items.iter().skip(start).take(size).cloned().collect();
        let next_page = if start + size < items.len() {
            Some(request.page.max(1) + 1)
        } else {
            None
        };
        Page {
            items: chunk,
            next_page,
        }
    }
}

#[async_trait]
impl ActionsApi for FakeActionsApi {
    async fn list_org_repositories(
        &self,
        org: &str,
        page: PageRequest,
    ) -> ApiResult<Page<Repository>> {
        let state = self.begin(Endpoint::Repositories, page.page)?;
        let repos = state.repositories.get(org).cloned().unwrap_or_default();
        Ok(self.paginate(&repos, page))
    }

    async fn list_workflow_runs(
        &self,
        repo_full_name: &str,
        status: RunStatusFilter,
        page: PageRequest,
    ) -> ApiResult<Page<WorkflowRun>> {
        let state = self.begin(Endpoint::WorkflowRuns, page.page)?;
        let runs = state
            .runs
            .get(&(repo_full_name.to_string(), status))
            .cloned()
            .unwrap_or_default();
        Ok(self.paginate(&runs, page))
    }

    async fn list_run_jobs(
        &self,
        _repo_full_name: &str,
        run_id: u64,
        page: PageRequest,
    ) -> ApiResult<Page<WorkflowJob>> {
        let state = self.begin(Endpoint::Jobs, page.page)?;
        let jobs = state.jobs.get(&run_id).cloned().unwrap_or_default();
        Ok(self.paginate(&jobs, page))
    }

    async fn get_workflow(&self, workflow_url: &str) -> ApiResult<WorkflowDescriptor> {
        let state = self.begin(Endpoint::Workflow, 0)?;
        state
            .workflows
            .get(workflow_url)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                url: workflow_url.to_string(),
                message: "Not Found".to_string(),
            })
    }
}
