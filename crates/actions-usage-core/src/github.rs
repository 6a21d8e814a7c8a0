//! GitHub REST client
//!
//! Implements [`ActionsApi`] over the GitHub v3 REST API using [`reqwest`].
//! Pagination follows the `Link` response header: the `page` query value of
//! the `rel="next"` target becomes the next request's page number.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LINK};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::api::{ActionsApi, ApiError, ApiResult};
use crate::model::{
    Page, PageRequest, Repository, RunStatusFilter, WorkflowDescriptor, WorkflowJob, WorkflowRun,
};

/// Public GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";

/// GitHub client configuration
#[derive(Clone)]
pub struct GitHubConfig {
    /// API base URL (GitHub Enterprise installs use `https://host/api/v3`)
    pub api_url: String,
    /// Bearer token (personal access token)
    pub token: String,
    /// Sent as the `User-Agent` header, which GitHub requires
    pub user_agent: String,
    /// Per-request timeout; `None` waits as long as the server takes
    pub timeout: Option<Duration>,
}

impl GitHubConfig {
    /// Config for the public API with the given token.
    pub fn new(token: &str) -> Self {
        GitHubConfig {
            api_url: DEFAULT_API_URL.to_string(),
            token: token.to_string(),
            user_agent: format!("actions-usage/{}", env!("CARGO_PKG_VERSION")),
            timeout: None,
        }
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Deserialize)]
struct RunsEnvelope {
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Deserialize)]
struct JobsEnvelope {
    jobs: Vec<WorkflowJob>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Authenticated GitHub Actions client
pub struct GitHubClient {
    config: GitHubConfig,
    http_client: reqwest::Client,
}

impl GitHubClient {
    /// Create a new client. Fails only if the TLS backend cannot be set up.
    pub fn new(config: GitHubConfig) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(API_VERSION),
        );

        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        Ok(GitHubClient {
            config,
            http_client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url, path.trim_start_matches('/'))
    }

    /// Resolve a resource URL that may be absolute or relative to the API root.
    fn resource_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            self.endpoint(url)
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> ApiResult<(T, Option<u32>)> {
        debug!(url, ?query, "GET");
        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.config.token)
            .query(query)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let next_page = response
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .and_then(next_page_from_link);
        let body = response.json::<T>().await?;
        Ok((body, next_page))
    }

    /// Turn a non-2xx response into [`ApiError::Status`], keeping GitHub's
    /// `message` field when the body carries one.
    async fn ensure_success(response: reqwest::Response) -> ApiResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or(body);

        Err(ApiError::Status {
            status: status.as_u16(),
            url,
            message,
        })
    }

    fn page_query(page: PageRequest) -> Vec<(&'static str, String)> {
        vec![
            ("per_page", page.per_page.to_string()),
            ("page", page.page.to_string()),
        ]
    }
}

#[async_trait]
impl ActionsApi for GitHubClient {
    async fn list_org_repositories(
        &self,
        org: &str,
        page: PageRequest,
    ) -> ApiResult<Page<Repository>> {
        let url = self.endpoint(&format!("orgs/{org}/repos"));
        let (items, next_page) = self.get(&url, &Self::page_query(page)).await?;
        Ok(Page { items, next_page })
    }

    async fn list_workflow_runs(
        &self,
        repo_full_name: &str,
        status: RunStatusFilter,
        page: PageRequest,
    ) -> ApiResult<Page<WorkflowRun>> {
        let url = self.endpoint(&format!("repos/{repo_full_name}/actions/runs"));
        let mut query = Self::page_query(page);
        query.push(("status", status.as_str().to_string()));
        let (envelope, next_page) = self.get::<RunsEnvelope>(&url, &query).await?;
        Ok(Page {
            items: envelope.workflow_runs,
            next_page,
        })
    }

    async fn list_run_jobs(
        &self,
        repo_full_name: &str,
        run_id: u64,
        page: PageRequest,
    ) -> ApiResult<Page<WorkflowJob>> {
        let url = self.endpoint(&format!(
            "repos/{repo_full_name}/actions/runs/{run_id}/jobs"
        ));
        let (envelope, next_page) = self
            .get::<JobsEnvelope>(&url, &Self::page_query(page))
            .await?;
        Ok(Page {
            items: envelope.jobs,
            next_page,
        })
    }

    async fn get_workflow(&self, workflow_url: &str) -> ApiResult<WorkflowDescriptor> {
        let url = self.resource_url(workflow_url);
        let (workflow, _) = self.get(&url, &[]).await?;
        Ok(workflow)
    }
}

/// Extract the next page number from a `Link` header.
///
/// Returns `None` when there is no `rel="next"` entry or its page is `0`.
pub fn next_page_from_link(header: &str) -> Option<u32> {
    header
        .split(',')
        .find_map(|entry| {
            let mut parts = entry.split(';');
            let target = parts.next()?.trim().strip_prefix('<')?.strip_suffix('>')?;
            if !parts.any(|p| p.trim() == r#"rel="next""#) {
                return None;
            }
            let url = Url::parse(target).ok()?;
            url.query_pairs()
                .find(|(key, _)| key == "page")
                .and_then(|(_, value)| value.parse::<u32>().ok())
        })
        .filter(|page| *page != 0)
}
