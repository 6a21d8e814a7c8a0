//! Organization repository discovery.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{cancellable, ActionsApi};
use crate::error::{UsageError, UsageResult};
use crate::model::{PageRequest, Repository};

/// Lists every repository owned by an organization, in upstream order.
pub struct RepositoryEnumerator {
    api: Arc<dyn ActionsApi>,
}

impl RepositoryEnumerator {
    pub fn new(api: Arc<dyn ActionsApi>) -> Self {
        Self { api }
    }

    /// Walk all pages of the organization's repository listing.
    ///
    /// The first failed request aborts enumeration; nothing is retried.
    pub async fn enumerate(
        &self,
        org: &str,
        cancel: &CancellationToken,
    ) -> UsageResult<Vec<Repository>> {
        let mut repos = Vec::new();
        let mut request = PageRequest::first();

        loop {
            let page = cancellable(cancel, self.api.list_org_repositories(org, request))
                .await
                .map_err(|source| UsageError::Enumeration {
                    organization: org.to_string(),
                    source,
                })?;

            debug!(org, page = request.page, count = page.items.len(), "Fetched repository page");
            repos.extend(page.items);

            match page.next_page {
                Some(next) => request = request.at(next),
                None => break,
            }
        }

        Ok(repos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::fakes::{Endpoint, FakeActionsApi};
    use assert_matches::assert_matches;

    fn org_with(count: usize) -> FakeActionsApi {
        let api = FakeActionsApi::new().with_page_size(2);
        for i in 0..count {
            api.add_repository("acme", &format!("repo-{i}"));
        }
        api
    }

    #[tokio::test]
    async fn test_enumerates_all_pages_in_order() {
        let api = Arc::new(org_with(5));
        let enumerator = RepositoryEnumerator::new(api.clone());

        let repos = enumerator
            .enumerate("acme", &CancellationToken::new())
            .await
            .unwrap();

        let names: Vec<_> = repos.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["acme/repo-0", "acme/repo-1", "acme/repo-2", "acme/repo-3", "acme/repo-4"]
        );
        // 2 + 2 + 1, and no request past the last page
        assert_eq!(api.calls(Endpoint::Repositories), 3);
    }

    #[tokio::test]
    async fn test_empty_org_issues_single_request() {
        let api = Arc::new(FakeActionsApi::new());
        let repos = RepositoryEnumerator::new(api.clone())
            .enumerate("ghost", &CancellationToken::new())
            .await
            .unwrap();
        assert!(repos.is_empty());
        assert_eq!(api.calls(Endpoint::Repositories), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let api = Arc::new(org_with(3));
        api.fail_next(Endpoint::Repositories, FakeActionsApi::status_error(502));

        let err = RepositoryEnumerator::new(api.clone())
            .enumerate("acme", &CancellationToken::new())
            .await
            .unwrap_err();

        assert_matches!(
            err,
            UsageError::Enumeration {
                ref organization,
                source: ApiError::Status { status: 502, .. },
            } if organization == "acme"
        );
        assert_eq!(api.calls(Endpoint::Repositories), 1);
    }
}
