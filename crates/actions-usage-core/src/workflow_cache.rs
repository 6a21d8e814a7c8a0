//! Memoized workflow descriptor lookups.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{cancellable, ActionsApi};
use crate::error::{UsageError, UsageResult};
use crate::model::WorkflowDescriptor;

/// Workflow descriptors keyed by their canonical resource URL.
///
/// Lives for one aggregation, never evicts, and is only ever touched
/// sequentially through `&mut self`. Failed fetches are not cached.
pub struct WorkflowMetadataCache {
    api: Arc<dyn ActionsApi>,
    entries: HashMap<String, WorkflowDescriptor>,
}

impl WorkflowMetadataCache {
    pub fn new(api: Arc<dyn ActionsApi>) -> Self {
        Self {
            api,
            entries: HashMap::new(),
        }
    }

    /// Return the descriptor for `workflow_url`, fetching it on first use.
    pub async fn resolve(
        &mut self,
        workflow_url: &str,
        cancel: &CancellationToken,
    ) -> UsageResult<WorkflowDescriptor> {
        if let Some(descriptor) = self.entries.get(workflow_url) {
            return Ok(descriptor.clone());
        }

        let descriptor = cancellable(cancel, self.api.get_workflow(workflow_url))
            .await
            .map_err(|source| UsageError::MetadataFetch {
                workflow_url: workflow_url.to_string(),
                source,
            })?;

        debug!(workflow_url, name = %descriptor.name, "Cached workflow descriptor");
        self.entries
            .insert(workflow_url.to_string(), descriptor.clone());
        Ok(descriptor)
    }

    /// Number of cached descriptors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{Endpoint, FakeActionsApi};

    const BUILD_URL: &str = "https://api.github.com/repos/acme/api/actions/workflows/11";

    #[tokio::test]
    async fn test_second_resolve_reuses_cached_value() {
        let api = Arc::new(FakeActionsApi::new());
        api.add_workflow(BUILD_URL, 11, "Build");
        let mut cache = WorkflowMetadataCache::new(api.clone());
        let cancel = CancellationToken::new();

        let first = cache.resolve(BUILD_URL, &cancel).await.unwrap();
        let second = cache.resolve(BUILD_URL, &cancel).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.name, "Build");
        assert_eq!(api.calls(Endpoint::Workflow), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_fetch_separately() {
        let api = Arc::new(FakeActionsApi::new());
        let deploy_url = "https://api.github.com/repos/acme/api/actions/workflows/12";
        api.add_workflow(BUILD_URL, 11, "Build");
        api.add_workflow(deploy_url, 12, "Deploy");
        let mut cache = WorkflowMetadataCache::new(api.clone());
        let cancel = CancellationToken::new();

        cache.resolve(BUILD_URL, &cancel).await.unwrap();
        let deploy = cache.resolve(deploy_url, &cancel).await.unwrap();

        assert_eq!(deploy.name, "Deploy");
        assert_eq!(api.calls(Endpoint::Workflow), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let api = Arc::new(FakeActionsApi::new());
        api.add_workflow(BUILD_URL, 11, "Build");
        api.fail_next(Endpoint::Workflow, FakeActionsApi::status_error(500));
        let mut cache = WorkflowMetadataCache::new(api.clone());
        let cancel = CancellationToken::new();

        let err = cache.resolve(BUILD_URL, &cancel).await.unwrap_err();
        assert!(matches!(err, UsageError::MetadataFetch { .. }));
        assert!(cache.is_empty());

        let descriptor = cache.resolve(BUILD_URL, &cancel).await.unwrap();
        assert_eq!(descriptor.name, "Build");
        assert_eq!(api.calls(Endpoint::Workflow), 2);
    }
}
