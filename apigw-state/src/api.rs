use std::sync::Arc;

use tracing::{info, warn};

use apigw_cache::SnapshotManager;
use apigw_core::model::Api;
use apigw_core::{CorrelationId, Result};
use apigw_store::ApiStore;

use crate::policy::PolicyStateManager;
use crate::validate::{require_context, require_http_url, require_name, require_version};

/// Writes to the API family. Deploying an API also derives its per-route
/// policy chains through the policy manager, so the policy engine converges
/// on the new routes without a separate admin call.
pub struct ApiStateManager {
    store: Arc<ApiStore>,
    snapshots: Arc<SnapshotManager<Api>>,
    policies: Arc<PolicyStateManager>,
}

impl ApiStateManager {
    pub fn new(snapshots: Arc<SnapshotManager<Api>>, policies: Arc<PolicyStateManager>) -> Self {
        Self { store: snapshots.store(), snapshots, policies }
    }

    /// Deploy or redeploy an API.
    pub async fn store_api(&self, api: Api, correlation_id: &CorrelationId) -> Result<i64> {
        validate_api(&api)?;
        info!(
            api_id = %api.id,
            name = %api.name,
            version = %api.version,
            correlation_id = %correlation_id,
            "deploying api"
        );
        self.store.set(api.clone());
        let version = self.snapshots.update_snapshot(correlation_id).await?;
        self.policies.sync_api_chains(&api, correlation_id).await?;
        Ok(version)
    }

    /// Undeploy by id. Unknown ids succeed with a warning; the snapshot is
    /// refreshed either way.
    pub async fn remove_api(&self, api_id: &str, correlation_id: &CorrelationId) -> Result<i64> {
        if !self.store.delete(api_id) {
            warn!(api_id, correlation_id = %correlation_id, "removing absent api");
        }
        let version = self.snapshots.update_snapshot(correlation_id).await?;
        self.policies.remove_by_parent(api_id, correlation_id).await?;
        Ok(version)
    }

    pub fn get_api(&self, api_id: &str) -> Option<Api> {
        self.store.get(api_id)
    }

    /// Lookup by the `name:version:context` tuple.
    pub fn get_api_by_ref(&self, ref_key: &str) -> Option<Api> {
        self.store.get_by_ref(ref_key)
    }

    pub fn list_apis(&self) -> Vec<Api> {
        self.store.get_all()
    }
}

fn validate_api(api: &Api) -> Result<()> {
    require_name("id", &api.id)?;
    require_name("name", &api.name)?;
    require_version(&api.version)?;
    require_context(&api.context)?;
    require_http_url("backend_url", &api.backend_url)?;
    for operation in &api.operations {
        require_name("operation.verb", &operation.verb)?;
        if !operation.path.starts_with('/') {
            return Err(apigw_core::Error::validation(
                "operation.path",
                format!("'{}' must start with '/'", operation.path),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use apigw_core::model::{ApiOperation, ApiType};

    fn api() -> Api {
        Api {
            id: "a1".into(),
            name: "orders".into(),
            version: "v1.0".into(),
            context: "/orders/$version".into(),
            api_type: ApiType::Rest,
            backend_url: "http://orders.svc:8080".into(),
            operations: vec![ApiOperation {
                verb: "GET".into(),
                path: "/list".into(),
                policies: Vec::new(),
                auth_required: true,
            }],
            organization: None,
        }
    }

    #[test]
    fn test_valid_api_passes() {
        assert!(validate_api(&api()).is_ok());
    }

    #[test]
    fn test_rejects_bad_version() {
        let mut bad = api();
        bad.version = "release-candidate".into();
        assert!(validate_api(&bad).is_err());
    }

    #[test]
    fn test_rejects_relative_context_and_path() {
        let mut bad = api();
        bad.context = "orders".into();
        assert!(validate_api(&bad).is_err());

        let mut bad = api();
        bad.operations[0].path = "list".into();
        assert!(validate_api(&bad).is_err());
    }

    #[test]
    fn test_rejects_non_http_backend() {
        let mut bad = api();
        bad.backend_url = "tcp://orders".into();
        assert!(validate_api(&bad).is_err());
    }
}
