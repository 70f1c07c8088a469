use std::sync::Arc;

use tracing::{info, warn};

use apigw_cache::SnapshotManager;
use apigw_core::model::{Api, PolicyConfig};
use apigw_core::{CorrelationId, Result};
use apigw_store::PolicyStore;
use apigw_telemetry::ControlPlaneMetrics;

use crate::validate::require_name;

/// Writes to the policy-chain family. Chains arrive two ways: directly from
/// the admin API, and derived from API deployments via
/// [`PolicyStateManager::sync_api_chains`].
pub struct PolicyStateManager {
    store: Arc<PolicyStore>,
    snapshots: Arc<SnapshotManager<PolicyConfig>>,
    metrics: Arc<ControlPlaneMetrics>,
}

impl PolicyStateManager {
    pub fn new(snapshots: Arc<SnapshotManager<PolicyConfig>>, metrics: Arc<ControlPlaneMetrics>) -> Self {
        Self { store: snapshots.store(), snapshots, metrics }
    }

    pub async fn store_policy(
        &self,
        config: PolicyConfig,
        correlation_id: &CorrelationId,
    ) -> Result<i64> {
        require_name("route_key", &config.route_key)?;
        info!(route_key = %config.route_key, correlation_id = %correlation_id, "storing policy chain");
        self.store.set(config);
        self.update(correlation_id).await
    }

    pub async fn remove_policy(
        &self,
        route_key: &str,
        correlation_id: &CorrelationId,
    ) -> Result<i64> {
        if !self.store.delete(route_key) {
            warn!(route_key, correlation_id = %correlation_id, "removing absent policy chain");
        }
        self.update(correlation_id).await
    }

    /// Replace every chain belonging to `api` with chains derived from its
    /// current operations, in one snapshot update.
    pub async fn sync_api_chains(&self, api: &Api, correlation_id: &CorrelationId) -> Result<i64> {
        self.store.delete_where(|chain| chain.api_id == api.id);
        for chain in PolicyConfig::chains_for(api) {
            self.store.set(chain);
        }
        info!(api_id = %api.id, correlation_id = %correlation_id, "synchronised policy chains for api");
        self.update(correlation_id).await
    }

    /// Drop every chain owned by an undeployed API.
    pub async fn remove_by_parent(
        &self,
        api_id: &str,
        correlation_id: &CorrelationId,
    ) -> Result<i64> {
        let removed = self.store.delete_where(|chain| chain.api_id == api_id);
        info!(api_id, removed = removed.len(), correlation_id = %correlation_id, "removed policy chains for api");
        self.update(correlation_id).await
    }

    async fn update(&self, correlation_id: &CorrelationId) -> Result<i64> {
        let version = self.snapshots.update_snapshot(correlation_id).await?;
        self.metrics.policy_snapshot_updates_total.inc();
        Ok(version)
    }

    pub fn snapshots(&self) -> Arc<SnapshotManager<PolicyConfig>> {
        self.snapshots.clone()
    }
}
