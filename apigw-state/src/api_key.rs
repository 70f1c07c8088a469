use std::sync::Arc;

use tracing::{info, warn};

use apigw_cache::SnapshotManager;
use apigw_core::model::{ApiKey, ApiKeyStatus};
use apigw_core::{CorrelationId, Error, Result};
use apigw_store::ApiKeyStore;

use crate::validate::require_name;

/// Writes to the API-key family. Revocation flips the status; the key falls
/// out of the distributed aggregate on the next snapshot and stays in the
/// store for audit.
pub struct ApiKeyStateManager {
    store: Arc<ApiKeyStore>,
    snapshots: Arc<SnapshotManager<ApiKey>>,
}

impl ApiKeyStateManager {
    pub fn new(snapshots: Arc<SnapshotManager<ApiKey>>) -> Self {
        Self { store: snapshots.store(), snapshots }
    }

    pub async fn store_key(&self, key: ApiKey, correlation_id: &CorrelationId) -> Result<i64> {
        require_name("id", &key.id)?;
        require_name("api_id", &key.api_id)?;
        require_name("key_hash", &key.key_hash)?;
        info!(key_id = %key.id, api_id = %key.api_id, correlation_id = %correlation_id, "storing api key");
        self.store.set(key);
        self.snapshots.update_snapshot(correlation_id).await
    }

    pub async fn revoke(&self, key_id: &str, correlation_id: &CorrelationId) -> Result<i64> {
        match self.store.get(key_id) {
            Some(mut key) => {
                key.status = ApiKeyStatus::Revoked;
                self.store.set(key);
                info!(key_id, correlation_id = %correlation_id, "revoked api key");
                self.snapshots.update_snapshot(correlation_id).await
            }
            None => Err(Error::validation("key_id", format!("unknown api key '{key_id}'"))),
        }
    }

    pub async fn remove_key(&self, key_id: &str, correlation_id: &CorrelationId) -> Result<i64> {
        if !self.store.delete(key_id) {
            warn!(key_id, correlation_id = %correlation_id, "removing absent api key");
        }
        self.snapshots.update_snapshot(correlation_id).await
    }

    /// Drop every key issued under an undeployed API.
    pub async fn remove_by_parent(
        &self,
        api_id: &str,
        correlation_id: &CorrelationId,
    ) -> Result<i64> {
        let removed = self.store.delete_where(|key| key.api_id == api_id);
        info!(api_id, removed = removed.len(), correlation_id = %correlation_id, "removed api keys for api");
        self.snapshots.update_snapshot(correlation_id).await
    }

    pub fn list_keys(&self, api_id: &str) -> Vec<ApiKey> {
        self.store.get_all().into_iter().filter(|key| key.api_id == api_id).collect()
    }
}
