use std::sync::Arc;

use tracing::{info, warn};

use apigw_cache::SnapshotManager;
use apigw_core::model::Secret;
use apigw_core::{CorrelationId, Error, Result};
use apigw_store::SecretPersistence;

use crate::validate::require_name;

/// Writes to the secret family. Like certificates, secrets are durable and
/// hydrated from the persistence backend at start-up. Log records carry the
/// secret name only; values never leave the store.
pub struct SecretStateManager {
    store: Arc<apigw_store::SecretStore>,
    snapshots: Arc<SnapshotManager<Secret>>,
    persistence: Arc<dyn SecretPersistence>,
}

impl SecretStateManager {
    pub fn new(
        snapshots: Arc<SnapshotManager<Secret>>,
        persistence: Arc<dyn SecretPersistence>,
    ) -> Self {
        Self { store: snapshots.store(), snapshots, persistence }
    }

    pub async fn hydrate(&self, correlation_id: &CorrelationId) -> Result<i64> {
        let secrets = self.persistence.list_secrets().await?;
        info!(count = secrets.len(), correlation_id = %correlation_id, "hydrating secrets");
        for secret in secrets {
            self.store.set(secret);
        }
        self.snapshots.update_snapshot(correlation_id).await
    }

    pub async fn store_secret(&self, secret: Secret, correlation_id: &CorrelationId) -> Result<i64> {
        require_name("name", &secret.name)?;
        if secret.data.is_empty() {
            return Err(Error::validation("data", "secret has no data"));
        }
        self.persistence.save_secret(&secret).await?;
        info!(name = %secret.name, correlation_id = %correlation_id, "storing secret");
        self.store.set(secret);
        self.snapshots.update_snapshot(correlation_id).await
    }

    pub async fn remove_secret(&self, name: &str, correlation_id: &CorrelationId) -> Result<i64> {
        self.persistence.delete_secret(name).await?;
        if !self.store.delete(name) {
            warn!(name, correlation_id = %correlation_id, "removing absent secret");
        }
        self.snapshots.update_snapshot(correlation_id).await
    }
}
