use std::sync::Arc;

use tracing::info;

use apigw_cache::SnapshotManager;
use apigw_core::model::GatewayMetadata;
use apigw_core::{CorrelationId, Result};
use apigw_store::MetadataStore;

use crate::validate::require_name;

/// Writes the single gateway-metadata document.
pub struct MetadataStateManager {
    store: Arc<MetadataStore>,
    snapshots: Arc<SnapshotManager<GatewayMetadata>>,
}

impl MetadataStateManager {
    pub fn new(snapshots: Arc<SnapshotManager<GatewayMetadata>>) -> Self {
        Self { store: snapshots.store(), snapshots }
    }

    pub async fn store_metadata(
        &self,
        metadata: GatewayMetadata,
        correlation_id: &CorrelationId,
    ) -> Result<i64> {
        require_name("gateway_id", &metadata.gateway_id)?;
        info!(gateway_id = %metadata.gateway_id, correlation_id = %correlation_id, "storing gateway metadata");
        self.store.set(metadata);
        self.snapshots.update_snapshot(correlation_id).await
    }
}
