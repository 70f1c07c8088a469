use std::sync::Arc;

use tracing::{info, warn};

use apigw_cache::SnapshotManager;
use apigw_core::model::McpProxy;
use apigw_core::{CorrelationId, Result};
use apigw_store::McpProxyStore;

use crate::validate::{require_context, require_http_url, require_name, require_version};

pub struct McpProxyStateManager {
    store: Arc<McpProxyStore>,
    snapshots: Arc<SnapshotManager<McpProxy>>,
}

impl McpProxyStateManager {
    pub fn new(snapshots: Arc<SnapshotManager<McpProxy>>) -> Self {
        Self { store: snapshots.store(), snapshots }
    }

    pub async fn store_proxy(&self, proxy: McpProxy, correlation_id: &CorrelationId) -> Result<i64> {
        require_name("id", &proxy.id)?;
        require_name("name", &proxy.name)?;
        require_version(&proxy.version)?;
        require_context(&proxy.context)?;
        require_http_url("backend_url", &proxy.backend_url)?;
        info!(proxy_id = %proxy.id, name = %proxy.name, correlation_id = %correlation_id, "storing mcp proxy");
        self.store.set(proxy);
        self.snapshots.update_snapshot(correlation_id).await
    }

    pub async fn remove_proxy(&self, proxy_id: &str, correlation_id: &CorrelationId) -> Result<i64> {
        if !self.store.delete(proxy_id) {
            warn!(proxy_id, correlation_id = %correlation_id, "removing absent mcp proxy");
        }
        self.snapshots.update_snapshot(correlation_id).await
    }
}
