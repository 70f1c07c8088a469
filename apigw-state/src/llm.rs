use std::sync::Arc;

use tracing::{info, warn};

use apigw_cache::SnapshotManager;
use apigw_core::model::{LlmProvider, LlmProviderTemplate};
use apigw_core::{CorrelationId, Result};
use apigw_store::{LlmProviderStore, LlmTemplateStore};

use crate::validate::{require_http_url, require_name};

pub struct LlmProviderStateManager {
    store: Arc<LlmProviderStore>,
    snapshots: Arc<SnapshotManager<LlmProvider>>,
}

impl LlmProviderStateManager {
    pub fn new(snapshots: Arc<SnapshotManager<LlmProvider>>) -> Self {
        Self { store: snapshots.store(), snapshots }
    }

    pub async fn store_provider(
        &self,
        provider: LlmProvider,
        correlation_id: &CorrelationId,
    ) -> Result<i64> {
        require_name("name", &provider.name)?;
        require_name("template", &provider.template)?;
        require_http_url("api_base_url", &provider.api_base_url)?;
        info!(name = %provider.name, correlation_id = %correlation_id, "storing llm provider");
        self.store.set(provider);
        self.snapshots.update_snapshot(correlation_id).await
    }

    pub async fn remove_provider(
        &self,
        name: &str,
        correlation_id: &CorrelationId,
    ) -> Result<i64> {
        if !self.store.delete(name) {
            warn!(name, correlation_id = %correlation_id, "removing absent llm provider");
        }
        self.snapshots.update_snapshot(correlation_id).await
    }
}

pub struct LlmTemplateStateManager {
    store: Arc<LlmTemplateStore>,
    snapshots: Arc<SnapshotManager<LlmProviderTemplate>>,
}

impl LlmTemplateStateManager {
    pub fn new(snapshots: Arc<SnapshotManager<LlmProviderTemplate>>) -> Self {
        Self { store: snapshots.store(), snapshots }
    }

    pub async fn store_template(
        &self,
        template: LlmProviderTemplate,
        correlation_id: &CorrelationId,
    ) -> Result<i64> {
        require_name("name", &template.name)?;
        require_name("prompt_tokens_path", &template.prompt_tokens_path)?;
        require_name("completion_tokens_path", &template.completion_tokens_path)?;
        info!(name = %template.name, correlation_id = %correlation_id, "storing llm provider template");
        self.store.set(template);
        self.snapshots.update_snapshot(correlation_id).await
    }

    pub async fn remove_template(
        &self,
        name: &str,
        correlation_id: &CorrelationId,
    ) -> Result<i64> {
        if !self.store.delete(name) {
            warn!(name, correlation_id = %correlation_id, "removing absent llm provider template");
        }
        self.snapshots.update_snapshot(correlation_id).await
    }
}
