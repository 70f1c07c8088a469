//! Composition root: builds the stores, translators, snapshot managers,
//! combined cache and state managers into one control plane, ready for the
//! xDS server to serve.

use std::sync::Arc;

use prometheus::Registry;

use apigw_cache::{CombinedCache, DiscoveryCache, ResponseEnvelope, SnapshotManager};
use apigw_core::model::{
    Api, ApiKey, Certificate, GatewayMetadata, LlmProvider, LlmProviderTemplate, McpProxy,
    PolicyConfig, Secret,
};
use apigw_core::{CorrelationId, GatewayConfig, Result};
use apigw_state::{
    ApiKeyStateManager, ApiStateManager, CertificateStateManager, LlmProviderStateManager,
    LlmTemplateStateManager, McpProxyStateManager, MetadataStateManager, PolicyStateManager,
    SecretStateManager,
};
use apigw_store::{InMemoryPersistence, Store};
use apigw_telemetry::ControlPlaneMetrics;
use apigw_translate::{
    ApiKeyTranslator, ApiTranslator, CertificateTranslator, LlmProviderTranslator,
    LlmTemplateTranslator, McpProxyTranslator, MetadataTranslator, PolicyTranslator,
    SecretTranslator,
};
use apigw_xds::{AdsServer, Callbacks};

/// The assembled control plane: every state manager on the write side, the
/// combined cache on the read side, and the metric registry they share.
pub struct ControlPlane {
    pub config: GatewayConfig,
    pub registry: Registry,
    pub metrics: Arc<ControlPlaneMetrics>,
    pub cache: Arc<CombinedCache>,

    pub apis: Arc<ApiStateManager>,
    pub policies: Arc<PolicyStateManager>,
    pub api_keys: Arc<ApiKeyStateManager>,
    pub certificates: Arc<CertificateStateManager>,
    pub llm_providers: Arc<LlmProviderStateManager>,
    pub llm_templates: Arc<LlmTemplateStateManager>,
    pub mcp_proxies: Arc<McpProxyStateManager>,
    pub secrets: Arc<SecretStateManager>,
    pub metadata: Arc<MetadataStateManager>,

    api_snapshots: Arc<SnapshotManager<Api>>,
    policy_snapshots: Arc<SnapshotManager<PolicyConfig>>,
    api_key_snapshots: Arc<SnapshotManager<ApiKey>>,
    certificate_snapshots: Arc<SnapshotManager<Certificate>>,
    llm_provider_snapshots: Arc<SnapshotManager<LlmProvider>>,
    llm_template_snapshots: Arc<SnapshotManager<LlmProviderTemplate>>,
    mcp_snapshots: Arc<SnapshotManager<McpProxy>>,
    secret_snapshots: Arc<SnapshotManager<Secret>>,
    metadata_snapshots: Arc<SnapshotManager<GatewayMetadata>>,
}

impl ControlPlane {
    /// Wire every family. The persistence backend is selected by
    /// `config.storage`; the in-memory backend serves the `memory` type and
    /// stands in until the SQL backends are linked in by the storage wrapper.
    pub fn new(config: GatewayConfig) -> std::result::Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let metrics = ControlPlaneMetrics::new(&registry)?;
        let persistence = Arc::new(InMemoryPersistence::new());

        let api_snapshots = Arc::new(SnapshotManager::new(
            "api",
            Arc::new(Store::new()),
            Arc::new(ApiTranslator::new()),
            metrics.clone(),
        ));
        let policy_snapshots = Arc::new(SnapshotManager::new(
            "policy",
            Arc::new(Store::new()),
            Arc::new(PolicyTranslator::new()),
            metrics.clone(),
        ));
        let api_key_snapshots = Arc::new(SnapshotManager::new(
            "apikey",
            Arc::new(Store::new()),
            Arc::new(ApiKeyTranslator::new()),
            metrics.clone(),
        ));
        let certificate_snapshots = Arc::new(SnapshotManager::new(
            "certificate",
            Arc::new(Store::new()),
            Arc::new(CertificateTranslator::new()),
            metrics.clone(),
        ));
        let llm_provider_snapshots = Arc::new(SnapshotManager::new(
            "llm_provider",
            Arc::new(Store::new()),
            Arc::new(LlmProviderTranslator::new()),
            metrics.clone(),
        ));
        let llm_template_snapshots = Arc::new(SnapshotManager::new(
            "llm_template",
            Arc::new(Store::new()),
            Arc::new(LlmTemplateTranslator::new()),
            metrics.clone(),
        ));
        let mcp_snapshots = Arc::new(SnapshotManager::new(
            "mcp_proxy",
            Arc::new(Store::new()),
            Arc::new(McpProxyTranslator::new()),
            metrics.clone(),
        ));
        let secret_snapshots = Arc::new(SnapshotManager::new(
            "secret",
            Arc::new(Store::new()),
            Arc::new(SecretTranslator::new()),
            metrics.clone(),
        ));
        let metadata_snapshots = Arc::new(SnapshotManager::new(
            "metadata",
            Arc::new(Store::new()),
            Arc::new(MetadataTranslator::new()),
            metrics.clone(),
        ));

        let cache = Arc::new(CombinedCache::new(
            vec![
                api_snapshots.cache() as Arc<dyn DiscoveryCache>,
                policy_snapshots.cache(),
                api_key_snapshots.cache(),
                certificate_snapshots.cache(),
                llm_provider_snapshots.cache(),
                llm_template_snapshots.cache(),
                mcp_snapshots.cache(),
                secret_snapshots.cache(),
                metadata_snapshots.cache(),
            ],
            metrics.clone(),
        ));

        let policies = Arc::new(PolicyStateManager::new(policy_snapshots.clone(), metrics.clone()));
        Ok(Self {
            apis: Arc::new(ApiStateManager::new(api_snapshots.clone(), policies.clone())),
            policies,
            api_keys: Arc::new(ApiKeyStateManager::new(api_key_snapshots.clone())),
            certificates: Arc::new(CertificateStateManager::new(
                certificate_snapshots.clone(),
                persistence.clone(),
            )),
            llm_providers: Arc::new(LlmProviderStateManager::new(llm_provider_snapshots.clone())),
            llm_templates: Arc::new(LlmTemplateStateManager::new(llm_template_snapshots.clone())),
            mcp_proxies: Arc::new(McpProxyStateManager::new(mcp_snapshots.clone())),
            secrets: Arc::new(SecretStateManager::new(secret_snapshots.clone(), persistence)),
            metadata: Arc::new(MetadataStateManager::new(metadata_snapshots.clone())),
            config,
            registry,
            metrics,
            cache,
            api_snapshots,
            policy_snapshots,
            api_key_snapshots,
            certificate_snapshots,
            llm_provider_snapshots,
            llm_template_snapshots,
            mcp_snapshots,
            secret_snapshots,
            metadata_snapshots,
        })
    }

    /// Re-hydrate the durable families and publish a first snapshot for
    /// every family, so consumers connecting immediately after start see
    /// state instead of silence.
    pub async fn initial_sync(&self, correlation_id: &CorrelationId) -> Result<()> {
        self.certificates.hydrate(correlation_id).await?;
        self.secrets.hydrate(correlation_id).await?;
        self.api_snapshots.update_snapshot(correlation_id).await?;
        self.policy_snapshots.update_snapshot(correlation_id).await?;
        self.api_key_snapshots.update_snapshot(correlation_id).await?;
        self.llm_provider_snapshots.update_snapshot(correlation_id).await?;
        self.llm_template_snapshots.update_snapshot(correlation_id).await?;
        self.mcp_snapshots.update_snapshot(correlation_id).await?;
        self.metadata_snapshots.update_snapshot(correlation_id).await?;
        Ok(())
    }

    pub fn ads_server(&self, callbacks: Arc<dyn Callbacks>) -> AdsServer {
        AdsServer::new(self.cache.clone(), callbacks, self.metrics.clone())
    }

    /// Everything currently served, per type URL. Backs `/config_dump`.
    pub fn config_dump(&self) -> Vec<ResponseEnvelope> {
        self.cache.dump()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_control_plane_wires_every_family() {
        let plane = ControlPlane::new(GatewayConfig::default()).unwrap();
        plane.initial_sync(&CorrelationId::random()).await.unwrap();
        // Nine families, nine caches in the dump.
        assert_eq!(plane.config_dump().len(), 9);
    }
}
