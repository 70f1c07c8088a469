use apigw_core::model::{
    Api, ApiKey, Certificate, GatewayMetadata, LlmProvider, LlmProviderTemplate, McpProxy,
    PolicyConfig, Secret,
};

use crate::store::{Keyed, Store};

impl Keyed for Api {
    fn primary_key(&self) -> String {
        self.id.clone()
    }

    fn secondary_key(&self) -> Option<String> {
        Some(self.ref_key())
    }
}

impl Keyed for PolicyConfig {
    fn primary_key(&self) -> String {
        self.route_key.clone()
    }
}

impl Keyed for ApiKey {
    fn primary_key(&self) -> String {
        self.id.clone()
    }
}

impl Keyed for Certificate {
    fn primary_key(&self) -> String {
        self.name.clone()
    }
}

impl Keyed for LlmProvider {
    fn primary_key(&self) -> String {
        self.name.clone()
    }
}

impl Keyed for LlmProviderTemplate {
    fn primary_key(&self) -> String {
        self.name.clone()
    }
}

impl Keyed for McpProxy {
    fn primary_key(&self) -> String {
        self.id.clone()
    }

    fn secondary_key(&self) -> Option<String> {
        Some(self.ref_key())
    }
}

impl Keyed for Secret {
    fn primary_key(&self) -> String {
        self.name.clone()
    }
}

impl Keyed for GatewayMetadata {
    fn primary_key(&self) -> String {
        GatewayMetadata::KEY.to_string()
    }
}

pub type ApiStore = Store<Api>;
pub type PolicyStore = Store<PolicyConfig>;
pub type ApiKeyStore = Store<ApiKey>;
pub type CertificateStore = Store<Certificate>;
pub type LlmProviderStore = Store<LlmProvider>;
pub type LlmTemplateStore = Store<LlmProviderTemplate>;
pub type McpProxyStore = Store<McpProxy>;
pub type SecretStore = Store<Secret>;
pub type MetadataStore = Store<GatewayMetadata>;
