use derive_more::{AsRef, Deref, Display, From, Into};
use serde::{Deserialize, Serialize};

/// Request-scoped identifier attached to every mutation and propagated into
/// all log records and translator invocations it triggers. Never persisted.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Display, From, AsRef, Deref, Into, Serialize, Deserialize, Default,
)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Vendor prefix shared by every resource family served by this control plane.
pub const TYPE_URL_PREFIX: &str = "api-platform.wso2.org/v1";

/// The closed set of type URLs this control plane serves.
///
/// Unknown URLs are carried as a passthrough variant so they can be rejected
/// in one place (the combined-cache boundary) instead of at every call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeUrl {
    RouteConfig,
    PolicyChainConfig,
    ApiKeyState,
    Certificate,
    LlmProvider,
    LlmProviderTemplate,
    McpProxy,
    Secret,
    GatewayMetadata,
    /// A URL outside the known set. Kept verbatim so rejections can name it.
    Unknown(String),
}

impl TypeUrl {
    pub fn as_str(&self) -> &str {
        match self {
            TypeUrl::RouteConfig => "api-platform.wso2.org/v1.RouteConfig",
            TypeUrl::PolicyChainConfig => "api-platform.wso2.org/v1.PolicyChainConfig",
            TypeUrl::ApiKeyState => "api-platform.wso2.org/v1.APIKeyState",
            TypeUrl::Certificate => "api-platform.wso2.org/v1.Certificate",
            TypeUrl::LlmProvider => "api-platform.wso2.org/v1.LLMProvider",
            TypeUrl::LlmProviderTemplate => "api-platform.wso2.org/v1.LLMProviderTemplate",
            TypeUrl::McpProxy => "api-platform.wso2.org/v1.MCPProxy",
            TypeUrl::Secret => "api-platform.wso2.org/v1.Secret",
            TypeUrl::GatewayMetadata => "api-platform.wso2.org/v1.GatewayMetadata",
            TypeUrl::Unknown(url) => url.as_str(),
        }
    }

    pub fn parse(url: &str) -> Self {
        match url {
            "api-platform.wso2.org/v1.RouteConfig" => TypeUrl::RouteConfig,
            "api-platform.wso2.org/v1.PolicyChainConfig" => TypeUrl::PolicyChainConfig,
            "api-platform.wso2.org/v1.APIKeyState" => TypeUrl::ApiKeyState,
            "api-platform.wso2.org/v1.Certificate" => TypeUrl::Certificate,
            "api-platform.wso2.org/v1.LLMProvider" => TypeUrl::LlmProvider,
            "api-platform.wso2.org/v1.LLMProviderTemplate" => TypeUrl::LlmProviderTemplate,
            "api-platform.wso2.org/v1.MCPProxy" => TypeUrl::McpProxy,
            "api-platform.wso2.org/v1.Secret" => TypeUrl::Secret,
            "api-platform.wso2.org/v1.GatewayMetadata" => TypeUrl::GatewayMetadata,
            other => TypeUrl::Unknown(other.to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, TypeUrl::Unknown(_))
    }

    /// Every known type URL, in the fixed order used for fetch fallback and
    /// startup wildcard subscriptions.
    pub fn all_known() -> &'static [TypeUrl] {
        &[
            TypeUrl::RouteConfig,
            TypeUrl::PolicyChainConfig,
            TypeUrl::ApiKeyState,
            TypeUrl::Certificate,
            TypeUrl::LlmProvider,
            TypeUrl::LlmProviderTemplate,
            TypeUrl::McpProxy,
            TypeUrl::Secret,
            TypeUrl::GatewayMetadata,
        ]
    }
}

impl std::fmt::Display for TypeUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
