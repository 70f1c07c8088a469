use serde::{Deserialize, Serialize};

/// An upstream LLM provider routed through the gateway. `template` names the
/// [`LlmProviderTemplate`] that tells the proxy where token counts live in
/// the provider's response shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmProvider {
    pub name: String,
    pub api_base_url: String,
    pub template: String,
    #[serde(default)]
    pub auth_header: Option<String>,
    #[serde(default)]
    pub models: Vec<String>,
}

/// Extraction template for a provider family's response format. Paths are
/// dotted JSON paths evaluated by the proxy, e.g. `usage.prompt_tokens`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmProviderTemplate {
    pub name: String,
    pub model_path: String,
    pub prompt_tokens_path: String,
    pub completion_tokens_path: String,
    pub total_tokens_path: String,
}
