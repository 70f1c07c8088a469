use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A Model Context Protocol proxy fronting a tool server. Shares the
/// `name:version:context` uniqueness rule with APIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpProxy {
    pub id: String,
    pub name: String,
    pub version: String,
    pub context: String,
    pub backend_url: String,
    #[serde(default)]
    pub tools: Vec<McpTool>,
}

impl McpProxy {
    pub fn ref_key(&self) -> String {
        format!("{}:{}:{}", self.name, self.version, self.context)
    }
}
