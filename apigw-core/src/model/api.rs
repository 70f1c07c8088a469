use serde::{Deserialize, Serialize};

use super::policy::PolicySpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApiType {
    #[default]
    Rest,
    GraphQl,
    Grpc,
}

/// A single operation exposed by an API, e.g. `GET /{country}/{city}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiOperation {
    pub verb: String,
    pub path: String,
    #[serde(default)]
    pub policies: Vec<PolicySpec>,
    #[serde(default = "default_true")]
    pub auth_required: bool,
}

fn default_true() -> bool {
    true
}

/// A deployed API. The tuple `name:version:context` is unique per gateway
/// and is kept as a composite index next to the primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Api {
    pub id: String,
    pub name: String,
    pub version: String,
    /// Base path template; `$version` is substituted with the API version.
    pub context: String,
    #[serde(default)]
    pub api_type: ApiType,
    pub backend_url: String,
    #[serde(default)]
    pub operations: Vec<ApiOperation>,
    #[serde(default)]
    pub organization: Option<String>,
}

impl Api {
    /// Composite lookup key: `name:version:context`.
    pub fn ref_key(&self) -> String {
        format!("{}:{}:{}", self.name, self.version, self.context)
    }

    /// Context with the `$version` placeholder substituted.
    pub fn resolved_context(&self) -> String {
        self.context.replace("$version", &self.version)
    }

    /// Routing key for one operation, as matched by the proxy and the policy
    /// engine: `VERB:<resolved context><path>`.
    pub fn route_key(&self, operation: &ApiOperation) -> String {
        format!("{}:{}{}", operation.verb, self.resolved_context(), operation.path)
    }
}
