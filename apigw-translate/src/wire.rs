//! Wire documents: the canonical textual encoding carried inside the opaque
//! resource envelopes. Field order here fixes the byte encoding, so reorder
//! only with a version bump on the consumer side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use apigw_core::model::PolicySpec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub route_key: String,
    pub verb: String,
    pub path: String,
    pub auth_required: bool,
}

/// Routing document for one API, consumed by the proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfigDoc {
    pub api_id: String,
    pub name: String,
    pub version: String,
    pub context: String,
    pub backend_url: String,
    pub routes: Vec<RouteEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyChainEntry {
    pub route_key: String,
    pub api_id: String,
    pub policies: Vec<PolicySpec>,
}

/// Aggregate policy-chain document consumed by the policy engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyChainDoc {
    pub chains: Vec<PolicyChainEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    pub key_hash: String,
    pub api_id: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Aggregate API-key state document consumed by the policy engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyStateDoc {
    pub keys: Vec<ApiKeyEntry>,
}
