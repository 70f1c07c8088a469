use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identity and labels of this gateway instance, distributed so consumers
/// can tell which control plane they converged against. A single document;
/// the store holds at most one under [`GatewayMetadata::KEY`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GatewayMetadata {
    pub gateway_id: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl GatewayMetadata {
    pub const KEY: &'static str = "gateway-metadata";
}
