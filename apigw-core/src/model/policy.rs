use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::api::Api;

/// One policy applied at a point in a chain, e.g. rate limiting or header
/// rewriting. Parameters stay stringly typed; the policy engine owns the
/// schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySpec {
    pub name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// The policy chain attached to a single route. Keyed by `route_key`;
/// `api_id` links back to the owning API so chains can be removed when the
/// API is undeployed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub route_key: String,
    pub api_id: String,
    #[serde(default)]
    pub policies: Vec<PolicySpec>,
}

impl PolicyConfig {
    /// Derive the per-route policy chains for a deployed API. Operations
    /// with no policies still get a chain entry so the policy engine learns
    /// the route exists (auth enforcement needs the route key).
    pub fn chains_for(api: &Api) -> Vec<PolicyConfig> {
        api.operations
            .iter()
            .map(|op| PolicyConfig {
                route_key: api.route_key(op),
                api_id: api.id.clone(),
                policies: op.policies.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ApiOperation, ApiType};

    #[test]
    fn test_chains_for_covers_every_operation() {
        let api = Api {
            id: "a1".into(),
            name: "orders".into(),
            version: "v2".into(),
            context: "/orders/$version".into(),
            api_type: ApiType::Rest,
            backend_url: "http://backend".into(),
            operations: vec![
                ApiOperation {
                    verb: "GET".into(),
                    path: "/list".into(),
                    policies: vec![PolicySpec { name: "rate-limit".into(), parameters: BTreeMap::new() }],
                    auth_required: true,
                },
                ApiOperation {
                    verb: "POST".into(),
                    path: "/create".into(),
                    policies: Vec::new(),
                    auth_required: true,
                },
            ],
            organization: None,
        };

        let chains = PolicyConfig::chains_for(&api);
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].route_key, "GET:/orders/v2/list");
        assert_eq!(chains[0].policies[0].name, "rate-limit");
        assert!(chains[1].policies.is_empty());
        assert!(chains.iter().all(|c| c.api_id == "a1"));
    }
}
