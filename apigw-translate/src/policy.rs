use apigw_core::model::PolicyConfig;
use apigw_core::{Resource, TypeUrl};

use crate::translator::{Translation, Translator};
use crate::wire::{PolicyChainDoc, PolicyChainEntry};

/// Chains per aggregate document. The policy engine ingests whole documents,
/// so the set is sharded once it outgrows a single comfortable payload.
const CHAINS_PER_DOC: usize = 500;

/// Emits the `PolicyChainConfig` aggregate: the full chain set packed into
/// documents with synthetic index names (`policy-1`, `policy-2`, …).
#[derive(Default)]
pub struct PolicyTranslator;

impl PolicyTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl Translator<PolicyConfig> for PolicyTranslator {
    fn type_url(&self) -> TypeUrl {
        TypeUrl::PolicyChainConfig
    }

    fn translate(&self, items: &[PolicyConfig]) -> Translation {
        let mut out = Translation::new();
        for (index, chunk) in items.chunks(CHAINS_PER_DOC).enumerate() {
            let doc = PolicyChainDoc {
                chains: chunk
                    .iter()
                    .map(|config| PolicyChainEntry {
                        route_key: config.route_key.clone(),
                        api_id: config.api_id.clone(),
                        policies: config.policies.clone(),
                    })
                    .collect(),
            };
            let name = format!("policy-{}", index + 1);
            match Resource::encode(&name, &self.type_url(), &doc) {
                Ok(resource) => out.push(self.type_url(), resource),
                Err(err) => out.fail(&name, err),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(route_key: &str) -> PolicyConfig {
        PolicyConfig { route_key: route_key.into(), api_id: "a1".into(), policies: Vec::new() }
    }

    #[test]
    fn test_empty_set_emits_no_documents() {
        let translation = PolicyTranslator::new().translate(&[]);
        assert!(translation.resources.get(&TypeUrl::PolicyChainConfig).is_none());
    }

    #[test]
    fn test_whole_set_lands_in_first_document() {
        let chains: Vec<PolicyConfig> =
            (0..3).map(|i| chain(&format!("GET:/orders/v1/{i}"))).collect();
        let translation = PolicyTranslator::new().translate(&chains);
        let resources = &translation.resources[&TypeUrl::PolicyChainConfig];
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].name, "policy-1");
        let doc: PolicyChainDoc = serde_json::from_slice(&resources[0].body.value).unwrap();
        assert_eq!(doc.chains.len(), 3);
    }

    #[test]
    fn test_large_set_shards_with_stable_names() {
        let chains: Vec<PolicyConfig> =
            (0..CHAINS_PER_DOC + 1).map(|i| chain(&format!("GET:/r/{i}"))).collect();
        let translation = PolicyTranslator::new().translate(&chains);
        let resources = &translation.resources[&TypeUrl::PolicyChainConfig];
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].name, "policy-1");
        assert_eq!(resources[1].name, "policy-2");
    }
}
