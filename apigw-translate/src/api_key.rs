use apigw_core::model::ApiKey;
use apigw_core::{Resource, TypeUrl};

use crate::translator::{Translation, Translator};
use crate::wire::{ApiKeyEntry, ApiKeyStateDoc};

const KEYS_PER_DOC: usize = 500;

/// Emits the `APIKeyState` aggregate: every active, unexpired key packed
/// into documents named `apikey-state-<n>`. Revoked and expired keys simply
/// fall out of the document, which is how revocation propagates.
#[derive(Default)]
pub struct ApiKeyTranslator;

impl ApiKeyTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl Translator<ApiKey> for ApiKeyTranslator {
    fn type_url(&self) -> TypeUrl {
        TypeUrl::ApiKeyState
    }

    fn translate(&self, items: &[ApiKey]) -> Translation {
        let mut out = Translation::new();
        let now = chrono::Utc::now();
        let active: Vec<&ApiKey> = items.iter().filter(|k| k.is_active(now)).collect();
        for (index, chunk) in active.chunks(KEYS_PER_DOC).enumerate() {
            let doc = ApiKeyStateDoc {
                keys: chunk
                    .iter()
                    .map(|key| ApiKeyEntry {
                        key_hash: key.key_hash.clone(),
                        api_id: key.api_id.clone(),
                        expires_at: key.expires_at,
                    })
                    .collect(),
            };
            let name = format!("apikey-state-{}", index + 1);
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
    use apigw_core::model::ApiKeyStatus;
    use chrono::{Duration, Utc};

    fn key(id: &str, status: ApiKeyStatus) -> ApiKey {
        ApiKey {
            id: id.into(),
            api_id: "api1".into(),
            name: id.into(),
            key_hash: format!("hash-{id}"),
            status,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_only_active_keys_are_aggregated() {
        let keys = vec![
            key("k1", ApiKeyStatus::Active),
            key("k2", ApiKeyStatus::Revoked),
            key("k3", ApiKeyStatus::Active),
        ];
        let translation = ApiKeyTranslator::new().translate(&keys);
        let resources = &translation.resources[&TypeUrl::ApiKeyState];
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].name, "apikey-state-1");
        let doc: ApiKeyStateDoc = serde_json::from_slice(&resources[0].body.value).unwrap();
        let hashes: Vec<&str> = doc.keys.iter().map(|k| k.key_hash.as_str()).collect();
        assert_eq!(hashes, vec!["hash-k1", "hash-k3"]);
    }

    #[test]
    fn test_expired_keys_fall_out() {
        let mut expired = key("k1", ApiKeyStatus::Active);
        expired.expires_at = Some(Utc::now() - Duration::hours(1));
        let translation = ApiKeyTranslator::new().translate(&[expired]);
        assert!(translation.resources.get(&TypeUrl::ApiKeyState).is_none());
    }
}
