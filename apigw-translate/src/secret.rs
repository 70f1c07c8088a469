use apigw_core::model::Secret;
use apigw_core::{Error, Resource, TypeUrl};

use crate::translator::{Translation, Translator};

/// One `Secret` resource per secret, named by secret name. Secrets with no
/// data are reported and skipped.
#[derive(Default)]
pub struct SecretTranslator;

impl SecretTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl Translator<Secret> for SecretTranslator {
    fn type_url(&self) -> TypeUrl {
        TypeUrl::Secret
    }

    fn translate(&self, items: &[Secret]) -> Translation {
        let mut out = Translation::new();
        for secret in items {
            if secret.data.is_empty() {
                out.fail(&secret.name, Error::translation(&secret.name, "secret has no data"));
                continue;
            }
            match Resource::encode(&secret.name, &self.type_url(), secret) {
                Ok(resource) => out.push(self.type_url(), resource),
                Err(err) => out.fail(&secret.name, err),
            }
        }
        out
    }
}
