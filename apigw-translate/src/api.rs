use apigw_core::model::Api;
use apigw_core::{Error, Resource, TypeUrl};

use crate::translator::{Translation, Translator};
use crate::wire::{RouteConfigDoc, RouteEntry};

/// Emits one `RouteConfig` resource per deployed API, named by the API's id
/// so the name never changes across redeployments of the same API.
#[derive(Default)]
pub struct ApiTranslator;

impl ApiTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl Translator<Api> for ApiTranslator {
    fn type_url(&self) -> TypeUrl {
        TypeUrl::RouteConfig
    }

    fn translate(&self, items: &[Api]) -> Translation {
        let mut out = Translation::new();
        for api in items {
            if api.backend_url.is_empty() {
                out.fail(&api.id, Error::translation(&api.id, "api has no backend URL"));
                continue;
            }
            let doc = RouteConfigDoc {
                api_id: api.id.clone(),
                name: api.name.clone(),
                version: api.version.clone(),
                context: api.resolved_context(),
                backend_url: api.backend_url.clone(),
                routes: api
                    .operations
                    .iter()
                    .map(|op| RouteEntry {
                        route_key: api.route_key(op),
                        verb: op.verb.clone(),
                        path: op.path.clone(),
                        auth_required: op.auth_required,
                    })
                    .collect(),
            };
            match Resource::encode(&api.id, &self.type_url(), &doc) {
                Ok(resource) => out.push(self.type_url(), resource),
                Err(err) => out.fail(&api.id, err),
            }
        }
        out
    }
}
