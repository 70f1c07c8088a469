use apigw_core::model::McpProxy;
use apigw_core::{Resource, TypeUrl};

use crate::translator::{Translation, Translator};

/// One `MCPProxy` resource per proxy, named by proxy id.
#[derive(Default)]
pub struct McpProxyTranslator;

impl McpProxyTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl Translator<McpProxy> for McpProxyTranslator {
    fn type_url(&self) -> TypeUrl {
        TypeUrl::McpProxy
    }

    fn translate(&self, items: &[McpProxy]) -> Translation {
        let mut out = Translation::new();
        for proxy in items {
            match Resource::encode(&proxy.id, &self.type_url(), proxy) {
                Ok(resource) => out.push(self.type_url(), resource),
                Err(err) => out.fail(&proxy.id, err),
            }
        }
        out
    }
}
