use apigw_core::model::GatewayMetadata;
use apigw_core::{Resource, TypeUrl};

use crate::translator::{Translation, Translator};

/// Single `GatewayMetadata` document under a fixed name.
#[derive(Default)]
pub struct MetadataTranslator;

impl MetadataTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl Translator<GatewayMetadata> for MetadataTranslator {
    fn type_url(&self) -> TypeUrl {
        TypeUrl::GatewayMetadata
    }

    fn translate(&self, items: &[GatewayMetadata]) -> Translation {
        let mut out = Translation::new();
        for metadata in items {
            match Resource::encode(GatewayMetadata::KEY, &self.type_url(), metadata) {
                Ok(resource) => out.push(self.type_url(), resource),
                Err(err) => out.fail(GatewayMetadata::KEY, err),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_document_under_fixed_name() {
        let metadata = GatewayMetadata { gateway_id: "gw-east-1".into(), labels: Default::default() };
        let translation = MetadataTranslator::new().translate(&[metadata]);
        let resources = &translation.resources[&TypeUrl::GatewayMetadata];
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].name, GatewayMetadata::KEY);
    }
}
