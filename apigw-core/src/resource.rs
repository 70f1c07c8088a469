use envoy_types::pb::google::protobuf::Any;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::TypeUrl;

/// A typed resource ready to be served over xDS: a name stable across
/// versions plus an opaque envelope stamped with the family's type URL.
///
/// The envelope payload is the canonical JSON encoding of the family's wire
/// document. Consumers that index by name rely on the name never changing
/// for the same entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub body: Any,
}

impl Resource {
    /// Wrap `payload` in an envelope for `type_url`. Field order of the
    /// payload struct fixes the byte encoding, which keeps translation
    /// deterministic for a given input.
    pub fn encode<P: Serialize>(name: impl Into<String>, type_url: &TypeUrl, payload: &P) -> Result<Self> {
        let name = name.into();
        let value = serde_json::to_vec(payload)
            .map_err(|e| Error::translation(&name, format!("encoding failed: {e}")))?;
        Ok(Self { name, body: Any { type_url: type_url.as_str().to_string(), value } })
    }

    pub fn type_url(&self) -> TypeUrl {
        TypeUrl::parse(&self.body.type_url)
    }
}
