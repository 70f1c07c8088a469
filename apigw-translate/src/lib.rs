//! Translators turn a store snapshot into the typed resources served over
//! xDS. They are pure: no I/O, no global state, deterministic for a given
//! input sequence. A failing entity is reported and skipped; the batch never
//! aborts.

mod translator;
mod wire;

mod api;
mod api_key;
mod certificate;
mod llm;
mod mcp;
mod metadata;
mod policy;
mod secret;

pub use api::ApiTranslator;
pub use api_key::ApiKeyTranslator;
pub use certificate::CertificateTranslator;
pub use llm::{LlmProviderTranslator, LlmTemplateTranslator};
pub use mcp::McpProxyTranslator;
pub use metadata::MetadataTranslator;
pub use policy::PolicyTranslator;
pub use secret::SecretTranslator;
pub use translator::{Translation, TranslationFailure, Translator};
pub use wire::{
    ApiKeyEntry, ApiKeyStateDoc, PolicyChainDoc, PolicyChainEntry, RouteConfigDoc, RouteEntry,
};
