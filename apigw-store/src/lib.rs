//! In-memory, thread-safe, versioned stores, one per resource family, plus
//! the narrow persistence interface used to re-hydrate durable families at
//! start-up. Stores are authoritative at runtime; snapshots are always
//! rebuilt from a full store read, never from deltas.

mod families;
mod persist;
mod store;

pub use families::{
    ApiKeyStore, ApiStore, CertificateStore, LlmProviderStore, LlmTemplateStore, McpProxyStore,
    MetadataStore, PolicyStore, SecretStore,
};
pub use persist::{CertificatePersistence, InMemoryPersistence, SecretPersistence};
pub use store::{Keyed, Store};
