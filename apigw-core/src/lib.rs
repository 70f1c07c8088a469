//! Core types shared by every crate of the gateway control plane: the domain
//! model, the resource envelope streamed over xDS, the closed set of type
//! URLs, the error taxonomy, and the environment-driven configuration.

pub mod config;
pub mod error;
pub mod model;
pub mod resource;
pub mod types;

pub use config::{GatewayConfig, StorageType};
pub use error::{Error, Result};
pub use resource::Resource;
pub use types::{CorrelationId, TypeUrl};
