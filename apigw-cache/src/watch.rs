use std::collections::HashMap;

use apigw_core::{Resource, TypeUrl};

/// A state-of-the-world watch registration: the client's type URL, the
/// resource names it cares about (empty means everything of that type), and
/// the version it last acknowledged.
#[derive(Debug, Clone)]
pub struct WatchRequest {
    pub type_url: TypeUrl,
    pub resource_names: Vec<String>,
    pub known_version: String,
}

impl WatchRequest {
    pub fn all(type_url: TypeUrl) -> Self {
        Self { type_url, resource_names: Vec::new(), known_version: String::new() }
    }

    pub fn wants_all(&self) -> bool {
        self.resource_names.is_empty()
    }
}

/// An incremental watch registration. `initial_versions` is the client's
/// per-resource knowledge, echoed from a previous session.
#[derive(Debug, Clone)]
pub struct DeltaWatchRequest {
    pub type_url: TypeUrl,
    pub resource_names: Vec<String>,
    pub initial_versions: HashMap<String, String>,
}

impl Default for DeltaWatchRequest {
    fn default() -> Self {
        Self {
            // The empty URL is the startup wildcard; callers usually set it.
            type_url: TypeUrl::Unknown(String::new()),
            resource_names: Vec::new(),
            initial_versions: HashMap::new(),
        }
    }
}

impl DeltaWatchRequest {
    pub fn wants_all(&self) -> bool {
        self.resource_names.is_empty()
    }
}

/// A full state-of-the-world response for one type URL at one version.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub type_url: TypeUrl,
    pub version: String,
    pub resources: Vec<Resource>,
}

/// An incremental response: changed resources with their individual
/// versions, plus the names that disappeared.
#[derive(Debug, Clone)]
pub struct DeltaResponseEnvelope {
    pub type_url: TypeUrl,
    pub system_version: String,
    pub resources: Vec<(Resource, String)>,
    pub removed: Vec<String>,
}
