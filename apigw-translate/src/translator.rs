use std::collections::HashMap;

use apigw_core::{Error, Resource, TypeUrl};

/// One entity the translator had to skip, kept for logging and the
/// `translation_errors_total` counter.
#[derive(Debug)]
pub struct TranslationFailure {
    pub entity: String,
    pub error: Error,
}

/// Result of translating a store snapshot: resources grouped by type URL in
/// input order, plus the entities that failed. The aggregate is returned
/// even when some items failed.
#[derive(Debug, Default)]
pub struct Translation {
    pub resources: HashMap<TypeUrl, Vec<Resource>>,
    pub failures: Vec<TranslationFailure>,
}

impl Translation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, type_url: TypeUrl, resource: Resource) {
        self.resources.entry(type_url).or_default().push(resource);
    }

    pub fn fail(&mut self, entity: impl Into<String>, error: Error) {
        self.failures.push(TranslationFailure { entity: entity.into(), error });
    }

    /// The resources produced for one type URL, as the `name → resource` map
    /// a linear cache replaces its contents with.
    pub fn into_resource_map(mut self, type_url: &TypeUrl) -> HashMap<String, Resource> {
        self.resources
            .remove(type_url)
            .unwrap_or_default()
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect()
    }
}

/// A pure translation from a family's entities to typed resources. `items`
/// arrives sorted by primary key (stores guarantee it), which together with
/// the canonical envelope encoding makes output deterministic.
pub trait Translator<T>: Send + Sync {
    /// The type URL this family is served under.
    fn type_url(&self) -> TypeUrl;

    fn translate(&self, items: &[T]) -> Translation;
}
