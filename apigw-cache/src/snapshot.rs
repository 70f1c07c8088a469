use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use apigw_core::{CorrelationId, Result};
use apigw_store::{Keyed, Store};
use apigw_telemetry::ControlPlaneMetrics;
use apigw_translate::Translator;

use crate::linear::LinearCache;

/// Owns one family's store, translator and linear cache, and turns the
/// current store contents into the cache's next snapshot.
///
/// `update_snapshot` is serialised per manager: callers queue on the update
/// lock, and the snapshot visible after a successful update reflects every
/// mutation committed before that update read the store. Running one update
/// per mutation keeps the ordering invariant without coalescing bookkeeping.
pub struct SnapshotManager<T: Keyed> {
    family: &'static str,
    store: Arc<Store<T>>,
    translator: Arc<dyn Translator<T>>,
    cache: Arc<LinearCache>,
    update_lock: Mutex<()>,
    metrics: Arc<ControlPlaneMetrics>,
}

impl<T: Keyed> SnapshotManager<T> {
    pub fn new(
        family: &'static str,
        store: Arc<Store<T>>,
        translator: Arc<dyn Translator<T>>,
        metrics: Arc<ControlPlaneMetrics>,
    ) -> Self {
        let cache = Arc::new(LinearCache::new(translator.type_url()));
        Self { family, store, translator, cache, update_lock: Mutex::new(()), metrics }
    }

    /// Re-translate the whole store and replace the cache contents
    /// atomically. Per-entity translation failures are logged and counted;
    /// the update proceeds with the remaining entities.
    pub async fn update_snapshot(&self, correlation_id: &CorrelationId) -> Result<i64> {
        let _serialised = self.update_lock.lock().await;
        let timer = self
            .metrics
            .snapshot_generation_duration_seconds
            .with_label_values(&[self.family])
            .start_timer();

        let items = self.store.get_all();
        let translation = self.translator.translate(&items);
        for failure in &translation.failures {
            warn!(
                family = self.family,
                entity = %failure.entity,
                correlation_id = %correlation_id,
                error = %failure.error,
                "translator skipped entity"
            );
            self.metrics
                .translation_errors_total
                .with_label_values(&[failure.error.category()])
                .inc();
        }

        let version = self.store.increment_version();
        let type_url = self.translator.type_url();
        let resources = translation.into_resource_map(&type_url);
        let resource_count = resources.len();
        self.cache.set_resources(resources)?;

        timer.observe_duration();
        self.metrics.snapshot_generation_total.with_label_values(&[self.family]).inc();
        info!(
            family = self.family,
            version,
            resources = resource_count,
            correlation_id = %correlation_id,
            "snapshot updated"
        );
        Ok(version)
    }

    /// Handle for the combined cache to register. Read-side only; mutation
    /// goes through `update_snapshot`.
    pub fn cache(&self) -> Arc<LinearCache> {
        self.cache.clone()
    }

    pub fn store(&self) -> Arc<Store<T>> {
        self.store.clone()
    }
}
