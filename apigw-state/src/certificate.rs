use std::sync::Arc;

use tracing::{info, warn};

use apigw_cache::SnapshotManager;
use apigw_core::model::Certificate;
use apigw_core::{CorrelationId, Error, Result};
use apigw_store::CertificatePersistence;

use crate::validate::require_name;

/// Writes to the certificate family. Certificates are durable: writes go
/// through the persistence interface first, then the in-memory store, then
/// the snapshot. At start-up [`CertificateStateManager::hydrate`] replays
/// the persisted set into the store.
pub struct CertificateStateManager {
    store: Arc<apigw_store::CertificateStore>,
    snapshots: Arc<SnapshotManager<Certificate>>,
    persistence: Arc<dyn CertificatePersistence>,
}

impl CertificateStateManager {
    pub fn new(
        snapshots: Arc<SnapshotManager<Certificate>>,
        persistence: Arc<dyn CertificatePersistence>,
    ) -> Self {
        Self { store: snapshots.store(), snapshots, persistence }
    }

    /// Seed the store from the persistence backend and publish the first
    /// snapshot.
    pub async fn hydrate(&self, correlation_id: &CorrelationId) -> Result<i64> {
        let certificates = self.persistence.list_certificates().await?;
        info!(count = certificates.len(), correlation_id = %correlation_id, "hydrating certificates");
        for certificate in certificates {
            self.store.set(certificate);
        }
        self.snapshots.update_snapshot(correlation_id).await
    }

    pub async fn store_certificate(
        &self,
        certificate: Certificate,
        correlation_id: &CorrelationId,
    ) -> Result<i64> {
        require_name("name", &certificate.name)?;
        if !certificate.looks_like_pem() {
            return Err(Error::validation("content", "certificate content is not PEM"));
        }
        self.persistence.save_certificate(&certificate).await?;
        info!(name = %certificate.name, correlation_id = %correlation_id, "storing certificate");
        self.store.set(certificate);
        self.snapshots.update_snapshot(correlation_id).await
    }

    pub async fn remove_certificate(
        &self,
        name: &str,
        correlation_id: &CorrelationId,
    ) -> Result<i64> {
        self.persistence.delete_certificate(name).await?;
        if !self.store.delete(name) {
            warn!(name, correlation_id = %correlation_id, "removing absent certificate");
        }
        self.snapshots.update_snapshot(correlation_id).await
    }
}
