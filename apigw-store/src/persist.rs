use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use apigw_core::Result;
use apigw_core::model::{Certificate, Secret};

/// Narrow persistence interface for certificates. The core neither defines
/// nor depends on the backend schema; the storage wrapper implements this
/// for whichever `GATEWAY_STORAGE_TYPE` is selected.
#[async_trait]
pub trait CertificatePersistence: Send + Sync {
    async fn save_certificate(&self, cert: &Certificate) -> Result<()>;
    async fn list_certificates(&self) -> Result<Vec<Certificate>>;
    async fn delete_certificate(&self, name: &str) -> Result<()>;
}

/// Analogous tuple for secrets.
#[async_trait]
pub trait SecretPersistence: Send + Sync {
    async fn save_secret(&self, secret: &Secret) -> Result<()>;
    async fn list_secrets(&self) -> Result<Vec<Secret>>;
    async fn delete_secret(&self, name: &str) -> Result<()>;
}

/// In-memory backend for the `memory` storage type and for tests. Nothing
/// survives a restart, which is the documented behaviour of that mode.
#[derive(Default)]
pub struct InMemoryPersistence {
    certificates: Mutex<BTreeMap<String, Certificate>>,
    secrets: Mutex<BTreeMap<String, Secret>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CertificatePersistence for InMemoryPersistence {
    async fn save_certificate(&self, cert: &Certificate) -> Result<()> {
        let mut certs = self.certificates.lock().unwrap_or_else(|e| e.into_inner());
        certs.insert(cert.name.clone(), cert.clone());
        Ok(())
    }

    async fn list_certificates(&self) -> Result<Vec<Certificate>> {
        let certs = self.certificates.lock().unwrap_or_else(|e| e.into_inner());
        Ok(certs.values().cloned().collect())
    }

    async fn delete_certificate(&self, name: &str) -> Result<()> {
        let mut certs = self.certificates.lock().unwrap_or_else(|e| e.into_inner());
        certs.remove(name);
        Ok(())
    }
}

#[async_trait]
impl SecretPersistence for InMemoryPersistence {
    async fn save_secret(&self, secret: &Secret) -> Result<()> {
        let mut secrets = self.secrets.lock().unwrap_or_else(|e| e.into_inner());
        secrets.insert(secret.name.clone(), secret.clone());
        Ok(())
    }

    async fn list_secrets(&self) -> Result<Vec<Secret>> {
        let secrets = self.secrets.lock().unwrap_or_else(|e| e.into_inner());
        Ok(secrets.values().cloned().collect())
    }

    async fn delete_secret(&self, name: &str) -> Result<()> {
        let mut secrets = self.secrets.lock().unwrap_or_else(|e| e.into_inner());
        secrets.remove(name);
        Ok(())
    }
}
