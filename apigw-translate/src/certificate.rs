use apigw_core::model::Certificate;
use apigw_core::{Error, Resource, TypeUrl};

use crate::translator::{Translation, Translator};

/// One `Certificate` resource per stored certificate, named by certificate
/// name. Content that does not look like PEM is reported and skipped.
#[derive(Default)]
pub struct CertificateTranslator;

impl CertificateTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl Translator<Certificate> for CertificateTranslator {
    fn type_url(&self) -> TypeUrl {
        TypeUrl::Certificate
    }

    fn translate(&self, items: &[Certificate]) -> Translation {
        let mut out = Translation::new();
        for cert in items {
            if !cert.looks_like_pem() {
                out.fail(&cert.name, Error::translation(&cert.name, "content is not PEM"));
                continue;
            }
            match Resource::encode(&cert.name, &self.type_url(), cert) {
                Ok(resource) => out.push(self.type_url(), resource),
                Err(err) => out.fail(&cert.name, err),
            }
        }
        out
    }
}
