use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A CA or server certificate distributed to the proxy for upstream TLS.
/// The content is PEM text; parsing and file loading happen outside the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Certificate {
    pub fn looks_like_pem(&self) -> bool {
        self.content.contains("-----BEGIN") && self.content.contains("-----END")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pem_detection() {
        let cert = Certificate {
            name: "ca".into(),
            content: "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n".into(),
            updated_at: None,
        };
        assert!(cert.looks_like_pem());

        let junk = Certificate { name: "ca".into(), content: "not a cert".into(), updated_at: None };
        assert!(!junk.looks_like_pem());
    }
}
