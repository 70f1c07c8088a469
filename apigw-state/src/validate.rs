use std::sync::OnceLock;

use regex::Regex;

use apigw_core::{Error, Result};

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^v?\d+(\.\d+)*$").unwrap())
}

pub(crate) fn require_name(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(field, "must not be empty"));
    }
    Ok(())
}

pub(crate) fn require_version(value: &str) -> Result<()> {
    if !version_pattern().is_match(value) {
        return Err(Error::validation("version", format!("'{value}' does not match the version pattern")));
    }
    Ok(())
}

pub(crate) fn require_context(value: &str) -> Result<()> {
    if !value.starts_with('/') {
        return Err(Error::validation("context", "must start with '/'"));
    }
    Ok(())
}

pub(crate) fn require_http_url(field: &str, value: &str) -> Result<()> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(Error::validation(field, format!("'{value}' is not an http(s) URL")));
    }
    // Reject things like "http://" with nothing behind the scheme.
    let rest = value.splitn(3, '/').nth(2).unwrap_or("");
    if rest.is_empty() {
        return Err(Error::validation(field, "URL has no host"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_pattern() {
        assert!(require_version("v1.0").is_ok());
        assert!(require_version("1.2.3").is_ok());
        assert!(require_version("v2").is_ok());
        assert!(require_version("latest").is_err());
        assert!(require_version("v1.").is_err());
        assert!(require_version("").is_err());
    }

    #[test]
    fn test_url_validation() {
        assert!(require_http_url("backend_url", "https://backend.svc:8443/base").is_ok());
        assert!(require_http_url("backend_url", "http://127.0.0.1:9000").is_ok());
        assert!(require_http_url("backend_url", "ftp://host").is_err());
        assert!(require_http_url("backend_url", "http://").is_err());
        assert!(require_http_url("backend_url", "backend").is_err());
    }

    #[test]
    fn test_name_and_context() {
        assert!(require_name("name", "orders").is_ok());
        assert!(require_name("name", "  ").is_err());
        assert!(require_context("/orders").is_ok());
        assert!(require_context("orders").is_err());
    }
}
