//! TLD extraction and validation.
//!
//! Splits raw user input into a registrable name and TLD, understanding
//! two-level public suffixes such as `co.uk` through the mapping store.

use crate::cache::{remember, SharedCache};
use crate::error::LookupError;
use crate::protocols::registry::SharedTldStore;
use crate::types::{DomainExtraction, LookupConfig};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error};

const TWO_LEVEL_TLDS_KEY: &str = "TldExtractor::two_level_tlds";

lazy_static! {
    static ref PUNYCODE_PATTERN: Regex =
        Regex::new(r"^xn--[a-zA-Z0-9-]+(\.[a-zA-Z0-9-]+)*$").expect("valid punycode pattern");
    static ref UNICODE_PATTERN: Regex =
        Regex::new(r"^[\p{L}\p{N}\-.]+$").expect("valid unicode domain pattern");
}

/// Extracts TLDs from domains and checks them against the mapping store.
#[derive(Clone)]
pub struct TldExtractor {
    store: SharedTldStore,
    cache: SharedCache,
    two_level_tlds_ttl: Duration,
    tld_validity_ttl: Duration,
}

impl TldExtractor {
    pub fn new(store: SharedTldStore, cache: SharedCache, config: &LookupConfig) -> Self {
        Self {
            store,
            cache,
            two_level_tlds_ttl: config.two_level_tlds_ttl,
            tld_validity_ttl: config.tld_validity_ttl,
        }
    }

    /// Extract the TLD of `domain`.
    ///
    /// Returns the compound TLD ("co.uk") when the last two labels form a
    /// known two-level TLD, otherwise the last label.
    ///
    /// # Errors
    ///
    /// `LookupError::InvalidDomain` when the input is empty, contains
    /// characters other than letters, digits, hyphens and dots, or has fewer
    /// than two labels.
    pub async fn extract(&self, domain: &str) -> Result<String, LookupError> {
        debug!(domain, "Extracting TLD");

        let trimmed = domain.trim();
        if trimmed.is_empty() {
            return Err(LookupError::invalid_domain(
                domain,
                "Domain cannot be empty when extracting TLD",
            ));
        }

        if !is_valid_domain_syntax(trimmed) {
            return Err(LookupError::invalid_domain(
                domain,
                "Contains invalid characters or unsupported format",
            ));
        }

        let normalized = normalize_domain(domain);
        let labels: Vec<&str> = normalized.split('.').collect();

        if labels.len() < 2 {
            return Err(LookupError::invalid_domain(domain, "Invalid domain format"));
        }

        if labels.len() >= 3 {
            let last_two = labels[labels.len() - 2..].join(".");
            if self.two_level_tlds().await.contains(&last_two) {
                return Ok(last_two);
            }
        }

        match labels.last() {
            Some(last) if !last.is_empty() => Ok(last.to_string()),
            _ => Err(LookupError::invalid_domain(
                domain,
                "Unable to extract last label from domain",
            )),
        }
    }

    /// Non-failing variant of [`extract`](Self::extract).
    ///
    /// Any failure degrades to `is_valid: false` with best-effort values, so
    /// callers such as audit logging never have to handle an error.
    pub async fn extract_domain_info(&self, domain: &str) -> DomainExtraction {
        match self.extract(domain).await {
            Ok(tld) => {
                let normalized = normalize_domain(domain);
                DomainExtraction {
                    registrable_name: registrable_name(&normalized, &tld),
                    tld,
                    is_valid: true,
                }
            }
            Err(e) => {
                debug!(domain, error = %e, "Domain extraction failed");
                let fallback = domain.trim().to_lowercase();
                let tld = fallback
                    .rsplit_once('.')
                    .map(|(_, last)| last.to_string())
                    .unwrap_or_default();
                DomainExtraction {
                    registrable_name: fallback,
                    tld,
                    is_valid: false,
                }
            }
        }
    }

    /// Whether `tld` exists in the mapping store.
    ///
    /// Positive answers are cached; store failures are logged and reported
    /// as `false`.
    pub async fn is_valid_tld(&self, tld: &str) -> bool {
        let tld = tld.trim().to_lowercase();
        let key = format!("TldExtractor::is_valid_tld::{}", tld);

        match self.cache.get(&key).await {
            Ok(Some(Value::Bool(true))) => return true,
            Ok(_) => {}
            Err(e) => debug!(tld = %tld, error = %e, "TLD validity cache read failed"),
        }

        match self.store.find(&tld).await {
            Ok(Some(_)) => {
                if let Err(e) = self
                    .cache
                    .set(&key, Value::Bool(true), self.tld_validity_ttl)
                    .await
                {
                    debug!(tld = %tld, error = %e, "TLD validity cache write failed");
                }
                true
            }
            Ok(None) => false,
            Err(e) => {
                error!(tld = %tld, error = %e, "Failed to validate TLD");
                false
            }
        }
    }

    async fn two_level_tlds(&self) -> HashSet<String> {
        let store = &self.store;
        let result = remember(
            self.cache.as_ref(),
            TWO_LEVEL_TLDS_KEY,
            self.two_level_tlds_ttl,
            move || async move { store.two_level_tlds().await },
        )
        .await;

        match result {
            Ok(tlds) => {
                debug!(count = tlds.len(), "Loaded two-level TLDs");
                tlds.into_iter().collect()
            }
            Err(e) => {
                error!(error = %e, "Failed to load two-level TLDs");
                HashSet::new()
            }
        }
    }
}

/// Lowercase `domain` and reduce it to a bare hostname.
///
/// Input is parsed as a URL (an `https://` scheme is assumed when none is
/// given) so schemes, paths and ports are dropped and IDNs become punycode.
/// When URL parsing fails the scheme, path and port are stripped by hand.
pub fn normalize_domain(domain: &str) -> String {
    let lower = domain.trim().to_lowercase();

    let to_parse = if lower.contains("://") {
        lower.clone()
    } else {
        format!("https://{}", lower)
    };

    let normalized = match url::Url::parse(&to_parse) {
        // IP literals are left to the manual path so "1.2" is not rewritten to "1.0.0.2"
        Ok(url) => match url.host() {
            Some(url::Host::Domain(host)) => host.to_string(),
            _ => strip_url_parts(&lower),
        },
        Err(_) => strip_url_parts(&lower),
    };

    debug!(domain, normalized = %normalized, "Normalized domain");
    normalized
}

fn strip_url_parts(domain: &str) -> String {
    let without_scheme = domain
        .strip_prefix("https://")
        .or_else(|| domain.strip_prefix("http://"))
        .unwrap_or(domain);
    let without_path = without_scheme.split('/').next().unwrap_or(without_scheme);
    without_path
        .split(':')
        .next()
        .unwrap_or(without_path)
        .to_string()
}

/// Letters, digits, hyphens and dots only; ASCII punycode labels are accepted explicitly.
pub(crate) fn is_valid_domain_syntax(domain: &str) -> bool {
    PUNYCODE_PATTERN.is_match(domain) || UNICODE_PATTERN.is_match(domain)
}

/// The label directly left of `tld` joined with `tld`.
fn registrable_name(normalized: &str, tld: &str) -> String {
    let labels: Vec<&str> = normalized.split('.').collect();
    let tld_labels = tld.split('.').count();
    if labels.len() > tld_labels {
        labels[labels.len() - tld_labels - 1..].join(".")
    } else {
        normalized.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::protocols::registry::{MemoryTldStore, TldMappingStore};
    use crate::types::TldMapping;
    use async_trait::async_trait;
    use std::sync::Arc;

    fn extractor() -> TldExtractor {
        let store = MemoryTldStore::from_mappings(vec![
            TldMapping::new("com").with_whois("whois.verisign-grs.com"),
            TldMapping::new("uk").with_whois("whois.nic.uk"),
            TldMapping::new("co.uk").with_whois("whois.nic.uk"),
        ]);
        TldExtractor::new(
            Arc::new(store),
            MemoryCache::shared(),
            &LookupConfig::default(),
        )
    }

    struct BrokenStore;

    #[async_trait]
    impl TldMappingStore for BrokenStore {
        async fn find(&self, tld: &str) -> Result<Option<TldMapping>, LookupError> {
            Err(LookupError::mapping_store(tld, "connection lost"))
        }

        async fn two_level_tlds(&self) -> Result<Vec<String>, LookupError> {
            Err(LookupError::mapping_store("*", "connection lost"))
        }
    }

    #[tokio::test]
    async fn test_extract_two_label_domains() {
        let extractor = extractor();
        assert_eq!(extractor.extract("example.com").await.unwrap(), "com");
        assert_eq!(extractor.extract("Example.ORG").await.unwrap(), "org");
        assert_eq!(extractor.extract("sub.example.com").await.unwrap(), "com");
    }

    #[tokio::test]
    async fn test_extract_two_level_tld() {
        let extractor = extractor();
        assert_eq!(extractor.extract("example.co.uk").await.unwrap(), "co.uk");
        assert_eq!(extractor.extract("www.example.co.uk").await.unwrap(), "co.uk");
        assert_eq!(extractor.extract("example.org.uk").await.unwrap(), "uk");
    }

    #[tokio::test]
    async fn test_extract_rejects_invalid_input() {
        let extractor = extractor();
        for input in ["", "   ", "localhost", "exa mple.com", "example.com/path", "bad!.com"] {
            let err = extractor.extract(input).await.unwrap_err();
            assert!(err.is_input_error(), "{:?} should be an input error", input);
        }
    }

    #[tokio::test]
    async fn test_extract_accepts_idn_and_punycode() {
        let extractor = extractor();
        assert_eq!(extractor.extract("münchen.com").await.unwrap(), "com");
        assert_eq!(extractor.extract("xn--mnchen-3ya.com").await.unwrap(), "com");
    }

    #[tokio::test]
    async fn test_extract_survives_store_failure() {
        let extractor = TldExtractor::new(
            Arc::new(BrokenStore),
            MemoryCache::shared(),
            &LookupConfig::default(),
        );
        assert_eq!(extractor.extract("example.co.uk").await.unwrap(), "uk");
        assert!(!extractor.is_valid_tld("uk").await);
    }

    #[tokio::test]
    async fn test_extract_domain_info() {
        let extractor = extractor();

        let info = extractor.extract_domain_info("WWW.Example.co.uk").await;
        assert!(info.is_valid);
        assert_eq!(info.tld, "co.uk");
        assert_eq!(info.registrable_name, "example.co.uk");

        let invalid = extractor.extract_domain_info("not a domain").await;
        assert!(!invalid.is_valid);

        let single = extractor.extract_domain_info("localhost").await;
        assert!(!single.is_valid);
        assert_eq!(single.tld, "");
    }

    #[tokio::test]
    async fn test_is_valid_tld() {
        let extractor = extractor();
        assert!(extractor.is_valid_tld("com").await);
        assert!(extractor.is_valid_tld("CO.UK").await);
        assert!(!extractor.is_valid_tld("nonexistent").await);
        // Second call is served from cache
        assert!(extractor.is_valid_tld("com").await);
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("Example.COM"), "example.com");
        assert_eq!(normalize_domain("https://example.com/path?q=1"), "example.com");
        assert_eq!(normalize_domain("example.com:8080"), "example.com");
        assert_eq!(normalize_domain("  example.com  "), "example.com");
        assert_eq!(normalize_domain("münchen.de"), "xn--mnchen-3ya.de");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for host in ["example.com", "sub.example.co.uk", "xn--mnchen-3ya.de", "a-b.io"] {
            let once = normalize_domain(host);
            assert_eq!(normalize_domain(&once), once);
        }
    }

    #[test]
    fn test_registrable_name() {
        assert_eq!(registrable_name("a.b.example.com", "com"), "example.com");
        assert_eq!(registrable_name("example.co.uk", "co.uk"), "example.co.uk");
        assert_eq!(registrable_name("co.uk", "co.uk"), "co.uk");
    }
}
