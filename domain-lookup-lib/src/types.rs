//! Core data types for domain registration lookups.
//!
//! This module defines the main data structures used throughout the library:
//! TLD mappings, normalized registration records, bulk results and the
//! lookup configuration.

use crate::error::LookupError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Deref;
use std::time::Duration;

/// Server endpoints known for a TLD.
///
/// Either endpoint may be missing; a mapping without both is an
/// unresolvable TLD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TldMapping {
    /// Normalized (lowercase) TLD, e.g. "com" or "co.uk"
    pub tld: String,

    /// RDAP base URL (without the trailing `/domain/` path)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rdap_server: Option<String>,

    /// WHOIS server host name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whois_server: Option<String>,
}

impl TldMapping {
    pub fn new<T: Into<String>>(tld: T) -> Self {
        Self {
            tld: tld.into().trim().trim_start_matches('.').to_lowercase(),
            rdap_server: None,
            whois_server: None,
        }
    }

    pub fn with_rdap<S: Into<String>>(mut self, server: S) -> Self {
        self.rdap_server = Some(server.into());
        self
    }

    pub fn with_whois<S: Into<String>>(mut self, server: S) -> Self {
        self.whois_server = Some(server.into());
        self
    }

    /// Whether this TLD is made of two labels (e.g. "co.uk").
    pub fn is_two_level(&self) -> bool {
        self.tld.contains('.')
    }
}

/// Result of splitting a raw domain into registrable name and TLD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainExtraction {
    /// Label left of the TLD joined with the TLD, e.g. "example.co.uk"
    pub registrable_name: String,
    pub tld: String,
    pub is_valid: bool,
}

/// Which protocol produced a registration record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordSource {
    #[serde(rename = "rdap")]
    Rdap,
    #[serde(rename = "whois")]
    Whois,
}

impl std::fmt::Display for RecordSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordSource::Rdap => write!(f, "RDAP"),
            RecordSource::Whois => write!(f, "WHOIS"),
        }
    }
}

/// Postal address decoded from a vCard `adr` property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PostalAddress {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub street: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Contact details of a registrant, admin, tech or billing entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContactInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<PostalAddress>,
}

impl ContactInfo {
    pub fn is_empty(&self) -> bool {
        self == &ContactInfo::default()
    }
}

/// Normalized registration data, the common output of the RDAP and WHOIS clients.
///
/// An absent field means "not reported by the registry". Dates are kept
/// exactly as the registry reported them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub domain: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrant: Option<ContactInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<ContactInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech: Option<ContactInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing: Option<ContactInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<String>,

    #[serde(default)]
    pub name_servers: Vec<String>,

    #[serde(default)]
    pub status: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dnssec: Option<bool>,

    pub source: RecordSource,

    /// Original WHOIS text response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_whois: Option<String>,

    /// Original RDAP JSON document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_rdap: Option<serde_json::Value>,
}

impl RegistrationRecord {
    /// Create an empty record for `domain` produced by `source`.
    pub fn new<D: Into<String>>(domain: D, source: RecordSource) -> Self {
        Self {
            domain: domain.into(),
            registrar: None,
            registrant: None,
            admin: None,
            tech: None,
            billing: None,
            creation_date: None,
            expiration_date: None,
            updated_date: None,
            name_servers: Vec::new(),
            status: Vec::new(),
            dnssec: None,
            source,
            raw_whois: None,
            raw_rdap: None,
        }
    }

    /// Copy of this record without the raw protocol payloads.
    pub fn without_raw(&self) -> Self {
        Self {
            raw_whois: None,
            raw_rdap: None,
            ..self.clone()
        }
    }
}

/// A value together with whether it was served from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub is_cached: bool,
}

impl<T> Cached<T> {
    pub fn fresh(value: T) -> Self {
        Self {
            value,
            is_cached: false,
        }
    }

    pub fn hit(value: T) -> Self {
        Self {
            value,
            is_cached: true,
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for Cached<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// Outcome of a single protocol client query.
///
/// `NotFound` is an authoritative "no such registration" (RDAP 404) and is
/// deliberately distinct from `Failed`.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Found(Cached<RegistrationRecord>),
    NotFound,
    Failed(LookupError),
}

impl QueryOutcome {
    pub fn from_result(result: Result<Option<Cached<RegistrationRecord>>, LookupError>) -> Self {
        match result {
            Ok(Some(record)) => QueryOutcome::Found(record),
            Ok(None) => QueryOutcome::NotFound,
            Err(e) => QueryOutcome::Failed(e),
        }
    }
}

/// Options for [`BulkProcessor::process_bulk`](crate::BulkProcessor::process_bulk).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkOptions {
    #[serde(default)]
    pub skip_availability_check: bool,

    /// Batch size; defaults to 5 and is clamped to 1..=10
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<usize>,
}

impl BulkOptions {
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = Some(max_concurrent);
        self
    }

    pub fn with_skip_availability_check(mut self, skip: bool) -> Self {
        self.skip_availability_check = skip;
        self
    }
}

/// Outcome for one domain of a bulk request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkResult {
    pub domain: String,
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tld: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_hit: Option<bool>,

    /// Registration data with raw payloads stripped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<RegistrationRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub processing_time_ms: u64,
}

impl BulkResult {
    pub fn failed<D: Into<String>, E: Into<String>>(
        domain: D,
        tld: Option<String>,
        error: E,
        processing_time_ms: u64,
    ) -> Self {
        Self {
            domain: domain.into(),
            success: false,
            tld,
            available: None,
            cache_hit: None,
            record: None,
            error: Some(error.into()),
            processing_time_ms,
        }
    }
}

/// Aggregate counters over a completed bulk run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BulkSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub cache_hits: usize,
    pub available_domains: usize,
    pub processing_time_ms: u64,
}

impl BulkSummary {
    /// Derive the summary from the finished results in a single pass.
    pub fn from_results(results: &[BulkResult], processing_time: Duration) -> Self {
        results.iter().fold(
            BulkSummary {
                processing_time_ms: processing_time.as_millis() as u64,
                ..Default::default()
            },
            |mut summary, result| {
                summary.total += 1;
                if result.success {
                    summary.successful += 1;
                } else {
                    summary.failed += 1;
                }
                if result.cache_hit == Some(true) {
                    summary.cache_hits += 1;
                }
                if result.available == Some(true) {
                    summary.available_domains += 1;
                }
                summary
            },
        )
    }
}

/// Tunables for the lookup engine.
///
/// These defaults match the cache lifetimes and timeouts the engine was
/// designed around; see [`ConfigManager`](crate::ConfigManager) for loading
/// overrides from files and the environment.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    /// Whole-call resolver cache lifetime. Default: 10 minutes
    pub domain_lookup_ttl: Duration,

    /// RDAP response cache lifetime. Default: 5 minutes
    pub rdap_ttl: Duration,

    /// WHOIS response cache lifetime. Default: 5 minutes
    pub whois_ttl: Duration,

    /// TLD mapping cache lifetime. Default: 1 hour
    pub tld_mapping_ttl: Duration,

    /// Positive TLD validity cache lifetime. Default: 24 hours
    pub tld_validity_ttl: Duration,

    /// Two-level TLD set cache lifetime. Default: 7 days
    pub two_level_tlds_ttl: Duration,

    /// HTTP timeout for RDAP requests. Default: 10 seconds
    pub rdap_timeout: Duration,

    /// Default WHOIS connection timeout. Default: 10 seconds
    pub whois_timeout: Duration,

    /// Per-server WHOIS timeout overrides for known slow servers
    pub whois_server_timeouts: HashMap<String, Duration>,

    /// User agent sent with RDAP requests
    pub user_agent: String,

    /// Bulk batch size when the caller gives none. Default: 5
    pub default_max_concurrent: usize,

    /// Hard upper bound on bulk batch size. Default: 10
    pub max_concurrent_limit: usize,

    /// Maximum domains per bulk call. Default: 100
    pub max_bulk_domains: usize,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            domain_lookup_ttl: Duration::from_secs(10 * 60),
            rdap_ttl: Duration::from_secs(5 * 60),
            whois_ttl: Duration::from_secs(5 * 60),
            tld_mapping_ttl: Duration::from_secs(60 * 60),
            tld_validity_ttl: Duration::from_secs(24 * 60 * 60),
            two_level_tlds_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            rdap_timeout: Duration::from_secs(10),
            whois_timeout: Duration::from_secs(10),
            whois_server_timeouts: HashMap::new(),
            user_agent: format!("domain-lookup/{}", env!("CARGO_PKG_VERSION")),
            default_max_concurrent: 5,
            max_concurrent_limit: 10,
            max_bulk_domains: 100,
        }
    }
}

impl LookupConfig {
    pub fn with_rdap_timeout(mut self, timeout: Duration) -> Self {
        self.rdap_timeout = timeout;
        self
    }

    pub fn with_whois_timeout(mut self, timeout: Duration) -> Self {
        self.whois_timeout = timeout;
        self
    }

    /// Override the WHOIS timeout for a single (slow) server.
    pub fn with_whois_server_timeout<S: Into<String>>(
        mut self,
        server: S,
        timeout: Duration,
    ) -> Self {
        self.whois_server_timeouts
            .insert(server.into().to_lowercase(), timeout);
        self
    }

    /// Set the default bulk batch size, capped at the hard limit.
    pub fn with_default_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.default_max_concurrent = max_concurrent.clamp(1, self.max_concurrent_limit);
        self
    }

    /// Effective bulk batch size for a requested value.
    pub fn clamp_concurrency(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_max_concurrent)
            .clamp(1, self.max_concurrent_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(success: bool, available: Option<bool>, cache_hit: Option<bool>) -> BulkResult {
        BulkResult {
            domain: "example.com".to_string(),
            success,
            tld: Some("com".to_string()),
            available,
            cache_hit,
            record: None,
            error: None,
            processing_time_ms: 1,
        }
    }

    #[test]
    fn test_summary_counts() {
        let results = vec![
            result(true, Some(true), Some(false)),
            result(true, Some(false), Some(true)),
            result(false, None, None),
        ];
        let summary = BulkSummary::from_results(&results, Duration::from_millis(42));
        assert_eq!(summary.total, 3);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.cache_hits, 1);
        assert_eq!(summary.available_domains, 1);
        assert_eq!(summary.processing_time_ms, 42);
    }

    #[test]
    fn test_without_raw_strips_payloads() {
        let mut record = RegistrationRecord::new("example.com", RecordSource::Whois);
        record.raw_whois = Some("Registrar: Test".to_string());
        record.registrar = Some("Test".to_string());
        let stripped = record.without_raw();
        assert!(stripped.raw_whois.is_none());
        assert_eq!(stripped.registrar.as_deref(), Some("Test"));
    }

    #[test]
    fn test_clamp_concurrency() {
        let config = LookupConfig::default();
        assert_eq!(config.clamp_concurrency(None), 5);
        assert_eq!(config.clamp_concurrency(Some(0)), 1);
        assert_eq!(config.clamp_concurrency(Some(50)), 10);
        assert_eq!(config.clamp_concurrency(Some(3)), 3);
    }

    #[test]
    fn test_tld_mapping_normalizes() {
        let mapping = TldMapping::new(" .CO.UK ");
        assert_eq!(mapping.tld, "co.uk");
        assert!(mapping.is_two_level());
    }

    #[test]
    fn test_source_serializes_lowercase() {
        let json = serde_json::to_string(&RecordSource::Rdap).unwrap();
        assert_eq!(json, "\"rdap\"");
    }
}
