//! # Domain Lookup Library
//!
//! Resolves domain registration data over RDAP, falling back to WHOIS.
//!
//! Given a domain, the [`Resolver`] works out the TLD (understanding
//! two-level suffixes such as `co.uk`), finds the registry's servers in a
//! [`TldMappingStore`], queries RDAP and then WHOIS, and returns a single
//! normalized [`RegistrationRecord`]. [`BulkProcessor`] runs up to 100
//! lookups with bounded concurrency.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_lookup_lib::{DomainLookup, LookupConfig, MemoryCache, MemoryTldStore, Resolver};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryTldStore::with_builtin());
//!     let resolver = Resolver::from_store(store, MemoryCache::shared(), &LookupConfig::default())?;
//!
//!     match resolver.get_whois_data("example.com", false).await? {
//!         Some(record) => println!("{} registered via {}", record.domain, record.source),
//!         None => println!("example.com looks available"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Caching
//!
//! Every component shares one [`CacheStore`]. Protocol responses, TLD
//! mappings and whole lookups are cached independently, and results report
//! whether they were served from cache through [`Cached::is_cached`].

pub use bulk::BulkProcessor;
pub use cache::{remember, remember_with_hit_info, CacheStore, MemoryCache, SharedCache};
pub use config::{
    load_env_config, parse_duration_string, ConfigManager, EnvConfig, FileConfig, TldEntry,
};
pub use error::LookupError;
pub use extractor::{normalize_domain, TldExtractor};
pub use protocols::{
    builtin_mappings, normalize_rdap_response, parse_whois_response, MemoryTldStore, RdapClient,
    SharedTldStore, TldMappingStore, WhoisClient,
};
pub use resolver::{DomainLookup, Resolver};
pub use types::{
    BulkOptions, BulkResult, BulkSummary, Cached, ContactInfo, DomainExtraction, LookupConfig,
    PostalAddress, QueryOutcome, RecordSource, RegistrationRecord, TldMapping,
};

mod bulk;
mod cache;
mod config;
mod error;
mod extractor;
mod protocols;
mod resolver;
mod types;

pub type Result<T> = std::result::Result<T, LookupError>;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// Get library information for debugging or display purposes.
pub fn info() -> LibraryInfo {
    LibraryInfo {
        version: VERSION,
        author: AUTHOR,
        features: get_enabled_features(),
    }
}

/// Information about the library build and features
#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub version: &'static str,
    pub author: &'static str,
    pub features: Vec<&'static str>,
}

/// Protocols compiled into this build.
fn get_enabled_features() -> Vec<&'static str> {
    [
        ("rdap", cfg!(feature = "rdap")),
        ("whois", cfg!(feature = "whois")),
    ]
    .into_iter()
    .filter_map(|(name, enabled)| enabled.then_some(name))
    .collect()
}
