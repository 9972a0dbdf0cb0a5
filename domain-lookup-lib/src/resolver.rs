//! Domain → registration record resolution.
//!
//! For each domain the resolver looks up the TLD's servers, asks RDAP first
//! and falls back to WHOIS. Every step is cached independently, and the
//! whole call is cached on top of that.

use crate::cache::{remember, remember_with_hit_info, SharedCache};
use crate::error::LookupError;
use crate::extractor::TldExtractor;
use crate::protocols::registry::SharedTldStore;
use crate::protocols::{RdapClient, WhoisClient};
use crate::types::{Cached, LookupConfig, QueryOutcome, RegistrationRecord, TldMapping};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Anything that can turn a domain into a registration record.
///
/// `Ok(None)` means no source produced a record: the domain is either
/// unregistered or could not be resolved. Callers treat it as "available".
#[async_trait]
pub trait DomainLookup: Send + Sync {
    async fn get_whois_data(
        &self,
        domain: &str,
        skip_availability_check: bool,
    ) -> Result<Option<Cached<RegistrationRecord>>, LookupError>;
}

/// RDAP-first resolver with WHOIS fallback.
#[derive(Clone)]
pub struct Resolver {
    extractor: TldExtractor,
    store: SharedTldStore,
    rdap: RdapClient,
    whois: WhoisClient,
    cache: SharedCache,
    lookup_ttl: Duration,
    mapping_ttl: Duration,
}

impl Resolver {
    pub fn new(
        extractor: TldExtractor,
        store: SharedTldStore,
        rdap: RdapClient,
        whois: WhoisClient,
        cache: SharedCache,
        config: &LookupConfig,
    ) -> Self {
        Self {
            extractor,
            store,
            rdap,
            whois,
            cache,
            lookup_ttl: config.domain_lookup_ttl,
            mapping_ttl: config.tld_mapping_ttl,
        }
    }

    /// Wire a resolver and its clients around one store and cache.
    pub fn from_store(
        store: SharedTldStore,
        cache: SharedCache,
        config: &LookupConfig,
    ) -> Result<Self, LookupError> {
        let extractor = TldExtractor::new(store.clone(), cache.clone(), config);
        let rdap = RdapClient::new(cache.clone(), config)?;
        let whois = WhoisClient::new(cache.clone(), config);
        Ok(Self::new(extractor, store, rdap, whois, cache, config))
    }

    pub fn extractor(&self) -> &TldExtractor {
        &self.extractor
    }

    /// Server mapping for `tld`, cached for an hour.
    async fn tld_mapping(&self, tld: &str) -> Result<Option<TldMapping>, LookupError> {
        let key = format!("TldResolver::tld_mapping::{}", tld);
        let store = &self.store;
        remember(self.cache.as_ref(), &key, self.mapping_ttl, move || async move {
            debug!(tld, "Fetching TLD mapping from store");
            let mapping = store.find(tld).await?;
            debug!(tld, found = mapping.is_some(), "TLD mapping lookup completed");
            Ok(mapping)
        })
        .await
    }

    async fn resolve(
        &self,
        domain: &str,
    ) -> Result<Option<Cached<RegistrationRecord>>, LookupError> {
        debug!(domain, "Starting registration data lookup");

        let tld = self.extractor.extract(domain).await?;
        debug!(domain, tld = %tld, "Extracted TLD");

        if !self.extractor.is_valid_tld(&tld).await {
            warn!(domain, tld = %tld, "Invalid TLD");
            return Ok(None);
        }

        let Some(mapping) = self.tld_mapping(&tld).await? else {
            warn!(domain, tld = %tld, "TLD mapping not found in store");
            return Ok(None);
        };
        debug!(
            domain,
            tld = %tld,
            rdap_server = ?mapping.rdap_server,
            whois_server = ?mapping.whois_server,
            "Retrieved TLD mapping"
        );

        if let Some(server) = mapping.rdap_server.as_deref().filter(|_| cfg!(feature = "rdap")) {
            debug!(domain, server, "Attempting RDAP query");
            match self.rdap.query(domain, server).await {
                QueryOutcome::Found(record) => {
                    info!(domain, source = "rdap", "Retrieved registration data via RDAP");
                    return Ok(Some(record));
                }
                // A 404 is inconclusive here; WHOIS still gets a chance.
                QueryOutcome::NotFound => {
                    debug!(domain, server, "RDAP query returned no record")
                }
                QueryOutcome::Failed(e) => {
                    error!(domain, server, error = %e, "RDAP query failed, attempting WHOIS fallback")
                }
            }
        }

        if let Some(server) = mapping.whois_server.as_deref().filter(|_| cfg!(feature = "whois")) {
            debug!(domain, server, "Attempting WHOIS query");
            match self.whois.query(domain, server).await {
                QueryOutcome::Found(record) => {
                    info!(domain, source = "whois", "Retrieved registration data via WHOIS");
                    return Ok(Some(record));
                }
                QueryOutcome::NotFound => {
                    debug!(domain, server, "WHOIS query returned no record")
                }
                QueryOutcome::Failed(e) => {
                    error!(domain, server, error = %e, "WHOIS query failed")
                }
            }
        }

        if mapping.rdap_server.is_none() && mapping.whois_server.is_none() {
            warn!(domain, tld = %tld, "No RDAP or WHOIS servers configured for TLD");
        } else {
            warn!(domain, tld = %tld, "All available lookup methods failed");
        }

        Ok(None)
    }
}

#[async_trait]
impl DomainLookup for Resolver {
    /// Resolve `domain`, serving repeated calls from a 10 minute cache.
    ///
    /// The returned `is_cached` is true when either this whole-call cache or
    /// the protocol client's own cache supplied the record.
    async fn get_whois_data(
        &self,
        domain: &str,
        skip_availability_check: bool,
    ) -> Result<Option<Cached<RegistrationRecord>>, LookupError> {
        let normalized = domain.trim().to_lowercase();
        if normalized.is_empty() {
            warn!(domain, "Invalid domain parameter provided");
            return Ok(None);
        }

        debug!(domain = %normalized, skip_availability_check, "Registration lookup requested");

        let key = format!("TldResolver::get_whois_data::{}", normalized);
        let mut client_hit = false;
        let hit = &mut client_hit;
        let domain = normalized.as_str();

        let record = remember_with_hit_info(self.cache.as_ref(), &key, self.lookup_ttl, move || async move {
            let found = self.resolve(domain).await?;
            *hit = found.as_ref().is_some_and(|r| r.is_cached);
            Ok(found.map(Cached::into_inner))
        })
        .await?;

        Ok(record.map(|r| Cached {
            is_cached: r.is_cached || client_hit,
            value: r.value,
        }))
    }
}
