//! TLD → server mappings.
//!
//! The engine reads TLD endpoints through [`TldMappingStore`]; the owning
//! application decides where they live (a database seeded from IANA, a TOML
//! file, ...). [`MemoryTldStore`] is the in-process implementation used by
//! the CLI and by tests, and [`builtin_mappings`] provides a seed table of
//! well-known registries.

use crate::error::LookupError;
use crate::types::TldMapping;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Read-only access to TLD server mappings.
#[async_trait]
pub trait TldMappingStore: Send + Sync {
    /// Look up the mapping for a normalized TLD.
    async fn find(&self, tld: &str) -> Result<Option<TldMapping>, LookupError>;

    /// All known TLDs made of two labels (e.g. "co.uk").
    async fn two_level_tlds(&self) -> Result<Vec<String>, LookupError>;
}

/// Shared handle to a mapping store.
pub type SharedTldStore = Arc<dyn TldMappingStore>;

/// In-memory mapping store keyed by normalized TLD.
#[derive(Debug, Default)]
pub struct MemoryTldStore {
    mappings: RwLock<HashMap<String, TldMapping>>,
}

impl MemoryTldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from mappings; later duplicates replace earlier ones.
    pub fn from_mappings<I: IntoIterator<Item = TldMapping>>(mappings: I) -> Self {
        let mappings = mappings
            .into_iter()
            .map(|m| (m.tld.clone(), m))
            .collect::<HashMap<_, _>>();
        Self {
            mappings: RwLock::new(mappings),
        }
    }

    /// Store pre-populated with [`builtin_mappings`].
    pub fn with_builtin() -> Self {
        Self::from_mappings(builtin_mappings())
    }

    pub async fn insert(&self, mapping: TldMapping) {
        self.mappings
            .write()
            .await
            .insert(mapping.tld.clone(), mapping);
    }

    /// Add or replace all `mappings`.
    pub async fn extend<I: IntoIterator<Item = TldMapping>>(&self, mappings: I) {
        let mut guard = self.mappings.write().await;
        for mapping in mappings {
            guard.insert(mapping.tld.clone(), mapping);
        }
    }

    pub async fn len(&self) -> usize {
        self.mappings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.mappings.read().await.is_empty()
    }
}

#[async_trait]
impl TldMappingStore for MemoryTldStore {
    async fn find(&self, tld: &str) -> Result<Option<TldMapping>, LookupError> {
        Ok(self.mappings.read().await.get(&tld.to_lowercase()).cloned())
    }

    async fn two_level_tlds(&self) -> Result<Vec<String>, LookupError> {
        let mut tlds: Vec<String> = self
            .mappings
            .read()
            .await
            .values()
            .filter(|m| m.is_two_level())
            .map(|m| m.tld.clone())
            .collect();
        tlds.sort();
        Ok(tlds)
    }
}

/// Built-in seed table of registry endpoints.
///
/// RDAP servers are base URLs; the client appends `/domain/{name}`.
/// TLDs without a working RDAP service only carry a WHOIS host.
pub fn builtin_mappings() -> Vec<TldMapping> {
    const ENTRIES: &[(&str, Option<&str>, Option<&str>)] = &[
        // Popular gTLDs
        ("com", Some("https://rdap.verisign.com/com/v1"), Some("whois.verisign-grs.com")),
        ("net", Some("https://rdap.verisign.com/net/v1"), Some("whois.verisign-grs.com")),
        ("org", Some("https://rdap.publicinterestregistry.org/rdap"), Some("whois.publicinterestregistry.org")),
        ("info", Some("https://rdap.identitydigital.services/rdap"), Some("whois.nic.info")),
        ("biz", Some("https://rdap.nic.biz"), Some("whois.nic.biz")),
        // Google TLDs
        ("app", Some("https://pubapi.registry.google/rdap"), Some("whois.nic.google")),
        ("dev", Some("https://pubapi.registry.google/rdap"), Some("whois.nic.google")),
        ("page", Some("https://pubapi.registry.google/rdap"), Some("whois.nic.google")),
        // CentralNic managed gTLDs
        ("xyz", Some("https://rdap.centralnic.com/xyz"), Some("whois.nic.xyz")),
        ("tech", Some("https://rdap.centralnic.com/tech"), Some("whois.nic.tech")),
        ("online", Some("https://rdap.centralnic.com/online"), Some("whois.nic.online")),
        ("site", Some("https://rdap.centralnic.com/site"), Some("whois.nic.site")),
        // Identity Digital managed TLDs
        ("ai", Some("https://rdap.identitydigital.services/rdap"), Some("whois.nic.ai")),
        ("io", Some("https://rdap.identitydigital.services/rdap"), Some("whois.nic.io")),
        ("me", Some("https://rdap.identitydigital.services/rdap"), Some("whois.nic.me")),
        // Country code TLDs with RDAP
        ("us", Some("https://rdap.nic.us"), Some("whois.nic.us")),
        ("uk", Some("https://rdap.nominet.uk/uk"), Some("whois.nic.uk")),
        ("de", Some("https://rdap.denic.de"), Some("whois.denic.de")),
        ("fr", Some("https://rdap.nic.fr"), Some("whois.nic.fr")),
        ("nl", Some("https://rdap.sidn.nl"), Some("whois.domain-registry.nl")),
        ("ca", Some("https://rdap.ca.fury.ca/rdap"), Some("whois.cira.ca")),
        ("au", Some("https://rdap.cctld.au/rdap"), Some("whois.auda.org.au")),
        ("br", Some("https://rdap.registro.br"), Some("whois.registro.br")),
        ("in", Some("https://rdap.nixiregistry.in/rdap"), Some("whois.nixiregistry.in")),
        ("tv", Some("https://rdap.nic.tv"), Some("whois.nic.tv")),
        ("cc", Some("https://tld-rdap.verisign.com/cc/v1"), Some("ccwhois.verisign-grs.com")),
        // WHOIS-only ccTLDs
        ("co", None, Some("whois.registry.co")),
        ("eu", None, Some("whois.eu")),
        ("it", None, Some("whois.nic.it")),
        ("jp", None, Some("whois.jprs.jp")),
        ("es", None, Some("whois.nic.es")),
        ("cn", None, Some("whois.cnnic.cn")),
        // Common two-level suffixes
        ("co.uk", Some("https://rdap.nominet.uk/uk"), Some("whois.nic.uk")),
        ("org.uk", Some("https://rdap.nominet.uk/uk"), Some("whois.nic.uk")),
        ("me.uk", Some("https://rdap.nominet.uk/uk"), Some("whois.nic.uk")),
        ("com.au", Some("https://rdap.cctld.au/rdap"), Some("whois.auda.org.au")),
        ("net.au", Some("https://rdap.cctld.au/rdap"), Some("whois.auda.org.au")),
        ("org.au", Some("https://rdap.cctld.au/rdap"), Some("whois.auda.org.au")),
        ("com.br", Some("https://rdap.registro.br"), Some("whois.registro.br")),
        ("co.in", Some("https://rdap.nixiregistry.in/rdap"), Some("whois.nixiregistry.in")),
        ("co.jp", None, Some("whois.jprs.jp")),
        ("com.cn", None, Some("whois.cnnic.cn")),
    ];

    ENTRIES
        .iter()
        .map(|(tld, rdap, whois)| TldMapping {
            tld: tld.to_string(),
            rdap_server: rdap.map(String::from),
            whois_server: whois.map(String::from),
        })
        .collect()
}
