//! Protocol clients and TLD server mappings.
//!
//! RDAP is tried first; WHOIS is the fallback for TLDs without RDAP or when
//! the RDAP server misbehaves.

/// RDAP (Registration Data Access Protocol) client and normalizer
pub mod rdap;

/// WHOIS client over raw TCP
pub mod whois;

/// TLD → server mapping store
pub mod registry;

pub use rdap::{normalize_rdap_response, RdapClient};
pub use registry::{builtin_mappings, MemoryTldStore, SharedTldStore, TldMappingStore};
pub use whois::{parse_whois_response, WhoisClient, WHOIS_PORT};
