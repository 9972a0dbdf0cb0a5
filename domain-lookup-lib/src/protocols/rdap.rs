//! RDAP (Registration Data Access Protocol) implementation.
//!
//! RDAP is the JSON-over-HTTPS successor to WHOIS. A lookup is a single GET
//! to `{base}/domain/{name}`; a 404 means the registry has no such domain.
//! Successful documents are normalized into a [`RegistrationRecord`].

use crate::cache::{remember_with_hit_info, SharedCache};
use crate::error::LookupError;
use crate::types::{
    ContactInfo, LookupConfig, PostalAddress, QueryOutcome, RecordSource, RegistrationRecord,
};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

/// RDAP client for fetching registration data.
///
/// Stateless apart from the shared cache: every query is one HTTP round
/// trip, and results (including "not found") are cached per domain and
/// server.
#[derive(Clone)]
pub struct RdapClient {
    /// HTTP client for making RDAP requests
    http_client: reqwest::Client,
    cache: SharedCache,
    cache_ttl: Duration,
}

impl RdapClient {
    /// Create a new RDAP client using the timeouts and TTLs from `config`.
    pub fn new(cache: SharedCache, config: &LookupConfig) -> Result<Self, LookupError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.rdap_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                LookupError::network_with_source("Failed to create RDAP HTTP client", e.to_string())
            })?;

        Ok(Self {
            http_client,
            cache,
            cache_ttl: config.rdap_ttl,
        })
    }

    /// Query `server` for `domain`.
    ///
    /// # Returns
    ///
    /// - `Found` with the normalized record (and whether it came from cache)
    /// - `NotFound` when the server answered HTTP 404
    /// - `Failed` for any other HTTP status, transport or JSON error
    pub async fn query(&self, domain: &str, server: &str) -> QueryOutcome {
        let key = format!("RdapClient::query::{}::{}", domain, server);
        let result = remember_with_hit_info(self.cache.as_ref(), &key, self.cache_ttl, || {
            self.fetch(domain, server)
        })
        .await;
        QueryOutcome::from_result(result)
    }

    async fn fetch(
        &self,
        domain: &str,
        server: &str,
    ) -> Result<Option<RegistrationRecord>, LookupError> {
        let url = rdap_domain_url(server, domain)?;
        debug!(domain, server, url = %url, "Fetching RDAP server data");

        let response = self
            .http_client
            .get(&url)
            .header(ACCEPT, "application/rdap+json, application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(domain, server, "RDAP server has no record (404)");
            return Ok(None);
        }

        if !status.is_success() {
            let status_text = status.canonical_reason().unwrap_or("Unknown status");
            error!(
                domain,
                server,
                status = status.as_u16(),
                status_text,
                "RDAP request failed"
            );
            return Err(LookupError::rdap_with_status(
                domain,
                format!("RDAP failed: {}", status_text),
                status.as_u16(),
            ));
        }

        let json = response
            .json::<Value>()
            .await
            .map_err(|e| LookupError::rdap(domain, format!("Failed to parse JSON: {}", e)))?;

        Ok(Some(normalize_rdap_response(&json, domain)))
    }
}

/// Build `{base}/domain/{punycode(domain)}`.
pub fn rdap_domain_url(server: &str, domain: &str) -> Result<String, LookupError> {
    let ascii = idna::domain_to_ascii(domain)
        .map_err(|e| LookupError::invalid_domain(domain, format!("IDNA conversion failed: {}", e)))?;
    Ok(format!("{}/domain/{}", server.trim_end_matches('/'), ascii))
}

/// Map an RDAP domain document onto a [`RegistrationRecord`].
///
/// Missing or malformed members are simply left unset.
pub fn normalize_rdap_response(json: &Value, domain: &str) -> RegistrationRecord {
    let mut record = RegistrationRecord::new(domain, RecordSource::Rdap);

    record.registrar = find_entity(json, "registrar")
        .and_then(vcard_contact)
        .and_then(|contact| contact.name.or(contact.organization));

    record.registrant = find_entity(json, "registrant").and_then(vcard_contact);
    record.admin = find_entity(json, "administrative").and_then(vcard_contact);
    record.tech = find_entity(json, "technical").and_then(vcard_contact);
    record.billing = find_entity(json, "billing").and_then(vcard_contact);

    record.creation_date = event_date(json, "registration");
    record.expiration_date = event_date(json, "expiration");
    record.updated_date = event_date(json, "last changed")
        .or_else(|| event_date(json, "last update of RDAP database"));

    if let Some(nameservers) = json.get("nameservers").and_then(Value::as_array) {
        record.name_servers = nameservers
            .iter()
            .filter_map(|ns| {
                ns.get("ldhName")
                    .and_then(Value::as_str)
                    .or_else(|| ns.get("unicodeName").and_then(Value::as_str))
            })
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect();
    }

    if let Some(statuses) = json.get("status").and_then(Value::as_array) {
        record.status = statuses
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect();
    }

    record.dnssec = Some(
        json.get("secureDNS")
            .and_then(|s| s.get("delegationSigned"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
    );

    record.raw_rdap = Some(json.clone());
    record
}

fn event_date(json: &Value, action: &str) -> Option<String> {
    json.get("events")
        .and_then(Value::as_array)?
        .iter()
        .find(|event| event.get("eventAction").and_then(Value::as_str) == Some(action))
        .and_then(|event| event.get("eventDate"))
        .and_then(Value::as_str)
        .map(String::from)
}

/// First entity carrying `role`, searching top-level entities before nested ones.
fn find_entity<'a>(json: &'a Value, role: &str) -> Option<&'a Value> {
    let entities = json.get("entities").and_then(Value::as_array)?;

    entities
        .iter()
        .find(|entity| has_role(entity, role))
        .or_else(|| entities.iter().find_map(|entity| find_entity(entity, role)))
}

fn has_role(entity: &Value, role: &str) -> bool {
    entity
        .get("roles")
        .and_then(Value::as_array)
        .is_some_and(|roles| roles.iter().any(|r| r.as_str() == Some(role)))
}

/// Decode an entity's `vcardArray` (`["vcard", [[name, params, type, value], ...]]`).
fn vcard_contact(entity: &Value) -> Option<ContactInfo> {
    let vcard = entity.get("vcardArray").and_then(Value::as_array)?;
    if vcard.first().and_then(Value::as_str) != Some("vcard") {
        return None;
    }
    let properties = vcard.get(1).and_then(Value::as_array)?;

    let mut contact = ContactInfo::default();
    for property in properties.iter().filter_map(Value::as_array) {
        let Some(name) = property.first().and_then(Value::as_str) else {
            continue;
        };
        let value = property.get(3).unwrap_or(&Value::Null);

        match name.to_lowercase().as_str() {
            "fn" => contact.name = vcard_text(value),
            "org" => contact.organization = vcard_text(value),
            "email" => contact.email = vcard_text(value),
            "tel" => {
                contact.phone = vcard_text(value).map(|tel| tel.trim_start_matches("tel:").to_string())
            }
            "adr" => contact.address = vcard_address(value),
            _ => {}
        }
    }

    (!contact.is_empty()).then_some(contact)
}

/// Text value of a vCard property; structured values are joined with spaces.
fn vcard_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    };
    (!text.is_empty()).then_some(text)
}

/// `adr` layout: [post-office-box, extended-address, street, locality, region, postal-code, country].
fn vcard_address(value: &Value) -> Option<PostalAddress> {
    let parts = value.as_array()?;
    let field = |index: usize| parts.get(index).and_then(vcard_text);

    let street = match parts.get(2) {
        Some(Value::Array(lines)) => lines
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(other) => vcard_text(other).into_iter().collect(),
        None => Vec::new(),
    };

    let address = PostalAddress {
        street,
        city: field(3),
        state: field(4),
        postal_code: field(5),
        country: field(6),
    };

    (address != PostalAddress::default()).then_some(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn sample_document() -> Value {
        serde_json::json!({
            "objectClassName": "domain",
            "ldhName": "EXAMPLE.COM",
            "status": ["client delete prohibited", "client transfer prohibited"],
            "entities": [
                {
                    "objectClassName": "entity",
                    "roles": ["registrar"],
                    "vcardArray": ["vcard", [
                        ["version", {}, "text", "4.0"],
                        ["fn", {}, "text", "Example Registrar Inc."]
                    ]],
                    "entities": [
                        {
                            "objectClassName": "entity",
                            "roles": ["abuse"],
                            "vcardArray": ["vcard", [
                                ["email", {}, "text", "abuse@registrar.example"]
                            ]]
                        }
                    ]
                },
                {
                    "objectClassName": "entity",
                    "roles": ["registrant"],
                    "vcardArray": ["vcard", [
                        ["fn", {}, "text", "Jane Doe"],
                        ["org", {}, "text", "Doe Holdings"],
                        ["tel", {"type": "voice"}, "uri", "tel:+1.5555550100"],
                        ["adr", {}, "text", ["", "", "1 Main St", "Springfield", "IL", "62701", "US"]]
                    ]]
                }
            ],
            "events": [
                {"eventAction": "registration", "eventDate": "1995-08-14T04:00:00Z"},
                {"eventAction": "expiration", "eventDate": "2030-08-13T04:00:00Z"},
                {"eventAction": "last update of RDAP database", "eventDate": "2024-01-02T00:00:00Z"},
                {"eventAction": "last changed", "eventDate": "2023-08-14T07:01:44Z"}
            ],
            "nameservers": [
                {"objectClassName": "nameserver", "ldhName": "A.IANA-SERVERS.NET"},
                {"objectClassName": "nameserver", "unicodeName": "b.iana-servers.net"}
            ],
            "secureDNS": {"delegationSigned": true}
        })
    }

    #[test]
    fn test_normalize_full_document() {
        let record = normalize_rdap_response(&sample_document(), "example.com");

        assert_eq!(record.source, RecordSource::Rdap);
        assert_eq!(record.domain, "example.com");
        assert_eq!(record.registrar.as_deref(), Some("Example Registrar Inc."));
        assert_eq!(record.creation_date.as_deref(), Some("1995-08-14T04:00:00Z"));
        assert_eq!(record.expiration_date.as_deref(), Some("2030-08-13T04:00:00Z"));
        assert_eq!(record.updated_date.as_deref(), Some("2023-08-14T07:01:44Z"));
        assert_eq!(
            record.name_servers,
            vec!["A.IANA-SERVERS.NET".to_string(), "b.iana-servers.net".to_string()]
        );
        assert_eq!(record.status.len(), 2);
        assert_eq!(record.dnssec, Some(true));
        assert!(record.raw_rdap.is_some());
    }

    #[test]
    fn test_normalize_registrant_contact() {
        let record = normalize_rdap_response(&sample_document(), "example.com");
        let registrant = record.registrant.unwrap();

        assert_eq!(registrant.name.as_deref(), Some("Jane Doe"));
        assert_eq!(registrant.organization.as_deref(), Some("Doe Holdings"));
        assert_eq!(registrant.phone.as_deref(), Some("+1.5555550100"));
        let address = registrant.address.unwrap();
        assert_eq!(address.street, vec!["1 Main St".to_string()]);
        assert_eq!(address.city.as_deref(), Some("Springfield"));
        assert_eq!(address.country.as_deref(), Some("US"));
        assert!(record.admin.is_none());
    }

    #[test]
    fn test_registrar_falls_back_to_org() {
        let json = serde_json::json!({
            "entities": [{
                "roles": ["registrar"],
                "vcardArray": ["vcard", [["org", {}, "text", "Registrar Org LLC"]]]
            }]
        });
        let record = normalize_rdap_response(&json, "example.com");
        assert_eq!(record.registrar.as_deref(), Some("Registrar Org LLC"));
    }

    #[test]
    fn test_updated_date_falls_back_to_database_update() {
        let json = serde_json::json!({
            "events": [
                {"eventAction": "last update of RDAP database", "eventDate": "2024-01-02T00:00:00Z"}
            ]
        });
        let record = normalize_rdap_response(&json, "example.com");
        assert_eq!(record.updated_date.as_deref(), Some("2024-01-02T00:00:00Z"));
    }

    #[test]
    fn test_normalize_empty_document() {
        let record = normalize_rdap_response(&serde_json::json!({}), "example.com");
        assert!(record.registrar.is_none());
        assert!(record.name_servers.is_empty());
        assert_eq!(record.dnssec, Some(false));
    }

    #[test]
    fn test_nested_entity_contact() {
        let json = serde_json::json!({
            "entities": [{
                "roles": ["registrar"],
                "entities": [{
                    "roles": ["technical"],
                    "vcardArray": ["vcard", [["email", {}, "text", "noc@example.net"]]]
                }]
            }]
        });
        let record = normalize_rdap_response(&json, "example.com");
        assert_eq!(
            record.tech.and_then(|c| c.email).as_deref(),
            Some("noc@example.net")
        );
        assert!(record.registrar.is_none());
    }

    #[test]
    fn test_rdap_domain_url() {
        assert_eq!(
            rdap_domain_url("https://rdap.verisign.com/com/v1/", "example.com").unwrap(),
            "https://rdap.verisign.com/com/v1/domain/example.com"
        );
        assert_eq!(
            rdap_domain_url("https://rdap.denic.de", "münchen.de").unwrap(),
            "https://rdap.denic.de/domain/xn--mnchen-3ya.de"
        );
    }

    #[tokio::test]
    async fn test_rdap_client_creation() {
        let client = RdapClient::new(MemoryCache::shared(), &LookupConfig::default());
        tokio_test::assert_ok!(client);
    }
}
