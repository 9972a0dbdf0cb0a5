//! WHOIS protocol implementation.
//!
//! WHOIS (RFC 3912) is a plain TCP exchange on port 43: send the query
//! followed by CRLF, then read until the server closes the connection.
//! Responses are free-form text, so only common `key: value` fields are
//! extracted into a [`RegistrationRecord`].

use crate::cache::{remember_with_hit_info, SharedCache};
use crate::error::LookupError;
use crate::types::{LookupConfig, QueryOutcome, RecordSource, RegistrationRecord};
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, error, warn};

/// Standard WHOIS port.
pub const WHOIS_PORT: u16 = 43;

/// Responses beyond this size are truncated.
const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

/// WHOIS client speaking the protocol directly over TCP.
#[derive(Clone)]
pub struct WhoisClient {
    cache: SharedCache,
    cache_ttl: Duration,
    /// Timeout for servers without an override
    default_timeout: Duration,
    /// Per-server overrides, keyed by lowercase host
    server_timeouts: HashMap<String, Duration>,
    port: u16,
}

impl WhoisClient {
    pub fn new(cache: SharedCache, config: &LookupConfig) -> Self {
        Self {
            cache,
            cache_ttl: config.whois_ttl,
            default_timeout: config.whois_timeout,
            server_timeouts: config.whois_server_timeouts.clone(),
            port: WHOIS_PORT,
        }
    }

    /// Connect to a port other than 43.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Timeout applied to the whole exchange with `server`.
    pub fn timeout_for(&self, server: &str) -> Duration {
        self.server_timeouts
            .get(&server.to_lowercase())
            .copied()
            .unwrap_or(self.default_timeout)
    }

    /// Query `server` for `domain`.
    ///
    /// Any text response counts as found; WHOIS has no reliable "no match"
    /// signal, so this never returns `NotFound`.
    pub async fn query(&self, domain: &str, server: &str) -> QueryOutcome {
        let key = format!("WhoisClient::query::{}::{}", domain, server);
        let result = remember_with_hit_info(self.cache.as_ref(), &key, self.cache_ttl, || async {
            let raw = self.fetch_raw(domain, server).await?;
            Ok(Some(parse_whois_response(&raw, domain)))
        })
        .await;
        QueryOutcome::from_result(result)
    }

    /// Send `domain` to `server` and return the trimmed response text.
    pub async fn fetch_raw(&self, domain: &str, server: &str) -> Result<String, LookupError> {
        let timeout = self.timeout_for(server);
        debug!(domain, server, timeout_ms = timeout.as_millis() as u64, "Connecting to WHOIS server");

        match tokio::time::timeout(timeout, self.exchange(domain, server)).await {
            Ok(result) => result,
            Err(_) => {
                error!(domain, server, "WHOIS query timeout");
                Err(LookupError::timeout(
                    format!("WHOIS query for {} on {}", domain, server),
                    timeout,
                ))
            }
        }
    }

    async fn exchange(&self, domain: &str, server: &str) -> Result<String, LookupError> {
        let addrs: Vec<_> = match tokio::net::lookup_host((server, self.port)).await {
            Ok(addrs) => addrs.collect(),
            Err(e) => {
                error!(domain, server, error = %e, "WHOIS server not found");
                return Err(LookupError::whois_server_not_found(server));
            }
        };
        if addrs.is_empty() {
            error!(domain, server, "WHOIS server not found");
            return Err(LookupError::whois_server_not_found(server));
        }

        let mut stream = TcpStream::connect(&addrs[..]).await.map_err(|e| {
            error!(domain, server, error = %e, code = ?e.kind(), "WHOIS connection error");
            LookupError::from(e)
        })?;
        debug!(domain, server, "WHOIS connection established");

        stream
            .write_all(format!("{}\r\n", domain).as_bytes())
            .await?;
        stream.flush().await?;

        let mut response = Vec::new();
        let mut buffer = [0u8; 8192];
        loop {
            let n = stream.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            response.extend_from_slice(&buffer[..n]);
            if response.len() > MAX_RESPONSE_BYTES {
                warn!(
                    domain,
                    server,
                    limit = MAX_RESPONSE_BYTES,
                    "WHOIS response exceeded 1MB, truncating"
                );
                response.truncate(MAX_RESPONSE_BYTES);
                break;
            }
        }

        let text = String::from_utf8_lossy(&response).trim().to_string();
        debug!(domain, server, response_length = text.len(), "WHOIS query completed");
        Ok(text)
    }
}

/// Extract the commonly shared `key: value` fields from a WHOIS response.
///
/// Keys are matched case-insensitively. Name servers are uppercased and
/// statuses reduced to their first token (dropping trailing ICANN URLs);
/// both lists are de-duplicated in order of appearance.
pub fn parse_whois_response(raw: &str, domain: &str) -> RegistrationRecord {
    let mut record = RegistrationRecord::new(domain.to_lowercase(), RecordSource::Whois);
    record.dnssec = Some(false);

    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if is_notice_line(line) {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "registrar" if !value.is_empty() => record.registrar = Some(value.to_string()),
            "creation date" | "created" if !value.is_empty() => {
                record.creation_date = Some(value.to_string())
            }
            "registry expiry date" | "expiry date" | "expires" | "expiration date"
                if !value.is_empty() =>
            {
                record.expiration_date = Some(value.to_string())
            }
            "updated date" | "last updated" | "modified" if !value.is_empty() => {
                record.updated_date = Some(value.to_string())
            }
            "name server" | "nameserver" | "nserver" => {
                let ns = value.to_uppercase();
                if !ns.is_empty() && !record.name_servers.contains(&ns) {
                    record.name_servers.push(ns);
                }
            }
            "domain status" | "status" => {
                if let Some(status) = value.split_whitespace().next() {
                    if !record.status.iter().any(|s| s == status) {
                        record.status.push(status.to_string());
                    }
                }
            }
            "dnssec" => {
                let value = value.to_lowercase();
                record.dnssec = Some(value != "unsigned" && value != "no");
            }
            _ => {}
        }
    }

    record.raw_whois = Some(raw.to_string());
    record
}

fn is_notice_line(line: &str) -> bool {
    line.starts_with('%')
        || line.starts_with(">>>")
        || line.starts_with("NOTICE:")
        || line.starts_with("TERMS OF USE:")
        || line.starts_with("For more information")
}
