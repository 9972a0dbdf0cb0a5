//! Configuration file parsing and management.
//!
//! Settings come from three layers, lowest precedence first: built-in
//! [`LookupConfig`] defaults, TOML files, then `DL_*` environment variables.
//! Command-line flags are applied on top by the binary.

use crate::error::LookupError;
use crate::types::{LookupConfig, TldMapping};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration loaded from TOML files.
///
/// ```toml
/// [lookup]
/// concurrency = 5
/// rdap_timeout = "10s"
/// whois_timeout = "10s"
///
/// [cache]
/// domain_lookup_ttl = "10m"
///
/// [whois_timeouts]
/// "whois.slow-registry.example" = "20s"
///
/// [[tld]]
/// tld = "dev"
/// rdap = "https://pubapi.registry.google/rdap"
/// whois = "whois.nic.google"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup: Option<LookupSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheSection>,

    /// Per-server WHOIS timeouts (host → duration string)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois_timeouts: Option<HashMap<String, String>>,

    /// Extra or overriding TLD mappings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tld: Vec<TldEntry>,
}

/// `[lookup]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LookupSection {
    /// Default bulk batch size (1-10)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rdap_timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois_timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Whether the built-in registry table is loaded (default true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builtin_tlds: Option<bool>,
}

/// `[cache]` section; every value is a duration string.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_lookup_ttl: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rdap_ttl: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois_ttl: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tld_mapping_ttl: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tld_validity_ttl: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub two_level_tlds_ttl: Option<String>,
}

/// One `[[tld]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TldEntry {
    pub tld: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rdap: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois: Option<String>,
}

impl From<&TldEntry> for TldMapping {
    fn from(entry: &TldEntry) -> Self {
        TldMapping {
            rdap_server: entry.rdap.clone(),
            whois_server: entry.whois.clone(),
            ..TldMapping::new(entry.tld.as_str())
        }
    }
}

impl FileConfig {
    /// Overlay the file's settings on `base`.
    ///
    /// Duration strings are validated on load, so a parse failure here means
    /// the value was constructed in code.
    pub fn apply_to(&self, mut base: LookupConfig) -> Result<LookupConfig, LookupError> {
        if let Some(lookup) = &self.lookup {
            if let Some(concurrency) = lookup.concurrency {
                base = base.with_default_max_concurrent(concurrency);
            }
            if let Some(timeout) = &lookup.rdap_timeout {
                base.rdap_timeout = require_duration("rdap_timeout", timeout)?;
            }
            if let Some(timeout) = &lookup.whois_timeout {
                base.whois_timeout = require_duration("whois_timeout", timeout)?;
            }
            if let Some(user_agent) = &lookup.user_agent {
                base.user_agent = user_agent.clone();
            }
        }

        if let Some(cache) = &self.cache {
            let ttls = [
                ("domain_lookup_ttl", &cache.domain_lookup_ttl, &mut base.domain_lookup_ttl),
                ("rdap_ttl", &cache.rdap_ttl, &mut base.rdap_ttl),
                ("whois_ttl", &cache.whois_ttl, &mut base.whois_ttl),
                ("tld_mapping_ttl", &cache.tld_mapping_ttl, &mut base.tld_mapping_ttl),
                ("tld_validity_ttl", &cache.tld_validity_ttl, &mut base.tld_validity_ttl),
                (
                    "two_level_tlds_ttl",
                    &cache.two_level_tlds_ttl,
                    &mut base.two_level_tlds_ttl,
                ),
            ];
            for (name, value, target) in ttls {
                if let Some(value) = value {
                    *target = require_duration(name, value)?;
                }
            }
        }

        if let Some(timeouts) = &self.whois_timeouts {
            for (server, value) in timeouts {
                let timeout = require_duration(server, value)?;
                base = base.with_whois_server_timeout(server.as_str(), timeout);
            }
        }

        Ok(base)
    }

    /// TLD mappings declared with `[[tld]]`.
    pub fn tld_mappings(&self) -> Vec<TldMapping> {
        self.tld.iter().map(TldMapping::from).collect()
    }

    /// Whether the built-in registry table should be loaded.
    pub fn use_builtin_tlds(&self) -> bool {
        self.lookup
            .as_ref()
            .and_then(|l| l.builtin_tlds)
            .unwrap_or(true)
    }
}

fn require_duration(name: &str, value: &str) -> Result<Duration, LookupError> {
    parse_duration_string(value).ok_or_else(|| {
        LookupError::config(format!(
            "Invalid duration '{}' for '{}'. Use format like '5s', '2m', '1h'",
            value, name
        ))
    })
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to report which files were loaded
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load and validate configuration from a specific file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, LookupError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(LookupError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            LookupError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            LookupError::config(format!("Failed to parse TOML configuration: {}", e))
        })?;

        self.validate_config(&config)?;

        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Discover and merge configuration files.
    ///
    /// `$XDG_CONFIG_HOME/domain-lookup/config.toml` is loaded first and
    /// `./domain-lookup.toml` overrides it. Unreadable or invalid files are
    /// skipped with a warning.
    pub fn discover_and_load(&self) -> Result<FileConfig, LookupError> {
        let mut merged = FileConfig::default();
        let mut loaded_files = Vec::new();

        for path in [self.get_xdg_config_path(), self.get_local_config_path()]
            .into_iter()
            .flatten()
        {
            match self.load_file(&path) {
                Ok(config) => {
                    merged = self.merge_configs(merged, config);
                    loaded_files.push(path);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Ignoring configuration file"),
            }
        }

        if self.verbose && !loaded_files.is_empty() {
            for path in &loaded_files {
                eprintln!("🔧 Using config file {}", path.display());
            }
        }

        Ok(merged)
    }

    fn get_local_config_path(&self) -> Option<PathBuf> {
        let path = Path::new("./domain-lookup.toml");
        path.exists().then(|| path.to_path_buf())
    }

    /// Follows the XDG Base Directory Specification.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("domain-lookup").join("config.toml");
        path.exists().then_some(path)
    }

    /// Merge two configurations; values from `higher` win.
    ///
    /// TLD entries are concatenated so later files can override single TLDs.
    fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            lookup: match (lower.lookup, higher.lookup) {
                (Some(lower), Some(higher)) => Some(LookupSection {
                    concurrency: higher.concurrency.or(lower.concurrency),
                    rdap_timeout: higher.rdap_timeout.or(lower.rdap_timeout),
                    whois_timeout: higher.whois_timeout.or(lower.whois_timeout),
                    user_agent: higher.user_agent.or(lower.user_agent),
                    builtin_tlds: higher.builtin_tlds.or(lower.builtin_tlds),
                }),
                (lower, higher) => higher.or(lower),
            },
            cache: match (lower.cache, higher.cache) {
                (Some(lower), Some(higher)) => Some(CacheSection {
                    domain_lookup_ttl: higher.domain_lookup_ttl.or(lower.domain_lookup_ttl),
                    rdap_ttl: higher.rdap_ttl.or(lower.rdap_ttl),
                    whois_ttl: higher.whois_ttl.or(lower.whois_ttl),
                    tld_mapping_ttl: higher.tld_mapping_ttl.or(lower.tld_mapping_ttl),
                    tld_validity_ttl: higher.tld_validity_ttl.or(lower.tld_validity_ttl),
                    two_level_tlds_ttl: higher.two_level_tlds_ttl.or(lower.two_level_tlds_ttl),
                }),
                (lower, higher) => higher.or(lower),
            },
            whois_timeouts: match (lower.whois_timeouts, higher.whois_timeouts) {
                (Some(mut lower), Some(higher)) => {
                    lower.extend(higher);
                    Some(lower)
                }
                (lower, higher) => higher.or(lower),
            },
            tld: lower.tld.into_iter().chain(higher.tld).collect(),
        }
    }

    fn validate_config(&self, config: &FileConfig) -> Result<(), LookupError> {
        if let Some(lookup) = &config.lookup {
            if let Some(concurrency) = lookup.concurrency {
                if !(1..=10).contains(&concurrency) {
                    return Err(LookupError::config("Concurrency must be between 1 and 10"));
                }
            }
            if let Some(timeout) = &lookup.rdap_timeout {
                require_duration("rdap_timeout", timeout)?;
            }
            if let Some(timeout) = &lookup.whois_timeout {
                require_duration("whois_timeout", timeout)?;
            }
        }

        if let Some(cache) = &config.cache {
            for (name, value) in [
                ("domain_lookup_ttl", &cache.domain_lookup_ttl),
                ("rdap_ttl", &cache.rdap_ttl),
                ("whois_ttl", &cache.whois_ttl),
                ("tld_mapping_ttl", &cache.tld_mapping_ttl),
                ("tld_validity_ttl", &cache.tld_validity_ttl),
                ("two_level_tlds_ttl", &cache.two_level_tlds_ttl),
            ] {
                if let Some(value) = value {
                    require_duration(name, value)?;
                }
            }
        }

        if let Some(timeouts) = &config.whois_timeouts {
            for (server, value) in timeouts {
                if server.trim().is_empty() {
                    return Err(LookupError::config("WHOIS timeout server names cannot be empty"));
                }
                require_duration(server, value)?;
            }
        }

        for entry in &config.tld {
            let tld = entry.tld.trim().trim_start_matches('.');
            if tld.is_empty() || tld.contains(' ') {
                return Err(LookupError::config(format!(
                    "Invalid TLD '{}' in [[tld]] entry",
                    entry.tld
                )));
            }
            if let Some(rdap) = &entry.rdap {
                match url::Url::parse(rdap) {
                    Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                    _ => {
                        return Err(LookupError::config(format!(
                            "Invalid RDAP URL '{}' for TLD '{}'",
                            rdap, entry.tld
                        )))
                    }
                }
            }
        }

        Ok(())
    }
}

/// Settings read from `DL_*` environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub concurrency: Option<usize>,
    pub rdap_timeout: Option<Duration>,
    pub whois_timeout: Option<Duration>,
    pub config: Option<String>,
}

impl EnvConfig {
    pub fn apply_to(&self, mut base: LookupConfig) -> LookupConfig {
        if let Some(concurrency) = self.concurrency {
            base = base.with_default_max_concurrent(concurrency);
        }
        if let Some(timeout) = self.rdap_timeout {
            base.rdap_timeout = timeout;
        }
        if let Some(timeout) = self.whois_timeout {
            base.whois_timeout = timeout;
        }
        base
    }
}

/// Load configuration from environment variables.
///
/// Invalid values are logged and ignored.
pub fn load_env_config() -> EnvConfig {
    let mut env_config = EnvConfig::default();

    if let Ok(val) = env::var("DL_CONCURRENCY") {
        match val.parse::<usize>() {
            Ok(concurrency) if (1..=10).contains(&concurrency) => {
                debug!(concurrency, "Using DL_CONCURRENCY");
                env_config.concurrency = Some(concurrency);
            }
            _ => warn!(value = %val, "Invalid DL_CONCURRENCY, must be 1-10"),
        }
    }

    for (name, target) in [
        ("DL_RDAP_TIMEOUT", &mut env_config.rdap_timeout),
        ("DL_WHOIS_TIMEOUT", &mut env_config.whois_timeout),
    ] {
        if let Ok(val) = env::var(name) {
            match parse_duration_string(&val) {
                Some(timeout) => {
                    debug!(variable = name, value = %val, "Using timeout from environment");
                    *target = Some(timeout);
                }
                None => warn!(
                    variable = name,
                    value = %val,
                    "Invalid timeout, use format like '5s', '30s', '2m'"
                ),
            }
        }
    }

    if let Ok(config_path) = env::var("DL_CONFIG") {
        if !config_path.trim().is_empty() {
            debug!(path = %config_path, "Using DL_CONFIG");
            env_config.config = Some(config_path);
        }
    }

    env_config
}

/// Parse a duration like "500ms", "5s", "2m" or "1h". A bare number is seconds.
pub fn parse_duration_string(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();

    if let Some(ms) = value.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = value.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = value.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else if let Some(hours) = value.strip_suffix('h') {
        hours.parse::<u64>().ok().map(|h| Duration::from_secs(h * 3600))
    } else {
        value.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_parse_duration_string() {
        assert_eq!(parse_duration_string("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration_string("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration_string("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration_string("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration_string(" 7 "), Some(Duration::from_secs(7)));
        assert_eq!(parse_duration_string("soon"), None);
        assert_eq!(parse_duration_string(""), None);
    }

    #[test]
    fn test_load_valid_config() {
        let temp_file = write_config(
            r#"
[lookup]
concurrency = 3
rdap_timeout = "4s"
whois_timeout = "2m"

[cache]
rdap_ttl = "1m"

[whois_timeouts]
"whois.slow.example" = "20s"

[[tld]]
tld = ".Dev"
rdap = "https://pubapi.registry.google/rdap"

[[tld]]
tld = "example"
whois = "whois.nic.example"
"#,
        );

        let config = ConfigManager::new(false).load_file(temp_file.path()).unwrap();
        let applied = config.apply_to(LookupConfig::default()).unwrap();

        assert_eq!(applied.default_max_concurrent, 3);
        assert_eq!(applied.rdap_timeout, Duration::from_secs(4));
        assert_eq!(applied.whois_timeout, Duration::from_secs(120));
        assert_eq!(applied.rdap_ttl, Duration::from_secs(60));
        assert_eq!(applied.whois_ttl, Duration::from_secs(300));
        assert_eq!(
            applied.whois_server_timeouts.get("whois.slow.example"),
            Some(&Duration::from_secs(20))
        );

        let mappings = config.tld_mappings();
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[0].tld, "dev");
        assert_eq!(mappings[1].whois_server.as_deref(), Some("whois.nic.example"));
        assert!(config.use_builtin_tlds());
    }

    #[test]
    fn test_cache_section_covers_every_layer() {
        let temp_file = write_config(
            r#"
[cache]
domain_lookup_ttl = "30s"
tld_mapping_ttl = "2h"
tld_validity_ttl = "12h"
two_level_tlds_ttl = "48h"
"#,
        );

        let config = ConfigManager::new(false).load_file(temp_file.path()).unwrap();
        let applied = config.apply_to(LookupConfig::default()).unwrap();

        assert_eq!(applied.domain_lookup_ttl, Duration::from_secs(30));
        assert_eq!(applied.tld_mapping_ttl, Duration::from_secs(2 * 3600));
        assert_eq!(applied.tld_validity_ttl, Duration::from_secs(12 * 3600));
        assert_eq!(applied.two_level_tlds_ttl, Duration::from_secs(48 * 3600));
        assert_eq!(applied.rdap_ttl, LookupConfig::default().rdap_ttl);

        let invalid = write_config("[cache]
two_level_tlds_ttl = \"weekly\"\n");
        assert!(matches!(
            ConfigManager::new(false).load_file(invalid.path()),
            Err(LookupError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_merge_cache_sections() {
        let lower = FileConfig {
            cache: Some(CacheSection {
                tld_validity_ttl: Some("1h".to_string()),
                two_level_tlds_ttl: Some("24h".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let higher = FileConfig {
            cache: Some(CacheSection {
                two_level_tlds_ttl: Some("3h".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let merged = ConfigManager::new(false).merge_configs(lower, higher);
        let cache = merged.cache.as_ref().unwrap();
        assert_eq!(cache.tld_validity_ttl.as_deref(), Some("1h"));
        assert_eq!(cache.two_level_tlds_ttl.as_deref(), Some("3h"));
    }

    #[test]
    fn test_invalid_concurrency() {
        let temp_file = write_config("[lookup]\nconcurrency = 11\n");
        let result = ConfigManager::new(false).load_file(temp_file.path());
        assert!(matches!(result, Err(LookupError::ConfigError { .. })));
    }

    #[test]
    fn test_invalid_timeout() {
        let temp_file = write_config("[lookup]\nrdap_timeout = \"fast\"\n");
        assert!(ConfigManager::new(false).load_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_invalid_tld_entries() {
        let empty = write_config("[[tld]]\ntld = \"\"\n");
        assert!(ConfigManager::new(false).load_file(empty.path()).is_err());

        let bad_url = write_config("[[tld]]\ntld = \"dev\"\nrdap = \"ftp://rdap.example\"\n");
        assert!(ConfigManager::new(false).load_file(bad_url.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigManager::new(false).load_file("/nonexistent/domain-lookup.toml");
        assert!(matches!(result, Err(LookupError::FileError { .. })));
    }

    #[test]
    fn test_merge_configs() {
        let manager = ConfigManager::new(false);

        let lower = FileConfig {
            lookup: Some(LookupSection {
                concurrency: Some(2),
                rdap_timeout: Some("5s".to_string()),
                ..Default::default()
            }),
            tld: vec![TldEntry {
                tld: "dev".to_string(),
                rdap: None,
                whois: Some("old.example".to_string()),
            }],
            ..Default::default()
        };

        let higher = FileConfig {
            lookup: Some(LookupSection {
                concurrency: Some(8),
                ..Default::default()
            }),
            tld: vec![TldEntry {
                tld: "dev".to_string(),
                rdap: None,
                whois: Some("new.example".to_string()),
            }],
            ..Default::default()
        };

        let merged = manager.merge_configs(lower, higher);
        let lookup = merged.lookup.as_ref().unwrap();
        assert_eq!(lookup.concurrency, Some(8));
        assert_eq!(lookup.rdap_timeout.as_deref(), Some("5s"));
        assert_eq!(merged.tld.len(), 2);
        assert_eq!(merged.tld[1].whois.as_deref(), Some("new.example"));
    }

    #[test]
    fn test_env_config_apply() {
        let env_config = EnvConfig {
            concurrency: Some(20),
            whois_timeout: Some(Duration::from_secs(3)),
            ..Default::default()
        };
        let applied = env_config.apply_to(LookupConfig::default());
        assert_eq!(applied.default_max_concurrent, 10);
        assert_eq!(applied.whois_timeout, Duration::from_secs(3));
        assert_eq!(applied.rdap_timeout, Duration::from_secs(10));
    }
}
