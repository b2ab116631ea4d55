//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and
//! environment variables and merging them with proper precedence rules.

use crate::error::WhoisError;
use crate::types::{LookupConfig, QueryOptions, ServerTarget, TextEncoding};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Most retries a configuration may ask for.
const MAX_CONFIG_RETRIES: u32 = 10;

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    /// Overrides for the low-level client used for direct server queries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryOverrides>,

    /// Overrides for resolution and domain queries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolver: Option<QueryOverrides>,

    /// Batch defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchConfig>,

    /// Known WHOIS servers, TLD -> host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers: Option<BTreeMap<String, String>>,
}

/// Field-by-field overrides for `QueryOptions`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct QueryOverrides {
    /// Attempt timeout (as string, e.g., "5s", "500ms", "1m")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<TextEncoding>,

    /// Delay between attempts (same format as `timeout`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_delay: Option<String>,

    /// Root server host (only meaningful under `[resolver]`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_server: Option<String>,
}

impl QueryOverrides {
    /// Apply the set fields on top of `base`. Invalid durations are skipped;
    /// `ConfigManager` rejects them at load time.
    pub fn apply(&self, base: QueryOptions) -> QueryOptions {
        let mut options = base;
        if let Some(timeout) = self.timeout.as_deref().and_then(parse_duration_string) {
            options = options.with_timeout(timeout);
        }
        if let Some(max_retries) = self.max_retries {
            options = options.with_max_retries(max_retries);
        }
        if let Some(encoding) = self.encoding {
            options = options.with_encoding(encoding);
        }
        if let Some(delay) = self.retry_delay.as_deref().and_then(parse_duration_string) {
            options = options.with_retry_delay(delay);
        }
        options
    }

    fn merge(mut self, higher: QueryOverrides) -> QueryOverrides {
        if higher.timeout.is_some() {
            self.timeout = higher.timeout;
        }
        if higher.max_retries.is_some() {
            self.max_retries = higher.max_retries;
        }
        if higher.encoding.is_some() {
            self.encoding = higher.encoding;
        }
        if higher.retry_delay.is_some() {
            self.retry_delay = higher.retry_delay;
        }
        if higher.root_server.is_some() {
            self.root_server = higher.root_server;
        }
        self
    }
}

/// Batch defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BatchConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// TLDs used when the caller gives none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tlds: Option<Vec<String>>,
}

impl FileConfig {
    /// Options for the low-level client.
    pub fn query_options(&self) -> QueryOptions {
        match &self.query {
            Some(overrides) => overrides.apply(QueryOptions::default()),
            None => QueryOptions::default(),
        }
    }

    /// Build a `LookupConfig` from the `[resolver]` and `[batch]` tables.
    pub fn lookup_config(&self) -> LookupConfig {
        let mut config = LookupConfig::default();
        if let Some(resolver) = &self.resolver {
            config = config.with_query_options(resolver.apply(QueryOptions::resolver_default()));
            if let Some(root) = &resolver.root_server {
                config = config.with_root_server(ServerTarget::parse(root));
            }
        }
        if let Some(concurrency) = self.batch.as_ref().and_then(|b| b.concurrency) {
            config = config.with_concurrency(concurrency);
        }
        config
    }

    /// Known-server table with lowercase TLD keys.
    pub fn known_servers(&self) -> BTreeMap<String, String> {
        self.servers
            .iter()
            .flatten()
            .map(|(tld, host)| (crate::utils::normalize_tld(tld), host.trim().to_string()))
            .collect()
    }

    pub fn default_tlds(&self) -> Option<Vec<String>> {
        self.batch.as_ref().and_then(|b| b.tlds.clone())
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to emit warnings for config issues
    pub verbose: bool,
}

impl ConfigManager {
    /// Create a new configuration manager.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The parsed configuration or an error if parsing or validation fails.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, WhoisError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(WhoisError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            WhoisError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content)
            .map_err(|e| WhoisError::config(format!("Failed to parse TOML configuration: {}", e)))?;

        self.validate_config(&config)?;
        debug!(path = %path.display(), "Loaded configuration file");

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config, then the home directory, then the current directory;
    /// later files override earlier ones.
    pub fn discover_and_load(&self) -> Result<FileConfig, WhoisError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => {
                    if self.verbose {
                        warn!(path = %path.display(), error = %e, "Skipping configuration file");
                    }
                }
            }
        }

        if self.verbose && loaded_files.len() > 1 {
            for (i, path) in loaded_files.iter().enumerate() {
                let precedence = if i == loaded_files.len() - 1 {
                    "highest"
                } else {
                    "overridden where set later"
                };
                warn!(path = %path.display(), precedence, "Multiple config files found");
            }
        }

        Ok(merged_config)
    }

    /// Get the local configuration file path.
    ///
    /// Looks for configuration files in the current directory.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        let candidates = ["./whois-lookup.toml", "./.whois-lookup.toml"];

        candidates
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    /// Get the global configuration file path.
    ///
    /// Looks for configuration files in the user's home directory.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        let candidates = [".whois-lookup.toml", "whois-lookup.toml"];

        candidates
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Get the XDG configuration file path.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("whois-lookup").join("config.toml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Merge two configurations with proper precedence.
    ///
    /// Values from `higher` take precedence over values from `lower`.
    pub fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            query: merge_overrides(lower.query, higher.query),
            resolver: merge_overrides(lower.resolver, higher.resolver),
            batch: match (lower.batch, higher.batch) {
                (Some(mut lower_batch), Some(higher_batch)) => {
                    if higher_batch.concurrency.is_some() {
                        lower_batch.concurrency = higher_batch.concurrency;
                    }
                    if higher_batch.tlds.is_some() {
                        lower_batch.tlds = higher_batch.tlds;
                    }
                    Some(lower_batch)
                }
                (lower_batch, higher_batch) => higher_batch.or(lower_batch),
            },
            servers: match (lower.servers, higher.servers) {
                (Some(mut lower_servers), Some(higher_servers)) => {
                    lower_servers.extend(higher_servers);
                    Some(lower_servers)
                }
                (lower_servers, higher_servers) => higher_servers.or(lower_servers),
            },
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), WhoisError> {
        for (section, overrides) in [("query", &config.query), ("resolver", &config.resolver)] {
            let Some(overrides) = overrides else {
                continue;
            };

            for (name, value) in [("timeout", &overrides.timeout), ("retry_delay", &overrides.retry_delay)] {
                if let Some(value) = value {
                    match parse_duration_string(value) {
                        Some(d) if name == "retry_delay" || !d.is_zero() => {}
                        _ => {
                            return Err(WhoisError::config(format!(
                                "Invalid {}.{} '{}'. Use format like '5s', '500ms', '2m'",
                                section, name, value
                            )));
                        }
                    }
                }
            }

            if let Some(retries) = overrides.max_retries {
                if retries > MAX_CONFIG_RETRIES {
                    return Err(WhoisError::config(format!(
                        "{}.max_retries must be between 0 and {}",
                        section, MAX_CONFIG_RETRIES
                    )));
                }
            }
        }

        if let Some(concurrency) = config.batch.as_ref().and_then(|b| b.concurrency) {
            if concurrency == 0 || concurrency > 100 {
                return Err(WhoisError::config("Concurrency must be between 1 and 100"));
            }
        }

        if let Some(servers) = &config.servers {
            for (tld, host) in servers {
                if !is_valid_tld_key(tld) {
                    return Err(WhoisError::config(format!("Invalid TLD '{}' in [servers]", tld)));
                }
                if host.trim().is_empty() || host.contains(char::is_whitespace) {
                    return Err(WhoisError::config(format!(
                        "Invalid server '{}' for TLD '{}'",
                        host, tld
                    )));
                }
            }
        }

        Ok(())
    }
}

fn merge_overrides(
    lower: Option<QueryOverrides>,
    higher: Option<QueryOverrides>,
) -> Option<QueryOverrides> {
    match (lower, higher) {
        (Some(lower), Some(higher)) => Some(lower.merge(higher)),
        (lower, higher) => higher.or(lower),
    }
}

fn is_valid_tld_key(tld: &str) -> bool {
    let tld = crate::utils::normalize_tld(tld);
    !tld.is_empty() && !tld.contains('.') && !tld.contains(char::is_whitespace)
}

/// Environment variable configuration that mirrors CLI options.
///
/// This represents configuration values that can be set via WL_* environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub encoding: Option<TextEncoding>,
    pub concurrency: Option<usize>,
    pub tlds: Option<Vec<String>>,
}

impl EnvConfig {
    /// Apply the set fields on top of `options`.
    pub fn apply_query(&self, mut options: QueryOptions) -> QueryOptions {
        if let Some(timeout) = self.timeout {
            options = options.with_timeout(timeout);
        }
        if let Some(max_retries) = self.max_retries {
            options = options.with_max_retries(max_retries);
        }
        if let Some(encoding) = self.encoding {
            options = options.with_encoding(encoding);
        }
        options
    }
}

/// Load configuration from environment variables.
///
/// Parses all WL_* environment variables. Invalid values are logged as
/// warnings and ignored.
pub fn load_env_config() -> EnvConfig {
    env_config_from(|key| env::var(key).ok())
}

/// Build an `EnvConfig` from any variable source.
pub fn env_config_from<F>(lookup: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();

    if let Some(val) = lookup("WL_TIMEOUT") {
        match parse_duration_string(&val) {
            Some(timeout) if !timeout.is_zero() => env_config.timeout = Some(timeout),
            _ => warn!(value = %val, "Invalid WL_TIMEOUT, use format like '5s', '30s', '2m'"),
        }
    }

    if let Some(val) = lookup("WL_RETRIES") {
        match val.trim().parse::<u32>() {
            Ok(retries) if retries <= MAX_CONFIG_RETRIES => env_config.max_retries = Some(retries),
            _ => warn!(value = %val, "Invalid WL_RETRIES, must be 0-{}", MAX_CONFIG_RETRIES),
        }
    }

    if let Some(val) = lookup("WL_ENCODING") {
        match TextEncoding::from_name(&val) {
            Some(encoding) => env_config.encoding = Some(encoding),
            None => warn!(value = %val, "Invalid WL_ENCODING, use utf-8 or latin1"),
        }
    }

    if let Some(val) = lookup("WL_CONCURRENCY") {
        match val.trim().parse::<usize>() {
            Ok(concurrency) if (1..=100).contains(&concurrency) => {
                env_config.concurrency = Some(concurrency)
            }
            _ => warn!(value = %val, "Invalid WL_CONCURRENCY, must be 1-100"),
        }
    }

    if let Some(val) = lookup("WL_TLDS") {
        let tlds: Vec<String> = val
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !tlds.is_empty() {
            env_config.tlds = Some(tlds);
        }
    }

    env_config
}

/// Parse a duration string like "500ms", "5s", "2m" (bare numbers are seconds).
pub fn parse_duration_string(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();

    if let Some(ms) = value.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = value.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = value.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        value.parse::<u64>().ok().map(Duration::from_secs)
    }
}
