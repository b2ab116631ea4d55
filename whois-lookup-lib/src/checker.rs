//! Main WHOIS checker implementation.
//!
//! This module provides `WhoisChecker`, the entry point the surrounding
//! application talks to: single-domain queries and multi-TLD batch queries,
//! both resolved through a caller-supplied table of known servers.

use crate::concurrent::{run_batch, BatchSnapshot};
use crate::error::WhoisError;
use crate::parser::parse_record;
use crate::protocols::{KnownServers, NoKnownServers, ServerResolver};
use crate::types::{LookupConfig, ParsedRecord, QueryResult};
use crate::utils::build_domain_list;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;

/// Boxed stream of batch snapshots.
pub type SnapshotStream<'a> = Pin<Box<dyn Stream<Item = BatchSnapshot> + Send + 'a>>;

/// Coordinates server resolution, queries and batches.
///
/// # Example
///
/// ```rust,no_run
/// use whois_lookup_lib::{parse_record, WhoisChecker};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let checker = WhoisChecker::new();
///     let result = checker.query_domain("example.com").await?;
///     let record = parse_record(&result.raw);
///     println!("registered: {}", record.registered);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct WhoisChecker {
    /// Configuration settings for this checker instance
    config: LookupConfig,
    /// Resolver built from `config`
    resolver: ServerResolver,
    /// Servers known by the caller, consulted before IANA
    known: Arc<dyn KnownServers + Send + Sync>,
}

impl WhoisChecker {
    /// Create a new checker with default configuration and no known servers.
    ///
    /// Default settings:
    /// - Timeout: 10 seconds per attempt
    /// - Retries: 2
    /// - Concurrency: 1
    /// - Root server: whois.iana.org
    pub fn new() -> Self {
        Self::with_config(LookupConfig::default())
    }

    /// Create a new checker with custom configuration.
    ///
    /// # Example
    ///
    /// ```rust
    /// use whois_lookup_lib::{LookupConfig, QueryOptions, WhoisChecker};
    /// use std::time::Duration;
    ///
    /// let config = LookupConfig::default()
    ///     .with_concurrency(4)
    ///     .with_query_options(QueryOptions::resolver_default().with_timeout(Duration::from_secs(3)));
    ///
    /// let checker = WhoisChecker::with_config(config);
    /// ```
    pub fn with_config(config: LookupConfig) -> Self {
        let resolver = build_resolver(&config);
        Self {
            config,
            resolver,
            known: Arc::new(NoKnownServers),
        }
    }

    /// Use `known` as the known-server table.
    pub fn with_known_servers<K>(mut self, known: K) -> Self
    where
        K: KnownServers + Send + Sync + 'static,
    {
        self.known = Arc::new(known);
        self
    }

    /// Query the WHOIS record of one full domain name.
    ///
    /// The TLD's server is taken from the known servers when present,
    /// otherwise discovered through the root server.
    ///
    /// # Errors
    ///
    /// - `Validation` if the domain has no TLD
    /// - `ServerNotFound` if no referral exists for the TLD
    /// - `ConnectionFailed` if the retry budget ran out
    pub async fn query_domain(&self, domain: &str) -> Result<QueryResult, WhoisError> {
        self.resolver.query_domain(domain, self.known.as_ref()).await
    }

    /// Query one domain and parse its record.
    pub async fn lookup_domain(&self, domain: &str) -> Result<(QueryResult, ParsedRecord), WhoisError> {
        let result = self.query_domain(domain).await?;
        let record = parse_record(&result.raw);
        Ok((result, record))
    }

    /// Query `base_name` under every TLD in `tlds`.
    ///
    /// Input is validated before any network activity. The stream yields an
    /// all-pending snapshot first, then one snapshot per completed domain.
    /// A failing domain only marks its own item as `Error`.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use whois_lookup_lib::WhoisChecker;
    /// use futures::StreamExt;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let checker = WhoisChecker::new();
    ///     let mut snapshots = checker.query_batch("example", &["com", "net"])?;
    ///     while let Some(snapshot) = snapshots.next().await {
    ///         println!("{}/{} done", snapshot.completed(), snapshot.len());
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub fn query_batch<S: AsRef<str>>(
        &self,
        base_name: &str,
        tlds: &[S],
    ) -> Result<SnapshotStream<'_>, WhoisError> {
        let domains = build_domain_list(base_name, tlds)?;
        let stream = run_batch(
            &self.resolver,
            self.known.as_ref(),
            domains,
            self.config.concurrency,
        );
        Ok(stream.boxed())
    }

    /// Run a batch to completion and return the final snapshot.
    pub async fn query_batch_collect<S: AsRef<str>>(
        &self,
        base_name: &str,
        tlds: &[S],
    ) -> Result<BatchSnapshot, WhoisError> {
        let mut stream = self.query_batch(base_name, tlds)?;
        let mut last = None;
        while let Some(snapshot) = stream.next().await {
            last = Some(snapshot);
        }
        last.ok_or_else(|| WhoisError::validation(base_name, "Batch produced no snapshots"))
    }

    /// Get the current configuration for this checker.
    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    pub fn resolver(&self) -> &ServerResolver {
        &self.resolver
    }

    /// Update the configuration, rebuilding the resolver.
    pub fn set_config(&mut self, config: LookupConfig) {
        self.resolver = build_resolver(&config);
        self.config = config;
    }
}

impl Default for WhoisChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn build_resolver(config: &LookupConfig) -> ServerResolver {
    ServerResolver::with_options(config.query).with_root(config.root_server.clone())
}
