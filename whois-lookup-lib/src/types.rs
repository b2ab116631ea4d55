//! Core data types for WHOIS lookups.
//!
//! This module defines the query options, connection targets, raw query
//! results, parsed records and batch items used throughout the library.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Well-known WHOIS port.
pub const WHOIS_PORT: u16 = 43;

/// Character encoding used to decode a WHOIS response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextEncoding {
    /// UTF-8; invalid sequences are replaced rather than rejected.
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,

    /// ISO-8859-1, one byte per character.
    #[serde(rename = "latin1", alias = "iso-8859-1")]
    Latin1,
}

impl TextEncoding {
    /// Decode a complete response body.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }

    /// Parse a user-facing encoding name ("utf-8", "latin1", ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "utf-8" | "utf8" => Some(TextEncoding::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" => Some(TextEncoding::Latin1),
            _ => None,
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextEncoding::Utf8 => write!(f, "utf-8"),
            TextEncoding::Latin1 => write!(f, "latin1"),
        }
    }
}

/// Options for one WHOIS client instance.
///
/// The value is immutable once handed to a client; build a new one to
/// change behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Window for a single socket attempt (connect + send + receive).
    /// Default: 5 seconds
    pub timeout: Duration,

    /// Retries after the first attempt. `0` means exactly one attempt.
    /// Default: 3
    pub max_retries: u32,

    /// Response decoding.
    /// Default: UTF-8
    pub encoding: TextEncoding,

    /// Pause between a failed attempt and the next one.
    /// Default: 1 second
    pub retry_delay: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            max_retries: 3,
            encoding: TextEncoding::Utf8,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

impl QueryOptions {
    /// Options used for server resolution and domain queries: a longer
    /// timeout and one fewer retry than the low-level default.
    pub fn resolver_default() -> Self {
        Self {
            timeout: Duration::from_millis(10_000),
            max_retries: 2,
            ..Self::default()
        }
    }

    /// Set the per-attempt timeout. Zero is bumped to one millisecond.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.max(Duration::from_millis(1));
        self
    }

    /// Set how many retries follow the first attempt.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the response encoding.
    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set the pause between attempts.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Total number of attempts the retry loop may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Configuration for `WhoisChecker`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupConfig {
    /// Options for root referrals and domain queries.
    /// Default: `QueryOptions::resolver_default()` (10s, 2 retries)
    pub query: QueryOptions,

    /// Domains of a batch queried at the same time.
    /// Default: 1 (strictly sequential), Range: 1-100
    pub concurrency: usize,

    /// Root server consulted for TLD referrals.
    /// Default: whois.iana.org:43
    pub root_server: ServerTarget,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            query: QueryOptions::resolver_default(),
            concurrency: 1,
            root_server: ServerTarget::new(crate::protocols::IANA_WHOIS_SERVER),
        }
    }
}

impl LookupConfig {
    /// Set batch concurrency, clamped to 1-100.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, 100);
        self
    }

    pub fn with_query_options(mut self, query: QueryOptions) -> Self {
        self.query = query;
        self
    }

    pub fn with_root_server(mut self, root_server: ServerTarget) -> Self {
        self.root_server = root_server;
        self
    }
}

/// One WHOIS connection endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerTarget {
    pub host: String,
    pub port: u16,
}

impl ServerTarget {
    /// Target `host` on the standard WHOIS port.
    pub fn new<H: Into<String>>(host: H) -> Self {
        Self {
            host: host.into(),
            port: WHOIS_PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Parse `host`, `host:port`, `[v6]` or `[v6]:port`. Anything that is
    /// not a valid trailing port (bare IPv6 literals included) stays part of
    /// the host.
    pub fn parse(server: &str) -> Self {
        let server = server.trim();
        if let Some(rest) = server.strip_prefix('[') {
            if let Some((host, tail)) = rest.split_once(']') {
                if !host.is_empty() {
                    let target = Self::new(host);
                    return match tail.strip_prefix(':').map(str::parse::<u16>) {
                        None if tail.is_empty() => target,
                        Some(Ok(port)) => target.with_port(port),
                        _ => Self::new(server),
                    };
                }
            }
        }
        match server.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && !host.contains(':') => match port.parse() {
                Ok(port) => Self::new(host).with_port(port),
                Err(_) => Self::new(server),
            },
            _ => Self::new(server),
        }
    }
}

impl fmt::Display for ServerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Raw response of one successful WHOIS query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// The query line that was sent, without its terminator
    pub query: String,

    /// Decoded response text, exactly as received
    pub raw: String,

    /// Host of the server that answered
    pub server: String,

    /// Wall time spent, in milliseconds
    pub elapsed_ms: u64,
}

impl QueryResult {
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

/// Insertion-ordered key/value fields of a WHOIS record.
///
/// Keys are case-sensitive. The first value inserted for a key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFields {
    entries: Vec<(String, String)>,
}

impl RecordFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `key -> value` unless `key` is already present.
    ///
    /// Returns `true` when the pair was stored.
    pub fn insert_first(&mut self, key: String, value: String) -> bool {
        if self.contains_key(&key) {
            return false;
        }
        self.entries.push((key, value));
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for RecordFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Structured view of one WHOIS response.
///
/// Derived purely from `QueryResult::raw`; recompute it rather than edit it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedRecord {
    /// True iff a creation date was found and parsed
    pub registered: bool,

    /// When the domain was first registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,

    /// Timestamp of the registry's "Last update of whois database" line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_date: Option<DateTime<Utc>>,

    /// Key/value pairs from the leading section of the response
    pub fields: RecordFields,
}

/// Progress state of one domain in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Success,
    Error,
}

impl BatchStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BatchStatus::Pending)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStatus::Pending => write!(f, "pending"),
            BatchStatus::Success => write!(f, "success"),
            BatchStatus::Error => write!(f, "error"),
        }
    }
}

/// One domain of a batch query.
///
/// Starts `Pending` and moves exactly once to `Success` (with `result`) or
/// `Error` (with `error_message`). Fields are private so that a result and
/// an error message can never coexist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItem {
    domain_name: String,
    status: BatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<QueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<ParsedRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl BatchItem {
    /// A fresh item awaiting its query.
    pub fn pending<D: Into<String>>(domain_name: D) -> Self {
        Self {
            domain_name: domain_name.into(),
            status: BatchStatus::Pending,
            result: None,
            record: None,
            error_message: None,
        }
    }

    /// Move to `Success`. Terminal items are left untouched.
    pub(crate) fn succeed(&mut self, result: QueryResult, record: ParsedRecord) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = BatchStatus::Success;
        self.result = Some(result);
        self.record = Some(record);
        true
    }

    /// Move to `Error`. Terminal items are left untouched.
    pub(crate) fn fail<M: Into<String>>(&mut self, message: M) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = BatchStatus::Error;
        self.error_message = Some(message.into());
        true
    }

    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub fn result(&self) -> Option<&QueryResult> {
        self.result.as_ref()
    }

    /// Parsed view of `result`, present on success.
    pub fn record(&self) -> Option<&ParsedRecord> {
        self.record.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_options_defaults() {
        let options = QueryOptions::default();
        assert_eq!(options.timeout, Duration::from_millis(5000));
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.encoding, TextEncoding::Utf8);
        assert_eq!(options.max_attempts(), 4);

        let resolver = QueryOptions::resolver_default();
        assert_eq!(resolver.timeout, Duration::from_millis(10_000));
        assert_eq!(resolver.max_retries, 2);
        assert_eq!(resolver.encoding, TextEncoding::Utf8);
    }

    #[test]
    fn test_zero_retries_means_one_attempt() {
        let options = QueryOptions::default().with_max_retries(0);
        assert_eq!(options.max_attempts(), 1);
    }

    #[test]
    fn test_server_target_defaults_to_port_43() {
        let target = ServerTarget::new("whois.iana.org");
        assert_eq!(target.port, 43);
        assert_eq!(target.to_string(), "whois.iana.org:43");
        assert_eq!(target.with_port(4343).port, 4343);
    }

    #[test]
    fn test_server_target_parse() {
        assert_eq!(ServerTarget::parse(" whois.nic.io "), ServerTarget::new("whois.nic.io"));
        assert_eq!(
            ServerTarget::parse("127.0.0.1:4343"),
            ServerTarget::new("127.0.0.1").with_port(4343)
        );
        assert_eq!(ServerTarget::parse("host:notaport").host, "host:notaport");
        assert_eq!(ServerTarget::parse("::1").host, "::1");
        assert_eq!(
            ServerTarget::parse("[::1]:4343"),
            ServerTarget::new("::1").with_port(4343)
        );
        assert_eq!(ServerTarget::parse("[2001:db8::43]"), ServerTarget::new("2001:db8::43"));
        assert_eq!(ServerTarget::parse("[::1]:port").host, "[::1]:port");
    }

    #[test]
    fn test_latin1_decoding() {
        let bytes = [b'c', 0xE9, b'l', b'i', b'n'];
        assert_eq!(TextEncoding::Latin1.decode(&bytes), "célin");
        assert_eq!(TextEncoding::Utf8.decode(&bytes), "c\u{FFFD}lin");
        assert_eq!(TextEncoding::from_name("ISO-8859-1"), Some(TextEncoding::Latin1));
        assert_eq!(TextEncoding::from_name("ebcdic"), None);
    }

    #[test]
    fn test_record_fields_first_occurrence_wins() {
        let mut fields = RecordFields::new();
        assert!(fields.insert_first("Name Server".into(), "ns1.example.com".into()));
        assert!(!fields.insert_first("Name Server".into(), "ns2.example.com".into()));
        assert!(fields.insert_first("name server".into(), "ns3.example.com".into()));

        assert_eq!(fields.get("Name Server"), Some("ns1.example.com"));
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["Name Server", "name server"]);

        let json = serde_json::to_string(&fields).unwrap();
        assert_eq!(
            json,
            r#"{"Name Server":"ns1.example.com","name server":"ns3.example.com"}"#
        );
    }

    #[test]
    fn test_batch_item_transitions_once() {
        let mut item = BatchItem::pending("example.com");
        assert_eq!(item.status(), BatchStatus::Pending);

        assert!(item.fail("boom"));
        assert!(!item.succeed(
            QueryResult {
                query: "example.com".into(),
                raw: "x".into(),
                server: "s".into(),
                elapsed_ms: 1,
            },
            ParsedRecord::default(),
        ));

        assert_eq!(item.status(), BatchStatus::Error);
        assert_eq!(item.error_message(), Some("boom"));
        assert!(item.result().is_none());
    }
}
