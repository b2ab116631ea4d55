//! WHOIS server discovery for TLDs.
//!
//! A TLD's authoritative server comes either from a caller-supplied table of
//! known servers or, failing that, from the referral in the IANA root WHOIS
//! response. Nothing is cached here; callers that persist discovered servers
//! feed them back in through `KnownServers`.

use crate::error::WhoisError;
use crate::protocols::whois::WhoisClient;
use crate::types::{QueryOptions, QueryResult, ServerTarget};
use crate::utils::extract_tld;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// The IANA root WHOIS server.
pub const IANA_WHOIS_SERVER: &str = "whois.iana.org";

lazy_static::lazy_static! {
    static ref REFERRAL_LINE: Regex = Regex::new(r"(?i)whois:\s*(\S+)")
        .expect("referral pattern is a valid regex");
}

/// Lookup of already-known WHOIS servers, keyed by TLD.
///
/// Implementations only answer; they are never written to by the library.
/// `None` means "not known", never an error.
pub trait KnownServers {
    fn known_server(&self, tld: &str) -> Option<String>;
}

/// A lookup that knows no servers, forcing IANA discovery.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoKnownServers;

impl KnownServers for NoKnownServers {
    fn known_server(&self, _tld: &str) -> Option<String> {
        None
    }
}

impl KnownServers for HashMap<String, String> {
    fn known_server(&self, tld: &str) -> Option<String> {
        self.get(tld)
            .or_else(|| {
                self.iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(tld))
                    .map(|(_, host)| host)
            })
            .cloned()
    }
}

impl KnownServers for BTreeMap<String, String> {
    fn known_server(&self, tld: &str) -> Option<String> {
        self.get(tld)
            .or_else(|| {
                self.iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(tld))
                    .map(|(_, host)| host)
            })
            .cloned()
    }
}

impl<K: KnownServers + ?Sized> KnownServers for &K {
    fn known_server(&self, tld: &str) -> Option<String> {
        (**self).known_server(tld)
    }
}

/// Extract the referral hostname from a root server response.
///
/// Scans line by line for `whois: <host>` (case-insensitive) and returns the
/// first host found.
///
/// ```text
/// whois:        whois.verisign-grs.com
/// ```
pub fn extract_referral(response: &str) -> Option<String> {
    response
        .lines()
        .find_map(|line| REFERRAL_LINE.captures(line))
        .map(|caps| caps[1].to_string())
}

/// Resolves TLDs to WHOIS servers and runs full domain queries.
#[derive(Debug, Clone)]
pub struct ServerResolver {
    client: WhoisClient,
    root: ServerTarget,
}

impl Default for ServerResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerResolver {
    /// Resolver with the resolver defaults (10s timeout, 2 retries) against IANA.
    pub fn new() -> Self {
        Self::with_options(QueryOptions::resolver_default())
    }

    pub fn with_options(options: QueryOptions) -> Self {
        Self {
            client: WhoisClient::with_options(options),
            root: ServerTarget::new(IANA_WHOIS_SERVER),
        }
    }

    /// Use another root server (a mirror, or a local fixture in tests).
    pub fn with_root(mut self, root: ServerTarget) -> Self {
        self.root = root;
        self
    }

    pub fn root(&self) -> &ServerTarget {
        &self.root
    }

    pub fn client(&self) -> &WhoisClient {
        &self.client
    }

    /// Find the WHOIS server for `tld`.
    ///
    /// A hit in `known` returns without network I/O. Otherwise the root
    /// server is queried (with retries) and its referral is extracted.
    ///
    /// # Errors
    ///
    /// - `ConnectionFailed` if the root server could not be queried
    /// - `ServerNotFound` if its response holds no referral
    pub async fn resolve_server<K>(&self, tld: &str, known: &K) -> Result<String, WhoisError>
    where
        K: KnownServers + ?Sized,
    {
        let tld = tld.trim().trim_start_matches('.').to_lowercase();

        if let Some(server) = known.known_server(&tld) {
            info!(tld = %tld, server = %server, "WHOIS server from known servers");
            return Ok(server);
        }

        let response = self.client.query_with_retry(&tld, &self.root).await?;
        match extract_referral(&response.raw) {
            Some(server) => {
                info!(tld = %tld, server = %server, root = %self.root, "WHOIS server discovered via referral");
                Ok(server)
            }
            None => Err(WhoisError::server_not_found(tld)),
        }
    }

    /// Query the full `domain` against its TLD's WHOIS server.
    ///
    /// # Errors
    ///
    /// - `Validation` if `domain` has no TLD label
    /// - any error from `resolve_server` or the final query
    pub async fn query_domain<K>(&self, domain: &str, known: &K) -> Result<QueryResult, WhoisError>
    where
        K: KnownServers + ?Sized,
    {
        let domain = domain.trim();
        let tld = extract_tld(domain)?;
        let server = self.resolve_server(&tld, known).await?;
        self.client
            .query_with_retry(domain, &ServerTarget::parse(&server))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    const IANA_COM: &str = "% IANA WHOIS server\n% for more information on IANA, visit http://www.iana.org\n% This query returned 1 object\n\ndomain:       COM\n\norganisation: VeriSign Global Registry Services\n\nwhois:        whois.verisign-grs.com\n\nstatus:       ACTIVE\n";

    #[test]
    fn test_extract_referral() {
        assert_eq!(
            extract_referral(IANA_COM),
            Some("whois.verisign-grs.com".to_string())
        );
        assert_eq!(
            extract_referral("WHOIS:whois.nic.io\r\n"),
            Some("whois.nic.io".to_string())
        );
        assert_eq!(extract_referral("% IANA WHOIS server\ndomain: TEST\n"), None);
        assert_eq!(extract_referral("whois:        \ndomain: COM\n"), None);
    }

    #[test]
    fn test_extract_referral_takes_first_match() {
        let response = "whois: whois.first.example\nwhois: whois.second.example\n";
        assert_eq!(
            extract_referral(response),
            Some("whois.first.example".to_string())
        );
    }

    #[test]
    fn test_known_servers_case_insensitive() {
        let mut known = HashMap::new();
        known.insert("COM".to_string(), "whois.verisign-grs.com".to_string());
        assert_eq!(
            known.known_server("com"),
            Some("whois.verisign-grs.com".to_string())
        );
        assert_eq!(known.known_server("net"), None);
        assert_eq!(NoKnownServers.known_server("com"), None);
    }

    async fn fake_root(reply: &'static str) -> (ServerTarget, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            reader.get_mut().write_all(reply.as_bytes()).await.unwrap();
            line
        });
        (ServerTarget::new("127.0.0.1").with_port(port), handle)
    }

    fn test_resolver(root: ServerTarget) -> ServerResolver {
        let options = QueryOptions::resolver_default()
            .with_timeout(Duration::from_millis(500))
            .with_max_retries(0);
        ServerResolver::with_options(options).with_root(root)
    }

    #[tokio::test]
    async fn test_resolve_server_via_root_referral() {
        let (root, server) = fake_root(IANA_COM).await;
        let resolver = test_resolver(root);

        let host = resolver.resolve_server("com", &NoKnownServers).await.unwrap();

        assert_eq!(host, "whois.verisign-grs.com");
        assert_eq!(server.await.unwrap(), "com\r\n");
    }

    #[tokio::test]
    async fn test_resolve_server_without_referral() {
        let (root, _server) = fake_root("% IANA WHOIS server\n\ndomain: ZZZ\n").await;
        let resolver = test_resolver(root);

        let err = resolver.resolve_server("zzz", &HashMap::<String, String>::new()).await.unwrap_err();
        assert!(matches!(err, WhoisError::ServerNotFound { ref tld } if tld == "zzz"));
    }

    #[tokio::test]
    async fn test_known_server_skips_network() {
        // Root points at a closed port: any network use would fail.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let resolver = test_resolver(ServerTarget::new("127.0.0.1").with_port(port));

        let mut known = BTreeMap::new();
        known.insert("net".to_string(), "whois.verisign-grs.com".to_string());

        let host = resolver.resolve_server("NET", &known).await.unwrap();
        assert_eq!(host, "whois.verisign-grs.com");
    }

    #[tokio::test]
    async fn test_query_domain_requires_tld() {
        let resolver = ServerResolver::new();
        let err = resolver.query_domain("localhost", &NoKnownServers).await.unwrap_err();
        assert!(matches!(err, WhoisError::Validation { .. }));
    }
}
