//! WHOIS protocol client.
//!
//! WHOIS has no framing beyond "one request line, the server closes the
//! connection when it is done". A single attempt is driven through an
//! explicit state machine (`Connecting -> Receiving -> Closed | TimedOut |
//! Failed`) whose terminal states map onto `WhoisError` variants, and a
//! retry loop wraps attempts with a fixed delay.

use crate::error::WhoisError;
use crate::types::{QueryOptions, QueryResult, ServerTarget};
use std::fmt;
use std::io;
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Upper bound on a single response body.
const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

/// Read buffer size for one `read` call.
const READ_CHUNK: usize = 4096;

/// Phases of a single query attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptPhase {
    Connecting,
    Receiving,
    Closed,
    TimedOut,
    Failed,
}

impl fmt::Display for AttemptPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttemptPhase::Connecting => "connecting",
            AttemptPhase::Receiving => "receiving",
            AttemptPhase::Closed => "closed",
            AttemptPhase::TimedOut => "timed out",
            AttemptPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Async WHOIS client speaking raw TCP on port 43.
///
/// The client is cheap to clone; it carries only its immutable options.
///
/// # Example
///
/// ```rust,no_run
/// use whois_lookup_lib::{QueryOptions, ServerTarget, WhoisClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = WhoisClient::with_options(QueryOptions::resolver_default());
///     let result = client
///         .query_with_retry("com", &ServerTarget::new("whois.iana.org"))
///         .await?;
///     println!("{}", result.raw);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct WhoisClient {
    options: QueryOptions,
}

impl WhoisClient {
    /// Create a new WHOIS client with default settings (5s, 3 retries, UTF-8).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new WHOIS client with custom options.
    pub fn with_options(options: QueryOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Run exactly one query attempt against `target`.
    ///
    /// The query is trimmed and terminated with a single CRLF. Everything
    /// the server sends until it closes the connection is returned.
    ///
    /// # Errors
    ///
    /// - `Timeout` if the server has not closed the stream within the
    ///   configured timeout (the socket is dropped)
    /// - `InvalidResponse` if the server closed without sending anything
    /// - `ConnectionFailed` for any socket-level error
    pub async fn query(
        &self,
        query: &str,
        target: &ServerTarget,
    ) -> Result<QueryResult, WhoisError> {
        let start = Instant::now();
        let query = query.trim();
        let raw = self.execute_query(query, target).await?;

        Ok(QueryResult {
            query: query.to_string(),
            raw,
            server: target.host.clone(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Query `target`, retrying failed attempts.
    ///
    /// Makes at most `max_retries + 1` attempts with `retry_delay` between
    /// them. Every attempt failure is retryable. The returned result's
    /// elapsed time covers the whole sequence.
    ///
    /// # Errors
    ///
    /// A single `ConnectionFailed` whose cause is the last attempt's error.
    pub async fn query_with_retry(
        &self,
        query: &str,
        target: &ServerTarget,
    ) -> Result<QueryResult, WhoisError> {
        let start = Instant::now();
        let attempts = self.options.max_attempts();
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.query(query, target).await {
                Ok(mut result) => {
                    result.elapsed_ms = start.elapsed().as_millis() as u64;
                    return Ok(result);
                }
                Err(e) => {
                    warn!(
                        server = %target,
                        attempt,
                        attempts,
                        error = %e,
                        "WHOIS attempt failed"
                    );
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.options.retry_delay).await;
                    }
                }
            }
        }

        // max_attempts() is at least 1, so the loop ran and recorded an error
        let cause = last_error.unwrap_or_else(|| WhoisError::invalid_response(&target.host));
        Err(WhoisError::connection_failed(&target.host, cause))
    }

    /// Drive one attempt to a terminal phase and map it to a result.
    async fn execute_query(&self, query: &str, target: &ServerTarget) -> Result<String, WhoisError> {
        let mut phase = AttemptPhase::Connecting;
        let outcome =
            tokio::time::timeout(self.options.timeout, receive(query, target, &mut phase)).await;

        // The stream lived inside the attempt future, so it is closed by now
        // on every path, including the timeout.
        let outcome = match outcome {
            Ok(Ok(bytes)) => {
                phase = AttemptPhase::Closed;
                Ok(bytes)
            }
            Ok(Err(e)) => {
                debug!(server = %target, %phase, error = %e, "WHOIS socket error");
                phase = AttemptPhase::Failed;
                Err(WhoisError::connection_failed(&target.host, e))
            }
            Err(_) => {
                debug!(server = %target, %phase, "WHOIS attempt deadline reached");
                phase = AttemptPhase::TimedOut;
                Err(WhoisError::timeout(&target.host, self.options.timeout))
            }
        };
        debug!(server = %target, %phase, "WHOIS attempt finished");

        let bytes = outcome?;
        if bytes.is_empty() {
            return Err(WhoisError::invalid_response(&target.host));
        }
        Ok(self.options.encoding.decode(&bytes))
    }
}

/// Connect, send the query line and read until the peer closes.
async fn receive(
    query: &str,
    target: &ServerTarget,
    phase: &mut AttemptPhase,
) -> io::Result<Vec<u8>> {
    debug!(server = %target, "Connecting to WHOIS server");
    let mut stream = TcpStream::connect((target.host.as_str(), target.port)).await?;

    let line = format!("{}\r\n", query);
    stream.write_all(line.as_bytes()).await?;
    *phase = AttemptPhase::Receiving;
    debug!(server = %target, query, "WHOIS query sent");

    let mut response = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        if response.len() + n > MAX_RESPONSE_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("response exceeds {} bytes", MAX_RESPONSE_BYTES),
            ));
        }
        response.extend_from_slice(&chunk[..n]);
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextEncoding;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    fn fast_options() -> QueryOptions {
        QueryOptions::default()
            .with_timeout(Duration::from_millis(500))
            .with_retry_delay(Duration::from_millis(10))
    }

    /// Serve one connection: read the query line, reply, close.
    async fn serve_once(reply: &'static [u8]) -> (ServerTarget, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            reader.get_mut().write_all(reply).await.unwrap();
            line
        });
        (ServerTarget::new("127.0.0.1").with_port(port), handle)
    }

    #[tokio::test]
    async fn test_query_sends_trimmed_line_and_reads_until_close() {
        let (target, server) = serve_once(b"Domain Name: EXAMPLE.COM\r\n").await;
        let client = WhoisClient::with_options(fast_options());

        let result = client.query("  example.com \n", &target).await.unwrap();

        assert_eq!(server.await.unwrap(), "example.com\r\n");
        assert_eq!(result.raw, "Domain Name: EXAMPLE.COM\r\n");
        assert_eq!(result.server, "127.0.0.1");
        assert_eq!(result.query, "example.com");
    }

    #[tokio::test]
    async fn test_query_decodes_latin1() {
        let (target, _server) = serve_once(b"registrant: Soci\xe9t\xe9\n").await;
        let client =
            WhoisClient::with_options(fast_options().with_encoding(TextEncoding::Latin1));

        let result = client.query("example.fr", &target).await.unwrap();
        assert_eq!(result.raw, "registrant: Société\n");
    }

    #[tokio::test]
    async fn test_empty_response_is_invalid() {
        let (target, _server) = serve_once(b"").await;
        let client = WhoisClient::with_options(fast_options());

        let err = client.query("example.com", &target).await.unwrap_err();
        assert!(matches!(err, WhoisError::InvalidResponse { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn test_silent_server_times_out_after_window() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            // hold the connection open without answering
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let timeout = Duration::from_millis(200);
        let client = WhoisClient::with_options(fast_options().with_timeout(timeout));
        let target = ServerTarget::new("127.0.0.1").with_port(port);

        let start = Instant::now();
        let err = client.query("example.com", &target).await.unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, WhoisError::Timeout { .. }), "{:?}", err);
        assert!(elapsed >= timeout, "returned after {:?}", elapsed);
        assert!(elapsed < timeout + Duration::from_secs(1), "returned after {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_refused_connection_is_connection_failed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = WhoisClient::with_options(fast_options());
        let target = ServerTarget::new("127.0.0.1").with_port(port);

        let err = client.query("example.com", &target).await.unwrap_err();
        assert!(matches!(err, WhoisError::ConnectionFailed { .. }), "{:?}", err);
        assert!(err.last_attempt().is_none());
    }

    /// Accept connections forever, read the query and close without
    /// answering, counting connections.
    async fn counting_closer() -> (ServerTarget, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut reader = BufReader::new(socket);
                let mut line = String::new();
                let _ = reader.read_line(&mut line).await;
            }
        });
        (ServerTarget::new("127.0.0.1").with_port(port), count)
    }

    #[tokio::test]
    async fn test_retry_makes_max_retries_plus_one_attempts() {
        let (target, count) = counting_closer().await;
        let client = WhoisClient::with_options(fast_options().with_max_retries(2));

        let err = client.query_with_retry("example.com", &target).await.unwrap_err();

        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(matches!(err, WhoisError::ConnectionFailed { .. }));
        assert!(matches!(
            err.last_attempt(),
            Some(WhoisError::InvalidResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_retries_makes_exactly_one_attempt() {
        let (target, count) = counting_closer().await;
        let client = WhoisClient::with_options(fast_options().with_max_retries(0));

        assert!(client.query_with_retry("example.com", &target).await.is_err());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_stops_after_first_success() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n >= 1 {
                    // second connection onwards answers
                    let mut buf = [0u8; 64];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket.write_all(b"ok\n").await;
                }
            }
        });

        let client = WhoisClient::with_options(fast_options().with_max_retries(3));
        let target = ServerTarget::new("127.0.0.1").with_port(port);

        let result = client.query_with_retry("example.com", &target).await.unwrap();
        assert_eq!(result.raw, "ok\n");
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
