//! Batch query fan-out.
//!
//! A batch turns one base name and a list of TLDs into one WHOIS query per
//! domain, run with bounded concurrency. Progress is reported as a stream of
//! whole-batch snapshots: first every item pending, then one snapshot per
//! item that reaches `Success` or `Error`.

use crate::error::WhoisError;
use crate::parser::parse_record;
use crate::protocols::{KnownServers, ServerResolver};
use crate::types::{BatchItem, BatchStatus, QueryResult};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tracing::debug;

/// Upper bound for batch concurrency.
pub const MAX_CONCURRENCY: usize = 100;

/// State of every item of a batch at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSnapshot {
    items: Vec<BatchItem>,
}

impl BatchSnapshot {
    /// All domains pending, in the given order.
    pub fn pending<S: AsRef<str>>(domains: &[S]) -> Self {
        Self {
            items: domains.iter().map(|d| BatchItem::pending(d.as_ref())).collect(),
        }
    }

    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, domain_name: &str) -> Option<&BatchItem> {
        self.items.iter().find(|item| item.domain_name() == domain_name)
    }

    /// Number of items in a terminal state.
    pub fn completed(&self) -> usize {
        self.items.iter().filter(|item| item.status().is_terminal()).count()
    }

    pub fn pending_count(&self) -> usize {
        self.len() - self.completed()
    }

    pub fn is_complete(&self) -> bool {
        self.completed() == self.len()
    }

    pub fn count(&self, status: BatchStatus) -> usize {
        self.items.iter().filter(|item| item.status() == status).count()
    }

    /// Record the outcome of item `index`. Returns false if it was already terminal.
    fn apply(&mut self, index: usize, outcome: Result<QueryResult, WhoisError>) -> bool {
        let Some(item) = self.items.get_mut(index) else {
            return false;
        };

        match outcome {
            Ok(result) => {
                let record = parse_record(&result.raw);
                debug!(
                    domain = item.domain_name(),
                    server = %result.server,
                    registered = record.registered,
                    "Batch item succeeded"
                );
                item.succeed(result, record)
            }
            Err(e) => {
                debug!(domain = item.domain_name(), error = %e, "Batch item failed");
                item.fail(e.to_string())
            }
        }
    }
}

/// Run `domains` through `resolver`, `concurrency` at a time.
///
/// The returned stream yields the all-pending snapshot first, then one
/// snapshot per completed domain (in completion order), and ends after the
/// last domain completes. Each item transitions exactly once.
pub fn run_batch<'a, K>(
    resolver: &'a ServerResolver,
    known: &'a K,
    domains: Vec<String>,
    concurrency: usize,
) -> impl Stream<Item = BatchSnapshot> + 'a
where
    K: KnownServers + ?Sized + Sync,
{
    let concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
    let mut snapshot = BatchSnapshot::pending(&domains);
    let initial = snapshot.clone();

    let updates = stream::iter(domains.into_iter().enumerate())
        .map(move |(index, domain)| async move {
            let outcome = resolver.query_domain(&domain, known).await;
            (index, outcome)
        })
        .buffer_unordered(concurrency)
        .filter_map(move |(index, outcome)| {
            let changed = snapshot.apply(index, outcome);
            let update = changed.then(|| snapshot.clone());
            async move { update }
        });

    stream::once(async move { initial }).chain(updates)
}
