//! Terminal display logic for the whois-lookup CLI.
//!
//! Colored record summaries, batch progress lines with `[n/total]`
//! counters, and the end-of-batch summary. Uses only the `console` crate.

use console::{pad_str, style, Alignment};
use std::time::Duration;
use whois_lookup_lib::{BatchItem, BatchSnapshot, BatchStatus, ParsedRecord, QueryResult};

const DOMAIN_WIDTH: usize = 30;

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a styled header at the start of a batch.
pub fn print_header(domain_count: usize, concurrency: usize) {
    println!(
        "{} {} {}",
        style("whois-lookup").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "- Querying {} domain{}",
            domain_count,
            if domain_count == 1 { "" } else { "s" }
        ))
        .dim(),
    );
    println!("{}", style(format!("Concurrency: {}", concurrency)).dim());
    println!();
}

// ── Single record ────────────────────────────────────────────────────────────

/// Print the summary of one lookup, and every field when `show_fields`.
pub fn print_record(result: &QueryResult, record: &ParsedRecord, show_fields: bool) {
    let status = if record.registered {
        style("REGISTERED").red().bold()
    } else {
        style("NOT REGISTERED").green().bold()
    };

    println!("  {}  {}", style(&result.query).white().bold(), status);
    println!(
        "    {} {} in {}ms",
        style("Server:").dim(),
        result.server,
        result.elapsed_ms
    );
    if let Some(created) = record.creation_date {
        println!(
            "    {} {}",
            style("Created:").dim(),
            created.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    if let Some(updated) = record.last_update_date {
        println!(
            "    {} {}",
            style("Database updated:").dim(),
            updated.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    if show_fields && !record.fields.is_empty() {
        println!();
        let width = record.fields.keys().map(str::len).max().unwrap_or(0);
        for (key, value) in record.fields.iter() {
            println!(
                "    {}  {}",
                style(pad_str(key, width, Alignment::Left, None)).cyan(),
                value
            );
        }
    }
}

// ── Batch progress ───────────────────────────────────────────────────────────

/// Print one completed batch item.
///
/// If `counter` is Some((current, total)), a progress prefix like `[3/8]` is shown.
pub fn print_batch_item(item: &BatchItem, counter: Option<(usize, usize)>) {
    let padded_domain = pad_str(item.domain_name(), DOMAIN_WIDTH, Alignment::Left, Some(".."));

    let prefix = match counter {
        Some((cur, total)) => format!("{} ", style(format!("[{}/{}]", cur, total)).dim()),
        None => String::new(),
    };

    match item.status() {
        BatchStatus::Success => {
            let registered = item.record().map(|r| r.registered).unwrap_or(false);
            let label = if registered {
                style("REGISTERED").red().bold()
            } else {
                style("NOT REGISTERED").green().bold()
            };
            let detail = item
                .result()
                .map(|r| format!("{} {}ms", r.server, r.elapsed_ms))
                .unwrap_or_default();
            println!(
                "  {}{}  {}  {}",
                prefix,
                style(&padded_domain).white(),
                label,
                style(detail).dim(),
            );
        }
        BatchStatus::Error => {
            println!(
                "  {}{}  {}  {}",
                prefix,
                style(&padded_domain).white(),
                style("ERROR").yellow(),
                style(brief_error(item.error_message().unwrap_or("unknown error"))).dim(),
            );
        }
        BatchStatus::Pending => {}
    }
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the totals of a finished batch.
pub fn print_summary(snapshot: &BatchSnapshot, duration: Duration) {
    let total = snapshot.len();
    let registered = snapshot
        .items()
        .iter()
        .filter(|item| item.record().is_some_and(|r| r.registered))
        .count();
    let succeeded = snapshot.count(BatchStatus::Success);
    let failed = snapshot.count(BatchStatus::Error);

    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "  {} domain{} in {:.1}s  {}  {}  {}  {}  {}  {}",
        style(total).bold(),
        if total == 1 { "" } else { "s" },
        duration.as_secs_f64(),
        style("|").dim(),
        style(format!("{} registered", registered)).red(),
        style("|").dim(),
        style(format!("{} not registered", succeeded - registered)).green(),
        style("|").dim(),
        style(format!("{} failed", failed)).yellow(),
    );
}

/// List the domains that could not be queried.
pub fn print_error_summary(snapshot: &BatchSnapshot) {
    let failed: Vec<&BatchItem> = snapshot
        .items()
        .iter()
        .filter(|item| item.status() == BatchStatus::Error)
        .collect();
    if failed.is_empty() {
        return;
    }

    println!();
    println!("  {}", style("Some domains could not be queried:").yellow());
    for item in failed {
        println!(
            "  {} {}: {}",
            style("•").dim(),
            item.domain_name(),
            item.error_message().unwrap_or("unknown error")
        );
    }
}

/// First line of an error message, cut to fit a result line.
fn brief_error(message: &str) -> String {
    let first = message.lines().next().unwrap_or(message);
    if first.chars().count() > 60 {
        let cut: String = first.chars().take(57).collect();
        format!("{}...", cut)
    } else {
        first.to_string()
    }
}
