//! WHOIS Lookup CLI Application
//!
//! A command-line interface for querying WHOIS records, either for a single
//! domain or for one base name across several TLDs.
//! This CLI application provides a user-friendly interface to the whois-lookup-lib library.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use futures::StreamExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::process;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use whois_lookup_lib::{
    clean_domain_input, load_env_config, parse_duration_string, parse_record, BatchSnapshot,
    ConfigManager, FileConfig, LookupConfig, ParsedRecord, QueryOptions, QueryResult,
    ServerTarget, TextEncoding, WhoisChecker, WhoisClient,
};

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for whois-lookup
#[derive(Parser, Debug)]
#[command(name = "whois-lookup")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query WHOIS records for a domain or a name across TLDs")]
#[command(
    long_about = "Query WHOIS records over port 43.\n\nThe WHOIS server of each TLD is taken from --server / the [servers] config table, or discovered through the IANA root server. With -t, the name is queried under every listed TLD and results stream in as they complete."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Domain to look up, or a base name when TLDs are given
    #[arg(value_name = "DOMAIN", help_heading = "Query")]
    pub domain: String,

    /// TLDs to query the base name under (comma-separated or multiple -t flags)
    #[arg(short = 't', long = "tld", value_name = "TLD", value_delimiter = ',', action = clap::ArgAction::Append, help_heading = "Query")]
    pub tlds: Option<Vec<String>>,

    /// Send the query straight to this server (HOST or HOST:PORT), skipping discovery
    #[arg(long = "host", value_name = "HOST", help_heading = "Query")]
    pub host: Option<String>,

    /// Known WHOIS server for a TLD (TLD=HOST[:PORT], repeatable)
    #[arg(long = "server", value_name = "TLD=HOST", action = clap::ArgAction::Append, help_heading = "Servers")]
    pub servers: Vec<String>,

    /// Root server used for discovery (default: whois.iana.org)
    #[arg(long = "root", value_name = "HOST", help_heading = "Servers")]
    pub root: Option<String>,

    /// Print the raw server response only
    #[arg(short = 'r', long = "raw", help_heading = "Output Format")]
    pub raw: bool,

    /// Output results in JSON format
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Show every parsed field, not just the summary
    #[arg(short = 'i', long = "info", help_heading = "Output Format")]
    pub info: bool,

    /// Per-attempt timeout (e.g. "5s", "500ms")
    #[arg(long = "timeout", value_name = "DURATION", help_heading = "Network")]
    pub timeout: Option<String>,

    /// Retries after the first failed attempt (0-10)
    #[arg(long = "retries", value_name = "N", help_heading = "Network")]
    pub retries: Option<u32>,

    /// Response text encoding (utf-8 or latin1)
    #[arg(long = "encoding", value_name = "ENCODING", help_heading = "Network")]
    pub encoding: Option<String>,

    /// Max concurrent domain queries in a batch (1-100, default: 1)
    #[arg(short = 'c', long = "concurrency", help_heading = "Network")]
    pub concurrency: Option<usize>,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

/// Settings after merging defaults, config files, environment and flags.
#[derive(Debug, Clone)]
struct Settings {
    /// Options for direct `--host` queries
    query: QueryOptions,
    lookup: LookupConfig,
    known: BTreeMap<String, String>,
    tlds: Option<Vec<String>>,
}

/// JSON shape of a single lookup.
#[derive(Debug, Serialize)]
struct LookupOutput<'a> {
    #[serde(flatten)]
    result: &'a QueryResult,
    record: &'a ParsedRecord,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_tracing(args.verbose);

    // Validate arguments
    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    if let Err(e) = run_lookup(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Log to stderr so stdout stays parseable. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "whois_lookup_lib=debug,whois_lookup=debug"
    } else {
        "error"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    if args.domain.trim().is_empty() {
        return Err("Please enter a domain name".to_string());
    }

    if args.raw && args.json {
        return Err("Cannot specify both --raw and --json".to_string());
    }

    if args.host.is_some() && args.tlds.is_some() {
        return Err("Cannot combine --host with -t/--tld".to_string());
    }

    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 || concurrency > 100 {
            return Err("Concurrency must be between 1 and 100".to_string());
        }
    }

    if let Some(retries) = args.retries {
        if retries > 10 {
            return Err("Retries must be between 0 and 10".to_string());
        }
    }

    if let Some(timeout) = &args.timeout {
        match parse_duration_string(timeout) {
            Some(d) if !d.is_zero() => {}
            _ => {
                return Err(format!(
                    "Invalid timeout '{}'. Use format like '5s', '500ms', '2m'",
                    timeout
                ))
            }
        }
    }

    if let Some(encoding) = &args.encoding {
        if TextEncoding::from_name(encoding).is_none() {
            return Err(format!(
                "Invalid encoding '{}'. Use utf-8 or latin1",
                encoding
            ));
        }
    }

    for server in &args.servers {
        parse_server_flag(server)?;
    }

    Ok(())
}

/// Split a `TLD=HOST` flag value.
fn parse_server_flag(value: &str) -> Result<(String, String), String> {
    let (tld, host) = value
        .split_once('=')
        .ok_or_else(|| format!("Invalid --server '{}'. Use TLD=HOST", value))?;
    let tld = whois_lookup_lib::normalize_tld(tld);
    let host = host.trim();

    if tld.is_empty() || tld.contains('.') || host.is_empty() {
        return Err(format!("Invalid --server '{}'. Use TLD=HOST", value));
    }
    Ok((tld, host.to_string()))
}

async fn run_lookup(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let settings = build_settings(&args)?;

    if let Some(host) = &args.host {
        return run_direct_query(&args, &settings, host).await;
    }

    let checker = WhoisChecker::with_config(settings.lookup.clone())
        .with_known_servers(settings.known.clone());

    let input = clean_domain_input(&args.domain);
    let batch_tlds = match &settings.tlds {
        // Configured default TLDs only apply to bare names
        Some(tlds) if args.tlds.is_some() || !input.contains('.') => Some(tlds.clone()),
        _ => None,
    };

    match batch_tlds {
        Some(tlds) => run_batch_lookup(&checker, &input, &tlds, &args).await,
        None => run_single_lookup(&checker, &input, &args).await,
    }
}

/// Query one server directly with the low-level client.
async fn run_direct_query(
    args: &Args,
    settings: &Settings,
    host: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = WhoisClient::with_options(settings.query);
    let target = ServerTarget::parse(host);
    let result = client.query_with_retry(&args.domain, &target).await?;
    let record = parse_record(&result.raw);
    display_lookup(&result, &record, args)
}

async fn run_single_lookup(
    checker: &WhoisChecker,
    domain: &str,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let (result, record) = checker.lookup_domain(domain).await?;
    display_lookup(&result, &record, args)
}

fn display_lookup(
    result: &QueryResult,
    record: &ParsedRecord,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    if args.raw {
        print!("{}", result.raw);
    } else if args.json {
        let output = LookupOutput { result, record };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        ui::print_record(result, record, args.info);
    }
    Ok(())
}

/// Stream a multi-TLD batch, printing each item as it completes.
async fn run_batch_lookup(
    checker: &WhoisChecker,
    base_name: &str,
    tlds: &[String],
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = checker.query_batch(base_name, tlds)?;
    let start_time = Instant::now();
    let mut previous: Option<BatchSnapshot> = None;

    while let Some(snapshot) = stream.next().await {
        if !args.json && !args.raw {
            match &previous {
                None => ui::print_header(snapshot.len(), checker.config().concurrency),
                Some(before) => {
                    let completed = snapshot.completed();
                    for (now, then) in snapshot.items().iter().zip(before.items()) {
                        if now.status() != then.status() {
                            ui::print_batch_item(now, Some((completed, snapshot.len())));
                        }
                    }
                }
            }
        }
        previous = Some(snapshot);
    }

    let Some(last) = previous else {
        return Ok(());
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&last)?);
    } else if args.raw {
        for item in last.items() {
            if let Some(result) = item.result() {
                println!("==> {} ({}) <==", item.domain_name(), result.server);
                println!("{}", result.raw);
            }
        }
    } else {
        println!();
        ui::print_summary(&last, start_time.elapsed());
        ui::print_error_summary(&last);
    }

    Ok(())
}

/// Build settings from CLI arguments with config file integration.
///
/// Precedence order (highest to lowest):
/// 1. CLI arguments (explicit user input)
/// 2. Environment variables (WL_*)
/// 3. Local config file (./whois-lookup.toml)
/// 4. Global config file (~/.whois-lookup.toml)
/// 5. XDG config file (~/.config/whois-lookup/config.toml)
/// 6. Built-in defaults
fn build_settings(args: &Args) -> Result<Settings, Box<dyn std::error::Error>> {
    let config_manager = ConfigManager::new(args.verbose);

    // Step 1: config files
    let file_config = match &args.config {
        Some(path) => {
            tracing::debug!(path = %path, "Using explicit config file");
            config_manager
                .load_file(path)
                .map_err(|e| format!("Failed to load config file '{}': {}", path, e))?
        }
        None => config_manager.discover_and_load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Config discovery failed, using defaults");
            FileConfig::default()
        }),
    };

    let mut settings = Settings {
        query: file_config.query_options(),
        lookup: file_config.lookup_config(),
        known: file_config.known_servers(),
        tlds: file_config.default_tlds(),
    };

    // Step 2: environment variables (WL_*)
    let env_config = load_env_config();
    settings.query = env_config.apply_query(settings.query);
    settings.lookup.query = env_config.apply_query(settings.lookup.query);
    if let Some(concurrency) = env_config.concurrency {
        settings.lookup = settings.lookup.with_concurrency(concurrency);
    }
    if env_config.tlds.is_some() {
        settings.tlds = env_config.tlds;
    }

    // Step 3: CLI arguments
    apply_cli_args(settings, args)
}

fn apply_cli_args(
    mut settings: Settings,
    args: &Args,
) -> Result<Settings, Box<dyn std::error::Error>> {
    let timeout = args.timeout.as_deref().and_then(parse_duration_string);
    let encoding = args.encoding.as_deref().and_then(TextEncoding::from_name);

    let apply = |mut options: QueryOptions| {
        if let Some(timeout) = timeout {
            options = options.with_timeout(timeout);
        }
        if let Some(retries) = args.retries {
            options = options.with_max_retries(retries);
        }
        if let Some(encoding) = encoding {
            options = options.with_encoding(encoding);
        }
        options
    };
    settings.query = apply(settings.query);
    settings.lookup.query = apply(settings.lookup.query);

    if let Some(concurrency) = args.concurrency {
        settings.lookup = settings.lookup.with_concurrency(concurrency);
    }
    if let Some(root) = &args.root {
        settings.lookup = settings.lookup.with_root_server(ServerTarget::parse(root));
    }
    for server in &args.servers {
        let (tld, host) = parse_server_flag(server)?;
        settings.known.insert(tld, host);
    }
    if args.tlds.is_some() {
        settings.tlds = args.tlds.clone();
    }

    Ok(settings)
}
