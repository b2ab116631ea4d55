//! # WHOIS Lookup Library
//!
//! An asynchronous WHOIS client: raw port-43 queries with timeouts and
//! retries, TLD server discovery through the IANA root server, a lenient
//! record parser and multi-TLD batch queries with live progress.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use whois_lookup_lib::WhoisChecker;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let checker = WhoisChecker::new();
//!     let (result, record) = checker.lookup_domain("example.com").await?;
//!
//!     println!("{} answered in {}ms", result.server, result.elapsed_ms);
//!     println!("Registered: {}", record.registered);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Low-level client**: one query line per connection, read until the server closes
//! - **Server discovery**: known servers first, IANA referral otherwise
//! - **Record parsing**: key/value fields, creation and last-update dates
//! - **Batch queries**: bounded concurrency, one snapshot per completed domain
//! - **Configurable**: TOML files and `WL_*` environment variables

// Re-export main public API types and functions
pub use checker::{SnapshotStream, WhoisChecker};
pub use concurrent::{run_batch, BatchSnapshot, MAX_CONCURRENCY};
pub use config::{
    env_config_from, load_env_config, parse_duration_string, BatchConfig, ConfigManager,
    EnvConfig, FileConfig, QueryOverrides,
};
pub use error::{Cause, WhoisError};
pub use parser::{parse_date, parse_record, CREATION_DATE_LABELS};
pub use protocols::{
    extract_referral, KnownServers, NoKnownServers, ServerResolver, WhoisClient,
    IANA_WHOIS_SERVER,
};
pub use types::{
    BatchItem, BatchStatus, LookupConfig, ParsedRecord, QueryOptions, QueryResult, RecordFields,
    ServerTarget, TextEncoding, WHOIS_PORT,
};
pub use utils::{
    build_domain_list, clean_domain_input, extract_tld, normalize_base_name, normalize_tld,
    normalize_tlds,
};

// Internal modules - these are not part of the public API
mod checker;
mod concurrent;
mod config;
mod error;
mod parser;
mod protocols;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, WhoisError>;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
