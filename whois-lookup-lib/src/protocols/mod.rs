//! Protocol implementations for WHOIS lookups.
//!
//! This module contains the raw TCP WHOIS client and the TLD server
//! resolution built on top of it.

/// WHOIS protocol implementation (single attempts and retries)
pub mod whois;

/// Known-server lookup and IANA referral discovery
pub mod registry;

// Re-export commonly used functions and types
pub use registry::{extract_referral, KnownServers, NoKnownServers, ServerResolver, IANA_WHOIS_SERVER};
pub use whois::WhoisClient;
