//! Utility functions for domain name handling.
//!
//! This module contains the input normalization used before any network
//! activity: TLD extraction, base-name cleanup and batch domain expansion.

use crate::error::WhoisError;

/// Extract the TLD (the last dot-separated label) from a domain.
///
/// The TLD is returned lowercased.
///
/// # Errors
///
/// Returns `Validation` if the domain contains no dot or ends with one.
pub fn extract_tld(domain: &str) -> Result<String, WhoisError> {
    let domain = domain.trim();

    if domain.is_empty() {
        return Err(WhoisError::validation(domain, "Domain name cannot be empty"));
    }

    match domain.rsplit_once('.') {
        Some((_, tld)) if !tld.is_empty() => Ok(tld.to_lowercase()),
        Some(_) => Err(WhoisError::validation(domain, "Domain name has an empty TLD label")),
        None => Err(WhoisError::validation(
            domain,
            "Domain name must contain a TLD (e.g. example.com)",
        )),
    }
}

/// Normalize a batch base name: trim, lowercase, drop all whitespace.
pub fn normalize_base_name(base_name: &str) -> String {
    base_name
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Normalize one TLD entry: trim, lowercase, strip a leading dot.
pub fn normalize_tld(tld: &str) -> String {
    let tld = tld.trim().to_lowercase();
    tld.strip_prefix('.').unwrap_or(&tld).to_string()
}

/// Normalize a TLD list, dropping empty entries and later duplicates.
pub fn normalize_tlds<S: AsRef<str>>(tlds: &[S]) -> Vec<String> {
    let mut result: Vec<String> = Vec::with_capacity(tlds.len());
    for tld in tlds {
        let tld = normalize_tld(tld.as_ref());
        if !tld.is_empty() && !result.contains(&tld) {
            result.push(tld);
        }
    }
    result
}

/// Build `"{base}.{tld}"` for every TLD, keeping TLD order.
///
/// # Errors
///
/// Returns `Validation` if the base name or the TLD list is empty after
/// normalization.
pub fn build_domain_list<S: AsRef<str>>(base_name: &str, tlds: &[S]) -> Result<Vec<String>, WhoisError> {
    let base = normalize_base_name(base_name);
    if base.is_empty() {
        return Err(WhoisError::validation(base_name, "Please enter a domain name"));
    }

    let tlds = normalize_tlds(tlds);
    if tlds.is_empty() {
        return Err(WhoisError::validation(base, "Please provide at least one TLD"));
    }

    Ok(tlds.iter().map(|tld| format!("{}.{}", base, tld)).collect())
}

/// Clean a user-entered domain.
///
/// Strips a trailing `// comment`, and reduces an `http(s)://` URL to its
/// host. Anything else is returned trimmed.
pub fn clean_domain_input(input: &str) -> String {
    let trimmed = input.trim();

    let candidate = match trimmed.find("// ") {
        Some(idx) => {
            let before = trimmed[..idx].trim();
            if before.is_empty() {
                return trimmed.to_string();
            }
            before
        }
        None => trimmed,
    };

    let rest = candidate
        .strip_prefix("http://")
        .or_else(|| candidate.strip_prefix("https://"));

    match rest {
        Some(rest) => {
            let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
            let host = authority.rsplit('@').next().unwrap_or(authority);
            let host = host.split(':').next().unwrap_or(host);
            if host.is_empty() {
                candidate.to_string()
            } else {
                host.to_lowercase()
            }
        }
        None => candidate.to_string(),
    }
}
