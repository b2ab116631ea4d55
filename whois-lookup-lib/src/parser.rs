//! Free-text WHOIS record parsing.
//!
//! WHOIS responses have no schema. This parser applies one generic strategy:
//! take the section before the first blank line, read `key: value` lines
//! from it until the `>>> Last update of ... <<<` marker, and look the
//! creation date up under a table of known labels. Trailing sections (legal
//! notices, terms of use) are ignored.
//!
//! Registration status is derived solely from the creation date. Registries
//! whose "not found" answer still carries a creation label, or whose
//! registered answer uses an unknown label, are misclassified.

use crate::types::{ParsedRecord, RecordFields};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Labels under which registries report the creation date, in lookup order.
pub const CREATION_DATE_LABELS: &[&str] = &[
    "Creation Date",
    "created",
    "Created On",
    "Registration Time",
    "Created Date",
    "Domain Registration Date",
];

const LAST_UPDATE_MARKER: &str = ">>> Last update of";
const LAST_UPDATE_START: &str = "database:";
const LAST_UPDATE_END: &str = "<<<";

/// Date-time layouts without an offset; read as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y.%m.%d %H:%M:%S",
    "%d-%b-%Y %H:%M:%S",
];

/// Date-time layouts carrying a numeric offset.
const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
];

/// Date-only layouts; midnight UTC.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%d-%b-%Y", "%d %b %Y"];

/// Parse a raw WHOIS response into a `ParsedRecord`.
///
/// Pure and total: the worst case is an unregistered record with no dates
/// and no fields.
///
/// # Example
///
/// ```rust
/// use whois_lookup_lib::parse_record;
///
/// let record = parse_record("Domain Name: EXAMPLE.COM\nCreation Date: 1995-08-14T04:00:00Z\n");
/// assert!(record.registered);
/// assert_eq!(record.fields.get("Domain Name"), Some("EXAMPLE.COM"));
/// ```
pub fn parse_record(raw: &str) -> ParsedRecord {
    let mut fields = RecordFields::new();
    let mut last_update_date = None;

    for line in leading_section(raw) {
        if line.contains(LAST_UPDATE_MARKER) {
            last_update_date = parse_date(last_update_text(line));
            break;
        }

        if let Some((key, value)) = split_field(line) {
            fields.insert_first(key.to_string(), value.to_string());
        }
    }

    let creation_date = CREATION_DATE_LABELS
        .iter()
        .find_map(|label| fields.get(label))
        .and_then(parse_date);

    ParsedRecord {
        registered: creation_date.is_some(),
        creation_date,
        last_update_date,
        fields,
    }
}

/// Lines before the first blank line. A trailing `\r` does not count as
/// content, so CRLF responses split like LF ones.
fn leading_section(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .take_while(|line| !line.is_empty())
}

/// Text between `database:` and the first `<<<` on the last-update line.
fn last_update_text(line: &str) -> &str {
    let start = line
        .find(LAST_UPDATE_START)
        .map(|idx| idx + LAST_UPDATE_START.len())
        .unwrap_or(0);
    let rest = &line[start..];
    let end = rest.find(LAST_UPDATE_END).unwrap_or(rest.len());
    rest[..end].trim()
}

/// Split on the first colon; both sides must be non-empty after trimming.
fn split_field(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Leniently parse a WHOIS date value into a UTC instant.
///
/// Accepts RFC 3339 / ISO 8601, RFC 2822 and the common registry layouts
/// listed above, optionally followed by a `UTC`/`GMT`/`Z` designator.
/// Returns `None` for anything else.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let value = strip_utc_designator(value);
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
        }
    }

    None
}

fn strip_utc_designator(value: &str) -> &str {
    for suffix in [" UTC", " GMT", "Z", " (UTC)"] {
        if let Some(stripped) = value.strip_suffix(suffix) {
            return stripped.trim_end();
        }
    }
    value
}
