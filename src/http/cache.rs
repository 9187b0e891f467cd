//! HTTP cache validation module
//!
//! Provides `ETag` generation, HTTP-date handling and evaluation of the
//! conditional request headers (`If-Match`, `If-None-Match`,
//! `If-Modified-Since`, `If-Unmodified-Since`, `If-Range`).

use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Generate `ETag` using fast hashing
///
/// # Returns
/// Quoted `ETag` string, e.g., `"abc123def"`
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    let v = hasher.finish();
    format!("\"{v:x}\"")
}

/// Format a timestamp as an IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format(HTTP_DATE_FORMAT).to_string()
}

/// Parse an IMF-fixdate; other date formats are treated as absent
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), HTTP_DATE_FORMAT)
        .ok()
        .map(|t| t.and_utc())
}

/// Validators describing the current representation of an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validators {
    /// Modification time, truncated to whole seconds
    pub last_modified: DateTime<Utc>,
    pub etag: Option<String>,
}

impl Validators {
    pub fn new(last_modified: DateTime<Utc>, etag: Option<String>) -> Self {
        Self {
            last_modified: truncate_to_seconds(last_modified),
            etag,
        }
    }

    pub fn last_modified_header(&self) -> String {
        format_http_date(self.last_modified)
    }
}

fn truncate_to_seconds(time: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or(time)
}

/// Conditional request headers, as sent by the client
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
    pub if_unmodified_since: Option<String>,
    pub if_range: Option<String>,
}

/// Outcome of precondition evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Serve the request normally
    Proceed,
    /// 304 Not Modified
    NotModified,
    /// 412 Precondition Failed
    Failed,
}

fn opaque_tag(tag: &str) -> &str {
    tag.trim().trim_start_matches("W/")
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Supports:
/// - Single `ETag`: `"abc123"`
/// - Multiple `ETags`: `"abc123", "def456"`
/// - Wildcard: `*`
///
/// Comparison is weak: a `W/` prefix on either side is ignored.
pub fn check_etag_match(if_none_match: Option<&str>, etag: Option<&str>) -> bool {
    if_none_match.is_some_and(|client_etag| {
        client_etag.split(',').any(|e| {
            e.trim() == "*" || etag.is_some_and(|etag| opaque_tag(e) == opaque_tag(etag))
        })
    })
}

/// Strong comparison for `If-Match`; weak tags never match
fn check_strong_match(if_match: &str, etag: Option<&str>) -> bool {
    if_match.split(',').any(|e| {
        let e = e.trim();
        e == "*" || etag.is_some_and(|etag| !e.starts_with("W/") && !etag.starts_with("W/") && e == etag)
    })
}

/// Evaluate preconditions in RFC 7232 order for a GET or HEAD request
pub fn evaluate(conditions: &Conditions, validators: &Validators) -> Precondition {
    let etag = validators.etag.as_deref();

    if let Some(if_match) = conditions.if_match.as_deref() {
        if !check_strong_match(if_match, etag) {
            return Precondition::Failed;
        }
    } else if let Some(since) = conditions.if_unmodified_since.as_deref().and_then(parse_http_date) {
        if validators.last_modified > since {
            return Precondition::Failed;
        }
    }

    if conditions.if_none_match.is_some() {
        if check_etag_match(conditions.if_none_match.as_deref(), etag) {
            return Precondition::NotModified;
        }
    } else if let Some(since) = conditions.if_modified_since.as_deref().and_then(parse_http_date) {
        if validators.last_modified <= since {
            return Precondition::NotModified;
        }
    }

    Precondition::Proceed
}

/// Whether a `Range` header should be honoured given `If-Range`
///
/// An absent `If-Range` always allows the range. A date must equal the
/// last-modified time exactly; an entity tag must strongly match.
pub fn if_range_allows(if_range: Option<&str>, validators: &Validators) -> bool {
    let Some(value) = if_range.map(str::trim) else {
        return true;
    };
    if value.starts_with('"') {
        return validators
            .etag
            .as_deref()
            .is_some_and(|etag| !etag.starts_with("W/") && etag == value);
    }
    if value.starts_with("W/") {
        return false;
    }
    parse_http_date(value).is_some_and(|date| date == validators.last_modified)
}
