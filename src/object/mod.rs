//! Object resolution
//!
//! Maps request paths to object keys and looks the object up in the store.
//! Nothing is cached: every request stats the object again.

pub mod reader;

pub use reader::RangedReader;

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use std::time::Duration;

use crate::error::{Error, ErrorKind, Result};
use crate::http::mime;
use crate::logger::Logger;
use crate::storage::ObjectStore;

/// A stored object resolved for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHandle {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub created: DateTime<Utc>,
    pub content_type: String,
    pub etag: Option<String>,
}

/// Derive the object key for a request path.
///
/// Returns `None` when the path is not absolute or decodes to invalid UTF-8.
/// The leading `/` is removed and percent-escapes are decoded; an empty key
/// becomes `index_key`.
pub fn object_key(path: &str, index_key: &str) -> Option<String> {
    let raw = path.strip_prefix('/')?;
    let key = percent_decode_str(raw).decode_utf8().ok()?;
    if key.is_empty() {
        Some(index_key.to_string())
    } else {
        Some(key.into_owned())
    }
}

/// Stat `key` in `bucket`, bounded by `timeout`
pub async fn resolve(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    timeout: Duration,
    logger: &Logger,
) -> Result<ObjectHandle> {
    let meta = match tokio::time::timeout(timeout, store.stat_object(bucket, key)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            op: "stat",
            after: timeout,
        }),
    };

    let meta = match meta {
        Ok(meta) => meta,
        Err(err) => {
            match err.kind() {
                ErrorKind::NotFound => {
                    logger.debug(&format!("Object not found: {bucket}/{key}"));
                }
                _ => logger.error(&format!("Failed to stat {bucket}/{key}: {err}")),
            }
            return Err(err);
        }
    };

    let content_type = meta
        .content_type
        .unwrap_or_else(|| mime::content_type_for_key(key).to_string());

    Ok(ObjectHandle {
        bucket: bucket.to_string(),
        key: key.to_string(),
        size: meta.size,
        created: meta.created,
        content_type,
        etag: meta.etag,
    })
}
