//! Object store backed by an opendal [`Operator`]
//!
//! One operator serves one bucket. The scheme and its options come from the
//! `[storage]` section, so the same code reads from S3, GCS, Azure Blob or
//! any other service opendal was built with.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opendal::{Operator, Scheme};
use std::collections::HashMap;
use std::io;
use std::str::FromStr;

use super::{ByteStream, ObjectMeta, ObjectStore};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct OpendalStore {
    op: Operator,
    bucket: String,
    chunk_size: usize,
}

impl OpendalStore {
    /// Wrap an operator whose root is the contents of `bucket`
    pub fn new(op: Operator, bucket: &str, chunk_size: usize) -> Self {
        Self {
            op,
            bucket: bucket.to_string(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Build an operator for `scheme` and check that the bucket answers.
    ///
    /// `bucket` is passed to the service as its `bucket` option unless the
    /// options already name one.
    pub async fn open(
        scheme: &str,
        options: &HashMap<String, String>,
        bucket: &str,
        chunk_size: usize,
    ) -> Result<Self> {
        let context = || format!("open {scheme} bucket {bucket}");
        let scheme = Scheme::from_str(scheme).map_err(|e| Error::backend(context(), e.into()))?;

        let mut options = options.clone();
        options
            .entry("bucket".to_string())
            .or_insert_with(|| bucket.to_string());

        let op = Operator::via_iter(scheme, options).map_err(|e| Error::backend(context(), e.into()))?;
        op.check()
            .await
            .map_err(|e| Error::backend(context(), e.into()))?;
        Ok(Self::new(op, bucket, chunk_size))
    }

    fn check_bucket(&self, bucket: &str, key: &str) -> Result<()> {
        if bucket == self.bucket {
            Ok(())
        } else {
            Err(Error::not_found(bucket, key))
        }
    }
}

fn classify(bucket: &str, key: &str, op: &str, err: opendal::Error) -> Error {
    if err.kind() == opendal::ErrorKind::NotFound {
        Error::not_found(bucket, key)
    } else {
        Error::backend(format!("{op} {bucket}/{key}"), io::Error::from(err))
    }
}

/// Services differ on whether the entity tag arrives quoted
fn quote_etag(etag: &str) -> String {
    if etag.starts_with('"') || etag.starts_with("W/") {
        etag.to_string()
    } else {
        format!("\"{etag}\"")
    }
}

#[async_trait]
impl ObjectStore for OpendalStore {
    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta> {
        self.check_bucket(bucket, key)?;
        if key.ends_with('/') {
            return Err(Error::not_found(bucket, key));
        }
        let meta = self
            .op
            .stat(key)
            .await
            .map_err(|e| classify(bucket, key, "stat", e))?;
        if meta.is_dir() {
            return Err(Error::not_found(bucket, key));
        }

        Ok(ObjectMeta {
            size: meta.content_length(),
            // Some services keep no timestamps at all
            created: meta.last_modified().unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            content_type: meta.content_type().map(ToString::to_string),
            etag: meta.etag().map(quote_etag),
        })
    }

    async fn open_range_stream(&self, bucket: &str, key: &str, offset: u64) -> Result<ByteStream> {
        self.check_bucket(bucket, key)?;
        let reader = self
            .op
            .reader_with(key)
            .chunk(self.chunk_size)
            .await
            .map_err(|e| classify(bucket, key, "open", e))?;
        let stream = reader
            .into_bytes_stream(offset..)
            .await
            .map_err(|e| classify(bucket, key, "open", e))?;
        Ok(Box::pin(stream))
    }
}
