//! In-process object store
//!
//! Objects live in a map keyed by (bucket, key). Streams hand out slices of
//! the stored buffer one chunk at a time, so a reader only pulls what it asks
//! for.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io;
use tokio::sync::RwLock;

use super::{ByteStream, ObjectMeta, ObjectStore};
use crate::error::{Error, Result};
use crate::http::cache;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
struct MemoryObject {
    data: Bytes,
    created: DateTime<Utc>,
    content_type: Option<String>,
    etag: String,
}

#[derive(Debug)]
pub struct MemoryStore {
    objects: RwLock<HashMap<(String, String), MemoryObject>>,
    chunk_size: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Create a store whose streams yield at most `chunk_size` bytes per item
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Store an object, replacing any previous object under the same key
    pub async fn insert(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        content_type: Option<&str>,
        created: DateTime<Utc>,
    ) {
        let data = data.into();
        let object = MemoryObject {
            etag: cache::generate_etag(&data),
            data,
            created,
            content_type: content_type.map(ToString::to_string),
        };
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), key.to_string()), object);
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<MemoryObject> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| Error::not_found(bucket, key))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta> {
        let object = self.get(bucket, key).await?;
        Ok(ObjectMeta {
            size: object.data.len() as u64,
            created: object.created,
            content_type: object.content_type,
            etag: Some(object.etag),
        })
    }

    async fn open_range_stream(&self, bucket: &str, key: &str, offset: u64) -> Result<ByteStream> {
        let data = self.get(bucket, key).await?.data;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let chunk_size = self.chunk_size;

        let stream = futures::stream::unfold(start, move |pos| {
            let data = data.clone();
            async move {
                if pos >= data.len() {
                    return None;
                }
                let end = (pos + chunk_size).min(data.len());
                Some((Ok::<_, io::Error>(data.slice(pos..end)), end))
            }
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    async fn store_with(data: &'static [u8], chunk: usize) -> MemoryStore {
        let store = MemoryStore::with_chunk_size(chunk);
        store.insert("b", "obj.bin", data, None, Utc::now()).await;
        store
    }

    #[tokio::test]
    async fn test_stat_reports_size_and_etag() {
        let store = store_with(b"hello world", 4).await;
        let meta = store.stat_object("b", "obj.bin").await.unwrap();
        assert_eq!(meta.size, 11);
        assert!(meta.etag.is_some());
        assert_eq!(meta.content_type, None);
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let store = MemoryStore::new();
        let err = store.stat_object("b", "nope").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
        let Err(err) = store.open_range_stream("b", "nope", 0).await else {
            panic!("expected not found");
        };
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_stream_is_chunked_from_offset() {
        let store = store_with(b"0123456789", 4).await;
        let stream = store.open_range_stream("b", "obj.bin", 3).await.unwrap();
        let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
        assert_eq!(
            chunks,
            vec![
                Bytes::from_static(b"3456"),
                Bytes::from_static(b"789"),
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_past_end_is_empty() {
        let store = store_with(b"abc", 4).await;
        let stream = store.open_range_stream("b", "obj.bin", 10).await.unwrap();
        let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
        assert!(chunks.is_empty());
    }
}
