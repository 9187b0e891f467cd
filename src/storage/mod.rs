//! Object storage backends
//!
//! The serving core only needs two calls from a backend: stat an object and
//! open a byte stream starting at an offset. [`OpendalStore`] reaches remote
//! object storage through opendal, [`FsStore`] maps buckets to directories on
//! local disk and [`MemoryStore`] keeps objects in process.

mod fs;
mod memory;
mod remote;
#[cfg(test)]
pub mod testing;

pub use fs::FsStore;
pub use memory::MemoryStore;
pub use remote::OpendalStore;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::error::Result;

/// Scheme served by [`FsStore`] instead of opendal
pub const LOCAL_SCHEME: &str = "fs";

/// Stream of object bytes as delivered by the backend, in arbitrary chunk sizes
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Object metadata returned by [`ObjectStore::stat_object`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub size: u64,
    pub created: DateTime<Utc>,
    /// Content type recorded by the backend, if any
    pub content_type: Option<String>,
    /// Quoted strong entity tag, only when the backend has a stable content hash
    pub etag: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Fetch object metadata. A missing object is reported as
    /// [`Error::NotFound`](crate::error::Error::NotFound).
    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta>;

    /// Open a stream yielding the object's bytes from `offset` to the end.
    ///
    /// Bytes are produced lazily; dropping the stream releases the backend
    /// resources behind it.
    async fn open_range_stream(&self, bucket: &str, key: &str, offset: u64) -> Result<ByteStream>;
}

/// Open the store selected by `storage.scheme`
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    if config.scheme == LOCAL_SCHEME {
        let store = FsStore::open(&config.root, &config.bucket, config.read_chunk_size).await?;
        return Ok(Arc::new(store));
    }
    let store = OpendalStore::open(
        &config.scheme,
        &config.options,
        &config.bucket,
        config.read_chunk_size,
    )
    .await?;
    Ok(Arc::new(store))
}
