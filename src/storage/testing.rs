//! Instrumented stores for tests

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use futures::Stream;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use super::{ByteStream, MemoryStore, ObjectMeta, ObjectStore};
use crate::error::{Error, Result};

pub const BUCKET: &str = "test-bucket";

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap()
}

/// Object bytes `0, 1, 2, ...` wrapping at 256
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

/// Memory store that records every stream it opens
#[derive(Debug)]
pub struct RecordingStore {
    inner: MemoryStore,
    opened_at: Mutex<Vec<u64>>,
    live: Arc<AtomicUsize>,
    pulled: Arc<AtomicUsize>,
}

impl RecordingStore {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            inner: MemoryStore::with_chunk_size(chunk_size),
            opened_at: Mutex::new(Vec::new()),
            live: Arc::new(AtomicUsize::new(0)),
            pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn with_object(chunk_size: usize, key: &str, data: Vec<u8>) -> Self {
        let store = Self::new(chunk_size);
        store
            .inner
            .insert(BUCKET, key, data, Some("application/octet-stream"), fixed_time())
            .await;
        store
    }

    pub const fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Offsets passed to `open_range_stream`, in call order
    pub fn opened_at(&self) -> Vec<u64> {
        self.opened_at.lock().unwrap().clone()
    }

    /// Streams opened and not yet dropped
    pub fn live_streams(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Total bytes handed out by all streams
    pub fn bytes_pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta> {
        self.inner.stat_object(bucket, key).await
    }

    async fn open_range_stream(&self, bucket: &str, key: &str, offset: u64) -> Result<ByteStream> {
        let inner = self.inner.open_range_stream(bucket, key, offset).await?;
        self.opened_at.lock().unwrap().push(offset);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(Tracked {
            inner,
            live: Arc::clone(&self.live),
            pulled: Arc::clone(&self.pulled),
        }))
    }
}

struct Tracked {
    inner: ByteStream,
    live: Arc<AtomicUsize>,
    pulled: Arc<AtomicUsize>,
}

impl Stream for Tracked {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let poll = this.inner.as_mut().poll_next(cx);
        if let Poll::Ready(Some(Ok(chunk))) = &poll {
            this.pulled.fetch_add(chunk.len(), Ordering::SeqCst);
        }
        poll
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store whose every call fails with an I/O error
#[derive(Debug, Default)]
pub struct BrokenStore;

#[async_trait]
impl ObjectStore for BrokenStore {
    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta> {
        Err(Error::backend(
            format!("stat {bucket}/{key}"),
            io::Error::new(io::ErrorKind::PermissionDenied, "access denied"),
        ))
    }

    async fn open_range_stream(&self, bucket: &str, key: &str, _offset: u64) -> Result<ByteStream> {
        Err(Error::backend(
            format!("open {bucket}/{key}"),
            io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"),
        ))
    }
}

/// Store that reports an object but never delivers its bytes
#[derive(Debug)]
pub struct StalledStore {
    pub size: u64,
}

#[async_trait]
impl ObjectStore for StalledStore {
    async fn stat_object(&self, _bucket: &str, _key: &str) -> Result<ObjectMeta> {
        Ok(ObjectMeta {
            size: self.size,
            created: fixed_time(),
            content_type: None,
            etag: None,
        })
    }

    async fn open_range_stream(&self, _bucket: &str, _key: &str, _offset: u64) -> Result<ByteStream> {
        Ok(Box::pin(futures::stream::pending::<io::Result<Bytes>>()))
    }
}
