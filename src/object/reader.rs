//! Ranged reader over a remote object
//!
//! [`RangedReader`] answers `read_at(offset, length)` calls against a stored
//! object without downloading it. It keeps at most one backend stream open,
//! positioned at the byte after the last one returned; a read that continues
//! from there reuses it, any other offset drops it and opens a fresh stream.

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

use super::ObjectHandle;
use crate::error::{Error, Result};
use crate::logger::Logger;
use crate::storage::{ByteStream, ObjectStore};

/// Backend stream left open between reads
struct OpenStream {
    stream: ByteStream,
    /// Object offset of the first byte of `pending`
    position: u64,
    /// Bytes already pulled from the stream but not yet returned
    pending: Bytes,
}

pub struct RangedReader {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key: String,
    size: u64,
    timeout: Duration,
    logger: Arc<Logger>,
    open: Option<OpenStream>,
}

impl RangedReader {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        handle: &ObjectHandle,
        timeout: Duration,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            store,
            bucket: handle.bucket.clone(),
            key: handle.key.clone(),
            size: handle.size,
            timeout,
            logger,
            open: None,
        }
    }

    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Offset the open stream will deliver next, if one is open
    pub fn position(&self) -> Option<u64> {
        self.open.as_ref().map(|s| s.position)
    }

    /// Read up to `length` bytes starting at `offset`.
    ///
    /// The result is shorter than `length` only when the object ends first;
    /// an offset at or past the end yields empty bytes.
    pub async fn read_at(&mut self, offset: u64, length: u64) -> Result<Bytes> {
        if offset >= self.size || length == 0 {
            return Ok(Bytes::new());
        }
        let wanted = usize::try_from(length.min(self.size - offset)).unwrap_or(usize::MAX);

        let mut open = match self.open.take() {
            Some(open) if open.position == offset => open,
            stale => {
                drop(stale);
                self.open_at(offset).await?
            }
        };

        // Fast path: the buffered chunk already covers the whole window
        if open.pending.len() >= wanted {
            let out = open.pending.split_to(wanted);
            open.position += wanted as u64;
            self.open = Some(open);
            return Ok(out);
        }

        let mut out = BytesMut::with_capacity(wanted);
        let mut exhausted = false;
        while out.len() < wanted {
            if open.pending.is_empty() {
                match self.next_chunk(&mut open.stream).await? {
                    Some(chunk) => open.pending = chunk,
                    None => {
                        exhausted = true;
                        break;
                    }
                }
            }
            let take = (wanted - out.len()).min(open.pending.len());
            out.extend_from_slice(&open.pending.split_to(take));
            open.position += take as u64;
        }

        if exhausted {
            self.logger.warn(&format!(
                "Stream for {}/{} ended at {} of {} bytes",
                self.bucket, self.key, open.position, self.size
            ));
        } else {
            self.open = Some(open);
        }
        Ok(out.freeze())
    }

    /// Release the backend stream, if any
    pub fn close(&mut self) {
        self.open = None;
    }

    // Helpers borrow `self` mutably: `ByteStream` is not `Sync`, so a shared
    // borrow held across an await would make the body future `!Send`.
    #[allow(clippy::needless_pass_by_ref_mut)]
    async fn open_at(&mut self, offset: u64) -> Result<OpenStream> {
        self.logger.debug(&format!(
            "Opening stream for {}/{} at offset {offset}",
            self.bucket, self.key
        ));
        let opened = tokio::time::timeout(
            self.timeout,
            self.store.open_range_stream(&self.bucket, &self.key, offset),
        )
        .await
        .map_err(|_| Error::Timeout {
            op: "open stream",
            after: self.timeout,
        })?;

        Ok(OpenStream {
            stream: opened?,
            position: offset,
            pending: Bytes::new(),
        })
    }

    #[allow(clippy::needless_pass_by_ref_mut)]
    async fn next_chunk(&mut self, stream: &mut ByteStream) -> Result<Option<Bytes>> {
        let next = tokio::time::timeout(self.timeout, stream.next())
            .await
            .map_err(|_| Error::Timeout {
                op: "stream read",
                after: self.timeout,
            })?;

        match next {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(Error::backend(
                format!("read {}/{}", self.bucket, self.key),
                e,
            )),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::logger::Level;
    use crate::storage::testing::{fixed_time, pattern, BrokenStore, RecordingStore, StalledStore, BUCKET};

    fn handle(size: u64) -> ObjectHandle {
        ObjectHandle {
            bucket: BUCKET.to_string(),
            key: "obj".to_string(),
            size,
            created: fixed_time(),
            content_type: "application/octet-stream".to_string(),
            etag: None,
        }
    }

    async fn reader_over(len: usize, chunk: usize) -> (Arc<RecordingStore>, RangedReader) {
        let store = Arc::new(RecordingStore::with_object(chunk, "obj", pattern(len)).await);
        let (logger, _) = Logger::capture(Level::Debug);
        let reader = RangedReader::new(
            store.clone(),
            &handle(len as u64),
            Duration::from_secs(1),
            Arc::new(logger),
        );
        (store, reader)
    }

    #[tokio::test]
    async fn test_read_window() {
        let (store, mut reader) = reader_over(100, 16).await;
        let bytes = reader.read_at(10, 20).await.unwrap();
        assert_eq!(&bytes[..], &pattern(100)[10..30]);
        assert_eq!(store.opened_at(), vec![10]);
        assert_eq!(reader.position(), Some(30));
    }

    #[tokio::test]
    async fn test_sequential_reads_reuse_stream() {
        let (store, mut reader) = reader_over(100, 7).await;
        let a = reader.read_at(0, 10).await.unwrap();
        let b = reader.read_at(10, 10).await.unwrap();
        let c = reader.read_at(20, 3).await.unwrap();
        assert_eq!(&a[..], &pattern(100)[0..10]);
        assert_eq!(&b[..], &pattern(100)[10..20]);
        assert_eq!(&c[..], &pattern(100)[20..23]);
        assert_eq!(store.opened_at(), vec![0]);
        assert_eq!(store.live_streams(), 1);
    }

    #[tokio::test]
    async fn test_discontinuous_read_reopens() {
        let (store, mut reader) = reader_over(100, 8).await;
        reader.read_at(0, 4).await.unwrap();
        let bytes = reader.read_at(50, 4).await.unwrap();
        assert_eq!(&bytes[..], &pattern(100)[50..54]);
        reader.read_at(10, 4).await.unwrap();
        assert_eq!(store.opened_at(), vec![0, 50, 10]);
        assert_eq!(store.live_streams(), 1);
    }

    #[tokio::test]
    async fn test_short_read_at_end() {
        let (_store, mut reader) = reader_over(100, 16).await;
        let bytes = reader.read_at(95, 50).await.unwrap();
        assert_eq!(&bytes[..], &pattern(100)[95..100]);
        assert!(reader.read_at(100, 10).await.unwrap().is_empty());
        assert!(reader.read_at(500, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_does_not_pull_past_window() {
        let (store, mut reader) = reader_over(1000, 10).await;
        reader.read_at(100, 25).await.unwrap();
        // Three chunks cover [100, 130); nothing beyond is pulled
        assert_eq!(store.bytes_pulled(), 30);
    }

    #[tokio::test]
    async fn test_drop_and_close_release_stream() {
        let (store, mut reader) = reader_over(100, 16).await;
        reader.read_at(0, 5).await.unwrap();
        assert_eq!(store.live_streams(), 1);
        reader.close();
        assert_eq!(store.live_streams(), 0);

        reader.read_at(5, 5).await.unwrap();
        assert_eq!(store.live_streams(), 1);
        drop(reader);
        assert_eq!(store.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure() {
        let (logger, _) = Logger::capture(Level::Debug);
        let mut reader = RangedReader::new(
            Arc::new(BrokenStore),
            &handle(10),
            Duration::from_secs(1),
            Arc::new(logger),
        );
        let err = reader.read_at(0, 5).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
    }

    #[tokio::test]
    async fn test_stalled_stream_times_out() {
        let (logger, _) = Logger::capture(Level::Debug);
        let mut reader = RangedReader::new(
            Arc::new(StalledStore { size: 10 }),
            &handle(10),
            Duration::from_millis(20),
            Arc::new(logger),
        );
        let err = reader.read_at(0, 5).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { op: "stream read", .. }));
    }
}
