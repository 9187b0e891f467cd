//! Local filesystem object store
//!
//! A bucket is a directory under the store root and an object key is a
//! relative path inside it. Keys that would escape the bucket directory are
//! reported as not found.

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, Utc};
use std::io::{self, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::{ByteStream, ObjectMeta, ObjectStore};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    chunk_size: usize,
}

impl FsStore {
    /// Open a store rooted at `root`, checking that `bucket` exists under it
    pub async fn open(root: impl Into<PathBuf>, bucket: &str, chunk_size: usize) -> Result<Self> {
        let store = Self {
            root: root.into(),
            chunk_size: chunk_size.max(1),
        };
        let dir = store.bucket_dir(bucket)?;
        let meta = fs::metadata(&dir)
            .await
            .map_err(|e| Error::backend(format!("open bucket {}", dir.display()), e))?;
        if !meta.is_dir() {
            return Err(Error::backend(
                format!("open bucket {}", dir.display()),
                io::Error::other("bucket is not a directory"),
            ));
        }
        Ok(store)
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf> {
        let bucket_path = Path::new(bucket);
        let mut components = bucket_path.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(bucket_path)),
            _ => Err(Error::backend(
                format!("invalid bucket name '{bucket}'"),
                io::Error::from(io::ErrorKind::InvalidInput),
            )),
        }
    }

    /// Resolve a key to a file path; `None` when the key leaves the bucket
    fn object_path(&self, bucket: &str, key: &str) -> Result<Option<PathBuf>> {
        let relative = Path::new(key);
        let contained = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained {
            return Ok(None);
        }
        Ok(Some(self.bucket_dir(bucket)?.join(relative)))
    }
}

fn classify(bucket: &str, key: &str, op: &str, err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::NotFound {
        Error::not_found(bucket, key)
    } else {
        Error::backend(format!("{op} {bucket}/{key}"), err)
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta> {
        let Some(path) = self.object_path(bucket, key)? else {
            return Err(Error::not_found(bucket, key));
        };
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| classify(bucket, key, "stat", e))?;
        if !meta.is_file() {
            return Err(Error::not_found(bucket, key));
        }

        // Not every filesystem records a birth time
        let created = meta
            .created()
            .or_else(|_| meta.modified())
            .map_err(|e| Error::backend(format!("stat {bucket}/{key}"), e))?;

        Ok(ObjectMeta {
            size: meta.len(),
            created: DateTime::<Utc>::from(created),
            content_type: None,
            etag: None,
        })
    }

    async fn open_range_stream(&self, bucket: &str, key: &str, offset: u64) -> Result<ByteStream> {
        let Some(path) = self.object_path(bucket, key)? else {
            return Err(Error::not_found(bucket, key));
        };
        let mut file = fs::File::open(&path)
            .await
            .map_err(|e| classify(bucket, key, "open", e))?;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| Error::backend(format!("seek {bucket}/{key} to {offset}"), e))?;

        let chunk_size = self.chunk_size;
        let stream = futures::stream::try_unfold(file, move |mut file| async move {
            let mut buf = BytesMut::zeroed(chunk_size);
            let n = file.read(&mut buf).await?;
            if n == 0 {
                return Ok(None);
            }
            buf.truncate(n);
            Ok::<_, io::Error>(Some((buf.freeze(), file)))
        });
        Ok(Box::pin(stream))
    }
}
