//! Object storage: `get` to a local file, `put` from a local file.

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWriteExt};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object {bucket}/{key} not found")]
    NotFound { bucket: String, key: String },
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("storage request failed: {0}")]
    Request(String),
    #[error("local file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable blob store addressed by (bucket, key).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copy the object at `bucket/key` into the local file `dest`.
    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> Result<(), StorageError>;

    /// Store the local file `src` as `bucket/key`, replacing any existing object.
    async fn upload(&self, src: &Path, bucket: &str, key: &str) -> Result<(), StorageError>;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> Result<(), StorageError> {
        (**self).download(bucket, key, dest).await
    }

    async fn upload(&self, src: &Path, bucket: &str, key: &str) -> Result<(), StorageError> {
        (**self).upload(src, bucket, key).await
    }
}

/// Amazon S3 (or any S3-compatible endpoint).
#[derive(Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    /// Build a client from the ambient AWS configuration.
    ///
    /// `endpoint_url` targets an S3-compatible service such as MinIO, which
    /// usually also needs path-style addressing.
    pub async fn from_env(endpoint_url: Option<&str>, force_path_style: bool) -> Self {
        let cfg = crate::aws_sdk_config().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&cfg);
        if let Some(url) = endpoint_url {
            builder = builder.endpoint_url(url);
        }
        if force_path_style {
            builder = builder.force_path_style(true);
        }
        Self::new(aws_sdk_s3::Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> Result<(), StorageError> {
        let obj = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(se) if se.is_no_such_key() => StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                },
                _ => StorageError::Request(format!(
                    "get_object {bucket}/{key}: {}",
                    DisplayErrorContext(&e)
                )),
            })?;

        let reader = obj.body.into_async_read();
        tokio::pin!(reader);
        let bytes = stream_to_file(&mut reader, dest)
            .await
            .map_err(|e| StorageError::Request(format!("read body of {bucket}/{key}: {e}")))?;

        tracing::info!(bucket, key, bytes, dest = %dest.display(), "downloaded object");
        Ok(())
    }

    async fn upload(&self, src: &Path, bucket: &str, key: &str) -> Result<(), StorageError> {
        let body = ByteStream::from_path(src)
            .await
            .map_err(|e| StorageError::Request(format!("open {}: {e}", src.display())))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                StorageError::Request(format!("put_object {bucket}/{key}: {}", DisplayErrorContext(&e)))
            })?;

        tracing::info!(bucket, key, src = %src.display(), "uploaded object");
        Ok(())
    }
}

/// Copy a body stream into a new file at `dest`, returning the bytes written.
async fn stream_to_file<R>(reader: &mut R, dest: &Path) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut file = tokio::fs::File::create(dest).await?;
    let bytes = tokio::io::copy(reader, &mut file).await?;
    file.flush().await?;
    Ok(bytes)
}

/// Directory-backed store: bucket `b`, key `k` lives at `<root>/b/k`.
///
/// Used for local runs of the pipeline.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an object to its path, refusing anything that could escape the root.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        for part in [bucket, key] {
            let path = Path::new(part);
            let normal = path.components().all(|c| matches!(c, Component::Normal(_)));
            if part.is_empty() || !normal {
                return Err(StorageError::InvalidKey(part.to_string()));
            }
        }
        Ok(self.root.join(bucket).join(key))
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::copy(&path, dest).await {
            Ok(bytes) => {
                tracing::debug!(bucket, key, bytes, "copied object from local store");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !path.exists() => {
                Err(StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn upload(&self, src: &Path, bucket: &str, key: &str) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = tokio::fs::copy(src, &path).await?;
        tracing::debug!(bucket, key, bytes, "copied object into local store");
        Ok(())
    }
}
