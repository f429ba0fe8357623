use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use md5::Md5;
use sha2::Digest;
use tokio::fs;
use tokio::io::AsyncReadExt;

use super::error::StorageError;
use super::traits::{BoxReader, ObjectStore};

/// Filesystem-backed object store for local development and tests.
///
/// Object keys map directly onto paths below `base_path`. Writes go through
/// a temp file and a rename so a crashed put never leaves a partial object
/// at its final key. Presigned URLs are fabricated `file://` URLs that carry
/// the expiry in the query string; nothing enforces them, they exist so
/// calling code can be exercised without an S3 endpoint.
pub struct FilesystemObjectStore {
    base_path: PathBuf,
    bucket: String,
}

impl FilesystemObjectStore {
    pub async fn new(base_path: PathBuf, bucket: impl Into<String>) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            bucket: bucket.into(),
        })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("empty key".into()));
    }
    if key.starts_with('/') {
        return Err(StorageError::InvalidKey(format!("absolute key: {key}")));
    }
    if Path::new(key)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(StorageError::InvalidKey(format!(
            "path traversal in key: {key}"
        )));
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn put(
        &self,
        key: &str,
        mut reader: BoxReader,
        _len: u64,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        let object_path = self.object_path(key)?;
        let temp_path = self.temp_path();

        let mut temp_file = fs::File::create(&temp_path).await?;
        // S3 reports the MD5 of a simple put as the ETag; do the same.
        let mut hasher = Md5::new();
        let mut buf = vec![0u8; 64 * 1024];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    drop(temp_file);
                    let _ = fs::remove_file(&temp_path).await;
                    return Err(e.into());
                }
            };
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            tokio::io::AsyncWriteExt::write_all(&mut temp_file, &buf[..n]).await?;
        }

        tokio::io::AsyncWriteExt::flush(&mut temp_file).await?;
        drop(temp_file);

        if let Some(parent) = object_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(&temp_path, &object_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(hex::encode(hasher.finalize()))
    }

    async fn get(&self, key: &str) -> Result<BoxReader, StorageError> {
        let path = self.object_path(key)?;
        match fs::File::open(&path).await {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn presign_get(&self, key: &str, expiry_secs: u32) -> Result<String, StorageError> {
        validate_key(key)?;
        Ok(format!(
            "file://{}/{key}?X-Amz-Expires={expiry_secs}",
            self.base_path.display()
        ))
    }

    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expiry_secs: u32,
    ) -> Result<String, StorageError> {
        validate_key(key)?;
        Ok(format!(
            "file://{}/{key}?X-Amz-Expires={expiry_secs}&Content-Type={content_type}",
            self.base_path.display()
        ))
    }

    async fn healthy(&self) -> bool {
        self.base_path.is_dir()
    }

    fn bucket_name(&self) -> &str {
        &self.bucket
    }
}
