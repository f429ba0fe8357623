use std::io::Cursor;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Key-addressed object storage over an S3-compatible backend.
///
/// Presigning never requires a network round-trip. `delete` is idempotent:
/// removing a missing key is not an error.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store the full contents of `reader` under `key` and return the ETag.
    ///
    /// The reader is consumed fully; `len` is the declared content length.
    async fn put(
        &self,
        key: &str,
        reader: BoxReader,
        len: u64,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Store a byte buffer under `key`.
    async fn put_bytes(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        let len = data.len() as u64;
        let reader: BoxReader = Box::new(Cursor::new(data.to_vec()));
        self.put(key, reader, len, content_type).await
    }

    /// Open a streaming reader on the object at `key`.
    async fn get(&self, key: &str) -> Result<BoxReader, StorageError>;

    /// Retrieve the full contents of the object at `key`.
    async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.get(key).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Delete the object at `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Produce a presigned download URL valid for `expiry_secs`.
    async fn presign_get(&self, key: &str, expiry_secs: u32) -> Result<String, StorageError>;

    /// Produce a presigned upload URL valid for `expiry_secs`.
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expiry_secs: u32,
    ) -> Result<String, StorageError>;

    /// Non-raising connectivity check.
    async fn healthy(&self) -> bool;

    /// Name of the bucket this store writes into.
    fn bucket_name(&self) -> &str;
}
