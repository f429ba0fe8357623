use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use super::error::StorageError;
use super::traits::{BoxReader, ObjectStore};

/// Connection settings for an S3-compatible endpoint (MinIO in dev).
#[derive(Clone, Debug)]
pub struct S3Config {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    /// Path-style addressing, required by MinIO.
    pub path_style: bool,
}

/// Object store over an S3-compatible backend.
///
/// Availability is cached in a process-wide flag: once a probe fails the
/// flag stays down until a later call re-probes successfully. Operations
/// against an unavailable backend fail with `StorageError::Unavailable`
/// instead of hanging on every request.
pub struct S3ObjectStore {
    bucket: Box<Bucket>,
    bucket_name: String,
    available: AtomicBool,
}

impl S3ObjectStore {
    pub fn new(config: &S3Config) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Backend(format!("credentials: {e}")))?;

        let mut bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| StorageError::Backend(format!("bucket init: {e}")))?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self {
            bucket,
            bucket_name: config.bucket.clone(),
            available: AtomicBool::new(false),
        })
    }

    /// Startup probe. The service keeps running when the backend is down;
    /// storage operations fail until a later probe succeeds.
    pub async fn probe(&self) -> bool {
        match self.bucket.exists().await {
            Ok(true) => {
                self.available.store(true, Ordering::Relaxed);
                info!(bucket = %self.bucket_name, "object store reachable");
                true
            }
            Ok(false) => {
                self.available.store(false, Ordering::Relaxed);
                warn!(bucket = %self.bucket_name, "bucket does not exist");
                false
            }
            Err(e) => {
                self.available.store(false, Ordering::Relaxed);
                warn!(bucket = %self.bucket_name, error = %e, "object store unreachable");
                false
            }
        }
    }

    async fn ensure_available(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::Relaxed) {
            return Ok(());
        }
        if self.probe().await {
            return Ok(());
        }
        Err(StorageError::Unavailable(format!(
            "bucket {} unreachable",
            self.bucket_name
        )))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        key: &str,
        mut reader: BoxReader,
        len: u64,
        content_type: &str,
    ) -> Result<String, StorageError> {
        self.ensure_available().await?;

        // Uploads are bounded by the service-level size cap, so buffering
        // the stream keeps the single-request put path (and its ETag).
        let mut data = Vec::with_capacity(len as usize);
        reader.read_to_end(&mut data).await?;

        let response = self
            .bucket
            .put_object_with_content_type(key, &data, content_type)
            .await
            .map_err(|e| StorageError::Backend(format!("put {key}: {e}")))?;

        let etag = response
            .headers()
            .get("etag")
            .map(|v| v.trim_matches('"').to_string())
            .unwrap_or_default();
        Ok(etag)
    }

    async fn get(&self, key: &str) -> Result<BoxReader, StorageError> {
        self.ensure_available().await?;

        let response = self
            .bucket
            .get_object(key)
            .await
            .map_err(|e| map_get_error(key, e))?;
        if response.status_code() == 404 {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let data = response.bytes().to_vec();
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.ensure_available().await?;

        match self.bucket.delete_object(key).await {
            Ok(_) => Ok(()),
            // Deleting a missing key is not an error.
            Err(s3::error::S3Error::HttpFailWithBody(404, _)) => Ok(()),
            Err(e) => Err(StorageError::Backend(format!("delete {key}: {e}"))),
        }
    }

    async fn presign_get(&self, key: &str, expiry_secs: u32) -> Result<String, StorageError> {
        self.bucket
            .presign_get(key, expiry_secs, None)
            .await
            .map_err(|e| StorageError::Backend(format!("presign get {key}: {e}")))
    }

    async fn presign_put(
        &self,
        key: &str,
        _content_type: &str,
        expiry_secs: u32,
    ) -> Result<String, StorageError> {
        self.bucket
            .presign_put(key, expiry_secs, None, None)
            .await
            .map_err(|e| StorageError::Backend(format!("presign put {key}: {e}")))
    }

    async fn healthy(&self) -> bool {
        self.bucket.exists().await.unwrap_or(false)
    }

    fn bucket_name(&self) -> &str {
        &self.bucket_name
    }
}

fn map_get_error(key: &str, err: s3::error::S3Error) -> StorageError {
    match err {
        s3::error::S3Error::HttpFailWithBody(404, _) => StorageError::NotFound(key.to_string()),
        other => StorageError::Backend(format!("get {key}: {other}")),
    }
}
