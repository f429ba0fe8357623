use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    /// Path-style addressing, required by MinIO.
    pub path_style: bool,
    /// Upload size cap in bytes (boundary inclusive).
    pub max_file_size: u64,
    /// Default chunk size for resumable uploads, in bytes.
    pub chunk_size: u32,
    /// Lifetime of presigned GET/PUT URLs, in seconds.
    pub presign_expiry_secs: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImgproxyConfig {
    /// Internal imgproxy base URL.
    pub base_url: String,
    /// Externally proxied base URL; preferred when non-empty.
    #[serde(default)]
    pub external_base_url: String,
    /// Hex-encoded HMAC key.
    pub key: String,
    /// Hex-encoded HMAC salt.
    pub salt: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdminConfig {
    pub password: String,
    pub token_secret: String,
    pub token_expiry_hours: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TasksConfig {
    /// Cadence of the pending-task sweep, in seconds.
    pub pending_sweep_secs: u64,
    /// Delay before the first pending sweep.
    pub pending_sweep_initial_secs: u64,
    /// Cadence of the failed-task retry sweep, in seconds.
    pub retry_sweep_secs: u64,
    /// Delay before the first retry sweep.
    pub retry_sweep_initial_secs: u64,
    /// Cadence of the upload-task expiry sweep, in seconds.
    pub expiry_sweep_secs: u64,
    /// Rows claimed per sweep.
    pub batch_size: u64,
    /// Worker pool size.
    pub pool_workers: usize,
    /// Worker pool queue capacity.
    pub pool_queue: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub imgproxy: ImgproxyConfig,
    pub admin: AdminConfig,
    pub tasks: TasksConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            .set_default("database.url", "postgres://localhost/imgvault")?
            .set_default("storage.endpoint", "http://127.0.0.1:9000")?
            .set_default("storage.region", "us-east-1")?
            .set_default("storage.bucket", "imgvault")?
            .set_default("storage.access_key", "minioadmin")?
            .set_default("storage.secret_key", "minioadmin")?
            .set_default("storage.path_style", true)?
            .set_default("storage.max_file_size", 50 * 1024 * 1024i64)?
            .set_default("storage.chunk_size", 5 * 1024 * 1024i64)?
            .set_default("storage.presign_expiry_secs", 3600)?
            .set_default("imgproxy.base_url", "http://127.0.0.1:8888")?
            .set_default("imgproxy.external_base_url", "")?
            .set_default("imgproxy.key", "")?
            .set_default("imgproxy.salt", "")?
            .set_default("admin.password", "")?
            .set_default("admin.token_secret", "")?
            .set_default("admin.token_expiry_hours", 24)?
            .set_default("tasks.pending_sweep_secs", 30)?
            .set_default("tasks.pending_sweep_initial_secs", 10)?
            .set_default("tasks.retry_sweep_secs", 60)?
            .set_default("tasks.retry_sweep_initial_secs", 30)?
            .set_default("tasks.expiry_sweep_secs", 600)?
            .set_default("tasks.batch_size", 10)?
            .set_default("tasks.pool_workers", 4)?
            .set_default("tasks.pool_queue", 100)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., IMGVAULT__ADMIN__PASSWORD)
            .add_source(Environment::with_prefix("IMGVAULT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
