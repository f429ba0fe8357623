use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ::common::storage::filesystem::FilesystemObjectStore;
use ::common::worker::WorkerPool;
use reqwest::Client;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::Value;

use server::config::{
    AdminConfig, AppConfig, CorsConfig, DatabaseConfig, ImgproxyConfig, ServerConfig,
    StorageConfig, TasksConfig,
};
use server::entity::{async_task, file_fingerprint, image, upload_task};
use server::imgproxy::ImgproxySigner;
use server::state::{AppState, Caches};
use server::utils::lock_map::LockMap;
use server::{build_router, database};

pub const ADMIN_PASSWORD: &str = "test-admin-password";
pub const ADMIN_SECRET: &str = "test-admin-secret";

/// The 4-byte JPEG stub used throughout the upload scenarios.
pub const JPEG_STUB: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];
pub const JPEG_STUB_SHA256: &str =
    "ba4f25bf16ba4be6bc7d3276fafeb67f9eb3c5df042bc3a405e1af15b921eed7";
pub const JPEG_STUB_MD5: &str = "d03d864b7f43db9ce34df5f720509d0e";

/// A fully wired application over a temp SQLite database and a filesystem
/// object store, served on an ephemeral port.
pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    pub state: AppState,
    _tmp: tempfile::TempDir,
}

pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// Envelope code carried in the body.
    pub fn code(&self) -> i64 {
        self.body["code"].as_i64().unwrap_or_default()
    }

    pub fn data(&self) -> &Value {
        &self.body["data"]
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let db_path = tmp.path().join("imgvault.sqlite");

        let mut config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 0,
                cors: CorsConfig {
                    allow_origins: Vec::new(),
                    max_age: 3600,
                },
            },
            database: DatabaseConfig {
                url: format!("sqlite://{}?mode=rwc", db_path.display()),
            },
            storage: StorageConfig {
                endpoint: "http://127.0.0.1:9000".into(),
                region: "us-east-1".into(),
                bucket: "imgvault".into(),
                access_key: "test".into(),
                secret_key: "test".into(),
                path_style: true,
                max_file_size: 50 * 1024 * 1024,
                chunk_size: 5 * 1024 * 1024,
                presign_expiry_secs: 3600,
            },
            imgproxy: ImgproxyConfig {
                base_url: "http://imgproxy:8888".into(),
                external_base_url: String::new(),
                key: "943b421c9eb07c830af81030552c86009268de4e532ba2ee2eab8247c6da0881".into(),
                salt: "520f986b998545b4785e0defbc4f3c1203f22de2374a3d53cb7a7fe9fea309c5".into(),
            },
            admin: AdminConfig {
                password: ADMIN_PASSWORD.into(),
                token_secret: ADMIN_SECRET.into(),
                token_expiry_hours: 24,
            },
            tasks: TasksConfig {
                pending_sweep_secs: 3600,
                pending_sweep_initial_secs: 3600,
                retry_sweep_secs: 3600,
                retry_sweep_initial_secs: 3600,
                expiry_sweep_secs: 3600,
                batch_size: 10,
                pool_workers: 2,
                pool_queue: 50,
            },
        };
        customize(&mut config);

        let db = database::init_db(&config.database.url)
            .await
            .expect("database init");
        let store = FilesystemObjectStore::new(tmp.path().join("objects"), "imgvault")
            .await
            .expect("object store init");
        let signer = ImgproxySigner::new(&config.imgproxy, &config.storage.bucket);
        let pool = WorkerPool::new(config.tasks.pool_workers, config.tasks.pool_queue);

        let state = AppState {
            db,
            store: Arc::new(store),
            signer: Arc::new(signer),
            pool: Arc::new(pool),
            config: Arc::new(config),
            caches: Arc::new(Caches::default()),
            upload_locks: Arc::new(LockMap::default()),
        };

        // The timer-driven sweeps are intentionally not spawned; tests call
        // the batch functions directly for determinism.
        let app = build_router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr: SocketAddr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server");
        });

        Self {
            base_url: format!("http://{addr}"),
            client: Client::new(),
            state,
            _tmp: tmp,
        }
    }

    pub fn admin_token(&self) -> String {
        server::utils::admin_token::generate(ADMIN_SECRET, 24)
    }

    pub async fn get(&self, path: &str) -> ApiResponse {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .expect("request");
        into_api_response(response).await
    }

    pub async fn get_admin(&self, path: &str) -> ApiResponse {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(self.admin_token())
            .send()
            .await
            .expect("request");
        into_api_response(response).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> ApiResponse {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("request");
        into_api_response(response).await
    }

    pub async fn post_admin(&self, path: &str, body: Value) -> ApiResponse {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(self.admin_token())
            .json(&body)
            .send()
            .await
            .expect("request");
        into_api_response(response).await
    }

    pub async fn delete(&self, path: &str) -> ApiResponse {
        let response = self
            .client
            .delete(format!("{}{path}", self.base_url))
            .send()
            .await
            .expect("request");
        into_api_response(response).await
    }

    /// POST multipart with a single `file` field.
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>, mime: &str) -> ApiResponse {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime)
            .expect("mime");
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/api/v1/images/upload", self.base_url))
            .multipart(form)
            .send()
            .await
            .expect("request");
        into_api_response(response).await
    }

    /// POST one chunk of a resumable upload.
    pub async fn put_chunk(&self, upload_id: &str, k: u32, bytes: Vec<u8>) -> ApiResponse {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(format!("chunk-{k}"));
        let form = reqwest::multipart::Form::new().part("chunk", part);

        let response = self
            .client
            .post(format!(
                "{}/api/v1/images/chunk-upload/{upload_id}/{k}",
                self.base_url
            ))
            .multipart(form)
            .send()
            .await
            .expect("request");
        into_api_response(response).await
    }

    // ---- direct database probes --------------------------------------

    pub async fn fingerprint(&self, sha256: &str) -> Option<file_fingerprint::Model> {
        file_fingerprint::Entity::find()
            .filter(file_fingerprint::Column::FileHash.eq(sha256))
            .one(&self.state.db)
            .await
            .expect("fingerprint query")
    }

    pub async fn image_count_by_hash(&self, sha256: &str) -> u64 {
        use sea_orm::PaginatorTrait;
        image::Entity::find()
            .filter(image::Column::FileHash.eq(sha256))
            .count(&self.state.db)
            .await
            .expect("image count query")
    }

    pub async fn task(&self, id: i64) -> async_task::Model {
        async_task::Entity::find_by_id(id)
            .one(&self.state.db)
            .await
            .expect("task query")
            .expect("task exists")
    }

    pub async fn tasks_for_image(&self, image_id: i64) -> Vec<async_task::Model> {
        async_task::Entity::find()
            .filter(async_task::Column::ImageId.eq(image_id))
            .all(&self.state.db)
            .await
            .expect("task query")
    }

    pub async fn upload_task(&self, upload_id: &str) -> upload_task::Model {
        upload_task::Entity::find()
            .filter(upload_task::Column::UploadId.eq(upload_id))
            .one(&self.state.db)
            .await
            .expect("upload task query")
            .expect("upload task exists")
    }

    /// Poll until the upload task reaches the given status.
    pub async fn wait_for_upload_status(
        &self,
        upload_id: &str,
        status: upload_task::UploadTaskStatus,
    ) -> upload_task::Model {
        for _ in 0..100 {
            let task = self.upload_task(upload_id).await;
            if task.status == status {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("upload task {upload_id} never reached {status:?}");
    }

    /// Poll until the background task leaves `pending`/`processing`.
    pub async fn wait_for_task_settled(&self, id: i64) -> async_task::Model {
        use server::entity::async_task::AsyncTaskStatus;
        for _ in 0..100 {
            let task = self.task(id).await;
            if !matches!(
                task.status,
                AsyncTaskStatus::Pending | AsyncTaskStatus::Processing
            ) {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("task {id} never settled");
    }
}

async fn into_api_response(response: reqwest::Response) -> ApiResponse {
    let status = response.status().as_u16();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    ApiResponse { status, body }
}
