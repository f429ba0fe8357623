use std::net::SocketAddr;
use std::sync::Arc;

use common::storage::s3::{S3Config, S3ObjectStore};
use common::worker::WorkerPool;
use tracing::{Level, info};

use server::config::AppConfig;
use server::imgproxy::ImgproxySigner;
use server::state::{AppState, Caches};
use server::tasks::runner;
use server::utils::lock_map::LockMap;
use server::{build_router, database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load()?;

    let db = database::init_db(&config.database.url).await?;

    let store = S3ObjectStore::new(&S3Config {
        endpoint: config.storage.endpoint.clone(),
        region: config.storage.region.clone(),
        bucket: config.storage.bucket.clone(),
        access_key: config.storage.access_key.clone(),
        secret_key: config.storage.secret_key.clone(),
        path_style: config.storage.path_style,
    })?;
    // The service starts even when the store is down; the availability flag
    // makes storage operations fail fast until a probe succeeds.
    store.probe().await;

    let signer = ImgproxySigner::new(&config.imgproxy, &config.storage.bucket);
    let pool = WorkerPool::new(config.tasks.pool_workers, config.tasks.pool_queue);

    let state = AppState {
        db,
        store: Arc::new(store),
        signer: Arc::new(signer),
        pool: Arc::new(pool),
        config: Arc::new(config.clone()),
        caches: Arc::new(Caches::default()),
        upload_locks: Arc::new(LockMap::default()),
    };

    runner::spawn_sweeps(state.clone());

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("imgvault server running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
