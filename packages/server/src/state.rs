use std::sync::Arc;

use common::storage::ObjectStore;
use common::worker::WorkerPool;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::entity::file_fingerprint;
use crate::imgproxy::ImgproxySigner;
use crate::models::image::ImageDetail;
use crate::models::tag::TagResponse;
use crate::utils::cache::TtlCache;
use crate::utils::lock_map::LockMap;

/// Bounded read caches, invalidated wholesale at every mutation site of the
/// aggregate they front.
#[derive(Default)]
pub struct Caches {
    /// Image detail by "id:{id}" / "uuid:{uuid}".
    pub image_detail: TtlCache<ImageDetail>,
    /// Fingerprint rows by SHA-256.
    pub fingerprint: TtlCache<file_fingerprint::Model>,
    /// The full tag list.
    pub tag_list: TtlCache<Vec<TagResponse>>,
}

impl Caches {
    pub fn invalidate_images(&self) {
        self.image_detail.clear();
    }

    pub fn invalidate_fingerprints(&self) {
        self.fingerprint.clear();
    }

    pub fn invalidate_tags(&self) {
        self.tag_list.clear();
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub store: Arc<dyn ObjectStore>,
    pub signer: Arc<ImgproxySigner>,
    pub pool: Arc<WorkerPool>,
    pub config: Arc<AppConfig>,
    pub caches: Arc<Caches>,
    /// One lock per in-flight chunked upload.
    pub upload_locks: Arc<LockMap>,
}
