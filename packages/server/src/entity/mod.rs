pub mod album;
pub mod album_image;
pub mod async_task;
pub mod file_fingerprint;
pub mod image;
pub mod image_metadata;
pub mod image_tag;
pub mod operation_log;
pub mod tag;
pub mod upload_task;
