mod error;
mod key;
mod traits;

pub mod filesystem;
#[cfg(feature = "object-storage")]
pub mod s3;

pub use error::StorageError;
pub use key::{ORIGINALS_PREFIX, TEMP_CHUNK_PREFIX, chunk_key, generate_object_key};
pub use traits::{BoxReader, ObjectStore};
