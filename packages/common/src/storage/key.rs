use chrono::Utc;
use rand::RngCore;

/// Prefix for committed original images.
pub const ORIGINALS_PREFIX: &str = "originals";

/// Prefix for in-flight chunk objects of resumable uploads.
pub const TEMP_CHUNK_PREFIX: &str = "temp/chunks";

/// Generate a fresh object key of the form
/// `originals/YYYY/MM/DD/{32-hex-random}.{ext}`.
///
/// The date component comes from the service's wall clock.
pub fn generate_object_key(extension: &str) -> String {
    let date = Utc::now().format("%Y/%m/%d");
    let mut random = [0u8; 16];
    rand::rng().fill_bytes(&mut random);
    format!(
        "{ORIGINALS_PREFIX}/{date}/{}.{extension}",
        hex::encode(random)
    )
}

/// Deterministic temporary key for chunk `k` of an upload.
///
/// `k` is 1-based and zero-padded to 4 digits so lexicographic order equals
/// numeric order when listing.
pub fn chunk_key(upload_id: &str, chunk_number: u32) -> String {
    format!("{TEMP_CHUNK_PREFIX}/{upload_id}/{chunk_number:04}")
}
