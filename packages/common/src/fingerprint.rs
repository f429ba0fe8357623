//! Content fingerprinting.
//!
//! A fingerprint is the (SHA-256, MD5, byte length) triple used to
//! content-address stored objects. Deduplication matches on the full triple;
//! neither hash is trusted alone against adversarial input.

use md5::Md5;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read buffer size for streaming hash computation.
const STREAM_CHUNK: usize = 8 * 1024;

/// The (SHA-256, MD5, size) triple identifying a stored object's content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fingerprint {
    /// Lowercase hex SHA-256 of the content.
    pub sha256: String,
    /// Lowercase hex MD5 of the content.
    pub md5: String,
    /// Content length in bytes.
    pub size: u64,
}

/// SHA-256 of a byte buffer as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// MD5 of a byte buffer as lowercase hex.
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Fingerprint a byte buffer.
pub fn of_bytes(data: &[u8]) -> Fingerprint {
    Fingerprint {
        sha256: sha256_hex(data),
        md5: md5_hex(data),
        size: data.len() as u64,
    }
}

/// Fingerprint an async stream, draining it fully in fixed-size chunks.
///
/// Both hashes and the length are computed in a single pass so the stream is
/// read exactly once.
pub async fn of_stream<R: AsyncRead + Unpin>(mut reader: R) -> std::io::Result<Fingerprint> {
    let mut sha = Sha256::new();
    let mut md5 = Md5::new();
    let mut size: u64 = 0;
    let mut buf = vec![0u8; STREAM_CHUNK];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        sha.update(&buf[..n]);
        md5.update(&buf[..n]);
        size += n as u64;
    }

    Ok(Fingerprint {
        sha256: hex::encode(sha.finalize()),
        md5: hex::encode(md5.finalize()),
        size,
    })
}
