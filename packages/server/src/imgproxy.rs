//! Signed imgproxy URL generation.
//!
//! The service never processes pixels itself; thumbnails, format conversion,
//! watermarking and smart crop are delegated to imgproxy behind signed URLs.
//! Processing options are encoded as slash-separated directives terminated
//! by `/plain/{source}[@format]`, and the path is signed with
//! HMAC-SHA256 over `salt || path`, URL-safe base64 without padding,
//! prepended as `/{mac}{path}`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::config::ImgproxyConfig;

type HmacSha256 = Hmac<Sha256>;

/// Thumbnail URL trio included in image detail responses.
#[derive(Clone, Debug, serde::Serialize, utoipa::ToSchema)]
pub struct ThumbnailUrls {
    /// 150x150 fit.
    pub small: String,
    /// 800x600 fit.
    pub medium: String,
    /// 1920x1080 fit.
    pub large: String,
}

pub struct ImgproxySigner {
    key: Vec<u8>,
    salt: Vec<u8>,
    base_url: String,
    bucket: String,
    enabled: bool,
}

impl ImgproxySigner {
    pub fn new(config: &ImgproxyConfig, bucket: &str) -> Self {
        let key = decode_hex_or_warn(&config.key, "imgproxy.key");
        let salt = decode_hex_or_warn(&config.salt, "imgproxy.salt");
        let enabled = key.is_some() && salt.is_some();
        if !enabled {
            warn!("imgproxy signing keys not configured; processing URLs unavailable");
        }

        let base_url = if config.external_base_url.is_empty() {
            config.base_url.clone()
        } else {
            config.external_base_url.clone()
        };

        Self {
            key: key.unwrap_or_default(),
            salt: salt.unwrap_or_default(),
            base_url,
            bucket: bucket.to_string(),
            enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Thumbnail trio for detail responses.
    pub fn thumbnail_urls(&self, storage_path: &str) -> Option<ThumbnailUrls> {
        Some(ThumbnailUrls {
            small: self.resize_url(storage_path, 150, 150, "fit")?,
            medium: self.resize_url(storage_path, 800, 600, "fit")?,
            large: self.resize_url(storage_path, 1920, 1080, "fit")?,
        })
    }

    pub fn resize_url(
        &self,
        storage_path: &str,
        width: u32,
        height: u32,
        resize_type: &str,
    ) -> Option<String> {
        let path = format!(
            "/rs:{resize_type}:{width}:{height}:0/plain/{}",
            self.source_url(storage_path)
        );
        self.signed_url(&path)
    }

    pub fn webp_url(&self, storage_path: &str, quality: u32) -> Option<String> {
        self.format_convert_url(storage_path, "webp", quality)
    }

    pub fn avif_url(&self, storage_path: &str, quality: u32) -> Option<String> {
        self.format_convert_url(storage_path, "avif", quality)
    }

    pub fn format_convert_url(
        &self,
        storage_path: &str,
        format: &str,
        quality: u32,
    ) -> Option<String> {
        let path = format!(
            "/q:{quality}/plain/{}@{format}",
            self.source_url(storage_path)
        );
        self.signed_url(&path)
    }

    pub fn watermark_url(
        &self,
        storage_path: &str,
        opacity: f64,
        position: &str,
    ) -> Option<String> {
        let path = format!(
            "/wm:{}:{position}/plain/{}",
            format_opacity(opacity),
            self.source_url(storage_path)
        );
        self.signed_url(&path)
    }

    pub fn compressed_url(&self, storage_path: &str, quality: u32) -> Option<String> {
        let path = format!("/q:{quality}/plain/{}", self.source_url(storage_path));
        self.signed_url(&path)
    }

    pub fn smart_crop_url(&self, storage_path: &str, width: u32, height: u32) -> Option<String> {
        let path = format!(
            "/rs:fill:{width}:{height}:0/g:sm/plain/{}",
            self.source_url(storage_path)
        );
        self.signed_url(&path)
    }

    /// Combined processing URL for the generic process endpoint.
    pub fn processed_url(
        &self,
        storage_path: &str,
        width: u32,
        height: u32,
        format: Option<&str>,
        quality: u32,
        smart_crop: bool,
    ) -> Option<String> {
        let mut opts = String::new();

        if width > 0 || height > 0 {
            let resize_type = if smart_crop { "fill" } else { "fit" };
            opts.push_str(&format!("/rs:{resize_type}:{width}:{height}:0"));
        }
        if smart_crop {
            opts.push_str("/g:sm");
        }
        if quality > 0 && quality <= 100 {
            opts.push_str(&format!("/q:{quality}"));
        }

        let source = self.source_url(storage_path);
        match format {
            Some(f) if !f.is_empty() => opts.push_str(&format!("/plain/{source}@{f}")),
            _ => opts.push_str(&format!("/plain/{source}")),
        }

        self.signed_url(&opts)
    }

    /// Source URL in the form imgproxy resolves against the bucket.
    fn source_url(&self, storage_path: &str) -> String {
        format!("s3://{}/{storage_path}", self.bucket)
    }

    fn signed_url(&self, path: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }
        Some(format!(
            "{}{}",
            self.base_url,
            sign_path(&self.key, &self.salt, path)
        ))
    }
}

/// Sign an imgproxy processing path: `/{base64url(mac)}{path}`.
pub fn sign_path(key: &[u8], salt: &[u8], path: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(salt);
    mac.update(path.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    format!("/{signature}{path}")
}

/// Verify a path produced by `sign_path`.
pub fn verify_path(key: &[u8], salt: &[u8], signed_path: &str) -> bool {
    let rest = match signed_path.strip_prefix('/') {
        Some(rest) => rest,
        None => return false,
    };
    let Some(slash) = rest.find('/') else {
        return false;
    };
    let path = &rest[slash..];
    sign_path(key, salt, path) == signed_path
}

fn decode_hex_or_warn(value: &str, name: &str) -> Option<Vec<u8>> {
    if value.is_empty() {
        return None;
    }
    match hex::decode(value) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(%name, error = %e, "invalid hex in imgproxy config");
            None
        }
    }
}

/// Render opacity the way imgproxy expects: integral values without a
/// fraction, everything else with two decimals.
fn format_opacity(value: f64) -> String {
    if value == value.trunc() {
        format!("{}", value as i64)
    } else {
        format!("{value:.2}")
    }
}
