//! Lightweight admin bearer tokens.
//!
//! Format: `base64url(payload).base64url(hmac_sha256(payload, secret))` with
//! payload `{"exp":<epoch-ms>,"role":"admin"}`. Validation checks the
//! signature first, then the expiry.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Issue a token expiring `expiry_hours` from now.
pub fn generate(secret: &str, expiry_hours: u32) -> String {
    let exp = Utc::now().timestamp_millis() + i64::from(expiry_hours) * 3_600_000;
    generate_at(secret, exp)
}

/// Issue a token with an explicit expiry timestamp (epoch millis).
pub fn generate_at(secret: &str, exp_millis: i64) -> String {
    let payload = URL_SAFE_NO_PAD.encode(format!("{{\"exp\":{exp_millis},\"role\":\"admin\"}}"));
    let signature = sign(secret, &payload);
    format!("{payload}.{signature}")
}

/// Verify signature and expiry. Any malformed input is simply invalid.
pub fn validate(secret: &str, token: &str) -> bool {
    let Some((payload, signature)) = token.split_once('.') else {
        return false;
    };
    if signature.contains('.') || sign(secret, payload) != signature {
        return false;
    }

    let Ok(raw) = URL_SAFE_NO_PAD.decode(payload) else {
        return false;
    };
    let Ok(json) = serde_json::from_slice::<serde_json::Value>(&raw) else {
        return false;
    };
    let Some(exp) = json.get("exp").and_then(|v| v.as_i64()) else {
        return false;
    };

    Utc::now().timestamp_millis() < exp
}

fn sign(secret: &str, data: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(data.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}
