//! Webhook signature verification
//!
//! The checkout provider signs the raw request body with HMAC-SHA256 and sends
//! the lowercase hex digest in the `x-signature` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Hex HMAC-SHA256 of `body` under `secret`
pub fn sign(secret: &str, body: &[u8]) -> Result<String, WebhookError> {
    let mut mac = new_mac(secret)?;
    mac.update(body);
    Ok(encode_hex(&mac.finalize().into_bytes()))
}

/// Check `signature` against the body; comparison is constant-time
pub fn verify(secret: &str, body: &[u8], signature: &str) -> Result<(), WebhookError> {
    let expected = decode_hex(signature.trim()).ok_or(WebhookError::InvalidSignature)?;
    let mut mac = new_mac(secret)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::InvalidSignature)
}

fn new_mac(secret: &str) -> Result<HmacSha256, WebhookError> {
    if secret.is_empty() {
        return Err(WebhookError::MissingSecret);
    }
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::MissingSecret)
}

fn encode_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
