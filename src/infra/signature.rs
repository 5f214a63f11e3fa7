//! Webhook signature verification for both payment providers.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::app_error::{AppError, AppResult};

/// Accepted clock skew between the provider's signing timestamp and ours.
const CARD_SIGNATURE_TOLERANCE_SECS: i64 = 300;

fn hmac_hex(message: &str, secret: &str) -> AppResult<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("HMAC error".into()))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify the card processor's signature header: `t=<ts>,v1=<hex>,...`.
/// The signed message is `<ts>.<payload>`; any `v1` entry may match. The
/// timestamp is checked only after a signature matches, so attackers learn
/// nothing about clock handling from rejected garbage.
pub fn verify_card_signature(payload: &str, signature_header: &str, secret: &str) -> AppResult<()> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let kv: Vec<&str> = part.splitn(2, '=').collect();
        if kv.len() != 2 {
            continue;
        }
        match kv[0] {
            "t" => timestamp = Some(kv[1]),
            "v1" => signatures.push(kv[1]),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(AppError::InvalidSignature)?;
    if signatures.is_empty() {
        return Err(AppError::InvalidSignature);
    }

    let signed_payload = format!("{}.{}", timestamp, payload);
    let expected = hmac_hex(&signed_payload, secret)?;

    for sig in signatures {
        if constant_time_compare(sig, &expected) {
            let ts: i64 = timestamp.parse().map_err(|_| AppError::InvalidSignature)?;
            let now = chrono::Utc::now().timestamp();
            if (now - ts).abs() > CARD_SIGNATURE_TOLERANCE_SECS {
                return Err(AppError::InvalidSignature);
            }
            return Ok(());
        }
    }

    Err(AppError::InvalidSignature)
}

/// Build a card-style signature header. Used by tests and the webhook
/// replay tooling.
pub fn sign_card_payload(payload: &str, secret: &str, timestamp: i64) -> AppResult<String> {
    let signed_payload = format!("{}.{}", timestamp, payload);
    let signature = hmac_hex(&signed_payload, secret)?;
    Ok(format!("t={},v1={}", timestamp, signature))
}

/// Verify the PIX processor's signature header: a plain hex HMAC-SHA256 of
/// the raw body. No timestamp; the processor does not sign one.
pub fn verify_pix_signature(payload: &str, signature_header: &str, secret: &str) -> AppResult<()> {
    let expected = hmac_hex(payload, secret)?;
    if constant_time_compare(signature_header.trim(), &expected) {
        Ok(())
    } else {
        Err(AppError::InvalidSignature)
    }
}

pub fn sign_pix_payload(payload: &str, secret: &str) -> AppResult<String> {
    hmac_hex(payload, secret)
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
