//! Signed single-use links: `sig = HMAC-SHA256(secret, "batch_id:exp")`.
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SignError {
    #[error("link expired")]
    Expired,
    #[error("bad signature")]
    BadSignature,
    #[error("malformed signature")]
    Malformed,
}

fn mac_hex(secret: &str, batch_id: &str, exp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("{batch_id}:{exp}").as_bytes());
    let bytes = mac.finalize().into_bytes();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Builds the `exp` + `sig` query pair for a batch's credential form link.
pub fn sign(secret: &str, batch_id: &str, expires_at: DateTime<Utc>) -> (i64, String) {
    let exp = expires_at.timestamp();
    (exp, mac_hex(secret, batch_id, exp))
}

/// Verifies a signature presented against `batch_id`/`exp`, constant-time,
/// rejecting expired links before ever touching the signature bytes.
pub fn verify(secret: &str, batch_id: &str, exp: i64, sig: &str, now: DateTime<Utc>) -> Result<(), SignError> {
    if now.timestamp() >= exp {
        return Err(SignError::Expired);
    }
    let expected = mac_hex(secret, batch_id, exp);
    let expected = hex_decode(&expected).ok_or(SignError::Malformed)?;
    let actual = hex_decode(sig).ok_or(SignError::Malformed)?;
    if expected.len() != actual.len() || !bool::from(expected.ct_eq(&actual)) {
        return Err(SignError::BadSignature);
    }
    Ok(())
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn a_freshly_signed_link_verifies() {
        let expires_at = Utc::now() + Duration::hours(24);
        let (exp, sig) = sign("s3cr3t", "batch-1", expires_at);
        assert!(verify("s3cr3t", "batch-1", exp, &sig, Utc::now()).is_ok());
    }

    #[test]
    fn an_expired_link_is_rejected() {
        let expires_at = Utc::now() - Duration::hours(1);
        let (exp, sig) = sign("s3cr3t", "batch-1", expires_at);
        assert!(matches!(verify("s3cr3t", "batch-1", exp, &sig, Utc::now()), Err(SignError::Expired)));
    }

    #[test]
    fn a_tampered_signature_is_rejected() {
        let expires_at = Utc::now() + Duration::hours(24);
        let (exp, sig) = sign("s3cr3t", "batch-1", expires_at);
        let mut tampered = sig.clone();
        tampered.replace_range(0..2, "ff");
        assert!(matches!(verify("s3cr3t", "batch-1", exp, &tampered, Utc::now()), Err(SignError::BadSignature)));
    }

    #[test]
    fn a_signature_for_a_different_batch_is_rejected() {
        let expires_at = Utc::now() + Duration::hours(24);
        let (exp, sig) = sign("s3cr3t", "batch-1", expires_at);
        assert!(matches!(verify("s3cr3t", "batch-2", exp, &sig, Utc::now()), Err(SignError::BadSignature)));
    }
}
