//! `UIDSignature` validation.
//!
//! Gigya signs `"{timestamp}_{uid}"` with HMAC-SHA1 keyed by the base64-decoded
//! app secret and sends the base64 digest as `UIDSignature`.

use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use thiserror::Error;

type HmacSha1 = Hmac<Sha1>;

/// How far a signature timestamp may be from the current time.
pub const SIGNATURE_MAX_AGE: Duration = Duration::from_secs(180);

/// Reasons a signature is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature timestamp is not a unix timestamp")]
    InvalidTimestamp,

    #[error("signature timestamp is outside the accepted window")]
    Expired,

    #[error("app secret is not valid base64")]
    InvalidSecret,

    #[error("signature is not valid base64")]
    MalformedSignature,

    #[error("signature does not match")]
    Mismatch,
}

/// Validate a Gigya `UIDSignature`.
///
/// # Errors
///
/// Returns the reason the signature was rejected.
pub fn validate_uid_signature(
    secret: &str,
    uid: &str,
    signature: &str,
    timestamp: &str,
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    let issued_at = timestamp
        .trim()
        .parse::<i64>()
        .map_err(|_| SignatureError::InvalidTimestamp)?;
    if now.timestamp().abs_diff(issued_at) > SIGNATURE_MAX_AGE.as_secs() {
        return Err(SignatureError::Expired);
    }

    let key = BASE64
        .decode(secret)
        .map_err(|_| SignatureError::InvalidSecret)?;
    let expected = BASE64
        .decode(signature.trim())
        .map_err(|_| SignatureError::MalformedSignature)?;

    let mut mac = HmacSha1::new_from_slice(&key).map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(format!("{}_{uid}", timestamp.trim()).as_bytes());
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "c2VjcmV0LWtleS1mb3ItdGVzdHM=";

    fn sign(uid: &str, timestamp: &str) -> String {
        let mut mac = HmacSha1::new_from_slice(&BASE64.decode(SECRET).unwrap()).unwrap();
        mac.update(format!("{timestamp}_{uid}").as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_valid_signature() {
        let sig = sign("uid-1", "1700000000");
        assert_eq!(
            validate_uid_signature(SECRET, "uid-1", &sig, "1700000000", at(1_700_000_060)),
            Ok(())
        );
    }

    #[test]
    fn test_signature_for_other_uid() {
        let sig = sign("uid-2", "1700000000");
        assert_eq!(
            validate_uid_signature(SECRET, "uid-1", &sig, "1700000000", at(1_700_000_000)),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_expired_signature() {
        let sig = sign("uid-1", "1700000000");
        assert_eq!(
            validate_uid_signature(SECRET, "uid-1", &sig, "1700000000", at(1_700_000_181)),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_boundary_is_accepted() {
        let sig = sign("uid-1", "1700000000");
        assert!(validate_uid_signature(SECRET, "uid-1", &sig, "1700000000", at(1_700_000_180)).is_ok());
    }

    #[test]
    fn test_extreme_timestamps_are_expired() {
        for timestamp in ["-9223372036854775808", "9223372036854775807"] {
            assert_eq!(
                validate_uid_signature(SECRET, "uid-1", "AAAA", timestamp, at(1_700_000_000)),
                Err(SignatureError::Expired)
            );
        }
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(
            validate_uid_signature(SECRET, "uid-1", "sig", "yesterday", at(0)),
            Err(SignatureError::InvalidTimestamp)
        );
        assert_eq!(
            validate_uid_signature(SECRET, "uid-1", "%%%", "0", at(0)),
            Err(SignatureError::MalformedSignature)
        );
        assert_eq!(
            validate_uid_signature("%%%", "uid-1", "AAAA", "0", at(0)),
            Err(SignatureError::InvalidSecret)
        );
    }
}
