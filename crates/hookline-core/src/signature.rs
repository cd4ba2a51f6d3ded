//! Webhook signature verification.
//!
//! Two independent protocols exist, selected by which endpoint received the
//! request:
//!
//! - **Platform source**: HMAC-SHA256 over the raw request body,
//!   base64-encoded, carried in the `Heroku-Webhook-Hmac-SHA256` header.
//! - **Analytics source**: HMAC-SHA1 over the raw request body, hex-encoded,
//!   carried in the `x-signature` header.
//!
//! Both comparisons are constant-time. A missing header always fails.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;
type HmacSha1 = Hmac<Sha1>;

/// Verify a platform-source request signature.
///
/// The expected tag is the base64-encoded HMAC-SHA256 of `body` under
/// `secret`. Surrounding whitespace in the header value is ignored (the
/// upstream sender base64-encodes with a trailing newline).
pub fn verify_platform_signature(secret: &[u8], body: &[u8], header: Option<&str>) -> bool {
    let header = match header {
        Some(h) => h.trim(),
        None => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(body);
    let expected = BASE64.encode(mac.finalize().into_bytes());

    constant_time_eq(expected.as_bytes(), header.as_bytes())
}

/// Verify an analytics-source request signature.
///
/// The expected tag is the hex-encoded HMAC-SHA1 of `body` under `secret`.
pub fn verify_analytics_signature(secret: &[u8], body: &[u8], header: Option<&str>) -> bool {
    let header = match header {
        Some(h) => h.trim(),
        None => return false,
    };

    let mut mac = match HmacSha1::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    constant_time_eq(expected.as_bytes(), header.as_bytes())
}

/// Constant-time byte-slice equality. Length differences short-circuit,
/// which leaks only the length of the candidate tag.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"super-secret";
    const BODY: &[u8] = br#"{"webhook":{"userId":"2638327"}}"#;

    fn platform_tag(secret: &[u8], body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(body);
        BASE64.encode(mac.finalize().into_bytes())
    }

    fn analytics_tag(secret: &[u8], body: &[u8]) -> String {
        let mut mac = HmacSha1::new_from_slice(secret).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_platform_signature_round_trip() {
        let tag = platform_tag(SECRET, BODY);
        assert!(verify_platform_signature(SECRET, BODY, Some(&tag)));
    }

    #[test]
    fn test_platform_signature_tolerates_surrounding_whitespace() {
        let tag = format!("{}\n", platform_tag(SECRET, BODY));
        assert!(verify_platform_signature(SECRET, BODY, Some(&tag)));
    }

    #[test]
    fn test_platform_signature_rejects_missing_header() {
        assert!(!verify_platform_signature(SECRET, BODY, None));
    }

    #[test]
    fn test_platform_signature_rejects_wrong_secret() {
        let tag = platform_tag(b"other-secret", BODY);
        assert!(!verify_platform_signature(SECRET, BODY, Some(&tag)));
    }

    #[test]
    fn test_platform_signature_rejects_mutated_body() {
        let tag = platform_tag(SECRET, BODY);
        let mut mutated = BODY.to_vec();
        mutated[0] ^= 0x01;
        assert!(!verify_platform_signature(SECRET, &mutated, Some(&tag)));
    }

    #[test]
    fn test_analytics_signature_round_trip() {
        let tag = analytics_tag(SECRET, BODY);
        assert!(verify_analytics_signature(SECRET, BODY, Some(&tag)));
    }

    #[test]
    fn test_analytics_signature_rejects_missing_header() {
        assert!(!verify_analytics_signature(SECRET, BODY, None));
    }

    #[test]
    fn test_analytics_signature_rejects_wrong_secret() {
        let tag = analytics_tag(b"boom!", BODY);
        assert!(!verify_analytics_signature(SECRET, BODY, Some(&tag)));
    }

    #[test]
    fn test_analytics_signature_rejects_mutated_body() {
        let tag = analytics_tag(SECRET, BODY);
        let mut mutated = BODY.to_vec();
        *mutated.last_mut().unwrap() ^= 0x01;
        assert!(!verify_analytics_signature(SECRET, &mutated, Some(&tag)));
    }

    #[test]
    fn test_protocols_are_not_interchangeable() {
        let platform = platform_tag(SECRET, BODY);
        let analytics = analytics_tag(SECRET, BODY);
        assert!(!verify_platform_signature(SECRET, BODY, Some(&analytics)));
        assert!(!verify_analytics_signature(SECRET, BODY, Some(&platform)));
    }
}
