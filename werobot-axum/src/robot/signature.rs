//! WeChat webhook signature verification.
//!
//! WeChat signs every callback with a SHA-1 digest over the shared token,
//! the request timestamp and a random nonce. The three values are sorted
//! lexicographically and concatenated before hashing.

use sha1::{Digest, Sha1};
use tracing::warn;

/// Minimum and maximum token length accepted by the platform.
const TOKEN_LEN: std::ops::RangeInclusive<usize> = 3..=32;

/// Check that `token` is 3 to 32 ASCII letters or digits.
pub fn check_token(token: &str) -> bool {
    TOKEN_LEN.contains(&token.len()) && token.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Compute the lowercase hex signature WeChat sends for these values.
pub fn sign(token: &str, timestamp: &str, nonce: &str) -> String {
    let mut parts = [token, timestamp, nonce];
    parts.sort_unstable();

    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Verify a WeChat webhook signature.
///
/// Empty values are hashed like any other; only the digest decides.
pub fn check_signature(token: &str, timestamp: &str, nonce: &str, signature: &str) -> bool {
    let expected = sign(token, timestamp, nonce);
    let valid = constant_time_compare(&expected, signature);

    if !valid {
        warn!(
            has_timestamp = !timestamp.is_empty(),
            has_nonce = !nonce.is_empty(),
            expected_length = expected.len(),
            actual_length = signature.len(),
            "werobot_signature_mismatch"
        );
    }

    valid
}

/// Constant-time string comparison to prevent timing attacks.
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
