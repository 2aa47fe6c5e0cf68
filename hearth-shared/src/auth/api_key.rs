/// Static API key verification
///
/// Every client ships with the deployment's API key and sends it in the
/// `x-api-key` header. Both sides are hashed with SHA-256 before comparing so
/// the comparison runs over equal-length digests and never short-circuits on
/// the first differing byte.
///
/// # Example
///
/// ```
/// use hearth_shared::auth::api_key::verify_api_key;
///
/// assert!(verify_api_key("household-client-key", "household-client-key"));
/// assert!(!verify_api_key("household-client-kex", "household-client-key"));
/// ```

use sha2::{Digest, Sha256};

/// Header carrying the static API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// SHA-256 digest of a key
pub fn hash_api_key(key: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

/// Checks a provided key against the configured one
pub fn verify_api_key(provided: &str, expected: &str) -> bool {
    constant_time_compare(&hash_api_key(provided), &hash_api_key(expected))
}

/// Constant-time byte comparison
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_api_key("key"), hash_api_key("key"));
        assert_ne!(hash_api_key("key"), hash_api_key("Key"));
    }

    #[test]
    fn test_verify_api_key() {
        assert!(verify_api_key("s3cr3t-client", "s3cr3t-client"));
        assert!(!verify_api_key("s3cr3t-client", "s3cr3t-clienT"));
        assert!(!verify_api_key("", "s3cr3t-client"));
        assert!(!verify_api_key("s3cr3t-client-and-more", "s3cr3t-client"));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"hello", b"hello"));
        assert!(!constant_time_compare(b"hello", b"world"));
        assert!(!constant_time_compare(b"hello", b"hello!"));
        assert!(constant_time_compare(b"", b""));
    }
}
