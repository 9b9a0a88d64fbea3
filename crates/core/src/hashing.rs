//! SHA-256 hex digests for audit chaining and source file fingerprints.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Whether `value` looks like a lowercase or uppercase SHA-256 hex digest.
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_produces_known_hash() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn digest_is_recognised_as_sha256() {
        assert!(is_sha256_hex(&sha256_hex(b"name,email\n")));
        assert!(!is_sha256_hex("abc123"));
        assert!(!is_sha256_hex(&"z".repeat(64)));
    }
}
