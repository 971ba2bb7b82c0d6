//! SHA-256 helpers for task and code fingerprints.

use sha2::{Digest, Sha256};

/// Full lowercase hex SHA-256 of `text`.
pub fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// First 16 hex chars of the SHA-256 of `text`.
pub fn short_digest(text: &str) -> String {
    let mut hex = sha256_hex(text);
    hex.truncate(16);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        assert_eq!(
            sha256_hex("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(short_digest("hello"), "2cf24dba5fb0a30e");
        assert_eq!(short_digest("").len(), 16);
    }
}
