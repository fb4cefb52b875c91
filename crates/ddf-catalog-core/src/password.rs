//! Password hashing for version protection: `SHA-256(provided password)` compared against a stored
//! hex digest.

use sha2::{Digest, Sha256};

/// Hash a password to the hex-encoded SHA-256 digest stored in the
/// catalog's `password` column.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verify a provided password against a stored hex digest.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    hash_password(password) == stored_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let hash = hash_password("correct-horse");
        assert!(verify_password("correct-horse", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn is_deterministic_and_hex() {
        let a = hash_password("x");
        let b = hash_password("x");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
