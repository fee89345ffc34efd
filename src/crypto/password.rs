// Salted password hashing for owner accounts (argon2, PHC string format).

use crate::error::{MarketError, MarketResult};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

/// Hashes `password` with a fresh random salt.
pub fn hash_password(password: &str) -> MarketResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| MarketError::Internal(format!("password hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

/// Checks `password` against a stored PHC string. Unparseable hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hash = hash_password("musangking").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("musangking", &hash));
        assert!(!verify_password("blackthorn", &hash));
    }

    #[test]
    fn same_password_gets_different_salts() {
        let a = hash_password("d24sultan").unwrap();
        let b = hash_password("d24sultan").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn legacy_or_garbage_hash_never_matches() {
        assert!(!verify_password("anything", "$2a$10$demo.hash.for.testing"));
        assert!(!verify_password("anything", ""));
    }
}
