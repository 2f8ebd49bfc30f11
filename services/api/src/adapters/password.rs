//! services/api/src/adapters/password.rs
//!
//! Argon2id password hashing behind the `CredentialHasher` port.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use notatnik_core::ports::{CredentialHasher, PortError, PortResult};
use tracing::error;

#[derive(Clone, Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash_password(&self, password: &str) -> PortResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                error!("Failed to hash password: {:?}", e);
                PortError::Unexpected("Failed to hash password".to_string())
            })
    }

    fn verify_password(&self, password: &str, password_hash: &str) -> PortResult<bool> {
        let parsed_hash = PasswordHash::new(password_hash).map_err(|e| {
            error!("Failed to parse password hash: {:?}", e);
            PortError::Unexpected("Stored password hash is unreadable".to_string())
        })?;
        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_salted_and_verifiable() {
        let hasher = Argon2Hasher::new();
        let first = hasher.hash_password("secret1").unwrap();
        let second = hasher.hash_password("secret1").unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
        assert!(hasher.verify_password("secret1", &first).unwrap());
        assert!(!hasher.verify_password("secret2", &first).unwrap());
    }

    #[test]
    fn unreadable_hash_is_an_error() {
        let hasher = Argon2Hasher::new();
        assert!(hasher.verify_password("secret1", "plaintext").is_err());
    }
}
