//! Password salting, hashing and verification.
//!
//! Each user gets a random salt stored next to the bcrypt hash. The salt is
//! appended to the password before hashing, so the stored hash covers
//! `password‖salt`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bcrypt::{hash, verify, DEFAULT_COST};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

pub const DEFAULT_SALT_SIZE: usize = 16;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Entropy source failure: {0}")]
    Entropy(String),
    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

#[derive(Debug, Clone)]
pub struct PasswordHandler {
    salt_size: usize,
    cost: u32,
}

impl Default for PasswordHandler {
    fn default() -> Self {
        Self::new(DEFAULT_SALT_SIZE, DEFAULT_COST)
    }
}

impl PasswordHandler {
    pub fn new(salt_size: usize, cost: u32) -> Self {
        Self { salt_size, cost }
    }

    /// Fresh random salt, base64 encoded.
    pub fn generate_salt(&self) -> Result<String, PasswordError> {
        let mut bytes = vec![0u8; self.salt_size];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| PasswordError::Entropy(e.to_string()))?;
        Ok(STANDARD.encode(bytes))
    }

    pub fn hash(&self, password: &str, salt: &str) -> Result<String, PasswordError> {
        Ok(hash(salted(password, salt), self.cost)?)
    }

    /// Recompute and compare against `stored_hash`. bcrypt compares the
    /// digests in constant time.
    pub fn verify(&self, stored_hash: &str, password: &str, salt: &str) -> Result<(), PasswordError> {
        match verify(salted(password, salt), stored_hash) {
            Ok(true) => Ok(()),
            Ok(false) => Err(PasswordError::InvalidCredentials),
            // A corrupt stored hash is still a failed login from the caller's view
            Err(_) => Err(PasswordError::InvalidCredentials),
        }
    }
}

fn salted(password: &str, salt: &str) -> String {
    let mut s = String::with_capacity(password.len() + salt.len());
    s.push_str(password);
    s.push_str(salt);
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> PasswordHandler {
        PasswordHandler::new(DEFAULT_SALT_SIZE, 4)
    }

    #[test]
    fn test_generate_salt() {
        let h = handler();
        let salt = h.generate_salt().unwrap();
        let decoded = STANDARD.decode(&salt).unwrap();
        assert_eq!(decoded.len(), DEFAULT_SALT_SIZE);

        let salt2 = h.generate_salt().unwrap();
        assert_ne!(salt, salt2);
    }

    #[test]
    fn test_hash_and_verify() {
        let h = handler();
        let salt = h.generate_salt().unwrap();
        let hashed = h.hash("hunter2", &salt).unwrap();

        assert!(h.verify(&hashed, "hunter2", &salt).is_ok());
    }

    #[test]
    fn test_verify_rejects_wrong_password_or_salt() {
        let h = handler();
        let salt = h.generate_salt().unwrap();
        let hashed = h.hash("hunter2", &salt).unwrap();

        assert!(matches!(
            h.verify(&hashed, "hunter3", &salt),
            Err(PasswordError::InvalidCredentials)
        ));

        let other_salt = h.generate_salt().unwrap();
        assert!(matches!(
            h.verify(&hashed, "hunter2", &other_salt),
            Err(PasswordError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_garbage_hash_is_invalid_credentials() {
        let h = handler();
        assert!(matches!(
            h.verify("not-a-bcrypt-hash", "pw", "salt"),
            Err(PasswordError::InvalidCredentials)
        ));
    }
}
