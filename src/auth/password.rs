//! Password hashing using Argon2id
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=...`) and carry their own
//! parameters, so verification works across parameter changes.

use crate::core::error::{AppError, AppResult};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher as Argon2Hasher, PasswordVerifier, SaltString,
        rand_core::OsRng,
    },
};

#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl PasswordHasher {
    /// A hasher with explicit cost parameters
    pub fn with_params(memory_cost_kib: u32, time_cost: u32, parallelism: u32) -> AppResult<Self> {
        let params = Params::new(memory_cost_kib, time_cost, parallelism, None)
            .map_err(|e| AppError::Internal(format!("Invalid Argon2 parameters: {}", e)))?;
        Ok(Self { params })
    }

    pub fn hash(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());

        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;

        Ok(hash.to_string())
    }

    /// `Ok(false)` on a wrong password; `Err` only for unreadable hashes
    pub fn verify(&self, password: &str, hash: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash format: {}", e)))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppError::Internal(format!("Password verification failed: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::with_params(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("pass1234").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("pass1234", &hash).unwrap());
        assert!(!hasher.verify("pass12345", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let hasher = hasher();
        assert_ne!(hasher.hash("pass1234").unwrap(), hasher.hash("pass1234").unwrap());
    }

    #[test]
    fn test_garbage_hash_is_an_error() {
        assert!(hasher().verify("pass1234", "not-a-hash").is_err());
    }
}
