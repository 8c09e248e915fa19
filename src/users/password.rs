//! Argon2id password hashing.
//!
//! Digests are PHC strings, so the algorithm parameters and salt travel
//! with the hash.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use super::{PasswordError, PasswordScheme};

/// Argon2id with the crate's default parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Scheme;

impl PasswordScheme for Argon2Scheme {
    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(PasswordError::Hash)?;
        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, digest: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(digest).map_err(PasswordError::MalformedDigest)?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::MalformedDigest(e)),
        }
    }
}
