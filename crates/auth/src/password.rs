//! Password hashing (argon2id, PHC string format).

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand::rngs::OsRng;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password does not match")]
    Mismatch,

    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl From<argon2::password_hash::Error> for PasswordError {
    fn from(err: argon2::password_hash::Error) -> Self {
        match err {
            argon2::password_hash::Error::Password => Self::Mismatch,
            other => Self::Hash(other.to_string()),
        }
    }
}

/// Hash a plain-text password with a fresh random salt.
pub fn encrypt(plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(plain.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Check `plain` against a hash produced by [`encrypt`].
pub fn compare(hashed: &str, plain: &str) -> Result<(), PasswordError> {
    let parsed = PasswordHash::new(hashed)?;
    Argon2::default().verify_password(plain.as_bytes(), &parsed)?;
    Ok(())
}
