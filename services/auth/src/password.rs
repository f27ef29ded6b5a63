//! Password hashing and reuse checks

use anyhow::Result;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};

/// Number of previous hashes a new password is checked against
pub const HISTORY_DEPTH: usize = 3;

/// Hash a password with a fresh salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();
    Ok(hash)
}

/// Verify a password against a stored hash. An unparseable hash never
/// matches.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Whether the password matches any of the stored history hashes
pub fn is_reused(history: &[String], password: &str) -> bool {
    history
        .iter()
        .take(HISTORY_DEPTH)
        .any(|hash| verify_password(hash, password))
}
