//! Random opaque tokens

use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

/// 32 random bytes rendered as 64 lowercase hex characters
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 digest of a token, hex encoded, for storage at rest
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
