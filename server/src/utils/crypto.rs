//! Hashing helpers

use sha2::{Digest, Sha256};

/// Calculate SHA256 hash and return as lowercase hex string
pub fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}
