use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

static PIN_FORMAT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^[0-9]{4}$").ok());

/// A PIN is exactly four digits.
pub fn is_valid_pin(input: &str) -> bool {
    PIN_FORMAT
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(input))
}

/// Salted SHA-256 PIN hashing: `sha256$<salt>$<digest>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PinHasher;

impl PinHasher {
    pub fn hash(&self, pin: &str) -> String {
        let salt = hex::encode(rand::random::<[u8; 16]>());
        let digest = Self::digest(&salt, pin);
        format!("sha256${salt}${digest}")
    }

    pub fn verify(&self, pin: &str, stored: &str) -> bool {
        let mut parts = stored.splitn(3, '$');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("sha256"), Some(salt), Some(digest)) => Self::digest(salt, pin) == digest,
            _ => false,
        }
    }

    fn digest(salt: &str, pin: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(pin.as_bytes());
        hex::encode(hasher.finalize())
    }
}
