//! Running digest over emitted document content
//!
//! One digest spans a whole fetch run, not a single document. Comparing the
//! final value with the one recorded for the previous run tells whether the
//! extracted data changed at all.
//!
//! Field names and scalar values are fed one by one; embedded JSON is walked
//! the same way rather than hashed as serialized text.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256, Sha512};
use std::str::FromStr;

/// Hash function used for the content digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
            "sha512" | "sha-512" => Ok(DigestAlgorithm::Sha512),
            other => Err(format!("unsupported digest algorithm: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
enum Hasher {
    Sha256(Sha256),
    Sha512(Sha512),
}

/// Accumulates UTF-8 bytes of field names and scalar values
#[derive(Debug, Clone)]
pub struct DocumentDigest {
    algorithm: DigestAlgorithm,
    hasher: Hasher,
}

impl DocumentDigest {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        let hasher = match algorithm {
            DigestAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            DigestAlgorithm::Sha512 => Hasher::Sha512(Sha512::new()),
        };
        DocumentDigest { algorithm, hasher }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn update(&mut self, text: &str) {
        match &mut self.hasher {
            Hasher::Sha256(h) => h.update(text.as_bytes()),
            Hasher::Sha512(h) => h.update(text.as_bytes()),
        }
    }

    /// Base64 of the digest so far; accumulation continues afterwards
    pub fn finish(&self) -> String {
        match &self.hasher {
            Hasher::Sha256(h) => BASE64_STANDARD.encode(h.clone().finalize()),
            Hasher::Sha512(h) => BASE64_STANDARD.encode(h.clone().finalize()),
        }
    }

    /// Start over; called at the beginning of every fetch run
    pub fn reset(&mut self) {
        *self = DocumentDigest::new(self.algorithm);
    }
}
