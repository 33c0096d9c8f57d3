//! Plan fingerprints.
//!
//! A fingerprint identifies one (data, modules, query) combination. Two
//! requests that agree on all three, with modules in the same order, map to
//! the same fingerprint; the input document never participates.
//!
//! Uses BLAKE3 over a length-prefixed encoding of the tuple.

use std::fmt;

/// Domain tags separating the tuple elements in the digest input
const TAG_DATA: u8 = 0x01;
const TAG_NO_DATA: u8 = 0x02;
const TAG_MODULE: u8 = 0x03;
const TAG_QUERY: u8 = 0x04;

/// A BLAKE3 fingerprint (256 bits / 32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Compute the fingerprint of a (data, modules, query) tuple
    ///
    /// Absent data hashes differently from present-but-empty data, and the
    /// module count is part of the digest, so reordering or regrouping
    /// modules always changes the result.
    #[must_use]
    pub fn compute(data: Option<&str>, modules: &[String], query: &str) -> Self {
        let mut hasher = blake3::Hasher::new();

        match data {
            Some(data) => write_element(&mut hasher, TAG_DATA, data),
            None => {
                hasher.update(&[TAG_NO_DATA]);
            }
        }

        hasher.update(&(modules.len() as u64).to_le_bytes());
        for module in modules {
            write_element(&mut hasher, TAG_MODULE, module);
        }

        write_element(&mut hasher, TAG_QUERY, query);

        Self(*hasher.finalize().as_bytes())
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex prefix for log lines
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

fn write_element(hasher: &mut blake3::Hasher, tag: u8, value: &str) {
    hasher.update(&[tag]);
    hasher.update(&(value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
