use std::fmt;

use sha2::{Digest as _, Sha256};

use crate::options::Dataset;

/// Content fingerprint of a render request, used as its cache key.
///
/// SHA-256 over the canonical options serialization followed by the raw source text. A collision
/// would serve one diagram in place of another, so a cryptographic hash is required here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Length of the hex form.
    pub const HEX_LEN: usize = 64;

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(Self::HEX_LEN);
        for b in self.0 {
            out.push(hex_digit(b >> 4));
            out.push(hex_digit(b & 0x0f));
        }
        out
    }

    /// Parse the 64-character lowercase hex form.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != Self::HEX_LEN {
            return None;
        }
        let mut out = [0u8; 32];
        for (i, pair) in s.as_bytes().chunks_exact(2).enumerate() {
            out[i] = (hex_value(pair[0])? << 4) | hex_value(pair[1])?;
        }
        Some(Self(out))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Canonical serialization of a dataset: a JSON object with keys in sorted order.
///
/// `Dataset` is a `BTreeMap`, so the object is key-sorted independent of insertion order.
pub fn canonical_options(dataset: &Dataset) -> String {
    serde_json::to_string(dataset).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "options serialization failed; fingerprinting as empty");
        "{}".to_string()
    })
}

pub fn fingerprint(text: &str, dataset: &Dataset) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(canonical_options(dataset).as_bytes());
    hasher.update(text.as_bytes());
    Fingerprint(hasher.finalize().into())
}

fn hex_digit(n: u8) -> char {
    char::from(b"0123456789abcdef"[n as usize])
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

#[cfg(test)]
#[path = "../tests/unit/fingerprint.rs"]
mod tests;
