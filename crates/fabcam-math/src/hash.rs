//! Structural content hashing.
//!
//! Every hashed entity feeds its content fields into a [`ContentHasher`]
//! explicitly. Reals are rounded to six decimals and hashed as text so the
//! same geometry hashes identically on every platform and in every run.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::{Point3, Vec3};

const HEX: &[u8; 16] = b"0123456789abcdef";

/// A 32-byte SHA-256 content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Render as 64 lowercase hexadecimal digits.
    pub fn to_hex(&self) -> String {
        let mut text = String::with_capacity(64);
        for byte in &self.0 {
            text.push(HEX[(byte >> 4) as usize] as char);
            text.push(HEX[(byte & 0x0f) as usize] as char);
        }
        text
    }

    /// The first `length` hex digits (at most 64).
    pub fn short(&self, length: usize) -> String {
        let mut text = self.to_hex();
        text.truncate(length.min(64));
        text
    }

    /// Parse 64 hexadecimal digits.
    pub fn from_hex(text: &str) -> Option<Self> {
        let bytes = text.as_bytes();
        if bytes.len() != 64 {
            return None;
        }
        let mut out = [0u8; 32];
        for (i, slot) in out.iter_mut().enumerate() {
            let hi = hex_value(bytes[2 * i])?;
            let lo = hex_value(bytes[2 * i + 1])?;
            *slot = (hi << 4) | lo;
        }
        Some(Self(out))
    }
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        ContentHash::from_hex(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid content hash `{text}`")))
    }
}

/// Builder that feeds typed fields into a SHA-256 digest.
///
/// Each field is framed with a one-byte type marker and, for text, its
/// length, so adjacent fields can never run together.
#[derive(Clone)]
pub struct ContentHasher {
    hasher: Sha256,
}

impl ContentHasher {
    /// Start a hash for an entity identified by `tag`.
    pub fn new(tag: &str) -> Self {
        let mut hasher = Self {
            hasher: Sha256::new(),
        };
        hasher.text(tag);
        hasher
    }

    /// Feed a string.
    pub fn text(&mut self, value: &str) -> &mut Self {
        self.hasher.update([b's']);
        self.hasher.update((value.len() as u64).to_le_bytes());
        self.hasher.update(value.as_bytes());
        self
    }

    /// Feed a real, rounded to six decimals.
    pub fn real(&mut self, value: f64) -> &mut Self {
        let text = format_real(value);
        self.hasher.update([b'r']);
        self.hasher.update((text.len() as u64).to_le_bytes());
        self.hasher.update(text.as_bytes());
        self
    }

    /// Feed a signed integer.
    pub fn integer(&mut self, value: i64) -> &mut Self {
        self.hasher.update([b'i']);
        self.hasher.update(value.to_le_bytes());
        self
    }

    /// Feed a boolean.
    pub fn flag(&mut self, value: bool) -> &mut Self {
        self.hasher.update([b'b', u8::from(value)]);
        self
    }

    /// Feed the three coordinates of a point.
    pub fn point(&mut self, value: &Point3) -> &mut Self {
        self.real(value.x).real(value.y).real(value.z)
    }

    /// Feed the three components of a vector.
    pub fn vector(&mut self, value: &Vec3) -> &mut Self {
        self.real(value.x).real(value.y).real(value.z)
    }

    /// Feed a child hash.
    pub fn child(&mut self, value: &ContentHash) -> &mut Self {
        self.hasher.update([b'h']);
        self.hasher.update(value.0);
        self
    }

    /// Feed a list length, framing the elements that follow.
    pub fn count(&mut self, value: usize) -> &mut Self {
        self.hasher.update([b'n']);
        self.hasher.update((value as u64).to_le_bytes());
        self
    }

    /// Finish and return the digest.
    pub fn finish(self) -> ContentHash {
        let digest = self.hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        ContentHash(out)
    }
}

/// Six-decimal text of `value` with negative zero folded to zero.
pub fn format_real(value: f64) -> String {
    let rounded = (value * 1e6).round() / 1e6;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded:.6}")
}
