//! Plan hashing primitives
//!
//! Provides [`ContentDigest`], a strongly-typed SHA-256 digest, and the
//! helpers that hash canonical JSON for plan integrity checks.

use crate::canonical::{canonicalize, canonicalize_serializable};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Fields excluded from the hashed form of a plan document
pub const HASH_EXCLUDED_FIELDS: [&str; 2] = ["hash", "evidence"];

/// A 32-byte SHA-256 digest
///
/// Renders as 64 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Create a digest from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get reference to the underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create digest from byte slice
    ///
    /// # Errors
    /// Returns error if slice length is not exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, HashError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| HashError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Compute SHA-256 of arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for ContentDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for ContentDigest {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !crate::ids::is_valid_hash(s) {
            return Err(HashError::Malformed(s.to_string()));
        }
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

/// Hash any serializable value over its canonical JSON form
///
/// # Errors
/// Returns error if the value cannot be represented as JSON
pub fn generate_hash<T>(data: &T) -> Result<String, HashError>
where
    T: Serialize + ?Sized,
{
    let canonical = canonicalize_serializable(data)?;
    Ok(ContentDigest::compute(canonical.as_bytes()).to_string())
}

/// Hash a JSON value over its canonical form
#[must_use]
pub fn hash_value(value: &Value) -> String {
    ContentDigest::compute(canonicalize(value).as_bytes()).to_string()
}

/// Recompute the hash of `data` and compare it with `expected`
///
/// # Errors
/// Returns error if the value cannot be represented as JSON
pub fn verify_hash<T>(data: &T, expected: &str) -> Result<bool, HashError>
where
    T: Serialize + ?Sized,
{
    Ok(generate_hash(data)? == expected)
}

/// The portion of a plan document covered by its hash
///
/// Returns a copy of `document` without the `hash` and `evidence` fields.
/// Non-object values are returned unchanged.
#[must_use]
pub fn plan_hash_input(document: &Value) -> Value {
    let mut input = document.clone();
    if let Value::Object(map) = &mut input {
        for field in HASH_EXCLUDED_FIELDS {
            map.remove(field);
        }
    }
    input
}

/// Hash a plan document given as raw JSON
#[must_use]
pub fn hash_plan_value(document: &Value) -> String {
    hash_value(&plan_hash_input(document))
}

/// Errors that can occur when hashing
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Invalid digest length
    #[error("invalid hash length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Digest text is not 64 lowercase hex characters
    #[error("malformed hash: '{0}'")]
    Malformed(String),

    /// Hex encoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
