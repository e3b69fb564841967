// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canonical JSON serialization and SHA-256 fingerprinting.
//!
//! Every hash in the system — bundle checksums, compiled-plan hashes,
//! prompt hashes, run hashes — is computed over the *canonical* JSON
//! rendering of a value, never over whatever a serializer happens to emit.
//! Canonical here means: object keys sorted, arrays left in author order,
//! numbers rendered exactly as authored (no float round-tripping through
//! `f64`), and no insignificant whitespace.
//!
//! `serde_json::Map` is backed by a `BTreeMap` in this workspace (the
//! `preserve_order` feature is never enabled), so key sorting falls out of
//! plain serialization. Number fidelity is handled by enabling
//! `arbitrary_precision`, which keeps the original digit string from
//! parsing instead of lossily round-tripping through `f64`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Errors produced while canonicalizing a value.
#[derive(Debug, thiserror::Error)]
pub enum CanonError {
    /// The value could not be serialized to JSON.
    #[error("canonicalization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CanonError>;

/// Render `value` as canonical JSON bytes (sorted keys, no whitespace,
/// numbers preserved exactly as authored).
///
/// # Errors
///
/// Returns [`CanonError::Serialize`] if `value` cannot be serialized.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<String> {
    let v = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&v)?)
}

/// Hex-encoded SHA-256 digest of arbitrary bytes.
///
/// # Examples
///
/// ```
/// use compliance_canon::sha256_hex;
/// assert_eq!(
///     sha256_hex(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Compute the SHA-256 fingerprint of `value`'s canonical JSON rendering.
///
/// This is the single function every hash in the system (`checksum`,
/// `plan_hash`, `run_hash`, `prompt_hash`) should be built from, so that
/// "canonical" means exactly one thing everywhere.
///
/// # Errors
///
/// Returns [`CanonError::Serialize`] if `value` cannot be serialized.
pub fn fingerprint<T: Serialize>(value: &T) -> Result<String> {
    let json = canonicalize(value)?;
    Ok(sha256_hex(json.as_bytes()))
}
