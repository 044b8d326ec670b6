//! Content hashing for output names and scoped identifiers.
//!
//! Copyright (c) 2025 Posit, PBC

use sha2::{Digest, Sha256};

/// Number of hex characters of the content hash used in output file names.
pub const OUTPUT_HASH_LEN: usize = 8;

/// Compute SHA-256 hash of content and return as hex string.
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// `<basename>.<hash-prefix>.<ext>` for a linked asset.
///
/// `file_name` is the original file name; files without an extension get
/// `<basename>.<hash-prefix>`.
pub fn hashed_file_name(file_name: &str, hash: &str) -> String {
    let prefix = &hash[..OUTPUT_HASH_LEN.min(hash.len())];
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}.{}.{}", stem, prefix, ext),
        _ => format!("{}.{}", file_name, prefix),
    }
}

/// Short lowercase base-36 digest of `input`, `len` characters long.
pub fn short_base36(input: &str, len: usize) -> String {
    const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let digest = Sha256::digest(input.as_bytes());
    let mut value = u64::from_be_bytes([
        digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
    ]);

    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    String::from_utf8(out).unwrap_or_default()
}
