//! Whitespace-insensitive SHA-256 fingerprints.
//!
//! Fingerprints are the keys of the [`ContentCache`](crate::cache::ContentCache).

use sha2::{Digest, Sha256};

/// Separator fed to the hasher between fingerprint parts (ASCII unit separator).
const PART_SEPARATOR: u8 = 0x1f;

/// Compute a stable fingerprint over the semantic content of `parts`.
///
/// Each part is whitespace-normalized before hashing: leading and trailing
/// whitespace is dropped and interior runs collapse to a single space. Parts
/// are delimited so that `["ab", "c"]` and `["a", "bc"]` differ.
pub fn fingerprint<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Sha256::new();
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            hasher.update([PART_SEPARATOR]);
        }
        for (j, word) in part.as_ref().split_whitespace().enumerate() {
            if j > 0 {
                hasher.update(b" ");
            }
            hasher.update(word.as_bytes());
        }
    }
    format!("{:x}", hasher.finalize())
}
