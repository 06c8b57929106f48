//! Double-Metaphone encoding of normalized tokens.

use rphonetic::{DoubleMetaphone, Encoder};
use unicode_normalization::char::is_combining_mark;

/// Stateless Double-Metaphone wrapper producing the phonetic keys a token is
/// binned under. Safe to share across query threads; also cheap to construct
/// per call site.
#[derive(Debug, Default)]
pub struct PhoneticEncoder {
    metaphone: DoubleMetaphone,
}

impl PhoneticEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Up to two phonetic keys (primary and alternate encoding) for a
    /// normalized token.
    ///
    /// Combining marks left by NFKD are dropped before encoding, so accented
    /// and unaccented spellings of the same Latin word share keys. A token
    /// that still contains anything outside ASCII letters cannot be encoded
    /// and yields no keys; callers skip such tokens silently.
    pub fn keys(&self, token: &str) -> Vec<String> {
        let stripped: String = token.chars().filter(|c| !is_combining_mark(*c)).collect();
        if stripped.is_empty() || !stripped.chars().all(|c| c.is_ascii_alphabetic()) {
            return Vec::new();
        }

        let primary = self.metaphone.encode(&stripped);
        let alternate = self.metaphone.encode_alternate(&stripped);

        let mut keys = Vec::with_capacity(2);
        if !primary.is_empty() {
            keys.push(primary);
        }
        if !alternate.is_empty() && keys.first().map(String::as_str) != Some(alternate.as_str()) {
            keys.push(alternate);
        }
        keys
    }
}
