//! Name normalization: Unicode lowercasing, compatibility decomposition, and
//! word splitting.
//!
//! Normalized tokens keep decomposed combining marks; the phonetic stage
//! strips them, so accented and unaccented Latin spellings end up in the same
//! phonetic bin while the tokens themselves stay faithful to the source.

use std::collections::BTreeSet;

use unicode_normalization::UnicodeNormalization;

use crate::NameAlias;

/// Lowercase and apply NFKD compatibility decomposition.
///
/// Idempotent: applying it to its own output is a no-op.
pub fn normalize_token(token: &str) -> String {
    token.to_lowercase().nfkd().collect()
}

/// Normalized token set of one alias.
///
/// Every non-alphabetic character is a separator; runs of separators split a
/// name part into fragments, each of which is normalized. Repeated words
/// within an alias collapse (the result is a set, ordered for deterministic
/// iteration). Empty name parts contribute nothing.
pub fn normalize_alias(alias: &NameAlias) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    for part in &alias.parts {
        collect_words(&part.value, &mut tokens);
    }
    tokens
}

/// Normalized token set of a free-form name string (used for queries).
pub fn normalize_name(name: &str) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    collect_words(name, &mut tokens);
    tokens
}

fn collect_words(value: &str, tokens: &mut BTreeSet<String>) {
    for fragment in value.split(|c: char| !c.is_alphabetic()) {
        if fragment.is_empty() {
            continue;
        }
        tokens.insert(normalize_token(fragment));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NamePart;

    fn alias(parts: &[&str]) -> NameAlias {
        NameAlias::new(parts.iter().map(|p| NamePart::new(*p)).collect())
    }

    #[test]
    fn test_normalize_token_lowercases() {
        assert_eq!(normalize_token("KARPANOVA"), "karpanova");
    }

    #[test]
    fn test_normalize_token_decomposes_diacritics() {
        // é -> e + U+0301 combining acute
        assert_eq!(normalize_token("José"), "jose\u{301}");
    }

    #[test]
    fn test_normalize_token_idempotent() {
        for raw in ["José", "MÜLLER", "Ångström", "plain", "Đặng"] {
            let once = normalize_token(raw);
            assert_eq!(normalize_token(&once), once);
        }
    }

    #[test]
    fn test_normalize_alias_splits_on_non_alphabetic() {
        let tokens = normalize_alias(&alias(&["Jean-Claude", "O'Brien"]));
        let expected: Vec<&str> = vec!["brien", "claude", "jean", "o"];
        assert_eq!(tokens.iter().map(String::as_str).collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_normalize_alias_deduplicates() {
        let tokens = normalize_alias(&alias(&["Mohammed", "al-Mohammed"]));
        assert_eq!(tokens.len(), 2);
        assert!(tokens.contains("al"));
        assert!(tokens.contains("mohammed"));
    }

    #[test]
    fn test_normalize_alias_empty_parts() {
        let tokens = normalize_alias(&alias(&["", "   ", "--"]));
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_normalize_name_digits_are_separators() {
        let tokens = normalize_name("Bank24 Holding");
        assert_eq!(tokens.iter().map(String::as_str).collect::<Vec<_>>(), vec!["bank", "holding"]);
    }
}
