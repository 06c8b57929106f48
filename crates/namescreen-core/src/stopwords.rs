//! Corpus-adaptive stop-word selection.
//!
//! The most frequent words of a subject collection (think "mohammed",
//! "company", "bank") carry almost no discriminating signal but fill phonetic
//! bins; they are excluded from indexing. Short words get a more aggressive
//! cutoff since short noise (titles, particles, initials) pollutes most.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::normalize::normalize_alias;
use crate::store::SubjectStore;

/// Multiplier for the long-word cutoff, as a ratio (3/2 = 1.5).
const LONG_CUTOFF_NUM: usize = 3;
const LONG_CUTOFF_DEN: usize = 2;
/// Short words (length 2..=4) are pruned at twice the mean frequency.
const SHORT_CUTOFF_FACTOR: usize = 2;
/// Tokens up to this length count as short.
const SHORT_TOKEN_LIMIT: usize = 4;

/// Normalized tokens deemed too common to discriminate. Derived once per
/// store, immutable afterwards.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StopwordSet {
    words: HashSet<String>,
}

impl StopwordSet {
    pub fn contains(&self, token: &str) -> bool {
        self.words.contains(token)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }
}

/// Select the noise words of a subject collection.
///
/// Each subject contributes each of its distinct normalized tokens once.
/// Tokens shorter than two characters are dropped entirely; the rest are
/// partitioned into short (2..=4) and long (>= 5) pools. Each pool keeps its
/// top `k` most frequent tokens as stop-words, where `k` is the pool's mean
/// token frequency scaled by the pool's multiplier (floored integer
/// arithmetic). Frequency ties break by ascending token so the selection is
/// deterministic.
pub fn select_stop_words(store: &SubjectStore) -> StopwordSet {
    let mut long_counts: HashMap<String, usize> = HashMap::new();
    let mut short_counts: HashMap<String, usize> = HashMap::new();
    let mut long_total = 0usize;
    let mut short_total = 0usize;

    for subject in store.iter() {
        let mut tokens = BTreeSet::new();
        for alias in &subject.aliases {
            tokens.extend(normalize_alias(alias));
        }
        for token in tokens {
            let length = token.chars().count();
            if length < 2 {
                continue;
            }
            if length <= SHORT_TOKEN_LIMIT {
                short_total += 1;
                *short_counts.entry(token).or_default() += 1;
            } else {
                long_total += 1;
                *long_counts.entry(token).or_default() += 1;
            }
        }
    }

    let k_long = if long_counts.is_empty() {
        0
    } else {
        LONG_CUTOFF_NUM * long_total / (LONG_CUTOFF_DEN * long_counts.len())
    };
    let k_short = if short_counts.is_empty() {
        0
    } else {
        SHORT_CUTOFF_FACTOR * short_total / short_counts.len()
    };

    let mut words = top_frequent(long_counts, k_long);
    words.extend(top_frequent(short_counts, k_short));

    tracing::debug!(
        stop_words = words.len(),
        k_long,
        k_short,
        "selected corpus stop-words"
    );

    StopwordSet { words }
}

fn top_frequent(counts: HashMap<String, usize>, k: usize) -> HashSet<String> {
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(k);
    ranked.into_iter().map(|(token, _)| token).collect()
}
