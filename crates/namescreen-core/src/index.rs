//! Phonetic-bin inverted index.
//!
//! Every indexable token of every subject is encoded with Double-Metaphone
//! and posted under each of its keys. Bins collecting more than an eighth of
//! the corpus are pruned outright, which bounds per-key candidate fan-out
//! (and therefore query latency) at the cost of recall on pathologically
//! common phonemes.

use std::collections::{BTreeSet, HashMap};

use crate::normalize::normalize_alias;
use crate::phonetic::PhoneticEncoder;
use crate::stopwords::{StopwordSet, select_stop_words};
use crate::store::SubjectStore;

/// Shortest token that gets indexed.
const MIN_TOKEN_LENGTH: usize = 2;
/// A bin may hold postings for at most `store length / BIN_CAP_DIVISOR`
/// subjects before it is pruned.
const BIN_CAP_DIVISOR: usize = 8;

/// One entry of a phonetic bin: which subject posted which token here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub subject_id: String,
    pub token: String,
}

/// Immutable map from Double-Metaphone key to its postings, ordered by
/// (subject id, token) ascending. Built once per store snapshot; shared by
/// reference across query threads.
#[derive(Debug, Default, PartialEq)]
pub struct PhoneticIndex {
    bins: HashMap<String, Vec<Posting>>,
}

impl PhoneticIndex {
    /// Build the index for a store, excluding stop-words and one-character
    /// tokens. Deterministic: the same store and stop-word set always produce
    /// an identical index.
    pub fn build(store: &SubjectStore, stop_words: &StopwordSet) -> Self {
        let encoder = PhoneticEncoder::new();
        let mut bins: HashMap<String, Vec<Posting>> = HashMap::new();

        for subject in store.iter_sorted() {
            let mut tokens = BTreeSet::new();
            for alias in &subject.aliases {
                tokens.extend(normalize_alias(alias));
            }
            for token in &tokens {
                if token.chars().count() < MIN_TOKEN_LENGTH || stop_words.contains(token) {
                    continue;
                }
                for key in encoder.keys(token) {
                    bins.entry(key).or_default().push(Posting {
                        subject_id: subject.id.clone(),
                        token: token.clone(),
                    });
                }
            }
        }

        let cap = store.len() / BIN_CAP_DIVISOR;
        let unpruned = bins.len();
        bins.retain(|_, postings| postings.len() <= cap);

        for postings in bins.values_mut() {
            postings.sort_by(|a, b| {
                a.subject_id
                    .cmp(&b.subject_id)
                    .then_with(|| a.token.cmp(&b.token))
            });
        }

        tracing::debug!(
            bins = bins.len(),
            pruned = unpruned - bins.len(),
            cap,
            subjects = store.len(),
            "built phonetic index"
        );

        Self { bins }
    }

    pub fn get(&self, key: &str) -> Option<&[Posting]> {
        self.bins.get(key).map(Vec::as_slice)
    }

    /// Number of phonetic bins.
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// The fullest bin and its posting count, for corpus diagnostics.
    pub fn largest_bin(&self) -> Option<(&str, usize)> {
        self.bins
            .iter()
            .map(|(key, postings)| (key.as_str(), postings.len()))
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
    }

    #[cfg(test)]
    pub(crate) fn bins(&self) -> &HashMap<String, Vec<Posting>> {
        &self.bins
    }
}

/// Derive stop-words and the phonetic index from a store in one step.
pub fn build_index(store: &SubjectStore) -> (PhoneticIndex, StopwordSet) {
    let stop_words = select_stop_words(store);
    let index = PhoneticIndex::build(store, &stop_words);
    tracing::info!(
        subjects = store.len(),
        bins = index.len(),
        stop_words = stop_words.len(),
        "index build complete"
    );
    (index, stop_words)
}
