//! Candidate retrieval, multi-signal scoring, filtering and ranking.
//!
//! A query runs in five stages: encode the query into phonetic bins, pull
//! candidates out of the index behind structural pre-filters (gender,
//! birthdate, per-word edit similarity), gate on phonetic coverage of the
//! query, score every alias of every surviving candidate, then rank and keep
//! the best alias per subject. Edit distance alone misses transliteration
//! variants (Karpanova / Karpanowa) and over-matches short names; the
//! phonetic boost and the short-input and missing-word penalties correct for
//! both, each scaled by the caller's threshold so one knob controls overall
//! aggressiveness.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

use jiff::civil::Date;
use serde::Serialize;

use crate::index::PhoneticIndex;
use crate::normalize::{normalize_alias, normalize_name};
use crate::phonetic::PhoneticEncoder;
use crate::store::SubjectStore;
use crate::{Gender, NameAlias};

/// Default minimum similarity score for a result.
pub const DEFAULT_THRESHOLD: u32 = 60;

/// Bin postings must reach this edit similarity against the query word to
/// count as a candidate match.
const MIN_PART_SIMILARITY: f64 = 0.6;
/// Queries with phonetic coverage below this are abandoned early.
const MIN_PHONETIC_RATIO: f64 = 25.0;
/// Normalized query names up to this many characters count as short.
const SHORT_NAME_LIMIT: usize = 12;
/// Non-exact matches start this far below their string similarity.
const BASE_PENALTY: f64 = 5.0;
/// Non-exact matches never reach the exact-match score.
const NON_EXACT_CEILING: f64 = 99.9;
/// Ceiling for the missing-word penalty.
const MISSING_WORD_PENALTY_CAP: f64 = 20.0;

/// Optional query attributes and the similarity threshold.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub gender: Option<Gender>,
    pub birthdate: Option<Date>,
    pub threshold: u32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            gender: None,
            birthdate: None,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// One ranked hit: the best-scoring alias of a matched subject.
#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    pub subject_id: String,
    pub score: f64,
    pub alias: NameAlias,
}

/// Screen a name against one index/store pair.
///
/// Returns matches sorted by score descending, at most one per subject (the
/// best alias wins). The query path never fails: empty, unencodable or
/// unmatched queries yield an empty list. Any number of searches may run
/// concurrently against the same index and store.
pub fn search(
    name: &str,
    index: &PhoneticIndex,
    store: &SubjectStore,
    options: &SearchOptions,
) -> Vec<SearchMatch> {
    let threshold = f64::from(options.threshold);
    let encoder = PhoneticEncoder::new();

    // Stage 1: phonetic bins of the query words.
    let query_tokens = normalize_name(name);
    if query_tokens.is_empty() {
        return Vec::new();
    }
    let mut query_bins: BTreeSet<(String, &str)> = BTreeSet::new();
    for token in &query_tokens {
        for key in encoder.keys(token) {
            query_bins.insert((key, token.as_str()));
        }
    }

    // Stage 2: candidates sharing at least one bin, minus subjects whose
    // recorded gender or birthdates contradict the query. A rejected subject
    // is remembered so later postings skip it outright.
    let mut candidates: Vec<&str> = Vec::new();
    let mut candidate_set: HashSet<&str> = HashSet::new();
    let mut rejected: HashSet<&str> = HashSet::new();
    let mut matched_tokens: BTreeSet<&str> = BTreeSet::new();

    for (key, token) in &query_bins {
        let Some(postings) = index.get(key) else {
            continue;
        };
        for posting in postings {
            let id = posting.subject_id.as_str();
            if rejected.contains(id) {
                continue;
            }
            let subject = store
                .get(id)
                .expect("index posting references a subject missing from the store");

            if let Some(gender) = options.gender {
                let recorded: HashSet<Gender> =
                    subject.aliases.iter().filter_map(|a| a.gender).collect();
                if recorded.len() == 1 && !recorded.contains(&gender) {
                    rejected.insert(id);
                    continue;
                }
            }
            if let Some(birthdate) = options.birthdate {
                if !subject.birthdates.is_empty() && !subject.birthdates.contains(&birthdate) {
                    rejected.insert(id);
                    continue;
                }
            }

            if rapidfuzz::fuzz::ratio(token.chars(), posting.token.chars()) >= MIN_PART_SIMILARITY {
                if candidate_set.insert(id) {
                    candidates.push(id);
                }
                matched_tokens.insert(*token);
            }
        }
    }

    // Stage 3: how much of the query (by characters) found a phonetic home.
    let matched_chars: usize = matched_tokens.iter().map(|t| t.chars().count()).sum();
    let missed_chars: usize = query_tokens
        .iter()
        .filter(|t| !matched_tokens.contains(t.as_str()))
        .map(|t| t.chars().count())
        .sum();
    let total_chars = matched_chars + missed_chars;
    let phonetic_ratio = if total_chars > 0 {
        100.0 * matched_chars as f64 / total_chars as f64
    } else {
        0.0
    };
    if phonetic_ratio < MIN_PHONETIC_RATIO {
        return Vec::new();
    }

    tracing::debug!(
        candidates = candidates.len(),
        phonetic_ratio,
        "retrieved candidates"
    );

    // Stage 4: score every alias of every candidate.
    let normalized_query = join_tokens(&query_tokens);
    let query_len = normalized_query.chars().count();
    let query_words = query_tokens.len();
    let is_short = query_len <= SHORT_NAME_LIMIT;
    let shortness = SHORT_NAME_LIMIT.saturating_sub(query_len);

    let mut matches: Vec<SearchMatch> = Vec::new();
    for id in &candidates {
        let subject = store
            .get(id)
            .expect("index posting references a subject missing from the store");
        for alias in &subject.aliases {
            let alias_tokens = normalize_alias(alias);
            let normalized_alias = join_tokens(&alias_tokens);
            let similarity = token_sort_ratio(&normalized_alias, &normalized_query);

            let score = if similarity >= 100.0 {
                100.0
            } else {
                let mut score = similarity - BASE_PENALTY;

                // Reward matches the phonetic stage vouches for.
                score += threshold / 100.0 * phonetic_ratio / 16.0;

                // Short inputs must be extra good.
                if is_short {
                    score -= 2.0 * (threshold / 100.0) * shortness as f64;
                }

                // Penalize word-count mismatch ("Ivan Petrov" against
                // "Ivan Sergeyevich Petrov Ivanovich").
                let missing = alias_tokens.len().abs_diff(query_words);
                score -=
                    (missing as f64 * 5.0 * threshold / 100.0).min(MISSING_WORD_PENALTY_CAP);

                score.clamp(0.0, NON_EXACT_CEILING)
            };

            if score >= threshold {
                matches.push(SearchMatch {
                    subject_id: (*id).to_string(),
                    score,
                    alias: alias.clone(),
                });
            }
        }
    }

    // Stage 5: rank by score, report each subject once (best alias wins).
    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    let mut reported: HashSet<String> = HashSet::new();
    matches.retain(|m| reported.insert(m.subject_id.clone()));
    matches
}

fn join_tokens(tokens: &BTreeSet<String>) -> String {
    let tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();
    tokens.join(" ")
}

/// Word-order-insensitive edit similarity in [0, 100].
///
/// Both operands are split on whitespace, sorted, and rejoined before the
/// indel ratio is taken; the result is rounded to the nearest integer, which
/// is the fuzzywuzzy `token_sort_ratio` contract the scoring constants were
/// tuned against.
fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let sorted = |s: &str| {
        let mut words: Vec<&str> = s.split_whitespace().collect();
        words.sort_unstable();
        words.join(" ")
    };
    let (a, b) = (sorted(a), sorted(b));
    (100.0 * rapidfuzz::fuzz::ratio(a.chars(), b.chars())).round()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_index;
    use crate::{NamePart, Subject};

    fn alias(name: &str) -> NameAlias {
        NameAlias::new(name.split_whitespace().map(NamePart::new).collect())
    }

    /// Phonetically distinct padding so the bin cap (len/8) and the adaptive
    /// stop-word cutoffs behave as they do on a real corpus.
    fn fillers() -> Vec<Subject> {
        [
            "Aaron Beaumont",
            "Casimir Delacroix",
            "Ferdinand Grimaldi",
            "Henrietta Ibarra",
            "Jasper Kowalczyk",
            "Leopold Marchetti",
            "Norbert Okonkwo",
            "Patricia Quispe",
            "Rosalind Steinbach",
            "Theodore Ulanova",
            "Valentina Woodhouse",
            "Xiomara Yusupova",
            "Zachary Abernathy",
            "Beatrice Cormier",
            "Dominic Ferreira",
            "Gregory Hutchinson",
        ]
        .iter()
        .enumerate()
        .map(|(i, name)| Subject::person(format!("F{i:02}"), vec![alias(name)], Vec::new()))
        .collect()
    }

    fn store_with(mut subjects: Vec<Subject>) -> SubjectStore {
        subjects.extend(fillers());
        SubjectStore::from_subjects(subjects).unwrap()
    }

    fn options(threshold: u32) -> SearchOptions {
        SearchOptions {
            threshold,
            ..SearchOptions::default()
        }
    }

    // =========================================================================
    // token_sort_ratio
    // =========================================================================

    #[test]
    fn test_token_sort_ratio_identical() {
        assert_eq!(token_sort_ratio("ivan petrov", "ivan petrov"), 100.0);
    }

    #[test]
    fn test_token_sort_ratio_order_insensitive() {
        assert_eq!(token_sort_ratio("petrov ivan", "ivan petrov"), 100.0);
    }

    #[test]
    fn test_token_sort_ratio_known_vectors() {
        // "acme co trading" is a subsequence of "acme company trading":
        // indel distance 5 over 35 chars -> 85.71 -> 86.
        assert_eq!(
            token_sort_ratio("acme trading co", "acme trading company"),
            86.0
        );
        // one substituted letter and one missing word
        assert_eq!(
            token_sort_ratio(
                "anastasia karpanowa",
                "anastasiya karpanova nikolayevna"
            ),
            71.0
        );
    }

    // =========================================================================
    // search
    // =========================================================================

    #[test]
    fn test_exact_match_scores_100() {
        let store = store_with(vec![Subject::person(
            "P1",
            vec![alias("Anastasiya Nikolayevna Karpanova")],
            Vec::new(),
        )]);
        let (index, _) = build_index(&store);
        let results = search(
            "Anastasiya Nikolayevna KARPANOVA",
            &index,
            &store,
            &options(80),
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].subject_id, "P1");
        assert_eq!(results[0].score, 100.0);
    }

    #[test]
    fn test_best_alias_wins_single_result() {
        let subject = Subject::person(
            "P1",
            vec![
                alias("Anastasiya Nikolayevna Karpanova"),
                alias("Anastasiya Karpanova"),
            ],
            Vec::new(),
        );
        let store = store_with(vec![subject]);
        let (index, _) = build_index(&store);
        let results = search("Anastasiya Karpanova", &index, &store, &options(60));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 100.0);
        assert_eq!(results[0].alias.full_name(), "Anastasiya Karpanova");
    }

    #[test]
    fn test_gender_filter() {
        let subject = Subject::person(
            "P1",
            vec![alias("Anastasiya Karpanova").with_gender(Some(Gender::Female))],
            Vec::new(),
        );
        let store = store_with(vec![subject]);
        let (index, _) = build_index(&store);

        let mut opts = options(60);
        opts.gender = Some(Gender::Male);
        assert!(search("Anastasiya Karpanova", &index, &store, &opts).is_empty());

        opts.gender = Some(Gender::Female);
        assert_eq!(search("Anastasiya Karpanova", &index, &store, &opts).len(), 1);
    }

    #[test]
    fn test_gender_filter_skipped_when_aliases_disagree() {
        let subject = Subject::person(
            "P1",
            vec![
                alias("Anastasiya Karpanova").with_gender(Some(Gender::Female)),
                alias("Anastas Karpanov").with_gender(Some(Gender::Male)),
            ],
            Vec::new(),
        );
        let store = store_with(vec![subject]);
        let (index, _) = build_index(&store);
        let mut opts = options(60);
        opts.gender = Some(Gender::Male);
        assert!(!search("Anastasiya Karpanova", &index, &store, &opts).is_empty());
    }

    #[test]
    fn test_birthdate_filter() {
        let born = jiff::civil::date(1985, 3, 12);
        let subject = Subject::person("P1", vec![alias("Anastasiya Karpanova")], vec![born]);
        let store = store_with(vec![subject]);
        let (index, _) = build_index(&store);

        let mut opts = options(60);
        opts.birthdate = Some(jiff::civil::date(1990, 1, 1));
        assert!(search("Anastasiya Karpanova", &index, &store, &opts).is_empty());

        opts.birthdate = Some(born);
        assert_eq!(search("Anastasiya Karpanova", &index, &store, &opts).len(), 1);
    }

    #[test]
    fn test_birthdate_filter_inert_when_subject_has_none() {
        let subject = Subject::person("P1", vec![alias("Anastasiya Karpanova")], Vec::new());
        let store = store_with(vec![subject]);
        let (index, _) = build_index(&store);
        let mut opts = options(60);
        opts.birthdate = Some(jiff::civil::date(1990, 1, 1));
        assert_eq!(search("Anastasiya Karpanova", &index, &store, &opts).len(), 1);
    }

    #[test]
    fn test_empty_and_unencodable_queries() {
        let store = store_with(Vec::new());
        let (index, _) = build_index(&store);
        assert!(search("", &index, &store, &options(60)).is_empty());
        assert!(search("..!!..", &index, &store, &options(60)).is_empty());
        assert!(search("Анастасия Карпанова", &index, &store, &options(60)).is_empty());
    }

    #[test]
    fn test_empty_store() {
        let store = SubjectStore::default();
        let (index, _) = build_index(&store);
        assert!(search("Anastasiya Karpanova", &index, &store, &options(60)).is_empty());
    }

    #[test]
    fn test_ranking_and_uniqueness() {
        let store = store_with(vec![
            Subject::person("P1", vec![alias("Viktoria Sokolova Andreyevna")], Vec::new()),
            Subject::person("P2", vec![alias("Viktoria Sokolova")], Vec::new()),
        ]);
        let (index, _) = build_index(&store);
        let results = search("Viktoria Sokolova", &index, &store, &options(60));
        assert!(!results.is_empty());
        assert_eq!(results[0].subject_id, "P2");
        assert_eq!(results[0].score, 100.0);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        let mut ids: Vec<&str> = results.iter().map(|m| m.subject_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), results.len());
    }

    #[test]
    fn test_non_exact_capped_below_100() {
        let store = store_with(vec![Subject::person(
            "P1",
            vec![alias("Anastasiya Nikolayevna Karpanova")],
            Vec::new(),
        )]);
        let (index, _) = build_index(&store);
        let results = search("Anastasia Karpanowa", &index, &store, &options(60));
        assert_eq!(results.len(), 1);
        assert!(results[0].score >= 60.0);
        assert!(results[0].score <= NON_EXACT_CEILING);
    }
}
