//! Phonetic fuzzy name-matching engine for sanctions screening.
//!
//! Loaders (see the `namescreen-eu` and `namescreen-ofac` crates) populate a
//! [`SubjectStore`] per subject kind; [`build_index`] derives a corpus-adaptive
//! [`StopwordSet`](stopwords::StopwordSet) and a Double-Metaphone
//! [`PhoneticIndex`](index::PhoneticIndex) from it; [`search`](search::search)
//! answers "does this name plausibly match a listed subject?" with a ranked
//! candidate list. Index, store and stop-word set are immutable after build and
//! safe to share across any number of query threads.

use jiff::civil::Date;
use serde::Serialize;
use thiserror::Error;

pub mod index;
pub mod normalize;
pub mod phonetic;
pub mod search;
pub mod stopwords;
pub mod store;

// Re-export for convenience
pub use index::{PhoneticIndex, Posting, build_index};
pub use search::{DEFAULT_THRESHOLD, SearchMatch, SearchOptions, search};
pub use stopwords::{StopwordSet, select_stop_words};
pub use store::SubjectStore;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("duplicate subject id: {0}")]
    DuplicateSubject(String),
    #[error("subject {0} has no name aliases")]
    NoAliases(String),
    #[error("subject {0} carries an alias with no usable name part")]
    EmptyAlias(String),
}

/// Gender recorded on a name alias. Absence means unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Parse the single-letter codes the source lists use (`M`/`F`).
    /// Anything else is treated as unknown.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "M" | "m" => Some(Self::Male),
            "F" | "f" => Some(Self::Female),
            _ => None,
        }
    }
}

/// Persons and entities are indexed and queried independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubjectKind {
    Person,
    Entity,
}

/// One word of a name. `is_first_name` is informational only in the current
/// scoring and reserved for future weighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamePart {
    pub value: String,
    pub is_first_name: bool,
}

impl NamePart {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            is_first_name: false,
        }
    }

    pub fn first_name(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            is_first_name: true,
        }
    }
}

/// One spelling variant of a subject's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameAlias {
    pub parts: Vec<NamePart>,
    pub language: Option<String>,
    pub gender: Option<Gender>,
}

impl NameAlias {
    pub fn new(parts: Vec<NamePart>) -> Self {
        Self {
            parts,
            language: None,
            gender: None,
        }
    }

    pub fn with_gender(mut self, gender: Option<Gender>) -> Self {
        self.gender = gender;
        self
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    /// The alias as written, parts joined by single spaces.
    pub fn full_name(&self) -> String {
        let values: Vec<&str> = self.parts.iter().map(|p| p.value.as_str()).collect();
        values.join(" ")
    }
}

/// A listed sanctioned person or entity.
///
/// Birthdates are exact calendar dates only; loaders discard date ranges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subject {
    pub id: String,
    pub kind: SubjectKind,
    pub aliases: Vec<NameAlias>,
    pub birthdates: Vec<Date>,
}

impl Subject {
    pub fn person(id: impl Into<String>, aliases: Vec<NameAlias>, birthdates: Vec<Date>) -> Self {
        Self {
            id: id.into(),
            kind: SubjectKind::Person,
            aliases,
            birthdates,
        }
    }

    pub fn entity(id: impl Into<String>, aliases: Vec<NameAlias>) -> Self {
        Self {
            id: id.into(),
            kind: SubjectKind::Entity,
            aliases,
            birthdates: Vec::new(),
        }
    }
}

/// What a list loader produces: one store per subject kind.
#[derive(Debug)]
pub struct SubjectLists {
    pub persons: SubjectStore,
    pub entities: SubjectStore,
}
