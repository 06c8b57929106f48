//! Read-only subject lookup, one store per subject kind.

use std::collections::HashMap;

use crate::{BuildError, Subject};

/// Map from subject id to its aliases and birthdates. Built once by a list
/// loader, immutable afterwards; the scorer reads it across many queries
/// without cloning.
#[derive(Debug, Default)]
pub struct SubjectStore {
    subjects: HashMap<String, Subject>,
}

impl SubjectStore {
    /// Build a store from loader output.
    ///
    /// The build path is strict: duplicate ids, subjects without aliases, and
    /// aliases without a usable name part are rejected rather than skipped.
    pub fn from_subjects(subjects: impl IntoIterator<Item = Subject>) -> Result<Self, BuildError> {
        let mut map = HashMap::new();
        for subject in subjects {
            if subject.aliases.is_empty() {
                return Err(BuildError::NoAliases(subject.id));
            }
            if subject
                .aliases
                .iter()
                .any(|a| a.parts.iter().all(|p| p.value.trim().is_empty()))
            {
                return Err(BuildError::EmptyAlias(subject.id));
            }
            if map.contains_key(&subject.id) {
                return Err(BuildError::DuplicateSubject(subject.id));
            }
            map.insert(subject.id.clone(), subject);
        }
        Ok(Self { subjects: map })
    }

    pub fn get(&self, id: &str) -> Option<&Subject> {
        self.subjects.get(id)
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subject> {
        self.subjects.values()
    }

    /// Subjects in ascending id order. Build-phase iteration uses this so
    /// that index construction is deterministic.
    pub fn iter_sorted(&self) -> impl Iterator<Item = &Subject> {
        let mut subjects: Vec<&Subject> = self.subjects.values().collect();
        subjects.sort_by(|a, b| a.id.cmp(&b.id));
        subjects.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NameAlias, NamePart};

    fn subject(id: &str, name: &str) -> Subject {
        Subject::person(
            id,
            vec![NameAlias::new(vec![NamePart::new(name)])],
            Vec::new(),
        )
    }

    #[test]
    fn test_lookup() {
        let store =
            SubjectStore::from_subjects(vec![subject("1", "Ivan Petrov"), subject("2", "Acme")])
                .unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.get("1").is_some());
        assert!(store.get("3").is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = SubjectStore::from_subjects(vec![subject("1", "A"), subject("1", "B")])
            .unwrap_err();
        assert!(matches!(err, BuildError::DuplicateSubject(id) if id == "1"));
    }

    #[test]
    fn test_subject_without_aliases_rejected() {
        let bare = Subject::person("9", Vec::new(), Vec::new());
        let err = SubjectStore::from_subjects(vec![bare]).unwrap_err();
        assert!(matches!(err, BuildError::NoAliases(_)));
    }

    #[test]
    fn test_blank_alias_rejected() {
        let blank = Subject::person(
            "9",
            vec![NameAlias::new(vec![NamePart::new("  ")])],
            Vec::new(),
        );
        let err = SubjectStore::from_subjects(vec![blank]).unwrap_err();
        assert!(matches!(err, BuildError::EmptyAlias(_)));
    }

    #[test]
    fn test_iter_sorted_order() {
        let store = SubjectStore::from_subjects(vec![
            subject("b", "B"),
            subject("a", "A"),
            subject("c", "C"),
        ])
        .unwrap();
        let ids: Vec<&str> = store.iter_sorted().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
