//! Reader for the EU consolidated financial sanctions list.
//!
//! Parses the `export` XML format (one `sanctionEntity` per listed subject,
//! aliases and birthdates as attribute-only child elements) into the
//! in-memory subject model of `namescreen-core`. Delisted entities, weak
//! aliases and non-exact birthdates are dropped here so the engine never sees
//! them.

mod xml_parser;

use std::fs::File;
use std::io::BufRead;
use std::path::Path;

use namescreen_core::{BuildError, Subject, SubjectKind, SubjectLists, SubjectStore};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EuError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid subject data: {0}")]
    Subjects(#[from] BuildError),
}

/// Load an EU consolidated list file into one store per subject kind.
pub fn load_file(path: &Path) -> Result<SubjectLists, EuError> {
    let file = File::open(path)?;
    let lists = load_reader(std::io::BufReader::new(file))?;
    tracing::info!(
        path = %path.display(),
        persons = lists.persons.len(),
        entities = lists.entities.len(),
        "loaded EU consolidated list"
    );
    Ok(lists)
}

/// Load the EU consolidated list from any buffered reader.
pub fn load_reader<R: BufRead>(reader: R) -> Result<SubjectLists, EuError> {
    let mut persons: Vec<Subject> = Vec::new();
    let mut entities: Vec<Subject> = Vec::new();

    xml_parser::parse_xml(reader, |subject| match subject.kind {
        SubjectKind::Person => persons.push(subject),
        SubjectKind::Entity => entities.push(subject),
    })?;

    Ok(SubjectLists {
        persons: SubjectStore::from_subjects(persons)?,
        entities: SubjectStore::from_subjects(entities)?,
    })
}
