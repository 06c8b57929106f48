//! Reader for the OFAC SDN advanced list.
//!
//! Parses `sdn_advanced.xml` (`DistinctParty` records with nested profile,
//! identity, alias and feature trees) into the in-memory subject model of
//! `namescreen-core`. Low-quality aliases, non-Latin name parts, disproven
//! birthdate records and date ranges are dropped here so the engine never
//! sees them.

mod xml_parser;

use std::fs::File;
use std::io::BufRead;
use std::path::Path;

use namescreen_core::{BuildError, Subject, SubjectKind, SubjectLists, SubjectStore};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OfacError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid subject data: {0}")]
    Subjects(#[from] BuildError),
}

/// Load an SDN advanced file into one store per subject kind.
pub fn load_file(path: &Path) -> Result<SubjectLists, OfacError> {
    let file = File::open(path)?;
    let lists = load_reader(std::io::BufReader::new(file))?;
    tracing::info!(
        path = %path.display(),
        persons = lists.persons.len(),
        entities = lists.entities.len(),
        "loaded OFAC SDN list"
    );
    Ok(lists)
}

/// Load the SDN advanced list from any buffered reader.
pub fn load_reader<R: BufRead>(reader: R) -> Result<SubjectLists, OfacError> {
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
