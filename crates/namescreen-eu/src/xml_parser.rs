//! Parser for the EU consolidated list `export` XML.
//!
//! Each listed subject follows the structure:
//! ```xml
//! <export>
//!   <sanctionEntity logicalId="13">
//!     <subjectType code="person" classificationCode="P"/>
//!     <nameAlias firstName="Saddam" wholeName="Saddam Hussein Al-Tikriti"
//!                gender="M" nameLanguage="EN" strong="true"/>
//!     <birthdate birthdate="1937-04-28" year="1937" circa="false"/>
//!   </sanctionEntity>
//! </export>
//! ```
//! `nameAlias`, `birthdate` and `subjectType` carry their data in attributes
//! and are usually self-closing.

use std::io::BufRead;

use jiff::civil::Date;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use namescreen_core::{Gender, NameAlias, NamePart, Subject};

use crate::EuError;

/// Parse an EU consolidated list export, calling `on_subject` for each
/// usable sanction entity (delisted entities and entities without any strong
/// Latin alias are skipped).
pub fn parse_xml<R: BufRead>(
    reader: R,
    mut on_subject: impl FnMut(Subject),
) -> Result<(), EuError> {
    let mut xml_reader = Reader::from_reader(reader);
    xml_reader.config_mut().trim_text(true);

    let mut buf = Vec::new();

    // Current sanction entity state
    let mut in_entity = false;
    let mut logical_id = String::new();
    let mut delisted = false;
    let mut is_person = false;
    let mut aliases: Vec<NameAlias> = Vec::new();
    let mut birthdates: Vec<Date> = Vec::new();

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match e.name().as_ref() {
                    b"sanctionEntity" => {
                        in_entity = true;
                        logical_id = attr(e, b"logicalId").unwrap_or_default();
                        delisted = attr(e, b"delistingDate")
                            .is_some_and(|d| !d.trim().is_empty());
                        is_person = false;
                        aliases.clear();
                        birthdates.clear();
                    }
                    b"subjectType" if in_entity => {
                        is_person = attr(e, b"code").as_deref() == Some("person");
                    }
                    b"nameAlias" if in_entity => {
                        // weak aliases are known noise on this list
                        if attr(e, b"strong").as_deref() == Some("true") {
                            if let Some(alias) = read_alias(e) {
                                aliases.push(alias);
                            }
                        }
                    }
                    b"birthdate" if in_entity => {
                        // only exact dates; year-only records leave the
                        // attribute empty
                        let raw = attr(e, b"birthdate").unwrap_or_default();
                        match raw.parse::<Date>() {
                            Ok(date) => birthdates.push(date),
                            Err(_) if raw.trim().is_empty() => {}
                            Err(err) => {
                                tracing::debug!(
                                    subject = %logical_id,
                                    raw = %raw,
                                    %err,
                                    "skipping unparseable birthdate"
                                );
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"sanctionEntity" && in_entity {
                    in_entity = false;
                    if delisted {
                        tracing::debug!(subject = %logical_id, "skipping delisted entity");
                    } else if aliases.is_empty() {
                        tracing::debug!(subject = %logical_id, "skipping entity without usable alias");
                    } else if is_person {
                        on_subject(Subject::person(
                            logical_id.clone(),
                            std::mem::take(&mut aliases),
                            std::mem::take(&mut birthdates),
                        ));
                    } else {
                        on_subject(Subject::entity(
                            logical_id.clone(),
                            std::mem::take(&mut aliases),
                        ));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(err.into()),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Build a `NameAlias` from a `nameAlias` element.
///
/// The whole name is split on whitespace into parts; a part counts as a first
/// name when it case-insensitively equals one of the `firstName` words. The
/// whole name is never derived by subtracting the first name out of the
/// string.
fn read_alias(e: &BytesStart<'_>) -> Option<NameAlias> {
    let first_name = attr(e, b"firstName").unwrap_or_default();
    let whole_name = attr(e, b"wholeName").unwrap_or_default();

    let whole = if whole_name.trim().is_empty() {
        let last_name = attr(e, b"lastName").unwrap_or_default();
        format!("{first_name} {last_name}")
    } else {
        whole_name
    };

    let first_words: Vec<String> = first_name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();

    let parts: Vec<NamePart> = whole
        .split_whitespace()
        .map(|word| {
            if first_words.contains(&word.to_lowercase()) {
                NamePart::first_name(word)
            } else {
                NamePart::new(word)
            }
        })
        .collect();

    if parts.is_empty() {
        return None;
    }

    let language = attr(e, b"nameLanguage").filter(|l| !l.trim().is_empty());
    let gender = attr(e, b"gender").as_deref().and_then(Gender::from_code);

    Some(NameAlias::new(parts).with_language(language).with_gender(gender))
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}
