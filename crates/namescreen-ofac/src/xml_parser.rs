//! Parser for the OFAC SDN advanced XML.
//!
//! The records of interest follow the structure:
//! ```xml
//! <DistinctParty FixedRef="36">
//!   <Profile ID="36" PartySubTypeID="4">
//!     <Identity>
//!       <Alias AliasTypeID="1403" LowQuality="false">
//!         <DocumentedName>
//!           <DocumentedNamePart>
//!             <NamePartValue ScriptID="215">Saddam</NamePartValue>
//!           </DocumentedNamePart>
//!         </DocumentedName>
//!       </Alias>
//!     </Identity>
//!     <Feature FeatureTypeID="8">
//!       <FeatureVersion ReliabilityID="1562">
//!         <DatePeriod>
//!           <Start><From><Year>1937</Year><Month>4</Month><Day>28</Day></From>
//!                  <To><Year>1937</Year><Month>4</Month><Day>28</Day></To></Start>
//!           <End><From>...</From><To>...</To></End>
//!         </DatePeriod>
//!       </FeatureVersion>
//!     </Feature>
//!   </Profile>
//! </DistinctParty>
//! ```

use std::io::BufRead;

use jiff::civil::Date;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use namescreen_core::{NameAlias, NamePart, Subject};

use crate::OfacError;

/// Profile sub-type for individuals; everything else is screened as an entity.
const PARTY_SUB_TYPE_PERSON: &str = "4";
/// Feature type carrying birthdate periods.
const FEATURE_BIRTHDATE: &str = "8";
/// Reliability id meaning "proven false".
const RELIABILITY_PROVEN_FALSE: &str = "1561";
/// Script id for Latin name part values.
const SCRIPT_LATIN: &str = "215";

/// Accumulates the Year/Month/Day children of one period boundary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct DateParts {
    year: String,
    month: String,
    day: String,
}

impl DateParts {
    fn to_date(&self) -> Option<Date> {
        let year: i16 = self.year.trim().parse().ok()?;
        let month: i8 = self.month.trim().parse().ok()?;
        let day: i8 = self.day.trim().parse().ok()?;
        Date::new(year, month, day).ok()
    }
}

/// Parse an SDN advanced document, calling `on_subject` for each distinct
/// party that has at least one usable Latin alias.
pub fn parse_xml<R: BufRead>(
    reader: R,
    mut on_subject: impl FnMut(Subject),
) -> Result<(), OfacError> {
    let mut xml_reader = Reader::from_reader(reader);
    xml_reader.config_mut().trim_text(true);

    let mut buf = Vec::new();

    // Current party state
    let mut in_party = false;
    let mut fixed_ref = String::new();
    let mut is_person = false;
    let mut aliases: Vec<NameAlias> = Vec::new();
    let mut birthdates: Vec<Date> = Vec::new();

    // Alias nesting
    let mut low_quality = false;
    let mut name_parts: Vec<String> = Vec::new();
    let mut in_name_part_value = false;
    let mut latin_script = false;
    let mut name_text = String::new();

    // Birthdate feature nesting
    let mut in_birthdate_feature = false;
    let mut skip_version = false;
    let mut in_date_period = false;
    let mut in_period_start = false;
    let mut in_from = false;
    // start-from, start-to, end-from, end-to
    let mut boundaries = [
        DateParts::default(),
        DateParts::default(),
        DateParts::default(),
        DateParts::default(),
    ];
    let mut date_field: Option<u8> = None;

    let boundary_index =
        |start: bool, from: bool| -> usize { usize::from(!start) * 2 + usize::from(!from) };

    loop {
        let event = xml_reader.read_event_into(&mut buf);
        match event {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                // text-capturing flags must not be set by self-closing
                // elements, which never produce a matching end event
                let self_closing = matches!(event, Ok(Event::Empty(_)));
                match e.name().as_ref() {
                    b"DistinctParty" => {
                        in_party = true;
                        fixed_ref = attr(e, b"FixedRef").unwrap_or_default();
                        is_person = false;
                        aliases.clear();
                        birthdates.clear();
                    }
                    b"Profile" if in_party => {
                        is_person =
                            attr(e, b"PartySubTypeID").as_deref() == Some(PARTY_SUB_TYPE_PERSON);
                    }
                    b"Alias" if in_party => {
                        low_quality = attr(e, b"LowQuality").as_deref() == Some("true");
                    }
                    b"DocumentedName" if in_party => {
                        name_parts.clear();
                    }
                    b"NamePartValue" if in_party && !self_closing => {
                        in_name_part_value = true;
                        latin_script = attr(e, b"ScriptID").as_deref() == Some(SCRIPT_LATIN);
                        name_text.clear();
                    }
                    b"Feature" if in_party => {
                        in_birthdate_feature =
                            attr(e, b"FeatureTypeID").as_deref() == Some(FEATURE_BIRTHDATE);
                    }
                    b"FeatureVersion" if in_birthdate_feature => {
                        skip_version =
                            attr(e, b"ReliabilityID").as_deref() == Some(RELIABILITY_PROVEN_FALSE);
                    }
                    b"DatePeriod" if in_birthdate_feature && !skip_version => {
                        in_date_period = true;
                        in_period_start = false;
                        in_from = false;
                        boundaries = Default::default();
                    }
                    b"Start" if in_date_period => in_period_start = true,
                    b"End" if in_date_period => in_period_start = false,
                    b"From" if in_date_period => in_from = true,
                    b"To" if in_date_period => in_from = false,
                    b"Year" if in_date_period && !self_closing => date_field = Some(0),
                    b"Month" if in_date_period && !self_closing => date_field = Some(1),
                    b"Day" if in_date_period && !self_closing => date_field = Some(2),
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_name_part_value {
                    name_text.push_str(&e.unescape().unwrap_or_default());
                } else if in_date_period {
                    if let Some(field) = date_field {
                        let boundary = &mut boundaries[boundary_index(in_period_start, in_from)];
                        let target = match field {
                            0 => &mut boundary.year,
                            1 => &mut boundary.month,
                            _ => &mut boundary.day,
                        };
                        target.push_str(&e.unescape().unwrap_or_default());
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"NamePartValue" => {
                    in_name_part_value = false;
                    let value = name_text.trim();
                    if latin_script && !value.is_empty() {
                        name_parts.push(value.to_string());
                    }
                }
                b"DocumentedName" => {
                    if !low_quality && !name_parts.is_empty() {
                        let parts = name_parts.drain(..).map(NamePart::new).collect();
                        aliases.push(NameAlias::new(parts));
                    } else {
                        name_parts.clear();
                    }
                }
                b"Year" | b"Month" | b"Day" => date_field = None,
                b"DatePeriod" if in_date_period => {
                    in_date_period = false;
                    // a period only counts when all four boundaries collapse
                    // onto the same exact calendar date
                    let dates: Vec<Option<Date>> =
                        boundaries.iter().map(DateParts::to_date).collect();
                    if let [Some(a), Some(b), Some(c), Some(d)] = dates[..] {
                        if a == b && b == c && c == d {
                            birthdates.push(a);
                        } else {
                            tracing::debug!(subject = %fixed_ref, "skipping birthdate range");
                        }
                    }
                }
                b"FeatureVersion" => skip_version = false,
                b"Feature" => in_birthdate_feature = false,
                b"DistinctParty" if in_party => {
                    in_party = false;
                    if aliases.is_empty() {
                        tracing::debug!(subject = %fixed_ref, "skipping party without usable alias");
                    } else if is_person {
                        on_subject(Subject::person(
                            fixed_ref.clone(),
                            std::mem::take(&mut aliases),
                            std::mem::take(&mut birthdates),
                        ));
                    } else {
                        on_subject(Subject::entity(
                            fixed_ref.clone(),
                            std::mem::take(&mut aliases),
                        ));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => return Err(err.into()),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(xml: &str) -> Vec<Subject> {
        let mut subjects = Vec::new();
        parse_xml(Cursor::new(xml), |s| subjects.push(s)).unwrap();
        subjects
    }

    fn exact_period(date: &str) -> String {
        let (year, rest) = date.split_once('-').unwrap();
        let (month, day) = rest.split_once('-').unwrap();
        let boundary =
            format!("<Year>{year}</Year><Month>{month}</Month><Day>{day}</Day>");
        format!(
            "<DatePeriod><Start><From>{boundary}</From><To>{boundary}</To></Start>\
             <End><From>{boundary}</From><To>{boundary}</To></End></DatePeriod>"
        )
    }

    fn documented_name(parts: &[&str]) -> String {
        let parts: String = parts
            .iter()
            .map(|p| {
                format!(
                    "<DocumentedNamePart><NamePartValue ScriptID=\"215\">{p}</NamePartValue></DocumentedNamePart>"
                )
            })
            .collect();
        format!("<DocumentedName>{parts}</DocumentedName>")
    }

    #[test]
    fn test_parse_person_with_exact_birthdate() {
        let xml = format!(
            r#"<Sanctions><DistinctParties><DistinctParty FixedRef="36">
  <Profile ID="36" PartySubTypeID="4">
    <Identity>
      <Alias AliasTypeID="1403" LowQuality="false">{name}</Alias>
    </Identity>
    <Feature FeatureTypeID="8">
      <FeatureVersion ReliabilityID="1562">{period}</FeatureVersion>
    </Feature>
  </Profile>
</DistinctParty></DistinctParties></Sanctions>"#,
            name = documented_name(&["Saddam", "Hussein"]),
            period = exact_period("1937-04-28"),
        );

        let subjects = parse(&xml);
        assert_eq!(subjects.len(), 1);
        let subject = &subjects[0];
        assert_eq!(subject.id, "36");
        assert_eq!(subject.kind, namescreen_core::SubjectKind::Person);
        assert_eq!(subject.aliases.len(), 1);
        assert_eq!(subject.aliases[0].full_name(), "Saddam Hussein");
        assert_eq!(subject.birthdates, vec![jiff::civil::date(1937, 4, 28)]);
    }

    #[test]
    fn test_proven_false_birthdate_skipped() {
        let xml = format!(
            r#"<DistinctParty FixedRef="7">
  <Profile PartySubTypeID="4">
    <Identity><Alias LowQuality="false">{name}</Alias></Identity>
    <Feature FeatureTypeID="8">
      <FeatureVersion ReliabilityID="1561">{period}</FeatureVersion>
    </Feature>
  </Profile>
</DistinctParty>"#,
            name = documented_name(&["Anastasiya", "Karpanova"]),
            period = exact_period("1985-03-12"),
        );

        let subjects = parse(&xml);
        assert!(subjects[0].birthdates.is_empty());
    }

    #[test]
    fn test_date_range_discarded() {
        let name = documented_name(&["Anastasiya", "Karpanova"]);
        let xml = format!(
            r#"<DistinctParty FixedRef="7">
  <Profile PartySubTypeID="4">
    <Identity><Alias LowQuality="false">{name}</Alias></Identity>
    <Feature FeatureTypeID="8">
      <FeatureVersion ReliabilityID="1562">
        <DatePeriod>
          <Start><From><Year>1980</Year><Month>1</Month><Day>1</Day></From>
                 <To><Year>1980</Year><Month>1</Month><Day>1</Day></To></Start>
          <End><From><Year>1989</Year><Month>12</Month><Day>31</Day></From>
               <To><Year>1989</Year><Month>12</Month><Day>31</Day></To></End>
        </DatePeriod>
      </FeatureVersion>
    </Feature>
  </Profile>
</DistinctParty>"#
        );

        let subjects = parse(&xml);
        assert!(subjects[0].birthdates.is_empty());
    }

    #[test]
    fn test_low_quality_alias_skipped() {
        let strong = documented_name(&["Anastasiya", "Karpanova"]);
        let weak = documented_name(&["Nastya"]);
        let xml = format!(
            r#"<DistinctParty FixedRef="7">
  <Profile PartySubTypeID="4">
    <Identity>
      <Alias LowQuality="true">{weak}</Alias>
      <Alias LowQuality="false">{strong}</Alias>
    </Identity>
  </Profile>
</DistinctParty>"#
        );

        let subjects = parse(&xml);
        assert_eq!(subjects[0].aliases.len(), 1);
        assert_eq!(subjects[0].aliases[0].full_name(), "Anastasiya Karpanova");
    }

    #[test]
    fn test_non_latin_name_parts_skipped() {
        let xml = r#"<DistinctParty FixedRef="7">
  <Profile PartySubTypeID="4">
    <Identity>
      <Alias LowQuality="false">
        <DocumentedName>
          <DocumentedNamePart><NamePartValue ScriptID="215">Anastasiya</NamePartValue></DocumentedNamePart>
          <DocumentedNamePart><NamePartValue ScriptID="400">Анастасия</NamePartValue></DocumentedNamePart>
        </DocumentedName>
      </Alias>
    </Identity>
  </Profile>
</DistinctParty>"#;

        let subjects = parse(xml);
        assert_eq!(subjects[0].aliases[0].full_name(), "Anastasiya");
    }

    #[test]
    fn test_entity_sub_type() {
        let xml = format!(
            r#"<DistinctParty FixedRef="21">
  <Profile PartySubTypeID="3">
    <Identity><Alias LowQuality="false">{name}</Alias></Identity>
  </Profile>
</DistinctParty>"#,
            name = documented_name(&["Acme", "Trading", "Company"]),
        );

        let subjects = parse(&xml);
        assert_eq!(subjects[0].kind, namescreen_core::SubjectKind::Entity);
    }

    #[test]
    fn test_party_without_alias_skipped() {
        let xml = r#"<DistinctParty FixedRef="9">
  <Profile PartySubTypeID="4"><Identity/></Profile>
</DistinctParty>"#;

        assert!(parse(xml).is_empty());
    }

    #[test]
    fn test_load_reader_splits_kinds() {
        let person = documented_name(&["Anastasiya", "Karpanova"]);
        let entity = documented_name(&["Acme", "Trading"]);
        let xml = format!(
            r#"<Sanctions><DistinctParties>
  <DistinctParty FixedRef="1">
    <Profile PartySubTypeID="4"><Identity><Alias LowQuality="false">{person}</Alias></Identity></Profile>
  </DistinctParty>
  <DistinctParty FixedRef="2">
    <Profile PartySubTypeID="3"><Identity><Alias LowQuality="false">{entity}</Alias></Identity></Profile>
  </DistinctParty>
</DistinctParties></Sanctions>"#
        );

        let lists = crate::load_reader(Cursor::new(xml.as_str())).unwrap();
        assert_eq!(lists.persons.len(), 1);
        assert_eq!(lists.entities.len(), 1);
    }
}
