//! BioC XML full-text parsing.
//!
//! A BioC collection is a flat list of `passage` elements. Each passage
//! carries `infon` key/value pairs (most importantly `section_type`) and a
//! `text` element. Passages are bucketed into the canonical sections by
//! their label; `REF` passages become bibliography entries.

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;

use crate::models::{ArticleSections, FullTextDocument, Section};
use crate::sources::SourceError;
use crate::utils::clean_section_text;

const SECTION_TYPE: &str = "section_type";
const REFERENCE_LABEL: &str = "REF";

/// One `passage` element as read from the document
#[derive(Debug, Default)]
struct Passage {
    infons: Vec<(String, String)>,
    text: Option<String>,
}

impl Passage {
    fn infon(&self, key: &str) -> Option<&str> {
        self.infons
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse a BioC XML document into sections and references.
///
/// Malformed XML is an error; passages without a section label or text are
/// skipped, as are labels that match no canonical section.
pub fn parse_bioc_xml(xml: &str) -> Result<FullTextDocument, SourceError> {
    // Untrimmed, so whitespace between text and CDATA chunks survives
    let mut reader = Reader::from_str(xml);

    let mut sections = ArticleSections::new();
    let mut references = Vec::new();

    let mut passage: Option<Passage> = None;
    let mut infon_key: Option<String> = None;
    let mut infon_value = String::new();
    let mut in_text = false;
    let mut seen_root = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                seen_root = true;
                match e.name().as_ref() {
                    b"passage" => passage = Some(Passage::default()),
                    b"infon" if passage.is_some() => {
                        infon_key = get_attr(e, "key");
                        infon_value.clear();
                    }
                    b"text" => {
                        if let Some(p) = passage.as_mut() {
                            in_text = true;
                            p.text.get_or_insert_with(String::new);
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(ref e) => {
                seen_root = true;
                match e.name().as_ref() {
                    b"infon" => {
                        if let (Some(p), Some(key)) = (passage.as_mut(), get_attr(e, "key")) {
                            p.infons.push((key, String::new()));
                        }
                    }
                    b"text" => {
                        if let Some(p) = passage.as_mut() {
                            p.text.get_or_insert_with(String::new);
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(ref e) => {
                let text = text_content(e);
                capture(&mut passage, &infon_key, &mut infon_value, in_text, &text);
            }
            Event::CData(ref e) => {
                let text = String::from_utf8_lossy(e).into_owned();
                capture(&mut passage, &infon_key, &mut infon_value, in_text, &text);
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"infon" => {
                    if let (Some(p), Some(key)) = (passage.as_mut(), infon_key.take()) {
                        let value = std::mem::take(&mut infon_value);
                        p.infons.push((key, value.trim().to_string()));
                    }
                }
                b"text" => in_text = false,
                b"passage" => {
                    if let Some(p) = passage.take() {
                        collect_passage(p, &mut sections, &mut references);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(SourceError::Parse("empty BioC document".to_string()));
    }

    Ok(FullTextDocument {
        sections,
        references,
    })
}

fn capture(
    passage: &mut Option<Passage>,
    infon_key: &Option<String>,
    infon_value: &mut String,
    in_text: bool,
    text: &str,
) {
    let Some(p) = passage.as_mut() else {
        return;
    };
    if infon_key.is_some() {
        infon_value.push_str(text);
    } else if in_text {
        if let Some(body) = p.text.as_mut() {
            body.push_str(text);
        }
    }
}

fn collect_passage(passage: Passage, sections: &mut ArticleSections, references: &mut Vec<String>) {
    let (Some(label), Some(text)) = (passage.infon(SECTION_TYPE), passage.text.as_deref()) else {
        return;
    };

    if label.trim().eq_ignore_ascii_case(REFERENCE_LABEL) {
        if let Some(entry) = format_reference(&passage, text) {
            references.push(entry);
        }
        return;
    }

    match Section::classify(label) {
        Some(section) => sections.append(section, &clean_section_text(text)),
        None => tracing::trace!("Dropping passage with section type {:?}", label),
    }
}

/// `"<authors> (<year>). <title>. <source>."`, or `None` when authors,
/// title or year are missing
fn format_reference(passage: &Passage, text: &str) -> Option<String> {
    let mut names: Vec<(usize, String)> = passage
        .infons
        .iter()
        .filter_map(|(key, value)| {
            let index = key.strip_prefix("name_")?.parse::<usize>().ok()?;
            let name = format_person(value)?;
            Some((index, name))
        })
        .collect();
    names.sort_by_key(|(index, _)| *index);

    let title = clean_section_text(text);
    let year = passage.infon("year").map(str::trim).unwrap_or_default();
    if names.is_empty() || title.is_empty() || year.is_empty() {
        return None;
    }

    let authors = names
        .into_iter()
        .map(|(_, name)| name)
        .collect::<Vec<_>>()
        .join(", ");
    let title = title.trim_end_matches('.');

    let entry = match passage.infon("source").map(str::trim).filter(|s| !s.is_empty()) {
        Some(source) => format!("{} ({}). {}. {}.", authors, year, title, source),
        None => format!("{} ({}). {}.", authors, year, title),
    };
    Some(entry)
}

/// `surname:Smith;given-names:John A` becomes `Smith John A`
fn format_person(value: &str) -> Option<String> {
    let mut surname = None;
    let mut given = None;
    for part in value.split(';') {
        match part.split_once(':') {
            Some(("surname", v)) => surname = Some(v.trim()),
            Some(("given-names", v)) => given = Some(v.trim()),
            _ => {}
        }
    }

    match (surname.filter(|s| !s.is_empty()), given.filter(|g| !g.is_empty())) {
        (Some(s), Some(g)) => Some(format!("{} {}", s, g)),
        (Some(s), None) => Some(s.to_string()),
        (None, Some(g)) => Some(g.to_string()),
        (None, None) => None,
    }
}

/// Unescaped text of a node, falling back to the raw bytes on bad escapes
pub(super) fn text_content(e: &BytesText<'_>) -> String {
    e.unescape()
        .map(|t| t.into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(e).into_owned())
}

pub(super) fn get_attr(e: &BytesStart<'_>, attr_name: &str) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == attr_name.as_bytes())
        .map(|a| String::from_utf8_lossy(a.value.as_ref()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE collection SYSTEM "BioC.dtd">
<collection>
  <source>PMC</source>
  <document>
    <id>PMC123</id>
    <infon key="license">CC BY</infon>
    <passage>
      <infon key="section_type">TITLE</infon>
      <offset>0</offset>
      <text>Gut microbiome and ageing</text>
    </passage>
    <passage>
      <infon key="section_type">ABSTRACT</infon>
      <offset>30</offset>
      <text>We profiled the gut microbiome .Diversity declined.</text>
    </passage>
    <passage>
      <infon key="section_type">ABSTRACT</infon>
      <text>Second paragraph &amp; more.</text>
    </passage>
    <passage>
      <infon key="section_type">METHODS</infon>
      <text>Stool samples were
        sequenced.</text>
    </passage>
    <passage>
      <infon key="section_type">DISCUSS</infon>
      <text>Results suggest a link.</text>
    </passage>
    <passage>
      <infon key="section_type">INTRO</infon>
    </passage>
    <passage>
      <text>Unlabelled passage.</text>
    </passage>
    <passage>
      <infon key="section_type">REF</infon>
      <infon key="name_1">surname:Doe;given-names:Jane</infon>
      <infon key="name_0">surname:Smith;given-names:John</infon>
      <infon key="year">2020</infon>
      <infon key="source">Nature</infon>
      <text>Microbes in health</text>
    </passage>
    <passage>
      <infon key="section_type">REF</infon>
      <infon key="source">Cell</infon>
      <text>No authors here</text>
    </passage>
  </document>
</collection>"#;

    #[test]
    fn test_parse_sections() {
        let doc = parse_bioc_xml(SAMPLE).unwrap();

        assert_eq!(
            doc.sections.get(Section::Abstract),
            "We profiled the gut microbiome. Diversity declined. Second paragraph & more."
        );
        assert_eq!(doc.sections.get(Section::Methods), "Stool samples were sequenced.");
        assert_eq!(doc.sections.get(Section::Discussion), "Results suggest a link.");
        assert_eq!(doc.sections.get(Section::Introduction), "");
        assert_eq!(doc.sections.get(Section::Results), "");
        assert_eq!(doc.sections.filled_count(), 3);
        assert!((doc.sections.completeness_ratio() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_references() {
        let doc = parse_bioc_xml(SAMPLE).unwrap();
        assert_eq!(
            doc.references,
            vec!["Smith John, Doe Jane (2020). Microbes in health. Nature.".to_string()]
        );
    }

    #[test]
    fn test_label_order_first_match_wins() {
        let xml = r#"<collection><document>
            <passage><infon key="section_type">RESULTS_DISCUSSION</infon><text>Both.</text></passage>
            <passage><infon key="section_type">CONCL</infon><text>Done.</text></passage>
        </document></collection>"#;

        let doc = parse_bioc_xml(xml).unwrap();
        assert_eq!(doc.sections.get(Section::Results), "Both.");
        assert_eq!(doc.sections.get(Section::Discussion), "");
        assert_eq!(doc.sections.get(Section::Conclusion), "Done.");
    }

    #[test]
    fn test_mixed_text_and_cdata_are_joined_as_written() {
        let xml = r#"<collection><document>
            <passage>
              <infon key="section_type"> METHODS </infon>
              <text>16S<![CDATA[rRNA]]> gene <![CDATA[sequencing & ]]>assembly.</text>
            </passage>
            <passage>
              <infon key="section_type">RESULTS</infon>
              <text>Taxa <![CDATA[declined]]></text>
            </passage>
        </document></collection>"#;

        let doc = parse_bioc_xml(xml).unwrap();
        assert_eq!(doc.sections.get(Section::Methods), "16SrRNA gene sequencing & assembly.");
        assert_eq!(doc.sections.get(Section::Results), "Taxa declined");
    }

    #[test]
    fn test_no_passages_gives_empty_sections() {
        let doc = parse_bioc_xml("<collection><document/></collection>").unwrap();
        assert_eq!(doc.sections.filled_count(), 0);
        assert!(doc.references.is_empty());
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        let result = parse_bioc_xml("<collection><passage></document></collection>");
        assert!(matches!(result, Err(SourceError::Parse(_))));

        let result = parse_bioc_xml("");
        assert!(matches!(result, Err(SourceError::Parse(_))));
    }

    #[test]
    fn test_format_person() {
        assert_eq!(
            format_person("surname:Lee;given-names:K"),
            Some("Lee K".to_string())
        );
        assert_eq!(format_person("surname:Lee"), Some("Lee".to_string()));
        assert_eq!(format_person("collab"), None);
    }
}
