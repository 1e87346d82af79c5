//! Minimal OOXML package access for `.xlsx` files
//!
//! calamine does not expose data validations, so the worksheet XML part is
//! read straight out of the zip container. Only the workbook sheet list, the
//! workbook relationships and defined names are parsed here.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use zip::ZipArchive;

use crate::error::{SheetError, SheetResult};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";

/// Cap for any single XML part we inflate
const MAX_PART_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub name: String,
    pub sheet_id: Option<u32>,
    pub rel_id: Option<String>,
}

/// Opened `.xlsx` container with the workbook part already parsed
pub struct XlsxPackage {
    archive: ZipArchive<BufReader<File>>,
    sheets: Vec<SheetEntry>,
    defined_names: HashMap<String, String>,
    relationships: HashMap<String, String>,
}

impl XlsxPackage {
    pub fn open<P: AsRef<Path>>(path: P) -> SheetResult<Self> {
        let file = File::open(path.as_ref())?;
        let mut archive = ZipArchive::new(BufReader::new(file))
            .map_err(|e| SheetError::Parse(format!("not a valid xlsx container: {}", e)))?;

        let workbook_xml = read_part(&mut archive, WORKBOOK_PART)?
            .ok_or_else(|| SheetError::Parse(format!("missing {}", WORKBOOK_PART)))?;
        let (sheets, defined_names) = parse_workbook(&workbook_xml)
            .map_err(|e| SheetError::Parse(format!("{}: {}", WORKBOOK_PART, e)))?;

        let relationships = match read_part(&mut archive, WORKBOOK_RELS_PART)? {
            Some(xml) => parse_relationships(&xml).unwrap_or_default(),
            None => HashMap::new(),
        };

        Ok(Self {
            archive,
            sheets,
            defined_names,
            relationships,
        })
    }

    pub fn sheets(&self) -> &[SheetEntry] {
        &self.sheets
    }

    /// Workbook-level defined names (`name -> formula text`)
    pub fn defined_names(&self) -> &HashMap<String, String> {
        &self.defined_names
    }

    /// Part name of the worksheet for `sheet`, following the workbook rels and
    /// falling back to the `sheet{sheetId}.xml` convention.
    pub fn worksheet_part(&self, sheet: &str) -> Option<String> {
        let entry = self.sheets.iter().find(|s| s.name == sheet)?;

        if let Some(target) = entry
            .rel_id
            .as_ref()
            .and_then(|id| self.relationships.get(id))
        {
            return Some(resolve_target("xl", target));
        }

        entry
            .sheet_id
            .map(|id| format!("xl/worksheets/sheet{}.xml", id))
    }

    /// Raw XML of the worksheet named `sheet`
    pub fn worksheet_xml(&mut self, sheet: &str) -> SheetResult<String> {
        let part = self
            .worksheet_part(sheet)
            .ok_or_else(|| SheetError::not_found(format!("Sheet '{}' not found", sheet)))?;
        read_part(&mut self.archive, &part)?
            .ok_or_else(|| SheetError::Parse(format!("missing worksheet part {}", part)))
    }
}

fn read_part(archive: &mut ZipArchive<BufReader<File>>, name: &str) -> SheetResult<Option<String>> {
    let file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(SheetError::Parse(format!("{}: {}", name, e))),
    };

    let mut xml = String::new();
    file.take(MAX_PART_BYTES).read_to_string(&mut xml)?;
    Ok(Some(xml))
}

/// Resolve a relationship target relative to the source part folder
fn resolve_target(base_dir: &str, target: &str) -> String {
    let target = target.split_once('#').map_or(target, |(base, _)| base);
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn parse_workbook(
    xml: &str,
) -> Result<(Vec<SheetEntry>, HashMap<String, String>), quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut sheets = Vec::new();
    let mut names = HashMap::new();
    let mut current_name: Option<String> = None;
    let mut current_text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let mut entry = SheetEntry {
                    name: String::new(),
                    sheet_id: None,
                    rel_id: None,
                };
                for attr in e.attributes() {
                    let attr = attr?;
                    let val = attr.unescape_value()?.into_owned();
                    match attr.key.local_name().as_ref() {
                        b"name" => entry.name = val,
                        b"sheetId" => entry.sheet_id = val.parse().ok(),
                        b"id" => entry.rel_id = Some(val),
                        _ => {}
                    }
                }
                if !entry.name.is_empty() {
                    sheets.push(entry);
                }
            }
            Event::Start(e) if e.local_name().as_ref() == b"definedName" => {
                current_name = None;
                current_text.clear();
                for attr in e.attributes() {
                    let attr = attr?;
                    if attr.key.local_name().as_ref() == b"name" {
                        current_name = Some(attr.unescape_value()?.into_owned());
                    }
                }
            }
            Event::Text(t) if current_name.is_some() => {
                current_text.push_str(&t.unescape()?);
            }
            Event::End(e) if e.local_name().as_ref() == b"definedName" => {
                if let Some(name) = current_name.take() {
                    names
                        .entry(name)
                        .or_insert_with(|| current_text.trim().to_string());
                }
                current_text.clear();
            }
            _ => {}
        }
        buf.clear();
    }

    Ok((sheets, names))
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut out = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut target = None;
                let mut external = false;
                for attr in e.attributes() {
                    let attr = attr?;
                    let val = attr.unescape_value()?.into_owned();
                    match attr.key.local_name().as_ref() {
                        b"Id" => id = Some(val),
                        b"Target" => target = Some(val),
                        b"TargetMode" => external = val.eq_ignore_ascii_case("External"),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target), false) = (id, target, external) {
                    out.insert(id, target);
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target_relative_and_absolute() {
        assert_eq!(
            resolve_target("xl", "worksheets/sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(
            resolve_target("xl", "/xl/worksheets/sheet2.xml"),
            "xl/worksheets/sheet2.xml"
        );
        assert_eq!(resolve_target("xl", "../custom/sheet.xml"), "custom/sheet.xml");
    }

    #[test]
    fn test_parse_workbook_sheets_and_names() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
          xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="Data" sheetId="1" r:id="rId1"/>
    <sheet name="Lists &amp; Codes" sheetId="2" r:id="rId2"/>
  </sheets>
  <definedNames>
    <definedName name="Colors">'Lists &amp; Codes'!$A$1:$A$3</definedName>
  </definedNames>
</workbook>"#;
        let (sheets, names) = parse_workbook(xml).unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[1].name, "Lists & Codes");
        assert_eq!(sheets[1].sheet_id, Some(2));
        assert_eq!(sheets[0].rel_id.as_deref(), Some("rId1"));
        assert_eq!(names["Colors"], "'Lists & Codes'!$A$1:$A$3");
    }

    #[test]
    fn test_parse_relationships_skips_external() {
        let xml = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId9" Type="hyperlink" Target="https://example.com" TargetMode="External"/>
</Relationships>"#;
        let rels = parse_relationships(xml).unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels["rId1"], "worksheets/sheet1.xml");
    }
}
