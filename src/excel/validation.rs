//! Dropdown extraction from Excel "list" data validations
//!
//! A list validation's allowed values come from one of a few source shapes.
//! Each shape is a [`ValidationSource`] variant with its own resolver; any
//! rule that fails to resolve degrades to an empty option list.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use tracing::debug;

use super::reference::{CellRange, CellRef, SheetReference};
use super::SheetLayout;
use crate::error::SheetResult;
use crate::types::DropdownMap;

/// Upper bound on per-cell dropdown keys produced by a single rule
const MAX_CELL_KEYS_PER_RULE: u32 = 10_000;

/// A `type="list"` validation as found in the worksheet XML
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRule {
    pub ranges: Vec<CellRange>,
    pub formula: String,
}

/// Where a list rule's allowed values come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationSource {
    /// `"Red,Green,Blue"`
    Literal(Vec<String>),
    /// `$A$1:$A$3` on the sheet that owns the rule
    LocalRange(CellRange),
    /// `Lists!$A$1:$A$3`
    SheetRange { sheet: String, range: CellRange },
    /// A workbook defined name pointing at one of the range forms
    DefinedName(String),
    /// Anything else (`INDIRECT(...)`, `OFFSET(...)`, constants)
    Unsupported(String),
}

/// Reads cell text out of a workbook for range-backed sources
pub trait CellLookup {
    /// Non-empty cell texts in row-major order
    fn range_values(&mut self, sheet: &str, range: &CellRange) -> SheetResult<Vec<String>>;
}

impl ValidationSource {
    pub fn classify(formula: &str) -> Self {
        let formula = formula.trim();
        let formula = formula.strip_prefix('=').unwrap_or(formula).trim();

        if formula.starts_with('"') {
            return match parse_literal_list(formula) {
                Some(items) => ValidationSource::Literal(items),
                None => ValidationSource::Unsupported(formula.to_string()),
            };
        }

        if let Some(reference) = SheetReference::parse(formula) {
            return match reference.sheet {
                Some(sheet) => ValidationSource::SheetRange {
                    sheet,
                    range: reference.range,
                },
                None => ValidationSource::LocalRange(reference.range),
            };
        }

        if is_name(formula) {
            return ValidationSource::DefinedName(formula.to_string());
        }

        ValidationSource::Unsupported(formula.to_string())
    }

    /// Allowed values for this source; `sheet` is the sheet owning the rule
    pub fn resolve(
        &self,
        sheet: &str,
        defined_names: &HashMap<String, String>,
        lookup: &mut dyn CellLookup,
    ) -> SheetResult<Vec<String>> {
        match self {
            ValidationSource::Literal(items) => Ok(items.clone()),
            ValidationSource::LocalRange(range) => lookup.range_values(sheet, range),
            ValidationSource::SheetRange { sheet, range } => lookup.range_values(sheet, range),
            ValidationSource::DefinedName(name) => resolve_defined_name(name, sheet, defined_names, lookup),
            ValidationSource::Unsupported(formula) => {
                debug!(formula = %formula, "unsupported list validation source");
                Ok(Vec::new())
            }
        }
    }
}

fn resolve_defined_name(
    name: &str,
    sheet: &str,
    defined_names: &HashMap<String, String>,
    lookup: &mut dyn CellLookup,
) -> SheetResult<Vec<String>> {
    let Some(target) = defined_names
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
    else {
        debug!(name = %name, "list validation references an unknown defined name");
        return Ok(Vec::new());
    };

    // One level only: a name pointing at another name is not followed
    match ValidationSource::classify(target) {
        source @ (ValidationSource::Literal(_)
        | ValidationSource::LocalRange(_)
        | ValidationSource::SheetRange { .. }) => source.resolve(sheet, defined_names, lookup),
        _ => Ok(Vec::new()),
    }
}

/// `"Red,Green,Blue"` → `["Red", "Green", "Blue"]`. Doubled quotes unescape.
fn parse_literal_list(formula: &str) -> Option<Vec<String>> {
    let inner = formula.strip_prefix('"')?.strip_suffix('"')?;
    let inner = inner.replace("\"\"", "\"");
    Some(
        inner
            .split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
    )
}

fn is_name(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '\\' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

//==============================================================================
// Worksheet XML
//==============================================================================

/// Extract every list-type validation from a worksheet part, covering both
/// the classic `<dataValidation>` element and the `x14` extension form
/// (`<x14:formula1><xm:f>…</xm:f></x14:formula1><xm:sqref>…</xm:sqref>`).
pub fn read_list_rules(xml: &str) -> Result<Vec<ListRule>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut out = Vec::new();

    #[derive(Clone, Copy, PartialEq)]
    enum Capture {
        Formula,
        Sqref,
    }

    struct Current {
        is_list: bool,
        sqref: String,
        formula: String,
    }

    let mut current: Option<Current> = None;
    let mut capture: Option<Capture> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) if e.local_name().as_ref() == b"dataValidation" => {
                let mut cur = Current {
                    is_list: false,
                    sqref: String::new(),
                    formula: String::new(),
                };
                for attr in e.attributes() {
                    let attr = attr?;
                    match attr.key.local_name().as_ref() {
                        b"type" => cur.is_list = attr.unescape_value()? == "list",
                        b"sqref" => cur.sqref = attr.unescape_value()?.into_owned(),
                        _ => {}
                    }
                }
                current = Some(cur);
            }
            Event::Start(e) if current.is_some() => match e.local_name().as_ref() {
                // `formula1` holds the list; `f` is its x14 wrapper content
                b"formula1" | b"f" => capture = Some(Capture::Formula),
                b"sqref" => capture = Some(Capture::Sqref),
                _ => {}
            },
            Event::Text(t) => {
                if let (Some(target), Some(cur)) = (capture, current.as_mut()) {
                    let text = t.unescape()?;
                    match target {
                        Capture::Formula => cur.formula.push_str(&text),
                        Capture::Sqref => {
                            if !cur.sqref.is_empty() {
                                cur.sqref.push(' ');
                            }
                            cur.sqref.push_str(&text);
                        }
                    }
                }
            }
            Event::CData(t) => {
                if let (Some(Capture::Formula), Some(cur)) = (capture, current.as_mut()) {
                    cur.formula.push_str(&String::from_utf8_lossy(t.as_ref()));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"formula1" | b"f" | b"sqref" => capture = None,
                b"dataValidation" => {
                    capture = None;
                    if let Some(cur) = current.take() {
                        if cur.is_list {
                            out.push(ListRule {
                                ranges: CellRange::parse_sqref(&cur.sqref),
                                formula: cur.formula.trim().to_string(),
                            });
                        }
                    }
                }
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

//==============================================================================
// Dropdown Map
//==============================================================================

/// Map each rule onto header keys (rule covers one column's data rows from
/// the top to the bottom of the table) or A1 cell keys (anything narrower).
/// Later rules win on key clashes.
pub fn build_dropdown_map(
    sheet: &str,
    rules: &[ListRule],
    layout: &SheetLayout,
    defined_names: &HashMap<String, String>,
    lookup: &mut dyn CellLookup,
) -> DropdownMap {
    let mut map = DropdownMap::new();

    for rule in rules {
        let source = ValidationSource::classify(&rule.formula);
        let options = match source.resolve(sheet, defined_names, lookup) {
            Ok(options) => options,
            Err(e) => {
                debug!(sheet = %sheet, formula = %rule.formula, error = %e, "list validation did not resolve");
                Vec::new()
            }
        };

        for range in &rule.ranges {
            apply_range(&mut map, range, layout, &options);
        }
    }

    map
}

fn apply_range(map: &mut DropdownMap, range: &CellRange, layout: &SheetLayout, options: &[String]) {
    let first_data_row = layout.first_data_row();

    if covers_whole_column(range, layout) {
        if let Some(header) = layout.header_for(range.start_col) {
            map.insert(header.to_string(), options.to_vec());
            return;
        }
    }

    // Header and title rows never get an input
    let start_row = range.start_row.max(first_data_row);
    let last_row = range.last_row(layout.last_row.max(start_row));
    let mut emitted = 0;
    for row in start_row..=last_row {
        for col in range.start_col..=range.end_col {
            if emitted >= MAX_CELL_KEYS_PER_RULE {
                return;
            }
            map.insert(CellRef::new(row, col).to_string(), options.to_vec());
            emitted += 1;
        }
    }
}

fn covers_whole_column(range: &CellRange, layout: &SheetLayout) -> bool {
    range.is_single_column()
        && range.start_row <= layout.first_data_row()
        && range.end_row.map_or(true, |end| end >= layout.last_row)
}
