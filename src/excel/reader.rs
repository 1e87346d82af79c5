//! Spreadsheet reader - CSV / XLSX / XLS → SheetTable

use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::package::XlsxPackage;
use super::reference::CellRange;
use super::validation::{build_dropdown_map, read_list_rules, CellLookup};
use super::SheetLayout;
use crate::error::{SheetError, SheetResult};
use crate::types::{DropdownMap, FileKind, SheetTable, SheetView};

/// Reads sheets out of a stored upload
pub struct SheetReader {
    path: PathBuf,
    kind: FileKind,
}

impl SheetReader {
    pub fn new<P: AsRef<Path>>(path: P, kind: FileKind) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            kind,
        }
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Sheet names in workbook order. A CSV body is one sheet named after the file stem.
    pub fn sheet_names(&self) -> SheetResult<Vec<String>> {
        self.ensure_exists()?;
        match self.kind {
            FileKind::Csv => Ok(vec![self.csv_sheet_name()]),
            FileKind::Xlsx | FileKind::Xls => {
                let workbook = self.open_workbook()?;
                Ok(workbook.sheet_names())
            }
        }
    }

    /// Read one sheet into a table plus the layout needed to write it back
    pub fn read_table(&self, sheet: &str) -> SheetResult<(SheetTable, SheetLayout)> {
        self.ensure_exists()?;
        match self.kind {
            FileKind::Csv => {
                if sheet != self.csv_sheet_name() {
                    return Err(sheet_not_found(sheet));
                }
                self.read_csv()
            }
            FileKind::Xlsx | FileKind::Xls => {
                let mut workbook = self.open_workbook()?;
                if !workbook.sheet_names().iter().any(|s| s == sheet) {
                    return Err(sheet_not_found(sheet));
                }
                let range = workbook.worksheet_range(sheet)?;
                Ok(table_from_range(&range))
            }
        }
    }

    /// Dropdown options from the sheet's list validations. Never fails on
    /// malformed rules; only `.xlsx` carries validations.
    pub fn read_dropdowns(&self, sheet: &str, layout: &SheetLayout) -> SheetResult<DropdownMap> {
        if !self.kind.has_validations() {
            return Ok(DropdownMap::new());
        }

        let mut package = match XlsxPackage::open(&self.path) {
            Ok(package) => package,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot scan data validations");
                return Ok(DropdownMap::new());
            }
        };

        let rules = match package.worksheet_xml(sheet).and_then(|xml| {
            read_list_rules(&xml).map_err(|e| SheetError::Parse(e.to_string()))
        }) {
            Ok(rules) => rules,
            Err(e) => {
                warn!(sheet = %sheet, error = %e, "cannot read data validations");
                return Ok(DropdownMap::new());
            }
        };
        debug!(sheet = %sheet, rules = rules.len(), "list validations found");

        if rules.is_empty() {
            return Ok(DropdownMap::new());
        }

        let mut lookup = WorkbookLookup::new(self.open_workbook()?);
        Ok(build_dropdown_map(
            sheet,
            &rules,
            layout,
            package.defined_names(),
            &mut lookup,
        ))
    }

    /// Table and dropdowns in one payload
    pub fn read_view(&self, sheet: &str) -> SheetResult<SheetView> {
        let (table, layout) = self.read_table(sheet)?;
        let dropdowns = self.read_dropdowns(sheet, &layout)?;
        Ok(SheetView::new(table, dropdowns).with_positions(&layout))
    }

    fn ensure_exists(&self) -> SheetResult<()> {
        if self.path.is_file() {
            Ok(())
        } else {
            Err(SheetError::not_found("File not found"))
        }
    }

    fn open_workbook(&self) -> SheetResult<Sheets<BufReader<File>>> {
        open_workbook_auto(&self.path).map_err(SheetError::from)
    }

    fn csv_sheet_name(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Sheet1")
            .to_string()
    }

    fn read_csv(&self) -> SheetResult<(SheetTable, SheetLayout)> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;

        let mut records = reader.records();
        let header = match records.next() {
            Some(record) => record?,
            None => return Ok((SheetTable::default(), SheetLayout::default())),
        };

        let raw: Vec<String> = header
            .iter()
            .enumerate()
            .map(|(i, h)| {
                if i == 0 {
                    h.trim_start_matches('\u{feff}').to_string()
                } else {
                    h.to_string()
                }
            })
            .collect();
        let columns = unique_headers(raw);
        let mut table = SheetTable::new(columns.clone());

        let mut last_row = 0u32;
        let mut data_rows = Vec::new();
        for (idx, record) in records.enumerate() {
            let record = record?;
            last_row = idx as u32 + 1;
            let values: Vec<String> = record.iter().map(str::to_string).collect();
            if values.iter().all(|v| v.trim().is_empty()) {
                continue;
            }
            table.push_values(values);
            data_rows.push(last_row);
        }

        let layout = SheetLayout {
            header_row: 0,
            first_col: 0,
            columns,
            last_row,
            data_rows,
        };
        Ok((table, layout))
    }
}

fn sheet_not_found(sheet: &str) -> SheetError {
    SheetError::not_found(format!("Sheet '{}' not found", sheet))
}

/// Materialize a calamine range: first used row is the header, wholly empty rows are skipped
fn table_from_range(range: &Range<Data>) -> (SheetTable, SheetLayout) {
    let (Some((r0, c0)), Some((r1, c1))) = (range.start(), range.end()) else {
        return (SheetTable::default(), SheetLayout::default());
    };

    let raw: Vec<String> = (c0..=c1)
        .map(|c| range.get_value((r0, c)).map(cell_text).unwrap_or_default())
        .collect();
    let columns = unique_headers(raw);
    let mut table = SheetTable::new(columns.clone());
    let mut data_rows = Vec::new();

    for r in (r0 + 1)..=r1 {
        let values: Vec<String> = (c0..=c1)
            .map(|c| range.get_value((r, c)).map(cell_text).unwrap_or_default())
            .collect();
        if values.iter().all(|v| v.is_empty()) {
            continue;
        }
        table.push_values(values);
        data_rows.push(r);
    }

    let layout = SheetLayout {
        header_row: r0,
        first_col: c0,
        columns,
        last_row: r1,
        data_rows,
    };
    (table, layout)
}

/// Blank headers become `col_<n>` (1-based), repeats get `.1`, `.2`, …
fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    raw.into_iter()
        .enumerate()
        .map(|(i, header)| {
            let base = match header.trim() {
                "" => format!("col_{}", i + 1),
                trimmed => trimmed.to_string(),
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            name
        })
        .collect()
}

/// Render a cell the way it is shown to (and round-tripped from) the browser
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_number(*f),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) if value.time() == chrono::NaiveTime::MIN => {
                value.format("%Y-%m-%d").to_string()
            }
            Some(value) => value.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => format_number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => e.to_string(),
    }
}

/// Integral floats print without a trailing `.0`
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Cell lookups against an open workbook, caching each sheet's range
struct WorkbookLookup {
    workbook: Sheets<BufReader<File>>,
    ranges: HashMap<String, Range<Data>>,
}

impl WorkbookLookup {
    fn new(workbook: Sheets<BufReader<File>>) -> Self {
        Self {
            workbook,
            ranges: HashMap::new(),
        }
    }
}

impl CellLookup for WorkbookLookup {
    fn range_values(&mut self, sheet: &str, range: &CellRange) -> SheetResult<Vec<String>> {
        if !self.ranges.contains_key(sheet) {
            let loaded = self.workbook.worksheet_range(sheet)?;
            self.ranges.insert(sheet.to_string(), loaded);
        }
        let Some(data) = self.ranges.get(sheet) else {
            return Ok(Vec::new());
        };
        let Some((bottom, _)) = data.end() else {
            return Ok(Vec::new());
        };

        let mut values = Vec::new();
        for row in range.start_row..=range.last_row(bottom) {
            for col in range.start_col..=range.end_col {
                if let Some(text) = data.get_value((row, col)).map(cell_text) {
                    if !text.trim().is_empty() {
                        values.push(text);
                    }
                }
            }
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-42.0), "-42");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(0.1), "0.1");
    }

    #[test]
    fn test_cell_text_variants() {
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("x".into())), "x");
        assert_eq!(cell_text(&Data::Int(7)), "7");
        assert_eq!(cell_text(&Data::Float(2.0)), "2");
        assert_eq!(cell_text(&Data::Bool(true)), "TRUE");
    }

    #[test]
    fn test_unique_headers() {
        let out = unique_headers(vec![
            "Name".into(),
            "".into(),
            "Name".into(),
            " Qty ".into(),
        ]);
        assert_eq!(out, vec!["Name", "col_2", "Name.1", "Qty"]);
    }

    #[test]
    fn test_table_from_range_skips_blank_rows() {
        let mut range: Range<Data> = Range::new((1, 1), (4, 2));
        range.set_value((1, 1), Data::String("A".into()));
        range.set_value((1, 2), Data::String("B".into()));
        range.set_value((2, 1), Data::Float(1.0));
        range.set_value((2, 2), Data::String("x".into()));
        range.set_value((4, 2), Data::String("y".into()));

        let (table, layout) = table_from_range(&range);
        assert_eq!(table.columns, vec!["A", "B"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0]["A"], "1");
        assert_eq!(table.rows[1]["A"], "");
        assert_eq!(table.rows[1]["B"], "y");
        assert_eq!(layout.header_row, 1);
        assert_eq!(layout.first_col, 1);
        assert_eq!(layout.last_row, 4);
        assert_eq!(layout.data_rows, vec![2, 4]);
    }
}
