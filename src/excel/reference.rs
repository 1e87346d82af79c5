//! A1-style cell references: `B7`, `$A$1:$A$3`, `C:C`, `'My Sheet'!A1:A9`

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Zero-based cell coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse `B7` or `$B$7`
    pub fn parse(text: &str) -> Option<Self> {
        let caps = cell_pattern().captures(text.trim())?;
        let col = letters_to_column_index(&caps[1])?;
        let row: u32 = caps[2].parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(Self { row: row - 1, col })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_index_to_letter(self.col), self.row + 1)
    }
}

/// Rectangular range. `end_row == None` means the range runs to the bottom
/// of the sheet (`A:A`, `A2:A`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: Option<u32>,
    pub end_col: u32,
}

impl CellRange {
    pub fn single(cell: CellRef) -> Self {
        Self {
            start_row: cell.row,
            start_col: cell.col,
            end_row: Some(cell.row),
            end_col: cell.col,
        }
    }

    /// Parse `A1`, `A1:B3`, `$A$1:$A$3`, `A:A` or `A2:A`
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (first, second) = match text.split_once(':') {
            Some((a, b)) => (a, Some(b)),
            None => (text, None),
        };

        let (start_col, start_row) = parse_bound(first)?;
        let (end_col, end_row) = match second {
            Some(b) => parse_bound(b)?,
            // A lone `ABC` is a name, not a column
            None if start_row.is_none() => return None,
            None => (start_col, start_row),
        };

        // A bare column on the left (`A:A`) starts at the top of the sheet
        let start_row = start_row.unwrap_or(0);
        let range = Self {
            start_row: start_row.min(end_row.unwrap_or(u32::MAX)),
            start_col: start_col.min(end_col),
            end_row: end_row.map(|r| r.max(start_row)),
            end_col: start_col.max(end_col),
        };
        Some(range)
    }

    /// Parse a space-separated `sqref` list such as `A2:A50 C2:C50 E4`
    pub fn parse_sqref(text: &str) -> Vec<Self> {
        text.split_whitespace().filter_map(Self::parse).collect()
    }

    pub fn is_single_column(&self) -> bool {
        self.start_col == self.end_col
    }

    /// Last row to visit when the range is unbounded, clamped to `limit`
    pub fn last_row(&self, limit: u32) -> u32 {
        self.end_row.map_or(limit, |r| r.min(limit))
    }

    pub fn contains_col(&self, col: u32) -> bool {
        (self.start_col..=self.end_col).contains(&col)
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = column_index_to_letter(self.start_col);
        let end = column_index_to_letter(self.end_col);
        match self.end_row {
            Some(end_row) if end_row == self.start_row && self.is_single_column() => {
                write!(f, "{}{}", start, self.start_row + 1)
            }
            Some(end_row) => write!(f, "{}{}:{}{}", start, self.start_row + 1, end, end_row + 1),
            None => write!(f, "{}:{}", start, end),
        }
    }
}

/// A range optionally qualified by a sheet name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetReference {
    pub sheet: Option<String>,
    pub range: CellRange,
}

impl SheetReference {
    /// Parse `Sheet2!$A$1:$A$3`, `'Sheet Two'!A1:A3` or a bare `A1:A3`
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().trim_start_matches('=');
        match text.rsplit_once('!') {
            Some((sheet, range)) => {
                let sheet = unquote_sheet_name(sheet)?;
                Some(Self {
                    sheet: Some(sheet),
                    range: CellRange::parse(range)?,
                })
            }
            None => Some(Self {
                sheet: None,
                range: CellRange::parse(text)?,
            }),
        }
    }
}

fn unquote_sheet_name(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(inner) = raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return Some(inner.replace("''", "'"));
    }
    if raw.contains('\'') || raw.contains(' ') {
        return None;
    }
    Some(raw.to_string())
}

fn parse_bound(text: &str) -> Option<(u32, Option<u32>)> {
    let caps = bound_pattern().captures(text.trim())?;
    let col = letters_to_column_index(&caps[1])?;
    let row = match caps.get(2) {
        Some(m) => {
            let row: u32 = m.as_str().parse().ok()?;
            if row == 0 {
                return None;
            }
            Some(row - 1)
        }
        None => None,
    };
    Some((col, row))
}

fn cell_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\$?([A-Za-z]{1,3})\$?(\d+)$").expect("valid regex"))
}

fn bound_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\$?([A-Za-z]{1,3})(?:\$?(\d+))?$").expect("valid regex"))
}

/// Convert a zero-based column index to Excel letters
///
/// Examples:
/// - 0 → A
/// - 25 → Z
/// - 26 → AA
pub fn column_index_to_letter(index: u32) -> String {
    let mut result = String::new();
    let mut idx = index;

    loop {
        let remainder = idx % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }

    result
}

/// Inverse of [`column_index_to_letter`]; `None` for non-letters
pub fn letters_to_column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut value: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A' + 1) as u32;
        value = value.checked_mul(26)?.checked_add(digit)?;
    }
    Some(value - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_index_to_letter() {
        assert_eq!(column_index_to_letter(0), "A");
        assert_eq!(column_index_to_letter(1), "B");
        assert_eq!(column_index_to_letter(25), "Z");
        assert_eq!(column_index_to_letter(26), "AA");
        assert_eq!(column_index_to_letter(27), "AB");
        assert_eq!(column_index_to_letter(701), "ZZ");
    }

    #[test]
    fn test_letters_round_trip_through_index() {
        for idx in [0, 1, 25, 26, 51, 52, 701, 702, 16383] {
            let letters = column_index_to_letter(idx);
            assert_eq!(letters_to_column_index(&letters), Some(idx), "{letters}");
        }
        assert_eq!(letters_to_column_index("a"), Some(0));
        assert_eq!(letters_to_column_index(""), None);
        assert_eq!(letters_to_column_index("A1"), None);
    }

    #[test]
    fn test_cell_ref_parse() {
        assert_eq!(CellRef::parse("A1"), Some(CellRef::new(0, 0)));
        assert_eq!(CellRef::parse("$C$5"), Some(CellRef::new(4, 2)));
        assert_eq!(CellRef::parse("A0"), None);
        assert_eq!(CellRef::parse("5A"), None);
        assert_eq!(CellRef::new(4, 2).to_string(), "C5");
    }

    #[test]
    fn test_range_parse_absolute() {
        let range = CellRange::parse("$A$1:$A$3").unwrap();
        assert_eq!(range.start_row, 0);
        assert_eq!(range.end_row, Some(2));
        assert!(range.is_single_column());
        assert_eq!(range.to_string(), "A1:A3");
    }

    #[test]
    fn test_range_parse_whole_column() {
        let range = CellRange::parse("C:C").unwrap();
        assert_eq!(range.start_row, 0);
        assert_eq!(range.end_row, None);
        assert_eq!(range.start_col, 2);
        assert_eq!(range.last_row(10), 10);
    }

    #[test]
    fn test_range_parse_reversed_corners() {
        let range = CellRange::parse("B5:A2").unwrap();
        assert_eq!((range.start_row, range.start_col), (1, 0));
        assert_eq!((range.end_row, range.end_col), (Some(4), 1));
    }

    #[test]
    fn test_parse_sqref_list() {
        let ranges = CellRange::parse_sqref("A2:A50 C2:C50 E4");
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[2], CellRange::single(CellRef::new(3, 4)));
    }

    #[test]
    fn test_sheet_reference_parse() {
        let r = SheetReference::parse("Lists!$A$1:$A$3").unwrap();
        assert_eq!(r.sheet.as_deref(), Some("Lists"));
        assert_eq!(r.range, CellRange::parse("A1:A3").unwrap());

        let r = SheetReference::parse("'Team ''A'' list'!B2:B4").unwrap();
        assert_eq!(r.sheet.as_deref(), Some("Team 'A' list"));

        let r = SheetReference::parse("=$D$2:$D$9").unwrap();
        assert_eq!(r.sheet, None);

        assert!(SheetReference::parse("Two Words!A1").is_none());
        assert!(SheetReference::parse("Abc").is_none());
        assert!(SheetReference::parse("\"Red,Green\"").is_none());
    }
}
