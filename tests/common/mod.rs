//! Fixture workbooks shared by the integration tests

#![allow(dead_code)]

use royalbit_sheetdesk::types::Row;
use rust_xlsxwriter::{DataValidation, Formula, Workbook};
use std::path::Path;

/// `Sheet1`: Name | Status | Qty with a "Red,Green,Blue" list on Status;
/// `Sheet2`: a single Other column
pub fn colors_workbook(path: &Path) {
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Sheet1").unwrap();
    sheet.write_string(0, 0, "Name").unwrap();
    sheet.write_string(0, 1, "Status").unwrap();
    sheet.write_string(0, 2, "Qty").unwrap();
    sheet.write_string(1, 0, "Widget").unwrap();
    sheet.write_string(1, 1, "Red").unwrap();
    sheet.write_number(1, 2, 3).unwrap();
    sheet.write_string(2, 0, "Gadget").unwrap();
    sheet.write_string(2, 1, "Blue").unwrap();
    sheet.write_number(2, 2, 5).unwrap();

    let colors = DataValidation::new()
        .allow_list_strings(&["Red", "Green", "Blue"])
        .unwrap();
    sheet.add_data_validation(1, 1, 99, 1, &colors).unwrap();

    let other = workbook.add_worksheet();
    other.set_name("Sheet2").unwrap();
    other.write_string(0, 0, "Other").unwrap();
    other.write_string(1, 0, "x").unwrap();

    workbook.save(path).unwrap();
}

/// `Data`: Item | Category with Category validated against `Lists!$A$1:$A$3`
pub fn cross_sheet_workbook(path: &Path) {
    let mut workbook = Workbook::new();

    let data = workbook.add_worksheet();
    data.set_name("Data").unwrap();
    data.write_string(0, 0, "Item").unwrap();
    data.write_string(0, 1, "Category").unwrap();
    data.write_string(1, 0, "Apple").unwrap();
    data.write_string(1, 1, "Fruit").unwrap();

    let categories = DataValidation::new().allow_list_formula(Formula::new("=Lists!$A$1:$A$3"));
    data.add_data_validation(1, 1, 49, 1, &categories).unwrap();

    let lists = workbook.add_worksheet();
    lists.set_name("Lists").unwrap();
    lists.write_string(0, 0, "Fruit").unwrap();
    lists.write_string(1, 0, "Vegetable").unwrap();
    lists.write_string(2, 0, "Grain").unwrap();

    workbook.save(path).unwrap();
}

/// `Tasks`: Task | Status with five data rows and a list on `B2:B3` only
pub fn partial_rule_workbook(path: &Path) {
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Tasks").unwrap();
    sheet.write_string(0, 0, "Task").unwrap();
    sheet.write_string(0, 1, "Status").unwrap();
    for i in 1..=5u32 {
        sheet.write_string(i, 0, format!("task {}", i)).unwrap();
        sheet.write_string(i, 1, "Open").unwrap();
    }

    let status = DataValidation::new()
        .allow_list_strings(&["Open", "Done"])
        .unwrap();
    sheet.add_data_validation(1, 1, 2, 1, &status).unwrap();

    workbook.save(path).unwrap();
}

/// `Report`: header Item | Status at B3, data on rows 4 and 6 (row 5 blank)
/// and a list on the single cell C6
pub fn offset_table_workbook(path: &Path) {
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Report").unwrap();
    sheet.write_string(2, 1, "Item").unwrap();
    sheet.write_string(2, 2, "Status").unwrap();
    sheet.write_string(3, 1, "Bolt").unwrap();
    sheet.write_string(3, 2, "Open").unwrap();
    sheet.write_string(5, 1, "Nut").unwrap();
    sheet.write_string(5, 2, "Closed").unwrap();

    let status = DataValidation::new()
        .allow_list_strings(&["Open", "Closed"])
        .unwrap();
    sheet.add_data_validation(5, 2, 5, 2, &status).unwrap();

    workbook.save(path).unwrap();
}

pub fn row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
