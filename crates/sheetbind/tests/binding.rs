//! Properties of list bindings over a realistic template

use pretty_assertions::assert_eq;
use sheetbind::prelude::*;

/// Quotation template:
/// - row 1: header
/// - rows 3-4: block "row" (item ref on A3, description on B3, quantity on
///   C3, a merged note across A4:C4)
/// - row 6: totals line
fn quotation() -> Workbook {
    let mut wb = Workbook::new();
    wb.define_name("row", "Sheet1!$A$3:$C$4").unwrap();
    wb.define_name("itemRef", "Sheet1!$A$3").unwrap();
    wb.define_name("desc", "Sheet1!$B$3").unwrap();
    wb.define_name("quantity", "Sheet1!$C$3").unwrap();

    let bold = wb.intern_style(Style::new().bold(true));
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", "Quotation").unwrap();
    sheet.set_cell_value("A3", "<ref>").unwrap();
    sheet.set_cell_value("B3", "<desc>").unwrap();
    sheet.set_cell_value("C3", 0.0).unwrap();
    sheet.set_cell_style("A3", bold).unwrap();
    sheet.set_cell_value("A4", "note").unwrap();
    sheet.merge_cells(&CellRange::parse("A4:C4").unwrap()).unwrap();
    // partly inside the block: must not be replicated
    sheet.merge_cells(&CellRange::parse("E4:E5").unwrap()).unwrap();
    sheet.set_cell_value("A6", "Total").unwrap();
    sheet.set_cell_value("C6", 42.0).unwrap();
    wb
}

#[derive(Debug, Clone)]
struct Item {
    item_ref: &'static str,
    desc: &'static str,
    quantity: f64,
}

fn items() -> Vec<Item> {
    vec![
        Item { item_ref: "A", desc: "Ceiling fan", quantity: 3.0 },
        Item { item_ref: "B", desc: "Wall lamp", quantity: 1.0 },
        Item { item_ref: "C", desc: "Desk", quantity: 2.0 },
    ]
}

fn fill_item(mut range: RangeMut<'_>, item: &Item) -> Result<()> {
    range.set_value("itemRef", item.item_ref)?;
    range.set_value("desc", item.desc)?;
    range.set_value("quantity", item.quantity)
}

#[test]
fn test_end_to_end_three_records() {
    let mut wb = quotation();
    let mut shifts = Vec::new();
    bind_vertical_insert(&mut wb, 0, "row", 0, &items(), |range, item| {
        shifts.push((item.item_ref, range.range().shift_y()));
        fill_item(range, item)
    })
    .unwrap();

    // clones first, template last
    assert_eq!(shifts, vec![("B", 2), ("C", 4), ("A", 0)]);

    let sheet = wb.worksheet(0).unwrap();
    assert_eq!(sheet.get_value("A3").unwrap(), CellValue::string("A"));
    assert_eq!(sheet.get_value("A5").unwrap(), CellValue::string("B"));
    assert_eq!(sheet.get_value("B5").unwrap(), CellValue::string("Wall lamp"));
    assert_eq!(sheet.get_value("A7").unwrap(), CellValue::string("C"));
    assert_eq!(sheet.get_value("C7").unwrap(), CellValue::Number(2.0));

    // the totals line moved down by 2 rows x 2 clones
    assert_eq!(sheet.get_value("A10").unwrap(), CellValue::string("Total"));
    assert_eq!(sheet.get_value("C10").unwrap(), CellValue::Number(42.0));
    assert_eq!(sheet.get_value("A1").unwrap(), CellValue::string("Quotation"));
}

#[test]
fn test_offset_invariant() {
    for n in 1..=5usize {
        let mut wb = quotation();
        let records: Vec<usize> = (0..n).collect();
        let mut seen = Vec::new();
        bind_vertical_insert(&mut wb, 0, "row", 0, &records, |range, k| {
            seen.push((*k, range.range().shift_y()));
            Ok(())
        })
        .unwrap();

        seen.sort();
        let expected: Vec<(usize, i64)> = (0..n).map(|k| (k, 2 * k as i64)).collect();
        assert_eq!(seen, expected);
    }
}

#[test]
fn test_every_clone_starts_pristine() {
    let mut wb = quotation();
    bind_vertical_insert(&mut wb, 0, "row", 0, &items(), |mut range, item| {
        assert_eq!(range.cell("itemRef")?.value, CellValue::string("<ref>"));
        assert_eq!(range.cell("desc")?.value, CellValue::string("<desc>"));
        assert_eq!(range.cell("quantity")?.value, CellValue::Number(0.0));
        fill_item(range, item)
    })
    .unwrap();
}

#[test]
fn test_merge_containment() {
    let mut wb = quotation();
    bind_vertical_insert(&mut wb, 0, "row", 0, &items(), fill_item).unwrap();

    let regions: Vec<String> = wb
        .worksheet(0)
        .unwrap()
        .merged_regions()
        .iter()
        .map(|r| r.to_string())
        .collect();
    for expected in ["A4:C4", "A6:C6", "A8:C8"] {
        assert!(regions.iter().any(|r| r == expected), "{} in {:?}", expected, regions);
    }
    // only the original partial region exists, untranslated
    assert_eq!(regions.iter().filter(|r| r.starts_with('E')).count(), 1);
}

#[test]
fn test_insert_shifts_rows_below() {
    let mut wb = quotation();
    {
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value("B8", "signature").unwrap();
        sheet.set_row_height(7, 40.0).unwrap();
    }
    bind_vertical_insert(&mut wb, 0, "row", 0, &items(), fill_item).unwrap();

    let sheet = wb.worksheet(0).unwrap();
    assert_eq!(sheet.get_value("B12").unwrap(), CellValue::string("signature"));
    assert_eq!(sheet.row_height(11), Some(40.0));
}

#[test]
fn test_styles_are_shared() {
    let mut wb = quotation();
    let style = wb.worksheet(0).unwrap().cell("A3").unwrap().unwrap().style.unwrap();
    let pool_size = wb.styles().len();

    bind_vertical_insert(&mut wb, 0, "row", 0, &items(), fill_item).unwrap();
    assert_eq!(wb.styles().len(), pool_size);

    let sheet = wb.worksheet(0).unwrap();
    for addr in ["A3", "A5", "A7"] {
        assert_eq!(sheet.cell(addr).unwrap().unwrap().style, Some(style));
    }

    wb.update_style(style, |s| s.font.size = 14.0).unwrap();
    let copied = wb.worksheet(0).unwrap().cell("A7").unwrap().unwrap().style.unwrap();
    assert_eq!(wb.style(copied).unwrap().font.size, 14.0);
}

#[test]
fn test_empty_list_leaves_document_unchanged() {
    let mut wb = quotation();
    let cells_before: Vec<(u32, u16, Cell)> = wb
        .worksheet(0)
        .unwrap()
        .iter_cells()
        .map(|(r, c, cell)| (r, c, cell.clone()))
        .collect();
    let merges_before = wb.worksheet(0).unwrap().merged_regions().to_vec();

    let none: Vec<Item> = Vec::new();
    bind_vertical_insert(&mut wb, 0, "row", 0, &none, fill_item).unwrap();

    let sheet = wb.worksheet(0).unwrap();
    let cells_after: Vec<(u32, u16, Cell)> = sheet
        .iter_cells()
        .map(|(r, c, cell)| (r, c, cell.clone()))
        .collect();
    assert_eq!(cells_after, cells_before);
    assert_eq!(sheet.merged_regions(), merges_before.as_slice());
}

#[test]
fn test_overwrite_mode_keeps_rows_in_place() {
    let mut wb = quotation();
    bind_vertical(&mut wb, 0, "row", 0, &items()[..2], false, fill_item).unwrap();

    let sheet = wb.worksheet(0).unwrap();
    // the clone at rows 5-6 overwrote the totals line
    assert_eq!(sheet.get_value("A5").unwrap(), CellValue::string("B"));
    assert_eq!(sheet.get_value("A6").unwrap(), CellValue::string("note"));
    assert_eq!(sheet.get_value("C6").unwrap(), CellValue::Empty);
}

#[test]
fn test_add_offset_leaves_gap() {
    let mut wb = quotation();
    bind_vertical(&mut wb, 0, "row", 1, &items(), false, fill_item).unwrap();

    let sheet = wb.worksheet(0).unwrap();
    // the gap is left before the first clone only
    assert_eq!(sheet.get_value("A6").unwrap(), CellValue::string("B"));
    assert_eq!(sheet.get_value("A8").unwrap(), CellValue::string("C"));
}

#[test]
fn test_whole_row_block() {
    let mut wb = Workbook::new();
    wb.define_name("line", "Sheet1!$2:$2").unwrap();
    wb.define_name("item", "Sheet1!$A$2").unwrap();
    wb.define_name("qty", "Sheet1!$C$2").unwrap();
    {
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", "Item").unwrap();
        sheet.set_cell_value("A2", "<item>").unwrap();
        sheet.set_cell_value("E2", "each").unwrap();
        sheet.set_row_height(1, 20.0).unwrap();
        sheet.set_cell_value("A4", "Total").unwrap();
    }

    let lines = [("Fan", 3.0), ("Lamp", 1.0), ("Desk", 2.0)];
    bind_vertical_insert(&mut wb, 0, "line", 0, &lines, |mut range, (item, qty)| {
        range.set_value("item", *item)?;
        range.set_value("qty", *qty)
    })
    .unwrap();

    let sheet = wb.worksheet(0).unwrap();
    assert_eq!(sheet.get_value("A2").unwrap(), CellValue::string("Fan"));
    assert_eq!(sheet.get_value("A3").unwrap(), CellValue::string("Lamp"));
    assert_eq!(sheet.get_value("C4").unwrap(), CellValue::Number(2.0));
    // cells outside the named cells travel with the row
    assert_eq!(sheet.get_value("E3").unwrap(), CellValue::string("each"));
    assert_eq!(sheet.get_value("E4").unwrap(), CellValue::string("each"));
    assert_eq!(sheet.row_height(2), Some(20.0));
    assert_eq!(sheet.get_value("A6").unwrap(), CellValue::string("Total"));
    // nothing beyond the used columns is created
    assert_eq!(sheet.used_range().unwrap().end.col, 4);
}

#[test]
fn test_whole_column_block() {
    let mut wb = Workbook::new();
    wb.define_name("col", "Sheet1!$B:$B").unwrap();
    wb.define_name("supplier", "Sheet1!$B$1").unwrap();
    wb.define_name("price", "Sheet1!$B$2").unwrap();
    {
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", "Supplier").unwrap();
        sheet.set_cell_value("B5", "net").unwrap();
    }

    let suppliers = [("North", 10.0), ("South", 12.5)];
    bind_horizontal(&mut wb, 0, "col", 0, &suppliers, |mut range, (name, price)| {
        range.set_value("supplier", *name)?;
        range.set_value("price", *price)
    })
    .unwrap();

    let sheet = wb.worksheet(0).unwrap();
    assert_eq!(sheet.get_value("B1").unwrap(), CellValue::string("North"));
    assert_eq!(sheet.get_value("C1").unwrap(), CellValue::string("South"));
    assert_eq!(sheet.get_value("C2").unwrap(), CellValue::Number(12.5));
    assert_eq!(sheet.get_value("C5").unwrap(), CellValue::string("net"));
    assert_eq!(sheet.used_range().unwrap().end.row, 4);
}

#[test]
fn test_horizontal_binding_overwrites_to_the_right() {
    let mut wb = Workbook::new();
    wb.define_name("col", "Sheet1!$B$1:$B$3").unwrap();
    wb.define_name("supplier", "Sheet1!$B$1").unwrap();
    wb.define_name("unitPrice", "Sheet1!$B$2").unwrap();
    wb.define_name("offer", "Sheet1!$B$3").unwrap();
    {
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", "Supplier").unwrap();
        sheet.set_cell_value("B3", "N").unwrap();
        sheet.set_cell_value("C1", "stale").unwrap();
    }

    let suppliers = [("North", 10.0, "Y"), ("South", 12.5, "N"), ("East", 9.0, "Y")];
    bind_horizontal(&mut wb, 0, "col", 0, &suppliers, |mut range, (name, price, offer)| {
        assert_eq!(range.cell("offer")?.value, CellValue::string("N"));
        range.set_value("supplier", *name)?;
        range.set_value("unitPrice", *price)?;
        range.set_value("offer", *offer)
    })
    .unwrap();

    let sheet = wb.worksheet(0).unwrap();
    let row: Vec<CellValue> = ["B1", "C1", "D1"]
        .iter()
        .map(|a| sheet.get_value(a).unwrap())
        .collect();
    assert_eq!(
        row,
        vec![
            CellValue::string("North"),
            CellValue::string("South"),
            CellValue::string("East")
        ]
    );
    assert_eq!(sheet.get_value("C2").unwrap(), CellValue::Number(12.5));
    assert_eq!(sheet.get_value("A1").unwrap(), CellValue::string("Supplier"));
}

#[test]
fn test_literal_reference_inside_clone() {
    let mut wb = quotation();
    bind_vertical_insert(&mut wb, 0, "row", 0, &items(), |mut range, item| {
        // "D3" has no definition and is used as a literal address
        range.set_value("D3", item.quantity * 2.0)?;
        fill_item(range, item)
    })
    .unwrap();

    let sheet = wb.worksheet(0).unwrap();
    assert_eq!(sheet.get_value("D3").unwrap(), CellValue::Number(6.0));
    assert_eq!(sheet.get_value("D5").unwrap(), CellValue::Number(2.0));
    assert_eq!(sheet.get_value("D7").unwrap(), CellValue::Number(4.0));
}

#[test]
fn test_unknown_block_name_fails() {
    let mut wb = quotation();
    let err = bind_vertical_insert(&mut wb, 0, "rows", 0, &items(), fill_item).unwrap_err();
    assert!(matches!(err, Error::UnresolvedName(name) if name == "rows"));
}

#[test]
fn test_sheet_mode_with_nested_rows() {
    let mut wb = quotation();
    wb.rename_worksheet(0, "Quote").unwrap();
    wb.worksheet_mut(0).unwrap().page_setup_mut().paper_size = 9;

    let customers = [("Acme/North", items()), ("Globex", items()[..1].to_vec())];
    bind_sheets(&mut wb, 0, &customers, |mut sheet, (customer, lines)| {
        sheet.rename_sanitized(customer)?;
        sheet.set_value("A1", *customer)?;
        sheet.bind_vertical("row", 0, lines, true, fill_item)
    })
    .unwrap();

    let names: Vec<&str> = wb.worksheets().map(|s| s.name()).collect();
    assert_eq!(names, vec!["Acme-North", "Globex"]);

    let acme = wb.worksheet(0).unwrap();
    assert_eq!(acme.get_value("A1").unwrap(), CellValue::string("Acme/North"));
    assert_eq!(acme.get_value("A7").unwrap(), CellValue::string("C"));
    assert_eq!(acme.get_value("A10").unwrap(), CellValue::string("Total"));
    assert_eq!(acme.page_setup().paper_size, 9);

    let globex = wb.worksheet(1).unwrap();
    assert_eq!(globex.get_value("A3").unwrap(), CellValue::string("A"));
    assert_eq!(globex.get_value("A6").unwrap(), CellValue::string("Total"));
}
