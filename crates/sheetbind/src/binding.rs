//! List-to-range binding
//!
//! Replicates a named block once per record and hands each copy to a fill
//! callback. Copies for records `1..n` are made first, each from the
//! untouched template block; record `0` is written onto the template block
//! itself at the very end. Filling the template last is what keeps every
//! copy free of another record's values.

use log::debug;
use sheetbind_core::{Range, RangeMut, Result, Workbook};

use crate::replicate::{horizontal_copy, vertical_copy};

/// Bind `records` to the block `name` of `sheet`, one copy per record, downwards
///
/// The first copy lands `add_offset_y` rows below the block; later copies
/// follow each other. With `insert`, content below the block is moved down
/// rather than overwritten. An empty list leaves the workbook untouched.
pub fn bind_vertical<T, F>(
    workbook: &mut Workbook,
    sheet: usize,
    name: &str,
    add_offset_y: i64,
    records: &[T],
    insert: bool,
    mut fill: F,
) -> Result<()>
where
    F: FnMut(RangeMut<'_>, &T) -> Result<()>,
{
    let (first, rest) = match records.split_first() {
        Some(split) => split,
        None => return Ok(()),
    };

    let original = Range::new(sheet, 0, 0, name);
    let mut offset = add_offset_y;
    for record in rest {
        let copy = vertical_copy(workbook, &original, sheet, offset, insert)?;
        fill(copy.view(workbook), record)?;
        offset = copy.shift_y();
    }
    fill(original.view(workbook), first)?;

    debug!(
        "bound {} record(s) to '{}' on sheet #{} (vertical, insert {})",
        records.len(),
        name,
        sheet,
        insert
    );
    Ok(())
}

/// [`bind_vertical`] with insert mode on
pub fn bind_vertical_insert<T, F>(
    workbook: &mut Workbook,
    sheet: usize,
    name: &str,
    add_offset_y: i64,
    records: &[T],
    fill: F,
) -> Result<()>
where
    F: FnMut(RangeMut<'_>, &T) -> Result<()>,
{
    bind_vertical(workbook, sheet, name, add_offset_y, records, true, fill)
}

/// Bind `records` to the block `name` of `sheet`, one copy per record, to the right
///
/// Columns to the right of the block are overwritten. An empty list leaves
/// the workbook untouched.
pub fn bind_horizontal<T, F>(
    workbook: &mut Workbook,
    sheet: usize,
    name: &str,
    add_offset_x: i64,
    records: &[T],
    mut fill: F,
) -> Result<()>
where
    F: FnMut(RangeMut<'_>, &T) -> Result<()>,
{
    let (first, rest) = match records.split_first() {
        Some(split) => split,
        None => return Ok(()),
    };

    let original = Range::new(sheet, 0, 0, name);
    let mut offset = add_offset_x;
    for record in rest {
        let copy = horizontal_copy(workbook, &original, sheet, offset)?;
        fill(copy.view(workbook), record)?;
        offset = copy.shift_x();
    }
    fill(original.view(workbook), first)?;

    debug!(
        "bound {} record(s) to '{}' on sheet #{} (horizontal)",
        records.len(),
        name,
        sheet
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetbind_core::{CellValue, Error};

    fn template() -> Workbook {
        let mut wb = Workbook::new();
        wb.define_name("row", "Sheet1!$A$2:$B$2").unwrap();
        wb.define_name("name", "Sheet1!$A$2").unwrap();
        wb.define_name("qty", "Sheet1!$B$2").unwrap();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", "Name").unwrap();
        sheet.set_cell_value("A2", "<name>").unwrap();
        sheet.set_cell_value("A4", "Total").unwrap();
        wb
    }

    #[test]
    fn test_records_fill_in_order() {
        let mut wb = template();
        let records = [("fan", 3.0), ("lamp", 1.0), ("desk", 2.0)];
        bind_vertical_insert(&mut wb, 0, "row", 0, &records, |mut range, (name, qty)| {
            range.set_value("name", *name)?;
            range.set_value("qty", *qty)
        })
        .unwrap();

        let sheet = wb.worksheet(0).unwrap();
        let names: Vec<CellValue> = ["A2", "A3", "A4"]
            .iter()
            .map(|a| sheet.get_value(a).unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                CellValue::string("fan"),
                CellValue::string("lamp"),
                CellValue::string("desk")
            ]
        );
        assert_eq!(sheet.get_value("A6").unwrap(), CellValue::string("Total"));
    }

    #[test]
    fn test_copies_start_from_template_values() {
        let mut wb = template();
        let mut seen = Vec::new();
        bind_vertical(&mut wb, 0, "row", 0, &[1, 2, 3], true, |mut range, n| {
            seen.push(range.cell("name")?.value.clone());
            range.set_value("name", *n)
        })
        .unwrap();

        assert!(seen.iter().all(|v| *v == CellValue::string("<name>")));
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_empty_list_is_noop() {
        let mut wb = template();
        let snapshot = |wb: &Workbook| -> Vec<(u32, u16, sheetbind_core::Cell)> {
            wb.worksheet(0)
                .unwrap()
                .iter_cells()
                .map(|(r, c, cell)| (r, c, cell.clone()))
                .collect()
        };
        let before = snapshot(&wb);
        let records: [u32; 0] = [];
        bind_vertical_insert(&mut wb, 0, "no such block", 0, &records, |_, _| {
            unreachable!("no record to fill")
        })
        .unwrap();
        bind_horizontal(&mut wb, 0, "no such block", 0, &records, |_, _| {
            unreachable!("no record to fill")
        })
        .unwrap();
        assert_eq!(snapshot(&wb), before);
    }

    #[test]
    fn test_fill_error_aborts() {
        let mut wb = template();
        let mut calls = 0;
        let err = bind_vertical(&mut wb, 0, "row", 0, &["a", "b", "c"], false, |_, r| {
            calls += 1;
            if *r == "b" {
                return Err(Error::fill(format!("bad record {}", r)));
            }
            Ok(())
        })
        .unwrap_err();

        assert!(matches!(err, Error::Fill(_)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_horizontal_binding() {
        let mut wb = Workbook::new();
        wb.define_name("col", "Sheet1!$B$1:$B$2").unwrap();
        wb.define_name("supplier", "Sheet1!$B$1").unwrap();
        wb.define_name("price", "Sheet1!$B$2").unwrap();

        let records = [("north", 10.0), ("south", 12.5), ("east", 9.0)];
        bind_horizontal(&mut wb, 0, "col", 0, &records, |mut range, (name, price)| {
            range.set_value("supplier", *name)?;
            range.set_value("price", *price)
        })
        .unwrap();

        let sheet = wb.worksheet(0).unwrap();
        assert_eq!(sheet.get_value("B1").unwrap(), CellValue::string("north"));
        assert_eq!(sheet.get_value("C1").unwrap(), CellValue::string("south"));
        assert_eq!(sheet.get_value("D1").unwrap(), CellValue::string("east"));
        assert_eq!(sheet.get_value("D2").unwrap(), CellValue::Number(9.0));
    }
}
