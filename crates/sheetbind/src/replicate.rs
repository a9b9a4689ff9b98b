//! Block replication
//!
//! Copies the literal (unshifted) area of a [`Range`] to a new position and
//! returns the handle of the copy. The source is always the template block
//! itself, never a previously made copy, so every copy starts from pristine
//! template content.
//!
//! Vertical copies can insert (shift existing rows down to make room);
//! horizontal copies always overwrite the columns to the right.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use log::debug;
use sheetbind_core::cell::{checked_col, checked_row};
use sheetbind_core::{AreaReference, Cell, CellRange, Range, Result, Row, Workbook, Worksheet};

use crate::copy::copy_cell;

/// Snapshot of the template rows a copy reads from
///
/// Taken before the destination is touched, so source and destination may
/// be the same sheet.
struct SourceBlock {
    rows: BTreeMap<u32, Row>,
    merged_regions: Vec<CellRange>,
    used: Option<CellRange>,
}

impl SourceBlock {
    fn capture(sheet: &Worksheet, area: &AreaReference) -> Self {
        let rows = (area.first_row()..=area.last_row())
            .filter_map(|y| sheet.row(y).map(|row| (y, row.clone())))
            .collect();
        Self {
            rows,
            merged_regions: sheet.merged_regions().to_vec(),
            used: sheet.used_range(),
        }
    }

    fn height(&self, row: u32) -> Option<f64> {
        self.rows.get(&row).and_then(|r| r.height)
    }

    fn cell(&self, row: u32, col: u16) -> Option<&Cell> {
        self.rows.get(&row).and_then(|r| r.cell(col))
    }
}

/// Columns of `area` a copy visits
///
/// Whole-row areas stop at the last column used on either sheet.
fn block_cols(area: &AreaReference, source: &SourceBlock, dest: &Worksheet) -> RangeInclusive<u16> {
    if !area.is_whole_rows() {
        return area.first_col()..=area.last_col();
    }
    let used = [source.used, dest.used_range()]
        .iter()
        .flatten()
        .map(|r| r.last_col())
        .max();
    match used {
        Some(last) => area.first_col()..=last.min(area.last_col()),
        None => 1..=0,
    }
}

/// Rows of `area` a copy visits
///
/// Whole-column areas stop at the last row used on either sheet.
fn block_rows(area: &AreaReference, source: &SourceBlock, dest: &Worksheet) -> RangeInclusive<u32> {
    if !area.is_whole_cols() {
        return area.first_row()..=area.last_row();
    }
    let used = [source.used, dest.used_range()]
        .iter()
        .flatten()
        .map(|r| r.last_row())
        .max();
    match used {
        Some(last) => area.first_row()..=last.min(area.last_row()),
        None => 1..=0,
    }
}

/// Copy cell `(y, x)` of the block to `(dest_row, dest_col)`
///
/// The destination row is created when missing, taking the source row's
/// height; the destination cell is always replaced by a fresh one.
fn paste_cell(
    dest: &mut Worksheet,
    source: &SourceBlock,
    (y, x): (u32, u16),
    (dest_row, dest_col): (u32, u16),
) -> Result<()> {
    if !dest.has_row(dest_row) {
        dest.ensure_row(dest_row)?.height = source.height(y);
    }

    let blank = Cell::default();
    let src = source.cell(y, x).unwrap_or(&blank);
    copy_cell(src, dest.create_cell(dest_row, dest_col)?);
    Ok(())
}

/// Copy the block of `range` below itself, onto sheet `dest_sheet`
///
/// The copy lands `range.shift_y() + add_offset_y + row_count` rows below the
/// template rows. With `insert`, rows of the destination from just below the
/// previous copy to the end of the sheet are first moved down by the block
/// height. Merged regions lying within the block's rows are translated onto
/// the copy. Returns the handle of the copy.
pub fn vertical_copy(
    workbook: &mut Workbook,
    range: &Range,
    dest_sheet: usize,
    add_offset_y: i64,
    insert: bool,
) -> Result<Range> {
    let area = range.area(workbook)?.clone();
    let row_count = i64::from(area.row_count());
    let shift = range.shift_y() + add_offset_y + row_count;

    let source = SourceBlock::capture(workbook.sheet(range.sheet())?, &area);
    let dest = workbook.sheet_mut(dest_sheet)?;

    if insert {
        let start = i64::from(area.last_row()) + range.shift_y() + add_offset_y + 1;
        if let Some(last) = dest.last_row_index() {
            if start <= i64::from(last) {
                dest.shift_rows(checked_row(start)?, last, row_count)?;
            }
        }
    }

    let cols = block_cols(&area, &source, dest);
    for y in area.first_row()..=area.last_row() {
        let dest_row = checked_row(i64::from(y) + shift)?;
        if !dest.has_row(dest_row) {
            dest.ensure_row(dest_row)?.height = source.height(y);
        }
        for x in cols.clone() {
            paste_cell(dest, &source, (y, x), (dest_row, x))?;
        }
    }

    for region in &source.merged_regions {
        if area.first_row() <= region.first_row() && region.last_row() <= area.last_row() {
            dest.add_merged_region(region.offset(shift, 0)?);
        }
    }

    debug!(
        "copied '{}' down to sheet #{} (shift_y {}, insert {})",
        range.name(),
        dest_sheet,
        shift,
        insert
    );
    Ok(Range::new(dest_sheet, shift, range.shift_x(), range.name()))
}

/// Copy the block of `range` to the right of itself, onto sheet `dest_sheet`
///
/// The copy lands `range.shift_x() + add_offset_x + col_count` columns to the
/// right of the template columns, on the template rows. Existing cells there
/// are overwritten. Merged regions lying fully inside the block (rows and
/// columns) are translated onto the copy. Returns the handle of the copy.
pub fn horizontal_copy(
    workbook: &mut Workbook,
    range: &Range,
    dest_sheet: usize,
    add_offset_x: i64,
) -> Result<Range> {
    let area = range.area(workbook)?.clone();
    let col_count = i64::from(area.col_count());
    let shift = range.shift_x() + add_offset_x + col_count;

    let source = SourceBlock::capture(workbook.sheet(range.sheet())?, &area);
    let dest = workbook.sheet_mut(dest_sheet)?;

    for y in block_rows(&area, &source, dest) {
        for x in area.first_col()..=area.last_col() {
            let dest_col = checked_col(i64::from(x) + shift)?;
            paste_cell(dest, &source, (y, x), (y, dest_col))?;
        }
    }

    for region in &source.merged_regions {
        let rows_inside =
            area.first_row() <= region.first_row() && region.last_row() <= area.last_row();
        let cols_inside =
            area.first_col() <= region.first_col() && region.last_col() <= area.last_col();
        if rows_inside && cols_inside {
            dest.add_merged_region(region.offset(0, shift)?);
        }
    }

    debug!(
        "copied '{}' right to sheet #{} (shift_x {})",
        range.name(),
        dest_sheet,
        shift
    );
    Ok(Range::new(dest_sheet, range.shift_y(), shift, range.name()))
}

/// Copy operations on a [`Range`] handle
///
/// Shorthands over [`vertical_copy`] and [`horizontal_copy`] that copy onto
/// the handle's own sheet unless a destination is given.
pub trait RangeCopyExt {
    /// Copy down, overwriting whatever is below
    fn vertical_copy(&self, workbook: &mut Workbook, add_offset_y: i64) -> Result<Range>;

    /// Copy down, moving existing rows below out of the way first
    fn vertical_copy_insert(&self, workbook: &mut Workbook, add_offset_y: i64) -> Result<Range>;

    /// Copy directly below the block, overwriting
    fn vertical_copy_next(&self, workbook: &mut Workbook) -> Result<Range>;

    /// Copy (inserting) so that the copy starts at `target_row` of `dest_sheet`
    fn vertical_copy_to(
        &self,
        workbook: &mut Workbook,
        dest_sheet: usize,
        target_row: u32,
    ) -> Result<Range>;

    /// Copy to the right, overwriting
    fn horizontal_copy(&self, workbook: &mut Workbook, add_offset_x: i64) -> Result<Range>;

    /// Copy so that the copy starts at `target_col` of `dest_sheet`
    fn horizontal_copy_to(
        &self,
        workbook: &mut Workbook,
        dest_sheet: usize,
        target_col: u16,
    ) -> Result<Range>;
}

impl RangeCopyExt for Range {
    fn vertical_copy(&self, workbook: &mut Workbook, add_offset_y: i64) -> Result<Range> {
        vertical_copy(workbook, self, self.sheet(), add_offset_y, false)
    }

    fn vertical_copy_insert(&self, workbook: &mut Workbook, add_offset_y: i64) -> Result<Range> {
        vertical_copy(workbook, self, self.sheet(), add_offset_y, true)
    }

    fn vertical_copy_next(&self, workbook: &mut Workbook) -> Result<Range> {
        vertical_copy(workbook, self, self.sheet(), 0, false)
    }

    fn vertical_copy_to(
        &self,
        workbook: &mut Workbook,
        dest_sheet: usize,
        target_row: u32,
    ) -> Result<Range> {
        let last_row = i64::from(self.area(workbook)?.last_row());
        let add_offset_y = i64::from(target_row) - last_row - 1;
        vertical_copy(workbook, self, dest_sheet, add_offset_y, true)
    }

    fn horizontal_copy(&self, workbook: &mut Workbook, add_offset_x: i64) -> Result<Range> {
        horizontal_copy(workbook, self, self.sheet(), add_offset_x)
    }

    fn horizontal_copy_to(
        &self,
        workbook: &mut Workbook,
        dest_sheet: usize,
        target_col: u16,
    ) -> Result<Range> {
        let last_col = i64::from(self.area(workbook)?.last_col());
        let add_offset_x = i64::from(target_col) - last_col - 1;
        horizontal_copy(workbook, self, dest_sheet, add_offset_x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetbind_core::{CellValue, Error, Style};

    /// Sheet1 with a two-row block "row" on A3:C4 and a footer on row 6
    fn template() -> Workbook {
        let mut wb = Workbook::new();
        wb.define_name("row", "Sheet1!$A$3:$C$4").unwrap();
        wb.define_name("col", "Sheet1!$B$1:$B$2").unwrap();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", "head").unwrap();
        sheet.set_cell_value("A3", "ref").unwrap();
        sheet.set_cell_value("B3", 1.0).unwrap();
        sheet.set_cell_value("C4", true).unwrap();
        sheet.set_row_height(2, 30.0).unwrap();
        sheet.set_cell_value("A6", "footer").unwrap();
        wb
    }

    #[test]
    fn test_vertical_copy_overwrites() {
        let mut wb = template();
        let range = Range::new(0, 0, 0, "row");
        let copy = range.vertical_copy_next(&mut wb).unwrap();

        assert_eq!(copy.shift_y(), 2);
        assert_eq!(copy.shift_x(), 0);
        let sheet = wb.worksheet(0).unwrap();
        assert_eq!(sheet.get_value("A5").unwrap(), CellValue::string("ref"));
        assert_eq!(sheet.get_value("B5").unwrap(), CellValue::Number(1.0));
        // footer row 6 was overwritten by the second block row (C4 -> C6)
        assert_eq!(sheet.get_value("A6").unwrap(), CellValue::Empty);
        assert_eq!(sheet.get_value("C6").unwrap(), CellValue::Boolean(true));
    }

    #[test]
    fn test_vertical_copy_insert_moves_rows_below() {
        let mut wb = template();
        let range = Range::new(0, 0, 0, "row");
        let copy = range.vertical_copy_insert(&mut wb, 0).unwrap();

        assert_eq!(copy.shift_y(), 2);
        let sheet = wb.worksheet(0).unwrap();
        assert_eq!(sheet.get_value("A5").unwrap(), CellValue::string("ref"));
        assert_eq!(sheet.get_value("A8").unwrap(), CellValue::string("footer"));
        assert_eq!(sheet.get_value("A1").unwrap(), CellValue::string("head"));
    }

    #[test]
    fn test_row_height_copied_only_for_new_rows() {
        let mut wb = template();
        wb.worksheet_mut(0).unwrap().set_row_height(4, 12.0).unwrap();
        let range = Range::new(0, 0, 0, "row");
        range.vertical_copy_next(&mut wb).unwrap();

        let sheet = wb.worksheet(0).unwrap();
        // row 5 existed with its own height
        assert_eq!(sheet.row_height(4), Some(12.0));

        let mut wb = template();
        Range::new(0, 0, 0, "row").vertical_copy(&mut wb, 10).unwrap();
        assert_eq!(wb.worksheet(0).unwrap().row_height(14), Some(30.0));
    }

    #[test]
    fn test_style_is_shared_not_duplicated() {
        let mut wb = template();
        let bold = wb.intern_style(Style::new().bold(true));
        wb.worksheet_mut(0).unwrap().set_cell_style("B3", bold).unwrap();
        let styles_before = wb.styles().len();

        Range::new(0, 0, 0, "row").vertical_copy_next(&mut wb).unwrap();
        assert_eq!(wb.styles().len(), styles_before);
        assert_eq!(wb.worksheet(0).unwrap().cell("B5").unwrap().unwrap().style, Some(bold));

        wb.update_style(bold, |s| s.font.italic = true).unwrap();
        let copied = wb.worksheet(0).unwrap().cell("B5").unwrap().unwrap().style.unwrap();
        assert!(wb.style(copied).unwrap().font.italic);
    }

    #[test]
    fn test_merge_containment() {
        let mut wb = template();
        {
            let sheet = wb.worksheet_mut(0).unwrap();
            sheet.merge_cells(&CellRange::parse("A3:B4").unwrap()).unwrap();
            sheet.merge_cells(&CellRange::parse("D4:D5").unwrap()).unwrap();
        }
        Range::new(0, 0, 0, "row").vertical_copy_insert(&mut wb, 0).unwrap();

        let regions: Vec<String> = wb
            .worksheet(0)
            .unwrap()
            .merged_regions()
            .iter()
            .map(|r| r.to_string())
            .collect();
        assert!(regions.contains(&"A5:B6".to_string()));
        assert!(!regions.iter().any(|r| r == "D6:D7"));
    }

    #[test]
    fn test_vertical_copy_to_other_sheet() {
        let mut wb = template();
        wb.add_worksheet_with_name("Out").unwrap();
        let copy = Range::new(0, 0, 0, "row")
            .vertical_copy_to(&mut wb, 1, 10)
            .unwrap();

        // block starts on row 3 (index 2); target index 10 => shift 8
        assert_eq!(copy.sheet(), 1);
        assert_eq!(copy.shift_y(), 8);
        let out = wb.worksheet(1).unwrap();
        assert_eq!(out.get_value("A11").unwrap(), CellValue::string("ref"));
        assert_eq!(out.get_value("C12").unwrap(), CellValue::Boolean(true));
        // the template sheet is untouched
        assert_eq!(
            wb.worksheet(0).unwrap().get_value("A6").unwrap(),
            CellValue::string("footer")
        );
    }

    #[test]
    fn test_negative_target_row_fails() {
        let mut wb = template();
        let err = Range::new(0, 0, 0, "row")
            .vertical_copy(&mut wb, -10)
            .unwrap_err();
        assert!(matches!(err, Error::RowOutOfBounds(..)));
    }

    #[test]
    fn test_horizontal_copy() {
        let mut wb = template();
        {
            let sheet = wb.worksheet_mut(0).unwrap();
            sheet.set_cell_value("B1", "price").unwrap();
            sheet.set_cell_value("C1", "old").unwrap();
            sheet.merge_cells(&CellRange::parse("B1:B2").unwrap()).unwrap();
            sheet.merge_cells(&CellRange::parse("A7:B7").unwrap()).unwrap();
        }
        let copy = Range::new(0, 0, 0, "col").horizontal_copy(&mut wb, 0).unwrap();

        assert_eq!(copy.shift_x(), 1);
        assert_eq!(copy.shift_y(), 0);
        let sheet = wb.worksheet(0).unwrap();
        assert_eq!(sheet.get_value("C1").unwrap(), CellValue::string("price"));
        assert!(sheet.merged_regions().contains(&CellRange::parse("C1:C2").unwrap()));
        assert_eq!(sheet.merged_regions().len(), 3);
    }

    #[test]
    fn test_horizontal_copy_to() {
        let mut wb = template();
        wb.worksheet_mut(0).unwrap().set_cell_value("B1", "price").unwrap();
        let copy = Range::new(0, 0, 0, "col")
            .horizontal_copy_to(&mut wb, 0, 5)
            .unwrap();
        assert_eq!(copy.shift_x(), 4);
        assert_eq!(
            wb.worksheet(0).unwrap().get_value("F1").unwrap(),
            CellValue::string("price")
        );
    }
}
