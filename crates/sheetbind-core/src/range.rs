//! Symbolic handles over named template blocks
//!
//! A [`Range`] names a block of a template (`row`, `col`, ...) together with
//! the offset at which one copy of that block lives. Fill code never sees
//! absolute coordinates: it asks a [`RangeMut`] for cells by name and gets
//! the cell of *this* copy.

use once_cell::unsync::OnceCell;

use crate::cell::{Cell, CellAddress, CellValue};
use crate::comment::CellComment;
use crate::error::{Error, Result};
use crate::hyperlink::Hyperlink;
use crate::named_range::AreaReference;
use crate::style::StyleId;
use crate::workbook::Workbook;
use crate::worksheet::Worksheet;

/// A named block plus the row/column offset of one copy of it
///
/// The resolved area is cached on first use and never changes afterwards;
/// build a new handle to observe a redefined name.
#[derive(Debug, Clone)]
pub struct Range {
    sheet: usize,
    shift_y: i64,
    shift_x: i64,
    name: String,
    area: OnceCell<AreaReference>,
}

impl Range {
    /// Create a handle for `name` on `sheet`, shifted by `(shift_y, shift_x)`
    pub fn new(sheet: usize, shift_y: i64, shift_x: i64, name: impl Into<String>) -> Self {
        Self {
            sheet,
            shift_y,
            shift_x,
            name: name.into(),
            area: OnceCell::new(),
        }
    }

    /// Sheet index the handle addresses
    pub fn sheet(&self) -> usize {
        self.sheet
    }

    /// Row offset of this copy relative to the template block
    pub fn shift_y(&self) -> i64 {
        self.shift_y
    }

    /// Column offset of this copy relative to the template block
    pub fn shift_x(&self) -> i64 {
        self.shift_x
    }

    /// The block's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The literal (unshifted) area the name refers to
    pub fn area(&self, workbook: &Workbook) -> Result<&AreaReference> {
        self.area
            .get_or_try_init(|| workbook.resolve_name(&self.name, self.sheet))
    }

    /// Absolute address of the cell named `name` inside this copy
    ///
    /// A name resolves to the first cell of its area. A name with no
    /// definition is read as a literal A1 reference. The handle's shift is
    /// applied in both cases.
    pub fn cell_address(&self, workbook: &Workbook, name: &str) -> Result<CellAddress> {
        let base = match workbook.resolve_name(name, self.sheet) {
            Ok(area) => area.first,
            Err(Error::UnresolvedName(_)) => AreaReference::parse(name)
                .map_err(|_| Error::UnresolvedName(name.to_string()))?
                .first,
            Err(e) => return Err(e),
        };
        base.offset(self.shift_y, self.shift_x)
    }

    /// Mutable view over this copy, as handed to fill callbacks
    pub fn view<'a>(&'a self, workbook: &'a mut Workbook) -> RangeMut<'a> {
        RangeMut {
            workbook,
            range: self,
        }
    }
}

/// A mutable view `(&mut Workbook, &Range)` that addresses cells by name
pub struct RangeMut<'a> {
    workbook: &'a mut Workbook,
    range: &'a Range,
}

impl<'a> RangeMut<'a> {
    /// The handle this view fills
    pub fn range(&self) -> &Range {
        self.range
    }

    /// The whole document, for lookups outside the block
    pub fn workbook(&self) -> &Workbook {
        &*self.workbook
    }

    /// The whole document (mutable), e.g. to intern a style
    pub fn workbook_mut(&mut self) -> &mut Workbook {
        &mut *self.workbook
    }

    /// The worksheet this copy lives on
    pub fn worksheet(&self) -> Result<&Worksheet> {
        self.workbook.sheet(self.range.sheet)
    }

    /// Absolute address of the cell named `name` in this copy
    pub fn cell_address(&self, name: &str) -> Result<CellAddress> {
        self.range.cell_address(&*self.workbook, name)
    }

    /// The cell named `name`, created if missing
    pub fn cell(&mut self, name: &str) -> Result<&mut Cell> {
        let addr = self.cell_address(name)?;
        self.workbook
            .sheet_mut(self.range.sheet)?
            .cell_mut_or_create(addr.row, addr.col)
    }

    /// Set the value of the cell named `name`
    pub fn set_value<V: Into<CellValue>>(&mut self, name: &str, value: V) -> Result<()> {
        self.cell(name)?.value = value.into();
        Ok(())
    }

    /// Set a formula (no cached result) on the cell named `name`
    pub fn set_formula(&mut self, name: &str, formula: &str) -> Result<()> {
        self.set_value(name, CellValue::formula(formula))
    }

    /// Attach a comment to the cell named `name`
    pub fn set_comment(&mut self, name: &str, comment: CellComment) -> Result<()> {
        self.cell(name)?.comment = Some(comment);
        Ok(())
    }

    /// Attach a hyperlink to the cell named `name`
    pub fn set_hyperlink(&mut self, name: &str, link: Hyperlink) -> Result<()> {
        self.cell(name)?.hyperlink = Some(link);
        Ok(())
    }

    /// Point the cell named `name` at a pooled style
    pub fn set_style(&mut self, name: &str, style: StyleId) -> Result<()> {
        if self.workbook.style(style).is_none() {
            return Err(Error::InvalidStyleIndex(style.0));
        }
        self.cell(name)?.style = Some(style);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        wb.define_name("row", "Sheet1!$A$3:$C$3").unwrap();
        wb.define_name("qty", "Sheet1!$B$3").unwrap();
        wb
    }

    #[test]
    fn test_area_is_cached() {
        let mut wb = workbook();
        let range = Range::new(0, 0, 0, "row");
        assert_eq!(range.area(&wb).unwrap().last_col(), 2);

        // redefining the name does not affect an existing handle
        wb.named_ranges_mut()
            .define_or_update(crate::NamedRange::workbook_scope("row", "Sheet1!$A$9:$A$9"));
        assert_eq!(range.area(&wb).unwrap().first_row(), 2);
        assert_eq!(Range::new(0, 0, 0, "row").area(&wb).unwrap().first_row(), 8);
    }

    #[test]
    fn test_named_cell_is_shifted() {
        let mut wb = workbook();
        let range = Range::new(0, 2, 1, "row");
        range.view(&mut wb).set_value("qty", 7).unwrap();

        let sheet = wb.worksheet(0).unwrap();
        assert_eq!(sheet.get_value("C5").unwrap().as_number(), Some(7.0));
    }

    #[test]
    fn test_literal_reference_fallback() {
        let mut wb = workbook();
        let range = Range::new(0, 1, 0, "row");
        range.view(&mut wb).set_value("E1", "note").unwrap();

        assert_eq!(
            wb.worksheet(0).unwrap().get_value("E2").unwrap().as_string(),
            Some("note")
        );
    }

    #[test]
    fn test_unresolved_name() {
        let mut wb = workbook();
        let range = Range::new(0, 0, 0, "row");
        assert!(matches!(
            range.view(&mut wb).set_value("no such name", 1),
            Err(Error::UnresolvedName(_))
        ));
    }

    #[test]
    fn test_negative_shift_out_of_sheet() {
        let mut wb = workbook();
        let range = Range::new(0, -5, 0, "row");
        assert!(matches!(
            range.view(&mut wb).set_value("qty", 1),
            Err(Error::RowOutOfBounds(-3, _))
        ));
    }

    #[test]
    fn test_set_style_checks_pool() {
        let mut wb = workbook();
        let range = Range::new(0, 0, 0, "row");
        let mut view = range.view(&mut wb);
        assert!(view.set_style("qty", StyleId(42)).is_err());
        view.set_style("qty", StyleId::DEFAULT).unwrap();
        assert_eq!(view.cell("qty").unwrap().style, Some(StyleId::DEFAULT));
    }
}
