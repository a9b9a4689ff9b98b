//! Per-record sheet mode
//!
//! Clones a template sheet once per record, fills each clone, then drops
//! the template.

use log::debug;
use sheetbind_core::{
    sanitize_sheet_name, CellValue, HeaderFooter, PageMargins, PageSetup, PrintOptions, Range,
    RangeMut, Result, Workbook, Worksheet,
};

use crate::binding;

/// Print settings of a worksheet: page setup, margins, print options and
/// header/footer
#[derive(Debug, Clone)]
struct SheetSetup {
    page_setup: PageSetup,
    margins: PageMargins,
    print_options: PrintOptions,
    header_footer: HeaderFooter,
}

impl SheetSetup {
    fn capture(sheet: &Worksheet) -> Self {
        Self {
            page_setup: sheet.page_setup().clone(),
            margins: *sheet.margins(),
            print_options: *sheet.print_options(),
            header_footer: sheet.header_footer().clone(),
        }
    }

    fn apply(self, sheet: &mut Worksheet) {
        *sheet.page_setup_mut() = self.page_setup;
        *sheet.margins_mut() = self.margins;
        *sheet.print_options_mut() = self.print_options;
        *sheet.header_footer_mut() = self.header_footer;
    }
}

/// Copy the print settings of `src` onto `dst`
///
/// Covers paper size, orientation, scale, fit-to-page, copies, draft and
/// black-and-white flags, first page number, resolutions, all margins,
/// centering, automatic page breaks, repeated rows/columns and the
/// left/center/right header and footer text.
pub fn copy_sheet_setup(src: &Worksheet, dst: &mut Worksheet) {
    SheetSetup::capture(src).apply(dst);
}

/// A cloned sheet handed to a sheet-mode fill callback
pub struct SheetMut<'a> {
    workbook: &'a mut Workbook,
    index: usize,
}

impl<'a> SheetMut<'a> {
    /// Index of the clone at the time of the callback
    pub fn index(&self) -> usize {
        self.index
    }

    /// The whole document
    pub fn workbook(&self) -> &Workbook {
        &*self.workbook
    }

    /// The whole document (mutable)
    pub fn workbook_mut(&mut self) -> &mut Workbook {
        &mut *self.workbook
    }

    /// The cloned worksheet
    pub fn worksheet(&self) -> Result<&Worksheet> {
        self.workbook.sheet(self.index)
    }

    /// The cloned worksheet (mutable)
    pub fn worksheet_mut(&mut self) -> Result<&mut Worksheet> {
        self.workbook.sheet_mut(self.index)
    }

    /// Rename the clone
    pub fn rename(&mut self, name: &str) -> Result<()> {
        self.workbook.rename_worksheet(self.index, name)
    }

    /// Rename the clone from raw record data, replacing characters a sheet
    /// name cannot hold
    pub fn rename_sanitized(&mut self, raw: &str) -> Result<()> {
        self.rename(&sanitize_sheet_name(raw))
    }

    /// Handle for the block `name` on this sheet
    pub fn range(&self, name: &str) -> Range {
        Range::new(self.index, 0, 0, name)
    }

    /// Run `f` against the block `name` on this sheet
    pub fn with_range<R, F>(&mut self, name: &str, f: F) -> Result<R>
    where
        F: FnOnce(RangeMut<'_>) -> Result<R>,
    {
        let range = self.range(name);
        f(range.view(self.workbook))
    }

    /// Set the value of the cell named `name` on this sheet
    pub fn set_value<V: Into<CellValue>>(&mut self, name: &str, value: V) -> Result<()> {
        self.with_range(name, |mut view| view.set_value(name, value))
    }

    /// [`binding::bind_vertical`] on this sheet
    pub fn bind_vertical<T, F>(
        &mut self,
        name: &str,
        add_offset_y: i64,
        records: &[T],
        insert: bool,
        fill: F,
    ) -> Result<()>
    where
        F: FnMut(RangeMut<'_>, &T) -> Result<()>,
    {
        binding::bind_vertical(self.workbook, self.index, name, add_offset_y, records, insert, fill)
    }

    /// [`binding::bind_horizontal`] on this sheet
    pub fn bind_horizontal<T, F>(
        &mut self,
        name: &str,
        add_offset_x: i64,
        records: &[T],
        fill: F,
    ) -> Result<()>
    where
        F: FnMut(RangeMut<'_>, &T) -> Result<()>,
    {
        binding::bind_horizontal(self.workbook, self.index, name, add_offset_x, records, fill)
    }
}

/// Produce one copy of `template_sheet` per record, then remove the template
///
/// Each clone is appended at the end of the workbook under a generated name
/// and carries the template's print settings. An empty list leaves the
/// workbook untouched.
pub fn bind_sheets<T, F>(
    workbook: &mut Workbook,
    template_sheet: usize,
    records: &[T],
    mut fill: F,
) -> Result<()>
where
    F: FnMut(SheetMut<'_>, &T) -> Result<()>,
{
    if records.is_empty() {
        return Ok(());
    }

    for record in records {
        let index = workbook.clone_worksheet(template_sheet)?;
        let setup = SheetSetup::capture(workbook.sheet(template_sheet)?);
        setup.apply(workbook.sheet_mut(index)?);

        fill(
            SheetMut {
                workbook: &mut *workbook,
                index,
            },
            record,
        )?;
    }

    let template = workbook.remove_worksheet(template_sheet)?;
    debug!(
        "bound {} record(s) as sheets of template '{}'",
        records.len(),
        template.name()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetbind_core::{Error, PageOrientation};

    fn template() -> Workbook {
        let mut wb = Workbook::new();
        wb.rename_worksheet(0, "Invoice").unwrap();
        wb.define_name("customer", "Invoice!$B$1").unwrap();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", "Customer").unwrap();
        sheet.page_setup_mut().orientation = PageOrientation::Landscape;
        sheet.page_setup_mut().scale = 80;
        sheet.margins_mut().top = 1.5;
        sheet.print_options_mut().repeat_rows = Some((0, 0));
        sheet.header_footer_mut().footer_right = "&P".into();
        wb
    }

    #[test]
    fn test_copy_sheet_setup() {
        let wb = template();
        let src = wb.worksheet(0).unwrap();
        let mut dst = Worksheet::new("Other");
        copy_sheet_setup(src, &mut dst);

        assert_eq!(dst.page_setup(), src.page_setup());
        assert_eq!(dst.margins(), src.margins());
        assert_eq!(dst.print_options(), src.print_options());
        assert_eq!(dst.header_footer(), src.header_footer());
    }

    #[test]
    fn test_one_sheet_per_record() {
        let mut wb = template();
        bind_sheets(&mut wb, 0, &["Acme: North", "Globex"], |mut sheet, customer| {
            sheet.rename_sanitized(customer)?;
            sheet.set_value("customer", *customer)
        })
        .unwrap();

        let names: Vec<&str> = wb.worksheets().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Acme- North", "Globex"]);
        let first = wb.worksheet(0).unwrap();
        assert_eq!(first.get_value("B1").unwrap(), CellValue::string("Acme: North"));
        assert_eq!(first.get_value("A1").unwrap(), CellValue::string("Customer"));
        assert_eq!(first.page_setup().orientation, PageOrientation::Landscape);
        assert_eq!(first.header_footer().footer_right, "&P");
    }

    #[test]
    fn test_nested_binding_inside_sheet() {
        let mut wb = template();
        wb.define_name("line", "Invoice!$A$3").unwrap();
        let orders = [vec!["a", "b"], vec!["c"]];
        bind_sheets(&mut wb, 0, &orders, |mut sheet, lines| {
            sheet.bind_vertical("line", 0, lines, true, |mut range, line| {
                range.set_value("line", *line)
            })
        })
        .unwrap();

        assert_eq!(wb.sheet_count(), 2);
        let first = wb.worksheet(0).unwrap();
        assert_eq!(first.get_value("A3").unwrap(), CellValue::string("a"));
        assert_eq!(first.get_value("A4").unwrap(), CellValue::string("b"));
        assert_eq!(wb.worksheet(1).unwrap().get_value("A4").unwrap(), CellValue::Empty);
    }

    #[test]
    fn test_empty_records_keep_template() {
        let mut wb = template();
        let records: [&str; 0] = [];
        bind_sheets(&mut wb, 0, &records, |_, _| unreachable!("no record"))
            .unwrap();
        assert_eq!(wb.sheet_count(), 1);
        assert_eq!(wb.worksheet(0).unwrap().name(), "Invoice");
    }

    #[test]
    fn test_missing_template_sheet() {
        let mut wb = template();
        let err = bind_sheets(&mut wb, 3, &[1], |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, Error::SheetOutOfBounds(3, 1)));
    }
}
