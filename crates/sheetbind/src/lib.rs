//! # sheetbind
//!
//! Fill spreadsheet templates with repeating, data-bound content.
//!
//! A template marks the blocks to repeat with defined names. Given a list of
//! records, sheetbind either
//!
//! - replicates a named block of rows (downwards) or columns (to the right)
//!   once per record and fills every copy, or
//! - clones a whole sheet once per record and fills every clone.
//!
//! Copies are always made from the untouched template block; the first
//! record is written onto the template itself after every copy exists.
//!
//! ## Example
//!
//! ```rust
//! use sheetbind::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! workbook.define_name("row", "Sheet1!$A$2:$B$2").unwrap();
//! workbook.define_name("item", "Sheet1!$A$2").unwrap();
//! workbook.define_name("qty", "Sheet1!$B$2").unwrap();
//!
//! let items = [("Fan", 3.0), ("Lamp", 1.0)];
//! bind_vertical_insert(&mut workbook, 0, "row", 0, &items, |mut range, (item, qty)| {
//!     range.set_value("item", *item)?;
//!     range.set_value("qty", *qty)
//! })
//! .unwrap();
//!
//! let sheet = workbook.worksheet(0).unwrap();
//! assert_eq!(sheet.get_value("A3").unwrap().as_string(), Some("Lamp"));
//! ```

pub mod binding;
pub mod copy;
pub mod prelude;
pub mod replicate;
pub mod sheet;
pub mod template;

pub use binding::{bind_horizontal, bind_vertical, bind_vertical_insert};
pub use copy::copy_cell;
pub use replicate::{horizontal_copy, vertical_copy, RangeCopyExt};
pub use sheet::{bind_sheets, copy_sheet_setup, SheetMut};
pub use template::{
    CodecRegistry, DirectorySource, DocumentCodec, MemorySource, Rendered, Renderer,
    TemplateFormat, TemplateSource, XlsCodec, XlsxCodec,
};

// Re-export core types
pub use sheetbind_core::{
    sanitize_sheet_name, AreaReference, BorderLineStyle, BorderStyle, Cell, CellAddress,
    CellComment, CellError, CellRange, CellType, CellValue, Color, Error, FillStyle, FontStyle,
    HeaderFooter, Hyperlink, HyperlinkKind, NameScope, NamedRange, PageMargins, PageOrientation,
    PageSetup, PrintOptions, Range, RangeMut, Result, Style, StyleId, Workbook, Worksheet,
    MAX_COLS, MAX_ROWS, MAX_SHEET_NAME_LEN,
};

// Re-export I/O types
pub use sheetbind_xls::{XlsError, XlsReader};
pub use sheetbind_xlsx::{XlsxError, XlsxReader, XlsxWriter};

use std::path::Path;

/// Extension trait for Workbook to add file I/O
pub trait WorkbookExt {
    /// Open a workbook from a file
    fn open<P: AsRef<Path>>(path: P) -> Result<Workbook>;

    /// Save the workbook to a file
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()>;
}

impl WorkbookExt for Workbook {
    fn open<P: AsRef<Path>>(path: P) -> Result<Workbook> {
        let path = path.as_ref();
        match TemplateFormat::from_identifier(&path.to_string_lossy())? {
            TemplateFormat::Xlsx => Ok(XlsxReader::read_file(path)?),
            TemplateFormat::Xls => Ok(XlsReader::read_file(path)?),
        }
    }

    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        match TemplateFormat::from_identifier(&path.to_string_lossy())? {
            TemplateFormat::Xlsx => Ok(XlsxWriter::write_file(self, path)?),
            TemplateFormat::Xls => Err(Error::UnsupportedFormat(format!(
                "xls documents are read only: {}",
                path.display()
            ))),
        }
    }
}
