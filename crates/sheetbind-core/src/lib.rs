//! # sheetbind-core
//!
//! Document model for the sheetbind template engine.
//!
//! This crate provides the in-memory spreadsheet the replication engine
//! operates on:
//! - [`Workbook`], [`Worksheet`], [`Row`], [`Cell`] - the document structure
//! - [`CellValue`] - the closed set of cell values
//! - [`CellAddress`], [`CellRange`], [`AreaReference`] - addressing
//! - [`Style`] and [`StylePool`] - styles shared by [`StyleId`]
//! - [`Range`] and [`RangeMut`] - symbolic handles over named template blocks
//!
//! ## Example
//!
//! ```rust
//! use sheetbind_core::{Range, Workbook};
//!
//! let mut workbook = Workbook::new();
//! workbook.define_name("total", "Sheet1!$B$2").unwrap();
//!
//! let range = Range::new(0, 0, 0, "total");
//! range.view(&mut workbook).set_value("total", 42.0).unwrap();
//!
//! let sheet = workbook.worksheet(0).unwrap();
//! assert_eq!(sheet.get_value("B2").unwrap().as_number(), Some(42.0));
//! ```

pub mod cell;
pub mod comment;
pub mod error;
pub mod hyperlink;
pub mod named_range;
pub mod page_setup;
pub mod range;
pub mod row;
pub mod style;
pub mod workbook;
pub mod worksheet;

// Re-exports for convenience
pub use cell::{Cell, CellAddress, CellError, CellRange, CellType, CellValue, SharedString};
pub use comment::CellComment;
pub use error::{Error, Result};
pub use hyperlink::{Hyperlink, HyperlinkKind};
pub use named_range::{AreaReference, NameScope, NamedRange, NamedRangeCollection};
pub use page_setup::{HeaderFooter, PageMargins, PageOrientation, PageSetup, PrintOptions};
pub use range::{Range, RangeMut};
pub use row::Row;
pub use style::{
    Alignment, BorderEdge, BorderLineStyle, BorderStyle, Color, FillStyle, FontStyle, HorizontalAlignment,
    NumberFormat, Style, StyleId, StylePool, VerticalAlignment,
};
pub use workbook::{sanitize_sheet_name, Workbook};
pub use worksheet::Worksheet;

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
