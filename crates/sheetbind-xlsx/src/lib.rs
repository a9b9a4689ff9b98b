//! # sheetbind-xlsx
//!
//! XLSX (Office Open XML) reader and writer for sheetbind.
//!
//! Only the parts a template engine needs survive a read/write cycle:
//! cell values (with cached formula results), the cellXfs style table,
//! row heights, column widths, merged regions, comments, hyperlinks,
//! defined names and the page/print settings.

pub mod error;
pub mod reader;
pub mod writer;

mod print_titles;
mod styles;

pub use error::{XlsxError, XlsxResult};
pub use reader::XlsxReader;
pub use writer::XlsxWriter;
