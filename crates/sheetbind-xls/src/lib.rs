//! # sheetbind-xls
//!
//! Legacy Excel binary (.xls, BIFF8) template reader for sheetbind.
//!
//! Only reading is supported. A template read from BIFF8 is written back
//! through the xlsx codec.

pub mod biff;
pub mod error;
pub mod reader;
pub mod styles;

pub use error::{XlsError, XlsResult};
pub use reader::XlsReader;
