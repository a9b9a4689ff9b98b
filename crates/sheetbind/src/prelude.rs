//! Prelude module - common imports for sheetbind users
//!
//! ```rust
//! use sheetbind::prelude::*;
//! ```

pub use crate::{
    // Bindings
    bind_horizontal,
    bind_sheets,
    bind_vertical,
    bind_vertical_insert,

    // Cell types
    Cell,
    CellAddress,
    CellComment,
    CellError,
    CellRange,
    CellValue,
    Hyperlink,

    // Error types
    Error,
    Result,

    // Templates
    DirectorySource,
    MemorySource,
    Renderer,
    TemplateFormat,

    // Main types
    Range,
    RangeCopyExt,
    RangeMut,
    SheetMut,
    Style,
    StyleId,
    Workbook,
    WorkbookExt,
    Worksheet,

    // I/O types
    XlsxReader,
    XlsxWriter,
};
