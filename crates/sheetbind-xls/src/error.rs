//! XLS error types

use thiserror::Error;

/// Result type for XLS operations
pub type XlsResult<T> = std::result::Result<T, XlsError>;

/// Errors that can occur while reading an XLS template
#[derive(Debug, Error)]
pub enum XlsError {
    /// IO error (the cfb crate reports container errors through `std::io::Error`)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Not a BIFF8 workbook
    #[error("Invalid XLS format: {0}")]
    InvalidFormat(String),

    /// BIFF5 and older streams
    #[error("Unsupported XLS version: {0}")]
    UnsupportedVersion(String),

    /// Truncated or malformed record
    #[error("Parse error: {0}")]
    Parse(String),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] sheetbind_core::Error),
}

impl From<XlsError> for sheetbind_core::Error {
    fn from(err: XlsError) -> Self {
        match err {
            XlsError::Core(e) => e,
            other => sheetbind_core::Error::codec(other),
        }
    }
}
