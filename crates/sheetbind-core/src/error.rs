//! Error types for sheetbind

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error raised by a caller-supplied collaborator (fill callback, codec)
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while building or filling a document
///
/// Every variant aborts the whole generation pass; there is no partial
/// success mode.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid cell address format
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// Invalid cell range or area reference
    #[error("Invalid cell range: {0}")]
    InvalidRange(String),

    /// Row index out of bounds (signed so that negative targets can be reported)
    #[error("Row index {0} out of bounds (max: {1})")]
    RowOutOfBounds(i64, u32),

    /// Column index out of bounds
    #[error("Column index {0} out of bounds (max: {1})")]
    ColumnOutOfBounds(i64, u16),

    /// Sheet index out of bounds
    #[error("Sheet index {0} out of bounds (count: {1})")]
    SheetOutOfBounds(usize, usize),

    /// Sheet not found by name
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// Invalid sheet name
    #[error("Invalid sheet name: {0}")]
    InvalidSheetName(String),

    /// Duplicate sheet name
    #[error("Sheet name already exists: {0}")]
    DuplicateSheetName(String),

    /// Invalid named range definition
    #[error("Invalid named range: {0}")]
    InvalidName(String),

    /// A symbolic name has no definition
    #[error("Unresolved name: {0}")]
    UnresolvedName(String),

    /// Invalid style id
    #[error("Invalid style id: {0}")]
    InvalidStyleIndex(u32),

    /// Merged cell conflict
    #[error("Range {0} overlaps an existing merged region")]
    MergedCellConflict(String),

    /// The template identifier's dialect cannot be determined or has no codec
    #[error("Unsupported template format: {0}")]
    UnsupportedFormat(String),

    /// The template cannot be located or opened
    #[error("Cannot load template '{id}': {source}")]
    ResourceLoad {
        /// Template identifier
        id: String,
        /// Underlying failure
        #[source]
        source: BoxError,
    },

    /// A fill callback failed
    #[error("Fill callback failed: {0}")]
    Fill(#[source] BoxError),

    /// Reading or writing the binary document failed
    #[error("Codec error: {0}")]
    Codec(#[source] BoxError),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Wrap an error raised inside a fill callback
    pub fn fill<E: Into<BoxError>>(err: E) -> Self {
        Error::Fill(err.into())
    }

    /// Wrap an error raised by a document codec
    pub fn codec<E: Into<BoxError>>(err: E) -> Self {
        Error::Codec(err.into())
    }

    /// Wrap a template loading failure
    pub fn resource_load<S: Into<String>, E: Into<BoxError>>(id: S, err: E) -> Self {
        Error::ResourceLoad {
            id: id.into(),
            source: err.into(),
        }
    }
}
