//! Cell-related types
//!
//! This module contains:
//! - [`Cell`] - a stored cell: value, shared style, annotations
//! - [`CellValue`] - the value stored in a cell
//! - [`CellType`] - the closed type tag of a value
//! - [`CellAddress`] / [`CellRange`] - A1 addressing

mod address;
mod value;

pub use address::{checked_col, checked_row, CellAddress, CellRange};
pub use value::{CellError, CellType, CellValue, SharedString};

use crate::comment::CellComment;
use crate::hyperlink::Hyperlink;
use crate::style::StyleId;

/// A single stored cell
///
/// The style is a reference into the workbook's style pool; cloning a cell
/// shares the style instead of duplicating it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    /// The cell's value
    pub value: CellValue,
    /// Shared style reference (None = default style)
    pub style: Option<StyleId>,
    /// Attached comment
    pub comment: Option<CellComment>,
    /// Attached hyperlink
    pub hyperlink: Option<Hyperlink>,
}

impl Cell {
    /// Create a cell holding a value with the default style
    pub fn new(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// Builder: attach a style
    pub fn with_style(mut self, style: StyleId) -> Self {
        self.style = Some(style);
        self
    }

    /// The closed type tag of this cell's value
    pub fn cell_type(&self) -> CellType {
        self.value.cell_type()
    }

    /// A blank cell: no value, default style, no annotations
    pub fn is_blank(&self) -> bool {
        self.value.is_empty()
            && self.style.is_none()
            && self.comment.is_none()
            && self.hyperlink.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_type_follows_value() {
        assert_eq!(Cell::default().cell_type(), CellType::Empty);
        assert_eq!(Cell::new("x").cell_type(), CellType::String);
        assert_eq!(Cell::new(1.5).cell_type(), CellType::Number);
        assert_eq!(Cell::new(true).cell_type(), CellType::Boolean);
    }

    #[test]
    fn test_blank() {
        assert!(Cell::default().is_blank());
        assert!(!Cell::default().with_style(StyleId(3)).is_blank());
    }
}
