//! Cell comments (notes)
//!
//! A comment travels with its cell when a template block is replicated.
//!
//! ## Example
//!
//! ```rust
//! use sheetbind_core::{CellComment, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_comment("A1", CellComment::new("Billing", "Net amount")).unwrap();
//!
//! let cell = sheet.cell_at(0, 0).unwrap();
//! assert_eq!(cell.comment.as_ref().unwrap().text, "Net amount");
//! ```

/// A cell comment/note
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellComment {
    /// Author of the comment
    pub author: String,
    /// Comment text content
    pub text: String,
    /// Whether the comment box is visible by default
    pub visible: bool,
}

impl CellComment {
    /// Create a new hidden comment with the given author and text
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            visible: false,
        }
    }

    /// Create a comment with just text (empty author)
    pub fn text_only(text: impl Into<String>) -> Self {
        Self::new(String::new(), text)
    }

    /// Set whether the comment is visible by default
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Check if this comment has an author
    pub fn has_author(&self) -> bool {
        !self.author.is_empty()
    }
}
