//! Row types

use crate::cell::Cell;
use std::collections::BTreeMap;

/// A worksheet row: metadata plus its sparse cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// Row index (0-based)
    pub index: u32,
    /// Custom height in points (None = default)
    pub height: Option<f64>,
    /// Row is hidden
    pub hidden: bool,
    /// Cells keyed by column index
    pub cells: BTreeMap<u16, Cell>,
}

impl Row {
    /// Create a new empty row with default settings
    pub fn new(index: u32) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    /// Get a cell by column index
    pub fn cell(&self, col: u16) -> Option<&Cell> {
        self.cells.get(&col)
    }

    /// Get a mutable cell by column index
    pub fn cell_mut(&mut self, col: u16) -> Option<&mut Cell> {
        self.cells.get_mut(&col)
    }

    /// Replace the cell at `col` with a fresh one and return it
    pub fn create_cell(&mut self, col: u16) -> &mut Cell {
        let slot = self.cells.entry(col).or_default();
        *slot = Cell::default();
        slot
    }

    /// Get the cell at `col`, creating an empty one if missing
    pub fn cell_mut_or_create(&mut self, col: u16) -> &mut Cell {
        self.cells.entry(col).or_default()
    }

    /// Check if this row has any custom settings
    pub fn has_custom_settings(&self) -> bool {
        self.height.is_some() || self.hidden
    }

    /// Check if row has no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Highest column index holding a cell
    pub fn last_col(&self) -> Option<u16> {
        self.cells.keys().next_back().copied()
    }
}
