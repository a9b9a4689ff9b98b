//! Worksheet implementation

use std::collections::BTreeMap;

use log::trace;

use crate::cell::{Cell, CellAddress, CellRange, CellValue};
use crate::comment::CellComment;
use crate::error::{Error, Result};
use crate::hyperlink::Hyperlink;
use crate::page_setup::{HeaderFooter, PageMargins, PageSetup, PrintOptions};
use crate::row::Row;
use crate::style::StyleId;
use crate::{MAX_COLS, MAX_ROWS};

/// A worksheet (single sheet in a workbook)
#[derive(Debug, Clone)]
pub struct Worksheet {
    /// Sheet name
    name: String,
    /// Sparse rows keyed by row index
    rows: BTreeMap<u32, Row>,
    /// Merged regions
    merged_regions: Vec<CellRange>,
    /// Custom column widths (in characters)
    column_widths: BTreeMap<u16, f64>,
    /// Sheet is visible
    visible: bool,
    /// Print settings
    page_setup: PageSetup,
    margins: PageMargins,
    print_options: PrintOptions,
    header_footer: HeaderFooter,
}

impl Worksheet {
    /// Create a new worksheet with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            rows: BTreeMap::new(),
            merged_regions: Vec::new(),
            column_widths: BTreeMap::new(),
            visible: true,
            page_setup: PageSetup::default(),
            margins: PageMargins::default(),
            print_options: PrintOptions::default(),
            header_footer: HeaderFooter::default(),
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the sheet name without validation (see [`crate::Workbook::rename_worksheet`])
    pub(crate) fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    /// Check if sheet is visible
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Set sheet visibility
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    // === Rows ===

    /// Get a row by index
    pub fn row(&self, row: u32) -> Option<&Row> {
        self.rows.get(&row)
    }

    /// Get a mutable row by index
    pub fn row_mut(&mut self, row: u32) -> Option<&mut Row> {
        self.rows.get_mut(&row)
    }

    /// Check whether a row exists
    pub fn has_row(&self, row: u32) -> bool {
        self.rows.contains_key(&row)
    }

    /// Get a row, creating an empty one if missing
    pub fn ensure_row(&mut self, row: u32) -> Result<&mut Row> {
        validate_row(row)?;
        Ok(self.rows.entry(row).or_insert_with(|| Row::new(row)))
    }

    /// Iterate over existing rows in ascending order
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    /// Index of the last existing row (None for an empty sheet)
    pub fn last_row_index(&self) -> Option<u32> {
        self.rows.keys().next_back().copied()
    }

    /// Get row height (None = default)
    pub fn row_height(&self, row: u32) -> Option<f64> {
        self.rows.get(&row).and_then(|r| r.height)
    }

    /// Set row height
    pub fn set_row_height(&mut self, row: u32, height: f64) -> Result<()> {
        self.ensure_row(row)?.height = Some(height);
        Ok(())
    }

    /// Set row hidden state
    pub fn set_row_hidden(&mut self, row: u32, hidden: bool) -> Result<()> {
        self.ensure_row(row)?.hidden = hidden;
        Ok(())
    }

    /// Move rows `[start, end]` by `n` (negative moves up)
    ///
    /// Rows in the target band are overwritten. Merged regions lying fully
    /// inside the moved band move with it; regions only partly inside stay.
    pub fn shift_rows(&mut self, start: u32, end: u32, n: i64) -> Result<()> {
        if start > end || n == 0 {
            return Ok(());
        }
        let new_start = start as i64 + n;
        let new_end = end as i64 + n;
        if new_start < 0 {
            return Err(Error::RowOutOfBounds(new_start, MAX_ROWS - 1));
        }
        if new_end >= MAX_ROWS as i64 {
            return Err(Error::RowOutOfBounds(new_end, MAX_ROWS - 1));
        }
        trace!(
            "sheet '{}': shifting rows {}..={} by {}",
            self.name,
            start,
            end,
            n
        );

        let keys: Vec<u32> = self.rows.range(start..=end).map(|(k, _)| *k).collect();
        let moved: Vec<Row> = keys.iter().filter_map(|k| self.rows.remove(k)).collect();

        let targets: Vec<u32> = self
            .rows
            .range(new_start as u32..=new_end as u32)
            .map(|(k, _)| *k)
            .collect();
        for k in targets {
            self.rows.remove(&k);
        }

        for mut row in moved {
            row.index = (row.index as i64 + n) as u32;
            self.rows.insert(row.index, row);
        }

        for region in &mut self.merged_regions {
            if region.first_row() >= start && region.last_row() <= end {
                *region = region.offset(n, 0)?;
            }
        }
        Ok(())
    }

    // === Cell Access ===

    /// Get a cell by address string (e.g., "A1")
    pub fn cell(&self, address: &str) -> Result<Option<&Cell>> {
        let addr = CellAddress::parse(address)?;
        Ok(self.cell_at(addr.row, addr.col))
    }

    /// Get a cell by row and column indices
    pub fn cell_at(&self, row: u32, col: u16) -> Option<&Cell> {
        self.rows.get(&row).and_then(|r| r.cell(col))
    }

    /// Get a mutable cell by row and column indices
    pub fn cell_at_mut(&mut self, row: u32, col: u16) -> Option<&mut Cell> {
        self.rows.get_mut(&row).and_then(|r| r.cell_mut(col))
    }

    /// Get the cell at a position, creating the row and cell if missing
    pub fn cell_mut_or_create(&mut self, row: u32, col: u16) -> Result<&mut Cell> {
        validate_col(col)?;
        Ok(self.ensure_row(row)?.cell_mut_or_create(col))
    }

    /// Overwrite the cell at a position with a fresh one and return it
    pub fn create_cell(&mut self, row: u32, col: u16) -> Result<&mut Cell> {
        validate_col(col)?;
        Ok(self.ensure_row(row)?.create_cell(col))
    }

    /// Get cell value (convenience method)
    pub fn get_value(&self, address: &str) -> Result<CellValue> {
        let addr = CellAddress::parse(address)?;
        Ok(self.get_value_at(addr.row, addr.col))
    }

    /// Get cell value by indices
    pub fn get_value_at(&self, row: u32, col: u16) -> CellValue {
        self.cell_at(row, col)
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    // === Cell Modification ===

    /// Set a cell value by address string
    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(addr.row, addr.col, value)
    }

    /// Set a cell value by row and column indices
    pub fn set_cell_value_at<V: Into<CellValue>>(
        &mut self,
        row: u32,
        col: u16,
        value: V,
    ) -> Result<()> {
        self.cell_mut_or_create(row, col)?.value = value.into();
        Ok(())
    }

    /// Set a cell formula by address string
    pub fn set_cell_formula(&mut self, address: &str, formula: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_formula_at(addr.row, addr.col, formula)
    }

    /// Set a cell formula by row and column indices (no cached result)
    pub fn set_cell_formula_at(&mut self, row: u32, col: u16, formula: &str) -> Result<()> {
        self.set_cell_value_at(row, col, CellValue::formula(formula))
    }

    /// Set a cell's shared style by address string
    pub fn set_cell_style(&mut self, address: &str, style: StyleId) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_style_at(addr.row, addr.col, style)
    }

    /// Set a cell's shared style by row and column indices
    pub fn set_cell_style_at(&mut self, row: u32, col: u16, style: StyleId) -> Result<()> {
        self.cell_mut_or_create(row, col)?.style = Some(style);
        Ok(())
    }

    /// Remove a cell
    pub fn clear_cell_at(&mut self, row: u32, col: u16) -> Option<Cell> {
        self.rows.get_mut(&row).and_then(|r| r.cells.remove(&col))
    }

    // === Annotations ===

    /// Set a comment on a cell by address string
    pub fn set_comment(&mut self, address: &str, comment: CellComment) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_comment_at(addr.row, addr.col, comment)
    }

    /// Set a comment on a cell by row and column indices
    pub fn set_comment_at(&mut self, row: u32, col: u16, comment: CellComment) -> Result<()> {
        self.cell_mut_or_create(row, col)?.comment = Some(comment);
        Ok(())
    }

    /// Set a hyperlink on a cell by address string
    pub fn set_hyperlink(&mut self, address: &str, link: Hyperlink) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_hyperlink_at(addr.row, addr.col, link)
    }

    /// Set a hyperlink on a cell by row and column indices
    pub fn set_hyperlink_at(&mut self, row: u32, col: u16, link: Hyperlink) -> Result<()> {
        self.cell_mut_or_create(row, col)?.hyperlink = Some(link);
        Ok(())
    }

    /// All comment authors, in order of first appearance
    pub fn comment_authors(&self) -> Vec<&str> {
        let mut authors: Vec<&str> = Vec::new();
        for (_, _, cell) in self.iter_cells() {
            if let Some(c) = &cell.comment {
                if !authors.contains(&c.author.as_str()) {
                    authors.push(&c.author);
                }
            }
        }
        authors
    }

    // === Columns ===

    /// Get custom column width (None = default)
    pub fn column_width(&self, col: u16) -> Option<f64> {
        self.column_widths.get(&col).copied()
    }

    /// Set column width
    pub fn set_column_width(&mut self, col: u16, width: f64) -> Result<()> {
        validate_col(col)?;
        self.column_widths.insert(col, width);
        Ok(())
    }

    /// Get all custom column widths
    pub fn column_widths(&self) -> &BTreeMap<u16, f64> {
        &self.column_widths
    }

    // === Merged Cells ===

    /// Get merged regions
    pub fn merged_regions(&self) -> &[CellRange] {
        &self.merged_regions
    }

    /// Merge cells, rejecting overlap with an existing region
    pub fn merge_cells(&mut self, range: &CellRange) -> Result<()> {
        if self.merged_regions.iter().any(|r| range.overlaps(r)) {
            return Err(Error::MergedCellConflict(range.to_string()));
        }
        self.merged_regions.push(*range);
        Ok(())
    }

    /// Append a merged region without overlap checks
    pub fn add_merged_region(&mut self, range: CellRange) {
        self.merged_regions.push(range);
    }

    /// Unmerge cells
    pub fn unmerge_cells(&mut self, range: &CellRange) -> bool {
        match self.merged_regions.iter().position(|r| r == range) {
            Some(i) => {
                self.merged_regions.remove(i);
                true
            }
            None => false,
        }
    }

    // === Print settings ===

    pub fn page_setup(&self) -> &PageSetup {
        &self.page_setup
    }

    pub fn page_setup_mut(&mut self) -> &mut PageSetup {
        &mut self.page_setup
    }

    pub fn margins(&self) -> &PageMargins {
        &self.margins
    }

    pub fn margins_mut(&mut self) -> &mut PageMargins {
        &mut self.margins
    }

    pub fn print_options(&self) -> &PrintOptions {
        &self.print_options
    }

    pub fn print_options_mut(&mut self) -> &mut PrintOptions {
        &mut self.print_options
    }

    pub fn header_footer(&self) -> &HeaderFooter {
        &self.header_footer
    }

    pub fn header_footer_mut(&mut self) -> &mut HeaderFooter {
        &mut self.header_footer
    }

    // === Iteration ===

    /// Get the used range (bounds of all stored cells)
    pub fn used_range(&self) -> Option<CellRange> {
        let mut bounds: Option<(u32, u16, u32, u16)> = None;
        for (row, col, _) in self.iter_cells() {
            bounds = Some(match bounds {
                None => (row, col, row, col),
                Some((r0, c0, r1, c1)) => (r0.min(row), c0.min(col), r1.max(row), c1.max(col)),
            });
        }
        bounds.map(|(r0, c0, r1, c1)| CellRange::from_indices(r0, c0, r1, c1))
    }

    /// Get the number of stored cells
    pub fn cell_count(&self) -> usize {
        self.rows.values().map(|r| r.cells.len()).sum()
    }

    /// Check if the worksheet holds no cells
    pub fn is_empty(&self) -> bool {
        self.rows.values().all(Row::is_empty)
    }

    /// Iterate over all stored cells in row-major order
    pub fn iter_cells(&self) -> impl Iterator<Item = (u32, u16, &Cell)> {
        self.rows
            .iter()
            .flat_map(|(r, row)| row.cells.iter().map(move |(c, cell)| (*r, *c, cell)))
    }
}

fn validate_row(row: u32) -> Result<()> {
    if row >= MAX_ROWS {
        return Err(Error::RowOutOfBounds(row as i64, MAX_ROWS - 1));
    }
    Ok(())
}

fn validate_col(col: u16) -> Result<()> {
    if col >= MAX_COLS {
        return Err(Error::ColumnOutOfBounds(col as i64, MAX_COLS - 1));
    }
    Ok(())
}
