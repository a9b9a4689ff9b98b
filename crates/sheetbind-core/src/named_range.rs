//! Named range definitions and area references
//!
//! Template blocks are addressed by name: a workbook defines `row` as
//! `Sheet1!$A$3:$F$4`, and the engine resolves that formula into an
//! [`AreaReference`] before copying.
//!
//! # Example
//!
//! ```
//! use sheetbind_core::AreaReference;
//!
//! let area = AreaReference::parse("'Q1 Sales'!$A$3:$F$4").unwrap();
//! assert_eq!(area.sheet.as_deref(), Some("Q1 Sales"));
//! assert_eq!((area.first_row(), area.last_row()), (2, 3));
//! assert_eq!((area.first_col(), area.last_col()), (0, 5));
//! ```

use crate::cell::{CellAddress, CellRange};
use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::collections::HashMap;
use std::fmt;

/// Scope of a named range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NameScope {
    /// Available throughout the workbook (global)
    Workbook,
    /// Scoped to a specific sheet (local)
    Sheet(usize),
}

/// A named range definition
#[derive(Debug, Clone, PartialEq)]
pub struct NamedRange {
    /// The name (case-insensitive)
    pub name: String,
    /// Scope of this name
    pub scope: NameScope,
    /// Formula the name refers to, e.g. "Sheet1!$A$1:$D$10"
    pub refers_to: String,
    /// Whether this name is hidden from the UI
    pub hidden: bool,
}

impl NamedRange {
    /// Create a new named range
    pub fn new(name: impl Into<String>, refers_to: impl Into<String>, scope: NameScope) -> Self {
        Self {
            name: name.into(),
            scope,
            refers_to: refers_to.into(),
            hidden: false,
        }
    }

    /// Create a workbook-scoped named range
    pub fn workbook_scope(name: impl Into<String>, refers_to: impl Into<String>) -> Self {
        Self::new(name, refers_to, NameScope::Workbook)
    }

    /// Create a sheet-scoped named range
    pub fn sheet_scope(
        name: impl Into<String>,
        refers_to: impl Into<String>,
        sheet_index: usize,
    ) -> Self {
        Self::new(name, refers_to, NameScope::Sheet(sheet_index))
    }

    /// Mark this named range as hidden
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Parse the definition as an area reference
    pub fn area(&self) -> Result<AreaReference> {
        AreaReference::parse(&self.refers_to)
    }
}

/// Collection of named ranges with case-insensitive lookup
#[derive(Debug, Default, Clone)]
pub struct NamedRangeCollection {
    ranges: HashMap<(String, NameScope), NamedRange>,
}

impl NamedRangeCollection {
    /// Create a new empty collection
    pub fn new() -> Self {
        Self::default()
    }

    fn make_key(name: &str, scope: NameScope) -> (String, NameScope) {
        (name.to_lowercase(), scope)
    }

    /// Define a new named range
    ///
    /// Returns an error if a name with the same scope already exists
    pub fn define(&mut self, range: NamedRange) -> Result<()> {
        let key = Self::make_key(&range.name, range.scope);
        if self.ranges.contains_key(&key) {
            return Err(Error::InvalidName(format!(
                "'{}' already exists in this scope",
                range.name
            )));
        }
        self.ranges.insert(key, range);
        Ok(())
    }

    /// Define or update a named range
    pub fn define_or_update(&mut self, range: NamedRange) {
        let key = Self::make_key(&range.name, range.scope);
        self.ranges.insert(key, range);
    }

    /// Get a named range visible from `current_sheet`
    ///
    /// A sheet-scoped definition wins over a workbook-scoped one.
    pub fn get(&self, name: &str, current_sheet: usize) -> Option<&NamedRange> {
        self.ranges
            .get(&Self::make_key(name, NameScope::Sheet(current_sheet)))
            .or_else(|| self.ranges.get(&Self::make_key(name, NameScope::Workbook)))
    }

    /// Get a named range by exact scope
    pub fn get_exact(&self, name: &str, scope: NameScope) -> Option<&NamedRange> {
        self.ranges.get(&Self::make_key(name, scope))
    }

    /// Remove a named range
    pub fn remove(&mut self, name: &str, scope: NameScope) -> Option<NamedRange> {
        self.ranges.remove(&Self::make_key(name, scope))
    }

    /// Drop every name scoped to `sheet` and renumber scopes of later sheets
    ///
    /// Called when a sheet is removed from the workbook.
    pub fn remove_sheet(&mut self, sheet: usize) {
        let ranges = std::mem::take(&mut self.ranges);
        for (_, mut range) in ranges {
            match range.scope {
                NameScope::Sheet(idx) if idx == sheet => continue,
                NameScope::Sheet(idx) if idx > sheet => range.scope = NameScope::Sheet(idx - 1),
                _ => {}
            }
            self.define_or_update(range);
        }
    }

    /// Update sheet indices after a sheet was inserted at `sheet`
    pub fn insert_sheet(&mut self, sheet: usize) {
        let ranges = std::mem::take(&mut self.ranges);
        for (_, mut range) in ranges {
            if let NameScope::Sheet(idx) = range.scope {
                if idx >= sheet {
                    range.scope = NameScope::Sheet(idx + 1);
                }
            }
            self.define_or_update(range);
        }
    }

    /// Iterate over all named ranges, ordered by name for stable output
    pub fn iter(&self) -> impl Iterator<Item = &NamedRange> {
        let mut all: Vec<_> = self.ranges.iter().collect();
        all.sort_by(|a, b| a.0.cmp(b.0));
        all.into_iter().map(|(_, range)| range)
    }

    /// Get the number of named ranges
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// A rectangular cell area with an optional sheet qualifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaReference {
    /// Sheet name, when the reference is qualified
    pub sheet: Option<String>,
    /// Top-left cell
    pub first: CellAddress,
    /// Bottom-right cell (equal to `first` for a single cell)
    pub last: CellAddress,
}

impl AreaReference {
    /// Parse `Sheet1!$A$3:$F$4`, `'My Sheet'!$B$2`, `$A$1` or `B3:C4`
    ///
    /// Whole rows (`Sheet1!$3:$4`) span every column and whole columns
    /// (`Sheet1!$B:$D`) span every row. A leading `=` is accepted.
    pub fn parse(formula: &str) -> Result<Self> {
        let formula = formula.trim();
        let formula = formula.strip_prefix('=').unwrap_or(formula);
        if formula.is_empty() {
            return Err(Error::InvalidRange("empty reference".into()));
        }

        let (sheet, area) = match formula.rfind('!') {
            Some(pos) => (Some(unquote_sheet(&formula[..pos])?), &formula[pos + 1..]),
            None => (None, formula),
        };

        let range = CellRange::parse(area)
            .or_else(|_| parse_whole_lines(area))
            .map_err(|_| Error::InvalidRange(format!("'{}' is not an area reference", formula)))?;

        Ok(Self {
            sheet,
            first: range.start,
            last: range.end,
        })
    }

    /// First row index
    pub fn first_row(&self) -> u32 {
        self.first.row
    }

    /// Last row index
    pub fn last_row(&self) -> u32 {
        self.last.row
    }

    /// First column index
    pub fn first_col(&self) -> u16 {
        self.first.col
    }

    /// Last column index
    pub fn last_col(&self) -> u16 {
        self.last.col
    }

    /// Number of rows covered
    pub fn row_count(&self) -> u32 {
        self.last.row - self.first.row + 1
    }

    /// Check if the area covers whole rows (`$3:$4`)
    pub fn is_whole_rows(&self) -> bool {
        self.first.col == 0 && self.last.col == MAX_COLS - 1
    }

    /// Check if the area covers whole columns (`$B:$D`)
    pub fn is_whole_cols(&self) -> bool {
        self.first.row == 0 && self.last.row == MAX_ROWS - 1
    }

    /// Number of columns covered
    pub fn col_count(&self) -> u16 {
        self.last.col - self.first.col + 1
    }

    /// The area as an unqualified cell range
    pub fn range(&self) -> CellRange {
        CellRange::new(self.first, self.last)
    }

    /// Format as an absolute, sheet-qualified formula
    pub fn to_formula(&self, sheet: &str) -> String {
        let first = CellAddress::absolute(self.first.row, self.first.col);
        let last = CellAddress::absolute(self.last.row, self.last.col);
        format!("{}!{}", quote_sheet(sheet), self.area_text(first, last))
    }

    fn area_text(&self, first: CellAddress, last: CellAddress) -> String {
        if self.is_whole_rows() {
            format!("${}:${}", first.row + 1, last.row + 1)
        } else if self.is_whole_cols() {
            format!(
                "${}:${}",
                CellAddress::column_to_letters(first.col),
                CellAddress::column_to_letters(last.col)
            )
        } else if first == last {
            first.to_a1_string()
        } else {
            format!("{}:{}", first, last)
        }
    }
}

impl fmt::Display for AreaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write!(f, "{}!", quote_sheet(sheet))?;
        }
        f.write_str(&self.area_text(self.first, self.last))
    }
}

/// Parse whole rows (`$3:$4`, `5:5`) or whole columns (`$B:$D`, `C:C`)
fn parse_whole_lines(area: &str) -> Result<CellRange> {
    let (a, b) = area
        .split_once(':')
        .ok_or_else(|| Error::InvalidRange(format!("'{}' is not a row or column span", area)))?;
    let a = a.trim().trim_start_matches('$');
    let b = b.trim().trim_start_matches('$');

    if a.bytes().all(|c| c.is_ascii_digit()) && b.bytes().all(|c| c.is_ascii_digit()) {
        let row = |s: &str| -> Result<u32> {
            match s.parse::<u32>() {
                Ok(n) if (1..=MAX_ROWS).contains(&n) => Ok(n - 1),
                _ => Err(Error::InvalidRange(format!("invalid row '{}'", s))),
            }
        };
        return Ok(CellRange::new(
            CellAddress::absolute(row(a)?, 0),
            CellAddress::absolute(row(b)?, MAX_COLS - 1),
        ));
    }

    let first = CellAddress::letters_to_column(a)?;
    let last = CellAddress::letters_to_column(b)?;
    Ok(CellRange::new(
        CellAddress::absolute(0, first),
        CellAddress::absolute(MAX_ROWS - 1, last),
    ))
}

/// Strip quotes from a sheet qualifier (`'It''s'` -> `It's`)
fn unquote_sheet(s: &str) -> Result<String> {
    if let Some(inner) = s.strip_prefix('\'') {
        let inner = inner
            .strip_suffix('\'')
            .ok_or_else(|| Error::InvalidRange(format!("unterminated sheet name {}", s)))?;
        Ok(inner.replace("''", "'"))
    } else if s.is_empty() {
        Err(Error::InvalidRange("empty sheet qualifier".into()))
    } else {
        Ok(s.to_string())
    }
}

/// Quote a sheet name when a formula needs it
pub fn quote_sheet(name: &str) -> String {
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}
