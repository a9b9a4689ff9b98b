//! Workbook type - the main document structure

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::named_range::{AreaReference, NameScope, NamedRange, NamedRangeCollection};
use crate::style::{Style, StyleId, StylePool};
use crate::worksheet::Worksheet;
use crate::MAX_SHEET_NAME_LEN;

/// Characters a sheet name cannot contain
static INVALID_SHEET_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[:\\/?*\[\]]").expect("valid sheet name pattern"));

/// Make arbitrary text usable as a sheet name
///
/// Each forbidden character becomes `-` and the result is cut to the
/// maximum sheet name length. Uniqueness is still checked on rename.
///
/// ```
/// use sheetbind_core::sanitize_sheet_name;
///
/// assert_eq!(sanitize_sheet_name("Q1/Q2 [draft]"), "Q1-Q2 -draft-");
/// ```
pub fn sanitize_sheet_name(name: &str) -> String {
    INVALID_SHEET_CHARS
        .replace_all(name, "-")
        .chars()
        .take(MAX_SHEET_NAME_LEN)
        .collect()
}

/// A workbook (spreadsheet document)
///
/// A workbook owns its worksheets, the defined names and the style pool
/// shared by every cell of every sheet.
#[derive(Debug, Clone)]
pub struct Workbook {
    /// Worksheets in the workbook
    worksheets: Vec<Worksheet>,
    /// Active sheet index
    active_sheet: usize,
    /// Named ranges (defined names)
    named_ranges: NamedRangeCollection,
    /// Deduplicated styles referenced by cells
    styles: StylePool,
}

impl Workbook {
    /// Create a new empty workbook with one worksheet
    pub fn new() -> Self {
        let mut wb = Self::empty();
        wb.worksheets.push(Worksheet::new("Sheet1"));
        wb
    }

    /// Create an empty workbook with no worksheets
    pub fn empty() -> Self {
        Self {
            worksheets: Vec::new(),
            active_sheet: 0,
            named_ranges: NamedRangeCollection::new(),
            styles: StylePool::new(),
        }
    }

    /// Get the number of worksheets
    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    /// Check if the workbook has no worksheets
    pub fn is_empty(&self) -> bool {
        self.worksheets.is_empty()
    }

    /// Get a worksheet by index
    pub fn worksheet(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    /// Get a mutable worksheet by index
    pub fn worksheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.worksheets.get_mut(index)
    }

    /// Get a worksheet by index, failing with `SheetOutOfBounds`
    pub fn sheet(&self, index: usize) -> Result<&Worksheet> {
        let count = self.worksheets.len();
        self.worksheets
            .get(index)
            .ok_or(Error::SheetOutOfBounds(index, count))
    }

    /// Get a mutable worksheet by index, failing with `SheetOutOfBounds`
    pub fn sheet_mut(&mut self, index: usize) -> Result<&mut Worksheet> {
        let count = self.worksheets.len();
        self.worksheets
            .get_mut(index)
            .ok_or(Error::SheetOutOfBounds(index, count))
    }

    /// Get a worksheet by name
    pub fn worksheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.worksheets.iter().find(|ws| ws.name() == name)
    }

    /// Get the index of a worksheet by name (case-insensitive)
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.worksheets
            .iter()
            .position(|ws| ws.name().eq_ignore_ascii_case(name))
    }

    /// Iterate over all worksheets
    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.iter()
    }

    /// Add a new worksheet with default name
    pub fn add_worksheet(&mut self) -> Result<usize> {
        let name = self.generate_sheet_name();
        self.add_worksheet_with_name(&name)
    }

    /// Add a new worksheet with specified name
    pub fn add_worksheet_with_name(&mut self, name: &str) -> Result<usize> {
        self.add_existing_worksheet(Worksheet::new(name))
    }

    /// Add an existing worksheet to the workbook
    pub fn add_existing_worksheet(&mut self, worksheet: Worksheet) -> Result<usize> {
        self.validate_sheet_name(worksheet.name())?;
        let index = self.worksheets.len();
        self.worksheets.push(worksheet);
        Ok(index)
    }

    /// Insert a new, empty worksheet at `index`
    ///
    /// Sheets from `index` on move one place right, along with the names
    /// scoped to them.
    pub fn insert_worksheet(&mut self, index: usize, name: &str) -> Result<()> {
        if index > self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(index, self.worksheets.len()));
        }
        self.validate_sheet_name(name)?;

        self.worksheets.insert(index, Worksheet::new(name));
        self.named_ranges.insert_sheet(index);
        if self.active_sheet >= index && self.worksheets.len() > 1 {
            self.active_sheet += 1;
        }
        Ok(())
    }

    /// Duplicate a worksheet and append the copy
    ///
    /// The copy shares style ids with the original, carries its comments,
    /// hyperlinks, merged regions and print settings, and gets a generated
    /// name (`"<name> (2)"`, `"<name> (3)"`, ...). Sheet-scoped names are
    /// duplicated for the copy. Returns the new sheet's index.
    pub fn clone_worksheet(&mut self, index: usize) -> Result<usize> {
        let source = self.sheet(index)?;
        let name = self.generate_clone_name(source.name());
        let mut copy = source.clone();
        copy.set_name(name);

        let new_index = self.worksheets.len();
        let scoped: Vec<NamedRange> = self
            .named_ranges
            .iter()
            .filter(|n| n.scope == NameScope::Sheet(index))
            .cloned()
            .collect();
        for mut named in scoped {
            named.scope = NameScope::Sheet(new_index);
            self.named_ranges.define_or_update(named);
        }

        debug!(
            "cloned sheet '{}' (#{}) as '{}' (#{})",
            self.worksheets[index].name(),
            index,
            copy.name(),
            new_index
        );
        self.worksheets.push(copy);
        Ok(new_index)
    }

    /// Remove a worksheet by index
    ///
    /// Names scoped to the removed sheet are dropped.
    pub fn remove_worksheet(&mut self, index: usize) -> Result<Worksheet> {
        if index >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(index, self.worksheets.len()));
        }

        let worksheet = self.worksheets.remove(index);
        self.named_ranges.remove_sheet(index);

        if self.active_sheet > index
            || (self.active_sheet == index && self.active_sheet >= self.worksheets.len())
        {
            self.active_sheet = self.active_sheet.saturating_sub(1);
        }

        Ok(worksheet)
    }

    /// Move a worksheet to a new position
    pub fn move_worksheet(&mut self, from: usize, to: usize) -> Result<()> {
        if from >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(from, self.worksheets.len()));
        }
        if to >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(to, self.worksheets.len()));
        }

        let worksheet = self.worksheets.remove(from);
        self.worksheets.insert(to, worksheet);

        if self.active_sheet == from {
            self.active_sheet = to;
        } else if from < self.active_sheet && to >= self.active_sheet {
            self.active_sheet -= 1;
        } else if from > self.active_sheet && to <= self.active_sheet {
            self.active_sheet += 1;
        }

        Ok(())
    }

    /// Rename a worksheet
    pub fn rename_worksheet(&mut self, index: usize, new_name: &str) -> Result<()> {
        if index >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(index, self.worksheets.len()));
        }
        self.validate_sheet_name_excluding(new_name, Some(index))?;
        self.worksheets[index].set_name(new_name);
        Ok(())
    }

    /// Get the active sheet index
    pub fn active_sheet(&self) -> usize {
        self.active_sheet
    }

    /// Set the active sheet index
    pub fn set_active_sheet(&mut self, index: usize) -> Result<()> {
        if index >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(index, self.worksheets.len()));
        }
        self.active_sheet = index;
        Ok(())
    }

    // ==================== Styles ====================

    /// Get a pooled style
    pub fn style(&self, id: StyleId) -> Option<&Style> {
        self.styles.get(id)
    }

    /// Add a style to the pool (deduplicated) and return its id
    pub fn intern_style(&mut self, style: Style) -> StyleId {
        self.styles.intern(style)
    }

    /// Mutate a pooled style in place
    ///
    /// Every cell holding `id`, on any sheet, observes the change.
    pub fn update_style<F>(&mut self, id: StyleId, f: F) -> Result<()>
    where
        F: FnOnce(&mut Style),
    {
        self.styles.update(id, f)
    }

    /// The style pool
    pub fn styles(&self) -> &StylePool {
        &self.styles
    }

    /// The style pool (mutable)
    pub fn styles_mut(&mut self) -> &mut StylePool {
        &mut self.styles
    }

    // ==================== Named Ranges ====================

    /// Define a new workbook-scoped named range
    pub fn define_name(&mut self, name: &str, refers_to: &str) -> Result<()> {
        self.define_name_with_scope(name, refers_to, NameScope::Workbook)
    }

    /// Define a named range with a specific scope
    pub fn define_name_with_scope(
        &mut self,
        name: &str,
        refers_to: &str,
        scope: NameScope,
    ) -> Result<()> {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(Error::InvalidName(format!("'{}' is not a valid name", name)));
        }
        self.named_ranges
            .define(NamedRange::new(name, refers_to, scope))
    }

    /// Define a sheet-scoped named range
    pub fn define_name_for_sheet(
        &mut self,
        name: &str,
        refers_to: &str,
        sheet_index: usize,
    ) -> Result<()> {
        self.define_name_with_scope(name, refers_to, NameScope::Sheet(sheet_index))
    }

    /// Get a named range visible from `current_sheet`
    ///
    /// Looks for sheet-scoped name first, then workbook-scoped.
    pub fn get_named_range(&self, name: &str, current_sheet: usize) -> Option<&NamedRange> {
        self.named_ranges.get(name, current_sheet)
    }

    /// Resolve a name into the area it refers to
    ///
    /// Fails with `UnresolvedName` when no definition is visible from
    /// `sheet`, and with `InvalidRange` when the definition is not an area.
    pub fn resolve_name(&self, name: &str, sheet: usize) -> Result<AreaReference> {
        self.named_ranges
            .get(name, sheet)
            .ok_or_else(|| Error::UnresolvedName(name.to_string()))?
            .area()
    }

    /// Remove a workbook-scoped named range
    pub fn remove_name(&mut self, name: &str) -> Option<NamedRange> {
        self.named_ranges.remove(name, NameScope::Workbook)
    }

    /// Get the named range collection (read-only)
    pub fn named_ranges(&self) -> &NamedRangeCollection {
        &self.named_ranges
    }

    /// Get the named range collection (mutable)
    pub fn named_ranges_mut(&mut self) -> &mut NamedRangeCollection {
        &mut self.named_ranges
    }

    /// Validate a sheet name
    fn validate_sheet_name(&self, name: &str) -> Result<()> {
        self.validate_sheet_name_excluding(name, None)
    }

    /// Validate a sheet name, optionally excluding a sheet from duplicate check
    fn validate_sheet_name_excluding(
        &self,
        name: &str,
        exclude_index: Option<usize>,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {} characters)",
                MAX_SHEET_NAME_LEN
            )));
        }
        if let Some(c) = INVALID_SHEET_CHARS.find(name) {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name cannot contain '{}'",
                c.as_str()
            )));
        }

        let duplicate = self
            .worksheets
            .iter()
            .enumerate()
            .any(|(i, ws)| Some(i) != exclude_index && ws.name().eq_ignore_ascii_case(name));
        if duplicate {
            return Err(Error::DuplicateSheetName(name.into()));
        }

        Ok(())
    }

    /// Generate a unique sheet name
    fn generate_sheet_name(&self) -> String {
        let mut n = self.worksheets.len() + 1;
        loop {
            let name = format!("Sheet{}", n);
            if self.validate_sheet_name(&name).is_ok() {
                return name;
            }
            n += 1;
        }
    }

    /// Generate a unique name for a copy of `base`
    fn generate_clone_name(&self, base: &str) -> String {
        // strip an existing " (n)" suffix so copies of copies stay short
        let stem = match base.rfind(" (") {
            Some(pos) if base.ends_with(')') && base[pos + 2..base.len() - 1].parse::<u32>().is_ok() => {
                &base[..pos]
            }
            _ => base,
        };

        let mut n = 2;
        loop {
            let suffix = format!(" ({})", n);
            let room = MAX_SHEET_NAME_LEN.saturating_sub(suffix.len());
            let name: String = stem.chars().take(room).chain(suffix.chars()).collect();
            if self.validate_sheet_name(&name).is_ok() {
                return name;
            }
            n += 1;
        }
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}
