//! Style pool for deduplication and sharing

use super::Style;
use crate::error::{Error, Result};
use ahash::AHashMap;
use std::hash::{Hash, Hasher};

/// Reference to a style stored in a [`StylePool`]
///
/// Cells copied from a template hold the same id as their source, so a
/// later change through [`StylePool::update`] is visible on both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StyleId(pub u32);

impl StyleId {
    /// The default style, always present at index 0
    pub const DEFAULT: StyleId = StyleId(0);

    /// Position in the pool
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Style pool for deduplicating styles
///
/// Each unique style is stored once and cells reference it by [`StyleId`].
#[derive(Debug, Clone)]
pub struct StylePool {
    /// All styles (index 0 is default)
    styles: Vec<Style>,
    /// Fast lookup for deduplication
    index_map: AHashMap<StyleKey, u32>,
}

/// Key for style lookup (hash-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StyleKey(u64);

impl StyleKey {
    fn from_style(style: &Style) -> Self {
        let mut hasher = ahash::AHasher::default();
        style.hash(&mut hasher);
        StyleKey(hasher.finish())
    }
}

impl StylePool {
    /// Create a new style pool with default style at index 0
    pub fn new() -> Self {
        let mut pool = Self {
            styles: Vec::with_capacity(64),
            index_map: AHashMap::with_capacity(64),
        };

        let default = Style::default();
        pool.index_map.insert(StyleKey::from_style(&default), 0);
        pool.styles.push(default);

        pool
    }

    /// Get or create a style, returning its id
    pub fn intern(&mut self, style: Style) -> StyleId {
        let key = StyleKey::from_style(&style);

        if let Some(&idx) = self.index_map.get(&key) {
            // Hash collision check
            if self.styles[idx as usize] == style {
                return StyleId(idx);
            }
        }

        let idx = self.styles.len() as u32;
        self.index_map.insert(key, idx);
        self.styles.push(style);
        StyleId(idx)
    }

    /// Append a style without deduplication
    ///
    /// Used by readers so that document style indices are preserved.
    pub fn push(&mut self, style: Style) -> StyleId {
        let idx = self.styles.len() as u32;
        self.index_map
            .entry(StyleKey::from_style(&style))
            .or_insert(idx);
        self.styles.push(style);
        StyleId(idx)
    }

    /// Get a style by id
    pub fn get(&self, id: StyleId) -> Option<&Style> {
        self.styles.get(id.index())
    }

    /// Mutate a style in place; every cell referencing `id` observes the change
    pub fn update<F>(&mut self, id: StyleId, f: F) -> Result<()>
    where
        F: FnOnce(&mut Style),
    {
        let style = self
            .styles
            .get_mut(id.index())
            .ok_or(Error::InvalidStyleIndex(id.0))?;

        let old_key = StyleKey::from_style(style);
        f(style);
        let new_key = StyleKey::from_style(style);

        if old_key != new_key {
            if self.index_map.get(&old_key) == Some(&id.0) {
                self.index_map.remove(&old_key);
            }
            self.index_map.entry(new_key).or_insert(id.0);
        }
        Ok(())
    }

    /// Get the default style (index 0)
    pub fn default_style(&self) -> &Style {
        &self.styles[0]
    }

    /// Get the number of styles
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Check if the pool only holds the default style
    pub fn is_empty(&self) -> bool {
        self.styles.len() <= 1
    }

    /// Iterate over all styles with their ids
    pub fn iter(&self) -> impl Iterator<Item = (StyleId, &Style)> {
        self.styles
            .iter()
            .enumerate()
            .map(|(i, s)| (StyleId(i as u32), s))
    }
}

impl Default for StylePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Color;

    #[test]
    fn test_default_style() {
        let pool = StylePool::new();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(StyleId::DEFAULT), Some(&Style::default()));
    }

    #[test]
    fn test_deduplication() {
        let mut pool = StylePool::new();

        let id1 = pool.intern(Style::new().bold(true));
        let id2 = pool.intern(Style::new().bold(true));
        let id3 = pool.intern(Style::new().italic(true));

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_update_in_place() {
        let mut pool = StylePool::new();
        let id = pool.intern(Style::new().bold(true));

        pool.update(id, |s| s.font.color = Color::RED).unwrap();
        assert_eq!(pool.get(id).unwrap().font.color, Color::RED);

        // the mutated style is found under its new content
        let again = pool.intern(Style::new().bold(true).font_color(Color::RED));
        assert_eq!(again, id);

        assert!(matches!(
            pool.update(StyleId(99), |_| {}),
            Err(Error::InvalidStyleIndex(99))
        ));
    }

    #[test]
    fn test_push_keeps_duplicates() {
        let mut pool = StylePool::new();
        let a = pool.push(Style::default());
        assert_eq!(a, StyleId(1));
        assert_eq!(pool.intern(Style::default()), StyleId::DEFAULT);
    }
}
