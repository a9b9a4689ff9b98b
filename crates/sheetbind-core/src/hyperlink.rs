//! Cell hyperlinks

/// What a hyperlink points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HyperlinkKind {
    /// Web address
    #[default]
    Url,
    /// Location inside the same workbook (e.g. "'Sheet 2'!A1")
    Document,
    /// mailto: address
    Email,
    /// Path to a local or network file
    File,
}

/// A hyperlink attached to a cell
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Hyperlink {
    /// Link kind
    pub kind: HyperlinkKind,
    /// Target address or in-document location
    pub target: String,
    /// Display text, when it differs from the cell value
    pub display: Option<String>,
    /// Tooltip shown on hover
    pub tooltip: Option<String>,
}

impl Hyperlink {
    /// Create a hyperlink of the given kind
    pub fn new(kind: HyperlinkKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            display: None,
            tooltip: None,
        }
    }

    /// Link to a web address
    pub fn url(target: impl Into<String>) -> Self {
        Self::new(HyperlinkKind::Url, target)
    }

    /// Link to a location inside the workbook
    pub fn document(location: impl Into<String>) -> Self {
        Self::new(HyperlinkKind::Document, location)
    }

    /// Link to an email address; a missing `mailto:` prefix is added
    pub fn email(address: impl Into<String>) -> Self {
        let address = address.into();
        let target = if address.starts_with("mailto:") {
            address
        } else {
            format!("mailto:{}", address)
        };
        Self::new(HyperlinkKind::Email, target)
    }

    /// Link to a file
    pub fn file(path: impl Into<String>) -> Self {
        Self::new(HyperlinkKind::File, path)
    }

    /// Builder: set the display text
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Builder: set the tooltip
    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    /// Whether the target lives outside the workbook (stored as a relationship)
    pub fn is_external(&self) -> bool {
        self.kind != HyperlinkKind::Document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_prefix() {
        assert_eq!(Hyperlink::email("a@b.org").target, "mailto:a@b.org");
        assert_eq!(Hyperlink::email("mailto:a@b.org").target, "mailto:a@b.org");
    }

    #[test]
    fn test_external() {
        assert!(Hyperlink::url("https://example.org").is_external());
        assert!(Hyperlink::file("report.pdf").is_external());
        assert!(!Hyperlink::document("Sheet2!A1").is_external());
    }
}
