//! Print settings of a worksheet
//!
//! A sheet cloned from a template must print like the template, so every
//! type here is plain data that is copied field by field.

/// Page setup for printing
#[derive(Debug, Clone, PartialEq)]
pub struct PageSetup {
    /// Paper size code (e.g., 1 = Letter, 9 = A4)
    pub paper_size: u16,
    /// Orientation
    pub orientation: PageOrientation,
    /// Scale percentage (10-400)
    pub scale: u16,
    /// Fit to pages wide (0 = automatic)
    pub fit_width: u16,
    /// Fit to pages tall (0 = automatic)
    pub fit_height: u16,
    /// Number of copies
    pub copies: u16,
    /// Draft quality
    pub draft: bool,
    /// Print without color
    pub black_and_white: bool,
    /// Print cell comments
    pub notes: bool,
    /// Page number of the first printed page
    pub first_page_number: u32,
    /// Whether `first_page_number` is used instead of automatic numbering
    pub use_first_page_number: bool,
    /// Horizontal print resolution (dpi)
    pub horizontal_dpi: Option<u32>,
    /// Vertical print resolution (dpi)
    pub vertical_dpi: Option<u32>,
    /// Page order: across then down
    pub left_to_right: bool,
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            paper_size: 1,
            orientation: PageOrientation::Default,
            scale: 100,
            fit_width: 1,
            fit_height: 1,
            copies: 1,
            draft: false,
            black_and_white: false,
            notes: false,
            first_page_number: 1,
            use_first_page_number: false,
            horizontal_dpi: None,
            vertical_dpi: None,
            left_to_right: false,
        }
    }
}

impl PageSetup {
    /// Check if nothing differs from the defaults
    pub fn is_default(&self) -> bool {
        *self == PageSetup::default()
    }
}

/// Page orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageOrientation {
    /// Not specified; the printer decides
    #[default]
    Default,
    Portrait,
    Landscape,
}

impl PageOrientation {
    /// XLSX attribute value
    pub fn as_str(&self) -> &'static str {
        match self {
            PageOrientation::Default => "default",
            PageOrientation::Portrait => "portrait",
            PageOrientation::Landscape => "landscape",
        }
    }

    /// Parse an XLSX attribute value
    pub fn parse(s: &str) -> Self {
        match s {
            "portrait" => PageOrientation::Portrait,
            "landscape" => PageOrientation::Landscape,
            _ => PageOrientation::Default,
        }
    }
}

/// Page margins in inches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageMargins {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
    pub header: f64,
    pub footer: f64,
}

impl Default for PageMargins {
    fn default() -> Self {
        Self {
            left: 0.7,
            right: 0.7,
            top: 0.75,
            bottom: 0.75,
            header: 0.3,
            footer: 0.3,
        }
    }
}

/// Sheet-level print options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrintOptions {
    /// Center the printout horizontally on the page
    pub horizontal_centered: bool,
    /// Center the printout vertically on the page
    pub vertical_centered: bool,
    /// Insert automatic page breaks (fit-to-page)
    pub autobreaks: bool,
    /// Rows repeated on top of every printed page (first, last)
    pub repeat_rows: Option<(u32, u32)>,
    /// Columns repeated on the left of every printed page (first, last)
    pub repeat_cols: Option<(u16, u16)>,
}

/// Page header and footer text, split into left/center/right sections
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderFooter {
    pub header_left: String,
    pub header_center: String,
    pub header_right: String,
    pub footer_left: String,
    pub footer_center: String,
    pub footer_right: String,
}

impl HeaderFooter {
    /// Check if no section has text
    pub fn is_empty(&self) -> bool {
        *self == HeaderFooter::default()
    }

    /// Header in the `&L..&C..&R..` form stored in documents
    pub fn header_text(&self) -> String {
        join_sections(&self.header_left, &self.header_center, &self.header_right)
    }

    /// Footer in the `&L..&C..&R..` form stored in documents
    pub fn footer_text(&self) -> String {
        join_sections(&self.footer_left, &self.footer_center, &self.footer_right)
    }

    /// Set the header sections from stored `&L..&C..&R..` text
    pub fn set_header_text(&mut self, text: &str) {
        let (l, c, r) = split_sections(text);
        self.header_left = l;
        self.header_center = c;
        self.header_right = r;
    }

    /// Set the footer sections from stored `&L..&C..&R..` text
    pub fn set_footer_text(&mut self, text: &str) {
        let (l, c, r) = split_sections(text);
        self.footer_left = l;
        self.footer_center = c;
        self.footer_right = r;
    }
}

fn join_sections(left: &str, center: &str, right: &str) -> String {
    let mut out = String::new();
    for (code, text) in [("&L", left), ("&C", center), ("&R", right)] {
        if !text.is_empty() {
            out.push_str(code);
            out.push_str(text);
        }
    }
    out
}

/// Split stored header text into sections
///
/// `&&` is a literal ampersand; any other `&` code stays inside the section
/// it appears in. Text before the first section code belongs to the center.
fn split_sections(text: &str) -> (String, String, String) {
    let mut sections = [String::new(), String::new(), String::new()];
    let mut current = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '&' {
            match chars.peek().copied() {
                Some('L') => {
                    current = 0;
                    chars.next();
                    continue;
                }
                Some('C') => {
                    current = 1;
                    chars.next();
                    continue;
                }
                Some('R') => {
                    current = 2;
                    chars.next();
                    continue;
                }
                Some('&') => {
                    sections[current].push_str("&&");
                    chars.next();
                    continue;
                }
                _ => {}
            }
        }
        sections[current].push(c);
    }

    let [l, c, r] = sections;
    (l, c, r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_header_sections() {
        let mut hf = HeaderFooter::default();
        hf.set_header_text("&LInvoice&C&P of &N&RAcme && Co");
        assert_eq!(hf.header_left, "Invoice");
        assert_eq!(hf.header_center, "&P of &N");
        assert_eq!(hf.header_right, "Acme && Co");
        assert_eq!(hf.header_text(), "&LInvoice&C&P of &N&RAcme && Co");
    }

    #[test]
    fn test_unsectioned_text_is_center() {
        let mut hf = HeaderFooter::default();
        hf.set_footer_text("Page &P");
        assert_eq!(hf.footer_center, "Page &P");
        assert!(hf.footer_left.is_empty());
    }

    #[test]
    fn test_defaults() {
        assert!(PageSetup::default().is_default());
        assert!(HeaderFooter::default().is_empty());
        assert_eq!(PageOrientation::parse("landscape"), PageOrientation::Landscape);
    }
}
