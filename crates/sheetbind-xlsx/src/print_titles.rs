//! `_xlnm.Print_Titles`: rows and columns repeated on every printed page
//!
//! Stored as a sheet-scoped defined name such as `Sheet1!$1:$2` (rows),
//! `Sheet1!$A:$B` (columns) or both joined by a comma.

use sheetbind_core::named_range::quote_sheet;
use sheetbind_core::CellAddress;

/// Name under which documents store repeated rows/columns
pub(crate) const DEFINED_NAME: &str = "_xlnm.Print_Titles";

/// Parse a Print_Titles formula into (rows, columns), both 0-based
pub(crate) fn parse(formula: &str) -> (Option<(u32, u32)>, Option<(u16, u16)>) {
    let mut rows = None;
    let mut cols = None;

    for part in formula.trim_start_matches('=').split(',') {
        let area = part.rsplit('!').next().unwrap_or(part);
        let (first, last) = match area.split_once(':') {
            Some((a, b)) => (a.trim_start_matches('$'), b.trim_start_matches('$')),
            None => continue,
        };

        if let (Ok(a), Ok(b)) = (first.parse::<u32>(), last.parse::<u32>()) {
            if a >= 1 && b >= a {
                rows = Some((a - 1, b - 1));
            }
        } else if let (Ok(a), Ok(b)) = (
            CellAddress::letters_to_column(first),
            CellAddress::letters_to_column(last),
        ) {
            if b >= a {
                cols = Some((a, b));
            }
        }
    }

    (rows, cols)
}

/// Format repeated rows/columns for `sheet`; None when neither is set
pub(crate) fn format(
    sheet: &str,
    rows: Option<(u32, u32)>,
    cols: Option<(u16, u16)>,
) -> Option<String> {
    let sheet = quote_sheet(sheet);
    let mut parts = Vec::new();
    if let Some((a, b)) = cols {
        parts.push(format!(
            "{}!${}:${}",
            sheet,
            CellAddress::column_to_letters(a),
            CellAddress::column_to_letters(b)
        ));
    }
    if let Some((a, b)) = rows {
        parts.push(format!("{}!${}:${}", sheet, a + 1, b + 1));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_rows_and_columns() {
        assert_eq!(parse("Sheet1!$1:$2"), (Some((0, 1)), None));
        assert_eq!(parse("'My Sheet'!$A:$C"), (None, Some((0, 2))));
        assert_eq!(
            parse("Sheet1!$A:$A,Sheet1!$3:$4"),
            (Some((2, 3)), Some((0, 0)))
        );
        assert_eq!(parse("Sheet1!#REF!"), (None, None));
    }

    #[test]
    fn test_format() {
        assert_eq!(
            format("My Sheet", Some((0, 1)), Some((0, 0))).as_deref(),
            Some("'My Sheet'!$A:$A,'My Sheet'!$1:$2")
        );
        assert_eq!(format("Sheet1", None, None), None);
    }
}
