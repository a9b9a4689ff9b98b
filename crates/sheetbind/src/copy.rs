//! Cell-level copy

use sheetbind_core::{Cell, CellValue};

/// Copy `src` into `dst`
///
/// Values are copied by kind: strings, booleans and numbers verbatim; a
/// formula becomes a string holding its cached result as text (the
/// expression is dropped); an error becomes a string holding the error code;
/// an empty source leaves `dst`'s value untouched. The style id is shared,
/// and the comment and hyperlink are copied when `src` has them.
pub fn copy_cell(src: &Cell, dst: &mut Cell) {
    match &src.value {
        CellValue::String(s) => dst.value = CellValue::String(s.clone()),
        CellValue::Boolean(b) => dst.value = CellValue::Boolean(*b),
        CellValue::Number(n) => dst.value = CellValue::Number(*n),
        CellValue::Formula { cached_value, .. } => {
            let text = cached_value
                .as_deref()
                .map(CellValue::display_text)
                .unwrap_or_default();
            dst.value = CellValue::string(text);
        }
        CellValue::Error(e) => dst.value = CellValue::string(e.as_str()),
        CellValue::Empty => {}
    }

    dst.style = src.style;
    if let Some(comment) = &src.comment {
        dst.comment = Some(comment.clone());
    }
    if let Some(link) = &src.hyperlink {
        dst.hyperlink = Some(link.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetbind_core::{CellComment, CellError, Hyperlink, StyleId};

    #[test]
    fn test_plain_values_are_copied() {
        for value in [
            CellValue::string("Fan"),
            CellValue::Boolean(true),
            CellValue::Number(3.5),
        ] {
            let mut dst = Cell::default();
            copy_cell(&Cell::new(value.clone()), &mut dst);
            assert_eq!(dst.value, value);
        }
    }

    #[test]
    fn test_formula_becomes_cached_text() {
        let src = Cell::new(CellValue::Formula {
            text: "=B2*C2".into(),
            cached_value: Some(Box::new(CellValue::Number(12.0))),
        });
        let mut dst = Cell::default();
        copy_cell(&src, &mut dst);
        assert_eq!(dst.value, CellValue::string("12"));

        let mut dst = Cell::new(7.0);
        copy_cell(&Cell::new(CellValue::formula("=NOW()")), &mut dst);
        assert_eq!(dst.value, CellValue::string(""));
    }

    #[test]
    fn test_error_becomes_text() {
        let mut dst = Cell::default();
        copy_cell(&Cell::new(CellError::Ref), &mut dst);
        assert_eq!(dst.value, CellValue::string("#REF!"));
    }

    #[test]
    fn test_empty_source_keeps_value() {
        let mut dst = Cell::new("keep");
        copy_cell(&Cell::default().with_style(StyleId(3)), &mut dst);
        assert_eq!(dst.value, CellValue::string("keep"));
        assert_eq!(dst.style, Some(StyleId(3)));
    }

    #[test]
    fn test_annotations_copied_only_when_present() {
        let mut src = Cell::new("x");
        src.comment = Some(CellComment::new("ops", "check"));
        src.hyperlink = Some(Hyperlink::url("https://example.com"));

        let mut dst = Cell::default();
        copy_cell(&src, &mut dst);
        assert_eq!(dst.comment, src.comment);
        assert_eq!(dst.hyperlink, src.hyperlink);

        let mut dst = Cell::default();
        dst.comment = Some(CellComment::new("me", "mine"));
        copy_cell(&Cell::new("y"), &mut dst);
        assert_eq!(dst.comment, Some(CellComment::new("me", "mine")));
    }
}
