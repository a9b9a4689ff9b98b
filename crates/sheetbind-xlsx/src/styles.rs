//! XLSX styles (styles.xml) read/write helpers
//!
//! The workbook keeps one style pool, and a cell's [`StyleId`] is written
//! as its `cellXfs` index unchanged. Reading pushes `cellXfs` entries into
//! the pool in document order for the same reason.
//!
//! [`StyleId`]: sheetbind_core::StyleId

use std::collections::HashMap;
use std::io::{BufReader, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use sheetbind_core::style::{
    Alignment, BorderEdge, BorderLineStyle, BorderStyle, Color, FillStyle, FontStyle,
    HorizontalAlignment, NumberFormat, Style, StylePool, VerticalAlignment,
};

// === Writing ===

#[derive(Debug, Clone, Copy)]
struct ResolvedXfIds {
    font_id: u32,
    fill_id: u32,
    border_id: u32,
    num_fmt_id: u32,
}

/// Serialize every pooled style; `cellXfs[i]` is the style with id `i`
pub(crate) fn to_styles_xml(pool: &StylePool) -> String {
    let mut font_ids: HashMap<FontStyle, u32> = HashMap::new();
    let mut fonts: Vec<FontStyle> = Vec::new();
    let default_font = FontStyle::default();
    fonts.push(default_font.clone());
    font_ids.insert(default_font, 0);

    let mut fill_ids: HashMap<FillStyle, u32> = HashMap::new();
    // Excel requires the first two fills to be none and gray125
    let mut fills: Vec<FillStyle> = vec![
        FillStyle::None,
        FillStyle::Pattern {
            pattern: "gray125".to_string(),
            foreground: Color::Auto,
            background: Color::Auto,
        },
    ];
    fill_ids.insert(FillStyle::None, 0);

    let mut border_ids: HashMap<BorderStyle, u32> = HashMap::new();
    let mut borders: Vec<BorderStyle> = vec![BorderStyle::default()];
    border_ids.insert(BorderStyle::default(), 0);

    let mut numfmt_ids: HashMap<String, u32> = HashMap::new();
    let mut numfmts: Vec<(u32, String)> = Vec::new();
    let mut next_numfmt_id = NumberFormat::FIRST_CUSTOM_ID;

    let mut resolved: Vec<ResolvedXfIds> = Vec::with_capacity(pool.len());

    for (_, style) in pool.iter() {
        let font_id = *font_ids.entry(style.font.clone()).or_insert_with(|| {
            fonts.push(style.font.clone());
            fonts.len() as u32 - 1
        });

        let fill_id = match &style.fill {
            FillStyle::None => 0,
            other => *fill_ids.entry(other.clone()).or_insert_with(|| {
                fills.push(other.clone());
                fills.len() as u32 - 1
            }),
        };

        let border_id = *border_ids.entry(style.border.clone()).or_insert_with(|| {
            borders.push(style.border.clone());
            borders.len() as u32 - 1
        });

        let num_fmt_id = match &style.number_format {
            NumberFormat::General => 0,
            NumberFormat::BuiltIn(id) => *id,
            NumberFormat::Custom(code) => *numfmt_ids.entry(code.clone()).or_insert_with(|| {
                let id = next_numfmt_id;
                next_numfmt_id += 1;
                numfmts.push((id, code.clone()));
                id
            }),
        };

        resolved.push(ResolvedXfIds {
            font_id,
            fill_id,
            border_id,
            num_fmt_id,
        });
    }

    let mut xml = String::new();
    xml.push_str(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    );

    if !numfmts.is_empty() {
        xml.push_str(&format!("\n  <numFmts count=\"{}\">", numfmts.len()));
        for (id, code) in &numfmts {
            xml.push_str(&format!(
                "\n    <numFmt numFmtId=\"{}\" formatCode=\"{}\"/>",
                id,
                escape_xml_attr(code)
            ));
        }
        xml.push_str("\n  </numFmts>");
    }

    xml.push_str(&format!("\n  <fonts count=\"{}\">", fonts.len()));
    for font in &fonts {
        xml.push_str("\n    ");
        xml.push_str(&write_font(font));
    }
    xml.push_str("\n  </fonts>");

    xml.push_str(&format!("\n  <fills count=\"{}\">", fills.len()));
    for fill in &fills {
        xml.push_str("\n    ");
        xml.push_str(&write_fill(fill));
    }
    xml.push_str("\n  </fills>");

    xml.push_str(&format!("\n  <borders count=\"{}\">", borders.len()));
    for border in &borders {
        xml.push_str("\n    ");
        xml.push_str(&write_border(border));
    }
    xml.push_str("\n  </borders>");

    xml.push_str(
        r#"
  <cellStyleXfs count="1">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
  </cellStyleXfs>"#,
    );

    xml.push_str(&format!("\n  <cellXfs count=\"{}\">", resolved.len()));
    for ((_, style), ids) in pool.iter().zip(&resolved) {
        xml.push_str("\n    ");
        xml.push_str(&write_xf(style, *ids));
    }
    xml.push_str("\n  </cellXfs>");

    xml.push_str(
        r#"
  <cellStyles count="1">
    <cellStyle name="Normal" xfId="0" builtinId="0"/>
  </cellStyles>
  <dxfs count="0"/>
</styleSheet>"#,
    );
    xml
}

pub(crate) fn escape_xml_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn color_attrs(color: &Color) -> String {
    match color {
        Color::Auto => " indexed=\"64\"".to_string(),
        Color::Rgb { .. } | Color::Argb { .. } => {
            format!(" rgb=\"{}\"", color.to_argb_hex().unwrap_or_default())
        }
        Color::Indexed(i) => format!(" indexed=\"{}\"", i),
        Color::Theme { index, tint: 0 } => format!(" theme=\"{}\"", index),
        Color::Theme { index, tint } => {
            format!(" theme=\"{}\" tint=\"{}\"", index, (*tint as f64) / 100.0)
        }
    }
}

fn write_color(tag: &str, color: &Color) -> String {
    format!("<{tag}{}/>", color_attrs(color))
}

fn write_font(font: &FontStyle) -> String {
    let mut s = String::from("<font>");
    if font.bold {
        s.push_str("<b/>");
    }
    if font.italic {
        s.push_str("<i/>");
    }
    if font.strikethrough {
        s.push_str("<strike/>");
    }
    if font.underline {
        s.push_str("<u/>");
    }
    s.push_str(&format!("<sz val=\"{}\"/>", font.size));
    if !font.color.is_auto() {
        s.push_str(&write_color("color", &font.color));
    }
    s.push_str(&format!("<name val=\"{}\"/>", escape_xml_attr(&font.name)));
    s.push_str("</font>");
    s
}

fn write_fill(fill: &FillStyle) -> String {
    match fill {
        FillStyle::None => "<fill><patternFill patternType=\"none\"/></fill>".to_string(),
        FillStyle::Solid { color } => format!(
            "<fill><patternFill patternType=\"solid\">{}<bgColor indexed=\"64\"/></patternFill></fill>",
            write_color("fgColor", color)
        ),
        FillStyle::Pattern {
            pattern,
            foreground,
            background,
        } => format!(
            "<fill><patternFill patternType=\"{}\">{}{}</patternFill></fill>",
            escape_xml_attr(pattern),
            write_color("fgColor", foreground),
            write_color("bgColor", background)
        ),
    }
}

fn write_border_edge(tag: &str, edge: &Option<BorderEdge>) -> String {
    match edge {
        Some(e) if e.style != BorderLineStyle::None => format!(
            "<{tag} style=\"{}\">{}</{tag}>",
            e.style.as_str(),
            write_color("color", &e.color)
        ),
        _ => format!("<{tag}/>"),
    }
}

fn write_border(border: &BorderStyle) -> String {
    let mut s = String::from("<border>");
    s.push_str(&write_border_edge("left", &border.left));
    s.push_str(&write_border_edge("right", &border.right));
    s.push_str(&write_border_edge("top", &border.top));
    s.push_str(&write_border_edge("bottom", &border.bottom));
    s.push_str("<diagonal/></border>");
    s
}

fn write_alignment(al: &Alignment) -> String {
    if al.is_default() {
        return String::new();
    }
    let default = Alignment::default();

    let mut s = String::from("<alignment");
    if al.horizontal != default.horizontal {
        s.push_str(&format!(" horizontal=\"{}\"", al.horizontal.as_str()));
    }
    if al.vertical != default.vertical {
        s.push_str(&format!(" vertical=\"{}\"", al.vertical.as_str()));
    }
    if al.wrap_text {
        s.push_str(" wrapText=\"1\"");
    }
    if al.indent != 0 {
        s.push_str(&format!(" indent=\"{}\"", al.indent));
    }
    if al.rotation != 0 {
        s.push_str(&format!(" textRotation=\"{}\"", al.rotation));
    }
    s.push_str("/>");
    s
}

fn write_xf(style: &Style, ids: ResolvedXfIds) -> String {
    let mut attrs = String::new();
    if ids.num_fmt_id != 0 {
        attrs.push_str(" applyNumberFormat=\"1\"");
    }
    if style.font != FontStyle::default() {
        attrs.push_str(" applyFont=\"1\"");
    }
    if !style.fill.is_none() {
        attrs.push_str(" applyFill=\"1\"");
    }
    if !style.border.is_empty() {
        attrs.push_str(" applyBorder=\"1\"");
    }
    if !style.alignment.is_default() {
        attrs.push_str(" applyAlignment=\"1\"");
    }

    let mut s = format!(
        "<xf numFmtId=\"{}\" fontId=\"{}\" fillId=\"{}\" borderId=\"{}\" xfId=\"0\"{}",
        ids.num_fmt_id, ids.font_id, ids.fill_id, ids.border_id, attrs
    );

    let alignment_xml = write_alignment(&style.alignment);
    if alignment_xml.is_empty() {
        s.push_str("/>");
    } else {
        s.push('>');
        s.push_str(&alignment_xml);
        s.push_str("</xf>");
    }
    s
}

// === Reading ===

/// An `<xf>` whose component ids are known but not yet resolved
struct PendingXf {
    num_fmt_id: u32,
    font_id: u32,
    fill_id: u32,
    border_id: u32,
    alignment: Alignment,
}

/// Read the `cellXfs` table of styles.xml as resolved styles, in order
pub(crate) fn read_styles_xml<R: Read>(reader: R) -> XlsxResult<Vec<Style>> {
    let mut xml_reader = Reader::from_reader(BufReader::new(reader));
    xml_reader.trim_text(true);

    let mut buf = Vec::new();

    let mut numfmts: HashMap<u32, String> = HashMap::new();
    let mut fonts: Vec<FontStyle> = Vec::new();
    let mut fills: Vec<FillStyle> = Vec::new();
    let mut borders: Vec<BorderStyle> = Vec::new();
    let mut cell_xfs: Vec<Style> = Vec::new();

    let mut current_font: Option<FontStyle> = None;
    let mut in_fill = false;
    let mut fill_pattern: Option<String> = None;
    let mut fill_fg = Color::Auto;
    let mut fill_bg = Color::Auto;

    let mut current_border: Option<BorderStyle> = None;
    let mut current_edge: Option<&'static str> = None;

    let mut in_cell_xfs = false;
    let mut current_xf: Option<PendingXf> = None;

    // dxfs describe conditional formats, which are not modelled
    let mut in_dxfs = false;

    loop {
        let event = xml_reader.read_event_into(&mut buf);
        let (e, is_empty) = match event {
            Ok(Event::Start(e)) => (e, false),
            Ok(Event::Empty(e)) => (e, true),
            Ok(Event::End(e)) => {
                match e.name().as_ref() {
                    b"font" => {
                        if let Some(f) = current_font.take() {
                            fonts.push(f);
                        }
                    }
                    b"fill" if in_fill => {
                        fills.push(finalize_fill(fill_pattern.take(), fill_fg, fill_bg));
                        in_fill = false;
                    }
                    b"border" => {
                        if let Some(b) = current_border.take() {
                            borders.push(b);
                        }
                        current_edge = None;
                    }
                    b"left" | b"right" | b"top" | b"bottom" | b"diagonal" => {
                        current_edge = None;
                    }
                    b"xf" => {
                        if let Some(xf) = current_xf.take() {
                            cell_xfs.push(resolve_style(xf, &numfmts, &fonts, &fills, &borders));
                        }
                    }
                    b"cellXfs" => in_cell_xfs = false,
                    b"dxfs" => in_dxfs = false,
                    _ => {}
                }
                buf.clear();
                continue;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {
                buf.clear();
                continue;
            }
        };

        if in_dxfs {
            buf.clear();
            continue;
        }

        match e.name().as_ref() {
            b"cellXfs" => in_cell_xfs = !is_empty,
            b"dxfs" => in_dxfs = !is_empty,

            b"numFmt" => {
                let id = attr_value(&e, b"numFmtId").and_then(|s| s.parse().ok());
                let code = attr_value(&e, b"formatCode");
                if let (Some(id), Some(code)) = (id, code) {
                    numfmts.insert(id, code);
                }
            }

            b"font" => {
                if is_empty {
                    fonts.push(FontStyle::default());
                } else {
                    current_font = Some(FontStyle::default());
                }
            }
            b"b" | b"i" | b"strike" | b"u" => {
                if let Some(font) = current_font.as_mut() {
                    // <b val="0"/> switches the flag off
                    let on = attr_value(&e, b"val").map_or(true, |v| v != "0" && v != "none");
                    match e.name().as_ref() {
                        b"b" => font.bold = on,
                        b"i" => font.italic = on,
                        b"strike" => font.strikethrough = on,
                        _ => font.underline = on,
                    }
                }
            }
            b"sz" => {
                if let Some(font) = current_font.as_mut() {
                    if let Some(size) = attr_value(&e, b"val").and_then(|v| v.parse().ok()) {
                        font.size = size;
                    }
                }
            }
            b"name" => {
                if let Some(font) = current_font.as_mut() {
                    if let Some(name) = attr_value(&e, b"val") {
                        font.name = name;
                    }
                }
            }

            b"fill" => {
                if is_empty {
                    fills.push(FillStyle::None);
                } else {
                    in_fill = true;
                    fill_pattern = None;
                    fill_fg = Color::Auto;
                    fill_bg = Color::Auto;
                }
            }
            b"patternFill" if in_fill => {
                fill_pattern = attr_value(&e, b"patternType");
            }
            b"fgColor" if in_fill => fill_fg = parse_color_attrs(&e),
            b"bgColor" if in_fill => fill_bg = parse_color_attrs(&e),

            b"border" => {
                if is_empty {
                    borders.push(BorderStyle::default());
                } else {
                    current_border = Some(BorderStyle::default());
                }
            }
            b"left" | b"right" | b"top" | b"bottom" | b"diagonal" => {
                if let Some(border) = current_border.as_mut() {
                    let edge_name = match e.name().as_ref() {
                        b"left" => "left",
                        b"right" => "right",
                        b"top" => "top",
                        b"bottom" => "bottom",
                        _ => "diagonal",
                    };
                    if let Some(style) = attr_value(&e, b"style").map(|v| BorderLineStyle::parse(&v)) {
                        if style != BorderLineStyle::None {
                            set_border_edge(
                                border,
                                edge_name,
                                Some(BorderEdge {
                                    style,
                                    color: Color::Auto,
                                }),
                            );
                        }
                    }
                    if !is_empty {
                        current_edge = Some(edge_name);
                    }
                }
            }

            b"color" => {
                let color = parse_color_attrs(&e);
                if let Some(font) = current_font.as_mut() {
                    font.color = color;
                } else if let (Some(border), Some(edge_name)) =
                    (current_border.as_mut(), current_edge)
                {
                    if let Some(mut edge) = get_border_edge(border, edge_name) {
                        edge.color = color;
                        set_border_edge(border, edge_name, Some(edge));
                    }
                }
            }

            b"xf" if in_cell_xfs => {
                let id = |key: &[u8]| {
                    attr_value(&e, key)
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(0)
                };
                let xf = PendingXf {
                    num_fmt_id: id(b"numFmtId"),
                    font_id: id(b"fontId"),
                    fill_id: id(b"fillId"),
                    border_id: id(b"borderId"),
                    alignment: Alignment::default(),
                };
                if is_empty {
                    cell_xfs.push(resolve_style(xf, &numfmts, &fonts, &fills, &borders));
                } else {
                    current_xf = Some(xf);
                }
            }

            b"alignment" => {
                if let Some(xf) = current_xf.as_mut() {
                    let align = &mut xf.alignment;
                    for attr in e.attributes().flatten() {
                        let val = match attr.unescape_value() {
                            Ok(v) => v,
                            Err(_) => continue,
                        };
                        match attr.key.as_ref() {
                            b"horizontal" => align.horizontal = HorizontalAlignment::parse(&val),
                            b"vertical" => align.vertical = VerticalAlignment::parse(&val),
                            b"wrapText" => align.wrap_text = val.as_ref() == "1",
                            b"indent" => align.indent = val.parse::<u8>().unwrap_or(0),
                            b"textRotation" => align.rotation = val.parse::<i16>().unwrap_or(0),
                            _ => {}
                        }
                    }
                }
            }

            _ => {}
        }

        buf.clear();
    }

    if cell_xfs.is_empty() {
        cell_xfs.push(Style::default());
    }
    Ok(cell_xfs)
}

/// First value of attribute `key`, unescaped
pub(crate) fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|s| s.to_string()))
}

fn resolve_style(
    xf: PendingXf,
    numfmts: &HashMap<u32, String>,
    fonts: &[FontStyle],
    fills: &[FillStyle],
    borders: &[BorderStyle],
) -> Style {
    let number_format = if xf.num_fmt_id == 0 {
        NumberFormat::General
    } else if let Some(code) = numfmts.get(&xf.num_fmt_id) {
        NumberFormat::Custom(code.clone())
    } else {
        NumberFormat::BuiltIn(xf.num_fmt_id)
    };

    Style {
        font: fonts.get(xf.font_id as usize).cloned().unwrap_or_default(),
        fill: fills.get(xf.fill_id as usize).cloned().unwrap_or_default(),
        border: borders.get(xf.border_id as usize).cloned().unwrap_or_default(),
        alignment: xf.alignment,
        number_format,
    }
}

fn finalize_fill(pattern: Option<String>, fg: Color, bg: Color) -> FillStyle {
    match pattern.as_deref() {
        None | Some("none") | Some("gray125") => FillStyle::None,
        Some("solid") => FillStyle::Solid { color: fg },
        Some(p) => FillStyle::Pattern {
            pattern: p.to_string(),
            foreground: fg,
            background: bg,
        },
    }
}

/// Parse a color element; rgb wins over theme, theme over indexed
fn parse_color_attrs(e: &BytesStart<'_>) -> Color {
    if let Some(color) = attr_value(e, b"rgb").and_then(|rgb| Color::from_hex(&rgb)) {
        // opaque ARGB is how plain RGB is stored
        return match color {
            Color::Argb { a: 0xFF, r, g, b } => Color::rgb(r, g, b),
            other => other,
        };
    }

    if let Some(index) = attr_value(e, b"theme").and_then(|s| s.parse::<u8>().ok()) {
        let tint = attr_value(e, b"tint")
            .and_then(|s| s.parse::<f64>().ok())
            .map(|t| (t * 100.0).round() as i8)
            .unwrap_or(0);
        return Color::theme(index, tint);
    }

    match attr_value(e, b"indexed").and_then(|s| s.parse::<u8>().ok()) {
        Some(64) | None => Color::Auto,
        Some(i) => Color::Indexed(i),
    }
}

fn get_border_edge(border: &BorderStyle, edge: &str) -> Option<BorderEdge> {
    match edge {
        "left" => border.left,
        "right" => border.right,
        "top" => border.top,
        "bottom" => border.bottom,
        _ => None,
    }
}

fn set_border_edge(border: &mut BorderStyle, edge: &str, val: Option<BorderEdge>) {
    match edge {
        "left" => border.left = val,
        "right" => border.right = val,
        "top" => border.top = val,
        "bottom" => border.bottom = val,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_styles_roundtrip_keeps_indices() {
        let mut pool = StylePool::new();
        let bold = pool.intern(Style::new().bold(true).font_color(Color::RED));
        let money = pool.intern(Style::new().number_format("#,##0.00").fill_color(Color::YELLOW));
        let boxed = pool.intern(
            Style::new()
                .border_all(BorderLineStyle::Thin, Color::BLACK)
                .wrap_text(true),
        );

        let xml = to_styles_xml(&pool);
        let styles = read_styles_xml(xml.as_bytes()).unwrap();

        assert_eq!(styles.len(), 4);
        assert_eq!(&styles[bold.index()], pool.get(bold).unwrap());
        assert_eq!(&styles[money.index()], pool.get(money).unwrap());
        assert_eq!(&styles[boxed.index()], pool.get(boxed).unwrap());
    }

    #[test]
    fn test_theme_color_is_kept_symbolic() {
        let mut pool = StylePool::new();
        let id = pool.intern(Style::new().fill_color(Color::theme(4, 40)));

        let styles = read_styles_xml(to_styles_xml(&pool).as_bytes()).unwrap();
        assert_eq!(
            styles[id.index()].fill,
            FillStyle::Solid {
                color: Color::theme(4, 40)
            }
        );
    }

    #[test]
    fn test_builtin_number_format() {
        let xml = r#"<styleSheet><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
            <cellXfs count="2"><xf numFmtId="0" fontId="0"/><xf numFmtId="14" fontId="0"/></cellXfs></styleSheet>"#;
        let styles = read_styles_xml(xml.as_bytes()).unwrap();
        assert_eq!(styles[1].number_format, NumberFormat::BuiltIn(14));
    }

    #[test]
    fn test_missing_cell_xfs_yields_default() {
        let styles = read_styles_xml("<styleSheet/>".as_bytes()).unwrap();
        assert_eq!(styles, vec![Style::default()]);
    }
}
