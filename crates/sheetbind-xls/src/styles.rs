//! BIFF8 formatting records.
//!
//! FONT, FORMAT, XF and PALETTE records from the globals substream are
//! collected into a [`StyleContext`], which resolves each XF into a core
//! [`Style`].

use std::collections::HashMap;

use sheetbind_core::{
    Alignment, BorderEdge, BorderLineStyle, BorderStyle, Color, FillStyle, FontStyle,
    HorizontalAlignment, NumberFormat, Style, VerticalAlignment,
};

use crate::biff::parser::{read_u16, read_u32, read_u8};
use crate::biff::strings::{read_short_string, read_unicode_string};
use crate::error::{XlsError, XlsResult};

/// Standard palette for colour indices 8..=63. A PALETTE record replaces it.
pub(crate) const DEFAULT_PALETTE: [(u8, u8, u8); 56] = [
    (0, 0, 0),
    (255, 255, 255),
    (255, 0, 0),
    (0, 255, 0),
    (0, 0, 255),
    (255, 255, 0),
    (255, 0, 255),
    (0, 255, 255),
    (128, 0, 0),
    (0, 128, 0),
    (0, 0, 128),
    (128, 128, 0),
    (128, 0, 128),
    (0, 128, 128),
    (192, 192, 192),
    (128, 128, 128),
    (153, 153, 255),
    (153, 51, 102),
    (255, 255, 204),
    (204, 255, 255),
    (102, 0, 102),
    (255, 128, 128),
    (0, 102, 204),
    (204, 204, 255),
    (0, 0, 128),
    (255, 0, 255),
    (255, 255, 0),
    (0, 255, 255),
    (128, 0, 128),
    (128, 0, 0),
    (0, 128, 128),
    (0, 0, 255),
    (0, 204, 255),
    (204, 255, 255),
    (204, 255, 204),
    (255, 255, 153),
    (153, 204, 255),
    (255, 153, 204),
    (204, 153, 255),
    (255, 204, 153),
    (51, 102, 255),
    (51, 204, 204),
    (153, 204, 0),
    (255, 204, 0),
    (255, 153, 0),
    (255, 102, 0),
    (102, 102, 153),
    (150, 150, 150),
    (0, 51, 102),
    (51, 153, 102),
    (0, 51, 0),
    (51, 51, 0),
    (153, 51, 0),
    (153, 51, 51),
    (51, 51, 153),
    (51, 51, 51),
];

/// FONT record
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BiffFont {
    pub height_twips: u16,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub color_index: u16,
    pub name: String,
}

/// XF record, reduced to the attributes the core style model carries
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct BiffXf {
    pub font_index: u16,
    pub format_index: u16,
    pub hor_align: u8,
    pub vert_align: u8,
    pub wrap_text: bool,
    pub indent: u8,
    pub rotation: u8,
    /// Line codes, left, right, top, bottom
    pub lines: [u8; 4],
    /// Line colour indices, same order
    pub line_colors: [u16; 4],
    pub fill_pattern: u8,
    pub icv_fore: u16,
    pub icv_back: u16,
}

/// Formatting collected from the globals substream
#[derive(Debug)]
pub(crate) struct StyleContext {
    pub fonts: Vec<BiffFont>,
    pub formats: HashMap<u16, String>,
    pub xfs: Vec<BiffXf>,
    pub palette: [(u8, u8, u8); 56],
}

impl StyleContext {
    pub fn new() -> Self {
        Self {
            fonts: Vec::new(),
            formats: HashMap::new(),
            xfs: Vec::new(),
            palette: DEFAULT_PALETTE,
        }
    }

    /// One resolved style per XF record, in XF order.
    pub fn build_style_table(&self) -> Vec<Style> {
        self.xfs.iter().map(|xf| self.resolve_xf(xf)).collect()
    }

    fn resolve_xf(&self, xf: &BiffXf) -> Style {
        Style {
            font: self.resolve_font(xf.font_index),
            fill: self.resolve_fill(xf),
            border: self.resolve_border(xf),
            alignment: resolve_alignment(xf),
            number_format: self.resolve_number_format(xf.format_index),
        }
    }

    fn resolve_font(&self, font_index: u16) -> FontStyle {
        // index 4 is never written, so 5 and up are stored one slot lower
        let slot = if font_index >= 5 {
            font_index as usize - 1
        } else {
            font_index as usize
        };
        match self.fonts.get(slot) {
            Some(f) => FontStyle {
                name: f.name.clone(),
                size: f.height_twips as f64 / 20.0,
                bold: f.bold,
                italic: f.italic,
                underline: f.underline,
                strikethrough: f.strikethrough,
                color: self.resolve_color(f.color_index),
            },
            None => FontStyle::default(),
        }
    }

    fn resolve_fill(&self, xf: &BiffXf) -> FillStyle {
        match xf.fill_pattern {
            0 => FillStyle::None,
            1 => match self.resolve_color(xf.icv_fore) {
                Color::Auto => FillStyle::None,
                color => FillStyle::Solid { color },
            },
            code => match pattern_name(code) {
                Some(pattern) => FillStyle::Pattern {
                    pattern: pattern.to_string(),
                    foreground: self.resolve_color(xf.icv_fore),
                    background: self.resolve_color(xf.icv_back),
                },
                None => FillStyle::None,
            },
        }
    }

    fn resolve_border(&self, xf: &BiffXf) -> BorderStyle {
        let edge = |i: usize| match border_line_from_biff(xf.lines[i]) {
            BorderLineStyle::None => None,
            style => Some(BorderEdge {
                style,
                color: self.resolve_color(xf.line_colors[i]),
            }),
        };
        BorderStyle {
            left: edge(0),
            right: edge(1),
            top: edge(2),
            bottom: edge(3),
        }
    }

    fn resolve_number_format(&self, id: u16) -> NumberFormat {
        if id == 0 {
            return NumberFormat::General;
        }
        match self.formats.get(&id) {
            Some(code) => NumberFormat::Custom(code.clone()),
            None => NumberFormat::BuiltIn(id as u32),
        }
    }

    pub(crate) fn resolve_color(&self, icv: u16) -> Color {
        let (r, g, b) = match icv {
            // EGA colours share the first palette slots
            0..=7 => DEFAULT_PALETTE[icv as usize],
            8..=63 => self.palette[icv as usize - 8],
            // system window text and window background
            0x40 => (0, 0, 0),
            0x41 => (255, 255, 255),
            _ => return Color::Auto,
        };
        Color::Rgb { r, g, b }
    }
}

fn resolve_alignment(xf: &BiffXf) -> Alignment {
    let horizontal = match xf.hor_align {
        1 => HorizontalAlignment::Left,
        2 | 6 => HorizontalAlignment::Center,
        3 => HorizontalAlignment::Right,
        4 => HorizontalAlignment::Fill,
        5 | 7 => HorizontalAlignment::Justify,
        _ => HorizontalAlignment::General,
    };
    let vertical = match xf.vert_align {
        0 => VerticalAlignment::Top,
        1 => VerticalAlignment::Center,
        3 | 4 => VerticalAlignment::Justify,
        _ => VerticalAlignment::Bottom,
    };
    // 1..=90 counter-clockwise, 91..=180 clockwise, 255 stacked
    let rotation = match xf.rotation {
        r @ 1..=90 => r as i16,
        r @ 91..=180 => 90 - r as i16,
        255 => 255,
        _ => 0,
    };
    Alignment {
        horizontal,
        vertical,
        wrap_text: xf.wrap_text,
        indent: xf.indent,
        rotation,
    }
}

/// Parse a FONT record.
///
/// ```text
///  0  u16  height in twips
///  2  u16  flags (0x02 italic, 0x08 strikeout)
///  4  u16  colour index
///  6  u16  weight (700 = bold)
///  8  u16  super/subscript
/// 10  u8   underline kind
/// 11  u8   family, charset, reserved
/// 14  ...  name, short string
/// ```
pub(crate) fn parse_font(data: &[u8]) -> XlsResult<BiffFont> {
    if data.len() < 14 {
        return Err(XlsError::Parse("FONT record too short".into()));
    }
    let mut off = 0;
    let height_twips = read_u16(data, &mut off)?;
    let flags = read_u16(data, &mut off)?;
    let color_index = read_u16(data, &mut off)?;
    let weight = read_u16(data, &mut off)?;
    off += 2;
    let underline = read_u8(data, &mut off)?;
    off += 3;
    let name = if off < data.len() {
        read_short_string(data, &mut off)?
    } else {
        String::new()
    };

    Ok(BiffFont {
        height_twips,
        bold: weight >= 700,
        italic: flags & 0x0002 != 0,
        underline: underline != 0,
        strikethrough: flags & 0x0008 != 0,
        color_index,
        name,
    })
}

/// Parse a FORMAT record into `(format id, format code)`.
pub(crate) fn parse_format(data: &[u8]) -> XlsResult<(u16, String)> {
    let mut off = 0;
    let id = read_u16(data, &mut off)?;
    let code = read_unicode_string(data, &mut off)?;
    Ok((id, code))
}

/// Parse a 20-byte XF record.
///
/// ```text
///  0  u16  font index
///  2  u16  format index
///  4  u16  type and protection
///  6  u8   halign (0-2), wrap (3), valign (4-6)
///  7  u8   rotation
///  8  u8   indent (0-3)
///  9  u8   used attributes
/// 10  u32  line codes (4 x 4 bits), left and right colours (2 x 7 bits)
/// 14  u32  top and bottom colours, diagonal, fill pattern (26-31)
/// 18  u16  fill foreground and background colours
/// ```
pub(crate) fn parse_xf(data: &[u8]) -> XlsResult<BiffXf> {
    if data.len() < 20 {
        return Err(XlsError::Parse(format!(
            "XF record too short: {} bytes",
            data.len()
        )));
    }
    let mut off = 0;
    let font_index = read_u16(data, &mut off)?;
    let format_index = read_u16(data, &mut off)?;
    off += 2;
    let align = read_u8(data, &mut off)?;
    let rotation = read_u8(data, &mut off)?;
    let indent = read_u8(data, &mut off)? & 0x0F;
    off += 1;
    let border1 = read_u32(data, &mut off)?;
    let border2 = read_u32(data, &mut off)?;
    let fill = read_u16(data, &mut off)?;

    Ok(BiffXf {
        font_index,
        format_index,
        hor_align: align & 0x07,
        wrap_text: align & 0x08 != 0,
        vert_align: (align >> 4) & 0x07,
        indent,
        rotation,
        lines: [
            (border1 & 0x0F) as u8,
            ((border1 >> 4) & 0x0F) as u8,
            ((border1 >> 8) & 0x0F) as u8,
            ((border1 >> 12) & 0x0F) as u8,
        ],
        line_colors: [
            ((border1 >> 16) & 0x7F) as u16,
            ((border1 >> 23) & 0x7F) as u16,
            (border2 & 0x7F) as u16,
            ((border2 >> 7) & 0x7F) as u16,
        ],
        fill_pattern: ((border2 >> 26) & 0x3F) as u8,
        icv_fore: fill & 0x7F,
        icv_back: (fill >> 7) & 0x7F,
    })
}

/// Overwrite palette entries from a PALETTE record.
pub(crate) fn apply_palette(data: &[u8], palette: &mut [(u8, u8, u8); 56]) -> XlsResult<()> {
    let mut off = 0;
    let count = read_u16(data, &mut off)? as usize;
    for (slot, rgb) in palette.iter_mut().zip(data[off..].chunks_exact(4)).take(count) {
        *slot = (rgb[0], rgb[1], rgb[2]);
    }
    Ok(())
}

/// BIFF line codes 0..=13; the dash-dot variants fold into their nearest
/// core line style.
fn border_line_from_biff(code: u8) -> BorderLineStyle {
    match code {
        1 => BorderLineStyle::Thin,
        2 => BorderLineStyle::Medium,
        3 | 8 | 9 | 10 | 11 | 12 | 13 => BorderLineStyle::Dashed,
        4 => BorderLineStyle::Dotted,
        5 => BorderLineStyle::Thick,
        6 => BorderLineStyle::Double,
        7 => BorderLineStyle::Hair,
        _ => BorderLineStyle::None,
    }
}

/// SpreadsheetML name of a BIFF fill pattern code 2..=18.
fn pattern_name(code: u8) -> Option<&'static str> {
    Some(match code {
        2 => "mediumGray",
        3 => "darkGray",
        4 => "lightGray",
        5 => "darkHorizontal",
        6 => "darkVertical",
        7 => "darkDown",
        8 => "darkUp",
        9 => "darkGrid",
        10 => "darkTrellis",
        11 => "lightHorizontal",
        12 => "lightVertical",
        13 => "lightDown",
        14 => "lightUp",
        15 => "lightGrid",
        16 => "lightTrellis",
        17 => "gray125",
        18 => "gray0625",
        _ => return None,
    })
}
