//! XLSX reader

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use log::{debug, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::print_titles;
use crate::styles::{attr_value, read_styles_xml};
use sheetbind_core::style::{Style, StyleId};
use sheetbind_core::{
    CellAddress, CellComment, CellError, CellRange, CellValue, Hyperlink, HyperlinkKind,
    NameScope, NamedRange, PageOrientation, Workbook, Worksheet,
};

/// Decode Excel's `_xHHHH_` escape sequences in strings.
///
/// Excel uses this format to encode special characters in XML:
/// - `_x000d_` = CR (carriage return)
/// - `_x000a_` = LF (line feed)
/// - `_x0009_` = Tab
/// - `_x005f_` = Underscore (escaped underscore)
fn decode_excel_escapes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find("_x") {
        result.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        let decoded = candidate
            .get(2..6)
            .filter(|hex| hex.chars().all(|c| c.is_ascii_hexdigit()))
            .filter(|_| candidate.get(6..7) == Some("_"))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);

        match decoded {
            Some(c) => {
                result.push(c);
                rest = &candidate[7..];
            }
            None => {
                result.push_str("_x");
                rest = &candidate[2..];
            }
        }
    }

    result.push_str(rest);
    result
}

/// Interpret an OOXML boolean attribute
fn is_true(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// A `<sheet>` entry of workbook.xml
#[derive(Debug)]
struct SheetEntry {
    name: String,
    r_id: String,
    hidden: bool,
}

/// A `<definedName>` entry of workbook.xml
#[derive(Debug)]
struct DefinedName {
    name: String,
    local_sheet_id: Option<usize>,
    hidden: bool,
    formula: String,
}

#[derive(Debug, Default)]
struct WorkbookXml {
    sheets: Vec<SheetEntry>,
    defined_names: Vec<DefinedName>,
    active_tab: usize,
}

/// One `<Relationship>` of a .rels part
#[derive(Debug, Clone)]
struct Relationship {
    rel_type: String,
    target: String,
    external: bool,
}

/// A `<hyperlink>` element, resolved once the sheet's relationships are known
#[derive(Debug, Default)]
struct HyperlinkEntry {
    cell_ref: String,
    r_id: Option<String>,
    location: Option<String>,
    display: Option<String>,
    tooltip: Option<String>,
}

/// Parsing state of the `<c>` element being read
#[derive(Debug, Default)]
struct PendingCell {
    cell_ref: String,
    cell_type: Option<String>,
    style: Option<u32>,
    value: Option<String>,
    formula: Option<String>,
}

/// Which text-bearing element the worksheet parser is inside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    None,
    Value,
    Formula,
    InlineText,
    OddHeader,
    OddFooter,
}

/// XLSX file reader
pub struct XlsxReader;

impl XlsxReader {
    /// Read a workbook from a file path
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsxResult<Workbook> {
        let file = File::open(path)?;
        Self::read(file)
    }

    /// Read a workbook from a reader
    pub fn read<R: Read + Seek>(reader: R) -> XlsxResult<Workbook> {
        let mut archive = zip::ZipArchive::new(reader)?;

        // Verify this is an XLSX file
        if archive.by_name("[Content_Types].xml").is_err() {
            return Err(XlsxError::InvalidFormat(
                "Missing [Content_Types].xml".into(),
            ));
        }

        let shared_strings = Self::read_shared_strings(&mut archive)?;
        let cell_styles = Self::read_styles(&mut archive)?;
        let info = Self::read_workbook_xml(&mut archive)?;
        let workbook_rels = Self::read_rels(&mut archive, "xl/_rels/workbook.xml.rels")?
            .ok_or_else(|| XlsxError::MissingPart("xl/_rels/workbook.xml.rels".into()))?;

        let mut workbook = Workbook::empty();
        Self::install_styles(&mut workbook, cell_styles)?;
        let style_count = workbook.styles().len();

        // localSheetId counts <sheet> entries, which may differ from the
        // model's indices when an entry has no part
        let mut sheet_index_map: HashMap<usize, usize> = HashMap::new();

        for (xml_idx, entry) in info.sheets.iter().enumerate() {
            let path = match workbook_rels.get(&entry.r_id) {
                Some(rel) if rel.rel_type.ends_with("/worksheet") => {
                    resolve_target("xl", &rel.target)
                }
                _ => {
                    warn!(
                        "skipping sheet '{}': no worksheet relationship {}",
                        entry.name, entry.r_id
                    );
                    continue;
                }
            };

            let sheet_idx = workbook.add_worksheet_with_name(&entry.name)?;
            sheet_index_map.insert(xml_idx, sheet_idx);

            let sheet_rels = Self::read_rels(&mut archive, &rels_path_for(&path))?.unwrap_or_default();
            let sheet_count = workbook.sheet_count();
            let worksheet = workbook
                .worksheet_mut(sheet_idx)
                .ok_or(sheetbind_core::Error::SheetOutOfBounds(sheet_idx, sheet_count))?;
            worksheet.set_visible(!entry.hidden);

            let hyperlinks = Self::read_worksheet(
                &mut archive,
                &path,
                worksheet,
                &shared_strings,
                style_count,
            )?;
            Self::apply_hyperlinks(worksheet, hyperlinks, &sheet_rels)?;

            let sheet_dir = parent_dir(&path);
            for rel in sheet_rels.values() {
                if rel.rel_type.ends_with("/comments") {
                    let comments_path = resolve_target(sheet_dir, &rel.target);
                    Self::read_worksheet_comments(&mut archive, &comments_path, worksheet)?;
                }
            }
            debug!(
                "read sheet '{}' ({} cells) from {}",
                entry.name,
                worksheet.cell_count(),
                path
            );
        }

        // Ensure at least one sheet exists
        if workbook.is_empty() {
            workbook.add_worksheet()?;
        }

        Self::apply_defined_names(&mut workbook, info.defined_names, &sheet_index_map)?;

        if let Some(&active) = sheet_index_map.get(&info.active_tab) {
            workbook.set_active_sheet(active)?;
        }

        Ok(workbook)
    }

    /// Read the shared strings table
    fn read_shared_strings<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<Vec<String>> {
        let mut strings = Vec::new();

        let file = match archive.by_name("xl/sharedStrings.xml") {
            Ok(f) => f,
            Err(_) => return Ok(strings), // No shared strings is valid
        };

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(false);

        let mut buf = Vec::new();
        let mut current_string = String::new();
        let mut in_si = false;
        let mut in_t = false;
        // Phonetic runs (<rPh>) carry their own <t> that is not part of the text
        let mut in_phonetic = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"si" => {
                        in_si = true;
                        current_string.clear();
                    }
                    b"rPh" => in_phonetic = true,
                    b"t" if in_si && !in_phonetic => in_t = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) if e.name().as_ref() == b"si" => {
                    strings.push(String::new());
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"si" => {
                        strings.push(decode_excel_escapes(&current_string));
                        current_string.clear();
                        in_si = false;
                    }
                    b"rPh" => in_phonetic = false,
                    b"t" => in_t = false,
                    _ => {}
                },
                Ok(Event::Text(e)) if in_t => {
                    if let Ok(text) = e.unescape() {
                        current_string.push_str(&text);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(strings)
    }

    fn read_styles<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> XlsxResult<Vec<Style>> {
        match archive.by_name("xl/styles.xml") {
            Ok(file) => read_styles_xml(file),
            Err(_) => Ok(vec![Style::default()]),
        }
    }

    /// Put `cellXfs` into the pool so that xf index == style id
    fn install_styles(workbook: &mut Workbook, cell_styles: Vec<Style>) -> XlsxResult<()> {
        let mut styles = cell_styles.into_iter();
        if let Some(first) = styles.next() {
            workbook.update_style(StyleId::DEFAULT, |s| *s = first)?;
        }
        for style in styles {
            workbook.styles_mut().push(style);
        }
        Ok(())
    }

    /// Read workbook.xml: sheets, defined names and the active tab
    fn read_workbook_xml<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<WorkbookXml> {
        let file = archive
            .by_name("xl/workbook.xml")
            .map_err(|_| XlsxError::MissingPart("xl/workbook.xml".into()))?;

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut info = WorkbookXml::default();
        let mut current_name: Option<DefinedName> = None;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"sheet" => {
                    let name = attr_value(&e, b"name");
                    let r_id = attr_value(&e, b"r:id");
                    let hidden = matches!(
                        attr_value(&e, b"state").as_deref(),
                        Some("hidden") | Some("veryHidden")
                    );

                    if let (Some(name), Some(r_id)) = (name, r_id) {
                        info.sheets.push(SheetEntry { name, r_id, hidden });
                    }
                }
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.name().as_ref() == b"workbookView" =>
                {
                    info.active_tab = attr_value(&e, b"activeTab")
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(0);
                }
                Ok(Event::Start(e)) if e.name().as_ref() == b"definedName" => {
                    current_name = attr_value(&e, b"name").map(|name| DefinedName {
                        name,
                        local_sheet_id: attr_value(&e, b"localSheetId").and_then(|s| s.parse().ok()),
                        hidden: attr_value(&e, b"hidden").map_or(false, |v| is_true(&v)),
                        formula: String::new(),
                    });
                }
                Ok(Event::Text(e)) => {
                    if let Some(name) = current_name.as_mut() {
                        if let Ok(text) = e.unescape() {
                            name.formula.push_str(&text);
                        }
                    }
                }
                Ok(Event::End(e)) if e.name().as_ref() == b"definedName" => {
                    if let Some(name) = current_name.take() {
                        info.defined_names.push(name);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(info)
    }

    /// Read a .rels part keyed by relationship id; None when the part is absent
    fn read_rels<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
        path: &str,
    ) -> XlsxResult<Option<HashMap<String, Relationship>>> {
        let file = match archive.by_name(path) {
            Ok(f) => f,
            Err(_) => return Ok(None),
        };

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut rels = HashMap::new();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.name().as_ref() == b"Relationship" =>
                {
                    let id = attr_value(&e, b"Id");
                    let target = attr_value(&e, b"Target");
                    let rel_type = attr_value(&e, b"Type");
                    let external = attr_value(&e, b"TargetMode").as_deref() == Some("External");

                    if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                        rels.insert(
                            id,
                            Relationship {
                                rel_type,
                                target,
                                external,
                            },
                        );
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(Some(rels))
    }

    /// Read a worksheet part into `worksheet`, returning its unresolved hyperlinks
    fn read_worksheet<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
        path: &str,
        worksheet: &mut Worksheet,
        shared_strings: &[String],
        style_count: usize,
    ) -> XlsxResult<Vec<HyperlinkEntry>> {
        let file = archive
            .by_name(path)
            .map_err(|_| XlsxError::MissingPart(path.to_string()))?;

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(false);

        let mut buf = Vec::new();
        let mut cell: Option<PendingCell> = None;
        let mut target = TextTarget::None;
        let mut text = String::new();
        let mut hyperlinks = Vec::new();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"row" => Self::read_row_attrs(&e, worksheet)?,
                    b"c" => cell = Some(Self::read_cell_attrs(&e)),
                    b"v" if cell.is_some() => {
                        target = TextTarget::Value;
                        text.clear();
                    }
                    b"f" if cell.is_some() => {
                        target = TextTarget::Formula;
                        text.clear();
                    }
                    b"t" if cell.is_some() => {
                        target = TextTarget::InlineText;
                    }
                    b"is" => text.clear(),
                    b"oddHeader" => {
                        target = TextTarget::OddHeader;
                        text.clear();
                    }
                    b"oddFooter" => {
                        target = TextTarget::OddFooter;
                        text.clear();
                    }
                    b"hyperlink" => hyperlinks.push(Self::read_hyperlink_attrs(&e)),
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.name().as_ref() {
                    b"row" => Self::read_row_attrs(&e, worksheet)?,
                    b"c" => {
                        // Style-only cell
                        let pending = Self::read_cell_attrs(&e);
                        Self::process_cell(worksheet, pending, shared_strings, style_count)?;
                    }
                    b"col" => Self::read_col_attrs(&e, worksheet)?,
                    b"mergeCell" => {
                        if let Some(r) = attr_value(&e, b"ref") {
                            let range = CellRange::parse(&r).map_err(|err| {
                                XlsxError::Parse(format!("Invalid merge range '{}': {}", r, err))
                            })?;
                            worksheet.add_merged_region(range);
                        }
                    }
                    b"hyperlink" => hyperlinks.push(Self::read_hyperlink_attrs(&e)),
                    b"pageSetUpPr" => {
                        if let Some(v) = attr_value(&e, b"autoPageBreaks") {
                            worksheet.print_options_mut().autobreaks = is_true(&v);
                        }
                    }
                    b"printOptions" => {
                        let options = worksheet.print_options_mut();
                        for attr in e.attributes().flatten() {
                            let val = attr.unescape_value().map(|v| is_true(&v)).unwrap_or(false);
                            match attr.key.as_ref() {
                                b"horizontalCentered" => options.horizontal_centered = val,
                                b"verticalCentered" => options.vertical_centered = val,
                                _ => {}
                            }
                        }
                    }
                    b"pageMargins" => {
                        let margins = worksheet.margins_mut();
                        for attr in e.attributes().flatten() {
                            let val = match attr.unescape_value().ok().and_then(|v| v.parse().ok()) {
                                Some(v) => v,
                                None => continue,
                            };
                            match attr.key.as_ref() {
                                b"left" => margins.left = val,
                                b"right" => margins.right = val,
                                b"top" => margins.top = val,
                                b"bottom" => margins.bottom = val,
                                b"header" => margins.header = val,
                                b"footer" => margins.footer = val,
                                _ => {}
                            }
                        }
                    }
                    b"pageSetup" => Self::read_page_setup_attrs(&e, worksheet),
                    _ => {}
                },
                Ok(Event::Text(e)) if target != TextTarget::None => {
                    if let Ok(t) = e.unescape() {
                        text.push_str(&t);
                    }
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"v" => {
                        if let Some(c) = cell.as_mut() {
                            c.value = Some(std::mem::take(&mut text));
                        }
                        target = TextTarget::None;
                    }
                    b"f" => {
                        if let Some(c) = cell.as_mut() {
                            // Shared-formula children carry no text; keep their cached value only
                            if !text.is_empty() {
                                c.formula = Some(std::mem::take(&mut text));
                            }
                        }
                        target = TextTarget::None;
                    }
                    b"t" if target == TextTarget::InlineText => {
                        target = TextTarget::None;
                    }
                    b"is" => {
                        if let Some(c) = cell.as_mut() {
                            c.value = Some(std::mem::take(&mut text));
                        }
                    }
                    b"c" => {
                        if let Some(pending) = cell.take() {
                            Self::process_cell(worksheet, pending, shared_strings, style_count)?;
                        }
                    }
                    b"oddHeader" => {
                        worksheet.header_footer_mut().set_header_text(&text);
                        target = TextTarget::None;
                    }
                    b"oddFooter" => {
                        worksheet.header_footer_mut().set_footer_text(&text);
                        target = TextTarget::None;
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(hyperlinks)
    }

    /// Row dimensions: ht, customHeight, hidden
    fn read_row_attrs(e: &BytesStart<'_>, worksheet: &mut Worksheet) -> XlsxResult<()> {
        let row_num: Option<u32> = attr_value(e, b"r").and_then(|s| s.parse().ok());
        let ht: Option<f64> = attr_value(e, b"ht").and_then(|s| s.parse().ok());
        let custom_height = attr_value(e, b"customHeight").map_or(false, |s| is_true(&s));
        let hidden = attr_value(e, b"hidden").map_or(false, |s| is_true(&s));

        if let Some(r) = row_num {
            let row_idx = r.saturating_sub(1); // 1-based to 0-based
            if custom_height {
                if let Some(h) = ht {
                    worksheet.set_row_height(row_idx, h)?;
                }
            }
            if hidden {
                worksheet.set_row_hidden(row_idx, true)?;
            }
        }
        Ok(())
    }

    fn read_cell_attrs(e: &BytesStart<'_>) -> PendingCell {
        PendingCell {
            cell_ref: attr_value(e, b"r").unwrap_or_default(),
            cell_type: attr_value(e, b"t"),
            style: attr_value(e, b"s").and_then(|s| s.parse().ok()),
            value: None,
            formula: None,
        }
    }

    fn read_col_attrs(e: &BytesStart<'_>, worksheet: &mut Worksheet) -> XlsxResult<()> {
        let min: Option<u16> = attr_value(e, b"min").and_then(|s| s.parse().ok());
        let max: Option<u16> = attr_value(e, b"max").and_then(|s| s.parse().ok());
        let width: Option<f64> = attr_value(e, b"width").and_then(|s| s.parse().ok());

        if let (Some(min), Some(max), Some(width)) = (min, max, width) {
            let last = max.min(sheetbind_core::MAX_COLS);
            for col in min.max(1)..=last {
                worksheet.set_column_width(col - 1, width)?;
            }
        }
        Ok(())
    }

    fn read_hyperlink_attrs(e: &BytesStart<'_>) -> HyperlinkEntry {
        HyperlinkEntry {
            cell_ref: attr_value(e, b"ref").unwrap_or_default(),
            r_id: attr_value(e, b"r:id"),
            location: attr_value(e, b"location"),
            display: attr_value(e, b"display"),
            tooltip: attr_value(e, b"tooltip"),
        }
    }

    fn read_page_setup_attrs(e: &BytesStart<'_>, worksheet: &mut Worksheet) {
        let setup = worksheet.page_setup_mut();
        for attr in e.attributes().flatten() {
            let val = match attr.unescape_value() {
                Ok(v) => v.to_string(),
                Err(_) => continue,
            };
            match attr.key.as_ref() {
                b"paperSize" => setup.paper_size = val.parse().unwrap_or(setup.paper_size),
                b"orientation" => setup.orientation = PageOrientation::parse(&val),
                b"scale" => setup.scale = val.parse().unwrap_or(setup.scale),
                b"fitToWidth" => setup.fit_width = val.parse().unwrap_or(setup.fit_width),
                b"fitToHeight" => setup.fit_height = val.parse().unwrap_or(setup.fit_height),
                b"copies" => setup.copies = val.parse().unwrap_or(setup.copies),
                b"draft" => setup.draft = is_true(&val),
                b"blackAndWhite" => setup.black_and_white = is_true(&val),
                b"cellComments" => setup.notes = val != "none",
                b"firstPageNumber" => {
                    setup.first_page_number = val.parse().unwrap_or(setup.first_page_number)
                }
                b"useFirstPageNumber" => setup.use_first_page_number = is_true(&val),
                b"horizontalDpi" => setup.horizontal_dpi = val.parse().ok(),
                b"verticalDpi" => setup.vertical_dpi = val.parse().ok(),
                b"pageOrder" => setup.left_to_right = val == "overThenDown",
                _ => {}
            }
        }
    }

    /// Store a parsed cell: value or formula with cached result, then style
    fn process_cell(
        worksheet: &mut Worksheet,
        cell: PendingCell,
        shared_strings: &[String],
        style_count: usize,
    ) -> XlsxResult<()> {
        let addr = CellAddress::parse(&cell.cell_ref).map_err(|e| {
            XlsxError::Parse(format!("Invalid cell reference '{}': {}", cell.cell_ref, e))
        })?;
        let cell_type = cell.cell_type.as_deref();

        if let Some(f) = cell.formula {
            let cached = match cell.value.as_deref() {
                Some(v) => Some(Self::parse_value(v, cell_type, shared_strings)?),
                None => None,
            };
            let formula_text = if f.starts_with('=') { f } else { format!("={}", f) };

            worksheet.set_cell_value_at(
                addr.row,
                addr.col,
                CellValue::Formula {
                    text: formula_text,
                    cached_value: cached.map(Box::new),
                },
            )?;
        } else if let Some(value) = cell.value.as_deref() {
            let cell_value = Self::parse_value(value, cell_type, shared_strings)?;
            worksheet.set_cell_value_at(addr.row, addr.col, cell_value)?;
        }

        match cell.style {
            Some(s) if s as usize >= style_count => {
                return Err(XlsxError::Parse(format!("Style index {} out of bounds", s)));
            }
            Some(s) if s != 0 => worksheet.set_cell_style_at(addr.row, addr.col, StyleId(s))?,
            // Keep unstyled empty cells so that the template block stays addressable
            _ => {
                worksheet.cell_mut_or_create(addr.row, addr.col)?;
            }
        }

        Ok(())
    }

    /// Interpret a `<v>` (or inline string) by the cell's `t` attribute
    fn parse_value(value: &str, cell_type: Option<&str>, shared_strings: &[String]) -> XlsxResult<CellValue> {
        Ok(match cell_type {
            Some("s") => {
                let idx: usize = value.parse().map_err(|_| {
                    XlsxError::Parse(format!("Invalid shared string index: {}", value))
                })?;
                let s = shared_strings.get(idx).ok_or_else(|| {
                    XlsxError::Parse(format!("Shared string index {} out of bounds", idx))
                })?;
                CellValue::string(s.as_str())
            }
            Some("b") => CellValue::Boolean(is_true(value)),
            Some("e") => CellError::parse(value)
                .map(CellValue::Error)
                .unwrap_or_else(|| CellValue::string(value)),
            Some("inlineStr") | Some("str") => CellValue::string(decode_excel_escapes(value)),
            None | Some("n") => match value.parse::<f64>() {
                Ok(n) => CellValue::Number(n),
                Err(_) => CellValue::string(value),
            },
            // Unknown type (including ISO dates, "d") - keep the text
            Some(_) => CellValue::string(value),
        })
    }

    fn apply_hyperlinks(
        worksheet: &mut Worksheet,
        entries: Vec<HyperlinkEntry>,
        rels: &HashMap<String, Relationship>,
    ) -> XlsxResult<()> {
        for entry in entries {
            let range = match CellRange::parse(&entry.cell_ref) {
                Ok(r) => r,
                Err(_) => {
                    warn!("ignoring hyperlink with invalid ref '{}'", entry.cell_ref);
                    continue;
                }
            };

            let external = entry
                .r_id
                .as_ref()
                .and_then(|id| rels.get(id))
                .filter(|rel| rel.external);
            let mut link = match (external, entry.location) {
                (Some(rel), location) => {
                    let target = match location {
                        Some(loc) => format!("{}#{}", rel.target, loc),
                        None => rel.target.clone(),
                    };
                    Hyperlink::new(external_kind(&target), target)
                }
                (None, Some(location)) => Hyperlink::document(location),
                (None, None) => {
                    warn!("ignoring hyperlink at {} without target", entry.cell_ref);
                    continue;
                }
            };
            link.display = entry.display;
            link.tooltip = entry.tooltip;

            // Only the top-left cell of a multi-cell ref carries the link
            worksheet.set_hyperlink_at(range.start.row, range.start.col, link)?;
        }
        Ok(())
    }

    /// Install defined names; `_xlnm.Print_Titles` becomes repeat rows/columns
    fn apply_defined_names(
        workbook: &mut Workbook,
        names: Vec<DefinedName>,
        sheet_index_map: &HashMap<usize, usize>,
    ) -> XlsxResult<()> {
        for name in names {
            let scope = match name.local_sheet_id {
                Some(id) => match sheet_index_map.get(&id) {
                    Some(&idx) => NameScope::Sheet(idx),
                    None => {
                        warn!("dropping name '{}' scoped to a missing sheet", name.name);
                        continue;
                    }
                },
                None => NameScope::Workbook,
            };

            if name.name == print_titles::DEFINED_NAME {
                if let NameScope::Sheet(idx) = scope {
                    let (rows, cols) = print_titles::parse(&name.formula);
                    let sheet = workbook.sheet_mut(idx)?;
                    let options = sheet.print_options_mut();
                    options.repeat_rows = rows;
                    options.repeat_cols = cols;
                }
                continue;
            }

            let mut range = NamedRange::new(name.name, name.formula, scope);
            range.hidden = name.hidden;
            workbook.named_ranges_mut().define_or_update(range);
        }
        Ok(())
    }

    /// Read comments for a worksheet from its comments part
    fn read_worksheet_comments<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
        comments_path: &str,
        worksheet: &mut Worksheet,
    ) -> XlsxResult<()> {
        let file = match archive.by_name(comments_path) {
            Ok(f) => f,
            Err(_) => {
                warn!("comments part {} is referenced but missing", comments_path);
                return Ok(());
            }
        };

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(false);

        let mut buf = Vec::new();
        let mut authors: Vec<String> = Vec::new();

        let mut in_author = false;
        let mut in_t = false;
        let mut in_phonetic = false;
        let mut current_author = String::new();
        let mut current_ref: Option<String> = None;
        let mut current_author_id: Option<usize> = None;
        let mut current_text = String::new();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"author" => {
                        in_author = true;
                        current_author.clear();
                    }
                    b"comment" => {
                        current_ref = attr_value(&e, b"ref");
                        current_author_id = attr_value(&e, b"authorId").and_then(|s| s.parse().ok());
                        current_text.clear();
                    }
                    b"rPh" => in_phonetic = true,
                    b"t" if current_ref.is_some() && !in_phonetic => in_t = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) if e.name().as_ref() == b"author" => {
                    authors.push(String::new());
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"author" => {
                        authors.push(std::mem::take(&mut current_author));
                        in_author = false;
                    }
                    b"comment" => {
                        if let Some(cell_ref) = current_ref.take() {
                            if let Ok(addr) = CellAddress::parse(&cell_ref) {
                                let author = current_author_id
                                    .and_then(|id| authors.get(id))
                                    .cloned()
                                    .unwrap_or_default();
                                let comment = CellComment::new(author, current_text.trim());
                                worksheet.set_comment_at(addr.row, addr.col, comment)?;
                            }
                        }
                        current_text.clear();
                    }
                    b"rPh" => in_phonetic = false,
                    b"t" => in_t = false,
                    _ => {}
                },
                Ok(Event::Text(e)) => {
                    if in_author {
                        if let Ok(text) = e.unescape() {
                            current_author.push_str(&text);
                        }
                    } else if in_t {
                        // Rich text runs are concatenated as-is
                        if let Ok(text) = e.unescape() {
                            current_text.push_str(&decode_excel_escapes(&text));
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(())
    }
}

/// Guess the kind of an external hyperlink target
fn external_kind(target: &str) -> HyperlinkKind {
    let lower = target.to_ascii_lowercase();
    if lower.starts_with("mailto:") {
        HyperlinkKind::Email
    } else if lower.starts_with("file:") || !lower.contains("://") {
        HyperlinkKind::File
    } else {
        HyperlinkKind::Url
    }
}

/// Directory part of a zip path ("xl/worksheets/sheet1.xml" -> "xl/worksheets")
fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |pos| &path[..pos])
}

/// Path of the .rels part belonging to `path`
fn rels_path_for(path: &str) -> String {
    let dir = parent_dir(path);
    let file = path[dir.len()..].trim_start_matches('/');
    if dir.is_empty() {
        format!("_rels/{}.rels", file)
    } else {
        format!("{}/_rels/{}.rels", dir, file)
    }
}

/// Resolve a relationship target against the directory of its source part
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}
