//! XLS (BIFF8) reader.
//!
//! Opens the Compound File Binary container, reads its `Workbook` stream and
//! builds a [`Workbook`] from the records: cells with their cached values,
//! styles, row heights, column widths, merges, sheet visibility and the
//! defined names a template is addressed by.
//!
//! Formula token streams are not decoded; a formula cell keeps its cached
//! result as a plain value.

use std::io::{Read, Seek};
use std::path::Path;

use log::{debug, warn};
use sheetbind_core::{
    AreaReference, CellAddress, CellError, CellRange, CellValue, NameScope, NamedRange, Style,
    StyleId, Workbook, Worksheet, MAX_COLS, MAX_ROWS,
};

use crate::biff::parser::{read_f64, read_rk, read_u16, read_u32, read_u8};
use crate::biff::records;
use crate::biff::strings::{parse_sst, read_short_string, read_uncounted_string, read_unicode_string};
use crate::biff::{self, BiffRecord};
use crate::error::{XlsError, XlsResult};
use crate::styles::{self, StyleContext};

/// Builtin name codes, indexed by the character stored in a builtin NAME
const BUILTIN_NAMES: [&str; 14] = [
    "Consolidate_Area",
    "Auto_Open",
    "Auto_Close",
    "Extract",
    "Database",
    "Criteria",
    "Print_Area",
    "Print_Titles",
    "Recorder",
    "Data_Form",
    "Auto_Activate",
    "Auto_Deactivate",
    "Sheet_Title",
    "_FilterDatabase",
];
const PRINT_TITLES: u8 = 7;

/// XLS file reader
pub struct XlsReader;

/// BOUNDSHEET record
#[derive(Debug)]
struct SheetInfo {
    /// 0 visible, 1 hidden, 2 very hidden
    visibility: u8,
    /// 0 worksheet, 2 chart, 6 VBA module
    sheet_type: u8,
    name: String,
}

/// NAME record whose formula is a plain 3-D reference or a union of them
#[derive(Debug, PartialEq)]
struct DefinedName {
    name: String,
    builtin: Option<u8>,
    hidden: bool,
    /// 1-based BOUNDSHEET index for a sheet-local name, 0 for the workbook
    itab: u16,
    /// `None` when the formula is something other than references
    areas: Option<Vec<Area3d>>,
}

/// A `ptgArea3d` or `ptgRef3d` operand
#[derive(Debug, Clone, Copy, PartialEq)]
struct Area3d {
    ixti: u16,
    first_row: u32,
    last_row: u32,
    first_col: u16,
    last_col: u16,
}

impl Area3d {
    /// BIFF8 whole rows and columns widen to the full grid.
    fn cell_range(&self) -> CellRange {
        let (first_row, last_row) = if self.first_row == 0 && self.last_row >= 0xFFFF {
            (0, MAX_ROWS - 1)
        } else {
            (self.first_row, self.last_row)
        };
        let (first_col, last_col) = if self.first_col == 0 && self.last_col >= 0xFF {
            (0, MAX_COLS - 1)
        } else {
            (self.first_col, self.last_col)
        };
        CellRange::new(
            CellAddress::new(first_row, first_col),
            CellAddress::new(last_row, last_col),
        )
    }
}

/// Everything the globals substream declares
#[derive(Debug)]
struct Globals {
    sst: Vec<String>,
    sheets: Vec<SheetInfo>,
    styles: StyleContext,
    /// First BOUNDSHEET index of each EXTERNSHEET entry
    externs: Vec<u16>,
    names: Vec<DefinedName>,
}

impl XlsReader {
    /// Read an XLS file from a filesystem path
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsResult<Workbook> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::read(file)
    }

    /// Read an XLS workbook from any `Read + Seek` source
    pub fn read<R: Read + Seek>(reader: R) -> XlsResult<Workbook> {
        let mut container = cfb::CompoundFile::open(reader)?;
        let stream_path = ["/Workbook", "/Book"]
            .into_iter()
            .find(|p| container.exists(p))
            .ok_or_else(|| XlsError::InvalidFormat("no Workbook stream in container".into()))?;

        let mut data = Vec::new();
        container.open_stream(stream_path)?.read_to_end(&mut data)?;
        let all = biff::read_all_records(&mut data.as_slice())?;

        let (globals, rest) = Self::parse_globals(&all)?;
        let groups = Self::split_substreams(rest);

        let mut workbook = Workbook::empty();
        let style_ids: Vec<Option<StyleId>> = globals
            .styles
            .build_style_table()
            .into_iter()
            .enumerate()
            .map(|(xf, style)| {
                // XF 0 is the Normal style every unformatted cell falls back to
                (xf != 0 && style != Style::default()).then(|| workbook.intern_style(style))
            })
            .collect();

        // BOUNDSHEET index -> workbook index, for worksheets only
        let mut sheet_map: Vec<Option<usize>> = Vec::with_capacity(globals.sheets.len());
        for (biff_idx, info) in globals.sheets.iter().enumerate() {
            if info.sheet_type != 0 {
                debug!("skipping non-worksheet substream '{}'", info.name);
                sheet_map.push(None);
                continue;
            }
            let idx = workbook.add_worksheet_with_name(&info.name)?;
            sheet_map.push(Some(idx));

            let ws = workbook.sheet_mut(idx)?;
            ws.set_visible(info.visibility == 0);
            if let Some(group) = groups.get(biff_idx) {
                Self::parse_sheet_records(group, ws, &globals.sst, &style_ids)?;
            }
        }

        if workbook.sheet_count() == 0 {
            return Err(XlsError::InvalidFormat("workbook has no worksheets".into()));
        }
        if let Some(first_visible) =
            (0..workbook.sheet_count()).find(|&i| workbook.worksheet(i).is_some_and(|s| s.is_visible()))
        {
            workbook.set_active_sheet(first_visible)?;
        }

        Self::apply_names(&mut workbook, globals.names, &globals.externs, &sheet_map)?;
        Ok(workbook)
    }

    /// Parse the globals substream and return it with the records after it.
    fn parse_globals(all: &[BiffRecord]) -> XlsResult<(Globals, &[BiffRecord])> {
        let first = all
            .first()
            .filter(|r| r.record_type == records::BOF)
            .ok_or_else(|| XlsError::InvalidFormat("stream does not start with BOF".into()))?;
        let (version, dt) = biff::parse_bof(&first.data)?;
        if dt != records::BOF_WORKBOOK_GLOBALS {
            return Err(XlsError::InvalidFormat(format!(
                "first substream has type 0x{dt:04X}, expected workbook globals"
            )));
        }
        if version != records::BIFF8_VERSION {
            return Err(XlsError::UnsupportedVersion(format!(
                "expected BIFF8 (0x0600), got 0x{version:04X}"
            )));
        }

        let mut globals = Globals {
            sst: Vec::new(),
            sheets: Vec::new(),
            styles: StyleContext::new(),
            externs: Vec::new(),
            names: Vec::new(),
        };

        for (idx, rec) in all.iter().enumerate().skip(1) {
            match rec.record_type {
                records::EOF => return Ok((globals, &all[idx + 1..])),
                records::SST => globals.sst = parse_sst(&rec.data, &rec.continues)?,
                records::BOUNDSHEET => globals.sheets.push(Self::parse_boundsheet(&rec.data)?),
                records::EXTERNSHEET => globals.externs = Self::parse_externsheet(&rec.data)?,
                records::NAME => match Self::parse_name(&rec.data) {
                    Ok(name) => globals.names.push(name),
                    Err(e) => warn!("skipping unreadable NAME record: {e}"),
                },
                records::FONT => globals.styles.fonts.push(styles::parse_font(&rec.data)?),
                records::FORMAT => {
                    let (id, code) = styles::parse_format(&rec.data)?;
                    globals.styles.formats.insert(id, code);
                }
                records::XF => globals.styles.xfs.push(styles::parse_xf(&rec.data)?),
                records::PALETTE => styles::apply_palette(&rec.data, &mut globals.styles.palette)?,
                _ => {}
            }
        }

        Err(XlsError::InvalidFormat("workbook globals have no EOF".into()))
    }

    /// BOUNDSHEET: stream offset(4) + visibility(1) + type(1) + short string
    fn parse_boundsheet(data: &[u8]) -> XlsResult<SheetInfo> {
        let mut off = 4;
        let visibility = read_u8(data, &mut off)? & 0x03;
        let sheet_type = read_u8(data, &mut off)?;
        let name = read_short_string(data, &mut off)?;
        Ok(SheetInfo {
            visibility,
            sheet_type,
            name,
        })
    }

    /// EXTERNSHEET: count(2) + [supbook(2) + first sheet(2) + last sheet(2)]*
    fn parse_externsheet(data: &[u8]) -> XlsResult<Vec<u16>> {
        let mut off = 0;
        let count = read_u16(data, &mut off)?;
        (0..count)
            .map(|_| {
                off += 2;
                let first = read_u16(data, &mut off)?;
                off += 2;
                Ok(first)
            })
            .collect()
    }

    /// NAME: flags(2) + key(1) + name length(1) + formula length(2) +
    /// reserved(2) + sheet(2) + menu/description/help/status lengths(4) +
    /// name + formula tokens
    fn parse_name(data: &[u8]) -> XlsResult<DefinedName> {
        let mut off = 0;
        let flags = read_u16(data, &mut off)?;
        off += 1;
        let name_len = read_u8(data, &mut off)? as usize;
        let formula_len = read_u16(data, &mut off)? as usize;
        off += 2;
        let itab = read_u16(data, &mut off)?;
        off += 4;
        let text = read_uncounted_string(data, &mut off, name_len)?;
        let formula = data
            .get(off..off + formula_len)
            .ok_or_else(|| XlsError::Parse(format!("NAME '{text}' formula is truncated")))?;

        let builtin = (flags & 0x0020 != 0).then(|| text.chars().next().map_or(0, |c| c as u8));
        let name = match builtin {
            Some(code) => match BUILTIN_NAMES.get(code as usize) {
                Some(n) => format!("_xlnm.{n}"),
                None => format!("_xlnm.builtin_{code}"),
            },
            None => text,
        };

        Ok(DefinedName {
            name,
            builtin,
            hidden: flags & 0x0001 != 0,
            itab,
            areas: Self::parse_reference_tokens(formula),
        })
    }

    /// Decode a formula made only of 3-D references, optionally unioned
    /// inside a `ptgMemFunc`.
    fn parse_reference_tokens(rgce: &[u8]) -> Option<Vec<Area3d>> {
        let mut off = 0;
        let mut areas = Vec::new();
        while off < rgce.len() {
            let ptg = rgce[off];
            off += 1;
            match ptg {
                // ptgRef3d
                0x3A | 0x5A | 0x7A => {
                    let ixti = read_u16(rgce, &mut off).ok()?;
                    let row = read_u16(rgce, &mut off).ok()? as u32;
                    let col = read_u16(rgce, &mut off).ok()? & 0x00FF;
                    areas.push(Area3d {
                        ixti,
                        first_row: row,
                        last_row: row,
                        first_col: col,
                        last_col: col,
                    });
                }
                // ptgArea3d
                0x3B | 0x5B | 0x7B => {
                    let ixti = read_u16(rgce, &mut off).ok()?;
                    let first_row = read_u16(rgce, &mut off).ok()? as u32;
                    let last_row = read_u16(rgce, &mut off).ok()? as u32;
                    let first_col = read_u16(rgce, &mut off).ok()? & 0x00FF;
                    let last_col = read_u16(rgce, &mut off).ok()? & 0x00FF;
                    areas.push(Area3d {
                        ixti,
                        first_row,
                        last_row,
                        first_col,
                        last_col,
                    });
                }
                // ptgMemFunc: the tokens it wraps follow inline
                0x29 | 0x49 | 0x69 => off += 2,
                // ptgUnion
                0x10 => {}
                _ => return None,
            }
        }
        (!areas.is_empty()).then_some(areas)
    }

    fn apply_names(
        workbook: &mut Workbook,
        names: Vec<DefinedName>,
        externs: &[u16],
        sheet_map: &[Option<usize>],
    ) -> XlsResult<()> {
        let to_sheet = |biff_idx: usize| sheet_map.get(biff_idx).copied().flatten();

        for name in names {
            let scope = match name.itab {
                0 => NameScope::Workbook,
                itab => match to_sheet(itab as usize - 1) {
                    Some(idx) => NameScope::Sheet(idx),
                    None => {
                        warn!("dropping name '{}' scoped to a missing sheet", name.name);
                        continue;
                    }
                },
            };
            let Some(areas) = name.areas else {
                warn!("skipping name '{}': formula is not a cell reference", name.name);
                continue;
            };
            let resolved: Option<Vec<(usize, CellRange)>> = areas
                .iter()
                .map(|a| {
                    let biff_idx = *externs.get(a.ixti as usize)? as usize;
                    Some((to_sheet(biff_idx)?, a.cell_range()))
                })
                .collect();
            let Some(resolved) = resolved else {
                warn!("skipping name '{}': reference to an unknown sheet", name.name);
                continue;
            };

            if name.builtin == Some(PRINT_TITLES) {
                if let NameScope::Sheet(idx) = scope {
                    let options = workbook.sheet_mut(idx)?.print_options_mut();
                    for (_, range) in &resolved {
                        let area = AreaReference {
                            sheet: None,
                            first: range.start,
                            last: range.end,
                        };
                        if area.is_whole_rows() {
                            options.repeat_rows = Some((range.start.row, range.end.row));
                        } else if area.is_whole_cols() {
                            options.repeat_cols = Some((range.start.col, range.end.col));
                        }
                    }
                }
                continue;
            }

            let [(sheet_idx, range)] = resolved.as_slice() else {
                warn!("skipping name '{}': unions are not supported", name.name);
                continue;
            };
            let sheet_name = match workbook.worksheet(*sheet_idx) {
                Some(ws) => ws.name().to_string(),
                None => continue,
            };
            let formula = AreaReference {
                sheet: None,
                first: range.start,
                last: range.end,
            }
            .to_formula(&sheet_name);

            let mut defined = NamedRange::new(name.name, formula, scope);
            defined.hidden = name.hidden;
            workbook.named_ranges_mut().define_or_update(defined);
        }
        Ok(())
    }

    /// Group the records of each BOF..EOF substream, nested ones included.
    fn split_substreams(rest: &[BiffRecord]) -> Vec<Vec<&BiffRecord>> {
        let mut groups = Vec::new();
        let mut current = Vec::new();
        let mut depth = 0usize;

        for rec in rest {
            match rec.record_type {
                records::BOF => depth += 1,
                records::EOF if depth > 0 => {
                    depth -= 1;
                    if depth == 0 {
                        groups.push(std::mem::take(&mut current));
                    }
                }
                _ if depth > 0 => current.push(rec),
                _ => {}
            }
        }
        groups
    }

    fn parse_sheet_records(
        group: &[&BiffRecord],
        ws: &mut Worksheet,
        sst: &[String],
        style_ids: &[Option<StyleId>],
    ) -> XlsResult<()> {
        let mut cells = CellSink { ws, style_ids };
        // cell of the last FORMULA whose string result is in the next STRING
        let mut pending: Option<(u32, u16)> = None;

        for rec in group {
            let data = rec.data.as_slice();
            match rec.record_type {
                records::LABELSST => {
                    let (row, col, xf, mut off) = cell_header(data)?;
                    let idx = read_u32(data, &mut off)? as usize;
                    match sst.get(idx) {
                        Some(s) => cells.put(row, col, xf, CellValue::string(s.as_str()))?,
                        None => warn!("LABELSST at ({row}, {col}) points past the SST"),
                    }
                }
                records::LABEL => {
                    let (row, col, xf, mut off) = cell_header(data)?;
                    let text = read_unicode_string(data, &mut off)?;
                    cells.put(row, col, xf, CellValue::string(text))?;
                }
                records::NUMBER => {
                    let (row, col, xf, mut off) = cell_header(data)?;
                    cells.put(row, col, xf, CellValue::Number(read_f64(data, &mut off)?))?;
                }
                records::RK => {
                    let (row, col, xf, mut off) = cell_header(data)?;
                    cells.put(row, col, xf, CellValue::Number(read_rk(data, &mut off)?))?;
                }
                records::MULRK => {
                    let (row, first_col, last_col, mut off) = multi_header(data)?;
                    for col in first_col..=last_col {
                        let xf = read_u16(data, &mut off)?;
                        cells.put(row, col, xf, CellValue::Number(read_rk(data, &mut off)?))?;
                    }
                }
                records::BLANK => {
                    let (row, col, xf, _) = cell_header(data)?;
                    cells.style(row, col, xf)?;
                }
                records::MULBLANK => {
                    let (row, first_col, last_col, mut off) = multi_header(data)?;
                    for col in first_col..=last_col {
                        let xf = read_u16(data, &mut off)?;
                        cells.style(row, col, xf)?;
                    }
                }
                records::BOOLERR => {
                    let (row, col, xf, mut off) = cell_header(data)?;
                    let value = read_u8(data, &mut off)?;
                    let value = if read_u8(data, &mut off)? != 0 {
                        CellValue::Error(error_from_code(value))
                    } else {
                        CellValue::Boolean(value != 0)
                    };
                    cells.put(row, col, xf, value)?;
                }
                records::FORMULA => {
                    let (row, col, xf, mut off) = cell_header(data)?;
                    pending = None;
                    match formula_result(data, &mut off)? {
                        FormulaResult::Value(value) => cells.put(row, col, xf, value)?,
                        FormulaResult::StringFollows => {
                            cells.style(row, col, xf)?;
                            pending = Some((row, col));
                        }
                    }
                }
                records::STRING => {
                    if let Some((row, col)) = pending.take() {
                        let mut off = 0;
                        let text = read_unicode_string(data, &mut off)?;
                        cells.ws.set_cell_value_at(row, col, CellValue::string(text))?;
                    }
                }
                records::MERGECELLS => parse_mergecells(data, cells.ws)?,
                records::ROW => parse_row(data, cells.ws)?,
                records::COLINFO => parse_colinfo(data, cells.ws)?,
                _ => {}
            }
        }
        Ok(())
    }
}

/// Writes cell values and their resolved style ids into a worksheet
struct CellSink<'a> {
    ws: &'a mut Worksheet,
    style_ids: &'a [Option<StyleId>],
}

impl CellSink<'_> {
    fn put(&mut self, row: u32, col: u16, xf: u16, value: CellValue) -> XlsResult<()> {
        self.ws.set_cell_value_at(row, col, value)?;
        self.style(row, col, xf)
    }

    /// Default-formatted cells stay unstyled, so a blank cell is only
    /// created when it carries a style.
    fn style(&mut self, row: u32, col: u16, xf: u16) -> XlsResult<()> {
        if let Some(Some(id)) = self.style_ids.get(xf as usize) {
            self.ws.set_cell_style_at(row, col, *id)?;
        }
        Ok(())
    }
}

enum FormulaResult {
    Value(CellValue),
    StringFollows,
}

/// row(2) + col(2) + xf(2), returning the offset after it
fn cell_header(data: &[u8]) -> XlsResult<(u32, u16, u16, usize)> {
    let mut off = 0;
    let row = read_u16(data, &mut off)? as u32;
    let col = read_u16(data, &mut off)?;
    let xf = read_u16(data, &mut off)?;
    Ok((row, col, xf, off))
}

/// row(2) + first col(2) ... last col(2) for MULRK and MULBLANK
fn multi_header(data: &[u8]) -> XlsResult<(u32, u16, u16, usize)> {
    if data.len() < 6 {
        return Err(XlsError::Parse("MULRK/MULBLANK record too short".into()));
    }
    let mut off = 0;
    let row = read_u16(data, &mut off)? as u32;
    let first_col = read_u16(data, &mut off)?;
    let mut tail = data.len() - 2;
    let last_col = read_u16(data, &mut tail)?;
    if last_col < first_col {
        return Err(XlsError::Parse(format!(
            "column run {first_col}..={last_col} is reversed"
        )));
    }
    Ok((row, first_col, last_col, off))
}

/// The 8-byte result of a FORMULA record. Bytes 6-7 set to 0xFFFF mark a
/// non-numeric result whose kind is in byte 0.
fn formula_result(data: &[u8], off: &mut usize) -> XlsResult<FormulaResult> {
    let start = *off;
    let number = read_f64(data, off)?;
    let raw = &data[start..start + 8];
    if raw[6] != 0xFF || raw[7] != 0xFF {
        return Ok(FormulaResult::Value(CellValue::Number(number)));
    }
    Ok(match raw[0] {
        0x00 => FormulaResult::StringFollows,
        0x01 => FormulaResult::Value(CellValue::Boolean(raw[2] != 0)),
        0x02 => FormulaResult::Value(CellValue::Error(error_from_code(raw[2]))),
        0x03 => FormulaResult::Value(CellValue::string("")),
        _ => FormulaResult::Value(CellValue::Empty),
    })
}

fn error_from_code(code: u8) -> CellError {
    match code {
        0x00 => CellError::Null,
        0x07 => CellError::Div0,
        0x17 => CellError::Ref,
        0x1D => CellError::Name,
        0x24 => CellError::Num,
        0x2A => CellError::Na,
        _ => CellError::Value,
    }
}

/// MERGECELLS: count(2) + [first row(2) + last row(2) + first col(2) + last col(2)]*
fn parse_mergecells(data: &[u8], ws: &mut Worksheet) -> XlsResult<()> {
    let mut off = 0;
    let count = read_u16(data, &mut off)?;
    for _ in 0..count {
        let first_row = read_u16(data, &mut off)? as u32;
        let last_row = read_u16(data, &mut off)? as u32;
        let first_col = read_u16(data, &mut off)?;
        let last_col = read_u16(data, &mut off)?;
        let range = CellRange::new(
            CellAddress::new(first_row, first_col),
            CellAddress::new(last_row, last_col),
        );
        if let Err(e) = ws.merge_cells(&range) {
            warn!("ignoring merged region {range}: {e}");
        }
    }
    Ok(())
}

/// ROW: row(2) + first col(2) + last col + 1(2) + height(2) + reserved(4) +
/// options(4), where options 0x20 hides the row and 0x40 marks a custom height
fn parse_row(data: &[u8], ws: &mut Worksheet) -> XlsResult<()> {
    let mut off = 0;
    let row = read_u16(data, &mut off)? as u32;
    off = 6;
    let height = (read_u16(data, &mut off)? & 0x7FFF) as f64 / 20.0;
    off = 12;
    let options = read_u32(data, &mut off)?;

    if options & 0x20 != 0 {
        ws.set_row_hidden(row, true)?;
    }
    if options & 0x40 != 0 && height > 0.0 {
        ws.set_row_height(row, height)?;
    }
    Ok(())
}

/// COLINFO: first col(2) + last col(2) + width in 1/256 characters(2) + ...
fn parse_colinfo(data: &[u8], ws: &mut Worksheet) -> XlsResult<()> {
    let mut off = 0;
    let first_col = read_u16(data, &mut off)?;
    let last_col = read_u16(data, &mut off)?.min(MAX_COLS - 1);
    let width = read_u16(data, &mut off)? as f64 / 256.0;
    if width > 0.0 {
        for col in first_col..=last_col {
            ws.set_column_width(col, width)?;
        }
    }
    Ok(())
}
