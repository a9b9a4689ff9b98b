//! XLSX writer

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;

use log::debug;

use crate::error::{XlsxError, XlsxResult};
use crate::print_titles;
use crate::styles::{escape_xml_attr as escape_xml, to_styles_xml};
use sheetbind_core::{
    CellAddress, CellValue, HyperlinkKind, NameScope, PageOrientation, PageSetup, Workbook,
    Worksheet,
};

const REL_COMMENTS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";
const REL_HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";

/// Relationships of one worksheet part, in rId order
#[derive(Debug, Default)]
struct SheetRels {
    has_comments: bool,
    /// (cell ref, target) of every external hyperlink
    hyperlinks: Vec<(String, String)>,
}

impl SheetRels {
    fn collect(sheet: &Worksheet) -> Self {
        let mut rels = SheetRels::default();
        for (row, col, cell) in sheet.iter_cells() {
            if cell.comment.is_some() {
                rels.has_comments = true;
            }
            if let Some(link) = cell.hyperlink.as_ref().filter(|l| l.is_external()) {
                let cell_ref = CellAddress::new(row, col).to_a1_string();
                rels.hyperlinks.push((cell_ref, link.target.clone()));
            }
        }
        rels
    }

    fn is_empty(&self) -> bool {
        !self.has_comments && self.hyperlinks.is_empty()
    }

    /// rId of the external hyperlink at `cell_ref`
    fn hyperlink_rid(&self, cell_ref: &str) -> Option<String> {
        let offset = usize::from(self.has_comments) + 1;
        self.hyperlinks
            .iter()
            .position(|(r, _)| r == cell_ref)
            .map(|i| format!("rId{}", i + offset))
    }
}

/// XLSX file writer
pub struct XlsxWriter;

impl XlsxWriter {
    /// Write a workbook to a file path
    pub fn write_file<P: AsRef<Path>>(workbook: &Workbook, path: P) -> XlsxResult<()> {
        let file = File::create(path)?;
        Self::write(workbook, file)
    }

    /// Write a workbook to a writer
    pub fn write<W: Write + Seek>(workbook: &Workbook, writer: W) -> XlsxResult<()> {
        let mut zip = zip::ZipWriter::new(writer);

        let sheet_rels: Vec<SheetRels> = workbook.worksheets().map(SheetRels::collect).collect();

        Self::write_content_types(&mut zip, workbook, &sheet_rels)?;
        Self::write_root_rels(&mut zip)?;
        Self::write_workbook_xml(&mut zip, workbook)?;
        Self::write_workbook_rels(&mut zip, workbook)?;
        Self::write_part(&mut zip, "xl/styles.xml", &to_styles_xml(workbook.styles()))?;

        for (i, sheet) in workbook.worksheets().enumerate() {
            let rels = &sheet_rels[i];
            let is_active = i == workbook.active_sheet();
            Self::write_part(
                &mut zip,
                &format!("xl/worksheets/sheet{}.xml", i + 1),
                &Self::worksheet_xml(sheet, rels, is_active),
            )?;

            if !rels.is_empty() {
                Self::write_worksheet_rels(&mut zip, i, rels)?;
            }
            if rels.has_comments {
                Self::write_comments(&mut zip, sheet, i)?;
            }
        }

        zip.finish()?;
        debug!("wrote workbook with {} sheet(s)", workbook.sheet_count());
        Ok(())
    }

    fn write_part<W: Write + Seek>(
        zip: &mut zip::ZipWriter<W>,
        name: &str,
        content: &str,
    ) -> XlsxResult<()> {
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file(name, options)?;
        zip.write_all(content.as_bytes())?;
        Ok(())
    }

    fn write_content_types<W: Write + Seek>(
        zip: &mut zip::ZipWriter<W>,
        workbook: &Workbook,
        sheet_rels: &[SheetRels],
    ) -> XlsxResult<()> {
        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
    <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
        );

        for i in 0..workbook.sheet_count() {
            content.push_str(&format!(
                r#"
    <Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                i + 1
            ));
        }

        for (i, rels) in sheet_rels.iter().enumerate() {
            if rels.has_comments {
                content.push_str(&format!(
                    r#"
    <Override PartName="/xl/comments{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.comments+xml"/>"#,
                    i + 1
                ));
            }
        }

        content.push_str("\n</Types>");
        Self::write_part(zip, "[Content_Types].xml", &content)
    }

    fn write_root_rels<W: Write + Seek>(zip: &mut zip::ZipWriter<W>) -> XlsxResult<()> {
        let content = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;
        Self::write_part(zip, "_rels/.rels", content)
    }

    fn write_workbook_xml<W: Write + Seek>(
        zip: &mut zip::ZipWriter<W>,
        workbook: &Workbook,
    ) -> XlsxResult<()> {
        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
        );
        content.push_str(&format!(
            "\n    <bookViews><workbookView activeTab=\"{}\"/></bookViews>\n    <sheets>",
            workbook.active_sheet()
        ));

        for (i, sheet) in workbook.worksheets().enumerate() {
            let state = if sheet.is_visible() {
                ""
            } else {
                " state=\"hidden\""
            };
            content.push_str(&format!(
                r#"
        <sheet name="{}" sheetId="{}"{} r:id="rId{}"/>"#,
                escape_xml(sheet.name()),
                i + 1,
                state,
                i + 1
            ));
        }
        content.push_str("\n    </sheets>");

        let names = Self::defined_names(workbook);
        if !names.is_empty() {
            content.push_str("\n    <definedNames>");
            for (name, local_sheet_id, hidden, formula) in names {
                content.push_str("\n        <definedName name=\"");
                content.push_str(&escape_xml(&name));
                content.push('"');
                if let Some(id) = local_sheet_id {
                    content.push_str(&format!(" localSheetId=\"{}\"", id));
                }
                if hidden {
                    content.push_str(" hidden=\"1\"");
                }
                content.push('>');
                content.push_str(&escape_xml(&formula));
                content.push_str("</definedName>");
            }
            content.push_str("\n    </definedNames>");
        }

        content.push_str("\n</workbook>");
        Self::write_part(zip, "xl/workbook.xml", &content)
    }

    /// Named ranges plus the generated Print_Titles names, as
    /// (name, localSheetId, hidden, formula)
    fn defined_names(workbook: &Workbook) -> Vec<(String, Option<usize>, bool, String)> {
        let mut names: Vec<_> = workbook
            .named_ranges()
            .iter()
            .map(|n| {
                let local = match n.scope {
                    NameScope::Workbook => None,
                    NameScope::Sheet(idx) => Some(idx),
                };
                (n.name.clone(), local, n.hidden, n.refers_to.clone())
            })
            .collect();

        for (i, sheet) in workbook.worksheets().enumerate() {
            let options = sheet.print_options();
            if let Some(formula) =
                print_titles::format(sheet.name(), options.repeat_rows, options.repeat_cols)
            {
                names.push((print_titles::DEFINED_NAME.to_string(), Some(i), false, formula));
            }
        }
        names
    }

    fn write_workbook_rels<W: Write + Seek>(
        zip: &mut zip::ZipWriter<W>,
        workbook: &Workbook,
    ) -> XlsxResult<()> {
        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );

        for i in 0..workbook.sheet_count() {
            content.push_str(&format!(
                r#"
    <Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                i + 1,
                i + 1
            ));
        }

        content.push_str(&format!(
            r#"
    <Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#,
            workbook.sheet_count() + 1
        ));

        Self::write_part(zip, "xl/_rels/workbook.xml.rels", &content)
    }

    fn worksheet_xml(sheet: &Worksheet, rels: &SheetRels, is_active: bool) -> String {
        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
        );

        let options = sheet.print_options();
        let setup = sheet.page_setup();
        let fit_to_page = setup.fit_width != 1 || setup.fit_height != 1;
        if options.autobreaks || fit_to_page {
            content.push_str(&format!(
                "\n    <sheetPr><pageSetUpPr autoPageBreaks=\"{}\"{}/></sheetPr>",
                u8::from(options.autobreaks),
                if fit_to_page { " fitToPage=\"1\"" } else { "" }
            ));
        }
        if let Some(used) = sheet.used_range() {
            content.push_str(&format!("\n    <dimension ref=\"{}\"/>", used));
        }
        if is_active {
            content.push_str("\n    <sheetViews><sheetView tabSelected=\"1\" workbookViewId=\"0\"/></sheetViews>");
        }

        Self::write_cols(&mut content, sheet);
        Self::write_sheet_data(&mut content, sheet);

        let merged_regions = sheet.merged_regions();
        if !merged_regions.is_empty() {
            content.push_str(&format!(
                "\n    <mergeCells count=\"{}\">",
                merged_regions.len()
            ));
            for range in merged_regions {
                content.push_str(&format!("\n        <mergeCell ref=\"{}\"/>", range));
            }
            content.push_str("\n    </mergeCells>");
        }

        Self::write_hyperlinks(&mut content, sheet, rels);
        Self::write_print_settings(&mut content, sheet);

        content.push_str("\n</worksheet>");
        content
    }

    /// `<cols>`, merging runs of equal widths
    fn write_cols(content: &mut String, sheet: &Worksheet) {
        let widths = sheet.column_widths();
        if widths.is_empty() {
            return;
        }

        let mut runs: Vec<(u16, u16, f64)> = Vec::new();
        for (&col, &width) in widths {
            match runs.last_mut() {
                Some((_, last, w)) if *last + 1 == col && *w == width => *last = col,
                _ => runs.push((col, col, width)),
            }
        }

        content.push_str("\n    <cols>");
        for (first, last, width) in runs {
            content.push_str(&format!(
                "\n        <col min=\"{}\" max=\"{}\" width=\"{}\" customWidth=\"1\"/>",
                first + 1,
                last + 1,
                width
            ));
        }
        content.push_str("\n    </cols>");
    }

    fn write_sheet_data(content: &mut String, sheet: &Worksheet) {
        content.push_str("\n    <sheetData>");

        for row in sheet.rows() {
            if row.is_empty() && !row.has_custom_settings() {
                continue;
            }

            content.push_str(&format!("\n        <row r=\"{}\"", row.index + 1));
            if let Some(h) = row.height {
                content.push_str(&format!(" ht=\"{}\" customHeight=\"1\"", h));
            }
            if row.hidden {
                content.push_str(" hidden=\"1\"");
            }
            if row.is_empty() {
                content.push_str("/>");
                continue;
            }
            content.push('>');

            for (&col, cell) in &row.cells {
                let cell_ref = CellAddress::new(row.index, col).to_a1_string();
                let style_attr = match cell.style {
                    Some(id) if id.0 != 0 => format!(" s=\"{}\"", id.0),
                    _ => String::new(),
                };
                content.push_str("\n            ");
                content.push_str(&Self::cell_xml(&cell_ref, &style_attr, &cell.value));
            }

            content.push_str("\n        </row>");
        }

        content.push_str("\n    </sheetData>");
    }

    fn cell_xml(cell_ref: &str, style_attr: &str, value: &CellValue) -> String {
        match value {
            CellValue::Number(n) => {
                format!("<c r=\"{}\"{}><v>{}</v></c>", cell_ref, style_attr, n)
            }
            CellValue::String(s) => format!(
                "<c r=\"{}\"{} t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
                cell_ref,
                style_attr,
                escape_xml(s.as_str())
            ),
            CellValue::Boolean(b) => format!(
                "<c r=\"{}\"{} t=\"b\"><v>{}</v></c>",
                cell_ref,
                style_attr,
                u8::from(*b)
            ),
            CellValue::Error(e) => format!(
                "<c r=\"{}\"{} t=\"e\"><v>{}</v></c>",
                cell_ref,
                style_attr,
                escape_xml(e.as_str())
            ),
            CellValue::Formula { text, cached_value } => {
                let formula_text = text.strip_prefix('=').unwrap_or(text);
                let (type_attr, cached) = match cached_value.as_deref() {
                    Some(CellValue::Number(n)) => ("", format!("<v>{}</v>", n)),
                    Some(CellValue::String(s)) => {
                        (" t=\"str\"", format!("<v>{}</v>", escape_xml(s.as_str())))
                    }
                    Some(CellValue::Boolean(b)) => (" t=\"b\"", format!("<v>{}</v>", u8::from(*b))),
                    Some(CellValue::Error(e)) => {
                        (" t=\"e\"", format!("<v>{}</v>", escape_xml(e.as_str())))
                    }
                    _ => ("", String::new()),
                };
                format!(
                    "<c r=\"{}\"{}{}><f>{}</f>{}</c>",
                    cell_ref,
                    style_attr,
                    type_attr,
                    escape_xml(formula_text),
                    cached
                )
            }
            // Keep empty cells so that styled blanks and named template cells survive
            CellValue::Empty => format!("<c r=\"{}\"{}/>", cell_ref, style_attr),
        }
    }

    fn write_hyperlinks(content: &mut String, sheet: &Worksheet, rels: &SheetRels) {
        let links: Vec<_> = sheet
            .iter_cells()
            .filter_map(|(row, col, cell)| {
                cell.hyperlink
                    .as_ref()
                    .map(|link| (CellAddress::new(row, col).to_a1_string(), link))
            })
            .collect();
        if links.is_empty() {
            return;
        }

        content.push_str("\n    <hyperlinks>");
        for (cell_ref, link) in links {
            content.push_str(&format!("\n        <hyperlink ref=\"{}\"", cell_ref));
            if link.kind == HyperlinkKind::Document {
                content.push_str(&format!(" location=\"{}\"", escape_xml(&link.target)));
            } else if let Some(rid) = rels.hyperlink_rid(&cell_ref) {
                content.push_str(&format!(" r:id=\"{}\"", rid));
            }
            if let Some(display) = &link.display {
                content.push_str(&format!(" display=\"{}\"", escape_xml(display)));
            }
            if let Some(tooltip) = &link.tooltip {
                content.push_str(&format!(" tooltip=\"{}\"", escape_xml(tooltip)));
            }
            content.push_str("/>");
        }
        content.push_str("\n    </hyperlinks>");
    }

    /// printOptions, pageMargins, pageSetup and headerFooter, in schema order
    fn write_print_settings(content: &mut String, sheet: &Worksheet) {
        let options = sheet.print_options();
        if options.horizontal_centered || options.vertical_centered {
            content.push_str("\n    <printOptions");
            if options.horizontal_centered {
                content.push_str(" horizontalCentered=\"1\"");
            }
            if options.vertical_centered {
                content.push_str(" verticalCentered=\"1\"");
            }
            content.push_str("/>");
        }

        let m = sheet.margins();
        content.push_str(&format!(
            "\n    <pageMargins left=\"{}\" right=\"{}\" top=\"{}\" bottom=\"{}\" header=\"{}\" footer=\"{}\"/>",
            m.left, m.right, m.top, m.bottom, m.header, m.footer
        ));

        let setup = sheet.page_setup();
        if !setup.is_default() {
            content.push_str(&Self::page_setup_xml(setup));
        }

        let hf = sheet.header_footer();
        if !hf.is_empty() {
            content.push_str("\n    <headerFooter>");
            let header = hf.header_text();
            if !header.is_empty() {
                content.push_str(&format!("<oddHeader>{}</oddHeader>", escape_xml(&header)));
            }
            let footer = hf.footer_text();
            if !footer.is_empty() {
                content.push_str(&format!("<oddFooter>{}</oddFooter>", escape_xml(&footer)));
            }
            content.push_str("</headerFooter>");
        }
    }

    fn page_setup_xml(setup: &PageSetup) -> String {
        let mut s = format!(
            "\n    <pageSetup paperSize=\"{}\" scale=\"{}\" fitToWidth=\"{}\" fitToHeight=\"{}\"",
            setup.paper_size, setup.scale, setup.fit_width, setup.fit_height
        );
        if setup.orientation != PageOrientation::Default {
            s.push_str(&format!(" orientation=\"{}\"", setup.orientation.as_str()));
        }
        if setup.left_to_right {
            s.push_str(" pageOrder=\"overThenDown\"");
        }
        if setup.copies != 1 {
            s.push_str(&format!(" copies=\"{}\"", setup.copies));
        }
        if setup.draft {
            s.push_str(" draft=\"1\"");
        }
        if setup.black_and_white {
            s.push_str(" blackAndWhite=\"1\"");
        }
        if setup.notes {
            s.push_str(" cellComments=\"atEnd\"");
        }
        if setup.use_first_page_number {
            s.push_str(&format!(
                " firstPageNumber=\"{}\" useFirstPageNumber=\"1\"",
                setup.first_page_number
            ));
        }
        if let Some(dpi) = setup.horizontal_dpi {
            s.push_str(&format!(" horizontalDpi=\"{}\"", dpi));
        }
        if let Some(dpi) = setup.vertical_dpi {
            s.push_str(&format!(" verticalDpi=\"{}\"", dpi));
        }
        s.push_str("/>");
        s
    }

    /// Write the relationships of a worksheet: comments first, then external links
    fn write_worksheet_rels<W: Write + Seek>(
        zip: &mut zip::ZipWriter<W>,
        sheet_index: usize,
        rels: &SheetRels,
    ) -> XlsxResult<()> {
        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );

        let mut next_id = 1;
        if rels.has_comments {
            content.push_str(&format!(
                "\n    <Relationship Id=\"rId{}\" Type=\"{}\" Target=\"../comments{}.xml\"/>",
                next_id,
                REL_COMMENTS,
                sheet_index + 1
            ));
            next_id += 1;
        }
        for (_, target) in &rels.hyperlinks {
            content.push_str(&format!(
                "\n    <Relationship Id=\"rId{}\" Type=\"{}\" Target=\"{}\" TargetMode=\"External\"/>",
                next_id,
                REL_HYPERLINK,
                escape_xml(target)
            ));
            next_id += 1;
        }
        content.push_str("\n</Relationships>");

        Self::write_part(
            zip,
            &format!("xl/worksheets/_rels/sheet{}.xml.rels", sheet_index + 1),
            &content,
        )
    }

    /// Write comments file for a worksheet
    fn write_comments<W: Write + Seek>(
        zip: &mut zip::ZipWriter<W>,
        sheet: &Worksheet,
        sheet_index: usize,
    ) -> XlsxResult<()> {
        let authors = sheet.comment_authors();
        let author_index: BTreeMap<&str, usize> =
            authors.iter().enumerate().map(|(i, a)| (*a, i)).collect();

        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<comments xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
    <authors>"#,
        );
        for author in &authors {
            content.push_str(&format!("\n        <author>{}</author>", escape_xml(author)));
        }
        content.push_str("\n    </authors>\n    <commentList>");

        for (row, col, cell) in sheet.iter_cells() {
            let comment = match &cell.comment {
                Some(c) => c,
                None => continue,
            };
            let author_id = author_index
                .get(comment.author.as_str())
                .copied()
                .ok_or_else(|| XlsxError::InvalidFormat("comment author not collected".into()))?;

            content.push_str(&format!(
                "\n        <comment ref=\"{}\" authorId=\"{}\"><text><r><t xml:space=\"preserve\">{}</t></r></text></comment>",
                CellAddress::new(row, col).to_a1_string(),
                author_id,
                escape_xml(&comment.text)
            ));
        }

        content.push_str("\n    </commentList>\n</comments>");
        Self::write_part(zip, &format!("xl/comments{}.xml", sheet_index + 1), &content)
    }
}
