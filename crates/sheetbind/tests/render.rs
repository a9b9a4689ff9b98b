//! Render pipeline: load template bytes, fill, encode

use pretty_assertions::assert_eq;
use sheetbind::prelude::*;
use sheetbind::{CodecRegistry, DocumentCodec, Rendered, XlsxCodec};
use std::io::{Cursor, Write};

/// Invoice template bytes with a one-row block "row" on A2:B2
fn invoice_template() -> Vec<u8> {
    let mut wb = Workbook::new();
    wb.define_name("row", "Sheet1!$A$2:$B$2").unwrap();
    wb.define_name("item", "Sheet1!$A$2").unwrap();
    wb.define_name("amount", "Sheet1!$B$2").unwrap();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", "Item").unwrap();
    sheet.set_cell_value("B1", "Amount").unwrap();
    sheet.set_cell_value("A3", "Total").unwrap();

    let mut buf = Vec::new();
    XlsxWriter::write(&wb, Cursor::new(&mut buf)).unwrap();
    buf
}

fn fill_lines(workbook: &mut Workbook) -> Result<()> {
    let lines = [("Consulting", 1200.0), ("Travel", 310.5)];
    bind_vertical_insert(workbook, 0, "row", 0, &lines, |mut range, (item, amount)| {
        range.set_value("item", *item)?;
        range.set_value("amount", *amount)
    })
}

fn read(rendered: &Rendered) -> Workbook {
    XlsxReader::read(Cursor::new(&rendered.bytes)).unwrap()
}

#[test]
fn test_render_from_memory() {
    let source = MemorySource::new().with_template("invoice.xlsx", invoice_template());
    let renderer = Renderer::new(source);

    let rendered = renderer
        .render("invoice.xlsx", "invoice-0042.xlsx", fill_lines)
        .unwrap();

    assert_eq!(
        rendered.media_type,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    assert_eq!(rendered.filename, "invoice-0042.xlsx");
    assert_eq!(
        rendered.content_disposition(),
        "attachment; filename=\"invoice-0042.xlsx\""
    );

    let wb = read(&rendered);
    let sheet = wb.worksheet(0).unwrap();
    assert_eq!(sheet.get_value("A2").unwrap().as_string(), Some("Consulting"));
    assert_eq!(sheet.get_value("A3").unwrap().as_string(), Some("Travel"));
    assert_eq!(sheet.get_value("B3").unwrap().as_number(), Some(310.5));
    assert_eq!(sheet.get_value("A4").unwrap().as_string(), Some("Total"));
}

#[test]
fn test_render_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("billing")).unwrap();
    std::fs::write(dir.path().join("billing/Invoice.XLSX"), invoice_template()).unwrap();

    let renderer = Renderer::new(DirectorySource::new(dir.path()));
    let mut sink = Vec::new();
    let rendered = renderer
        .render_to("billing/Invoice.XLSX", "out.xlsx", fill_lines, &mut sink)
        .unwrap();

    assert_eq!(sink, rendered.bytes);
    let wb = read(&rendered);
    assert_eq!(
        wb.worksheet(0).unwrap().get_value("A2").unwrap().as_string(),
        Some("Consulting")
    );
}

#[test]
fn test_nothing_written_when_fill_fails() {
    let source = MemorySource::new().with_template("invoice.xlsx", invoice_template());
    let renderer = Renderer::new(source);

    let mut sink = Vec::new();
    let err = renderer
        .render_to(
            "invoice.xlsx",
            "out.xlsx",
            |wb| {
                bind_vertical_insert(wb, 0, "row", 0, &["a", "b"], |mut range, v| {
                    range.set_value("no such cell name", *v)
                })
            },
            &mut sink,
        )
        .unwrap_err();

    assert!(matches!(err, Error::UnresolvedName(_)));
    assert!(sink.is_empty());
}

#[test]
fn test_unknown_template() {
    let renderer = Renderer::new(MemorySource::new());
    let err = renderer
        .render("missing.xlsx", "out.xlsx", |_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, Error::ResourceLoad { ref id, .. } if id == "missing.xlsx"));
}

#[test]
fn test_corrupt_template_is_codec_error() {
    let source = MemorySource::new().with_template("broken.xlsx", b"not a zip".to_vec());
    let err = Renderer::new(source)
        .render("broken.xlsx", "out.xlsx", |_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, Error::Codec(_)));
}

#[test]
fn test_unregistered_format_fails_before_loading() {
    // the source has nothing: the format check must fail first
    let mut codecs = CodecRegistry::empty();
    codecs.register(TemplateFormat::Xlsx, XlsxCodec);
    let renderer = Renderer::new(MemorySource::new()).with_registry(codecs);
    let err = renderer
        .render("legacy.xls", "out.xls", |_| unreachable!("no codec"))
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(_)));

    let err = renderer
        .render("notes.txt", "out.txt", |_| unreachable!("no format"))
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(_)));
}

fn biff(out: &mut Vec<u8>, record_type: u16, body: &[u8]) {
    out.extend_from_slice(&record_type.to_le_bytes());
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(body);
}

fn words(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn label(row: u16, col: u16, text: &str) -> Vec<u8> {
    let mut body = words(&[row, col, 0, text.len() as u16]);
    body.push(0);
    body.extend_from_slice(text.as_bytes());
    body
}

fn area_name(name: &str, first_row: u16, last_row: u16, first_col: u16, last_col: u16) -> Vec<u8> {
    let mut body = words(&[0]);
    body.push(0);
    body.push(name.len() as u8);
    body.extend(words(&[11, 0, 0]));
    body.extend_from_slice(&[0, 0, 0, 0, 0]);
    body.extend_from_slice(name.as_bytes());
    body.push(0x3B);
    body.extend(words(&[0, first_row, last_row, first_col, last_col]));
    body
}

/// The invoice template as a BIFF8 workbook in a compound file
fn legacy_invoice_template() -> Vec<u8> {
    let bof = |dt: u16| {
        let mut body = words(&[0x0600, dt]);
        body.extend_from_slice(&[0; 12]);
        body
    };
    let mut stream = Vec::new();
    biff(&mut stream, 0x0809, &bof(0x0005));
    let mut sheet = vec![0, 0, 0, 0, 0, 0, 6, 0];
    sheet.extend_from_slice(b"Sheet1");
    biff(&mut stream, 0x0085, &sheet);
    biff(&mut stream, 0x0017, &words(&[1, 0, 0, 0]));
    biff(&mut stream, 0x0018, &area_name("row", 1, 1, 0, 1));
    biff(&mut stream, 0x0018, &area_name("item", 1, 1, 0, 0));
    biff(&mut stream, 0x0018, &area_name("amount", 1, 1, 1, 1));
    biff(&mut stream, 0x000A, &[]);
    biff(&mut stream, 0x0809, &bof(0x0010));
    biff(&mut stream, 0x0204, &label(0, 0, "Item"));
    biff(&mut stream, 0x0204, &label(0, 1, "Amount"));
    biff(&mut stream, 0x0204, &label(2, 0, "Total"));
    biff(&mut stream, 0x000A, &[]);

    let mut container = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
    {
        let mut workbook = container.create_stream("/Workbook").unwrap();
        workbook.write_all(&stream).unwrap();
    }
    container.flush().unwrap();
    container.into_inner().into_inner()
}

#[test]
fn test_render_xls_template_as_xlsx() {
    let source = MemorySource::new().with_template("invoice.xls", legacy_invoice_template());
    let rendered = Renderer::new(source)
        .render("invoice.xls", "invoice-0042.xls", fill_lines)
        .unwrap();

    assert_eq!(
        rendered.media_type,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    assert_eq!(rendered.filename, "invoice-0042.xlsx");

    let wb = read(&rendered);
    let sheet = wb.worksheet(0).unwrap();
    assert_eq!(sheet.get_value("A1").unwrap().as_string(), Some("Item"));
    assert_eq!(sheet.get_value("A2").unwrap().as_string(), Some("Consulting"));
    assert_eq!(sheet.get_value("B3").unwrap().as_number(), Some(310.5));
    assert_eq!(sheet.get_value("A4").unwrap().as_string(), Some("Total"));
}

#[test]
fn test_corrupt_xls_template_is_codec_error() {
    let source = MemorySource::new().with_template("broken.xls", b"not a compound file".to_vec());
    let err = Renderer::new(source)
        .render("broken.xls", "out.xls", |_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, Error::Codec(_)));
}

/// A codec that reads every document as an empty workbook
struct BlankCodec;

impl DocumentCodec for BlankCodec {
    fn read(&self, _bytes: &[u8]) -> Result<Workbook> {
        Ok(Workbook::new())
    }

    fn write(&self, workbook: &Workbook, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(format!("{} sheet(s)", workbook.sheet_count()).as_bytes());
        Ok(())
    }
}

#[test]
fn test_custom_codec() {
    let source = MemorySource::new().with_template("legacy.xls", Vec::new());
    let renderer = Renderer::new(source).with_codec(TemplateFormat::Xls, BlankCodec);

    let rendered = renderer
        .render("legacy.xls", "legacy-out.xls", |wb| {
            wb.add_worksheet_with_name("Extra").map(|_| ())
        })
        .unwrap();
    assert_eq!(rendered.bytes, b"2 sheet(s)".to_vec());
    assert_eq!(rendered.media_type, "application/vnd.ms-excel");

    let renderer = Renderer::new(MemorySource::new()).with_registry(CodecRegistry::empty());
    assert!(matches!(
        renderer.render("a.xlsx", "b.xlsx", |_| Ok(())),
        Err(Error::UnsupportedFormat(_))
    ));
}
