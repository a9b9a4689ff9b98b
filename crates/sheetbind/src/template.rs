//! Template loading and rendering
//!
//! A [`Renderer`] turns a template identifier into a filled document:
//! pick the format from the identifier, load the bytes from a
//! [`TemplateSource`], decode them with the registered [`DocumentCodec`], run
//! the fill callback, and encode the result into a buffer.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Cursor, Write};
use std::path::{Component, Path, PathBuf};

use log::debug;
use sheetbind_core::{Error, Result, Workbook};
use sheetbind_xls::XlsReader;
use sheetbind_xlsx::{XlsxReader, XlsxWriter};

/// Document dialect of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateFormat {
    /// Office Open XML workbook
    Xlsx,
    /// Legacy binary workbook
    Xls,
}

impl TemplateFormat {
    /// Pick the format from the identifier's suffix, ignoring case
    pub fn from_identifier(id: &str) -> Result<Self> {
        let lower = id.to_ascii_lowercase();
        if lower.ends_with("xlsx") {
            Ok(TemplateFormat::Xlsx)
        } else if lower.ends_with("xls") {
            Ok(TemplateFormat::Xls)
        } else {
            Err(Error::UnsupportedFormat(id.to_string()))
        }
    }

    /// MIME type of documents in this format
    pub fn media_type(&self) -> &'static str {
        match self {
            TemplateFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            TemplateFormat::Xls => "application/vnd.ms-excel",
        }
    }

    /// Usual file extension
    pub fn extension(&self) -> &'static str {
        match self {
            TemplateFormat::Xlsx => "xlsx",
            TemplateFormat::Xls => "xls",
        }
    }
}

impl fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Where template bytes come from
pub trait TemplateSource {
    /// Load the template called `id`
    fn open(&self, id: &str) -> Result<Vec<u8>>;
}

/// Templates stored as files under a root directory
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Directory templates are looked up in
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, id: &str) -> Result<PathBuf> {
        let relative = Path::new(id);
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            return Err(Error::resource_load(
                id,
                io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "template path leaves the template directory",
                ),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl TemplateSource for DirectorySource {
    fn open(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.resolve(id)?;
        fs::read(&path).map_err(|e| Error::resource_load(id, e))
    }
}

/// Templates held in memory, keyed by identifier
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    templates: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a template
    pub fn insert<S: Into<String>>(&mut self, id: S, bytes: Vec<u8>) {
        self.templates.insert(id.into(), bytes);
    }

    /// Builder form of [`MemorySource::insert`]
    pub fn with_template<S: Into<String>>(mut self, id: S, bytes: Vec<u8>) -> Self {
        self.insert(id, bytes);
        self
    }
}

impl TemplateSource for MemorySource {
    fn open(&self, id: &str) -> Result<Vec<u8>> {
        self.templates.get(id).cloned().ok_or_else(|| {
            Error::resource_load(
                id,
                io::Error::new(io::ErrorKind::NotFound, "no such template"),
            )
        })
    }
}

/// Reads and writes documents of one format
pub trait DocumentCodec {
    /// Decode a document
    fn read(&self, bytes: &[u8]) -> Result<Workbook>;

    /// Encode `workbook` into `out`, replacing whatever `out` held
    fn write(&self, workbook: &Workbook, out: &mut Vec<u8>) -> Result<()>;

    /// Format `write` produces for a document read as `input`
    fn output_format(&self, input: TemplateFormat) -> TemplateFormat {
        input
    }
}

/// Codec for `.xlsx` documents
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxCodec;

impl DocumentCodec for XlsxCodec {
    fn read(&self, bytes: &[u8]) -> Result<Workbook> {
        Ok(XlsxReader::read(Cursor::new(bytes))?)
    }

    fn write(&self, workbook: &Workbook, out: &mut Vec<u8>) -> Result<()> {
        out.clear();
        Ok(XlsxWriter::write(workbook, Cursor::new(out))?)
    }
}

/// Codec for legacy `.xls` templates
///
/// BIFF8 is read only; the filled workbook is encoded as xlsx.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsCodec;

impl DocumentCodec for XlsCodec {
    fn read(&self, bytes: &[u8]) -> Result<Workbook> {
        Ok(XlsReader::read(Cursor::new(bytes))?)
    }

    fn write(&self, workbook: &Workbook, out: &mut Vec<u8>) -> Result<()> {
        XlsxCodec.write(workbook, out)
    }

    fn output_format(&self, _input: TemplateFormat) -> TemplateFormat {
        TemplateFormat::Xlsx
    }
}

/// Codecs by format
pub struct CodecRegistry {
    codecs: HashMap<TemplateFormat, Box<dyn DocumentCodec>>,
}

impl CodecRegistry {
    /// A registry with no codec at all
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Register (or replace) the codec for `format`
    pub fn register<C: DocumentCodec + 'static>(&mut self, format: TemplateFormat, codec: C) {
        self.codecs.insert(format, Box::new(codec));
    }

    /// The codec for `format`, or `UnsupportedFormat` when none is registered
    pub fn get(&self, format: TemplateFormat) -> Result<&dyn DocumentCodec> {
        self.codecs
            .get(&format)
            .map(|c| c.as_ref())
            .ok_or_else(|| Error::UnsupportedFormat(format!("no codec for {} documents", format)))
    }

    /// Check if a codec is registered for `format`
    pub fn supports(&self, format: TemplateFormat) -> bool {
        self.codecs.contains_key(&format)
    }
}

impl Default for CodecRegistry {
    /// Registry with the xlsx and xls codecs
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(TemplateFormat::Xlsx, XlsxCodec);
        registry.register(TemplateFormat::Xls, XlsCodec);
        registry
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.codecs.keys()).finish()
    }
}

/// A rendered document
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    /// Encoded document
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`
    pub media_type: &'static str,
    /// Suggested file name
    pub filename: String,
}

impl Rendered {
    /// `Content-Disposition` value offering the document as a download
    pub fn content_disposition(&self) -> String {
        let name = self.filename.replace('\\', "\\\\").replace('"', "\\\"");
        format!("attachment; filename=\"{}\"", name)
    }
}

/// Loads, fills and encodes templates
#[derive(Debug)]
pub struct Renderer<S> {
    source: S,
    codecs: CodecRegistry,
}

impl<S: TemplateSource> Renderer<S> {
    /// Renderer over `source` with the default codecs
    pub fn new(source: S) -> Self {
        Self {
            source,
            codecs: CodecRegistry::default(),
        }
    }

    /// Register an additional codec
    pub fn with_codec<C: DocumentCodec + 'static>(mut self, format: TemplateFormat, codec: C) -> Self {
        self.codecs.register(format, codec);
        self
    }

    /// Replace the codec registry
    pub fn with_registry(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = codecs;
        self
    }

    /// The template source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Render `template_id`, filled by `fill`, as a document named `output_name`
    ///
    /// The format and codec are checked before anything is loaded. Any
    /// failure aborts the whole pass. When the codec writes another format
    /// than it reads, the media type follows the written format and an
    /// `output_name` ending in the template's extension gets the written one.
    pub fn render<F>(&self, template_id: &str, output_name: &str, fill: F) -> Result<Rendered>
    where
        F: FnOnce(&mut Workbook) -> Result<()>,
    {
        let format = TemplateFormat::from_identifier(template_id)?;
        let codec = self.codecs.get(format)?;

        let bytes = self.source.open(template_id)?;
        let mut workbook = codec.read(&bytes)?;
        fill(&mut workbook)?;

        let mut out = Vec::new();
        codec.write(&workbook, &mut out)?;
        debug!(
            "rendered '{}' as '{}' ({} bytes)",
            template_id,
            output_name,
            out.len()
        );

        let written = codec.output_format(format);
        Ok(Rendered {
            bytes: out,
            media_type: written.media_type(),
            filename: output_filename(output_name, format, written),
        })
    }

    /// Render and write the document to `sink`
    ///
    /// Nothing is written unless rendering succeeded.
    pub fn render_to<F, W>(
        &self,
        template_id: &str,
        output_name: &str,
        fill: F,
        sink: &mut W,
    ) -> Result<Rendered>
    where
        F: FnOnce(&mut Workbook) -> Result<()>,
        W: Write + ?Sized,
    {
        let rendered = self.render(template_id, output_name, fill)?;
        sink.write_all(&rendered.bytes).map_err(Error::codec)?;
        sink.flush().map_err(Error::codec)?;
        Ok(rendered)
    }
}

/// Swap a trailing `.<read>` extension for `.<written>`.
fn output_filename(name: &str, read: TemplateFormat, written: TemplateFormat) -> String {
    if read == written {
        return name.to_string();
    }
    let suffix = format!(".{}", read.extension());
    let split = name.len().saturating_sub(suffix.len());
    match name.get(split..) {
        Some(tail) if tail.eq_ignore_ascii_case(&suffix) => {
            format!("{}.{}", &name[..split], written.extension())
        }
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_from_identifier() {
        assert_eq!(
            TemplateFormat::from_identifier("report.xlsx").unwrap(),
            TemplateFormat::Xlsx
        );
        assert_eq!(
            TemplateFormat::from_identifier("REPORT.XLSX").unwrap(),
            TemplateFormat::Xlsx
        );
        assert_eq!(
            TemplateFormat::from_identifier("legacy.xls").unwrap(),
            TemplateFormat::Xls
        );
        assert!(matches!(
            TemplateFormat::from_identifier("report.csv"),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_media_types() {
        assert_eq!(
            TemplateFormat::Xlsx.media_type(),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        assert_eq!(TemplateFormat::Xls.media_type(), "application/vnd.ms-excel");
    }

    #[test]
    fn test_directory_source_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.xlsx"), b"bytes").unwrap();
        let source = DirectorySource::new(dir.path());

        assert_eq!(source.open("a.xlsx").unwrap(), b"bytes".to_vec());
        assert!(matches!(
            source.open("../a.xlsx"),
            Err(Error::ResourceLoad { .. })
        ));
        assert!(matches!(
            source.open("missing.xlsx"),
            Err(Error::ResourceLoad { .. })
        ));
    }

    #[test]
    fn test_default_registry_reads_both_formats() {
        let registry = CodecRegistry::default();
        assert!(registry.supports(TemplateFormat::Xlsx));
        assert!(registry.supports(TemplateFormat::Xls));

        let xls = registry.get(TemplateFormat::Xls).unwrap();
        assert_eq!(xls.output_format(TemplateFormat::Xls), TemplateFormat::Xlsx);
        assert!(matches!(xls.read(b"not a workbook"), Err(Error::Codec(_))));

        assert!(matches!(
            CodecRegistry::empty().get(TemplateFormat::Xls),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_output_filename_follows_written_format() {
        use TemplateFormat::{Xls, Xlsx};
        assert_eq!(output_filename("quote.xls", Xls, Xlsx), "quote.xlsx");
        assert_eq!(output_filename("QUOTE.XLS", Xls, Xlsx), "QUOTE.xlsx");
        assert_eq!(output_filename("quote", Xls, Xlsx), "quote");
        assert_eq!(output_filename("quote.xls", Xls, Xls), "quote.xls");
        assert_eq!(output_filename("quote.xlsx", Xlsx, Xlsx), "quote.xlsx");
    }

    #[test]
    fn test_codec_write_replaces_buffer() {
        let mut fresh = Vec::new();
        XlsxCodec.write(&Workbook::new(), &mut fresh).unwrap();

        let mut reused = vec![0xAB; fresh.len() * 2];
        XlsxCodec.write(&Workbook::new(), &mut reused).unwrap();
        assert_eq!(reused.len(), fresh.len());
        assert_eq!(XlsxCodec.read(&reused).unwrap().sheet_count(), 1);
    }

    #[test]
    fn test_content_disposition() {
        let rendered = Rendered {
            bytes: Vec::new(),
            media_type: TemplateFormat::Xlsx.media_type(),
            filename: "q1 \"final\".xlsx".into(),
        };
        assert_eq!(
            rendered.content_disposition(),
            "attachment; filename=\"q1 \\\"final\\\".xlsx\""
        );
    }
}
