//! JSON job files
//!
//! A job names a template, an output file and a list of bindings. Each
//! binding replicates one named block (or one sheet) per record and writes
//! the record's fields into the cells named after its keys.

use serde::Deserialize;
use serde_json::{Map, Value};
use sheetbind::prelude::*;

/// A JSON record: cell name to value
pub type Record = Map<String, Value>;

#[derive(Debug, Deserialize)]
pub struct Job {
    /// Template identifier, relative to the template directory
    pub template: String,
    /// Output file name
    pub output: String,
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    Vertical,
    VerticalInsert,
    Horizontal,
    Sheets,
}

#[derive(Debug, Deserialize)]
pub struct Binding {
    #[serde(default)]
    pub sheet: usize,
    pub kind: BindingKind,
    /// Block name, required by every kind but `sheets`
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub offset: i64,
    /// Record field holding the name of each cloned sheet
    #[serde(default)]
    pub sheet_name_field: Option<String>,
    #[serde(default)]
    pub records: Vec<Record>,
}

impl Job {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Run every binding against `workbook`, in order
    pub fn fill(&self, workbook: &mut Workbook) -> Result<()> {
        for (i, binding) in self.bindings.iter().enumerate() {
            log::debug!(
                "binding #{}: {:?} with {} record(s)",
                i,
                binding.kind,
                binding.records.len()
            );
            binding.apply(workbook, i)?;
        }
        Ok(())
    }
}

impl Binding {
    fn apply(&self, workbook: &mut Workbook, position: usize) -> Result<()> {
        match self.kind {
            BindingKind::Vertical => bind_vertical(
                workbook,
                self.sheet,
                self.block(position)?,
                self.offset,
                &self.records,
                false,
                fill_range,
            ),
            BindingKind::VerticalInsert => bind_vertical_insert(
                workbook,
                self.sheet,
                self.block(position)?,
                self.offset,
                &self.records,
                fill_range,
            ),
            BindingKind::Horizontal => bind_horizontal(
                workbook,
                self.sheet,
                self.block(position)?,
                self.offset,
                &self.records,
                fill_range,
            ),
            BindingKind::Sheets => {
                let field = self.sheet_name_field.as_deref();
                bind_sheets(workbook, self.sheet, &self.records, |sheet, record| {
                    fill_sheet(sheet, record, field)
                })
            }
        }
    }

    /// Block name of a range binding
    fn block(&self, position: usize) -> Result<&str> {
        self.range
            .as_deref()
            .ok_or_else(|| Error::fill(format!("binding #{} has no range", position)))
    }
}

fn fill_range(mut range: RangeMut<'_>, record: &Record) -> Result<()> {
    for (name, value) in record {
        range.set_value(name, cell_value(name, value)?)?;
    }
    Ok(())
}

fn fill_sheet(mut sheet: SheetMut<'_>, record: &Record, name_field: Option<&str>) -> Result<()> {
    for (name, value) in record {
        if Some(name.as_str()) == name_field {
            let title = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            sheet.rename_sanitized(&title)?;
        } else {
            sheet.set_value(name, cell_value(name, value)?)?;
        }
    }
    Ok(())
}

/// Map a JSON value onto a cell value, keeping its JSON type
pub fn cell_value(name: &str, value: &Value) -> Result<CellValue> {
    match value {
        Value::Null => Ok(CellValue::Empty),
        Value::Bool(b) => Ok(CellValue::Boolean(*b)),
        Value::Number(n) => n
            .as_f64()
            .map(CellValue::Number)
            .ok_or_else(|| Error::fill(format!("'{}': number out of range", name))),
        Value::String(s) => Ok(CellValue::string(s.as_str())),
        Value::Array(_) | Value::Object(_) => Err(Error::fill(format!(
            "'{}': nested values cannot be written to a cell",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn template() -> Workbook {
        let mut wb = Workbook::new();
        wb.define_name("row", "Sheet1!$A$2:$C$2").unwrap();
        wb.define_name("itemRef", "Sheet1!$A$2").unwrap();
        wb.define_name("desc", "Sheet1!$B$2").unwrap();
        wb.define_name("quantity", "Sheet1!$C$2").unwrap();
        wb.worksheet_mut(0)
            .unwrap()
            .set_cell_value("A3", "Total")
            .unwrap();
        wb
    }

    #[test]
    fn test_parse_job() {
        let job = Job::from_json(
            r#"{
                "template": "invoice.xlsx",
                "output": "out.xlsx",
                "bindings": [
                    { "kind": "vertical_insert", "range": "row",
                      "records": [ { "desc": "Fan" } ] },
                    { "sheet": 1, "kind": "sheets", "sheet_name_field": "name" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(job.template, "invoice.xlsx");
        assert_eq!(job.bindings.len(), 2);
        assert_eq!(job.bindings[0].kind, BindingKind::VerticalInsert);
        assert_eq!(job.bindings[0].sheet, 0);
        assert_eq!(job.bindings[1].sheet_name_field.as_deref(), Some("name"));
        assert!(job.bindings[1].records.is_empty());
    }

    #[test]
    fn test_cell_values_keep_json_type() {
        assert_eq!(cell_value("a", &json!("x")).unwrap(), CellValue::string("x"));
        assert_eq!(cell_value("a", &json!(3)).unwrap(), CellValue::Number(3.0));
        assert_eq!(cell_value("a", &json!(true)).unwrap(), CellValue::Boolean(true));
        assert_eq!(cell_value("a", &json!(null)).unwrap(), CellValue::Empty);
        assert!(matches!(cell_value("a", &json!([1])), Err(Error::Fill(_))));
    }

    #[test]
    fn test_fill_vertical_insert() {
        let job = Job::from_json(
            r#"{
                "template": "t.xlsx",
                "output": "o.xlsx",
                "bindings": [ { "kind": "vertical_insert", "range": "row", "records": [
                    { "itemRef": "A-1", "desc": "Fan", "quantity": 3 },
                    { "itemRef": "A-2", "desc": "Lamp", "quantity": 1 }
                ] } ]
            }"#,
        )
        .unwrap();
        let mut wb = template();
        job.fill(&mut wb).unwrap();

        let sheet = wb.worksheet(0).unwrap();
        assert_eq!(sheet.get_value("B2").unwrap(), CellValue::string("Fan"));
        assert_eq!(sheet.get_value("B3").unwrap(), CellValue::string("Lamp"));
        assert_eq!(sheet.get_value("C3").unwrap(), CellValue::Number(1.0));
        assert_eq!(sheet.get_value("A4").unwrap(), CellValue::string("Total"));
    }

    #[test]
    fn test_fill_sheets_renames() {
        let job = Job::from_json(
            r#"{
                "template": "t.xlsx",
                "output": "o.xlsx",
                "bindings": [ { "kind": "sheets", "sheet_name_field": "name", "records": [
                    { "name": "North/East", "desc": "first" },
                    { "name": "South", "desc": "second" }
                ] } ]
            }"#,
        )
        .unwrap();
        let mut wb = template();
        job.fill(&mut wb).unwrap();

        let names: Vec<&str> = wb.worksheets().map(|s| s.name()).collect();
        assert_eq!(names, vec!["North-East", "South"]);
        assert_eq!(
            wb.worksheet(1).unwrap().get_value("B2").unwrap(),
            CellValue::string("second")
        );
    }

    #[test]
    fn test_missing_range() {
        let job = Job::from_json(
            r#"{ "template": "t.xlsx", "output": "o.xlsx",
                 "bindings": [ { "kind": "vertical", "records": [ {} ] } ] }"#,
        )
        .unwrap();
        let err = job.fill(&mut template()).unwrap_err();
        assert!(matches!(err, Error::Fill(_)));

        let job = Job::from_json(
            r#"{ "template": "t.xlsx", "output": "o.xlsx",
                 "bindings": [ { "kind": "horizontal", "records": [ {} ] } ] }"#,
        )
        .unwrap();
        assert!(matches!(job.fill(&mut template()), Err(Error::Fill(_))));
    }

    #[test]
    fn test_sheets_binding_needs_no_range() {
        let job = Job::from_json(
            r#"{ "template": "t.xlsx", "output": "o.xlsx",
                 "bindings": [ { "kind": "sheets", "records": [ { "desc": "only" } ] } ] }"#,
        )
        .unwrap();
        let mut wb = template();
        job.fill(&mut wb).unwrap();

        assert_eq!(wb.sheet_count(), 1);
        assert_eq!(wb.worksheet(0).unwrap().name(), "Sheet1 (2)");
        assert_eq!(
            wb.worksheet(0).unwrap().get_value("B2").unwrap(),
            CellValue::string("only")
        );
    }
}
