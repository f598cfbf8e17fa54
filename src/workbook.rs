//! Untyped spreadsheet grid: workbooks of sheets of rows of cells.
//!
//! Files are read with calamine. Tests and callers may also build workbooks
//! in memory, which is the only way to attach cell annotations: calamine
//! does not expose cell comments.

use crate::error::{MigrateError, Result};
use crate::value::{Value, DATETIME_FORMAT, DATE_FORMAT};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use std::path::{Path, PathBuf};

/// Detected primitive type of a non-empty cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    String,
    Numeric,
    Date,
    Boolean,
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CellType::String => "string",
            CellType::Numeric => "numeric",
            CellType::Date => "date",
            CellType::Boolean => "boolean",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
    Bool(bool),
}

impl CellValue {
    pub fn cell_type(&self) -> Option<CellType> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(_) => Some(CellType::String),
            CellValue::Number(_) => Some(CellType::Numeric),
            CellValue::Date(_) => Some(CellType::Date),
            CellValue::Bool(_) => Some(CellType::Boolean),
        }
    }

    /// Empty cells, empty text, zero and `FALSE` carry no value.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::Number(v) => *v == 0.0,
            CellValue::Date(_) => false,
            CellValue::Bool(b) => !*b,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            CellValue::Empty => Value::Null,
            CellValue::Text(s) => Value::Text(s.clone()),
            CellValue::Number(v) => Value::Real(*v),
            CellValue::Date(dt) => Value::DateTime(*dt),
            CellValue::Bool(b) => Value::Integer(i64::from(*b)),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(v) => write!(f, "{v}"),
            CellValue::Date(dt) if dt.time() == NaiveTime::MIN => {
                write!(f, "{}", dt.format(DATE_FORMAT))
            }
            CellValue::Date(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub value: CellValue,
    pub annotation: Option<String>,
}

impl Cell {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::from(CellValue::Text(s.into()))
    }

    pub fn number(v: f64) -> Self {
        Self::from(CellValue::Number(v))
    }

    pub fn date(d: NaiveDate) -> Self {
        Self::from(CellValue::Date(d.and_time(NaiveTime::MIN)))
    }

    pub fn with_annotation(mut self, text: impl Into<String>) -> Self {
        self.annotation = Some(text.into());
        self
    }
}

impl From<CellValue> for Cell {
    fn from(value: CellValue) -> Self {
        Self {
            value,
            annotation: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    pub fn with_row(mut self, row: Vec<Cell>) -> Self {
        self.rows.push(row);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub path: Option<PathBuf>,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { path: None, sheets }
    }

    pub fn display_name(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| "<memory>".to_string())
    }
}

/// Spreadsheet-style address of a zero-based cell position, e.g. `(6, 1)` → `B7`.
pub fn cell_address(row: usize, col: usize) -> String {
    let mut letters = Vec::new();
    let mut n = col + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    let column: String = letters.into_iter().rev().collect();
    format!("{}{}", column, row + 1)
}

/// Read every sheet of an `.xlsx`, `.xls` or `.ods` file, in document order.
pub fn open_workbook(path: &Path) -> Result<Workbook> {
    use calamine::{open_workbook_auto, Reader};

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| MigrateError::Workbook(format!("{}: {}", path.to_string_lossy(), e)))?;

    let mut sheets = Vec::new();
    for sheet_name in workbook.sheet_names().to_vec() {
        let range = workbook.worksheet_range(&sheet_name).map_err(|e| {
            MigrateError::Workbook(format!("{}!{}: {}", path.to_string_lossy(), sheet_name, e))
        })?;

        // Ranges start at the first used cell; pad so positions match the sheet.
        let (row_offset, col_offset) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));
        let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row_offset];
        for data_row in range.rows() {
            let mut row = vec![Cell::empty(); col_offset];
            row.extend(data_row.iter().map(|d| Cell::from(convert_cell(d))));
            rows.push(row);
        }
        sheets.push(Sheet {
            name: sheet_name,
            rows,
        });
    }

    Ok(Workbook {
        path: Some(path.to_path_buf()),
        sheets,
    })
}

fn convert_cell(cell: &calamine::Data) -> CellValue {
    use calamine::Data;
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(s, DATE_FORMAT)
                    .ok()
                    .map(|d| d.and_time(NaiveTime::MIN))
            })
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

/// Excel serial day number (1900 date system) to a timestamp.
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    let millis = (serial * 86_400_000.0).round() as i64;
    base.checked_add_signed(chrono::Duration::milliseconds(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_use_column_letters() {
        assert_eq!(cell_address(0, 0), "A1");
        assert_eq!(cell_address(6, 1), "B7");
        assert_eq!(cell_address(9, 25), "Z10");
        assert_eq!(cell_address(0, 26), "AA1");
        assert_eq!(cell_address(1, 27), "AB2");
    }

    #[test]
    fn blank_cells_follow_spreadsheet_truthiness() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::Text(String::new()).is_blank());
        assert!(CellValue::Number(0.0).is_blank());
        assert!(!CellValue::Number(3.0).is_blank());
        assert!(!CellValue::Text("x".into()).is_blank());
    }

    #[test]
    fn date_cells_display_without_midnight() {
        let d = NaiveDate::from_ymd_opt(2019, 7, 1).unwrap();
        assert_eq!(Cell::date(d).value.to_string(), "2019-07-01");
        assert_eq!(CellValue::Number(12.5).to_string(), "12.5");
    }

    #[test]
    fn excel_serials_convert_to_dates() {
        let dt = excel_serial_to_datetime(43647.0).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2019, 7, 1).unwrap());
        let dt = excel_serial_to_datetime(43647.75).unwrap();
        assert_eq!(dt.format("%H:%M").to_string(), "18:00");
    }

    #[test]
    fn missing_file_is_a_workbook_error() {
        let err = open_workbook(Path::new("/nonexistent/agenda.xlsx")).unwrap_err();
        assert!(matches!(err, MigrateError::Workbook(_)));
    }
}
