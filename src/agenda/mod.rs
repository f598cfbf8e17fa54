//! Schema-driven reading of spreadsheet agendas.
//!
//! An [`Agenda`] is built from a [`WorkbookLayout`] for one sheet. It locates
//! the header row, resolves every known column to its position, then turns
//! each data row into an [`AgendaRecord`]: typed target fields plus a
//! description composed from note columns and cell annotations.

mod column;
pub mod layouts;

pub use column::{parse_time_range, ColumnSpec, PostProcess, ValueType};
pub use layouts::WorkbookLayout;

use crate::config::BusinessParams;
use crate::error::{MigrateError, Result};
use crate::value::{round_to, Value};
use crate::workbook::{cell_address, Cell, CellType, CellValue, Sheet};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Separator of description fragments in the target schema.
pub const DESCRIPTION_SEPARATOR: &str = "<br>";

/// What happened to one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellOutcome {
    Stored,
    Noted,
    Absent,
    Mismatch { detected: CellType },
    /// The cell is in no known column.
    Ignored,
}

/// One admitted spreadsheet row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AgendaRecord {
    pub fields: BTreeMap<String, Value>,
    pub description: String,
}

/// Per-run bookkeeping stamped on every written row.
#[derive(Debug, Clone, Copy)]
pub struct Bookkeeping {
    pub now: NaiveDateTime,
    pub user: i64,
}

impl AgendaRecord {
    /// Populated target fields plus bookkeeping, ordered by field name.
    pub fn to_fields(&self, bookkeeping: &Bookkeeping) -> BTreeMap<String, Value> {
        let mut fields = self.fields.clone();
        for name in ["params", "metakey", "metadesc", "metadata"] {
            fields.insert(name.to_string(), Value::text(""));
        }
        fields.insert("created".into(), Value::DateTime(bookkeeping.now));
        fields.insert("modified".into(), Value::DateTime(bookkeeping.now));
        fields.insert("created_by".into(), Value::Integer(bookkeeping.user));
        fields.insert("modified_by".into(), Value::Integer(bookkeeping.user));
        fields.insert("description".into(), Value::text(self.description.clone()));
        fields
    }
}

/// Rows read from one sheet.
#[derive(Debug, Clone, Default)]
pub struct SheetRecords {
    pub records: Vec<AgendaRecord>,
    /// Data rows examined below the header.
    pub rows_read: usize,
    /// Cells dropped for a wrong data type.
    pub mismatched_cells: usize,
}

pub struct Agenda {
    layout_id: &'static str,
    columns: Vec<ColumnSpec>,
    require_optional: bool,
    notes: Vec<String>,
    /// Post-processor outputs with no column of their own.
    derived: BTreeMap<String, Value>,
    params: BusinessParams,
}

impl Agenda {
    pub fn new(layout: &WorkbookLayout, params: &BusinessParams) -> Self {
        Self {
            layout_id: layout.id,
            columns: layout.columns.clone(),
            require_optional: layout.has_optional_columns(),
            notes: Vec::new(),
            derived: BTreeMap::new(),
            params: params.clone(),
        }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column(&self, title: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.title == title)
    }

    pub fn reset(&mut self, values_only: bool) {
        for col in &mut self.columns {
            col.reset(values_only);
        }
        self.notes.clear();
        self.derived.clear();
    }

    /// Locate the header row and resolve column positions from it.
    pub fn detect_header(&mut self, sheet: &Sheet) -> Result<usize> {
        let header = sheet
            .rows
            .iter()
            .position(|row| row.first().is_some_and(|c| !c.value.is_blank()))
            .ok_or_else(|| MigrateError::HeaderNotFound {
                sheet: sheet.name.clone(),
            })?;

        for (idx, cell) in sheet.rows[header].iter().enumerate() {
            let CellValue::Text(title) = &cell.value else {
                continue;
            };
            let title = normalize_title(title);
            if let Some(col) = self.columns.iter_mut().find(|c| c.title == title) {
                col.index = Some(idx);
            }
        }
        debug!(
            "Header of sheet {} in row {} for layout {}",
            sheet.name,
            header + 1,
            self.layout_id
        );
        Ok(header)
    }

    /// Every mandatory column resolved and at least one optional one, when
    /// the layout declares optional columns.
    pub fn check_schema(&self, sheet_name: &str) -> Result<()> {
        let mandatory = self
            .columns
            .iter()
            .filter(|c| !c.optional)
            .all(|c| c.index.is_some());
        let optional = !self.require_optional
            || self
                .columns
                .iter()
                .any(|c| c.optional && c.index.is_some());
        if mandatory && optional {
            Ok(())
        } else {
            Err(MigrateError::UnrecognizedSchema {
                sheet: sheet_name.to_string(),
            })
        }
    }

    /// Store one cell of the current row into the column resolved at `col`.
    pub fn store_cell(
        &mut self,
        sheet_name: &str,
        row: usize,
        col: usize,
        cell: &Cell,
    ) -> CellOutcome {
        let signature = self.params.annotation_signature.clone();
        let Some(column) = self.columns.iter_mut().find(|c| c.index == Some(col)) else {
            return CellOutcome::Ignored;
        };
        let annotation = cell
            .annotation
            .as_deref()
            .and_then(|a| sanitize_annotation(a, signature.as_deref()));

        if column.note_only {
            let mut parts = Vec::new();
            if !cell.value.is_blank() {
                column.value = Some(cell.value.to_value());
                parts.push(cell.value.to_string());
            }
            if let Some(a) = &annotation {
                parts.push(a.clone());
            }
            column.annotation = annotation;
            if parts.is_empty() {
                return CellOutcome::Absent;
            }
            self.notes.push(format!("{}: {}", column.title, parts.join("; ")));
            return CellOutcome::Noted;
        }

        if cell.value.is_blank() {
            return CellOutcome::Absent;
        }

        let Some(detected) = cell.value.cell_type() else {
            return CellOutcome::Absent;
        };
        if !column.value_type.accepts(detected) {
            warn!(
                "{}",
                MigrateError::CellTypeMismatch {
                    sheet: sheet_name.to_string(),
                    address: cell_address(row, col),
                    detected: detected.to_string(),
                    column: column.title.clone(),
                }
            );
            return CellOutcome::Mismatch { detected };
        }

        column.value = Some(match (&cell.value, column.value_type) {
            (CellValue::Date(dt), ValueType::Date) => Value::Date(dt.date()),
            (CellValue::Number(v), ValueType::Numeric) => {
                Value::Real(column.rounding.map_or(*v, |d| round_to(*v, d)))
            }
            (other, _) => other.to_value(),
        });
        if let Some(a) = annotation {
            column.annotation = Some(a.clone());
            self.notes.push(a);
        }
        CellOutcome::Stored
    }

    /// Run column post-processors over the fully stored row.
    pub fn finish_row(&mut self) {
        let rules: Vec<(usize, PostProcess)> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.post_process != PostProcess::None)
            .map(|(i, c)| (i, c.post_process.clone()))
            .collect();

        for (i, rule) in rules {
            match rule {
                PostProcess::None => {}
                PostProcess::CurrencyFallback {
                    price_field,
                    currency_field,
                } => {
                    let Some(amount) = self.columns[i].value.as_ref().and_then(Value::as_f64) else {
                        continue;
                    };
                    if amount == 0.0 {
                        continue;
                    }
                    let digits = self
                        .columns
                        .iter()
                        .find(|c| c.stored_field() == Some(price_field.as_str()))
                        .and_then(|c| c.rounding)
                        .or(self.columns[i].rounding);
                    let converted = amount / self.params.legacy_currency_rate;
                    let price = digits.map_or(converted, |d| round_to(converted, d));
                    let currency = Value::Integer(self.params.legacy_currency_id);
                    self.set_field(&price_field, Value::Real(price));
                    self.set_field(&currency_field, currency);
                }
                PostProcess::DateSpan {
                    start_field,
                    end_field,
                    target_field,
                } => {
                    let start = self.field(&start_field).and_then(Value::as_date);
                    let end = self.field(&end_field).and_then(Value::as_date);
                    if let (Some(start), Some(end)) = (start, end) {
                        let days = (end - start).num_days() + 1;
                        self.set_field(&target_field, Value::Integer(days));
                    }
                }
                PostProcess::TimeRangeDuration { target_field } => {
                    let Some(raw) = self.columns[i].value.as_ref().map(Value::to_string) else {
                        continue;
                    };
                    match parse_time_range(&raw) {
                        Some(hours) => self.set_field(&target_field, Value::Real(hours)),
                        None => warn!(
                            "Unparsable time range \"{}\" in column \"{}\"",
                            raw, self.columns[i].title
                        ),
                    }
                }
            }
        }
    }

    /// Every mandatory non-note column has a value.
    pub fn check_row(&self) -> bool {
        self.columns
            .iter()
            .filter(|c| c.required_in_row())
            .all(|c| c.value.is_some())
    }

    /// Record of the current row.
    pub fn record(&self) -> AgendaRecord {
        let mut fields: BTreeMap<String, Value> = self
            .columns
            .iter()
            .filter_map(|c| Some((c.stored_field()?.to_string(), c.value.clone()?)))
            .collect();
        fields.extend(self.derived.iter().map(|(k, v)| (k.clone(), v.clone())));
        AgendaRecord {
            fields,
            description: self.notes.join(DESCRIPTION_SEPARATOR),
        }
    }

    pub fn read_sheet(&mut self, sheet: &Sheet) -> Result<SheetRecords> {
        self.reset(false);
        let header = self.detect_header(sheet)?;
        self.check_schema(&sheet.name)?;

        let positions: Vec<usize> = self.columns.iter().filter_map(|c| c.index).collect();
        let empty = Cell::empty();
        let mut out = SheetRecords::default();
        for (r, row) in sheet.rows.iter().enumerate().skip(header + 1) {
            out.rows_read += 1;
            self.reset(true);
            for &idx in &positions {
                let cell = row.get(idx).unwrap_or(&empty);
                if let CellOutcome::Mismatch { .. } = self.store_cell(&sheet.name, r, idx, cell) {
                    out.mismatched_cells += 1;
                }
            }
            self.finish_row();
            if self.check_row() {
                out.records.push(self.record());
            }
        }
        Ok(out)
    }

    fn field(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|c| c.stored_field() == Some(name))
            .and_then(|c| c.value.as_ref())
            .or_else(|| self.derived.get(name))
    }

    fn set_field(&mut self, name: &str, value: Value) {
        match self
            .columns
            .iter_mut()
            .find(|c| c.stored_field() == Some(name))
        {
            Some(col) => col.value = Some(value),
            None => {
                self.derived.insert(name.to_string(), value);
            }
        }
    }
}

fn normalize_title(title: &str) -> String {
    title.replace("\r\n", " ").replace('\n', " ")
}

/// Drop the author line spreadsheet apps put at the top of comments.
fn sanitize_annotation(text: &str, signature: Option<&str>) -> Option<String> {
    let text = match signature {
        Some(sig) if !sig.is_empty() => text.replace(&format!("{sig}\n"), ""),
        _ => text.to_string(),
    };
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
