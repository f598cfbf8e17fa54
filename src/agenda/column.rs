use crate::value::Value;
use crate::workbook::CellType;
use chrono::NaiveTime;

/// Expected type of a spreadsheet column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Date,
    Numeric,
}

impl ValueType {
    pub fn accepts(self, detected: CellType) -> bool {
        matches!(
            (self, detected),
            (ValueType::String, CellType::String)
                | (ValueType::Date, CellType::Date)
                | (ValueType::Numeric, CellType::Numeric)
        )
    }
}

/// Row-level rule run after every cell of a row has been stored.
#[derive(Debug, Clone, PartialEq)]
pub enum PostProcess {
    None,
    /// A legacy-currency amount replaces the primary price with its converted
    /// value and stamps the legacy currency id.
    CurrencyFallback {
        price_field: String,
        currency_field: String,
    },
    /// Inclusive day count between two date fields.
    DateSpan {
        start_field: String,
        end_field: String,
        target_field: String,
    },
    /// `"HH:MM-HH:MM"` text converted to hours, in whole quarter hours.
    TimeRangeDuration { target_field: String },
}

/// One spreadsheet column of a workbook layout.
///
/// The first block of fields is the static definition; `index`, `value`
/// and `annotation` are per-sheet/per-row runtime state.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub title: String,
    pub value_type: ValueType,
    pub target_field: Option<String>,
    pub optional: bool,
    /// Content goes to the composed description; `target_field` is ignored.
    pub note_only: bool,
    pub rounding: Option<u32>,
    pub post_process: PostProcess,

    pub(crate) index: Option<usize>,
    pub(crate) value: Option<Value>,
    pub(crate) annotation: Option<String>,
}

impl ColumnSpec {
    pub fn new(title: &str, value_type: ValueType, target_field: &str) -> Self {
        Self {
            title: title.to_string(),
            value_type,
            target_field: Some(target_field.to_string()),
            optional: false,
            note_only: false,
            rounding: None,
            post_process: PostProcess::None,
            index: None,
            value: None,
            annotation: None,
        }
    }

    pub fn note(title: &str) -> Self {
        Self {
            target_field: None,
            note_only: true,
            ..Self::new(title, ValueType::String, "")
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn rounded(mut self, digits: u32) -> Self {
        self.rounding = Some(digits);
        self
    }

    pub fn with_post_process(mut self, post_process: PostProcess) -> Self {
        self.post_process = post_process;
        self
    }

    pub fn reset(&mut self, values_only: bool) {
        self.value = None;
        self.annotation = None;
        if !values_only {
            self.index = None;
        }
    }

    pub fn resolved_index(&self) -> Option<usize> {
        self.index
    }

    pub fn current_value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn current_annotation(&self) -> Option<&str> {
        self.annotation.as_deref()
    }

    /// Target field this column populates, if it populates one at all.
    pub fn stored_field(&self) -> Option<&str> {
        if self.note_only {
            None
        } else {
            self.target_field.as_deref()
        }
    }

    /// Mandatory for row admission: non-optional and not a note.
    pub fn required_in_row(&self) -> bool {
        !self.optional && !self.note_only
    }
}

/// Hours between the two ends of `"HH:MM-HH:MM"`, rounded down to a quarter
/// hour. A range whose end precedes its start runs past midnight.
pub fn parse_time_range(text: &str) -> Option<f64> {
    let (start, stop) = text.split_once('-')?;
    let start = NaiveTime::parse_from_str(start.trim(), "%H:%M").ok()?;
    let stop = NaiveTime::parse_from_str(stop.trim(), "%H:%M").ok()?;
    let mut minutes = (stop - start).num_minutes();
    if minutes < 0 {
        minutes += 24 * 60;
    }
    Some((minutes / 15) as f64 * 0.25)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_range_rounds_down_to_quarters() {
        assert_eq!(parse_time_range("18:00-19:30"), Some(1.5));
        assert_eq!(parse_time_range("18:00 - 19:44"), Some(1.5));
        assert_eq!(parse_time_range("18:00-19:45"), Some(1.75));
        assert_eq!(parse_time_range("23:00-01:00"), Some(2.0));
        assert_eq!(parse_time_range("evening"), None);
        assert_eq!(parse_time_range("18:00-late"), None);
    }

    #[test]
    fn reset_keeps_index_for_value_reset() {
        let mut col = ColumnSpec::new("Dátum", ValueType::Date, "date_on");
        col.index = Some(2);
        col.value = Some(Value::Integer(1));
        col.annotation = Some("x".into());
        col.reset(true);
        assert_eq!(col.resolved_index(), Some(2));
        assert!(col.current_value().is_none());
        assert!(col.current_annotation().is_none());
        col.reset(false);
        assert_eq!(col.resolved_index(), None);
    }

    #[test]
    fn notes_never_store_a_field() {
        let col = ColumnSpec::note("Miesto");
        assert!(col.note_only);
        assert_eq!(col.stored_field(), None);
        assert!(!col.required_in_row());
        assert!(ColumnSpec::new("Popis", ValueType::String, "title").required_in_row());
    }
}
