//! Freshness of migrated tables: latest change and row count on both sides.

use crate::db::{Database, RelationalSession};
use crate::registry::TableMapping;
use crate::value::DATETIME_FORMAT;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// One side has no timestamp.
    Unknown,
    /// Source changed after the last migration.
    SourceNewer,
    TargetNewer,
    InSync,
}

impl Freshness {
    pub fn of(source: Option<NaiveDateTime>, target: Option<NaiveDateTime>) -> Self {
        match (source, target) {
            (Some(s), Some(t)) if s > t => Freshness::SourceNewer,
            (Some(s), Some(t)) if s < t => Freshness::TargetNewer,
            (Some(_), Some(_)) => Freshness::InSync,
            _ => Freshness::Unknown,
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Freshness::Unknown => "???",
            Freshness::SourceNewer => "!!!",
            Freshness::TargetNewer => "<",
            Freshness::InSync => "=",
        }
    }
}

/// Latest change and row count of one table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableState {
    pub table: String,
    pub latest: Option<NaiveDateTime>,
    pub count: Option<i64>,
}

impl TableState {
    fn read(db: &Database, table: &str) -> Self {
        let mut state = TableState {
            table: table.to_string(),
            ..Default::default()
        };
        let sql = format!(
            "SELECT MAX(COALESCE(MAX(modified, created), created)) AS latest, \
             COUNT(*) AS total FROM {table}"
        );
        match db.query_records(&sql, &[]) {
            Ok(rows) => {
                if let Some(row) = rows.first() {
                    state.latest = row.get("latest").and_then(|v| v.as_datetime());
                    state.count = row.get("total").and_then(|v| v.as_f64()).map(|n| n as i64);
                }
            }
            Err(e) => error!("{}.{}: {}", db.name(), table, e),
        }
        state
    }

    fn describe(&self) -> String {
        let latest = self
            .latest
            .map(|t| t.format(DATETIME_FORMAT).to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let count = self
            .count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        format!("{} ({}, {})", self.table, latest, count)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FreshnessRow {
    pub source: TableState,
    pub target: TableState,
    pub verdict: Freshness,
}

impl fmt::Display for FreshnessRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<4}{} -> {}",
            self.verdict.marker(),
            self.source.describe(),
            self.target.describe()
        )
    }
}

pub fn freshness<'a>(
    session: &RelationalSession,
    mappings: impl IntoIterator<Item = &'a TableMapping>,
) -> Vec<FreshnessRow> {
    mappings
        .into_iter()
        .map(|m| {
            let source = TableState::read(&session.source, &m.source_identifier);
            let target = TableState::read(&session.target, &m.target_identifier);
            let verdict = Freshness::of(source.latest, target.latest);
            FreshnessRow {
                source,
                target,
                verdict,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2020, 1, day)?.and_hms_opt(12, 0, 0)
    }

    #[test]
    fn verdicts() {
        assert_eq!(Freshness::of(at(2), at(1)), Freshness::SourceNewer);
        assert_eq!(Freshness::of(at(1), at(2)), Freshness::TargetNewer);
        assert_eq!(Freshness::of(at(1), at(1)), Freshness::InSync);
        assert_eq!(Freshness::of(None, at(1)), Freshness::Unknown);
    }

    #[test]
    fn rows_render_with_marker() {
        let row = FreshnessRow {
            source: TableState {
                table: "jos_codelist_unit".into(),
                latest: at(2),
                count: Some(3),
            },
            target: TableState {
                table: "lgbj_gbjcodes_units".into(),
                latest: None,
                count: Some(0),
            },
            verdict: Freshness::Unknown,
        };
        assert_eq!(
            row.to_string(),
            "??? jos_codelist_unit (2020-01-02 12:00:00, 3) -> lgbj_gbjcodes_units (N/A, 0)"
        );
    }
}
