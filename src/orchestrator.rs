//! Read → transform → truncate → write → report, per table or per sheet.
//!
//! Failures are contained at the nearest loop: a bad table never stops the
//! next one, a rejected sheet never stops the next sheet, a failed row never
//! stops the sheet. Every outcome is logged and counted.

use crate::agenda::{Agenda, Bookkeeping, WorkbookLayout};
use crate::config::{BusinessParams, Config, NamingConfig};
use crate::db::{Database, RelationalSession, SpreadsheetSession};
use crate::registry::{Category, Registry, TableMapping};
use crate::status::{self, FreshnessRow};
use crate::value::Value;
use crate::workbook::Workbook;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Which roots of a category to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    All,
    Named(Vec<String>),
}

impl Selector {
    /// `*` or `all` selects everything, otherwise a comma separated list of
    /// roots.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s == "*" || s.eq_ignore_ascii_case("all") {
            return Selector::All;
        }
        Selector::Named(
            s.split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn roots(&self, registry: &Registry, category: Category) -> Vec<String> {
        match self {
            Selector::All => registry
                .list_by_category(category)
                .into_iter()
                .map(str::to_string)
                .collect(),
            Selector::Named(roots) => roots.clone(),
        }
    }
}

/// Result of migrating one table or importing one sheet.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MigrationOutcome {
    pub source: String,
    pub target: String,
    pub rows_read: usize,
    pub rows_written: usize,
    pub error_count: usize,
    /// Cells dropped for a wrong data type.
    pub warning_count: usize,
    pub success: bool,
}

impl MigrationOutcome {
    fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            rows_read: 0,
            rows_written: 0,
            error_count: 0,
            warning_count: 0,
            success: false,
        }
    }

    fn failed(mut self) -> Self {
        self.error_count += 1;
        self.success = false;
        self
    }

    fn finish(mut self) -> Self {
        self.success = self.error_count == 0;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub run_id: String,
    pub category: Category,
    pub user: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub outcomes: Vec<MigrationOutcome>,
    /// Requested roots unknown to the registry.
    pub skipped: Vec<String>,
}

impl MigrationReport {
    pub fn rows_written(&self) -> usize {
        self.outcomes.iter().map(|o| o.rows_written).sum()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub run_id: String,
    pub workbook: String,
    pub layout: String,
    pub target: String,
    pub user: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub sheets: Vec<MigrationOutcome>,
    pub rows_total: usize,
    pub skipped_sheets: Vec<String>,
    /// False when the target could not be prepared and no sheet was read.
    pub success: bool,
}

pub struct Orchestrator {
    registry: Registry,
    naming: NamingConfig,
    params: BusinessParams,
}

impl Orchestrator {
    pub fn new(config: &Config) -> Self {
        Self {
            registry: Registry::builtin(&config.naming),
            naming: config.naming.clone(),
            params: config.params.clone(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn migrate(
        &self,
        session: &RelationalSession,
        category: Category,
        selector: &Selector,
        user: i64,
    ) -> MigrationReport {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        let mut outcomes = Vec::new();
        let mut skipped = Vec::new();

        for root in selector.roots(&self.registry, category) {
            match self.registry.resolve_source(category, &root) {
                Ok(mapping) => outcomes.push(self.migrate_table(session, mapping, user)),
                Err(e) => {
                    warn!("{}", e);
                    skipped.push(root);
                }
            }
        }

        let report = MigrationReport {
            run_id,
            category,
            user,
            started_at,
            completed_at: Utc::now(),
            outcomes,
            skipped,
        };
        info!(
            "Migrated {} {} with {} records in total",
            report.outcomes.len(),
            category.plural(),
            report.rows_written()
        );
        report
    }

    fn migrate_table(
        &self,
        session: &RelationalSession,
        mapping: &TableMapping,
        user: i64,
    ) -> MigrationOutcome {
        let source = &session.source;
        let target = &session.target;
        let table = mapping.target_identifier.as_str();
        let mut outcome = MigrationOutcome::new(&mapping.source_identifier, table);

        let rows = match source.query_records(&mapping.select_sql(), &[]) {
            Ok(rows) => rows,
            Err(e) => {
                error!(
                    "Cannot read table {}.{}: {}",
                    source.name(),
                    mapping.source_identifier,
                    e
                );
                return outcome.failed();
            }
        };
        outcome.rows_read = rows.len();
        debug!(
            "Read {} records from table {}.{}",
            rows.len(),
            source.name(),
            mapping.source_identifier
        );

        if let Err(e) = target.truncate(table) {
            error!("{}", e);
            return outcome.failed();
        }

        let values: Vec<Vec<Value>> = rows.iter().map(|r| mapping.evaluate(r)).collect();
        match target.execute_many(table, &mapping.insert_sql(), &values) {
            Ok(n) => outcome.rows_written = n,
            // Ownership is still stamped on whatever the table holds.
            Err(e) => {
                error!("{}", e);
                outcome.error_count += 1;
            }
        }

        match target.update_owner(table, user) {
            Ok(n) => debug!("Updated {} records in table {}.{}", n, target.name(), table),
            Err(e) => {
                error!("{}", e);
                return outcome.failed();
            }
        }

        if let Some(register) = &mapping.registration_key {
            match target.update_register_owner(register, mapping.register_alias(), user) {
                Ok(n) => debug!(
                    "Updated {} records in table {}.{}",
                    n,
                    target.name(),
                    register
                ),
                Err(e) => {
                    error!("{}", e);
                    outcome.error_count += 1;
                }
            }
        }

        info!(
            "Table {}.{} migrated to {}.{} with {} records under user {}",
            source.name(),
            mapping.source_identifier,
            target.name(),
            table,
            outcome.rows_written,
            user
        );
        outcome.finish()
    }

    pub fn import_workbook(
        &self,
        session: &SpreadsheetSession,
        layout: &WorkbookLayout,
        workbook: &Workbook,
        user: i64,
    ) -> ImportReport {
        let target = &session.target;
        let table = layout.target_table(&self.naming);
        let mut report = ImportReport {
            run_id: Uuid::new_v4().to_string(),
            workbook: workbook.display_name(),
            layout: layout.id.to_string(),
            target: table.clone(),
            user,
            started_at: Utc::now(),
            completed_at: Utc::now(),
            sheets: Vec::new(),
            rows_total: 0,
            skipped_sheets: Vec::new(),
            success: true,
        };

        if let Err(e) = target.truncate(&table) {
            error!("{}", e);
            report.success = false;
            report.completed_at = Utc::now();
            return report;
        }

        let bookkeeping = Bookkeeping {
            now: Local::now().naive_local(),
            user,
        };
        for sheet in &workbook.sheets {
            let mut agenda = Agenda::new(layout, &self.params);
            let read = match agenda.read_sheet(sheet) {
                Ok(read) => read,
                Err(e) => {
                    if e.is_sheet_rejection() {
                        warn!("{}", e);
                    } else {
                        error!("{}", e);
                    }
                    report.skipped_sheets.push(sheet.name.clone());
                    continue;
                }
            };

            let mut outcome = MigrationOutcome::new(&sheet.name, &table);
            outcome.rows_read = read.rows_read;
            outcome.warning_count = read.mismatched_cells;
            for record in &read.records {
                match target.insert(&table, &record.to_fields(&bookkeeping)) {
                    Ok(_) => outcome.rows_written += 1,
                    Err(e) => {
                        error!("{}", e);
                        outcome.error_count += 1;
                    }
                }
            }
            info!("{} rows from sheet {}", outcome.rows_written, sheet.name);
            report.rows_total += outcome.rows_written;
            report.sheets.push(outcome.finish());
        }

        info!(
            "Migrated {} rows in total from {} to {}.{}",
            report.rows_total,
            report.workbook,
            target.name(),
            table
        );
        report.completed_at = Utc::now();
        report
    }

    /// Stamp `user` on every target table of a category. Returns the number
    /// of tables updated.
    pub fn reassign_owner(&self, target: &Database, category: Category, user: i64) -> usize {
        let mut updated = 0;
        for mapping in self
            .registry
            .mappings()
            .iter()
            .filter(|m| m.category == category)
        {
            match target.update_owner(&mapping.target_identifier, user) {
                Ok(n) => {
                    info!(
                        "Updated {} records in table {}.{} with user {}",
                        n,
                        target.name(),
                        mapping.target_identifier,
                        user
                    );
                    updated += 1;
                }
                Err(e) => error!("{}", e),
            }
        }
        info!(
            "Updated {} {} tables with user {}",
            updated,
            category,
            user
        );
        updated
    }

    pub fn freshness(&self, session: &RelationalSession, category: Category) -> Vec<FreshnessRow> {
        status::freshness(
            session,
            self.registry
                .mappings()
                .iter()
                .filter(|m| m.category == category),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_parsing() {
        assert_eq!(Selector::parse("*"), Selector::All);
        assert_eq!(Selector::parse(" all "), Selector::All);
        assert_eq!(Selector::parse("ALL"), Selector::All);
        assert_eq!(
            Selector::parse("currency, unit,,"),
            Selector::Named(vec!["currency".into(), "unit".into()])
        );
    }

    #[test]
    fn all_selects_registry_order() {
        let registry = Registry::builtin(&NamingConfig::default());
        let roots = Selector::All.roots(&registry, Category::Agenda);
        assert_eq!(roots, ["asset", "event", "expense", "fuel", "income", "vacation"]);
        let named = Selector::parse("planet,unit").roots(&registry, Category::Codelist);
        assert_eq!(named, ["planet", "unit"]);
    }

    #[test]
    fn outcome_success_tracks_errors() {
        let ok = MigrationOutcome::new("a", "b").finish();
        assert!(ok.success);
        let failed = MigrationOutcome::new("a", "b").failed();
        assert_eq!(failed.error_count, 1);
        assert!(!failed.success);
    }
}
