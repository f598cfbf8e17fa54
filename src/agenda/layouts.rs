//! Built-in workbook layouts, one per known spreadsheet agenda.

use super::column::{ColumnSpec, PostProcess, ValueType};
use crate::config::NamingConfig;
use crate::error::{MigrateError, Result};

/// Static description of one spreadsheet family.
#[derive(Debug, Clone)]
pub struct WorkbookLayout {
    pub id: &'static str,
    pub default_file: &'static str,
    /// Target agenda root, e.g. `expenses`.
    pub agenda: &'static str,
    pub columns: Vec<ColumnSpec>,
}

impl WorkbookLayout {
    pub fn target_table(&self, naming: &NamingConfig) -> String {
        format!("{}{}", naming.target_agenda_prefix, self.agenda)
    }

    pub fn has_optional_columns(&self) -> bool {
        self.columns.iter().any(|c| c.optional)
    }
}

pub fn builtin() -> Vec<WorkbookLayout> {
    vec![
        WorkbookLayout {
            id: "chalupa-events",
            default_file: "Chalupa_events.xlsx",
            agenda: "events",
            columns: vec![date("Dátum", "date_on"), text("Činnosť", "title")],
        },
        WorkbookLayout {
            id: "chalupa-expenses",
            default_file: "Chalupa_expenses.xlsx",
            agenda: "expenses",
            columns: priced("Dátum", "Popis", "Výdavky"),
        },
        WorkbookLayout {
            id: "chalupa-vacations",
            default_file: "Chalupa_vacations.xlsx",
            agenda: "vacations",
            columns: vec![
                date("Dátum od", "date_on"),
                date("Dátum do", "date_off"),
                text("Účel", "title"),
                ColumnSpec::new("Period", ValueType::Numeric, "period")
                    .optional()
                    .with_post_process(PostProcess::DateSpan {
                        start_field: "date_on".into(),
                        end_field: "date_off".into(),
                        target_field: "period".into(),
                    }),
            ],
        },
        WorkbookLayout {
            id: "konopa-income",
            default_file: "Konopa_income.xlsx",
            agenda: "incomes",
            columns: vec![
                date("Dátum", "date_on"),
                text("Akcia", "title"),
                ColumnSpec::note("Miesto"),
                ColumnSpec::note("Čas"),
                ColumnSpec::note("Hráčov"),
                euro("Môj honorár €"),
                legacy("Môj honorár Sk"),
                ColumnSpec::note("Poznámka"),
                currency(),
            ],
        },
        WorkbookLayout {
            id: "konopa-rehearsal",
            default_file: "Konopa_rehearsal.xlsx",
            agenda: "events",
            columns: vec![
                date("Dátum", "date_on"),
                text("Akcia", "title"),
                ColumnSpec::note("Miesto"),
                ColumnSpec::note("Čas").with_post_process(PostProcess::TimeRangeDuration {
                    target_field: "duration".into(),
                }),
                ColumnSpec::note("Hráčov"),
                ColumnSpec::note("Poznámka"),
            ],
        },
        WorkbookLayout {
            id: "extra-incomes",
            default_file: "Mimoriadne príjmy.xlsx",
            agenda: "incomes",
            columns: priced("Dátum", "Príjem", "Suma"),
        },
    ]
}

pub fn find(id: &str) -> Result<WorkbookLayout> {
    builtin()
        .into_iter()
        .find(|l| l.id == id)
        .ok_or_else(|| MigrateError::UnknownTable(format!("workbook {id}")))
}

fn date(title: &str, field: &str) -> ColumnSpec {
    ColumnSpec::new(title, ValueType::Date, field)
}

fn text(title: &str, field: &str) -> ColumnSpec {
    ColumnSpec::new(title, ValueType::String, field)
}

fn euro(title: &str) -> ColumnSpec {
    ColumnSpec::new(title, ValueType::Numeric, "price")
        .optional()
        .rounded(2)
}

fn legacy(title: &str) -> ColumnSpec {
    ColumnSpec::new(title, ValueType::Numeric, "price_orig")
        .optional()
        .rounded(2)
        .with_post_process(PostProcess::CurrencyFallback {
            price_field: "price".into(),
            currency_field: "id_currency".into(),
        })
}

fn currency() -> ColumnSpec {
    ColumnSpec::new("Currency", ValueType::Numeric, "id_currency").optional()
}

/// Date, title, EUR amount, legacy amount and currency columns.
fn priced(date_title: &str, title: &str, amount: &str) -> Vec<ColumnSpec> {
    vec![
        date(date_title, "date_on"),
        text(title, "title"),
        euro(&format!("{amount} €")),
        legacy(&format!("{amount} Sk")),
        currency(),
    ]
}
