//! Migration of legacy codelists and agendas, and import of spreadsheet
//! agendas, into the new application schema.

pub mod agenda;
pub mod config;
pub mod db;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod status;
pub mod value;
pub mod workbook;

pub use config::Config;
pub use db::{Database, RelationalSession, SpreadsheetSession};
pub use error::{MigrateError, Result};
pub use orchestrator::{ImportReport, MigrationOutcome, MigrationReport, Orchestrator, Selector};
pub use registry::{Category, Registry};
