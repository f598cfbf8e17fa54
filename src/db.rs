use crate::config::{Config, DatabaseConfig};
use crate::error::{MigrateError, Result};
use crate::registry::insert_sql;
use crate::value::{Record, Value};
use rusqlite::{params_from_iter, Connection, ErrorCode, OpenFlags};
use std::collections::BTreeMap;
use tracing::debug;

/// An open SQLite store.
pub struct Database {
    name: String,
    conn: Connection,
}

impl Database {
    /// Open an existing database file. Stores are never created here: a
    /// missing file is an error, not an empty database.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let name = config.name();
        if !config.path.exists() {
            return Err(MigrateError::DatabaseMissing { database: name });
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&config.path, flags)
            .map_err(|e| connection_error(&name, e))?;
        // Opening is lazy in SQLite; touch the schema so a bad file fails here.
        conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| connection_error(&name, e))?;
        debug!("Connected to database {}", name);
        Ok(Self { name, conn })
    }

    pub fn from_connection(name: impl Into<String>, conn: Connection) -> Self {
        Self {
            name: name.into(),
            conn,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Field-named rows of a query.
    pub fn query_records(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            let mut record = Record::new();
            for (i, name) in names.iter().enumerate() {
                record.insert(name.clone(), row.get::<_, Value>(i)?);
            }
            Ok(record)
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        Ok(self.conn.execute(sql, params_from_iter(params.iter()))?)
    }

    /// Run one prepared statement for every parameter set inside a single
    /// transaction. Any failing row rolls back the whole batch.
    pub fn execute_many(&self, table: &str, sql: &str, rows: &[Vec<Value>]) -> Result<usize> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| MigrateError::write(table, "insert", e))?;
        let mut affected = 0;
        {
            // An uncommitted transaction rolls back when dropped.
            let mut stmt = tx
                .prepare(sql)
                .map_err(|e| MigrateError::write(table, "insert", e))?;
            for row in rows {
                match stmt.execute(params_from_iter(row.iter())) {
                    Ok(n) => affected += n,
                    Err(e) => {
                        drop(stmt);
                        let _ = tx.rollback();
                        return Err(MigrateError::write(table, "insert", e));
                    }
                }
            }
        }
        tx.commit()
            .map_err(|e| MigrateError::write(table, "insert", e))?;
        Ok(affected)
    }

    /// Remove every row of `table`.
    pub fn truncate(&self, table: &str) -> Result<usize> {
        self.conn
            .execute(&format!("DELETE FROM {table}"), [])
            .map_err(|e| MigrateError::write(table, "truncate", e))
    }

    pub fn insert(&self, table: &str, fields: &BTreeMap<String, Value>) -> Result<usize> {
        let sql = insert_sql(table, fields.keys().map(String::as_str));
        self.conn
            .execute(&sql, params_from_iter(fields.values()))
            .map_err(|e| MigrateError::write(table, "insert", e))
    }

    /// Stamp `user` as creator and last modifier of every row of `table`.
    pub fn update_owner(&self, table: &str, user: i64) -> Result<usize> {
        self.conn
            .execute(
                &format!("UPDATE {table} SET created_by = ?1, modified_by = ?1"),
                [user],
            )
            .map_err(|e| MigrateError::write(table, "update", e))
    }

    /// Stamp `user` on the register row whose alias is `alias`.
    pub fn update_register_owner(&self, register: &str, alias: &str, user: i64) -> Result<usize> {
        self.conn
            .execute(
                &format!("UPDATE {register} SET created_by = ?1, modified_by = ?1 WHERE alias = ?2"),
                rusqlite::params![user, alias],
            )
            .map_err(|e| MigrateError::write(register, "update", e))
    }
}

fn connection_error(database: &str, source: rusqlite::Error) -> MigrateError {
    let denied = matches!(
        source.sqlite_error_code(),
        Some(ErrorCode::CannotOpen | ErrorCode::PermissionDenied | ErrorCode::ReadOnly)
    );
    if denied {
        MigrateError::ConnectionDenied {
            database: database.to_string(),
        }
    } else {
        MigrateError::Connection {
            database: database.to_string(),
            source,
        }
    }
}

/// Source and target stores of a relational migration.
pub struct RelationalSession {
    pub source: Database,
    pub target: Database,
}

impl RelationalSession {
    pub fn open(config: &Config) -> Result<Self> {
        let source = Database::open(&config.source)?;
        let target = Database::open(&config.target)?;
        Ok(Self { source, target })
    }
}

/// Target store of a spreadsheet import.
pub struct SpreadsheetSession {
    pub target: Database,
}

impl SpreadsheetSession {
    pub fn open(config: &Config) -> Result<Self> {
        Ok(Self {
            target: Database::open(&config.target)?,
        })
    }
}
