//! Static source→target descriptions of every migrated codelist and agenda.
//!
//! Each [`TableMapping`] knows how to select a legacy table (with column
//! aliasing done in SQL) and how to compute every target column from the
//! selected row. Derived columns are pure functions of the row, so the whole
//! registry can be exercised without a database.

use crate::config::NamingConfig;
use crate::error::{MigrateError, Result};
use crate::value::{round_to, Record, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Codelist,
    Agenda,
}

impl Category {
    pub fn plural(self) -> &'static str {
        match self {
            Category::Codelist => "codelists",
            Category::Agenda => "agendas",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Codelist => f.write_str("codelist"),
            Category::Agenda => f.write_str("agenda"),
        }
    }
}

/// One selected legacy column, `expr AS alias`.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceColumn {
    pub expr: String,
    pub alias: String,
}

/// How a target column value is derived from a selected source row.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Pass a selected field through unchanged.
    Field(String),
    /// Empty string; the target schema requires these columns non-null.
    Blank,
    /// First field unless NULL, else the second.
    Coalesce(String, String),
    /// NULL for a falsy value (NULL, 0, empty), else the value.
    NullIfFalsy(String),
    /// Price per unit, NULL for a quantity of 0 or 1.
    UnitPrice { price: String, quantity: String },
    /// Inclusive number of days between two dates.
    DaySpan { from: String, to: String },
}

impl Expr {
    pub fn eval(&self, row: &Record) -> Value {
        match self {
            Expr::Field(name) => field(row, name),
            Expr::Blank => Value::text(""),
            Expr::Coalesce(first, second) => {
                let v = field(row, first);
                if v.is_null() {
                    field(row, second)
                } else {
                    v
                }
            }
            Expr::NullIfFalsy(name) => {
                let v = field(row, name);
                if v.is_falsy() {
                    Value::Null
                } else {
                    v
                }
            }
            Expr::UnitPrice { price, quantity } => {
                let Some(q) = field(row, quantity).as_f64() else {
                    return Value::Null;
                };
                if q == 0.0 || q == 1.0 {
                    return Value::Null;
                }
                match field(row, price).as_f64() {
                    Some(p) => Value::Real(round_to(p / q, 4)),
                    None => Value::Null,
                }
            }
            Expr::DaySpan { from, to } => {
                match (field(row, from).as_date(), field(row, to).as_date()) {
                    (Some(start), Some(stop)) => Value::Integer((stop - start).num_days() + 1),
                    _ => Value::Null,
                }
            }
        }
    }
}

fn field(row: &Record, name: &str) -> Value {
    row.get(name).cloned().unwrap_or(Value::Null)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetColumn {
    pub name: String,
    pub expr: Expr,
}

/// Migration description of one legacy table.
#[derive(Debug, Clone)]
pub struct TableMapping {
    pub category: Category,
    pub root: String,
    pub source_identifier: String,
    pub target_identifier: String,
    pub source_columns: Vec<SourceColumn>,
    pub target_columns: Vec<TargetColumn>,
    /// Register table whose row for this table carries ownership metadata too.
    pub registration_key: Option<String>,
    target_prefix: String,
}

impl TableMapping {
    pub fn select_sql(&self) -> String {
        let fields = self
            .source_columns
            .iter()
            .map(|c| {
                if c.expr == c.alias {
                    c.expr.clone()
                } else {
                    format!("{} AS {}", c.expr, c.alias)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("SELECT {} FROM {}", fields, self.source_identifier)
    }

    pub fn insert_sql(&self) -> String {
        insert_sql(
            &self.target_identifier,
            self.target_columns.iter().map(|c| c.name.as_str()),
        )
    }

    /// Target column values for one source row, in `target_columns` order.
    pub fn evaluate(&self, row: &Record) -> Vec<Value> {
        self.target_columns.iter().map(|c| c.expr.eval(row)).collect()
    }

    /// Alias of this table's row in the register table.
    pub fn register_alias(&self) -> &str {
        self.target_identifier
            .strip_prefix(self.target_prefix.as_str())
            .unwrap_or(&self.target_identifier)
    }

    pub fn selects(&self, alias: &str) -> bool {
        self.source_columns.iter().any(|c| c.alias == alias)
    }
}

/// `INSERT INTO table (a, b) VALUES (?1, ?2)`
pub fn insert_sql<'a>(table: &str, columns: impl IntoIterator<Item = &'a str>) -> String {
    let columns: Vec<&str> = columns.into_iter().collect();
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders
    )
}

/// All known table mappings, in insertion order.
#[derive(Debug, Clone)]
pub struct Registry {
    mappings: Vec<TableMapping>,
}

const CODELISTS: &[(&str, &str)] = &[
    ("activity", "activities"),
    ("asset", "assets"),
    ("commodity", "commodities"),
    ("currency", "currencies"),
    ("domain", "domains"),
    ("location", "locations"),
    ("staff", "staffs"),
    ("stay", "stays"),
    ("type", "types"),
    ("unit", "units"),
];

impl Registry {
    pub fn builtin(naming: &NamingConfig) -> Self {
        let register = format!("{}{}", naming.target_codelist_prefix, naming.codelist_register);
        let mut mappings: Vec<TableMapping> = CODELISTS
            .iter()
            .map(|(root, target)| codelist(naming, root, target, &register))
            .collect();

        mappings.push(agenda(
            naming,
            "asset",
            "assets",
            &[
                ("item_name", "title"),
                ("item_value_euro", "value"),
                ("item_price_euro", "price"),
                ("item_price_orig", "price_orig"),
                ("item_currency_id", "id_currency"),
                ("item_domain_id", "id_domain"),
                ("item_asset_id", "id_asset"),
            ],
            vec![
                pass("title"),
                pass("value"),
                pass("price"),
                col("price_orig", Expr::NullIfFalsy("price_orig".into())),
                pass("id_domain"),
                pass("id_currency"),
                pass("id_asset"),
            ],
        ));
        mappings.push(agenda(
            naming,
            "event",
            "events",
            &[
                ("item_name", "title"),
                ("item_domain_id", "id_domain"),
                ("item_activity_id", "id_activity"),
            ],
            vec![pass("title"), pass("id_domain"), pass("id_activity")],
        ));
        mappings.push(agenda(
            naming,
            "expense",
            "expenses",
            &[
                ("item_name", "title"),
                ("item_units", "quantity"),
                ("item_price_euro", "price"),
                ("item_price_orig", "price_orig"),
                ("item_domain_id", "id_domain"),
                ("item_commodity_id", "id_commodity"),
                ("item_type_id", "id_type"),
                ("item_unit_id", "id_unit"),
                ("item_currency_id", "id_currency"),
            ],
            vec![
                pass("title"),
                pass("quantity"),
                pass("price"),
                col(
                    "price_unit",
                    Expr::UnitPrice {
                        price: "price".into(),
                        quantity: "quantity".into(),
                    },
                ),
                col("price_orig", Expr::NullIfFalsy("price_orig".into())),
                pass("id_domain"),
                pass("id_currency"),
                pass("id_commodity"),
                pass("id_type"),
                pass("id_unit"),
            ],
        ));
        mappings.push(agenda(
            naming,
            "fuel",
            "fuels",
            &[
                ("item_volume", "quantity"),
                ("item_tacho", "tacho"),
                ("item_period", "period"),
                ("item_distance", "distance"),
                ("item_consumption", "consumption"),
                ("item_domain_id", "id_domain"),
            ],
            vec![
                pass("quantity"),
                pass("tacho"),
                pass("period"),
                pass("distance"),
                pass("consumption"),
                pass("id_domain"),
            ],
        ));
        mappings.push(agenda(
            naming,
            "income",
            "incomes",
            &[
                ("item_name", "title"),
                ("item_price_euro", "price"),
                ("item_price_orig", "price_orig"),
                ("item_domain_id", "id_domain"),
                ("item_currency_id", "id_currency"),
                ("item_asset_id", "id_asset"),
            ],
            vec![
                pass("title"),
                pass("price"),
                col("price_orig", Expr::NullIfFalsy("price_orig".into())),
                pass("id_domain"),
                pass("id_currency"),
                pass("id_asset"),
            ],
        ));
        mappings.push(agenda(
            naming,
            "vacation",
            "vacations",
            &[
                ("item_name", "title"),
                ("item_date1", "date_off"),
                ("item_stay_id", "id_stay"),
                ("item_staff_id", "id_staff"),
            ],
            vec![
                pass("title"),
                pass("date_off"),
                col(
                    "period",
                    Expr::DaySpan {
                        from: "date_on".into(),
                        to: "date_off".into(),
                    },
                ),
                pass("id_stay"),
                pass("id_staff"),
            ],
        ));

        Self { mappings }
    }

    pub fn mappings(&self) -> &[TableMapping] {
        &self.mappings
    }

    pub fn resolve_source(&self, category: Category, root: &str) -> Result<&TableMapping> {
        self.mappings
            .iter()
            .find(|m| m.category == category && m.root == root)
            .ok_or_else(|| MigrateError::UnknownTable(format!("{category} {root}")))
    }

    pub fn resolve_target(&self, target_identifier: &str) -> Result<&TableMapping> {
        self.mappings
            .iter()
            .find(|m| m.target_identifier == target_identifier)
            .ok_or_else(|| MigrateError::UnknownTable(target_identifier.to_string()))
    }

    /// Root names of a category in registry order (not sorted).
    pub fn list_by_category(&self, category: Category) -> Vec<&str> {
        self.mappings
            .iter()
            .filter(|m| m.category == category)
            .map(|m| m.root.as_str())
            .collect()
    }

    pub fn list_by_prefix(&self, category: Category, prefix: &str) -> Vec<&str> {
        self.list_by_category(category)
            .into_iter()
            .filter(|root| root.starts_with(prefix))
            .collect()
    }
}

fn pass(name: &str) -> TargetColumn {
    col(name, Expr::Field(name.into()))
}

fn col(name: &str, expr: Expr) -> TargetColumn {
    TargetColumn {
        name: name.into(),
        expr,
    }
}

fn blanks() -> Vec<TargetColumn> {
    ["params", "metakey", "metadesc", "metadata"]
        .into_iter()
        .map(|name| col(name, Expr::Blank))
        .collect()
}

fn source(pairs: &[(&str, &str)]) -> Vec<SourceColumn> {
    pairs
        .iter()
        .map(|(expr, alias)| SourceColumn {
            expr: (*expr).into(),
            alias: (*alias).into(),
        })
        .collect()
}

fn codelist(naming: &NamingConfig, root: &str, target: &str, register: &str) -> TableMapping {
    let mut target_columns = blanks();
    target_columns.extend(
        ["id", "created", "modified", "state", "description", "title", "alias"]
            .into_iter()
            .map(pass),
    );
    TableMapping {
        category: Category::Codelist,
        root: root.into(),
        source_identifier: format!("{}{}", naming.source_codelist_prefix, root),
        target_identifier: format!("{}{}", naming.target_codelist_prefix, target),
        source_columns: source(&[
            ("id", "id"),
            ("created", "created"),
            ("modified", "modified"),
            ("published", "state"),
            ("code_name", "title"),
            ("code_abbr", "alias"),
            ("code_desc", "description"),
        ]),
        target_columns,
        registration_key: Some(register.into()),
        target_prefix: naming.target_codelist_prefix.clone(),
    }
}

fn agenda(
    naming: &NamingConfig,
    root: &str,
    target: &str,
    extra_source: &[(&str, &str)],
    extra_target: Vec<TargetColumn>,
) -> TableMapping {
    let mut source_columns = source(&[
        ("id", "id"),
        ("created", "created"),
        ("modified", "modified"),
        ("published", "state"),
        ("item_desc", "description"),
        ("item_date", "date_on"),
    ]);
    source_columns.extend(source(extra_source));

    let mut target_columns = blanks();
    target_columns.extend(["id", "created", "state", "description"].into_iter().map(pass));
    target_columns.push(col(
        "modified",
        Expr::Coalesce("modified".into(), "created".into()),
    ));
    target_columns.push(pass("date_on"));
    target_columns.extend(extra_target);

    TableMapping {
        category: Category::Agenda,
        root: root.into(),
        source_identifier: format!("{}{}", naming.source_agenda_prefix, root),
        target_identifier: format!("{}{}", naming.target_agenda_prefix, target),
        source_columns,
        target_columns,
        registration_key: None,
        target_prefix: naming.target_agenda_prefix.clone(),
    }
}
