use chronicle_migrate::value::Value;
use chronicle_migrate::{Category, Config, Orchestrator, RelationalSession, Selector};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

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

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn legacy_db(path: &Path) {
    let conn = Connection::open(path).expect("open source");
    for (root, _) in CODELISTS {
        conn.execute_batch(&format!(
            "CREATE TABLE jos_codelist_{root}(
                id INTEGER PRIMARY KEY, created TEXT, modified TEXT, published INTEGER,
                code_name TEXT, code_abbr TEXT, code_desc TEXT);
             INSERT INTO jos_codelist_{root} VALUES
                (1, '2010-01-01 10:00:00', NULL, 1, '{root} one', '{root}1', ''),
                (2, '2010-01-02 10:00:00', '2012-05-05 08:00:00', 1, '{root} two', '{root}2', 'x');"
        ))
        .expect("legacy codelist");
    }
    conn.execute_batch(
        "CREATE TABLE jos_familylist_expense(
            id INTEGER PRIMARY KEY, created TEXT, modified TEXT, published INTEGER,
            item_desc TEXT, item_date TEXT, item_name TEXT, item_units REAL,
            item_price_euro REAL, item_price_orig REAL, item_domain_id INTEGER,
            item_commodity_id INTEGER, item_type_id INTEGER, item_unit_id INTEGER,
            item_currency_id INTEGER);
         INSERT INTO jos_familylist_expense VALUES
            (1, '2009-03-01 09:00:00', NULL, 1, '', '2009-03-01', 'Drevo', 3, 10.0, 0, 1, 2, 3, 4, 2),
            (2, '2008-03-01 09:00:00', '2008-04-01 09:00:00', 1, '', '2008-03-01', 'Farba', 1, 33.19, 1000, 1, 2, 3, 4, 1);",
    )
    .expect("legacy expenses");
}

fn target_db(path: &Path) {
    let conn = Connection::open(path).expect("open target");
    conn.execute_batch(
        "CREATE TABLE lgbj_gbjcodes_codebooks(
            alias TEXT, created_by INTEGER, modified_by INTEGER);",
    )
    .expect("register");
    for (_, target) in CODELISTS {
        conn.execute_batch(&format!(
            "CREATE TABLE lgbj_gbjcodes_{target}(
                id INTEGER PRIMARY KEY, created TEXT, modified TEXT, state INTEGER,
                title TEXT NOT NULL, alias TEXT, description TEXT,
                params TEXT, metakey TEXT, metadesc TEXT, metadata TEXT,
                created_by INTEGER, modified_by INTEGER);
             INSERT INTO lgbj_gbjcodes_{target}(id, title) VALUES (99, 'stale');
             INSERT INTO lgbj_gbjcodes_codebooks(alias) VALUES ('{target}');"
        ))
        .expect("target codelist");
    }
    conn.execute_batch(
        "CREATE TABLE lgbj_gbjfamily_expenses(
            id INTEGER PRIMARY KEY, created TEXT, modified TEXT, state INTEGER,
            description TEXT, date_on TEXT, title TEXT, quantity REAL, price REAL,
            price_unit REAL, price_orig REAL, id_domain INTEGER, id_currency INTEGER,
            id_commodity INTEGER, id_type INTEGER, id_unit INTEGER,
            params TEXT, metakey TEXT, metadesc TEXT, metadata TEXT,
            created_by INTEGER, modified_by INTEGER);",
    )
    .expect("target expenses");
}

fn setup(prefix: &str) -> (PathBuf, Config) {
    let dir = temp_dir(prefix);
    let source = dir.join("legacy.sqlite3");
    let target = dir.join("chronicle.sqlite3");
    legacy_db(&source);
    target_db(&target);
    (dir, Config::new(source, target))
}

fn scalar(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |r| r.get(0)).expect(sql)
}

#[test]
fn all_codelists_truncate_copy_and_take_ownership() {
    let (dir, config) = setup("chronicle-codelists");
    let session = RelationalSession::open(&config).expect("open session");
    let report = Orchestrator::new(&config).migrate(
        &session,
        Category::Codelist,
        &Selector::parse("*"),
        820,
    );

    assert_eq!(report.outcomes.len(), CODELISTS.len());
    assert!(report.skipped.is_empty());
    assert!(report.all_succeeded());
    assert_eq!(report.rows_written(), 2 * CODELISTS.len());

    let conn = session.target.conn();
    for (root, target) in CODELISTS {
        let table = format!("lgbj_gbjcodes_{target}");
        assert_eq!(scalar(conn, &format!("SELECT COUNT(*) FROM {table}")), 2);
        assert_eq!(
            scalar(conn, &format!("SELECT COUNT(*) FROM {table} WHERE created_by = 820 AND modified_by = 820")),
            2
        );
        let title: String = conn
            .query_row(&format!("SELECT title FROM {table} WHERE id = 1"), [], |r| r.get(0))
            .expect("title");
        assert_eq!(title, format!("{root} one"));
        let metakey: String = conn
            .query_row(&format!("SELECT metakey FROM {table} WHERE id = 1"), [], |r| r.get(0))
            .expect("metakey");
        assert_eq!(metakey, "");
    }
    assert_eq!(
        scalar(conn, "SELECT COUNT(*) FROM lgbj_gbjcodes_codebooks WHERE created_by = 820"),
        CODELISTS.len() as i64
    );

    drop(session);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn unknown_roots_are_skipped_and_known_ones_migrate() {
    let (dir, config) = setup("chronicle-selected");
    let session = RelationalSession::open(&config).expect("open session");
    let report = Orchestrator::new(&config).migrate(
        &session,
        Category::Codelist,
        &Selector::parse("planet,unit"),
        5,
    );
    assert_eq!(report.skipped, vec!["planet".to_string()]);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].target, "lgbj_gbjcodes_units");
    assert_eq!(report.outcomes[0].rows_written, 2);

    let untouched = scalar(
        session.target.conn(),
        "SELECT COUNT(*) FROM lgbj_gbjcodes_types WHERE id = 99",
    );
    assert_eq!(untouched, 1);

    drop(session);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn expense_agenda_derives_unit_and_original_prices() {
    let (dir, config) = setup("chronicle-expenses");
    let session = RelationalSession::open(&config).expect("open session");
    let report = Orchestrator::new(&config).migrate(
        &session,
        Category::Agenda,
        &Selector::parse("expense"),
        820,
    );
    assert!(report.all_succeeded());
    assert_eq!(report.outcomes[0].rows_read, 2);

    let rows = session
        .target
        .query_records(
            "SELECT id, modified, price_unit, price_orig FROM lgbj_gbjfamily_expenses ORDER BY id",
            &[],
        )
        .expect("query");
    assert_eq!(rows[0]["price_unit"], Value::Real(3.3333));
    assert_eq!(rows[0]["price_orig"], Value::Null);
    assert_eq!(rows[0]["modified"], Value::text("2009-03-01 09:00:00"));
    assert_eq!(rows[1]["price_unit"], Value::Null);
    assert_eq!(rows[1]["price_orig"], Value::Real(1000.0));

    drop(session);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn failed_batch_still_runs_ownership_update() {
    let (dir, config) = setup("chronicle-batch-failure");
    {
        let conn = Connection::open(&config.source.path).expect("open source");
        conn.execute(
            "INSERT INTO jos_codelist_unit (id, published, code_abbr) VALUES (3, 1, 'nameless')",
            [],
        )
        .expect("bad row");
    }
    let session = RelationalSession::open(&config).expect("open session");
    let report = Orchestrator::new(&config).migrate(
        &session,
        Category::Codelist,
        &Selector::parse("unit"),
        820,
    );

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.rows_read, 3);
    assert_eq!(outcome.rows_written, 0);
    assert_eq!(outcome.error_count, 1);
    assert!(!outcome.success);

    let conn = session.target.conn();
    // Truncated, batch rolled back, register row still stamped.
    assert_eq!(scalar(conn, "SELECT COUNT(*) FROM lgbj_gbjcodes_units"), 0);
    assert_eq!(
        scalar(
            conn,
            "SELECT COUNT(*) FROM lgbj_gbjcodes_codebooks WHERE alias = 'units' AND created_by = 820"
        ),
        1
    );

    drop(session);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn freshness_and_owner_reassignment() {
    let (dir, config) = setup("chronicle-status");
    let session = RelationalSession::open(&config).expect("open session");
    let orchestrator = Orchestrator::new(&config);

    let before = orchestrator.freshness(&session, Category::Codelist);
    assert_eq!(before.len(), CODELISTS.len());
    assert_eq!(before[0].source.count, Some(2));
    assert_eq!(before[0].verdict.marker(), "???");

    orchestrator.migrate(&session, Category::Codelist, &Selector::parse("all"), 820);
    let after = orchestrator.freshness(&session, Category::Codelist);
    assert!(after.iter().all(|r| r.verdict.marker() == "="));

    assert_eq!(
        orchestrator.reassign_owner(&session.target, Category::Codelist, 42),
        CODELISTS.len()
    );
    assert_eq!(
        scalar(
            session.target.conn(),
            "SELECT COUNT(*) FROM lgbj_gbjcodes_stays WHERE created_by = 42"
        ),
        2
    );
    // Only the expense agenda table exists in the target.
    assert_eq!(
        orchestrator.reassign_owner(&session.target, Category::Agenda, 42),
        1
    );

    drop(session);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn missing_target_database_is_reported() {
    let dir = temp_dir("chronicle-missing");
    let source = dir.join("legacy.sqlite3");
    legacy_db(&source);
    let config = Config::new(source, dir.join("absent.sqlite3"));
    match RelationalSession::open(&config) {
        Err(chronicle_migrate::MigrateError::DatabaseMissing { database }) => {
            assert_eq!(database, "absent")
        }
        Err(e) => panic!("unexpected error {e}"),
        Ok(_) => panic!("opened a missing target"),
    }
    let _ = std::fs::remove_dir_all(dir);
}
