use std::process::Command;

fn run(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_chronicle-migrate"))
        .args(["--config", "/nonexistent/migrate.yaml"])
        .args(args)
        .output()
        .expect("spawn chronicle-migrate")
}

#[test]
fn list_prints_both_categories() {
    let out = run(&["list"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains(
        "Migrated codelists: activity, asset, commodity, currency, domain, location, staff, stay, type, unit"
    ));
    assert!(stdout.contains("Migrated agendas: asset, event, expense, fuel, income, vacation"));
}

#[test]
fn workbooks_lists_layouts() {
    let out = run(&["workbooks"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    for id in [
        "chalupa-events",
        "chalupa-expenses",
        "chalupa-vacations",
        "konopa-income",
        "konopa-rehearsal",
        "extra-incomes",
    ] {
        assert!(stdout.contains(id), "missing {id}");
    }
}

#[test]
fn migrate_without_config_fails_at_startup() {
    let out = run(&["migrate", "-c", "*"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Failed to load config"));
}

#[test]
fn unknown_verbosity_is_rejected() {
    let out = run(&["--verbosity", "loud", "list"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("invalid value 'loud'"));

    let out = run(&["--verbosity", "debug", "--log-format", "json", "list"]);
    assert!(out.status.success());
}
