use anyhow::Context;
use chronicle_migrate::agenda::layouts;
use chronicle_migrate::config::NamingConfig;
use chronicle_migrate::workbook::open_workbook;
use chronicle_migrate::{
    Category, Config, Orchestrator, Registry, RelationalSession, Selector, SpreadsheetSession,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chronicle-migrate")]
#[command(about = "Migrate legacy codelists and agendas, import spreadsheet agendas")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(long, default_value = "migrate.yaml")]
    config: PathBuf,

    /// Log verbosity; RUST_LOG overrides it when set
    #[arg(long, value_enum, default_value_t = Verbosity::Info)]
    verbosity: Verbosity,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Print the run report as JSON to stdout
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Verbosity {
    Debug,
    Info,
    Warn,
    Error,
}

impl Verbosity {
    fn directive(self) -> &'static str {
        match self {
            Verbosity::Debug => "debug",
            Verbosity::Info => "info",
            Verbosity::Warn => "warn",
            Verbosity::Error => "error",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate codelists and/or agendas from the legacy database
    Migrate {
        /// Codelist roots, comma separated, or `all` (`*`) for every codelist
        #[arg(short, long)]
        codelists: Option<String>,

        /// Agenda roots, comma separated, or `all` (`*`) for every agenda
        #[arg(short, long)]
        agendas: Option<String>,

        /// Acting user id
        #[arg(short, long)]
        user: Option<i64>,
    },

    /// List migrated codelists and agendas
    List,

    /// Import a spreadsheet agenda
    Import {
        /// Workbook layout id, see `workbooks`
        workbook: String,

        /// Spreadsheet file; defaults to the layout's file name
        path: Option<PathBuf>,

        /// Acting user id
        #[arg(short, long)]
        user: Option<i64>,
    },

    /// List known workbook layouts
    Workbooks,

    /// Compare latest changes of source and target tables
    Status {
        #[arg(long)]
        codelists: bool,

        #[arg(long)]
        agendas: bool,
    },

    /// Reassign ownership of all target tables
    Owners {
        #[arg(long)]
        codelists: bool,

        #[arg(long)]
        agendas: bool,

        /// New owner user id
        #[arg(short, long)]
        user: i64,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbosity, cli.log_format);

    match cli.command {
        Commands::List => {
            let registry = Registry::builtin(&naming(&cli.config)?);
            for category in [Category::Codelist, Category::Agenda] {
                println!(
                    "Migrated {}: {}",
                    category.plural(),
                    registry.list_by_category(category).join(", ")
                );
            }
        }
        Commands::Workbooks => {
            for layout in layouts::builtin() {
                println!(
                    "{:<18}{:<26}{}",
                    layout.id, layout.default_file, layout.agenda
                );
            }
        }
        Commands::Migrate {
            codelists,
            agendas,
            user,
        } => {
            if codelists.is_none() && agendas.is_none() {
                warn!("Nothing to migrate, see --help");
                return Ok(());
            }
            let config = load_config(&cli.config)?;
            let user = user.unwrap_or(config.params.user);
            let session = RelationalSession::open(&config).context("Failed to open databases")?;
            let orchestrator = Orchestrator::new(&config);
            let mut reports = Vec::new();
            for (category, selector) in [
                (Category::Codelist, codelists),
                (Category::Agenda, agendas),
            ] {
                if let Some(selector) = selector {
                    let report =
                        orchestrator.migrate(&session, category, &Selector::parse(&selector), user);
                    reports.push(report);
                }
            }
            if cli.json {
                print_json(&reports)?;
            }
        }
        Commands::Import {
            workbook,
            path,
            user,
        } => {
            let config = load_config(&cli.config)?;
            let user = user.unwrap_or(config.params.user);
            let layout = layouts::find(&workbook)
                .with_context(|| format!("Unknown workbook {workbook}, see `workbooks`"))?;
            let path = path.unwrap_or_else(|| PathBuf::from(layout.default_file));
            let book = open_workbook(&path)
                .with_context(|| format!("Failed to open workbook {}", path.display()))?;
            let session = SpreadsheetSession::open(&config).context("Failed to open target database")?;
            info!("Importing {} as {}", path.display(), layout.id);
            let report = Orchestrator::new(&config).import_workbook(&session, &layout, &book, user);
            if cli.json {
                print_json(&report)?;
            }
        }
        Commands::Status { codelists, agendas } => {
            let config = load_config(&cli.config)?;
            let session = RelationalSession::open(&config).context("Failed to open databases")?;
            let orchestrator = Orchestrator::new(&config);
            let mut rows = Vec::new();
            for (category, wanted) in [(Category::Codelist, codelists), (Category::Agenda, agendas)] {
                if !wanted {
                    continue;
                }
                let freshness = orchestrator.freshness(&session, category);
                if !cli.json {
                    println!("{}:", capitalize(category.plural()));
                    for row in &freshness {
                        println!("{}", row);
                    }
                    println!();
                }
                rows.extend(freshness);
            }
            if !codelists && !agendas {
                warn!("Nothing to show, see --help");
            } else if cli.json {
                print_json(&rows)?;
            }
        }
        Commands::Owners {
            codelists,
            agendas,
            user,
        } => {
            let config = load_config(&cli.config)?;
            let session = SpreadsheetSession::open(&config).context("Failed to open target database")?;
            let orchestrator = Orchestrator::new(&config);
            for (category, wanted) in [(Category::Codelist, codelists), (Category::Agenda, agendas)] {
                if wanted {
                    orchestrator.reassign_owner(&session.target, category, user);
                }
            }
            if !codelists && !agendas {
                warn!("Nothing to update, see --help");
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}

/// Table naming from the config file when there is one, else the defaults.
fn naming(path: &Path) -> anyhow::Result<NamingConfig> {
    if path.exists() {
        Ok(load_config(path)?.naming)
    } else {
        Ok(NamingConfig::default())
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    println!("{}", json);
    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn setup_logging(verbosity: Verbosity, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}
