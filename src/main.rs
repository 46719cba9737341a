use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use dbmend_lib::audit::SqlAudit;
use dbmend_lib::console::{render_table, Console, TerminalConsole};
use dbmend_lib::pipeline::{fatal_guidance, ExecutionMode, Orchestrator};
use dbmend_lib::{AppError, CheckRegistry, SchemaDocument, SqliteStore};

/// Exit code for errors that stop the run before a verdict.
const FATAL_EXIT_CODE: i32 = 3;

#[derive(Debug, Parser)]
#[command(
    name = "dbmend",
    about = "Audit and repair referential integrity of page trees, translations and workspace overlays",
    version
)]
struct Cli {
    /// SQLite database to inspect.
    #[arg(long, value_name = "PATH", required_unless_present = "list")]
    db: Option<PathBuf>,
    /// JSON document describing the tables and their capability fields.
    #[arg(long, value_name = "PATH", required_unless_present = "list")]
    schema: Option<PathBuf>,
    /// check (read only), execute (repair once) or interactive.
    #[arg(long, default_value = "check")]
    mode: ExecutionMode,
    /// Append every executed statement to this file.
    #[arg(long, value_name = "PATH")]
    sql_log: Option<PathBuf>,
    /// Run only these checks and the checks they require.
    #[arg(long = "only", value_name = "CHECK_ID")]
    only: Vec<String>,
    /// List the checks in execution order and exit.
    #[arg(long)]
    list: bool,
    /// Print the run summary as JSON after the run.
    #[arg(long)]
    json: bool,
    /// Emit log lines as JSON.
    #[arg(long)]
    log_json: bool,
}

fn main() {
    let cli = Cli::parse();
    dbmend_lib::logging::init(cli.log_json);

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            if let Some(guidance) = err.downcast_ref::<AppError>().and_then(fatal_guidance) {
                eprintln!("{guidance}");
            }
            eprintln!("Error: {err:#}");
            process::exit(FATAL_EXIT_CODE);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let registry = CheckRegistry::standard().context("build check catalogue")?;
    if cli.list {
        print_catalogue(&registry);
        return Ok(0);
    }

    let db_path = cli.db.context("--db is required")?;
    let schema_path = cli.schema.context("--schema is required")?;
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("open database {}", db_path.display()))?;
    let document = SchemaDocument::load(&schema_path)
        .with_context(|| format!("load schema {}", schema_path.display()))?;
    let (schema, warnings) = document
        .reconcile(&store)
        .context("reconcile schema with database")?;

    let checks = registry.select(&cli.only).context("select checks")?;
    let audit = match cli.sql_log {
        Some(path) => SqlAudit::to_file(path),
        None => SqlAudit::disabled(),
    };

    let mut console = TerminalConsole::new();
    if cli.mode == ExecutionMode::Interactive {
        for warning in &warnings {
            console.warning(warning);
        }
    }
    let mut orchestrator =
        Orchestrator::new(&store, &schema, &mut console, cli.mode).with_audit(audit);
    let summary = orchestrator.run(&checks).context("run checks")?;

    if cli.json {
        let serialized =
            serde_json::to_string_pretty(&summary).context("serialize run summary")?;
        println!("{serialized}");
    }
    Ok(summary.exit_code())
}

fn print_catalogue(registry: &CheckRegistry) {
    let headers = ["#", "id", "class", "title"].map(String::from);
    let rows: Vec<Vec<String>> = registry
        .checks()
        .enumerate()
        .map(|(idx, check)| {
            vec![
                (idx + 1).to_string(),
                check.id().to_string(),
                check.class().as_str().to_string(),
                check.title().to_string(),
            ]
        })
        .collect();
    for line in render_table(&headers, &rows) {
        println!("{line}");
    }
}
