//!
//! mapd-sql binary
//! ---------------
//! Validates one SQL query against a JSON catalog and prints the expanded SQL,
//! its row type and, on request, the relational algebra and execution plan.

use std::io::Read;

use anyhow::{Context, Result};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

use mapd_sql::cli::{build_validator, get_terminal_width, load_catalog, render_error, render_report, run_query};
use mapd_sql::config::{AppConfig, CliAction};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [flags] -q \"<SQL>\"\n  {program} [flags] < query.sql\n\nFlags:\n  --catalog <path>        JSON catalog file (env MAPD_SQL_CATALOG)\n  --database <db>         Default database (env MAPD_SQL_DATABASE)\n  --schema <sch>          Default schema (env MAPD_SQL_SCHEMA)\n  --conformance <name>    default | lenient | strict_92 | strict_2003 | mysql_5 (env MAPD_SQL_CONFORMANCE)\n  --no-expand             Keep identifiers as written (env MAPD_SQL_EXPAND_IDENTIFIERS=false)\n  --rel                   Print the relational algebra JSON\n  --plan                  Print the execution plan\n  --json                  JSON output (env MAPD_SQL_OUTPUT=json)\n  -q, --query <SQL>       Query text; read from stdin when omitted\n  -h, --help              Show this help\n\nLogging is controlled by RUST_LOG (default: info)."
    );
}

fn run(cfg: &AppConfig) -> Result<i32> {
    let sql = match &cfg.query {
        Some(q) => q.clone(),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("reading query from stdin")?;
            buf
        }
    };
    debug!(target: "mapd_sql::main", "config: {:?}", cfg);
    let outcome = load_catalog(cfg)
        .and_then(|catalog| build_validator(cfg, std::sync::Arc::new(catalog)))
        .and_then(|validator| run_query(cfg, &validator, &sql))
        .and_then(|report| render_report(cfg, &report, get_terminal_width()));
    match outcome {
        Ok(text) => {
            println!("{}", text);
            Ok(0)
        }
        Err(e) => {
            eprintln!("{}", render_error(cfg, &e));
            Ok(e.exit_code())
        }
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut args: Vec<String> = std::env::args().collect();
    let program = if args.is_empty() { "mapd-sql".to_string() } else { args.remove(0) };

    let action = AppConfig::from_env().and_then(|cfg| cfg.apply_args(&args));
    let code = match action {
        Ok(CliAction::Help) => {
            print_usage(&program);
            0
        }
        Ok(CliAction::Run(cfg)) => run(&cfg)?,
        Err(e) => {
            eprintln!("ERROR {}: {}", e.sqlstate(), e);
            print_usage(&program);
            e.exit_code()
        }
    };
    std::process::exit(code);
}
