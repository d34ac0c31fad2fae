//! Runtime configuration for the `mapd-sql` binary.
//!
//! Values come from the environment first and are then overridden by command
//! line flags:
//!
//! | Variable                      | Meaning                                  |
//! |-------------------------------|------------------------------------------|
//! | `MAPD_SQL_CATALOG`            | path of a JSON catalog file              |
//! | `MAPD_SQL_DATABASE`           | default database for unqualified tables  |
//! | `MAPD_SQL_SCHEMA`             | default schema for unqualified tables    |
//! | `MAPD_SQL_CONFORMANCE`        | `default`, `lenient`, `strict_92`, ...   |
//! | `MAPD_SQL_EXPAND_IDENTIFIERS` | `false`/`0` to keep identifiers as typed |
//! | `MAPD_SQL_OUTPUT`             | `json` for machine-readable output       |

use std::path::PathBuf;

use serde::Serialize;

use crate::conformance::Conformance;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    pub catalog: Option<PathBuf>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub conformance: Conformance,
    pub expand_identifiers: bool,
    pub output: OutputFormat,
    pub show_rel: bool,
    pub show_plan: bool,
    pub query: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog: None,
            database: None,
            schema: None,
            conformance: Conformance::Default,
            expand_identifiers: true,
            output: OutputFormat::Table,
            show_rel: false,
            show_plan: false,
            query: None,
        }
    }
}

/// Outcome of parsing the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum CliAction {
    Run(AppConfig),
    Help,
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(s: String) -> Option<String> {
    let t = s.trim();
    if t.is_empty() { None } else { Some(t.to_string()) }
}

impl AppConfig {
    /// Configuration from the process environment.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let conformance = match lookup("MAPD_SQL_CONFORMANCE").and_then(non_empty) {
            Some(c) => c.parse()?,
            None => Conformance::Default,
        };
        let expand_identifiers = match lookup("MAPD_SQL_EXPAND_IDENTIFIERS").and_then(non_empty) {
            Some(v) => parse_bool(&v).ok_or_else(|| {
                AppError::config(
                    "invalid_expand_identifiers".to_string(),
                    format!("MAPD_SQL_EXPAND_IDENTIFIERS must be true or false, got '{}'", v),
                )
            })?,
            None => true,
        };
        let json = lookup("MAPD_SQL_OUTPUT").map(|v| v.eq_ignore_ascii_case("json")).unwrap_or(false);
        let cfg = AppConfig {
            catalog: lookup("MAPD_SQL_CATALOG").and_then(non_empty).map(PathBuf::from),
            database: lookup("MAPD_SQL_DATABASE").and_then(non_empty),
            schema: lookup("MAPD_SQL_SCHEMA").and_then(non_empty),
            conformance,
            expand_identifiers,
            output: if json { OutputFormat::Json } else { OutputFormat::Table },
            ..AppConfig::default()
        };
        Ok(cfg)
    }

    /// Apply command line flags on top of `self`. `args` excludes the program name.
    pub fn apply_args(mut self, args: &[String]) -> AppResult<CliAction> {
        let mut i = 0;
        let value = |i: usize, flag: &str| -> AppResult<String> {
            args.get(i + 1)
                .cloned()
                .ok_or_else(|| AppError::config("missing_argument".to_string(), format!("{} requires a value", flag)))
        };
        while i < args.len() {
            match args[i].as_str() {
                "-h" | "--help" => return Ok(CliAction::Help),
                "--catalog" => {
                    self.catalog = Some(PathBuf::from(value(i, "--catalog")?));
                    i += 2;
                }
                "--database" => {
                    self.database = Some(value(i, "--database")?);
                    i += 2;
                }
                "--schema" => {
                    self.schema = Some(value(i, "--schema")?);
                    i += 2;
                }
                "--conformance" => {
                    self.conformance = value(i, "--conformance")?.parse()?;
                    i += 2;
                }
                "-q" | "--query" => {
                    self.query = Some(value(i, "--query")?);
                    i += 2;
                }
                "--no-expand" => {
                    self.expand_identifiers = false;
                    i += 1;
                }
                "--rel" => {
                    self.show_rel = true;
                    i += 1;
                }
                "--plan" => {
                    self.show_plan = true;
                    i += 1;
                }
                "--json" => {
                    self.output = OutputFormat::Json;
                    i += 1;
                }
                other if other.starts_with('-') => {
                    return Err(AppError::config("unknown_argument".to_string(), format!("Unknown flag '{}'", other)));
                }
                other => {
                    // a bare trailing argument is the query text
                    if self.query.is_some() {
                        return Err(AppError::config("unknown_argument".to_string(), format!("Unexpected argument '{}'", other)));
                    }
                    self.query = Some(other.to_string());
                    i += 1;
                }
            }
        }
        Ok(CliAction::Run(self))
    }
}
