//! Command line driver: builds a validator from [`AppConfig`], runs one query
//! through validation, relational algebra and planning, and renders the result.

pub mod outputformatter;

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::{CatalogFile, CatalogReader, InMemoryCatalog};
use crate::config::{AppConfig, OutputFormat};
use crate::error::{AppError, AppResult};
use crate::ident::QueryDefaults;
use crate::operators::{ChainedOperatorTable, ListOperatorTable, OperatorTable, StandardOperatorTable};
use crate::plan::translate_query;
use crate::rel::{to_rel, RelPlan};
use crate::types::DefaultTypeFactory;
use crate::validator::{Field, SqlValidator, ValidatorConfig};

pub use outputformatter::{get_terminal_width, render_row_type, render_table};

/// Everything produced for one query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    pub sql: String,
    pub expanded: bool,
    pub row_type: Vec<Field>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel: Option<RelPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
}

/// Load the catalog named by `cfg`, or an empty one. `--database`/`--schema`
/// replace the file's defaults.
pub fn load_catalog(cfg: &AppConfig) -> AppResult<InMemoryCatalog> {
    let mut spec = match &cfg.catalog {
        Some(path) => read_catalog_file(path)?,
        None => CatalogFile::default(),
    };
    if let Some(db) = &cfg.database {
        spec.database = Some(db.clone());
    }
    if let Some(schema) = &cfg.schema {
        spec.schema = Some(schema.clone());
    }
    if cfg.catalog.is_none() {
        let d = QueryDefaults::from_options(spec.database.as_deref(), spec.schema.as_deref());
        return Ok(InMemoryCatalog::new(d));
    }
    InMemoryCatalog::from_file_spec(spec)
}

fn read_catalog_file(path: &Path) -> AppResult<CatalogFile> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        AppError::io("catalog_read".to_string(), format!("Failed to read catalog {}: {}", path.display(), e))
    })?;
    debug!(target: "mapd_sql::cli", "read catalog {}", path.display());
    Ok(serde_json::from_str(&text)?)
}

/// Validator over `catalog`, with the catalog's user functions chained after the
/// standard operators.
pub fn build_validator(cfg: &AppConfig, catalog: Arc<InMemoryCatalog>) -> AppResult<SqlValidator> {
    let mut ops: Arc<dyn OperatorTable> = StandardOperatorTable::shared();
    if !catalog.functions().is_empty() {
        let udfs = ListOperatorTable::new();
        for f in catalog.functions() {
            udfs.add_spec(f)?;
        }
        ops = Arc::new(ChainedOperatorTable::new(vec![ops, Arc::new(udfs)]));
    }
    let reader: Arc<dyn CatalogReader> = catalog;
    let tf = Arc::new(DefaultTypeFactory::new());
    let validator = if cfg.expand_identifiers {
        SqlValidator::expanding(ops, reader, tf, cfg.conformance)
    } else {
        SqlValidator::with_config(ops, reader, tf, cfg.conformance, ValidatorConfig::default())
    };
    Ok(validator)
}

/// Validate `sql`, then optionally lower it to relational algebra and plan it.
pub fn run_query(cfg: &AppConfig, validator: &SqlValidator, sql: &str) -> AppResult<QueryReport> {
    let validated = validator.validate_sql(sql)?;
    let needs_rel = cfg.show_rel || cfg.show_plan;
    let rel = if needs_rel { Some(to_rel(&validated)?) } else { None };
    let plan = match (&rel, cfg.show_plan) {
        (Some(r), true) => Some(translate_query(&r.to_json()?, validator.catalog_reader().as_ref())?.to_string()),
        _ => None,
    };
    info!(target: "mapd_sql::cli", "validated query with {} output columns", validated.row_type.len());
    Ok(QueryReport {
        sql: validated.sql(),
        expanded: validated.expanded,
        row_type: validated.row_type,
        rel: if cfg.show_rel { rel } else { None },
        plan,
    })
}

/// Text for a report in the configured output format.
pub fn render_report(cfg: &AppConfig, report: &QueryReport, termw: usize) -> AppResult<String> {
    if cfg.output == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(report)?);
    }
    let mut out = vec![report.sql.clone(), String::new(), render_row_type(&report.row_type, termw)];
    if let Some(rel) = &report.rel {
        out.push(String::new());
        out.push(rel.to_json_pretty()?);
    }
    if let Some(plan) = &report.plan {
        out.push(String::new());
        out.push(plan.trim_end().to_string());
    }
    Ok(out.join("\n"))
}

/// Error text in the configured output format.
pub fn render_error(cfg: &AppConfig, err: &AppError) -> String {
    if cfg.output == OutputFormat::Json {
        let v = serde_json::json!({ "error": err, "sqlstate": err.sqlstate() });
        return v.to_string();
    }
    format!("ERROR {}: {}", err.sqlstate(), err)
}
