//! SQL validator: resolves a parsed `SELECT` against the catalog, derives types,
//! checks grouping rules and produces the validated (optionally identifier-expanded)
//! query together with its typed, bound form.
//!
//! The base validator keeps identifiers as written. A validator built with
//! [`SqlValidator::expanding`] rewrites every column reference to `alias.column`
//! and every table to `database.schema.table AS alias`; everything else
//! (errors, row types, the bound query) is identical.

mod expr;
mod scope;
mod select;
mod typed;

use std::sync::Arc;

use tracing::debug;

use crate::catalog::CatalogReader;
use crate::conformance::Conformance;
use crate::error::AppResult;
use crate::operators::OperatorTable;
use crate::query::{self, Select};
use crate::types::TypeFactory;

pub use scope::{ResolvedColumn, Scope, ScopeTable};
pub use typed::{BoundOrder, BoundSelect, BoundTable, Field, OrderTarget, TypedExpr, TypedExprKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Rewrite column references and table names into fully qualified form.
    pub expand_identifiers: bool,
    /// When expanding, ORDER BY references to select items by alias or ordinal are
    /// replaced with the referenced expression.
    pub column_reference_expansion: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self { expand_identifiers: false, column_reference_expansion: true }
    }
}

impl ValidatorConfig {
    pub fn expanding() -> Self {
        Self { expand_identifiers: true, ..Self::default() }
    }

    pub fn with_expand_identifiers(mut self, expand: bool) -> Self {
        self.expand_identifiers = expand;
        self
    }

    pub fn with_column_reference_expansion(mut self, expand: bool) -> Self {
        self.column_reference_expansion = expand;
        self
    }
}

/// Result of validating one query.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedQuery {
    /// The query after star expansion and, when enabled, identifier expansion.
    pub select: Select,
    pub row_type: Vec<Field>,
    pub bound: BoundSelect,
    /// Whether identifiers in `select` were expanded.
    pub expanded: bool,
}

impl ValidatedQuery {
    pub fn sql(&self) -> String { self.select.to_string() }
}

pub struct SqlValidator {
    op_table: Arc<dyn OperatorTable>,
    catalog: Arc<dyn CatalogReader>,
    type_factory: Arc<dyn TypeFactory>,
    conformance: Conformance,
    config: ValidatorConfig,
}

impl SqlValidator {
    /// Base validator; identifiers are left as written.
    pub fn new(
        op_table: Arc<dyn OperatorTable>,
        catalog: Arc<dyn CatalogReader>,
        type_factory: Arc<dyn TypeFactory>,
        conformance: Conformance,
    ) -> Self {
        Self::with_config(op_table, catalog, type_factory, conformance, ValidatorConfig::default())
    }

    pub fn with_config(
        op_table: Arc<dyn OperatorTable>,
        catalog: Arc<dyn CatalogReader>,
        type_factory: Arc<dyn TypeFactory>,
        conformance: Conformance,
        config: ValidatorConfig,
    ) -> Self {
        Self { op_table, catalog, type_factory, conformance, config }
    }

    /// Validator that always expands identifiers. The inputs are used exactly as
    /// given for [`SqlValidator::new`].
    pub fn expanding(
        op_table: Arc<dyn OperatorTable>,
        catalog: Arc<dyn CatalogReader>,
        type_factory: Arc<dyn TypeFactory>,
        conformance: Conformance,
    ) -> Self {
        Self::with_config(op_table, catalog, type_factory, conformance, ValidatorConfig::expanding())
    }

    pub fn should_expand_identifiers(&self) -> bool { self.config.expand_identifiers }

    pub fn conformance(&self) -> Conformance { self.conformance }

    pub fn config(&self) -> &ValidatorConfig { &self.config }

    pub fn operator_table(&self) -> &Arc<dyn OperatorTable> { &self.op_table }

    pub fn catalog_reader(&self) -> &Arc<dyn CatalogReader> { &self.catalog }

    pub fn type_factory(&self) -> &Arc<dyn TypeFactory> { &self.type_factory }

    pub fn validate(&self, select: &Select) -> AppResult<ValidatedQuery> {
        debug!(target: "mapd_sql::validate", "validating (expand={}, conformance={}): {}", self.should_expand_identifiers(), self.conformance, select);
        let validated = self.validate_select(select)?;
        debug!(target: "mapd_sql::validate", "validated: {}", validated.select);
        Ok(validated)
    }

    /// Parse under this validator's conformance, then validate.
    pub fn validate_sql(&self, sql: &str) -> AppResult<ValidatedQuery> {
        let select = query::parse_with_conformance(sql, self.conformance)?;
        self.validate(&select)
    }
}
