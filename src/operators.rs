//! Operator tables: the registry of operators, functions and aggregates the
//! validator may call, with their operand checks and return type inference.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::types::{RelDataType, SqlType, TypeFactory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorKind {
    Binary,
    Prefix,
    Postfix,
    Function,
    Aggregate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandFamily {
    Any,
    Numeric,
    Integer,
    // All operands must share a common type
    Comparable,
    Boolean,
    Character,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnRule {
    Boolean,
    LeastRestrictive,
    FirstArg,
    // Sum of character lengths when known, TEXT otherwise
    Concat,
    Fixed(SqlType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullPolicy {
    // Nullable when any operand is nullable
    Any,
    // Nullable only when every operand is nullable
    All,
    Never,
    Always,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlOperator {
    pub name: String,
    pub kind: OperatorKind,
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub operands: OperandFamily,
    pub returns: ReturnRule,
    pub nulls: NullPolicy,
}

impl SqlOperator {
    pub fn new(name: &str, kind: OperatorKind, min_args: usize, max_args: Option<usize>, operands: OperandFamily, returns: ReturnRule, nulls: NullPolicy) -> Self {
        Self { name: name.to_ascii_uppercase(), kind, min_args, max_args, operands, returns, nulls }
    }

    pub fn is_aggregate(&self) -> bool { self.kind == OperatorKind::Aggregate }

    fn arity_ok(&self, n: usize) -> bool {
        n >= self.min_args && self.max_args.map(|m| n <= m).unwrap_or(true)
    }

    fn expected_arity(&self) -> String {
        match self.max_args {
            Some(m) if m == self.min_args => format!("{}", m),
            Some(m) => format!("{} to {}", self.min_args, m),
            None => format!("at least {}", self.min_args),
        }
    }

    /// Check operands and derive the result type. Errors are plain messages; the
    /// validator wraps them with the offending expression.
    pub fn infer_return_type(&self, factory: &dyn TypeFactory, args: &[RelDataType]) -> Result<RelDataType, String> {
        if !self.arity_ok(args.len()) {
            return Err(format!(
                "Invalid number of arguments to function '{}'. Was expecting {} arguments",
                self.name, self.expected_arity()
            ));
        }
        let family_ok = |t: &RelDataType, pred: fn(&SqlType) -> bool| t.sql_type.is_null() || pred(&t.sql_type);
        let operands_ok = match self.operands {
            OperandFamily::Any => true,
            OperandFamily::Numeric => args.iter().all(|a| family_ok(a, SqlType::is_numeric)),
            OperandFamily::Integer => args.iter().all(|a| family_ok(a, SqlType::is_exact_integer)),
            OperandFamily::Boolean => args.iter().all(|a| family_ok(a, SqlType::is_boolean)),
            OperandFamily::Character => args.iter().all(|a| family_ok(a, SqlType::is_character)),
            OperandFamily::Comparable => args.is_empty() || factory.least_restrictive(args).is_some(),
        };
        if !operands_ok {
            let sig = args.iter().map(|a| a.sql_type.to_string()).collect::<Vec<_>>().join(", ");
            return Err(format!("Cannot apply '{}' to arguments of type <{}>", self.name, sig));
        }
        let sql_type = match self.returns {
            ReturnRule::Boolean => SqlType::Boolean,
            ReturnRule::Fixed(t) => t,
            ReturnRule::FirstArg => args.first().map(|a| a.sql_type).unwrap_or(SqlType::Null),
            ReturnRule::LeastRestrictive => factory
                .least_restrictive(args)
                .map(|t| t.sql_type)
                .ok_or_else(|| format!("Cannot infer a common type for '{}'", self.name))?,
            ReturnRule::Concat => {
                let mut total: Option<u32> = Some(0);
                for a in args {
                    total = match (total, a.sql_type) {
                        (Some(acc), SqlType::Varchar(Some(n))) => Some(acc + n),
                        _ => None,
                    };
                }
                match total { Some(n) => SqlType::Varchar(Some(n)), None => SqlType::Text }
            }
        };
        if sql_type.is_null() && self.returns != ReturnRule::Boolean {
            return Err(format!("Illegal use of 'NULL' in '{}'", self.name));
        }
        let nullable = match self.nulls {
            NullPolicy::Any => args.iter().any(|a| a.nullable),
            NullPolicy::All => !args.is_empty() && args.iter().all(|a| a.nullable),
            NullPolicy::Never => false,
            NullPolicy::Always => true,
        };
        Ok(RelDataType::new(sql_type, nullable))
    }
}

/// Lookup seam for operators; tables can be chained.
pub trait OperatorTable: Send + Sync {
    fn lookup(&self, name: &str, kind: OperatorKind) -> Option<SqlOperator>;
    fn operators(&self) -> Vec<SqlOperator>;
}

fn standard_ops() -> Vec<SqlOperator> {
    use NullPolicy as N;
    use OperandFamily as F;
    use OperatorKind as K;
    use ReturnRule as R;
    let mut ops = Vec::new();
    for name in ["+", "-", "*", "/"] {
        ops.push(SqlOperator::new(name, K::Binary, 2, Some(2), F::Numeric, R::LeastRestrictive, N::Any));
    }
    for name in ["=", "<>", "<", "<=", ">", ">="] {
        ops.push(SqlOperator::new(name, K::Binary, 2, Some(2), F::Comparable, R::Boolean, N::Any));
    }
    for name in ["AND", "OR"] {
        ops.push(SqlOperator::new(name, K::Binary, 2, Some(2), F::Boolean, R::Boolean, N::Any));
    }
    ops.push(SqlOperator::new("LIKE", K::Binary, 2, Some(2), F::Character, R::Boolean, N::Any));
    ops.push(SqlOperator::new("||", K::Binary, 2, Some(2), F::Character, R::Concat, N::Any));
    ops.push(SqlOperator::new("NOT", K::Prefix, 1, Some(1), F::Boolean, R::Boolean, N::Any));
    ops.push(SqlOperator::new("-", K::Prefix, 1, Some(1), F::Numeric, R::FirstArg, N::Any));
    ops.push(SqlOperator::new("IS NULL", K::Postfix, 1, Some(1), F::Any, R::Boolean, N::Never));
    ops.push(SqlOperator::new("IS NOT NULL", K::Postfix, 1, Some(1), F::Any, R::Boolean, N::Never));
    ops.push(SqlOperator::new("ABS", K::Function, 1, Some(1), F::Numeric, R::FirstArg, N::Any));
    ops.push(SqlOperator::new("FLOOR", K::Function, 1, Some(1), F::Numeric, R::FirstArg, N::Any));
    ops.push(SqlOperator::new("CEIL", K::Function, 1, Some(1), F::Numeric, R::FirstArg, N::Any));
    ops.push(SqlOperator::new("MOD", K::Function, 2, Some(2), F::Integer, R::LeastRestrictive, N::Any));
    ops.push(SqlOperator::new("UPPER", K::Function, 1, Some(1), F::Character, R::FirstArg, N::Any));
    ops.push(SqlOperator::new("LOWER", K::Function, 1, Some(1), F::Character, R::FirstArg, N::Any));
    ops.push(SqlOperator::new("CHAR_LENGTH", K::Function, 1, Some(1), F::Character, R::Fixed(SqlType::Integer), N::Any));
    ops.push(SqlOperator::new("COALESCE", K::Function, 1, None, F::Comparable, R::LeastRestrictive, N::All));
    ops.push(SqlOperator::new("COUNT", K::Aggregate, 0, Some(1), F::Any, R::Fixed(SqlType::BigInt), N::Never));
    // Empty input yields NULL
    ops.push(SqlOperator::new("SUM", K::Aggregate, 1, Some(1), F::Numeric, R::FirstArg, N::Always));
    ops.push(SqlOperator::new("AVG", K::Aggregate, 1, Some(1), F::Numeric, R::FirstArg, N::Always));
    ops.push(SqlOperator::new("MIN", K::Aggregate, 1, Some(1), F::Comparable, R::FirstArg, N::Always));
    ops.push(SqlOperator::new("MAX", K::Aggregate, 1, Some(1), F::Comparable, R::FirstArg, N::Always));
    ops
}

static STANDARD_OPS: Lazy<HashMap<(String, OperatorKind), SqlOperator>> = Lazy::new(|| {
    standard_ops().into_iter().map(|op| ((op.name.clone(), op.kind), op)).collect()
});

/// Built-in operators. Stateless; every instance shares one static map.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardOperatorTable;

impl StandardOperatorTable {
    pub fn shared() -> Arc<dyn OperatorTable> { Arc::new(StandardOperatorTable) }
}

impl OperatorTable for StandardOperatorTable {
    fn lookup(&self, name: &str, kind: OperatorKind) -> Option<SqlOperator> {
        STANDARD_OPS.get(&(name.to_ascii_uppercase(), kind)).cloned()
    }

    fn operators(&self) -> Vec<SqlOperator> {
        let mut all: Vec<SqlOperator> = STANDARD_OPS.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}

/// User function declaration as found in catalog files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    #[serde(default = "default_function_kind")]
    pub kind: OperatorKind,
    pub returns: SqlType,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub min_args: usize,
    #[serde(default)]
    pub max_args: Option<usize>,
}

fn default_function_kind() -> OperatorKind { OperatorKind::Function }
fn default_true() -> bool { true }

impl FunctionSpec {
    pub fn to_operator(&self) -> AppResult<SqlOperator> {
        if !matches!(self.kind, OperatorKind::Function | OperatorKind::Aggregate) {
            return Err(AppError::config(
                "invalid_function".to_string(),
                format!("Function '{}' must be of kind 'function' or 'aggregate'", self.name),
            ));
        }
        if let Some(max) = self.max_args {
            if max < self.min_args {
                return Err(AppError::config(
                    "invalid_function".to_string(),
                    format!("Function '{}' has max_args < min_args", self.name),
                ));
            }
        }
        let nulls = if self.nullable { NullPolicy::Always } else { NullPolicy::Never };
        Ok(SqlOperator::new(&self.name, self.kind, self.min_args, self.max_args, OperandFamily::Any, ReturnRule::Fixed(self.returns), nulls))
    }
}

/// Mutable table of user-registered functions.
#[derive(Debug, Default, Clone)]
pub struct ListOperatorTable {
    ops: Arc<RwLock<Vec<SqlOperator>>>,
}

impl ListOperatorTable {
    pub fn new() -> Self { Self::default() }

    /// Register or replace an operator with the same name and kind.
    pub fn add(&self, op: SqlOperator) {
        let mut g = self.ops.write();
        g.retain(|o| !(o.name == op.name && o.kind == op.kind));
        g.push(op);
    }

    pub fn add_spec(&self, spec: &FunctionSpec) -> AppResult<()> {
        self.add(spec.to_operator()?);
        Ok(())
    }

    pub fn remove(&self, name: &str, kind: OperatorKind) -> bool {
        let key = name.to_ascii_uppercase();
        let mut g = self.ops.write();
        let before = g.len();
        g.retain(|o| !(o.name == key && o.kind == kind));
        g.len() != before
    }

    pub fn len(&self) -> usize { self.ops.read().len() }

    pub fn is_empty(&self) -> bool { self.ops.read().is_empty() }
}

impl OperatorTable for ListOperatorTable {
    fn lookup(&self, name: &str, kind: OperatorKind) -> Option<SqlOperator> {
        let key = name.to_ascii_uppercase();
        self.ops.read().iter().find(|o| o.name == key && o.kind == kind).cloned()
    }

    fn operators(&self) -> Vec<SqlOperator> { self.ops.read().clone() }
}

/// Tries each table in order; the first match wins.
#[derive(Clone, Default)]
pub struct ChainedOperatorTable {
    tables: Vec<Arc<dyn OperatorTable>>,
}

impl ChainedOperatorTable {
    pub fn new(tables: Vec<Arc<dyn OperatorTable>>) -> Self { Self { tables } }

    pub fn push(&mut self, table: Arc<dyn OperatorTable>) { self.tables.push(table); }
}

impl OperatorTable for ChainedOperatorTable {
    fn lookup(&self, name: &str, kind: OperatorKind) -> Option<SqlOperator> {
        self.tables.iter().find_map(|t| t.lookup(name, kind))
    }

    fn operators(&self) -> Vec<SqlOperator> {
        let mut seen: Vec<SqlOperator> = Vec::new();
        for t in &self.tables {
            for op in t.operators() {
                if !seen.iter().any(|s| s.name == op.name && s.kind == op.kind) {
                    seen.push(op);
                }
            }
        }
        seen
    }
}
