//! Execution plan built from relational algebra JSON: a scan with targets and
//! qualifiers, an optional aggregation step, an optional sort and the root targets.

mod translate;

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use thiserror::Error;

use crate::error::AppError;
use crate::types::RelDataType;

pub use translate::translate_query;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("invalid relational algebra JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("plan contains no relational nodes")]
    Empty,
    #[error("first node must be LogicalTableScan, found {0}")]
    ExpectedScan(String),
    #[error("Table '{0}' not found")]
    UnknownTable(String),
    #[error("Column '{column}' not found in table '{table}'")]
    UnknownColumn { table: String, column: String },
    #[error("input reference {index} out of range ({width} fields)")]
    InputOutOfRange { index: usize, width: usize },
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),
    #[error("unknown aggregate '{0}'")]
    UnknownAggregate(String),
    #[error("operator '{op}' cannot take {count} operands")]
    InvalidArity { op: String, count: usize },
    #[error("aggregate {0} requires an operand")]
    MissingAggOperand(String),
    #[error("invalid literal {value} of type {ty}")]
    InvalidLiteral { value: String, ty: String },
    #[error("{0}")]
    Unsupported(String),
}

impl From<TranslateError> for AppError {
    fn from(err: TranslateError) -> Self {
        let msg = err.to_string();
        match err {
            TranslateError::UnknownTable(_) => AppError::not_found("unknown_table".to_string(), msg),
            TranslateError::UnknownColumn { .. } => AppError::not_found("unknown_column".to_string(), msg),
            TranslateError::Unsupported(_) => AppError::unsupported("unsupported".to_string(), msg),
            _ => AppError::plan("invalid_plan".to_string(), msg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    And,
    Or,
    Cast,
    Not,
    UMinus,
    Like,
    Concat,
    IsNull,
    IsNotNull,
}

impl SqlOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            SqlOp::Gt => ">",
            SqlOp::Ge => ">=",
            SqlOp::Lt => "<",
            SqlOp::Le => "<=",
            SqlOp::Eq => "=",
            SqlOp::Ne => "<>",
            SqlOp::Plus => "+",
            SqlOp::Minus | SqlOp::UMinus => "-",
            SqlOp::Multiply => "*",
            SqlOp::Divide => "/",
            SqlOp::Modulo => "MOD",
            SqlOp::And => "AND",
            SqlOp::Or => "OR",
            SqlOp::Cast => "CAST",
            SqlOp::Not => "NOT",
            SqlOp::Like => "LIKE",
            SqlOp::Concat => "||",
            SqlOp::IsNull => "IS NULL",
            SqlOp::IsNotNull => "IS NOT NULL",
        }
    }

    /// Operators that take exactly one operand.
    pub fn is_unary(&self) -> bool {
        matches!(self, SqlOp::Cast | SqlOp::Not | SqlOp::UMinus | SqlOp::IsNull | SqlOp::IsNotNull)
    }
}

impl FromStr for SqlOp {
    type Err = TranslateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            ">" => SqlOp::Gt,
            ">=" => SqlOp::Ge,
            "<" => SqlOp::Lt,
            "<=" => SqlOp::Le,
            "=" => SqlOp::Eq,
            "<>" => SqlOp::Ne,
            "+" => SqlOp::Plus,
            "-" => SqlOp::Minus,
            "*" => SqlOp::Multiply,
            "/" => SqlOp::Divide,
            "MOD" => SqlOp::Modulo,
            "AND" => SqlOp::And,
            "OR" => SqlOp::Or,
            "CAST" => SqlOp::Cast,
            "NOT" => SqlOp::Not,
            "LIKE" => SqlOp::Like,
            "||" => SqlOp::Concat,
            "IS NULL" => SqlOp::IsNull,
            "IS NOT NULL" => SqlOp::IsNotNull,
            other => return Err(TranslateError::UnknownOperator(other.to_string())),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggKind {
    Count,
    Min,
    Max,
    Sum,
    Avg,
}

impl AggKind {
    pub fn name(&self) -> &'static str {
        match self {
            AggKind::Count => "COUNT",
            AggKind::Min => "MIN",
            AggKind::Max => "MAX",
            AggKind::Sum => "SUM",
            AggKind::Avg => "AVG",
        }
    }
}

impl FromStr for AggKind {
    type Err = TranslateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "COUNT" => AggKind::Count,
            "MIN" => AggKind::Min,
            "MAX" => AggKind::Max,
            "SUM" => AggKind::Sum,
            "AVG" => AggKind::Avg,
            other => return Err(TranslateError::UnknownAggregate(other.to_string())),
        })
    }
}

/// A constant value.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Int(i64),
    /// Exact numeric as written
    Decimal(String),
    Double(f64),
    Str(String),
    Bool(bool),
    Null,
}

impl Display for Datum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Datum::Int(v) => write!(f, "{}", v),
            Datum::Decimal(text) => f.write_str(text),
            Datum::Double(v) => write!(f, "{:?}", v),
            Datum::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Datum::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Datum::Null => f.write_str("NULL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzedExpr {
    ColumnVar { table_id: i32, column_id: i32, ty: RelDataType },
    Constant { value: Datum, ty: RelDataType },
    BinOper { op: SqlOp, ty: RelDataType, left: Box<AnalyzedExpr>, right: Box<AnalyzedExpr> },
    UOper { op: SqlOp, ty: RelDataType, operand: Box<AnalyzedExpr> },
    /// `arg` is `None` only for `COUNT(*)`.
    AggExpr { kind: AggKind, ty: RelDataType, arg: Option<Box<AnalyzedExpr>>, distinct: bool },
    Case { ty: RelDataType, whens: Vec<(AnalyzedExpr, AnalyzedExpr)>, else_expr: Option<Box<AnalyzedExpr>> },
    FunctionOper { name: String, ty: RelDataType, args: Vec<AnalyzedExpr> },
}

impl AnalyzedExpr {
    pub fn ty(&self) -> RelDataType {
        match self {
            AnalyzedExpr::ColumnVar { ty, .. }
            | AnalyzedExpr::Constant { ty, .. }
            | AnalyzedExpr::BinOper { ty, .. }
            | AnalyzedExpr::UOper { ty, .. }
            | AnalyzedExpr::AggExpr { ty, .. }
            | AnalyzedExpr::Case { ty, .. }
            | AnalyzedExpr::FunctionOper { ty, .. } => *ty,
        }
    }

    pub fn collect_column_ids(&self, out: &mut BTreeSet<i32>) {
        match self {
            AnalyzedExpr::ColumnVar { column_id, .. } => {
                out.insert(*column_id);
            }
            AnalyzedExpr::Constant { .. } => {}
            AnalyzedExpr::BinOper { left, right, .. } => {
                left.collect_column_ids(out);
                right.collect_column_ids(out);
            }
            AnalyzedExpr::UOper { operand, .. } => operand.collect_column_ids(out),
            AnalyzedExpr::AggExpr { arg, .. } => {
                if let Some(a) = arg {
                    a.collect_column_ids(out);
                }
            }
            AnalyzedExpr::Case { whens, else_expr, .. } => {
                for (c, v) in whens {
                    c.collect_column_ids(out);
                    v.collect_column_ids(out);
                }
                if let Some(e) = else_expr {
                    e.collect_column_ids(out);
                }
            }
            AnalyzedExpr::FunctionOper { args, .. } => args.iter().for_each(|a| a.collect_column_ids(out)),
        }
    }
}

impl Display for AnalyzedExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalyzedExpr::ColumnVar { table_id, column_id, .. } => write!(f, "col[{}:{}]", table_id, column_id),
            AnalyzedExpr::Constant { value, .. } => write!(f, "{}", value),
            AnalyzedExpr::BinOper { op, left, right, .. } => write!(f, "({} {} {})", left, op.symbol(), right),
            AnalyzedExpr::UOper { op: SqlOp::Cast, ty, operand } => write!(f, "CAST({} AS {})", operand, ty.sql_type),
            AnalyzedExpr::UOper { op: op @ (SqlOp::IsNull | SqlOp::IsNotNull), operand, .. } => {
                write!(f, "({} {})", operand, op.symbol())
            }
            AnalyzedExpr::UOper { op, operand, .. } => write!(f, "({} {})", op.symbol(), operand),
            AnalyzedExpr::AggExpr { kind, arg: None, .. } => write!(f, "{}(*)", kind.name()),
            AnalyzedExpr::AggExpr { kind, arg: Some(a), distinct, .. } => {
                write!(f, "{}({}{})", kind.name(), if *distinct { "DISTINCT " } else { "" }, a)
            }
            AnalyzedExpr::Case { whens, else_expr, .. } => {
                f.write_str("CASE")?;
                for (c, v) in whens {
                    write!(f, " WHEN {} THEN {}", c, v)?;
                }
                if let Some(e) = else_expr {
                    write!(f, " ELSE {}", e)?;
                }
                f.write_str(" END")
            }
            AnalyzedExpr::FunctionOper { name, args, .. } => {
                write!(f, "{}({})", name, args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanPlan {
    pub table_id: i32,
    pub targets: Vec<AnalyzedExpr>,
    /// Conjuncts of the scan filter.
    pub quals: Vec<AnalyzedExpr>,
    /// Sorted ids of every column the query touches.
    pub used_columns: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggPlan {
    /// Group keys followed by aggregate expressions.
    pub targets: Vec<AnalyzedExpr>,
    pub group_by: Vec<AnalyzedExpr>,
    pub having: Vec<AnalyzedExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderEntry {
    pub expr: AnalyzedExpr,
    pub desc: bool,
    pub nulls_first: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortPlan {
    pub order: Vec<OrderEntry>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RootPlan {
    pub table_id: i32,
    pub scan: ScanPlan,
    pub agg: Option<AggPlan>,
    pub sort: Option<SortPlan>,
    /// Duplicate rows are removed after aggregation.
    pub distinct: bool,
    pub targets: Vec<AnalyzedExpr>,
    pub target_names: Vec<String>,
}

fn join_exprs(items: &[AnalyzedExpr]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

impl Display for RootPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "RootPlan table_id={}{}", self.table_id, if self.distinct { " distinct" } else { "" })?;
        let targets: Vec<String> = self
            .target_names
            .iter()
            .zip(self.targets.iter())
            .map(|(n, t)| format!("{}={}", n, t))
            .collect();
        writeln!(f, "  targets: [{}]", targets.join(", "))?;
        if let Some(sort) = &self.sort {
            let order: Vec<String> = sort
                .order
                .iter()
                .map(|o| format!("{} {} NULLS {}", o.expr, if o.desc { "DESC" } else { "ASC" }, if o.nulls_first { "FIRST" } else { "LAST" }))
                .collect();
            write!(f, "  Sort: [{}]", order.join(", "))?;
            if let Some(l) = sort.limit {
                write!(f, " limit={}", l)?;
            }
            if let Some(o) = sort.offset {
                write!(f, " offset={}", o)?;
            }
            writeln!(f)?;
        }
        if let Some(agg) = &self.agg {
            writeln!(f, "  Aggregate: group_by=[{}] having=[{}]", join_exprs(&agg.group_by), join_exprs(&agg.having))?;
            writeln!(f, "    targets: [{}]", join_exprs(&agg.targets))?;
        }
        let used: Vec<String> = self.scan.used_columns.iter().map(|c| c.to_string()).collect();
        writeln!(f, "  Scan: table_id={} used_columns=[{}]", self.scan.table_id, used.join(", "))?;
        writeln!(f, "    targets: [{}]", join_exprs(&self.scan.targets))?;
        write!(f, "    quals: [{}]", join_exprs(&self.scan.quals))
    }
}
