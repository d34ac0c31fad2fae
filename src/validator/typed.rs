//! Typed, resolved form of a validated query. Column references point at
//! fields of the joined FROM row by index.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::ident::QualifiedName;
use crate::operators::OperatorKind;
use crate::query::{JoinKind, Literal};
use crate::types::RelDataType;

/// A named field of a row type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(flatten)]
    pub ty: RelDataType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedExprKind {
    Column { input: usize, qualifier: String, column: String, column_id: i32 },
    Literal(Literal),
    /// Operator or scalar function call; `op` is the operator table name.
    Call { op: String, kind: OperatorKind, operands: Vec<TypedExpr> },
    Aggregate { name: String, args: Vec<TypedExpr>, distinct: bool },
    Cast(Box<TypedExpr>),
    Between { expr: Box<TypedExpr>, low: Box<TypedExpr>, high: Box<TypedExpr>, negated: bool },
    InList { expr: Box<TypedExpr>, list: Vec<TypedExpr>, negated: bool },
    Case { whens: Vec<(TypedExpr, TypedExpr)>, else_expr: Option<Box<TypedExpr>> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedExpr {
    pub kind: TypedExprKind,
    pub ty: RelDataType,
}

impl TypedExpr {
    pub fn new(kind: TypedExprKind, ty: RelDataType) -> Self { Self { kind, ty } }

    pub fn is_aggregate(&self) -> bool { matches!(self.kind, TypedExprKind::Aggregate { .. }) }

    pub fn contains_aggregate(&self) -> bool {
        self.is_aggregate() || self.children().iter().any(|c| c.contains_aggregate())
    }

    pub fn children(&self) -> Vec<&TypedExpr> {
        match &self.kind {
            TypedExprKind::Column { .. } | TypedExprKind::Literal(_) => Vec::new(),
            TypedExprKind::Call { operands, .. } => operands.iter().collect(),
            TypedExprKind::Aggregate { args, .. } => args.iter().collect(),
            TypedExprKind::Cast(e) => vec![e.as_ref()],
            TypedExprKind::Between { expr, low, high, .. } => vec![expr.as_ref(), low.as_ref(), high.as_ref()],
            TypedExprKind::InList { expr, list, .. } => {
                let mut v = vec![expr.as_ref()];
                v.extend(list.iter());
                v
            }
            TypedExprKind::Case { whens, else_expr } => {
                let mut v = Vec::new();
                for (c, r) in whens {
                    v.push(c);
                    v.push(r);
                }
                if let Some(e) = else_expr { v.push(e.as_ref()); }
                v
            }
        }
    }

    /// Input field indexes referenced anywhere in the tree, in first-seen order.
    pub fn input_refs(&self, out: &mut Vec<usize>) {
        if let TypedExprKind::Column { input, .. } = &self.kind {
            if !out.contains(input) { out.push(*input); }
        }
        for c in self.children() {
            c.input_refs(out);
        }
    }
}

impl Display for TypedExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let list = |items: &[TypedExpr]| items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ");
        match &self.kind {
            TypedExprKind::Column { qualifier, column, .. } => write!(f, "{}.{}", qualifier, column),
            TypedExprKind::Literal(l) => write!(f, "{}", l),
            TypedExprKind::Call { op, kind: OperatorKind::Binary, operands } if operands.len() == 2 => {
                write!(f, "({} {} {})", operands[0], op, operands[1])
            }
            TypedExprKind::Call { op, kind: OperatorKind::Prefix, operands } => write!(f, "{} {}", op, list(operands)),
            TypedExprKind::Call { op, kind: OperatorKind::Postfix, operands } => write!(f, "{} {}", list(operands), op),
            TypedExprKind::Call { op, operands, .. } => write!(f, "{}({})", op, list(operands)),
            TypedExprKind::Aggregate { name, args, distinct } => {
                if args.is_empty() && name == "COUNT" {
                    write!(f, "COUNT(*)")
                } else {
                    write!(f, "{}({}{})", name, if *distinct { "DISTINCT " } else { "" }, list(args))
                }
            }
            TypedExprKind::Cast(e) => write!(f, "CAST({} AS {})", e, self.ty.sql_type),
            TypedExprKind::Between { expr, low, high, negated } => {
                write!(f, "{} {}BETWEEN {} AND {}", expr, if *negated { "NOT " } else { "" }, low, high)
            }
            TypedExprKind::InList { expr, list: items, negated } => {
                write!(f, "{} {}IN ({})", expr, if *negated { "NOT " } else { "" }, list(items))
            }
            TypedExprKind::Case { whens, else_expr } => {
                f.write_str("CASE")?;
                for (c, v) in whens {
                    write!(f, " WHEN {} THEN {}", c, v)?;
                }
                if let Some(e) = else_expr { write!(f, " ELSE {}", e)?; }
                f.write_str(" END")
            }
        }
    }
}

/// A table of the FROM clause after resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundTable {
    pub table_id: i32,
    pub name: QualifiedName,
    pub alias: String,
    /// Index of this table's first column in the joined input row.
    pub offset: usize,
    /// How this table joins the tables before it; `None` for the first table.
    pub join: Option<JoinKind>,
    pub on: Option<TypedExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderTarget {
    /// Refers to a select item by position.
    Output(usize),
    /// Expression that is not part of the select list.
    Hidden(TypedExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundOrder {
    pub target: OrderTarget,
    pub asc: bool,
}

/// Resolved query ready for translation to relational algebra.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundSelect {
    pub tables: Vec<BoundTable>,
    /// Fields of the joined FROM row, named `alias.column`.
    pub input_fields: Vec<Field>,
    pub filter: Option<TypedExpr>,
    pub group_by: Vec<TypedExpr>,
    /// True when the query has GROUP BY or uses aggregates.
    pub aggregating: bool,
    pub projections: Vec<TypedExpr>,
    pub having: Option<TypedExpr>,
    pub distinct: bool,
    pub order_by: Vec<BoundOrder>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}
