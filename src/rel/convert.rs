use serde_json::{json, Value};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::query::Literal;
use crate::rel::{AggCall, Collation, RelNode, RelPlan, RexNode};
use crate::types::{RelDataType, SqlType};
use crate::validator::{BoundSelect, OrderTarget, TypedExpr, TypedExprKind, ValidatedQuery};

/// What the fields of the node being built on refer to.
enum Input<'a> {
    Scan,
    /// Output of an aggregate: group keys first, then aggregate calls.
    Aggregated { groups: &'a [TypedExpr], aggs: &'a [TypedExpr] },
}

fn unsupported(msg: &str) -> AppError {
    AppError::unsupported("unsupported", msg)
}

fn boolean(nullable: bool) -> RelDataType {
    RelDataType::new(SqlType::Boolean, nullable)
}

fn negate_if(negated: bool, node: RexNode, ty: RelDataType) -> RexNode {
    if negated { RexNode::call("NOT", vec![node], ty) } else { node }
}

fn literal_value(l: &Literal) -> Value {
    match l {
        Literal::Integer(v) => json!(v),
        // Exact text survives; the type carries precision and scale
        Literal::Decimal(text) => Value::String(text.clone()),
        Literal::Double(text) => text.parse::<f64>().map(|d| json!(d)).unwrap_or_else(|_| Value::String(text.clone())),
        Literal::String(s) => Value::String(s.clone()),
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

fn lower(e: &TypedExpr, input: &Input<'_>) -> AppResult<RexNode> {
    if let Input::Aggregated { groups, aggs } = input {
        if let Some(i) = groups.iter().position(|g| g == e) {
            return Ok(RexNode::input(i));
        }
        if let Some(j) = aggs.iter().position(|a| a == e) {
            return Ok(RexNode::input(groups.len() + j));
        }
    }
    let lower_all = |items: &[TypedExpr]| items.iter().map(|i| lower(i, input)).collect::<AppResult<Vec<_>>>();
    Ok(match &e.kind {
        TypedExprKind::Column { input: idx, qualifier, column, .. } => match input {
            Input::Scan => RexNode::input(*idx),
            Input::Aggregated { .. } => {
                return Err(AppError::validation(
                    "not_grouped".to_string(),
                    format!("Expression '{}.{}' is not being grouped", qualifier, column),
                ))
            }
        },
        TypedExprKind::Literal(l) => RexNode::Literal { literal: literal_value(l), ty: e.ty },
        TypedExprKind::Call { op, operands, .. } => RexNode::call(op, lower_all(operands)?, e.ty),
        TypedExprKind::Aggregate { name, .. } => {
            return Err(AppError::internal(
                "internal_error".to_string(),
                format!("Aggregate {} found outside of an aggregation", name),
            ))
        }
        TypedExprKind::Cast(inner) => RexNode::call("CAST", vec![lower(inner, input)?], e.ty),
        TypedExprKind::Between { expr, low, high, negated } => {
            let x = lower(expr, input)?;
            let ge = RexNode::call(">=", vec![x.clone(), lower(low, input)?], boolean(expr.ty.nullable || low.ty.nullable));
            let le = RexNode::call("<=", vec![x, lower(high, input)?], boolean(expr.ty.nullable || high.ty.nullable));
            negate_if(*negated, RexNode::call("AND", vec![ge, le], e.ty), e.ty)
        }
        TypedExprKind::InList { expr, list, negated } => {
            let x = lower(expr, input)?;
            let mut eqs = Vec::with_capacity(list.len());
            for item in list {
                eqs.push(RexNode::call("=", vec![x.clone(), lower(item, input)?], boolean(expr.ty.nullable || item.ty.nullable)));
            }
            let any = if eqs.len() == 1 { eqs.remove(0) } else { RexNode::call("OR", eqs, e.ty) };
            negate_if(*negated, any, e.ty)
        }
        TypedExprKind::Case { whens, else_expr } => {
            let mut operands = Vec::with_capacity(whens.len() * 2 + 1);
            for (c, v) in whens {
                operands.push(lower(c, input)?);
                operands.push(lower(v, input)?);
            }
            operands.push(match else_expr {
                Some(x) => lower(x, input)?,
                None => RexNode::Literal { literal: Value::Null, ty: e.ty },
            });
            RexNode::call("CASE", operands, e.ty)
        }
    })
}

fn collect_aggs(e: &TypedExpr, out: &mut Vec<TypedExpr>) {
    if e.is_aggregate() {
        if !out.contains(e) {
            out.push(e.clone());
        }
        return;
    }
    for c in e.children() {
        collect_aggs(c, out);
    }
}

fn pre_field_name(e: &TypedExpr, i: usize) -> String {
    match &e.kind {
        TypedExprKind::Column { column, .. } => column.clone(),
        _ => format!("$f{}", i),
    }
}

/// Final projection, optional DISTINCT, sort and the trim of hidden sort keys.
fn finish(rels: &mut Vec<RelNode>, bound: &BoundSelect, names: &[String], hidden: &[&TypedExpr], input: &Input<'_>) -> AppResult<()> {
    let mut exprs = bound.projections.iter().map(|p| lower(p, input)).collect::<AppResult<Vec<_>>>()?;
    let mut fields = names.to_vec();
    for (i, h) in hidden.iter().enumerate() {
        exprs.push(lower(h, input)?);
        fields.push(format!("$f{}", names.len() + i));
    }
    rels.push(RelNode::LogicalProject { fields, exprs });

    if bound.distinct {
        rels.push(RelNode::LogicalAggregate { group: (0..names.len()).collect(), aggs: Vec::new() });
    }

    if !bound.order_by.is_empty() || bound.limit.is_some() || bound.offset.is_some() {
        let mut next_hidden = names.len();
        let collation = bound
            .order_by
            .iter()
            .map(|o| {
                let field = match &o.target {
                    OrderTarget::Output(i) => *i,
                    OrderTarget::Hidden(_) => {
                        next_hidden += 1;
                        next_hidden - 1
                    }
                };
                Collation::new(field, o.asc)
            })
            .collect();
        rels.push(RelNode::LogicalSort { collation, fetch: bound.limit, offset: bound.offset });
    }

    if !hidden.is_empty() {
        rels.push(RelNode::LogicalProject { fields: names.to_vec(), exprs: (0..names.len()).map(RexNode::input).collect() });
    }
    Ok(())
}

/// Translate a validated single-table query into relational algebra.
///
/// The node chain is `scan -> [filter] -> project -> [aggregate -> [filter] -> project]
/// -> [aggregate (DISTINCT)] -> [sort] -> [project]`. Sort keys that are not in the
/// select list are carried as extra projected fields and trimmed after the sort.
pub fn to_rel(query: &ValidatedQuery) -> AppResult<RelPlan> {
    let bound = &query.bound;
    let table = match bound.tables.as_slice() {
        [t] => t,
        [] => return Err(unsupported("Queries without a FROM clause cannot be translated to relational algebra")),
        _ => return Err(unsupported("Joins are not supported by the relational algebra translator")),
    };
    let prefix = format!("{}.", table.alias);
    let mut rels = vec![RelNode::LogicalTableScan {
        table: table.name.parts(),
        field_names: bound
            .input_fields
            .iter()
            .map(|f| f.name.strip_prefix(prefix.as_str()).unwrap_or(&f.name).to_string())
            .collect(),
    }];
    if let Some(f) = &bound.filter {
        rels.push(RelNode::LogicalFilter { condition: lower(f, &Input::Scan)? });
    }

    let names: Vec<String> = query.row_type.iter().map(|f| f.name.clone()).collect();
    let hidden: Vec<&TypedExpr> = bound
        .order_by
        .iter()
        .filter_map(|o| match &o.target {
            OrderTarget::Hidden(e) => Some(e),
            OrderTarget::Output(_) => None,
        })
        .collect();

    if bound.aggregating {
        let groups = bound.group_by.as_slice();
        let mut aggs = Vec::new();
        for e in bound.projections.iter().chain(bound.having.iter()).chain(hidden.iter().copied()) {
            collect_aggs(e, &mut aggs);
        }
        // Group keys first, then aggregate operands not already projected
        let mut pre: Vec<TypedExpr> = groups.to_vec();
        let mut calls = Vec::with_capacity(aggs.len());
        for a in &aggs {
            if let TypedExprKind::Aggregate { name, args, distinct } = &a.kind {
                let mut operands = Vec::with_capacity(args.len());
                for arg in args {
                    let pos = match pre.iter().position(|p| p == arg) {
                        Some(p) => p,
                        None => {
                            pre.push(arg.clone());
                            pre.len() - 1
                        }
                    };
                    operands.push(pos);
                }
                calls.push(AggCall { agg: name.clone(), ty: a.ty, distinct: *distinct, operands });
            }
        }
        rels.push(RelNode::LogicalProject {
            fields: pre.iter().enumerate().map(|(i, e)| pre_field_name(e, i)).collect(),
            exprs: pre.iter().map(|e| lower(e, &Input::Scan)).collect::<AppResult<Vec<_>>>()?,
        });
        rels.push(RelNode::LogicalAggregate { group: (0..groups.len()).collect(), aggs: calls });

        let agg_input = Input::Aggregated { groups, aggs: &aggs };
        if let Some(h) = &bound.having {
            rels.push(RelNode::LogicalFilter { condition: lower(h, &agg_input)? });
        }
        finish(&mut rels, bound, &names, &hidden, &agg_input)?;
    } else {
        finish(&mut rels, bound, &names, &hidden, &Input::Scan)?;
    }

    debug!(target: "mapd_sql::rel", "translated {} into {} nodes", table.name, rels.len());
    Ok(RelPlan { rels })
}
