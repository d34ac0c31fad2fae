use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use crate::catalog::CatalogReader;
use crate::error::AppResult;
use crate::ident::qualify_table_name;
use crate::plan::{AggKind, AggPlan, AnalyzedExpr, Datum, OrderEntry, RootPlan, ScanPlan, SortPlan, SqlOp, TranslateError};
use crate::rel::{AggCall, Direction, NullDirection, RelNode, RelPlan, RexNode};
use crate::types::{RelDataType, SqlType};

type Result<T> = std::result::Result<T, TranslateError>;

fn field(fields: &[AnalyzedExpr], index: usize) -> Result<AnalyzedExpr> {
    fields.get(index).cloned().ok_or(TranslateError::InputOutOfRange { index, width: fields.len() })
}

fn invalid_literal(value: &Value, ty: &RelDataType) -> TranslateError {
    TranslateError::InvalidLiteral { value: value.to_string(), ty: ty.sql_type.to_string() }
}

fn constant(value: &Value, ty: RelDataType) -> Result<AnalyzedExpr> {
    let datum = match (value, ty.sql_type) {
        (Value::Null, _) => Datum::Null,
        (Value::Number(n), t) if t.is_exact_integer() => Datum::Int(n.as_i64().ok_or_else(|| invalid_literal(value, &ty))?),
        (Value::Number(n), SqlType::Decimal { .. }) => Datum::Decimal(n.to_string()),
        (Value::String(s), SqlType::Decimal { .. }) if s.parse::<f64>().is_ok() => Datum::Decimal(s.clone()),
        (Value::Number(n), t) if t.is_approximate() => Datum::Double(n.as_f64().ok_or_else(|| invalid_literal(value, &ty))?),
        (Value::String(s), t) if t.is_character() || t.is_datetime() => Datum::Str(s.clone()),
        (Value::Bool(b), SqlType::Boolean) => Datum::Bool(*b),
        _ => return Err(invalid_literal(value, &ty)),
    };
    Ok(AnalyzedExpr::Constant { value: datum, ty })
}

fn is_function_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false) && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn translate_rex(rex: &RexNode, fields: &[AnalyzedExpr]) -> Result<AnalyzedExpr> {
    match rex {
        RexNode::Input { input } => field(fields, *input),
        RexNode::Int(v) => {
            let t = if i32::try_from(*v).is_ok() { SqlType::Integer } else { SqlType::BigInt };
            Ok(AnalyzedExpr::Constant { value: Datum::Int(*v), ty: RelDataType::not_null(t) })
        }
        RexNode::Literal { literal, ty } => constant(literal, *ty),
        RexNode::Call { op, operands, ty } => {
            let args = operands.iter().map(|o| translate_rex(o, fields)).collect::<Result<Vec<_>>>()?;
            translate_call(op, args, *ty)
        }
    }
}

fn translate_call(op: &str, mut args: Vec<AnalyzedExpr>, ty: RelDataType) -> Result<AnalyzedExpr> {
    if op == "CASE" {
        let else_expr = if args.len() % 2 == 1 { args.pop().map(Box::new) } else { None };
        let mut whens = Vec::with_capacity(args.len() / 2);
        let mut it = args.into_iter();
        while let (Some(c), Some(v)) = (it.next(), it.next()) {
            whens.push((c, v));
        }
        if whens.is_empty() {
            return Err(TranslateError::InvalidArity { op: op.to_string(), count: else_expr.iter().count() });
        }
        return Ok(AnalyzedExpr::Case { ty, whens, else_expr });
    }
    let sql_op = match op.parse::<SqlOp>() {
        Ok(o) => o,
        Err(_) if is_function_name(op) => return Ok(AnalyzedExpr::FunctionOper { name: op.to_string(), ty, args }),
        Err(e) => return Err(e),
    };
    let arity_error = |count: usize| TranslateError::InvalidArity { op: op.to_string(), count };
    match args.len() {
        1 => {
            let uop = if sql_op == SqlOp::Minus { SqlOp::UMinus } else { sql_op };
            if !uop.is_unary() {
                return Err(arity_error(1));
            }
            let operand = args.pop().map(Box::new).ok_or_else(|| arity_error(0))?;
            Ok(AnalyzedExpr::UOper { op: uop, ty, operand })
        }
        n if n >= 2 && !sql_op.is_unary() => {
            // a op b op c => (a op b) op c
            let mut it = args.into_iter();
            let first = it.next().ok_or_else(|| arity_error(0))?;
            Ok(it.fold(first, |lhs, rhs| AnalyzedExpr::BinOper { op: sql_op, ty, left: Box::new(lhs), right: Box::new(rhs) }))
        }
        n => Err(arity_error(n)),
    }
}

fn translate_agg(call: &AggCall, fields: &[AnalyzedExpr]) -> Result<AnalyzedExpr> {
    let kind: AggKind = call.agg.parse()?;
    let arg = match call.operands.as_slice() {
        [] if kind == AggKind::Count && !call.distinct => None,
        [] => return Err(TranslateError::MissingAggOperand(call.agg.clone())),
        [i] => Some(Box::new(field(fields, *i)?)),
        _ => return Err(TranslateError::Unsupported(format!("Aggregate {} with more than one operand", call.agg))),
    };
    Ok(AnalyzedExpr::AggExpr { kind, ty: call.ty, arg, distinct: call.distinct })
}

fn split_conjuncts(e: AnalyzedExpr, out: &mut Vec<AnalyzedExpr>) {
    match e {
        AnalyzedExpr::BinOper { op: SqlOp::And, left, right, .. } => {
            split_conjuncts(*left, out);
            split_conjuncts(*right, out);
        }
        other => out.push(other),
    }
}

fn translate(json: &str, catalog: &dyn CatalogReader) -> Result<RootPlan> {
    let plan: RelPlan = serde_json::from_str(json)?;
    let (first, rest) = plan.rels.split_first().ok_or(TranslateError::Empty)?;
    let RelNode::LogicalTableScan { table, field_names } = first else {
        return Err(TranslateError::ExpectedScan(first.rel_op().to_string()));
    };
    let unknown_table = || TranslateError::UnknownTable(table.join("."));
    let qualified = qualify_table_name(table, catalog.defaults()).map_err(|_| unknown_table())?;
    let td = catalog.get_table(&qualified).ok_or_else(unknown_table)?;

    let mut fields = field_names
        .iter()
        .map(|name| {
            td.column(name)
                .map(|c| AnalyzedExpr::ColumnVar { table_id: td.table_id, column_id: c.column_id, ty: c.ty })
                .ok_or_else(|| TranslateError::UnknownColumn { table: td.name.clone(), column: name.clone() })
        })
        .collect::<Result<Vec<_>>>()?;
    let mut names = field_names.clone();
    let mut scan_targets: Option<Vec<AnalyzedExpr>> = None;
    let mut quals = Vec::new();
    let mut agg: Option<AggPlan> = None;
    let mut sort: Option<SortPlan> = None;
    let mut distinct = false;

    for node in rest {
        match node {
            RelNode::LogicalTableScan { .. } => {
                return Err(TranslateError::Unsupported("Plans with more than one table scan are not supported".to_string()))
            }
            RelNode::LogicalFilter { condition } => {
                if sort.is_some() {
                    return Err(TranslateError::Unsupported("Filter after sort is not supported".to_string()));
                }
                let cond = translate_rex(condition, &fields)?;
                match agg.as_mut() {
                    Some(a) => split_conjuncts(cond, &mut a.having),
                    None => split_conjuncts(cond, &mut quals),
                }
            }
            RelNode::LogicalProject { fields: out_names, exprs } => {
                let projected = exprs.iter().map(|e| translate_rex(e, &fields)).collect::<Result<Vec<_>>>()?;
                if agg.is_none() && sort.is_none() {
                    scan_targets = Some(projected.clone());
                }
                fields = projected;
                names = out_names.clone();
            }
            RelNode::LogicalAggregate { group, aggs } => {
                if sort.is_some() {
                    return Err(TranslateError::Unsupported("Aggregation after sort is not supported".to_string()));
                }
                if agg.is_some() {
                    // Only a DISTINCT over the aggregated rows can follow
                    if aggs.is_empty() && group.iter().copied().eq(0..fields.len()) {
                        distinct = true;
                        continue;
                    }
                    return Err(TranslateError::Unsupported("Nested aggregation is not supported".to_string()));
                }
                if scan_targets.is_none() {
                    scan_targets = Some(fields.clone());
                }
                let group_by = group.iter().map(|i| field(&fields, *i)).collect::<Result<Vec<_>>>()?;
                let mut out_names: Vec<String> = group.iter().map(|i| names.get(*i).cloned().unwrap_or_default()).collect();
                let mut targets = group_by.clone();
                for (j, call) in aggs.iter().enumerate() {
                    targets.push(translate_agg(call, &fields)?);
                    out_names.push(format!("$f{}", group.len() + j));
                }
                fields = targets.clone();
                names = out_names;
                agg = Some(AggPlan { targets, group_by, having: Vec::new() });
            }
            RelNode::LogicalSort { collation, fetch, offset } => {
                if sort.is_some() {
                    return Err(TranslateError::Unsupported("Plans with more than one sort are not supported".to_string()));
                }
                let order = collation
                    .iter()
                    .map(|c| {
                        Ok(OrderEntry {
                            expr: field(&fields, c.field)?,
                            desc: c.direction == Direction::Descending,
                            nulls_first: c.nulls == NullDirection::First,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                sort = Some(SortPlan { order, limit: *fetch, offset: *offset });
            }
        }
    }

    let scan_targets = scan_targets.unwrap_or_else(|| fields.clone());
    let mut used = BTreeSet::new();
    for e in scan_targets.iter().chain(quals.iter()).chain(fields.iter()) {
        e.collect_column_ids(&mut used);
    }
    if let Some(a) = &agg {
        for e in a.group_by.iter().chain(a.targets.iter()).chain(a.having.iter()) {
            e.collect_column_ids(&mut used);
        }
    }
    if let Some(s) = &sort {
        for o in &s.order {
            o.expr.collect_column_ids(&mut used);
        }
    }

    Ok(RootPlan {
        table_id: td.table_id,
        scan: ScanPlan { table_id: td.table_id, targets: scan_targets, quals, used_columns: used.into_iter().collect() },
        agg,
        sort,
        distinct,
        targets: fields,
        target_names: names,
    })
}

/// Build an execution plan from relational algebra JSON.
///
/// Nodes are dispatched on `relOp`; each one is applied to the fields produced by
/// the node before it, so input references resolve through projections and
/// aggregates down to catalog columns.
pub fn translate_query(json: &str, catalog: &dyn CatalogReader) -> AppResult<RootPlan> {
    let plan = translate(json, catalog)?;
    debug!(
        target: "mapd_sql::plan",
        "planned table {}: {} targets, {} quals, aggregate={}, sort={}",
        plan.table_id,
        plan.targets.len(),
        plan.scan.quals.len(),
        plan.agg.is_some(),
        plan.sort.is_some()
    );
    Ok(plan)
}
