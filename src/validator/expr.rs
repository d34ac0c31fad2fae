use crate::error::{AppError, AppResult};
use crate::operators::OperatorKind;
use crate::query::{BinaryOp, Expr, Literal};
use crate::types::{RelDataType, SqlType};
use crate::validator::scope::Scope;
use crate::validator::typed::{TypedExpr, TypedExprKind};
use crate::validator::SqlValidator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Clause {
    Select,
    On,
    Where,
    GroupBy,
    Having,
    OrderBy,
}

impl Clause {
    pub fn name(&self) -> &'static str {
        match self {
            Clause::Select => "SELECT",
            Clause::On => "ON",
            Clause::Where => "WHERE",
            Clause::GroupBy => "GROUP BY",
            Clause::Having => "HAVING",
            Clause::OrderBy => "ORDER BY",
        }
    }
}

/// Where an expression is being validated.
#[derive(Clone, Copy)]
pub(crate) struct ExprContext<'a> {
    pub scope: &'a Scope,
    pub clause: Clause,
    pub in_aggregate: bool,
    /// Select-list aliases usable as a fallback for unresolved simple names.
    pub aliases: Option<&'a [(String, TypedExpr)]>,
}

impl<'a> ExprContext<'a> {
    pub fn new(scope: &'a Scope, clause: Clause) -> Self {
        Self { scope, clause, in_aggregate: false, aliases: None }
    }

    pub fn with_aliases(mut self, aliases: Option<&'a [(String, TypedExpr)]>) -> Self {
        self.aliases = aliases;
        self
    }

    fn aggregates_allowed(&self) -> bool {
        !self.in_aggregate && matches!(self.clause, Clause::Select | Clause::Having | Clause::OrderBy)
    }
}

fn type_mismatch(msg: String) -> AppError {
    AppError::validation("type_mismatch".to_string(), msg)
}

impl SqlValidator {
    pub(crate) fn literal_type(&self, lit: &Literal) -> RelDataType {
        let f = self.type_factory.as_ref();
        match lit {
            Literal::Integer(v) if i32::try_from(*v).is_ok() => f.create_sql_type(SqlType::Integer),
            Literal::Integer(_) => f.create_sql_type(SqlType::BigInt),
            Literal::Decimal(text) => f.decimal_of_literal(text),
            Literal::Double(_) => f.create_sql_type(SqlType::Double),
            Literal::String(s) => f.create_sql_type(SqlType::Varchar(Some(s.chars().count() as u32))),
            Literal::Boolean(_) => f.create_sql_type(SqlType::Boolean),
            Literal::Null => RelDataType::nullable(SqlType::Null),
        }
    }

    fn unknown_function(name: &str, operands: &[TypedExpr]) -> AppError {
        let sig = operands.iter().map(|o| format!("<{}>", o.ty.sql_type.type_name())).collect::<Vec<_>>().join(", ");
        AppError::not_found("unknown_function".to_string(), format!("No match found for function signature {}({})", name, sig))
    }

    fn call(&self, name: &str, kind: OperatorKind, operands: Vec<TypedExpr>) -> AppResult<TypedExpr> {
        let op = self.op_table.lookup(name, kind).ok_or_else(|| Self::unknown_function(name, &operands))?;
        let types: Vec<RelDataType> = operands.iter().map(|o| o.ty).collect();
        let ty = op.infer_return_type(self.type_factory.as_ref(), &types).map_err(type_mismatch)?;
        Ok(TypedExpr::new(TypedExprKind::Call { op: op.name, kind, operands }, ty))
    }

    pub(crate) fn ensure_boolean(&self, e: &TypedExpr, clause: Clause) -> AppResult<()> {
        if e.ty.sql_type.is_boolean() || e.ty.sql_type.is_null() {
            Ok(())
        } else {
            Err(type_mismatch(format!("{} clause condition must be a BOOLEAN expression, got {}", clause.name(), e.ty.sql_type)))
        }
    }

    fn common_type(&self, what: &str, items: &[&TypedExpr]) -> AppResult<RelDataType> {
        let types: Vec<RelDataType> = items.iter().map(|i| i.ty).collect();
        self.type_factory.least_restrictive(&types).ok_or_else(|| {
            let sig = types.iter().map(|t| t.sql_type.to_string()).collect::<Vec<_>>().join(", ");
            type_mismatch(format!("Values passed to {} operator must have compatible types <{}>", what, sig))
        })
    }

    pub(crate) fn validate_expr(&self, expr: &Expr, ctx: &ExprContext<'_>) -> AppResult<TypedExpr> {
        match expr {
            Expr::Identifier(parts) => match ctx.scope.resolve(parts) {
                Ok(c) => Ok(TypedExpr::new(
                    TypedExprKind::Column { input: c.input, qualifier: c.qualifier, column: c.column, column_id: c.column_id },
                    c.ty,
                )),
                Err(err) => {
                    if let ([name], Some(aliases)) = (parts.as_slice(), ctx.aliases) {
                        if err.code_str() == "unknown_column" {
                            if let Some((_, t)) = aliases.iter().find(|(a, _)| a == name) {
                                return Ok(t.clone());
                            }
                        }
                    }
                    Err(err)
                }
            },
            Expr::Literal(l) => Ok(TypedExpr::new(TypedExprKind::Literal(l.clone()), self.literal_type(l))),
            Expr::Binary { left, op, right } => {
                let l = self.validate_expr(left, ctx)?;
                let r = self.validate_expr(right, ctx)?;
                let call = self.call(op.operator_name(), OperatorKind::Binary, vec![l, r])?;
                if *op == BinaryOp::NotLike {
                    self.call("NOT", OperatorKind::Prefix, vec![call])
                } else {
                    Ok(call)
                }
            }
            Expr::Unary { op, expr } => {
                let e = self.validate_expr(expr, ctx)?;
                self.call(op.symbol(), OperatorKind::Prefix, vec![e])
            }
            Expr::IsNull { expr, negated } => {
                let e = self.validate_expr(expr, ctx)?;
                self.call(if *negated { "IS NOT NULL" } else { "IS NULL" }, OperatorKind::Postfix, vec![e])
            }
            Expr::Between { expr, low, high, negated } => {
                let e = self.validate_expr(expr, ctx)?;
                let lo = self.validate_expr(low, ctx)?;
                let hi = self.validate_expr(high, ctx)?;
                let common = self.common_type("BETWEEN", &[&e, &lo, &hi])?;
                let ty = RelDataType::new(SqlType::Boolean, common.nullable);
                Ok(TypedExpr::new(
                    TypedExprKind::Between { expr: Box::new(e), low: Box::new(lo), high: Box::new(hi), negated: *negated },
                    ty,
                ))
            }
            Expr::InList { expr, list, negated } => {
                let e = self.validate_expr(expr, ctx)?;
                let items = list.iter().map(|i| self.validate_expr(i, ctx)).collect::<AppResult<Vec<_>>>()?;
                let mut all: Vec<&TypedExpr> = vec![&e];
                all.extend(items.iter());
                let common = self.common_type("IN", &all)?;
                let ty = RelDataType::new(SqlType::Boolean, common.nullable);
                Ok(TypedExpr::new(TypedExprKind::InList { expr: Box::new(e), list: items, negated: *negated }, ty))
            }
            Expr::Function { name, args, distinct, star } => self.validate_function(name, args, *distinct, *star, ctx),
            Expr::Cast { expr, ty } => {
                let e = self.validate_expr(expr, ctx)?;
                if !self.type_factory.can_cast(&e.ty.sql_type, ty) {
                    return Err(type_mismatch(format!("Cast function cannot convert value of type {} to type {}", e.ty.sql_type, ty)));
                }
                let target = self.type_factory.create_sql_type(*ty);
                let out = self.type_factory.create_with_nullability(&target, e.ty.nullable);
                Ok(TypedExpr::new(TypedExprKind::Cast(Box::new(e)), out))
            }
            Expr::Case { whens, else_expr } => {
                let mut typed_whens = Vec::with_capacity(whens.len());
                for (c, v) in whens {
                    let cond = self.validate_expr(c, ctx)?;
                    if !(cond.ty.sql_type.is_boolean() || cond.ty.sql_type.is_null()) {
                        return Err(type_mismatch(format!("Expected a BOOLEAN condition in CASE WHEN, got {}", cond.ty.sql_type)));
                    }
                    let value = self.validate_expr(v, ctx)?;
                    typed_whens.push((cond, value));
                }
                let typed_else = match else_expr {
                    Some(e) => Some(Box::new(self.validate_expr(e, ctx)?)),
                    None => None,
                };
                let mut results: Vec<RelDataType> = typed_whens.iter().map(|(_, v)| v.ty).collect();
                if let Some(e) = &typed_else { results.push(e.ty); }
                if results.iter().all(|t| t.sql_type.is_null()) {
                    return Err(type_mismatch("ELSE clause or at least one THEN clause must be non-NULL".to_string()));
                }
                let joined = self
                    .type_factory
                    .least_restrictive(&results)
                    .ok_or_else(|| type_mismatch("Illegal mixing of types in CASE or COALESCE statement".to_string()))?;
                let ty = RelDataType::new(joined.sql_type, joined.nullable || typed_else.is_none());
                Ok(TypedExpr::new(TypedExprKind::Case { whens: typed_whens, else_expr: typed_else }, ty))
            }
        }
    }

    fn validate_function(&self, name: &str, args: &[Expr], distinct: bool, star: bool, ctx: &ExprContext<'_>) -> AppResult<TypedExpr> {
        if let Some(agg) = self.op_table.lookup(name, OperatorKind::Aggregate) {
            if !ctx.aggregates_allowed() {
                let msg = if ctx.in_aggregate {
                    "Aggregate expressions cannot be nested".to_string()
                } else {
                    format!("Aggregate expression is illegal in {} clause", ctx.clause.name())
                };
                return Err(AppError::validation("invalid_aggregate".to_string(), msg));
            }
            if star && agg.name != "COUNT" {
                return Err(AppError::validation("invalid_function".to_string(), format!("'*' is not a valid argument of {}", agg.name)));
            }
            let inner = ExprContext { in_aggregate: true, ..*ctx };
            let typed = args.iter().map(|a| self.validate_expr(a, &inner)).collect::<AppResult<Vec<_>>>()?;
            let types: Vec<RelDataType> = typed.iter().map(|t| t.ty).collect();
            let ty = agg.infer_return_type(self.type_factory.as_ref(), &types).map_err(type_mismatch)?;
            return Ok(TypedExpr::new(TypedExprKind::Aggregate { name: agg.name, args: typed, distinct }, ty));
        }
        if star {
            return Err(AppError::validation("invalid_function".to_string(), format!("'*' is not a valid argument of {}", name)));
        }
        if distinct {
            return Err(AppError::validation(
                "invalid_function".to_string(),
                format!("DISTINCT is only allowed in aggregate functions, not in {}", name),
            ));
        }
        let typed = args.iter().map(|a| self.validate_expr(a, ctx)).collect::<AppResult<Vec<_>>>()?;
        self.call(name, OperatorKind::Function, typed)
    }
}

/// Fails when `e` references a column outside the group keys and aggregates.
pub(crate) fn check_grouped(e: &TypedExpr, groups: &[TypedExpr]) -> AppResult<()> {
    if groups.iter().any(|g| g == e) {
        return Ok(());
    }
    match &e.kind {
        TypedExprKind::Aggregate { .. } | TypedExprKind::Literal(_) => Ok(()),
        TypedExprKind::Column { qualifier, column, .. } => Err(AppError::validation(
            "not_grouped".to_string(),
            format!("Expression '{}.{}' is not being grouped", qualifier, column),
        )),
        _ => e.children().into_iter().try_for_each(|c| check_grouped(c, groups)),
    }
}
