use std::collections::HashSet;

use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::ident::qualify_table_name;
use crate::query::{Expr, FromClause, Join, JoinKind, Literal, OrderItem, Select, SelectItem, TableRef};
use crate::validator::expr::{check_grouped, Clause, ExprContext};
use crate::validator::scope::{Scope, ScopeTable};
use crate::validator::typed::{BoundOrder, BoundSelect, BoundTable, Field, OrderTarget, TypedExpr};
use crate::validator::{SqlValidator, ValidatedQuery};

/// A select item after `*` expansion.
struct Item {
    expr: Expr,
    alias: Option<String>,
    from_star: bool,
}

/// How a GROUP BY or ORDER BY entry was resolved.
enum Reference {
    /// By select-list ordinal or alias.
    Item(usize),
    Expr,
}

fn derive_name(expr: &Expr, i: usize) -> String {
    match expr {
        Expr::Identifier(parts) => parts.last().cloned().unwrap_or_else(|| format!("EXPR${}", i)),
        _ => format!("EXPR${}", i),
    }
}

/// Make names unique by appending `0`, `1`, ... to later duplicates.
pub(crate) fn uniquify(names: Vec<String>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name.clone();
        let mut k = 0usize;
        while used.contains(&candidate) {
            candidate = format!("{}{}", name, k);
            k += 1;
        }
        used.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

fn invalid_ordinal(n: i64, len: usize) -> AppError {
    AppError::validation("invalid_ordinal".to_string(), format!("Ordinal out of range: {} (select list has {} items)", n, len))
}

fn ordinal_of(expr: &Expr) -> Option<i64> {
    match expr {
        Expr::Literal(Literal::Integer(n)) => Some(*n),
        _ => None,
    }
}

impl SqlValidator {
    fn build_scope(&self, from: &FromClause) -> AppResult<(Scope, Vec<(Option<JoinKind>, Option<Expr>)>)> {
        let mut scope = Scope::default();
        let mut joins = Vec::with_capacity(from.joins.len() + 1);
        let refs = std::iter::once((None, &from.base, None))
            .chain(from.joins.iter().map(|j: &Join| (Some(j.kind), &j.table, j.on.as_ref())));
        for (kind, tref, on) in refs {
            let qualified = qualify_table_name(&tref.name, self.catalog.defaults())?;
            let table = self.catalog.get_table(&qualified).ok_or_else(|| {
                AppError::not_found("unknown_table".to_string(), format!("Object '{}' not found", tref.name.join(".")))
            })?;
            let alias = tref.alias.clone().unwrap_or_else(|| table.name.clone());
            if scope.tables.iter().any(|t| t.alias == alias) {
                return Err(AppError::validation(
                    "duplicate_alias".to_string(),
                    format!("Duplicate relation name '{}' in FROM clause", alias),
                ));
            }
            if kind.map(|k| k.left_nullable()).unwrap_or(false) {
                for t in scope.tables.iter_mut() {
                    t.nullable = true;
                }
            }
            let offset = scope.width();
            scope.tables.push(ScopeTable {
                alias,
                explicit_alias: tref.alias.is_some(),
                table,
                offset,
                nullable: kind.map(|k| k.right_nullable()).unwrap_or(false),
            });
            joins.push((kind, on.cloned()));
        }
        Ok((scope, joins))
    }

    fn expand_items(&self, select: &Select, scope: &Scope) -> AppResult<Vec<Item>> {
        let mut items = Vec::new();
        let star_items = |t: &ScopeTable| -> Vec<Item> {
            t.table
                .columns
                .iter()
                .map(|c| Item { expr: Expr::Identifier(vec![t.alias.clone(), c.name.clone()]), alias: None, from_star: true })
                .collect()
        };
        for item in &select.items {
            match item {
                SelectItem::Wildcard { qualifier: None } => {
                    if scope.tables.is_empty() {
                        return Err(AppError::validation("invalid_star".to_string(), "SELECT * requires a FROM clause".to_string()));
                    }
                    for t in &scope.tables {
                        items.extend(star_items(t));
                    }
                }
                SelectItem::Wildcard { qualifier: Some(q) } => {
                    let t = scope.find_table(q).ok_or_else(|| {
                        AppError::not_found("unknown_table".to_string(), format!("Table '{}' not found", q.join(".")))
                    })?;
                    items.extend(star_items(t));
                }
                SelectItem::Expr { expr, alias } => items.push(Item { expr: expr.clone(), alias: alias.clone(), from_star: false }),
            }
        }
        Ok(items)
    }

    /// Rewrite column references to `alias.column`. Simple names that do not resolve
    /// fall back to `aliases` (select-list alias references).
    fn expand_expr(&self, expr: &Expr, scope: &Scope, aliases: &[(String, Expr)]) -> Expr {
        expr.transform(&mut |e: &Expr| match e {
            Expr::Identifier(parts) => match scope.resolve(parts) {
                Ok(c) => Some(Expr::Identifier(vec![c.qualifier, c.column])),
                Err(_) => match parts.as_slice() {
                    [name] => aliases
                        .iter()
                        .find(|(a, x)| a == name && !matches!(x, Expr::Literal(Literal::Integer(_))))
                        .map(|(_, x)| x.clone()),
                    _ => None,
                },
            },
            _ => None,
        })
    }

    pub(crate) fn validate_select(&self, select: &Select) -> AppResult<ValidatedQuery> {
        let expand = self.should_expand_identifiers();

        // FROM
        let (scope, joins) = match &select.from {
            Some(from) => self.build_scope(from)?,
            None => {
                if self.conformance.is_from_required() {
                    return Err(AppError::validation(
                        "conformance".to_string(),
                        format!("SELECT must have a FROM clause under conformance {}", self.conformance),
                    ));
                }
                (Scope::default(), Vec::new())
            }
        };
        let mut tables = Vec::with_capacity(scope.tables.len());
        for (i, (t, (kind, on))) in scope.tables.iter().zip(joins.iter()).enumerate() {
            let typed_on = match on {
                Some(cond) => {
                    let prefix = scope.prefix(i + 1);
                    let typed = self.validate_expr(cond, &ExprContext::new(&prefix, Clause::On))?;
                    self.ensure_boolean(&typed, Clause::On)?;
                    Some(typed)
                }
                None => None,
            };
            tables.push(BoundTable {
                table_id: t.table.table_id,
                name: t.table.qualified_name(),
                alias: t.alias.clone(),
                offset: t.offset,
                join: *kind,
                on: typed_on,
            });
        }
        let input_fields: Vec<Field> = scope
            .tables
            .iter()
            .flat_map(|t| {
                t.table.columns.iter().map(move |c| Field {
                    name: format!("{}.{}", t.alias, c.name),
                    ty: self.type_factory.create_with_nullability(&c.ty, c.ty.nullable || t.nullable),
                })
            })
            .collect();

        // SELECT list
        let items = self.expand_items(select, &scope)?;
        let select_ctx = ExprContext::new(&scope, Clause::Select);
        let projections = items.iter().map(|i| self.validate_expr(&i.expr, &select_ctx)).collect::<AppResult<Vec<_>>>()?;
        let names = uniquify(
            items
                .iter()
                .enumerate()
                .map(|(i, it)| it.alias.clone().unwrap_or_else(|| derive_name(&it.expr, i)))
                .collect(),
        );
        let typed_aliases: Vec<(String, TypedExpr)> = items
            .iter()
            .zip(projections.iter())
            .filter_map(|(it, p)| it.alias.as_ref().map(|a| (a.clone(), p.clone())))
            .collect();

        // WHERE
        let filter = match &select.where_clause {
            Some(w) => {
                let typed = self.validate_expr(w, &ExprContext::new(&scope, Clause::Where))?;
                self.ensure_boolean(&typed, Clause::Where)?;
                Some(typed)
            }
            None => None,
        };

        // GROUP BY
        let group_aliases = if self.conformance.is_group_by_alias() { Some(typed_aliases.as_slice()) } else { None };
        let mut group_by = Vec::with_capacity(select.group_by.len());
        let mut group_refs = Vec::with_capacity(select.group_by.len());
        for g in &select.group_by {
            let (typed, reference) = match ordinal_of(g) {
                Some(n) if self.conformance.is_group_by_ordinal() => {
                    if n < 1 || n as usize > projections.len() {
                        return Err(invalid_ordinal(n, projections.len()));
                    }
                    (projections[n as usize - 1].clone(), Reference::Item(n as usize - 1))
                }
                _ => {
                    let ctx = ExprContext::new(&scope, Clause::GroupBy).with_aliases(group_aliases);
                    (self.validate_expr(g, &ctx)?, Reference::Expr)
                }
            };
            if typed.contains_aggregate() {
                return Err(AppError::validation(
                    "invalid_aggregate".to_string(),
                    "Aggregate expression is illegal in GROUP BY clause".to_string(),
                ));
            }
            group_by.push(typed);
            group_refs.push(reference);
        }

        // HAVING
        let having_aliases = if self.conformance.is_having_alias() { Some(typed_aliases.as_slice()) } else { None };
        let having = match &select.having {
            Some(h) => {
                let ctx = ExprContext::new(&scope, Clause::Having).with_aliases(having_aliases);
                let typed = self.validate_expr(h, &ctx)?;
                self.ensure_boolean(&typed, Clause::Having)?;
                Some(typed)
            }
            None => None,
        };

        let aggregating = !group_by.is_empty() || having.is_some() || projections.iter().any(|p| p.contains_aggregate());
        if aggregating {
            for p in &projections {
                check_grouped(p, &group_by)?;
            }
            if let Some(h) = &having {
                check_grouped(h, &group_by)?;
            }
        }

        // ORDER BY
        let explicit_aliases: Vec<&str> = items.iter().filter_map(|it| it.alias.as_deref()).collect();
        let mut order_by = Vec::with_capacity(select.order_by.len());
        let mut order_refs = Vec::with_capacity(select.order_by.len());
        for o in &select.order_by {
            let (target, reference) = self.resolve_order_item(o, &scope, &projections, &names, &explicit_aliases, &group_by, aggregating, select.distinct)?;
            order_by.push(BoundOrder { target, asc: o.asc });
            order_refs.push(reference);
        }

        let row_type: Vec<Field> = names.iter().zip(projections.iter()).map(|(n, p)| Field { name: n.clone(), ty: p.ty }).collect();

        // Rewritten query
        let mut rewritten = select.clone();
        let expanded_items: Vec<Expr> = items
            .iter()
            .map(|it| if expand { self.expand_expr(&it.expr, &scope, &[]) } else { it.expr.clone() })
            .collect();
        rewritten.items = items
            .iter()
            .zip(expanded_items.iter())
            .enumerate()
            .map(|(i, (it, e))| {
                let changed = expand && !it.from_star && *e != it.expr;
                let alias = if it.alias.is_some() || changed || derive_name(e, i) != names[i] { Some(names[i].clone()) } else { None };
                SelectItem::Expr { expr: e.clone(), alias }
            })
            .collect();
        if expand {
            let expanded_aliases: Vec<(String, Expr)> = items
                .iter()
                .zip(expanded_items.iter())
                .filter_map(|(it, e)| it.alias.as_ref().map(|a| (a.clone(), e.clone())))
                .collect();
            let no_aliases: &[(String, Expr)] = &[];
            let item_expr = |idx: usize, original: &Expr| -> Expr {
                match &expanded_items[idx] {
                    Expr::Literal(Literal::Integer(_)) => original.clone(),
                    e => e.clone(),
                }
            };
            if let Some(from) = &select.from {
                let expand_ref = |t: &ScopeTable| TableRef { name: t.table.qualified_name().parts(), alias: Some(t.alias.clone()) };
                let mut new_from = FromClause { base: expand_ref(&scope.tables[0]), joins: Vec::with_capacity(from.joins.len()) };
                for (i, j) in from.joins.iter().enumerate() {
                    let prefix = scope.prefix(i + 2);
                    new_from.joins.push(Join {
                        kind: j.kind,
                        table: expand_ref(&scope.tables[i + 1]),
                        on: j.on.as_ref().map(|on| self.expand_expr(on, &prefix, no_aliases)),
                    });
                }
                rewritten.from = Some(new_from);
            }
            rewritten.where_clause = select.where_clause.as_ref().map(|w| self.expand_expr(w, &scope, no_aliases));
            let group_alias_exprs = if self.conformance.is_group_by_alias() { expanded_aliases.as_slice() } else { no_aliases };
            rewritten.group_by = select
                .group_by
                .iter()
                .zip(group_refs.iter())
                .map(|(g, r)| match r {
                    Reference::Item(idx) => item_expr(*idx, g),
                    Reference::Expr => self.expand_expr(g, &scope, group_alias_exprs),
                })
                .collect();
            let having_alias_exprs = if self.conformance.is_having_alias() { expanded_aliases.as_slice() } else { no_aliases };
            rewritten.having = select.having.as_ref().map(|h| self.expand_expr(h, &scope, having_alias_exprs));
            rewritten.order_by = select
                .order_by
                .iter()
                .zip(order_refs.iter())
                .map(|(o, r)| {
                    let expr = match r {
                        Reference::Item(idx) if self.config.column_reference_expansion => item_expr(*idx, &o.expr),
                        Reference::Item(_) => o.expr.clone(),
                        Reference::Expr => self.expand_expr(&o.expr, &scope, no_aliases),
                    };
                    OrderItem { expr, asc: o.asc }
                })
                .collect();
        }

        debug!(
            target: "mapd_sql::validate",
            "bound {} tables, {} projections, {} group keys (aggregating={})",
            tables.len(),
            projections.len(),
            group_by.len(),
            aggregating
        );

        Ok(ValidatedQuery {
            select: rewritten,
            row_type,
            bound: BoundSelect {
                tables,
                input_fields,
                filter,
                group_by,
                aggregating,
                projections,
                having,
                distinct: select.distinct,
                order_by,
                limit: select.limit,
                offset: select.offset,
            },
            expanded: expand,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_order_item(
        &self,
        o: &OrderItem,
        scope: &Scope,
        projections: &[TypedExpr],
        names: &[String],
        explicit_aliases: &[&str],
        group_by: &[TypedExpr],
        aggregating: bool,
        distinct: bool,
    ) -> AppResult<(OrderTarget, Reference)> {
        if let Some(n) = ordinal_of(&o.expr) {
            if self.conformance.is_sort_by_ordinal() {
                if n < 1 || n as usize > projections.len() {
                    return Err(invalid_ordinal(n, projections.len()));
                }
                return Ok((OrderTarget::Output(n as usize - 1), Reference::Item(n as usize - 1)));
            }
        }
        if let Expr::Identifier(parts) = &o.expr {
            if let [name] = parts.as_slice() {
                if self.conformance.is_sort_by_alias() {
                    if explicit_aliases.iter().filter(|a| **a == name.as_str()).count() > 1 {
                        return Err(AppError::validation(
                            "ambiguous_column".to_string(),
                            format!("Column '{}' is ambiguous", name),
                        ));
                    }
                    if let Some(pos) = names.iter().position(|n| n == name) {
                        return Ok((OrderTarget::Output(pos), Reference::Item(pos)));
                    }
                }
            }
        }
        let typed = self.validate_expr(&o.expr, &ExprContext::new(scope, Clause::OrderBy))?;
        if !aggregating && typed.contains_aggregate() {
            return Err(AppError::validation(
                "invalid_aggregate".to_string(),
                "Aggregate expression is illegal in ORDER BY clause of non-aggregating SELECT".to_string(),
            ));
        }
        if aggregating {
            check_grouped(&typed, group_by)?;
        }
        match projections.iter().position(|p| *p == typed) {
            Some(pos) => Ok((OrderTarget::Output(pos), Reference::Expr)),
            None if distinct => Err(AppError::validation(
                "not_in_select".to_string(),
                format!("Expression '{}' is not in the select clause", typed),
            )),
            None => Ok((OrderTarget::Hidden(typed), Reference::Expr)),
        }
    }
}
