//! Canonical SQL text for the AST. Binary operators are fully parenthesized so
//! the output re-parses to the same tree.

use std::fmt::{Display, Formatter, Result};

use crate::ident::{format_compound, quote_identifier};
use crate::query::ast::*;

fn join_list<T: Display>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Literal::Integer(v) => write!(f, "{}", v),
            Literal::Decimal(s) | Literal::Double(s) => f.write_str(s),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Boolean(true) => f.write_str("TRUE"),
            Literal::Boolean(false) => f.write_str("FALSE"),
            Literal::Null => f.write_str("NULL"),
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Expr::Identifier(parts) => f.write_str(&format_compound(parts)),
            Expr::Literal(l) => write!(f, "{}", l),
            Expr::Binary { left, op, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expr::Unary { op: UnaryOp::Not, expr } => write!(f, "(NOT {})", expr),
            Expr::Unary { op: UnaryOp::Minus, expr } => write!(f, "(- {})", expr),
            Expr::IsNull { expr, negated } => {
                write!(f, "({} IS {}NULL)", expr, if *negated { "NOT " } else { "" })
            }
            Expr::Between { expr, low, high, negated } => {
                write!(f, "({} {}BETWEEN {} AND {})", expr, if *negated { "NOT " } else { "" }, low, high)
            }
            Expr::InList { expr, list, negated } => {
                write!(f, "({} {}IN ({}))", expr, if *negated { "NOT " } else { "" }, join_list(list))
            }
            Expr::Function { name, star: true, .. } => write!(f, "{}(*)", name),
            Expr::Function { name, args, distinct, .. } => {
                write!(f, "{}({}{})", name, if *distinct { "DISTINCT " } else { "" }, join_list(args))
            }
            Expr::Cast { expr, ty } => write!(f, "CAST({} AS {})", expr, ty),
            Expr::Case { whens, else_expr } => {
                f.write_str("CASE")?;
                for (c, v) in whens {
                    write!(f, " WHEN {} THEN {}", c, v)?;
                }
                if let Some(e) = else_expr {
                    write!(f, " ELSE {}", e)?;
                }
                f.write_str(" END")
            }
        }
    }
}

impl Display for SelectItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            SelectItem::Wildcard { qualifier: None } => f.write_str("*"),
            SelectItem::Wildcard { qualifier: Some(q) } => write!(f, "{}.*", format_compound(q)),
            SelectItem::Expr { expr, alias: None } => write!(f, "{}", expr),
            SelectItem::Expr { expr, alias: Some(a) } => write!(f, "{} AS {}", expr, quote_identifier(a)),
        }
    }
}

impl Display for TableRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str(&format_compound(&self.name))?;
        if let Some(a) = &self.alias {
            write!(f, " AS {}", quote_identifier(a))?;
        }
        Ok(())
    }
}

impl Display for Join {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let kw = match self.kind {
            JoinKind::Comma => return write!(f, ", {}", self.table),
            JoinKind::Cross => return write!(f, " CROSS JOIN {}", self.table),
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
        };
        write!(f, " {} {}", kw, self.table)?;
        if let Some(on) = &self.on {
            write!(f, " ON {}", on)?;
        }
        Ok(())
    }
}

impl Display for OrderItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        if self.asc { write!(f, "{}", self.expr) } else { write!(f, "{} DESC", self.expr) }
    }
}

impl Display for Select {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str("SELECT ")?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        f.write_str(&join_list(&self.items))?;
        if let Some(from) = &self.from {
            write!(f, " FROM {}", from.base)?;
            for j in &from.joins {
                write!(f, "{}", j)?;
            }
        }
        if let Some(w) = &self.where_clause {
            write!(f, " WHERE {}", w)?;
        }
        if !self.group_by.is_empty() {
            write!(f, " GROUP BY {}", join_list(&self.group_by))?;
        }
        if let Some(h) = &self.having {
            write!(f, " HAVING {}", h)?;
        }
        if !self.order_by.is_empty() {
            write!(f, " ORDER BY {}", join_list(&self.order_by))?;
        }
        if let Some(l) = self.limit {
            write!(f, " LIMIT {}", l)?;
        }
        if let Some(o) = self.offset {
            write!(f, " OFFSET {}", o)?;
        }
        Ok(())
    }
}
