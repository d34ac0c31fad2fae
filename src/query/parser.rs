use tracing::debug;

use crate::conformance::Conformance;
use crate::error::{AppError, AppResult};
use crate::ident::{is_reserved, normalize_identifier};
use crate::query::ast::*;
use crate::query::tokenizer::{tokenize, Token, TokenKind};
use crate::types::SqlType;

/// Recursive-descent parser over a token stream for one `SELECT` statement.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    conformance: Conformance,
}

fn ident_of(value: &str, quoted: bool) -> String {
    if quoted { value.to_string() } else { normalize_identifier(value) }
}

impl Parser {
    pub fn new(sql: &str, conformance: Conformance) -> AppResult<Self> {
        Ok(Self { tokens: tokenize(sql)?, pos: 0, conformance })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos < self.tokens.len() - 1 { self.pos += 1; }
        t
    }

    fn error_here(&self, msg: &str) -> AppError {
        let t = self.peek();
        AppError::syntax("syntax_error".to_string(), format!("{} near '{}' at offset {}", msg, t.describe(), t.offset))
    }

    fn conformance_error(&self, what: &str) -> AppError {
        AppError::validation(
            "conformance".to_string(),
            format!("{} is not allowed under the current SQL conformance level ({})", what, self.conformance),
        )
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.peek().is_keyword(kw) { self.pos += 1; true } else { false }
    }

    fn eat_symbol(&mut self, sym: &str) -> bool {
        if self.peek().is_symbol(sym) { self.pos += 1; true } else { false }
    }

    fn expect_keyword(&mut self, kw: &str) -> AppResult<()> {
        if self.eat_keyword(kw) { Ok(()) } else { Err(self.error_here(&format!("Expected {}", kw))) }
    }

    fn expect_symbol(&mut self, sym: &str) -> AppResult<()> {
        if self.eat_symbol(sym) { Ok(()) } else { Err(self.error_here(&format!("Expected '{}'", sym))) }
    }

    /// Word usable as an identifier: any quoted word, or an unquoted non-reserved one.
    fn peek_identifier(&self) -> bool {
        match &self.peek().kind {
            TokenKind::Word { quoted: true, .. } => true,
            TokenKind::Word { value, quoted: false } => !is_reserved(value),
            _ => false,
        }
    }

    fn parse_identifier(&mut self) -> AppResult<String> {
        if !self.peek_identifier() {
            return Err(self.error_here("Expected identifier"));
        }
        match self.advance().kind {
            TokenKind::Word { value, quoted } => Ok(ident_of(&value, quoted)),
            _ => Err(self.error_here("Expected identifier")),
        }
    }

    fn parse_compound_identifier(&mut self) -> AppResult<Vec<String>> {
        let mut parts = vec![self.parse_identifier()?];
        while self.peek().is_symbol(".") && !self.peek_at(1).is_symbol("*") {
            self.pos += 1;
            parts.push(self.parse_identifier()?);
        }
        Ok(parts)
    }

    fn parse_optional_alias(&mut self) -> AppResult<Option<String>> {
        if self.eat_keyword("AS") {
            return Ok(Some(self.parse_identifier()?));
        }
        if self.peek_identifier() {
            return Ok(Some(self.parse_identifier()?));
        }
        Ok(None)
    }

    fn parse_unsigned(&mut self, what: &str) -> AppResult<u64> {
        match &self.peek().kind {
            TokenKind::Number(n) => {
                let v = n.parse::<u64>().map_err(|_| self.error_here(&format!("{} must be a non-negative integer", what)))?;
                self.pos += 1;
                Ok(v)
            }
            _ => Err(self.error_here(&format!("{} must be a non-negative integer", what))),
        }
    }

    pub fn parse_statement(&mut self) -> AppResult<Select> {
        let select = self.parse_select()?;
        self.eat_symbol(";");
        if !matches!(self.peek().kind, TokenKind::Eof) {
            return Err(self.error_here("Unexpected trailing input"));
        }
        Ok(select)
    }

    fn parse_select(&mut self) -> AppResult<Select> {
        self.expect_keyword("SELECT")?;
        let mut q = Select::default();
        if self.eat_keyword("DISTINCT") {
            q.distinct = true;
        } else {
            self.eat_keyword("ALL");
        }
        loop {
            q.items.push(self.parse_select_item()?);
            if !self.eat_symbol(",") { break; }
        }
        if self.eat_keyword("FROM") {
            q.from = Some(self.parse_from()?);
        }
        if self.eat_keyword("WHERE") {
            q.where_clause = Some(self.parse_expr()?);
        }
        if self.eat_keyword("GROUP") {
            self.expect_keyword("BY")?;
            loop {
                q.group_by.push(self.parse_expr()?);
                if !self.eat_symbol(",") { break; }
            }
        }
        if self.eat_keyword("HAVING") {
            q.having = Some(self.parse_expr()?);
        }
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let expr = self.parse_expr()?;
                let asc = if self.eat_keyword("DESC") { false } else { self.eat_keyword("ASC"); true };
                q.order_by.push(OrderItem { expr, asc });
                if !self.eat_symbol(",") { break; }
            }
        }
        if self.eat_keyword("LIMIT") {
            let first = self.parse_unsigned("LIMIT")?;
            if self.peek().is_symbol(",") {
                if !self.conformance.is_limit_start_count_allowed() {
                    return Err(self.conformance_error("LIMIT start, count"));
                }
                self.pos += 1;
                q.offset = Some(first);
                q.limit = Some(self.parse_unsigned("LIMIT")?);
            } else {
                q.limit = Some(first);
            }
        }
        if self.eat_keyword("OFFSET") {
            if q.offset.is_some() {
                return Err(self.error_here("OFFSET specified twice"));
            }
            q.offset = Some(self.parse_unsigned("OFFSET")?);
        }
        Ok(q)
    }

    fn parse_select_item(&mut self) -> AppResult<SelectItem> {
        if self.eat_symbol("*") {
            return Ok(SelectItem::Wildcard { qualifier: None });
        }
        // q.* lookahead: word (. word)* . *
        let mut n = 0usize;
        while matches!(self.peek_at(n).kind, TokenKind::Word { .. }) && self.peek_at(n + 1).is_symbol(".") {
            if self.peek_at(n + 2).is_symbol("*") {
                let qualifier = self.parse_compound_identifier()?;
                self.expect_symbol(".")?;
                self.expect_symbol("*")?;
                return Ok(SelectItem::Wildcard { qualifier: Some(qualifier) });
            }
            n += 2;
        }
        let expr = self.parse_expr()?;
        let alias = self.parse_optional_alias()?;
        Ok(SelectItem::Expr { expr, alias })
    }

    fn parse_table_ref(&mut self) -> AppResult<TableRef> {
        let name = self.parse_compound_identifier()?;
        let alias = self.parse_optional_alias()?;
        Ok(TableRef { name, alias })
    }

    fn parse_from(&mut self) -> AppResult<FromClause> {
        let base = self.parse_table_ref()?;
        let mut joins = Vec::new();
        loop {
            let kind = if self.eat_symbol(",") {
                JoinKind::Comma
            } else if self.eat_keyword("CROSS") {
                self.expect_keyword("JOIN")?;
                JoinKind::Cross
            } else if self.eat_keyword("JOIN") {
                JoinKind::Inner
            } else if self.eat_keyword("INNER") {
                self.expect_keyword("JOIN")?;
                JoinKind::Inner
            } else if self.peek().is_keyword("LEFT") || self.peek().is_keyword("RIGHT") || self.peek().is_keyword("FULL") {
                let kind = match self.advance().kind {
                    TokenKind::Word { value, .. } if value.eq_ignore_ascii_case("LEFT") => JoinKind::Left,
                    TokenKind::Word { value, .. } if value.eq_ignore_ascii_case("RIGHT") => JoinKind::Right,
                    _ => JoinKind::Full,
                };
                self.eat_keyword("OUTER");
                self.expect_keyword("JOIN")?;
                kind
            } else {
                break;
            };
            let table = self.parse_table_ref()?;
            let on = match kind {
                JoinKind::Comma | JoinKind::Cross => None,
                _ => {
                    self.expect_keyword("ON")?;
                    Some(self.parse_expr()?)
                }
            };
            joins.push(Join { kind, table, on });
        }
        Ok(FromClause { base, joins })
    }

    pub fn parse_expr(&mut self) -> AppResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> AppResult<Expr> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("OR") {
            let right = self.parse_and()?;
            left = Expr::binary(left, BinaryOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> AppResult<Expr> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("AND") {
            let right = self.parse_not()?;
            left = Expr::binary(left, BinaryOp::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> AppResult<Expr> {
        if self.eat_keyword("NOT") {
            let expr = self.parse_not()?;
            return Ok(Expr::Unary { op: UnaryOp::Not, expr: Box::new(expr) });
        }
        self.parse_comparison()
    }

    fn comparison_op(&mut self) -> AppResult<Option<BinaryOp>> {
        let op = match &self.peek().kind {
            TokenKind::Symbol("=") => BinaryOp::Eq,
            TokenKind::Symbol("<>") => BinaryOp::NotEq,
            TokenKind::Symbol("!=") => {
                if !self.conformance.is_bang_equal_allowed() {
                    return Err(self.conformance_error("Bang equal '!='"));
                }
                BinaryOp::NotEq
            }
            TokenKind::Symbol("<") => BinaryOp::Lt,
            TokenKind::Symbol("<=") => BinaryOp::LtEq,
            TokenKind::Symbol(">") => BinaryOp::Gt,
            TokenKind::Symbol(">=") => BinaryOp::GtEq,
            _ => return Ok(None),
        };
        self.pos += 1;
        Ok(Some(op))
    }

    fn parse_comparison(&mut self) -> AppResult<Expr> {
        let left = self.parse_additive()?;
        if let Some(op) = self.comparison_op()? {
            let right = self.parse_additive()?;
            return Ok(Expr::binary(left, op, right));
        }
        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(Expr::IsNull { expr: Box::new(left), negated });
        }
        let negated = if self.peek().is_keyword("NOT")
            && (self.peek_at(1).is_keyword("LIKE") || self.peek_at(1).is_keyword("BETWEEN") || self.peek_at(1).is_keyword("IN"))
        {
            self.pos += 1;
            true
        } else {
            false
        };
        if self.eat_keyword("LIKE") {
            let right = self.parse_additive()?;
            let op = if negated { BinaryOp::NotLike } else { BinaryOp::Like };
            return Ok(Expr::binary(left, op, right));
        }
        if self.eat_keyword("BETWEEN") {
            let low = self.parse_additive()?;
            self.expect_keyword("AND")?;
            let high = self.parse_additive()?;
            return Ok(Expr::Between { expr: Box::new(left), low: Box::new(low), high: Box::new(high), negated });
        }
        if self.eat_keyword("IN") {
            self.expect_symbol("(")?;
            let mut list = vec![self.parse_expr()?];
            while self.eat_symbol(",") {
                list.push(self.parse_expr()?);
            }
            self.expect_symbol(")")?;
            return Ok(Expr::InList { expr: Box::new(left), list, negated });
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> AppResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.eat_symbol("+") {
                BinaryOp::Plus
            } else if self.eat_symbol("-") {
                BinaryOp::Minus
            } else if self.eat_symbol("||") {
                BinaryOp::Concat
            } else {
                break;
            };
            let right = self.parse_multiplicative()?;
            left = Expr::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> AppResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            if self.eat_symbol("*") {
                let right = self.parse_unary()?;
                left = Expr::binary(left, BinaryOp::Multiply, right);
            } else if self.eat_symbol("/") {
                let right = self.parse_unary()?;
                left = Expr::binary(left, BinaryOp::Divide, right);
            } else if self.peek().is_symbol("%") {
                if !self.conformance.is_percent_remainder_allowed() {
                    return Err(self.conformance_error("Percent remainder '%'"));
                }
                self.pos += 1;
                let right = self.parse_unary()?;
                left = Expr::Function { name: "MOD".to_string(), args: vec![left, right], distinct: false, star: false };
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> AppResult<Expr> {
        if self.eat_symbol("-") {
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary { op: UnaryOp::Minus, expr: Box::new(expr) });
        }
        if self.eat_symbol("+") {
            return self.parse_unary();
        }
        self.parse_primary()
    }

    fn parse_number(&mut self, text: &str) -> AppResult<Expr> {
        let lit = if text.contains(|c: char| c == 'e' || c == 'E') {
            Literal::Double(text.to_string())
        } else if text.contains('.') {
            Literal::Decimal(text.to_string())
        } else {
            match text.parse::<i64>() {
                Ok(v) => Literal::Integer(v),
                Err(_) => Literal::Decimal(text.to_string()),
            }
        };
        Ok(Expr::Literal(lit))
    }

    fn parse_type(&mut self) -> AppResult<SqlType> {
        let start = self.peek().offset;
        let mut text = String::new();
        while let TokenKind::Word { value, quoted: false } = &self.peek().kind {
            if !text.is_empty() { text.push(' '); }
            text.push_str(value);
            self.pos += 1;
        }
        if text.is_empty() {
            return Err(self.error_here("Expected type name"));
        }
        if self.eat_symbol("(") {
            let mut params = Vec::new();
            loop {
                params.push(self.parse_unsigned("Type parameter")?.to_string());
                if !self.eat_symbol(",") { break; }
            }
            self.expect_symbol(")")?;
            text = format!("{}({})", text, params.join(","));
        }
        text.parse::<SqlType>().map_err(|e| {
            AppError::syntax("syntax_error".to_string(), format!("{} at offset {}", e.message(), start))
        })
    }

    fn parse_function_call(&mut self, name: String) -> AppResult<Expr> {
        self.expect_symbol("(")?;
        let upper = name.to_ascii_uppercase();
        if self.eat_symbol("*") {
            self.expect_symbol(")")?;
            return Ok(Expr::Function { name: upper, args: Vec::new(), distinct: false, star: true });
        }
        let distinct = self.eat_keyword("DISTINCT");
        if !distinct { self.eat_keyword("ALL"); }
        let mut args = Vec::new();
        if !self.peek().is_symbol(")") {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat_symbol(",") { break; }
            }
        }
        self.expect_symbol(")")?;
        Ok(Expr::Function { name: upper, args, distinct, star: false })
    }

    fn parse_case(&mut self) -> AppResult<Expr> {
        let mut whens = Vec::new();
        while self.eat_keyword("WHEN") {
            let cond = self.parse_expr()?;
            self.expect_keyword("THEN")?;
            let value = self.parse_expr()?;
            whens.push((cond, value));
        }
        if whens.is_empty() {
            return Err(self.error_here("Expected WHEN"));
        }
        let else_expr = if self.eat_keyword("ELSE") { Some(Box::new(self.parse_expr()?)) } else { None };
        self.expect_keyword("END")?;
        Ok(Expr::Case { whens, else_expr })
    }

    fn parse_primary(&mut self) -> AppResult<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Number(n) => {
                self.pos += 1;
                self.parse_number(&n)
            }
            TokenKind::Str(s) => {
                self.pos += 1;
                Ok(Expr::Literal(Literal::String(s)))
            }
            TokenKind::Symbol("(") => {
                self.pos += 1;
                let e = self.parse_expr()?;
                self.expect_symbol(")")?;
                Ok(e)
            }
            TokenKind::Word { ref value, quoted: false } if is_reserved(value) => {
                let upper = value.to_ascii_uppercase();
                match upper.as_str() {
                    "NULL" => { self.pos += 1; Ok(Expr::Literal(Literal::Null)) }
                    "TRUE" => { self.pos += 1; Ok(Expr::Literal(Literal::Boolean(true))) }
                    "FALSE" => { self.pos += 1; Ok(Expr::Literal(Literal::Boolean(false))) }
                    "CASE" => { self.pos += 1; self.parse_case() }
                    "CAST" => {
                        self.pos += 1;
                        self.expect_symbol("(")?;
                        let expr = self.parse_expr()?;
                        self.expect_keyword("AS")?;
                        let ty = self.parse_type()?;
                        self.expect_symbol(")")?;
                        Ok(Expr::Cast { expr: Box::new(expr), ty })
                    }
                    _ => Err(self.error_here("Unexpected keyword")),
                }
            }
            TokenKind::Word { ref value, quoted } => {
                if !quoted && self.peek_at(1).is_symbol("(") {
                    let name = value.clone();
                    self.pos += 1;
                    return self.parse_function_call(name);
                }
                Ok(Expr::Identifier(self.parse_compound_identifier()?))
            }
            _ => Err(self.error_here("Expected expression")),
        }
    }
}

/// Parse one `SELECT` statement under the default conformance.
pub fn parse(sql: &str) -> AppResult<Select> {
    parse_with_conformance(sql, Conformance::Default)
}

pub fn parse_with_conformance(sql: &str, conformance: Conformance) -> AppResult<Select> {
    let cleaned = crate::query::strip_sql_comments(sql);
    let mut parser = Parser::new(&cleaned, conformance)?;
    let select = parser.parse_statement()?;
    debug!(target: "mapd_sql::parse", "parsed select with {} items under {}", select.items.len(), conformance);
    Ok(select)
}
