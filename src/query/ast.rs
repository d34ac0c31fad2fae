use crate::types::SqlType;

/// A parsed `SELECT` statement. Identifiers are stored normalized
/// (unquoted folded to lower case, quoted kept verbatim).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    pub distinct: bool,
    pub items: Vec<SelectItem>,
    pub from: Option<FromClause>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// `*` or `q.*`
    Wildcard { qualifier: Option<Vec<String>> },
    Expr { expr: Expr, alias: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub name: Vec<String>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub base: TableRef,
    pub joins: Vec<Join>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
    // `FROM a, b`
    Comma,
}

impl JoinKind {
    /// Whether columns of the left input become nullable.
    pub fn left_nullable(&self) -> bool { matches!(self, JoinKind::Right | JoinKind::Full) }

    pub fn right_nullable(&self) -> bool { matches!(self, JoinKind::Left | JoinKind::Full) }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableRef,
    pub on: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Expr,
    pub asc: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    /// Exact numeric kept as written, e.g. `12.50`
    Decimal(String),
    /// Approximate numeric kept as written, e.g. `1.5e3`
    Double(String),
    String(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Plus,
    Minus,
    Multiply,
    Divide,
    Concat,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Like,
    NotLike,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Concat => "||",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Like => "LIKE",
            BinaryOp::NotLike => "NOT LIKE",
        }
    }

    /// Name of the operator in the operator table. `NOT LIKE` is checked as `LIKE`.
    pub fn operator_name(&self) -> &'static str {
        match self {
            BinaryOp::NotLike => "LIKE",
            other => other.symbol(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Minus,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Not => "NOT",
            UnaryOp::Minus => "-",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Identifier(Vec<String>),
    Literal(Literal),
    Binary { left: Box<Expr>, op: BinaryOp, right: Box<Expr> },
    Unary { op: UnaryOp, expr: Box<Expr> },
    IsNull { expr: Box<Expr>, negated: bool },
    Between { expr: Box<Expr>, low: Box<Expr>, high: Box<Expr>, negated: bool },
    InList { expr: Box<Expr>, list: Vec<Expr>, negated: bool },
    /// Function or aggregate call; `star` marks `COUNT(*)`. Names are upper case.
    Function { name: String, args: Vec<Expr>, distinct: bool, star: bool },
    Cast { expr: Box<Expr>, ty: SqlType },
    Case { whens: Vec<(Expr, Expr)>, else_expr: Option<Box<Expr>> },
}

fn boxed(e: &Expr, f: &mut dyn FnMut(&Expr) -> Option<Expr>) -> Box<Expr> {
    Box::new(e.transform(f))
}

impl Expr {
    pub fn ident(parts: &[&str]) -> Expr {
        Expr::Identifier(parts.iter().map(|p| p.to_string()).collect())
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
        Expr::Binary { left: Box::new(left), op, right: Box::new(right) }
    }

    pub fn int(v: i64) -> Expr { Expr::Literal(Literal::Integer(v)) }

    pub fn is_literal(&self) -> bool { matches!(self, Expr::Literal(_)) }

    /// Rebuild the tree top-down. Where `f` returns a replacement the subtree is
    /// not visited further.
    pub fn transform(&self, f: &mut dyn FnMut(&Expr) -> Option<Expr>) -> Expr {
        if let Some(replaced) = f(self) {
            return replaced;
        }
        match self {
            Expr::Identifier(_) | Expr::Literal(_) => self.clone(),
            Expr::Binary { left, op, right } => Expr::Binary { left: boxed(left, f), op: *op, right: boxed(right, f) },
            Expr::Unary { op, expr } => Expr::Unary { op: *op, expr: boxed(expr, f) },
            Expr::IsNull { expr, negated } => Expr::IsNull { expr: boxed(expr, f), negated: *negated },
            Expr::Between { expr, low, high, negated } => Expr::Between {
                expr: boxed(expr, f),
                low: boxed(low, f),
                high: boxed(high, f),
                negated: *negated,
            },
            Expr::InList { expr, list, negated } => Expr::InList {
                expr: boxed(expr, f),
                list: list.iter().map(|e| e.transform(f)).collect(),
                negated: *negated,
            },
            Expr::Function { name, args, distinct, star } => Expr::Function {
                name: name.clone(),
                args: args.iter().map(|e| e.transform(f)).collect(),
                distinct: *distinct,
                star: *star,
            },
            Expr::Cast { expr, ty } => Expr::Cast { expr: boxed(expr, f), ty: *ty },
            Expr::Case { whens, else_expr } => Expr::Case {
                whens: whens.iter().map(|(c, v)| (c.transform(f), v.transform(f))).collect(),
                else_expr: else_expr.as_ref().map(|e| boxed(e, f)),
            },
        }
    }
}
