//! SQL front end: comment stripping, tokenizing, parsing a `SELECT` dialect into
//! an AST, and writing the AST back out as canonical SQL.

pub mod ast;
mod parser;
pub mod query_common;
mod tokenizer;
mod unparse;

pub use ast::{BinaryOp, Expr, FromClause, Join, JoinKind, Literal, OrderItem, Select, SelectItem, TableRef, UnaryOp};
pub use parser::{parse, parse_with_conformance};
pub use query_common::strip_sql_comments;
pub use tokenizer::{tokenize, Token, TokenKind};

#[cfg(test)]
mod tests;
