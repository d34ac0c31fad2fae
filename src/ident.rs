//! Identifier normalization and qualification utilities
//! -----------------------------------------------------
//! Single source of truth for folding SQL identifiers, filling in the default
//! database/schema of table names and writing identifiers back out as SQL.

use std::fmt::{Display, Formatter};

use crate::error::{AppError, AppResult};

pub const DEFAULT_DB: &str = "mapd";
pub const DEFAULT_SCHEMA: &str = "public";

/// Words that can never be used as bare identifiers or implicit aliases.
pub const RESERVED_WORDS: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CAST", "CROSS", "DESC", "DISTINCT",
    "ELSE", "END", "FALSE", "FROM", "FULL", "GROUP", "HAVING", "IN", "INNER", "IS", "JOIN",
    "LEFT", "LIKE", "LIMIT", "NOT", "NULL", "OFFSET", "ON", "OR", "ORDER", "OUTER", "RIGHT",
    "SELECT", "THEN", "TRUE", "UNION", "WHEN", "WHERE",
];

pub fn is_reserved(word: &str) -> bool {
    RESERVED_WORDS.iter().any(|w| w.eq_ignore_ascii_case(word))
}

/// Normalize an identifier according to SQL rules:
/// - If enclosed in double-quotes, strip quotes, unescape `""` and preserve case
/// - Otherwise, convert to lowercase for case-insensitive matching
pub fn normalize_identifier(ident: &str) -> String {
    let trimmed = ident.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].replace("\"\"", "\"")
    } else {
        trimmed.to_ascii_lowercase()
    }
}

/// True when `ident` must be double-quoted to survive a parse round trip.
pub fn needs_quoting(ident: &str) -> bool {
    let mut chars = ident.chars();
    let first_ok = match chars.next() {
        Some(c) => c.is_ascii_lowercase() || c == '_',
        None => return true,
    };
    if !first_ok { return true; }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$') {
        return true;
    }
    is_reserved(ident)
}

pub fn quote_identifier(ident: &str) -> String {
    if needs_quoting(ident) {
        format!("\"{}\"", ident.replace('"', "\"\""))
    } else {
        ident.to_string()
    }
}

/// Write a compound identifier (`a.b.c`) quoting each component as needed.
pub fn format_compound(parts: &[String]) -> String {
    parts.iter().map(|p| quote_identifier(p)).collect::<Vec<_>>().join(".")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDefaults {
    pub current_database: String,
    pub current_schema: String,
}

impl Default for QueryDefaults {
    fn default() -> Self { Self::new(DEFAULT_DB, DEFAULT_SCHEMA) }
}

impl QueryDefaults {
    pub fn new(db: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            current_database: normalize_identifier(&db.into()),
            current_schema: normalize_identifier(&schema.into()),
        }
    }
    pub fn from_options(db: Option<&str>, schema: Option<&str>) -> Self {
        Self::new(db.unwrap_or(DEFAULT_DB), schema.unwrap_or(DEFAULT_SCHEMA))
    }
}

/// Canonical `<database>.<schema>.<table>` name of a catalog table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    pub database: String,
    pub schema: String,
    pub table: String,
}

impl QualifiedName {
    pub fn new(database: impl Into<String>, schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self { database: database.into(), schema: schema.into(), table: table.into() }
    }

    pub fn parts(&self) -> Vec<String> {
        vec![self.database.clone(), self.schema.clone(), self.table.clone()]
    }
}

impl Display for QualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_compound(&self.parts()))
    }
}

/// Qualify already-normalized name components with defaults.
/// `t` -> `db.schema.t`, `s.t` -> `db.s.t`, `d.s.t` stays as given.
pub fn qualify_table_name(parts: &[String], d: &QueryDefaults) -> AppResult<QualifiedName> {
    match parts {
        [t] => Ok(QualifiedName::new(d.current_database.clone(), d.current_schema.clone(), t.clone())),
        [s, t] => Ok(QualifiedName::new(d.current_database.clone(), s.clone(), t.clone())),
        [db, s, t] => Ok(QualifiedName::new(db.clone(), s.clone(), t.clone())),
        [] => Err(AppError::syntax("syntax_error", "Empty table name")),
        _ => Err(AppError::not_found(
            "unknown_table".to_string(),
            format!("Table name '{}' has too many components", format_compound(parts)),
        )),
    }
}

/// Qualify a raw dotted name such as `Sales."People"`. Convenience for callers outside the parser.
pub fn qualify_raw_table_ident(ident: &str, d: &QueryDefaults) -> AppResult<QualifiedName> {
    let parts = split_compound(ident);
    qualify_table_name(&parts, d)
}

/// Split a dotted identifier honoring double quotes, normalizing each component.
pub fn split_compound(ident: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut in_quote = false;
    let mut chars = ident.trim().chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quote && chars.peek() == Some(&'"') => {
                buf.push_str("\"\"");
                chars.next();
            }
            '"' => { in_quote = !in_quote; buf.push(ch); }
            '.' if !in_quote => {
                out.push(normalize_identifier(&buf));
                buf.clear();
            }
            _ => buf.push(ch),
        }
    }
    if !buf.trim().is_empty() || !out.is_empty() {
        out.push(normalize_identifier(&buf));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_identifier_handles_quotes_and_case() {
        assert_eq!(normalize_identifier("Foo"), "foo");
        assert_eq!(normalize_identifier("  Foo  "), "foo");
        assert_eq!(normalize_identifier("\"MiXeD\""), "MiXeD");
        assert_eq!(normalize_identifier("\"a\"\"b\""), "a\"b");
        assert_eq!(normalize_identifier("simple_name"), "simple_name");
    }

    #[test]
    fn quoting_only_when_needed() {
        assert_eq!(quote_identifier("emp"), "emp");
        assert_eq!(quote_identifier("Emp"), "\"Emp\"");
        assert_eq!(quote_identifier("select"), "\"select\"");
        assert_eq!(quote_identifier("two words"), "\"two words\"");
        assert_eq!(quote_identifier("1abc"), "\"1abc\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(format_compound(&["mapd".into(), "public".into(), "Emp".into()]), "mapd.public.\"Emp\"");
    }

    #[test]
    fn qualify_bare_and_partial() {
        let d = QueryDefaults::new("Mapd", "Public");
        let q = qualify_raw_table_ident("Emp", &d).unwrap();
        assert_eq!(q, QualifiedName::new("mapd", "public", "emp"));
        let q = qualify_raw_table_ident("Sales.Emp", &d).unwrap();
        assert_eq!(q.to_string(), "mapd.sales.emp");
        let q = qualify_raw_table_ident("acme.sales.\"Emp\"", &d).unwrap();
        assert_eq!(q.to_string(), "acme.sales.\"Emp\"");
        assert!(qualify_raw_table_ident("a.b.c.d", &d).is_err());
    }

    #[test]
    fn split_compound_respects_quotes() {
        assert_eq!(split_compound("a.\"B.c\".d"), vec!["a", "B.c", "d"]);
        assert_eq!(split_compound("X"), vec!["x"]);
        assert!(split_compound("   ").is_empty());
    }

    #[test]
    fn defaults_are_normalized() {
        let d = QueryDefaults::from_options(None, Some("Sales"));
        assert_eq!(d.current_database, "mapd");
        assert_eq!(d.current_schema, "sales");
    }
}
