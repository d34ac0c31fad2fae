use std::sync::Arc;

use crate::catalog::TableDescriptor;
use crate::error::{AppError, AppResult};
use crate::ident::format_compound;
use crate::types::RelDataType;

/// One table visible in a FROM scope.
#[derive(Debug, Clone)]
pub struct ScopeTable {
    pub alias: String,
    /// The alias was written in the query rather than derived from the table name.
    pub explicit_alias: bool,
    pub table: Arc<TableDescriptor>,
    pub offset: usize,
    /// Null-supplying side of an outer join.
    pub nullable: bool,
}

impl ScopeTable {
    fn matches_qualifier(&self, qualifier: &[String]) -> bool {
        match qualifier {
            [a] => a == &self.alias,
            [s, t] => !self.explicit_alias && s == &self.table.schema && t == &self.table.name,
            [d, s, t] => !self.explicit_alias && d == &self.table.database && s == &self.table.schema && t == &self.table.name,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedColumn {
    pub input: usize,
    pub qualifier: String,
    pub column: String,
    pub column_id: i32,
    pub ty: RelDataType,
}

/// Tables of a FROM clause in join order.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub tables: Vec<ScopeTable>,
}

impl Scope {
    pub fn width(&self) -> usize {
        self.tables.last().map(|t| t.offset + t.table.columns.len()).unwrap_or(0)
    }

    /// The first `n` tables; ON conditions only see what has been joined so far.
    pub fn prefix(&self, n: usize) -> Scope {
        Scope { tables: self.tables[..n.min(self.tables.len())].to_vec() }
    }

    pub fn find_table(&self, qualifier: &[String]) -> Option<&ScopeTable> {
        self.tables.iter().find(|t| t.matches_qualifier(qualifier))
    }

    fn column_of(t: &ScopeTable, name: &str) -> Option<ResolvedColumn> {
        let idx = t.table.columns.iter().position(|c| c.name == name)?;
        let col = &t.table.columns[idx];
        Some(ResolvedColumn {
            input: t.offset + idx,
            qualifier: t.alias.clone(),
            column: col.name.clone(),
            column_id: col.column_id,
            ty: RelDataType::new(col.ty.sql_type, col.ty.nullable || t.nullable),
        })
    }

    fn available_columns(&self) -> Vec<String> {
        let mut list: Vec<String> = self
            .tables
            .iter()
            .flat_map(|t| t.table.columns.iter().map(move |c| format!("{}.{}", t.alias, c.name)))
            .collect();
        list.sort_unstable();
        list
    }

    fn column_not_found(&self, name: &[String], table: Option<&ScopeTable>) -> AppError {
        let display = format_compound(name);
        let mut msg = match table {
            Some(t) => format!("Column '{}' not found in table '{}'", display, t.alias),
            None => format!("Column '{}' not found in any table", display),
        };
        let last = name.last().map(|s| s.as_str()).unwrap_or_default();
        let matches: Vec<String> = self
            .tables
            .iter()
            .flat_map(|t| t.table.columns.iter().filter(|c| c.name.eq_ignore_ascii_case(last)).map(move |c| format!("{}.{}", t.alias, c.name)))
            .collect();
        if matches.len() == 1 {
            msg.push_str(&format!(". Did you mean '{}'?", matches[0]));
        }
        let cols = self.available_columns();
        if !cols.is_empty() {
            let shown: Vec<&str> = cols.iter().take(50).map(|s| s.as_str()).collect();
            msg.push_str(&format!(". Available columns: [{}]{}", shown.join(", "), if cols.len() > 50 { " (truncated)" } else { "" }));
        }
        AppError::not_found("unknown_column".to_string(), msg)
    }

    /// Resolve a possibly qualified column identifier.
    pub fn resolve(&self, name: &[String]) -> AppResult<ResolvedColumn> {
        match name {
            [] => Err(AppError::internal("internal_error", "Empty identifier")),
            [col] => {
                let mut found: Vec<ResolvedColumn> = self.tables.iter().filter_map(|t| Self::column_of(t, col)).collect();
                match found.len() {
                    0 => Err(self.column_not_found(name, None)),
                    1 => Ok(found.remove(0)),
                    _ => Err(AppError::validation(
                        "ambiguous_column".to_string(),
                        format!(
                            "Column '{}' is ambiguous; it exists in {}",
                            col,
                            found.iter().map(|f| f.qualifier.as_str()).collect::<Vec<_>>().join(", ")
                        ),
                    )),
                }
            }
            [qualifier @ .., col] if qualifier.len() <= 3 => {
                let t = self.find_table(qualifier).ok_or_else(|| {
                    AppError::not_found("unknown_table".to_string(), format!("Table '{}' not found", format_compound(qualifier)))
                })?;
                Self::column_of(t, col).ok_or_else(|| self.column_not_found(name, Some(t)))
            }
            _ => Err(AppError::not_found(
                "unknown_column".to_string(),
                format!("Column '{}' has too many components", format_compound(name)),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnDescriptor;
    use crate::types::SqlType;

    fn table(id: i32, name: &str, cols: &[&str]) -> Arc<TableDescriptor> {
        Arc::new(TableDescriptor {
            table_id: id,
            database: "mapd".into(),
            schema: "public".into(),
            name: name.into(),
            columns: cols
                .iter()
                .enumerate()
                .map(|(i, c)| ColumnDescriptor { column_id: i as i32 + 1, name: c.to_string(), ty: RelDataType::not_null(SqlType::Integer) })
                .collect(),
        })
    }

    fn scope() -> Scope {
        Scope {
            tables: vec![
                ScopeTable { alias: "emp".into(), explicit_alias: false, table: table(1, "emp", &["empno", "deptno"]), offset: 0, nullable: false },
                ScopeTable { alias: "d".into(), explicit_alias: true, table: table(2, "dept", &["deptno", "dname"]), offset: 2, nullable: true },
            ],
        }
    }

    fn n(parts: &[&str]) -> Vec<String> { parts.iter().map(|p| p.to_string()).collect() }

    #[test]
    fn resolves_simple_and_qualified() {
        let s = scope();
        assert_eq!(s.width(), 4);
        let c = s.resolve(&n(&["empno"])).unwrap();
        assert_eq!((c.input, c.qualifier.as_str()), (0, "emp"));
        let c = s.resolve(&n(&["d", "dname"])).unwrap();
        assert_eq!(c.input, 3);
        assert!(c.ty.nullable);
        let c = s.resolve(&n(&["mapd", "public", "emp", "deptno"])).unwrap();
        assert_eq!(c.input, 1);
        assert_eq!(s.resolve(&n(&["public", "emp", "empno"])).unwrap().column_id, 1);
    }

    #[test]
    fn resolution_errors() {
        let s = scope();
        let err = s.resolve(&n(&["deptno"])).unwrap_err();
        assert_eq!(err.code_str(), "ambiguous_column");
        let err = s.resolve(&n(&["salary"])).unwrap_err();
        assert_eq!(err.code_str(), "unknown_column");
        assert!(err.message().contains("Available columns: [d.deptno, d.dname, emp.deptno, emp.empno]"));
        let err = s.resolve(&n(&["dept", "dname"])).unwrap_err();
        assert_eq!(err.code_str(), "unknown_table");
        let err = s.resolve(&n(&["public", "dept", "dname"])).unwrap_err();
        assert_eq!(err.code_str(), "unknown_table");
        let err = s.resolve(&n(&["emp", "Empno"])).unwrap_err();
        assert!(err.message().contains("Did you mean 'emp.empno'?"));
        assert!(s.prefix(1).resolve(&n(&["dname"])).is_err());
    }
}
