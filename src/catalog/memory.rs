use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{CatalogReader, ColumnDescriptor, TableDescriptor};
use crate::error::{AppError, AppResult};
use crate::ident::{normalize_identifier, QualifiedName, QueryDefaults, DEFAULT_DB, DEFAULT_SCHEMA};
use crate::operators::FunctionSpec;
use crate::types::{RelDataType, SqlType};

/// On-disk catalog description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub tables: Vec<TableSpec>,
    #[serde(default)]
    pub functions: Vec<FunctionSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    pub columns: Vec<ColumnSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: SqlType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool { true }

impl ColumnSpec {
    pub fn new(name: &str, sql_type: SqlType, nullable: bool) -> Self {
        Self { name: name.to_string(), sql_type, nullable }
    }
}

#[derive(Default)]
struct Tables {
    by_name: HashMap<QualifiedName, Arc<TableDescriptor>>,
    by_id: HashMap<i32, Arc<TableDescriptor>>,
    next_id: i32,
}

/// Thread-safe in-memory catalog. Table ids are assigned from 1 in insertion order,
/// column ids from 1 in declaration order.
pub struct InMemoryCatalog {
    defaults: QueryDefaults,
    tables: RwLock<Tables>,
    functions: Vec<FunctionSpec>,
}

impl std::fmt::Debug for InMemoryCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCatalog")
            .field("defaults", &self.defaults)
            .field("tables", &self.table_names())
            .field("functions", &self.functions)
            .finish()
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self { Self::new(QueryDefaults::default()) }
}

impl InMemoryCatalog {
    pub fn new(defaults: QueryDefaults) -> Self {
        Self { defaults, tables: RwLock::new(Tables { next_id: 1, ..Default::default() }), functions: Vec::new() }
    }

    /// Register a table. Missing database/schema fall back to the catalog defaults.
    pub fn add_table(&self, database: Option<&str>, schema: Option<&str>, name: &str, columns: &[ColumnSpec]) -> AppResult<i32> {
        let qualified = QualifiedName::new(
            database.map(normalize_identifier).unwrap_or_else(|| self.defaults.current_database.clone()),
            schema.map(normalize_identifier).unwrap_or_else(|| self.defaults.current_schema.clone()),
            normalize_identifier(name),
        );
        if qualified.table.is_empty() {
            return Err(AppError::config("invalid_catalog", "Table name must not be empty"));
        }
        let mut descriptors: Vec<ColumnDescriptor> = Vec::with_capacity(columns.len());
        for (i, c) in columns.iter().enumerate() {
            let col_name = normalize_identifier(&c.name);
            if descriptors.iter().any(|d| d.name == col_name) {
                return Err(AppError::config(
                    "invalid_catalog".to_string(),
                    format!("Duplicate column '{}' in table {}", col_name, qualified),
                ));
            }
            descriptors.push(ColumnDescriptor {
                column_id: i as i32 + 1,
                name: col_name,
                ty: RelDataType::new(c.sql_type, c.nullable),
            });
        }
        let mut g = self.tables.write();
        if g.by_name.contains_key(&qualified) {
            return Err(AppError::config("invalid_catalog".to_string(), format!("Table {} already exists", qualified)));
        }
        let table_id = g.next_id;
        g.next_id += 1;
        let td = Arc::new(TableDescriptor {
            table_id,
            database: qualified.database.clone(),
            schema: qualified.schema.clone(),
            name: qualified.table.clone(),
            columns: descriptors,
        });
        debug!(target: "mapd_sql::catalog", "registered table {} as id {} ({} columns)", qualified, table_id, td.columns.len());
        g.by_id.insert(table_id, Arc::clone(&td));
        g.by_name.insert(qualified, td);
        Ok(table_id)
    }

    pub fn functions(&self) -> &[FunctionSpec] { &self.functions }

    pub fn from_file_spec(spec: CatalogFile) -> AppResult<Self> {
        let defaults = QueryDefaults::new(
            spec.database.as_deref().unwrap_or(DEFAULT_DB),
            spec.schema.as_deref().unwrap_or(DEFAULT_SCHEMA),
        );
        let mut cat = Self::new(defaults);
        for t in &spec.tables {
            cat.add_table(t.database.as_deref(), t.schema.as_deref(), &t.name, &t.columns)?;
        }
        for f in &spec.functions {
            f.to_operator()?;
        }
        cat.functions = spec.functions;
        Ok(cat)
    }

    pub fn from_json(text: &str) -> AppResult<Self> {
        let spec: CatalogFile = serde_json::from_str(text)?;
        Self::from_file_spec(spec)
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::io("catalog_read".to_string(), format!("Failed to read catalog {}: {}", path.display(), e))
        })?;
        debug!(target: "mapd_sql::catalog", "loading catalog from {}", path.display());
        Self::from_json(&text)
    }
}

impl CatalogReader for InMemoryCatalog {
    fn defaults(&self) -> &QueryDefaults { &self.defaults }

    fn get_table(&self, name: &QualifiedName) -> Option<Arc<TableDescriptor>> {
        self.tables.read().by_name.get(name).cloned()
    }

    fn get_table_by_id(&self, table_id: i32) -> Option<Arc<TableDescriptor>> {
        self.tables.read().by_id.get(&table_id).cloned()
    }

    fn table_names(&self) -> Vec<QualifiedName> {
        let mut names: Vec<QualifiedName> = self.tables.read().by_name.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn emp_columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("EmpNo", SqlType::Integer, false),
            ColumnSpec::new("ename", SqlType::Varchar(Some(20)), true),
        ]
    }

    #[test]
    fn add_and_resolve_tables() {
        let cat = InMemoryCatalog::default();
        let id = cat.add_table(None, None, "Emp", &emp_columns()).unwrap();
        assert_eq!(id, 1);
        let id2 = cat.add_table(None, Some("sales"), "emp", &emp_columns()).unwrap();
        assert_eq!(id2, 2);

        let t = cat.get_table(&QualifiedName::new("mapd", "public", "emp")).unwrap();
        assert_eq!(t.table_id, 1);
        assert_eq!(t.column_names(), vec!["empno", "ename"]);
        assert_eq!(t.column("empno").unwrap().column_id, 1);
        assert_eq!(t.column_by_id(2).unwrap().name, "ename");
        assert!(!t.column("empno").unwrap().ty.nullable);

        assert_eq!(cat.get_table_by_id(2).unwrap().schema, "sales");
        assert!(cat.get_table_by_id(3).is_none());
        assert_eq!(cat.table_names().len(), 2);
    }

    #[test]
    fn debug_lists_defaults_and_tables() {
        let cat = InMemoryCatalog::default();
        cat.add_table(None, None, "emp", &emp_columns()).unwrap();
        let text = format!("{:?}", cat);
        assert!(text.starts_with("InMemoryCatalog"));
        assert!(text.contains("current_database: \"mapd\""));
        assert!(text.contains("table: \"emp\""));
        let err = InMemoryCatalog::from_json("{\"tables\": 3}").unwrap_err();
        assert_eq!(err.code_str(), "invalid_json");
    }

    #[test]
    fn rejects_duplicates() {
        let cat = InMemoryCatalog::default();
        cat.add_table(None, None, "emp", &emp_columns()).unwrap();
        let err = cat.add_table(None, None, "EMP", &emp_columns()).unwrap_err();
        assert_eq!(err.code_str(), "invalid_catalog");
        let dup = vec![ColumnSpec::new("a", SqlType::Integer, true), ColumnSpec::new("A", SqlType::Integer, true)];
        assert!(cat.add_table(None, None, "t2", &dup).is_err());
    }

    #[test]
    fn load_from_json_file() {
        let json = r#"{
            "database": "demo",
            "tables": [
                {"name": "flights", "columns": [
                    {"name": "carrier", "type": "VARCHAR(8)"},
                    {"name": "dep_delay", "type": "SMALLINT", "nullable": false}
                ]}
            ],
            "functions": [{"name": "geo_dist", "returns": "DOUBLE", "min_args": 4, "max_args": 4}]
        }"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        let cat = InMemoryCatalog::load(file.path()).unwrap();
        assert_eq!(cat.defaults().current_database, "demo");
        assert_eq!(cat.defaults().current_schema, "public");
        let t = cat.get_table(&QualifiedName::new("demo", "public", "flights")).unwrap();
        assert_eq!(t.columns[0].ty, RelDataType::nullable(SqlType::Varchar(Some(8))));
        assert_eq!(t.columns[1].ty, RelDataType::not_null(SqlType::SmallInt));
        assert_eq!(cat.functions().len(), 1);
    }

    #[test]
    fn load_errors_are_reported() {
        let err = InMemoryCatalog::load(Path::new("/definitely/not/here.json")).err().unwrap();
        assert_eq!(err.code_str(), "catalog_read");
        let err = InMemoryCatalog::from_json("{\"tables\": [{\"name\": \"t\", \"columns\": [{\"name\": \"c\", \"type\": \"BLOB\"}]}]}").err().unwrap();
        assert_eq!(err.code_str(), "invalid_json");
    }
}
