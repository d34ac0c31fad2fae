use std::sync::Arc;

use anyhow::{Context, Result};

use mapd_sql::catalog::{CatalogReader, InMemoryCatalog};
use mapd_sql::conformance::Conformance;
use mapd_sql::operators::StandardOperatorTable;
use mapd_sql::types::DefaultTypeFactory;
use mapd_sql::SqlValidator;

const CATALOG: &str = r#"{
    "tables": [
        {"name": "emp", "columns": [
            {"name": "empno", "type": "INTEGER", "nullable": false},
            {"name": "ename", "type": "VARCHAR(20)"},
            {"name": "job", "type": "VARCHAR(10)"},
            {"name": "mgr", "type": "INTEGER"},
            {"name": "sal", "type": "DECIMAL(7,2)"},
            {"name": "comm", "type": "DECIMAL(7,2)"},
            {"name": "deptno", "type": "INTEGER", "nullable": false}
        ]},
        {"name": "dept", "columns": [
            {"name": "deptno", "type": "INTEGER", "nullable": false},
            {"name": "dname", "type": "VARCHAR(14)"},
            {"name": "loc", "type": "VARCHAR(13)"}
        ]}
    ]
}"#;

pub struct BenchCtx {
    pub catalog: Arc<dyn CatalogReader>,
    pub base: SqlValidator,
    pub expanding: SqlValidator,
}

impl BenchCtx {
    pub fn new() -> Result<Self> {
        let catalog: Arc<dyn CatalogReader> = Arc::new(InMemoryCatalog::from_json(CATALOG).context("catalog")?);
        let tf = Arc::new(DefaultTypeFactory::new());
        let base = SqlValidator::new(StandardOperatorTable::shared(), catalog.clone(), tf.clone(), Conformance::Default);
        let expanding = SqlValidator::expanding(StandardOperatorTable::shared(), catalog.clone(), tf, Conformance::Default);
        Ok(BenchCtx { catalog, base, expanding })
    }
}
