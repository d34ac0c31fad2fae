//! Fixtures shared by the unit tests: the classic `emp`/`dept` schema.

use std::sync::Arc;

use crate::catalog::{CatalogReader, ColumnSpec, InMemoryCatalog};
use crate::conformance::Conformance;
use crate::operators::StandardOperatorTable;
use crate::types::{DefaultTypeFactory, SqlType};
use crate::validator::{SqlValidator, ValidatedQuery};

pub(crate) fn emp_dept_catalog() -> Arc<InMemoryCatalog> {
    let cat = InMemoryCatalog::default();
    cat.add_table(None, None, "emp", &[
        ColumnSpec::new("empno", SqlType::Integer, false),
        ColumnSpec::new("ename", SqlType::Varchar(Some(20)), true),
        ColumnSpec::new("job", SqlType::Varchar(Some(10)), true),
        ColumnSpec::new("mgr", SqlType::Integer, true),
        ColumnSpec::new("sal", SqlType::Decimal { precision: 7, scale: 2 }, true),
        ColumnSpec::new("comm", SqlType::Decimal { precision: 7, scale: 2 }, true),
        ColumnSpec::new("deptno", SqlType::Integer, false),
    ])
    .unwrap();
    cat.add_table(None, None, "dept", &[
        ColumnSpec::new("deptno", SqlType::Integer, false),
        ColumnSpec::new("dname", SqlType::Varchar(Some(14)), true),
        ColumnSpec::new("loc", SqlType::Varchar(Some(13)), true),
    ])
    .unwrap();
    Arc::new(cat)
}

pub(crate) fn validator(conformance: Conformance, expand: bool) -> SqlValidator {
    let catalog: Arc<dyn CatalogReader> = emp_dept_catalog();
    let ops = StandardOperatorTable::shared();
    let tf = Arc::new(DefaultTypeFactory::new());
    if expand {
        SqlValidator::expanding(ops, catalog, tf, conformance)
    } else {
        SqlValidator::new(ops, catalog, tf, conformance)
    }
}

pub(crate) fn validated(sql: &str) -> ValidatedQuery {
    validator(Conformance::Default, true).validate_sql(sql).unwrap_or_else(|e| panic!("{}: {}", sql, e))
}
