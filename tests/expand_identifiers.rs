//! Public API tests for the expanding validator: construction, expansion of
//! identifiers and table names, and parity of errors with the base validator.

use std::sync::Arc;

use mapd_sql::catalog::{CatalogReader, InMemoryCatalog};
use mapd_sql::conformance::Conformance;
use mapd_sql::operators::{OperatorTable, StandardOperatorTable};
use mapd_sql::types::{DefaultTypeFactory, TypeFactory};
use mapd_sql::{SqlValidator, ValidatorConfig};

const CATALOG: &str = r#"{
    "database": "mapd",
    "schema": "public",
    "tables": [
        {"name": "emp", "columns": [
            {"name": "empno", "type": "INTEGER", "nullable": false},
            {"name": "ename", "type": "VARCHAR(20)"},
            {"name": "sal", "type": "DECIMAL(7,2)"},
            {"name": "deptno", "type": "INTEGER", "nullable": false}
        ]},
        {"name": "dept", "schema": "hr", "columns": [
            {"name": "deptno", "type": "INTEGER", "nullable": false},
            {"name": "dname", "type": "VARCHAR(14)"}
        ]}
    ]
}"#;

struct Inputs {
    ops: Arc<dyn OperatorTable>,
    catalog: Arc<dyn CatalogReader>,
    tf: Arc<dyn TypeFactory>,
}

fn inputs() -> Inputs {
    let catalog = InMemoryCatalog::from_json(CATALOG).expect("catalog");
    Inputs { ops: StandardOperatorTable::shared(), catalog: Arc::new(catalog), tf: Arc::new(DefaultTypeFactory::new()) }
}

fn expanding(c: Conformance) -> SqlValidator {
    let i = inputs();
    SqlValidator::expanding(i.ops, i.catalog, i.tf, c)
}

fn base(c: Conformance) -> SqlValidator {
    let i = inputs();
    SqlValidator::new(i.ops, i.catalog, i.tf, c)
}

#[test]
fn constructor_keeps_inputs_and_always_expands() {
    let i = inputs();
    for c in Conformance::ALL {
        let v = SqlValidator::expanding(i.ops.clone(), i.catalog.clone(), i.tf.clone(), c);
        assert!(v.should_expand_identifiers());
        assert_eq!(v.conformance(), c);
        assert!(Arc::ptr_eq(v.catalog_reader(), &i.catalog));
        assert!(Arc::ptr_eq(v.operator_table(), &i.ops));
        assert!(Arc::ptr_eq(v.type_factory(), &i.tf));
    }
    assert!(!base(Conformance::Default).should_expand_identifiers());
    let configured = SqlValidator::with_config(i.ops, i.catalog, i.tf, Conformance::Default, ValidatorConfig::default().with_expand_identifiers(true));
    assert!(configured.should_expand_identifiers());
}

#[test]
fn identifiers_and_tables_are_fully_qualified() {
    let v = expanding(Conformance::Default);
    let q = v.validate_sql("select ename from emp where sal > 100").unwrap();
    assert!(q.expanded);
    assert_eq!(q.sql(), "SELECT emp.ename AS ename FROM mapd.public.emp AS emp WHERE (emp.sal > 100)");

    let q = v.validate_sql("select dname from hr.dept").unwrap();
    assert_eq!(q.sql(), "SELECT dept.dname AS dname FROM mapd.hr.dept AS dept");
}

#[test]
fn base_validator_leaves_the_query_alone() {
    let q = base(Conformance::Default).validate_sql("select ename from emp where sal > 100").unwrap();
    assert!(!q.expanded);
    assert_eq!(q.sql(), "SELECT ename FROM emp WHERE (sal > 100)");
}

#[test]
fn both_validators_agree_on_row_types() {
    let sql = "select e.empno, d.dname from emp e left join hr.dept d on e.deptno = d.deptno";
    let a = base(Conformance::Default).validate_sql(sql).unwrap();
    let b = expanding(Conformance::Default).validate_sql(sql).unwrap();
    assert_eq!(a.row_type, b.row_type);
    assert!(b.row_type[1].ty.nullable);
    let again = base(Conformance::Default).validate_sql(&b.sql()).unwrap();
    assert_eq!(again.row_type, b.row_type);
}

#[test]
fn errors_match_the_base_validator() {
    for sql in [
        "select nope from emp",
        "select deptno from emp e join hr.dept d on e.deptno = d.deptno",
        "select * from missing",
        "select ename, count(*) from emp",
        "select frobnicate(empno) from emp",
        "select from emp",
    ] {
        let a = base(Conformance::Default).validate_sql(sql).unwrap_err();
        let b = expanding(Conformance::Default).validate_sql(sql).unwrap_err();
        assert_eq!(a, b, "{}", sql);
    }
}

#[test]
fn conformance_governs_aliases_in_group_by() {
    let sql = "select deptno as d, count(*) from emp group by d";
    assert!(expanding(Conformance::Lenient).validate_sql(sql).is_ok());
    let err = expanding(Conformance::Strict2003).validate_sql(sql).unwrap_err();
    assert!(err.sqlstate().starts_with("42"), "{}", err);
}
