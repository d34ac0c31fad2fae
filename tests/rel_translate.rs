//! End to end: SQL text is validated, lowered to relational algebra JSON and
//! translated into an execution plan against a catalog loaded from disk.

use std::io::Write;
use std::sync::Arc;

use mapd_sql::catalog::{CatalogReader, InMemoryCatalog};
use mapd_sql::conformance::Conformance;
use mapd_sql::operators::StandardOperatorTable;
use mapd_sql::plan::{translate_query, RootPlan};
use mapd_sql::rel::{to_rel, RelNode, RelPlan};
use mapd_sql::types::DefaultTypeFactory;
use mapd_sql::{AppResult, SqlValidator};

const CATALOG: &str = r#"{
    "database": "demo",
    "tables": [
        {"name": "flights", "columns": [
            {"name": "carrier", "type": "VARCHAR(8)", "nullable": false},
            {"name": "origin", "type": "VARCHAR(3)"},
            {"name": "dest", "type": "VARCHAR(3)"},
            {"name": "distance", "type": "INTEGER"},
            {"name": "delay", "type": "DOUBLE"}
        ]},
        {"name": "airports", "columns": [
            {"name": "code", "type": "VARCHAR(3)", "nullable": false}
        ]}
    ]
}"#;

struct Ctx {
    _file: tempfile::NamedTempFile,
    catalog: Arc<InMemoryCatalog>,
    validator: SqlValidator,
}

fn ctx() -> Ctx {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CATALOG.as_bytes()).unwrap();
    let catalog = Arc::new(InMemoryCatalog::load(file.path()).unwrap());
    let reader: Arc<dyn CatalogReader> = catalog.clone();
    let validator =
        SqlValidator::expanding(StandardOperatorTable::shared(), reader, Arc::new(DefaultTypeFactory::new()), Conformance::Lenient);
    Ctx { _file: file, catalog, validator }
}

fn rel(ctx: &Ctx, sql: &str) -> AppResult<RelPlan> {
    ctx.validator.validate_sql(sql).and_then(|v| to_rel(&v))
}

fn plan(ctx: &Ctx, sql: &str) -> AppResult<RootPlan> {
    let json = rel(ctx, sql)?.to_json()?;
    translate_query(&json, ctx.catalog.as_ref())
}

#[test]
fn filter_project_plan() {
    let c = ctx();
    let p = plan(&c, "select carrier, delay from flights where distance > 500 and origin = 'SFO'").unwrap();
    assert_eq!(p.table_id, 1);
    assert_eq!(p.target_names, vec!["carrier", "delay"]);
    assert_eq!(p.scan.quals.len(), 2);
    assert_eq!(p.scan.quals[1].to_string(), "(col[1:2] = 'SFO')");
    assert_eq!(p.scan.used_columns, vec![1, 2, 4, 5]);
}

#[test]
fn scan_names_the_fully_qualified_table() {
    let c = ctx();
    let r = rel(&c, "select dest from flights").unwrap();
    match r.find("LogicalTableScan") {
        Some(RelNode::LogicalTableScan { table, field_names }) => {
            assert_eq!(table, &vec!["demo".to_string(), "public".to_string(), "flights".to_string()]);
            assert_eq!(field_names.len(), 5);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn grouping_by_alias_and_ordinal() {
    let c = ctx();
    let p = plan(&c, "select carrier as c, avg(delay) as d from flights group by c order by 2 desc limit 3").unwrap();
    let agg = p.agg.as_ref().unwrap();
    assert_eq!(agg.group_by.len(), 1);
    assert_eq!(agg.targets[1].to_string(), "AVG(col[1:5])");
    let sort = p.sort.as_ref().unwrap();
    assert!(sort.order[0].desc);
    assert_eq!(sort.limit, Some(3));
    assert_eq!(p.target_names, vec!["c", "d"]);
}

#[test]
fn distinct_count_and_select_distinct() {
    let c = ctx();
    let p = plan(&c, "select count(distinct dest) from flights").unwrap();
    assert_eq!(p.targets[0].to_string(), "COUNT(DISTINCT col[1:3])");
    let p = plan(&c, "select distinct origin from flights").unwrap();
    assert!(p.agg.is_some());
    assert!(!p.distinct);
}

#[test]
fn explain_text_lists_every_stage() {
    let c = ctx();
    let text = plan(&c, "select origin, count(*) from flights where delay > 0 group by origin order by origin").unwrap().to_string();
    assert!(text.starts_with("RootPlan table_id=1\n"));
    assert!(text.contains("  Sort: [col[1:2] ASC NULLS LAST]"));
    assert!(text.contains("  Aggregate: group_by=[col[1:2]] having=[]"));
    assert!(text.contains("    quals: [(col[1:5] > 0)]"));
}

#[test]
fn unsupported_shapes_and_bad_plans() {
    let c = ctx();
    let err = rel(&c, "select f.carrier from flights f join airports a on f.origin = a.code").unwrap_err();
    assert_eq!(err.sqlstate(), "0A000");

    let err = translate_query(r#"{"rels": []}"#, c.catalog.as_ref()).unwrap_err();
    assert_eq!(err.sqlstate(), "XX000");
    let err = translate_query(
        r#"{"rels": [{"relOp": "LogicalTableScan", "table": ["demo", "public", "trains"], "fieldNames": []}]}"#,
        c.catalog.as_ref(),
    )
    .unwrap_err();
    assert_eq!(err.code_str(), "unknown_table");
    let err = translate_query("not json", c.catalog.as_ref()).unwrap_err();
    assert_eq!(err.exit_code(), 3);
}
