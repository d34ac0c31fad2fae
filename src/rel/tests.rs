use serde_json::json;

use super::*;
use crate::conformance::Conformance;
use crate::test_support::{validated, validator};
use crate::types::SqlType;

fn rel_json(sql: &str) -> Value {
    let plan = to_rel(&validated(sql)).unwrap();
    serde_json::to_value(&plan).unwrap()
}

fn ty(t: &str, nullable: bool) -> Value {
    json!({"type": t, "nullable": nullable})
}

#[test]
fn scan_filter_project() {
    let v = rel_json("select ename from emp where deptno > 10");
    assert_eq!(
        v,
        json!({"rels": [
            {
                "relOp": "LogicalTableScan",
                "table": ["mapd", "public", "emp"],
                "fieldNames": ["empno", "ename", "job", "mgr", "sal", "comm", "deptno"]
            },
            {
                "relOp": "LogicalFilter",
                "condition": {
                    "op": ">",
                    "operands": [{"input": 6}, {"literal": 10, "type": ty("INTEGER", false)}],
                    "type": ty("BOOLEAN", false)
                }
            },
            {"relOp": "LogicalProject", "fields": ["ename"], "exprs": [{"input": 1}]}
        ]})
    );
}

#[test]
fn grouped_query_with_having_and_sort() {
    let plan = to_rel(&validated(
        "select deptno, count(*), sum(sal) from emp group by deptno having count(*) > 1 order by 2 desc limit 5",
    ))
    .unwrap();
    let ops: Vec<&str> = plan.rels.iter().map(|r| r.rel_op()).collect();
    assert_eq!(
        ops,
        vec!["LogicalTableScan", "LogicalProject", "LogicalAggregate", "LogicalFilter", "LogicalProject", "LogicalSort"]
    );
    assert_eq!(
        plan.rels[1],
        RelNode::LogicalProject { fields: vec!["deptno".into(), "sal".into()], exprs: vec![RexNode::input(6), RexNode::input(4)] }
    );
    let v = serde_json::to_value(&plan.rels[2]).unwrap();
    assert_eq!(
        v,
        json!({
            "relOp": "LogicalAggregate",
            "group": [0],
            "aggs": [
                {"agg": "COUNT", "type": ty("BIGINT", false), "distinct": false, "operands": []},
                {"agg": "SUM", "type": ty("DECIMAL(7,2)", true), "distinct": false, "operands": [1]}
            ]
        })
    );
    match &plan.rels[3] {
        RelNode::LogicalFilter { condition: RexNode::Call { op, operands, .. } } => {
            assert_eq!(op, ">");
            assert_eq!(operands[0], RexNode::input(1));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        plan.rels[4],
        RelNode::LogicalProject {
            fields: vec!["deptno".into(), "EXPR$1".into(), "EXPR$2".into()],
            exprs: vec![RexNode::input(0), RexNode::input(1), RexNode::input(2)],
        }
    );
    assert_eq!(
        serde_json::to_value(&plan.rels[5]).unwrap(),
        json!({"relOp": "LogicalSort", "collation": [{"field": 1, "direction": "DESCENDING", "nulls": "FIRST"}], "fetch": 5})
    );
}

#[test]
fn expressions_over_aggregates() {
    let plan = to_rel(&validated("select max(sal) - min(sal) as spread from emp where job = 'CLERK'")).unwrap();
    let ops: Vec<&str> = plan.rels.iter().map(|r| r.rel_op()).collect();
    assert_eq!(ops, vec!["LogicalTableScan", "LogicalFilter", "LogicalProject", "LogicalAggregate", "LogicalProject"]);
    match &plan.rels[3] {
        RelNode::LogicalAggregate { group, aggs } => {
            assert!(group.is_empty());
            assert_eq!(aggs.iter().map(|a| a.agg.as_str()).collect::<Vec<_>>(), vec!["MAX", "MIN"]);
            assert_eq!(aggs[0].operands, vec![0]);
            assert_eq!(aggs[1].operands, vec![0]);
        }
        other => panic!("unexpected {:?}", other),
    }
    match &plan.rels[4] {
        RelNode::LogicalProject { fields, exprs } => {
            assert_eq!(fields, &vec!["spread".to_string()]);
            assert!(matches!(&exprs[0], RexNode::Call { op, operands, .. } if op == "-" && operands == &vec![RexNode::input(0), RexNode::input(1)]));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn hidden_sort_keys_are_trimmed() {
    let plan = to_rel(&validated("select ename from emp order by sal, ename desc")).unwrap();
    assert_eq!(
        plan.rels[1],
        RelNode::LogicalProject { fields: vec!["ename".into(), "$f1".into()], exprs: vec![RexNode::input(1), RexNode::input(4)] }
    );
    assert_eq!(
        plan.rels[2],
        RelNode::LogicalSort { collation: vec![Collation::new(1, true), Collation::new(0, false)], fetch: None, offset: None }
    );
    assert_eq!(plan.rels[3], RelNode::LogicalProject { fields: vec!["ename".into()], exprs: vec![RexNode::input(0)] });
}

#[test]
fn distinct_and_limit_without_order() {
    let base = validator(Conformance::MySql5, false);
    let plan = to_rel(&base.validate_sql("select distinct job from emp limit 2, 3").unwrap()).unwrap();
    assert_eq!(plan.rels[2], RelNode::LogicalAggregate { group: vec![0], aggs: vec![] });
    assert_eq!(plan.rels[3], RelNode::LogicalSort { collation: vec![], fetch: Some(3), offset: Some(2) });
}

#[test]
fn between_and_in_are_lowered() {
    let plan = to_rel(&validated("select empno from emp where sal between 1 and 2 and deptno not in (10, 20)")).unwrap();
    let RelNode::LogicalFilter { condition } = &plan.rels[1] else { panic!("expected filter") };
    let RexNode::Call { op, operands, .. } = condition else { panic!("expected call") };
    assert_eq!(op, "AND");
    let names: Vec<&str> = operands
        .iter()
        .map(|o| match o {
            RexNode::Call { op, .. } => op.as_str(),
            _ => "",
        })
        .collect();
    assert_eq!(names, vec!["AND", "NOT"]);
    let RexNode::Call { operands: between, .. } = &operands[0] else { unreachable!() };
    assert!(matches!(&between[0], RexNode::Call { op, .. } if op == ">="));
    assert!(matches!(&between[1], RexNode::Call { op, .. } if op == "<="));
    let RexNode::Call { operands: not_in, .. } = &operands[1] else { unreachable!() };
    assert!(matches!(&not_in[0], RexNode::Call { op, operands, .. } if op == "OR" && operands.len() == 2));
}

#[test]
fn literals_carry_types() {
    let plan = to_rel(&validated("select 12.50, 'x', cast(empno as bigint), case when comm is null then 0 end from emp")).unwrap();
    let RelNode::LogicalProject { exprs, .. } = &plan.rels[1] else { panic!("expected project") };
    assert_eq!(
        exprs[0],
        RexNode::Literal { literal: json!("12.50"), ty: RelDataType::not_null(SqlType::Decimal { precision: 4, scale: 2 }) }
    );
    assert_eq!(exprs[1], RexNode::Literal { literal: json!("x"), ty: RelDataType::not_null(SqlType::Varchar(Some(1))) });
    assert!(matches!(&exprs[2], RexNode::Call { op, operands, .. } if op == "CAST" && operands == &vec![RexNode::input(0)]));
    let RexNode::Call { op, operands, ty } = &exprs[3] else { panic!("expected CASE") };
    assert_eq!(op, "CASE");
    assert_eq!(operands.len(), 3);
    assert_eq!(operands[2], RexNode::Literal { literal: Value::Null, ty: *ty });
    assert!(ty.nullable);
}

#[test]
fn joins_and_missing_from_are_unsupported() {
    let err = to_rel(&validated("select e.ename from emp e join dept d on e.deptno = d.deptno")).unwrap_err();
    assert_eq!(err.code_str(), "unsupported");
    assert_eq!(err.sqlstate(), "0A000");
    let err = to_rel(&validated("select 1")).unwrap_err();
    assert_eq!(err.code_str(), "unsupported");
}

#[test]
fn json_round_trip_and_bare_integers() {
    let plan = to_rel(&validated("select deptno, avg(sal) from emp group by deptno order by deptno")).unwrap();
    let back = RelPlan::from_json(&plan.to_json().unwrap()).unwrap();
    assert_eq!(back, plan);
    assert!(plan.to_json_pretty().unwrap().contains("\"relOp\": \"LogicalAggregate\""));

    let raw = r#"{"rels": [
        {"relOp": "LogicalTableScan", "table": ["mapd", "public", "emp"], "fieldNames": ["empno"]},
        {"relOp": "LogicalFilter", "condition": {"op": ">", "operands": [{"input": 0}, 10], "type": {"type": "BOOLEAN", "nullable": false}}},
        {"relOp": "LogicalAggregate", "group": [], "aggs": [{"agg": "COUNT", "type": {"type": "BIGINT", "nullable": false}, "distinct": false, "operands": []}]}
    ]}"#;
    let parsed = RelPlan::from_json(raw).unwrap();
    let Some(RelNode::LogicalFilter { condition: RexNode::Call { operands, .. } }) = parsed.find("LogicalFilter") else {
        panic!("filter missing")
    };
    assert_eq!(operands[1], RexNode::Int(10));
    assert!(parsed.find("LogicalSort").is_none());

    let err = RelPlan::from_json(r#"{"rels": [{"relOp": "LogicalJoin"}]}"#).unwrap_err();
    assert_eq!(err.code_str(), "invalid_json");
}
