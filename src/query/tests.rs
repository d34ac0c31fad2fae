use super::*;
use crate::conformance::Conformance;
use crate::types::SqlType;

fn roundtrip(sql: &str) -> Select {
    let q = parse(sql).unwrap();
    let text = q.to_string();
    let again = parse(&text).unwrap_or_else(|e| panic!("re-parse of '{}' failed: {}", text, e));
    assert_eq!(q, again, "unparsed as: {}", text);
    q
}

#[test]
fn simple_select_with_alias() {
    let q = parse("SELECT e.ename AS Name, deptno FROM emp e WHERE e.sal > 1000").unwrap();
    assert_eq!(q.items.len(), 2);
    match &q.items[0] {
        SelectItem::Expr { expr, alias } => {
            assert_eq!(*expr, Expr::ident(&["e", "ename"]));
            assert_eq!(alias.as_deref(), Some("name"));
        }
        other => panic!("unexpected item {:?}", other),
    }
    let from = q.from.as_ref().unwrap();
    assert_eq!(from.base.name, vec!["emp".to_string()]);
    assert_eq!(from.base.alias.as_deref(), Some("e"));
    assert_eq!(
        q.where_clause,
        Some(Expr::binary(Expr::ident(&["e", "sal"]), BinaryOp::Gt, Expr::int(1000)))
    );
}

#[test]
fn quoted_identifiers_keep_case() {
    let q = parse("SELECT \"Ename\" FROM \"Sales\".emp").unwrap();
    assert_eq!(q.items[0], SelectItem::Expr { expr: Expr::ident(&["Ename"]), alias: None });
    assert_eq!(q.from.unwrap().base.name, vec!["Sales".to_string(), "emp".to_string()]);
}

#[test]
fn stars_and_qualified_stars() {
    let q = parse("select *, e.*, mapd.public.dept.* from emp e, dept").unwrap();
    assert_eq!(q.items[0], SelectItem::Wildcard { qualifier: None });
    assert_eq!(q.items[1], SelectItem::Wildcard { qualifier: Some(vec!["e".into()]) });
    assert_eq!(
        q.items[2],
        SelectItem::Wildcard { qualifier: Some(vec!["mapd".into(), "public".into(), "dept".into()]) }
    );
    let from = q.from.unwrap();
    assert_eq!(from.joins.len(), 1);
    assert_eq!(from.joins[0].kind, JoinKind::Comma);
}

#[test]
fn precedence_and_predicates() {
    let q = parse("SELECT a FROM t WHERE NOT a = 1 OR b BETWEEN 1 + 1 AND 3 * 2 AND c NOT IN (1, 2)").unwrap();
    let w = q.where_clause.unwrap();
    match w {
        Expr::Binary { op: BinaryOp::Or, left, right } => {
            assert!(matches!(*left, Expr::Unary { op: UnaryOp::Not, .. }));
            match *right {
                Expr::Binary { op: BinaryOp::And, left, right } => {
                    assert!(matches!(*left, Expr::Between { negated: false, .. }));
                    assert!(matches!(*right, Expr::InList { negated: true, .. }));
                }
                other => panic!("expected AND, got {:?}", other),
            }
        }
        other => panic!("expected OR, got {:?}", other),
    }
}

#[test]
fn joins_group_order_limit() {
    let q = roundtrip(
        "SELECT d.dname, COUNT(*) AS c, SUM(DISTINCT e.sal) FROM emp AS e \
         LEFT OUTER JOIN dept d ON e.deptno = d.deptno \
         CROSS JOIN bonus \
         WHERE e.comm IS NOT NULL GROUP BY d.dname HAVING COUNT(*) > 1 \
         ORDER BY 2 DESC, d.dname ASC LIMIT 10 OFFSET 5;",
    );
    let from = q.from.as_ref().unwrap();
    assert_eq!(from.joins[0].kind, JoinKind::Left);
    assert!(from.joins[0].on.is_some());
    assert_eq!(from.joins[1].kind, JoinKind::Cross);
    assert_eq!(q.group_by.len(), 1);
    assert!(!q.order_by[0].asc);
    assert!(q.order_by[1].asc);
    assert_eq!(q.limit, Some(10));
    assert_eq!(q.offset, Some(5));
    assert!(matches!(&q.items[1], SelectItem::Expr { expr: Expr::Function { star: true, .. }, .. }));
    assert!(matches!(&q.items[2], SelectItem::Expr { expr: Expr::Function { distinct: true, .. }, .. }));
}

#[test]
fn literals_cast_and_case() {
    let q = roundtrip(
        "SELECT 1, 12.50, 1.5e3, 'it''s', TRUE, NULL, -x, CAST(a AS DECIMAL(10, 2)), \
         CASE WHEN a > 1 THEN 'big' ELSE 'small' END, 'a' || 'b', 9999999999999999999999 FROM t",
    );
    let exprs: Vec<&Expr> = q
        .items
        .iter()
        .map(|i| match i {
            SelectItem::Expr { expr, .. } => expr,
            _ => panic!("unexpected wildcard"),
        })
        .collect();
    assert_eq!(*exprs[0], Expr::Literal(Literal::Integer(1)));
    assert_eq!(*exprs[1], Expr::Literal(Literal::Decimal("12.50".into())));
    assert_eq!(*exprs[2], Expr::Literal(Literal::Double("1.5e3".into())));
    assert_eq!(*exprs[3], Expr::Literal(Literal::String("it's".into())));
    assert_eq!(*exprs[4], Expr::Literal(Literal::Boolean(true)));
    assert_eq!(*exprs[5], Expr::Literal(Literal::Null));
    assert!(matches!(exprs[6], Expr::Unary { op: UnaryOp::Minus, .. }));
    assert!(matches!(exprs[7], Expr::Cast { ty: SqlType::Decimal { precision: 10, scale: 2 }, .. }));
    assert!(matches!(exprs[8], Expr::Case { .. }));
    assert!(matches!(exprs[9], Expr::Binary { op: BinaryOp::Concat, .. }));
    assert_eq!(*exprs[10], Expr::Literal(Literal::Decimal("9999999999999999999999".into())));
}

#[test]
fn unparse_is_canonical() {
    let q = parse("select E.Ename, \"Mixed\" x from emp e where a+b*c >= 2 and name like 'A%'").unwrap();
    assert_eq!(
        q.to_string(),
        "SELECT e.ename, \"Mixed\" AS x FROM emp AS e WHERE (((a + (b * c)) >= 2) AND (name LIKE 'A%'))"
    );
}

#[test]
fn comments_are_ignored() {
    let q = parse("SELECT a -- the column\nFROM /* the table */ t").unwrap();
    assert_eq!(q.to_string(), "SELECT a FROM t");
}

#[test]
fn conformance_gates_syntax() {
    assert!(parse("SELECT a FROM t WHERE a != 1").is_err());
    assert!(parse("SELECT a % 2 FROM t").is_err());
    assert!(parse("SELECT a FROM t LIMIT 5, 10").is_err());
    let err = parse("SELECT a FROM t WHERE a != 1").unwrap_err();
    assert_eq!(err.code_str(), "conformance");

    let q = parse_with_conformance("SELECT a % 2 FROM t WHERE a != 1 LIMIT 5, 10", Conformance::Lenient).unwrap();
    assert!(matches!(&q.items[0], SelectItem::Expr { expr: Expr::Function { name, .. }, .. } if name == "MOD"));
    assert_eq!(q.offset, Some(5));
    assert_eq!(q.limit, Some(10));
}

#[test]
fn syntax_errors() {
    for bad in [
        "SELECT",
        "SELECT a FROM",
        "SELECT a FROM t WHERE",
        "SELECT a FROM t extra junk",
        "SELECT a FROM t LEFT JOIN u",
        "SELECT CASE END FROM t",
        "SELECT CAST(a AS blob) FROM t",
        "SELECT a FROM t LIMIT -1",
        "SELECT from FROM t",
    ] {
        let err = parse(bad).unwrap_err();
        assert_eq!(err.sqlstate(), "42601", "{} -> {}", bad, err);
    }
}
