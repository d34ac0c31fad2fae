use mapd_sql::query::{parse, Expr, Literal, SelectItem};

fn first_literal(sql: &str) -> Literal {
    let q = parse(sql).expect("parse failed");
    match q.items.first() {
        Some(SelectItem::Expr { expr: Expr::Literal(l), .. }) => l.clone(),
        other => panic!("expected literal item, got {:?}", other),
    }
}

#[test]
fn line_comment_before_select() {
    let sql = "-- this is a comment\nSELECT 1";
    assert_eq!(first_literal(sql), Literal::Integer(1));
}

#[test]
fn inline_line_comment_after_token() {
    let sql = "SELECT /* keep */ 1 -- trailing comment\n";
    let q = parse(sql).expect("parse failed");
    assert_eq!(q.items.len(), 1);
}

#[test]
fn block_comment_multiline() {
    let sql = "/* leading\n block\n comment */\nSELECT 1";
    assert_eq!(first_literal(sql), Literal::Integer(1));
}

#[test]
fn comment_like_inside_string_literal_preserved() {
    let sql = "SELECT '-- not a comment' as t";
    assert_eq!(first_literal(sql), Literal::String("-- not a comment".to_string()));
    let sql = "SELECT '/* still */ text'";
    assert_eq!(first_literal(sql), Literal::String("/* still */ text".to_string()));
}

#[test]
fn nested_block_comments() {
    let sql = "/* outer /* inner */ still comment */ SELECT 1";
    assert_eq!(first_literal(sql), Literal::Integer(1));
}

#[test]
fn comments_between_clauses() {
    let sql = "SELECT a -- first\n, b /* second */ FROM t -- source\nWHERE a > 1 /* done */";
    let q = parse(sql).expect("parse failed");
    assert_eq!(q.items.len(), 2);
    assert!(q.from.is_some());
    assert!(q.where_clause.is_some());
}

#[test]
fn unterminated_block_comment_hides_the_rest() {
    // everything after an unclosed /* is comment text
    let err = parse("SELECT /* never closed FROM t").unwrap_err();
    assert_eq!(err.sqlstate(), "42601");
}
