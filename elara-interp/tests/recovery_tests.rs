mod common;
use common::*;

use interp::{Parser, TokenKind};

#[test]
fn malformed_statement_between_two_good_ones() {
    let output = parse_source("let a = 1\nlet = 2\nlet b = 3");
    assert_eq!(output.statements.len(), 2);
    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.errors[0].token.kind, TokenKind::Equal);
    assert_eq!(output.errors[0].position().line, 2);
    assert!(matches!(
        &output.statements[1].kind,
        StmtKind::Let { name, .. } if name == "b"
    ));
    assert_eq!(output.statements[1].position.line, 3);
}

#[test]
fn recovery_skips_braces_opened_by_the_bad_statement() {
    let source = "let f = (a) -> {\n  a +\n}\nlet ok = 1";
    let output = parse_source(source);
    assert!(!output.errors.is_empty());
    assert_eq!(output.statements.len(), 1);
    assert!(matches!(
        &output.statements[0].kind,
        StmtKind::Let { name, .. } if name == "ok"
    ));
}

#[test]
fn block_collects_every_inner_error_as_one_batch() {
    let source = "{\n  let = 1\n  let y = 2\n  let = 3\n}\nlet after = 4";
    let output = parse_source(source);
    assert_eq!(output.errors.len(), 2);
    assert_eq!(output.errors[0].position().line, 2);
    assert_eq!(output.errors[1].position().line, 4);
    assert_eq!(output.statements.len(), 1);
}

#[test]
fn struct_body_errors_bundle() {
    let source = "struct S {\n  a Int\n  b: Int\n  : Int\n}\nlet z = 1";
    let output = parse_source(source);
    assert_eq!(output.errors.len(), 2);
    assert_eq!(output.statements.len(), 1);
}

#[test]
fn trailing_tokens_after_statement_are_an_error() {
    let output = parse_source("let a = 1 2\nlet b = 2");
    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.errors[0].token.text, "2");
    assert_eq!(output.statements.len(), 1);
}

#[test]
fn illegal_token_is_reported_at_its_position() {
    let output = parse_source("let a = @\nlet b = 1");
    assert_eq!(output.errors.len(), 1);
    let err = &output.errors[0];
    assert_eq!(err.token.kind, TokenKind::Illegal);
    assert_eq!(err.message, "invalid token '@'");
    assert_eq!(err.position(), interp::Position::new(1, 9));
    assert_eq!(output.statements.len(), 1);
}

#[test]
fn error_at_end_of_input() {
    let output = parse_source("let a =");
    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.errors[0].token.kind, TokenKind::Eof);
    assert!(output.errors[0].to_string().ends_with("at end of input"));
}

#[test]
fn next_statement_streams_results_in_order() {
    let mut parser = Parser::new("1\n)\n2");
    let first = parser.next_statement().expect("first item");
    assert!(first.is_ok());
    let second = parser.next_statement().expect("second item");
    assert_eq!(second.expect_err("should be an error").len(), 1);
    let third = parser.next_statement().expect("third item");
    assert!(third.is_ok());
    assert!(parser.next_statement().is_none());
}

#[test]
fn unclosed_block_reports_missing_brace() {
    let output = parse_source("while true {\n  1\n");
    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.errors[0].message, "expected '}' at end of block");
}
