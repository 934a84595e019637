mod common;
use common::*;

use std::io;

use interp::Diagnostic;
use interp::diagnostics::{collect, render, render_all, to_json};

const SOURCE: &str = "let a = 1\nlet = 2";

fn syntax_error() -> SourceError {
    SourceError::Parse(parse_source(SOURCE).errors)
}

#[test]
fn parse_errors_become_syntax_diagnostics() {
    let diagnostics = collect(&syntax_error());
    assert_eq!(
        diagnostics,
        vec![Diagnostic {
            kind: "syntax",
            line: 2,
            column: 5,
            message: "expected identifier for variable declaration".to_string(),
            width: 1,
        }]
    );
}

#[test]
fn illegal_tokens_are_lexical() {
    let errors = parse_source("let a = 1 2").errors;
    let diagnostic = Diagnostic::from_parse(&errors[0]);
    assert_eq!(diagnostic.kind, "syntax");
    let errors = parse_source("let a = @").errors;
    let diagnostic = Diagnostic::from_parse(&errors[0]);
    assert_eq!(diagnostic.kind, "lexical");
    assert_eq!((diagnostic.line, diagnostic.column), (1, 9));
}

#[test]
fn render_points_at_the_offending_token() {
    let rendered = render_all("demo.el", SOURCE, &syntax_error(), false);
    assert_eq!(
        rendered,
        "error: expected identifier for variable declaration\n --> demo.el:2:5\n  |\n  2 | let = 2\n  |     ^"
    );
}

#[test]
fn carets_span_the_whole_token() {
    let source = "let x = 1\nlet y = x undefined";
    let errors = parse_source(source).errors;
    let diagnostic = Diagnostic::from_parse(&errors[0]);
    assert_eq!(diagnostic.width, "undefined".len());
    let rendered = render("main.el", source, &diagnostic, false);
    assert!(rendered.ends_with(&format!("  | {}{}", " ".repeat(10), "^".repeat(9))));
}

#[test]
fn styled_render_uses_ansi_codes() {
    let diagnostic = &collect(&syntax_error())[0];
    let rendered = render("demo.el", SOURCE, diagnostic, true);
    assert!(rendered.contains("\u{1b}["));
    assert!(rendered.contains("demo.el:2:5"));
}

#[test]
fn evaluation_errors_carry_statement_positions() {
    let err = eval_error("let a = 1\n  a()");
    let diagnostic = Diagnostic::from_eval(&err);
    assert_eq!(diagnostic.kind, "not-callable");
    assert_eq!((diagnostic.line, diagnostic.column), (2, 3));
    assert_eq!(diagnostic.message, "value of type Int is not callable");
}

#[test]
fn positionless_diagnostics_render_without_a_snippet() {
    let diagnostics = collect(&SourceError::Io(io::Error::other("boom")));
    assert_eq!(diagnostics[0].kind, "io");
    assert_eq!(render("x.el", "", &diagnostics[0], false), "error: boom");

    let far = Diagnostic {
        line: 9,
        ..diagnostics[0].clone()
    };
    assert_eq!(render("x.el", "one line", &far, false), "error: line 9: boom");
}

#[test]
fn json_report_lists_every_diagnostic() {
    let json = to_json(&collect(&syntax_error()));
    assert_eq!(
        json,
        r#"{"diagnostics":[{"kind":"syntax","line":2,"column":5,"message":"expected identifier for variable declaration"}]}"#
    );
    let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid json");
    assert_eq!(parsed["diagnostics"][0]["line"], 2);
    assert_eq!(to_json(&[]), r#"{"diagnostics":[]}"#);
}
