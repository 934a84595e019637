use owo_colors::OwoColorize;
use serde::Serialize;

use crate::SourceError;
use crate::interpreter::{EvalError, EvalErrorKind};
use crate::lexer::{Position, TokenKind};
use crate::parser::ParseError;

/// One reportable problem, flattened for rendering and JSON output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: &'static str,
    /// 1-based; 0 when the failure has no source position.
    pub line: usize,
    pub column: usize,
    pub message: String,
    #[serde(skip)]
    pub width: usize,
}

#[derive(Serialize)]
struct DiagnosticReport<'a> {
    diagnostics: &'a [Diagnostic],
}

impl Diagnostic {
    pub fn from_parse(err: &ParseError) -> Self {
        let kind = if err.token.kind == TokenKind::Illegal {
            "lexical"
        } else {
            "syntax"
        };
        let width = match err.token.kind {
            TokenKind::Eof | TokenKind::Newline => 1,
            _ => err.token.text.chars().count().max(1),
        };
        Self::at(kind, Some(err.position()), err.message.clone(), width)
    }

    pub fn from_eval(err: &EvalError) -> Self {
        Self::at(eval_kind(&err.kind), err.position, err.kind.to_string(), 1)
    }

    fn at(kind: &'static str, position: Option<Position>, message: String, width: usize) -> Self {
        let (line, column) = position.map_or((0, 0), |pos| (pos.line, pos.column));
        Self {
            kind,
            line,
            column,
            message,
            width,
        }
    }
}

fn eval_kind(kind: &EvalErrorKind) -> &'static str {
    match kind {
        EvalErrorKind::TypeMismatch { .. } => "type-mismatch",
        EvalErrorKind::Unresolved { .. } => "unresolved",
        EvalErrorKind::ImmutableAssignment(_) => "immutable-assignment",
        EvalErrorKind::NotCallable(_) => "not-callable",
        EvalErrorKind::ArityMismatch { .. } => "arity-mismatch",
        EvalErrorKind::DivisionByZero => "division-by-zero",
        EvalErrorKind::IndexOutOfBounds { .. } => "index-out-of-bounds",
        EvalErrorKind::CallDepthExceeded(_) => "call-depth",
        EvalErrorKind::RecursiveType(_) => "recursive-type",
        EvalErrorKind::InvalidOperation(_) => "invalid-operation",
        EvalErrorKind::StaleContext => "stale-context",
        EvalErrorKind::Runtime(_) => "runtime",
    }
}

pub fn collect(err: &SourceError) -> Vec<Diagnostic> {
    match err {
        SourceError::Parse(errors) => errors.iter().map(Diagnostic::from_parse).collect(),
        SourceError::Eval(err) => vec![Diagnostic::from_eval(err)],
        SourceError::Io(err) => vec![Diagnostic::at("io", None, err.to_string(), 1)],
    }
}

pub fn to_json(diagnostics: &[Diagnostic]) -> String {
    serde_json::to_string(&DiagnosticReport { diagnostics })
        .unwrap_or_else(|_| "{\"diagnostics\":[]}".to_string())
}

/// Renders a diagnostic with the offending source line and a caret marker.
pub fn render(name: &str, source: &str, diagnostic: &Diagnostic, styled: bool) -> String {
    let label = if styled {
        format!("{}", "error".bright_red().bold())
    } else {
        "error".to_string()
    };

    let line_text = diagnostic
        .line
        .checked_sub(1)
        .and_then(|index| source.lines().nth(index));
    let Some(line_text) = line_text else {
        return match diagnostic.line {
            0 => format!("{label}: {}", diagnostic.message),
            line => format!("{label}: line {line}: {}", diagnostic.message),
        };
    };

    let line = diagnostic.line;
    let col = diagnostic.column.max(1);
    let mut pointer = format!(
        "{}{}",
        " ".repeat(col - 1),
        "^".repeat(diagnostic.width.max(1))
    );
    let mut arrow = "-->".to_string();
    if styled {
        pointer = format!("{}", pointer.bright_red().bold());
        arrow = format!("{}", arrow.bright_blue());
    }
    format!(
        "{label}: {}\n {arrow} {name}:{line}:{col}\n  |\n{line:>3} | {line_text}\n  | {pointer}",
        diagnostic.message
    )
}

pub fn render_all(name: &str, source: &str, err: &SourceError, styled: bool) -> String {
    collect(err)
        .iter()
        .map(|diagnostic| render(name, source, diagnostic, styled))
        .collect::<Vec<_>>()
        .join("\n")
}
