pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod interpreter;
pub mod lexer;
#[cfg(feature = "cli")]
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod types;

use std::io;

pub use ast::{Block, Expr, Lambda, Stmt, StmtKind, TypeExpr};
pub use config::InterpreterConfig;
pub use diagnostics::Diagnostic;
pub use interpreter::{
    Capture, Context, ContextId, ContextPool, Contexts, EvalError, EvalErrorKind, EvalResult,
    Function, Interpreter, NameCategory, Value, Variable,
};
pub use lexer::{Lexer, Position, Token, TokenKind};
pub use parser::{ParseError, ParseOutput, Parser, parse_source};
pub use pipeline::{ParseEvent, Pipeline, parse_pipelined};
pub use types::{Primitive, Type};

/// Failure of a whole source run: every syntax error, or the evaluation
/// error that stopped it.
#[derive(Debug)]
pub enum SourceError {
    Parse(Vec<ParseError>),
    Eval(EvalError),
    Io(io::Error),
}

impl SourceError {
    pub fn is_fatal(&self) -> bool {
        match self {
            SourceError::Parse(_) => false,
            SourceError::Eval(err) => err.is_fatal(),
            SourceError::Io(_) => true,
        }
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Parse(errors) => {
                for (index, err) in errors.iter().enumerate() {
                    if index > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "syntax error: {err}")?;
                }
                Ok(())
            }
            SourceError::Eval(err) => write!(f, "runtime error: {err}"),
            SourceError::Io(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<EvalError> for SourceError {
    fn from(value: EvalError) -> Self {
        SourceError::Eval(value)
    }
}

impl From<io::Error> for SourceError {
    fn from(value: io::Error) -> Self {
        SourceError::Io(value)
    }
}

/// Runs `source` on a fresh interpreter through the threaded pipeline.
pub fn run_source(source: &str, config: InterpreterConfig) -> Result<Value, SourceError> {
    Interpreter::with_config(config).run_pipelined(source)
}
