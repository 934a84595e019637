#![allow(dead_code, unused_imports)]

use std::io::{self, Cursor, Write};
use std::sync::{Arc, Mutex};

pub use interp::{
    ContextPool, EvalError, EvalErrorKind, Expr, Interpreter, InterpreterConfig, NameCategory,
    ParseError, SourceError, Stmt, StmtKind, Type, TypeExpr, Value, parse_source,
};

/// Cloneable in-memory sink standing in for stdout.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.bytes.lock().expect("buffer lock").clone();
        String::from_utf8(bytes).expect("output should be utf-8")
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().expect("buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn interpreter_with_input(input: &str, config: InterpreterConfig) -> (Interpreter, SharedBuffer) {
    let output = SharedBuffer::default();
    let interpreter = Interpreter::with_config(config)
        .with_io(Cursor::new(input.as_bytes().to_vec()), output.clone());
    (interpreter, output)
}

pub fn interpreter() -> (Interpreter, SharedBuffer) {
    interpreter_with_input("", InterpreterConfig::default())
}

pub fn run(source: &str) -> Value {
    let (mut interpreter, _) = interpreter();
    interpreter
        .eval_source(source)
        .unwrap_or_else(|err| panic!("source should run: {err}"))
}

pub fn run_output(source: &str) -> String {
    let (mut interpreter, output) = interpreter();
    interpreter
        .eval_source(source)
        .unwrap_or_else(|err| panic!("source should run: {err}"));
    output.contents()
}

pub fn eval_error(source: &str) -> EvalError {
    let (mut interpreter, _) = interpreter();
    match interpreter.eval_source(source) {
        Err(SourceError::Eval(err)) => err,
        Err(other) => panic!("expected an evaluation error, got {other}"),
        Ok(value) => panic!("expected an evaluation error, got value {value}"),
    }
}

pub fn parse_ok(source: &str) -> Vec<Stmt> {
    let output = parse_source(source);
    assert!(output.errors.is_empty(), "unexpected parse errors: {:?}", output.errors);
    output.statements
}

/// Value side of the single `let` in `source`.
pub fn let_value(source: &str) -> Expr {
    let mut statements = parse_ok(source);
    assert_eq!(statements.len(), 1);
    match statements.remove(0).kind {
        StmtKind::Let { value, .. } => value,
        other => panic!("expected let statement, got {other:?}"),
    }
}
