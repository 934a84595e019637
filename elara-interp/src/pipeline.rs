//! Threaded front end: a lexer thread feeds tokens to a parser thread, which
//! hands finished statements to the caller in source order.

use std::io;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use crate::SourceError;
use crate::ast::Stmt;
use crate::config::InterpreterConfig;
use crate::interpreter::{EvalError, Interpreter, Value};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::parser::{ParseError, ParseOutput, Parser};

#[derive(Debug)]
pub enum ParseEvent {
    Statement(Stmt),
    /// Errors of one malformed top-level statement.
    Error(Vec<ParseError>),
}

pub struct Pipeline {
    events: Receiver<ParseEvent>,
    workers: Vec<JoinHandle<()>>,
}

impl Pipeline {
    pub fn spawn(source: &str, config: &InterpreterConfig) -> io::Result<Self> {
        let (token_tx, token_rx) = mpsc::sync_channel::<Token>(config.token_queue.max(1));
        let (event_tx, event_rx) = mpsc::sync_channel::<ParseEvent>(config.statement_queue.max(1));

        let source = source.to_string();
        let lexer = thread::Builder::new()
            .name("elara-lexer".to_string())
            .spawn(move || lex_into(&source, token_tx))?;
        let parser = thread::Builder::new()
            .name("elara-parser".to_string())
            .spawn(move || parse_into(token_rx, event_tx))?;

        Ok(Self {
            events: event_rx,
            workers: vec![lexer, parser],
        })
    }

    /// Drops any unread events and waits for both worker threads.
    pub fn join(self) -> io::Result<()> {
        let Pipeline { events, workers } = self;
        drop(events);
        for worker in workers {
            worker
                .join()
                .map_err(|_| io::Error::other("parse pipeline worker panicked"))?;
        }
        Ok(())
    }
}

impl Iterator for Pipeline {
    type Item = ParseEvent;

    fn next(&mut self) -> Option<ParseEvent> {
        self.events.recv().ok()
    }
}

fn lex_into(source: &str, tokens: SyncSender<Token>) {
    let mut lexer = Lexer::new(source);
    loop {
        let token = lexer.next_token();
        let done = token.kind == TokenKind::Eof;
        if tokens.send(token).is_err() {
            trace!("token consumer hung up");
            return;
        }
        if done {
            return;
        }
    }
}

fn parse_into(tokens: Receiver<Token>, events: SyncSender<ParseEvent>) {
    let mut parser = Parser::with_source(Box::new(tokens));
    while let Some(result) = parser.next_statement() {
        let event = match result {
            Ok(stmt) => ParseEvent::Statement(stmt),
            Err(errors) => ParseEvent::Error(errors),
        };
        if events.send(event).is_err() {
            trace!("statement consumer hung up");
            return;
        }
    }
}

/// Parses `source` through the threaded pipeline, collecting everything.
pub fn parse_pipelined(source: &str, config: &InterpreterConfig) -> io::Result<ParseOutput> {
    let mut pipeline = Pipeline::spawn(source, config)?;
    let mut output = ParseOutput::default();
    for event in pipeline.by_ref() {
        match event {
            ParseEvent::Statement(stmt) => output.statements.push(stmt),
            ParseEvent::Error(errors) => output.errors.extend(errors),
        }
    }
    pipeline.join()?;
    Ok(output)
}

impl Interpreter {
    /// Evaluates statements as the parser thread produces them. After the
    /// first parse error nothing more is evaluated, but the remaining input
    /// is still parsed so every syntax error is reported.
    pub fn run_pipelined(&mut self, source: &str) -> Result<Value, SourceError> {
        let mut pipeline = Pipeline::spawn(source, self.config())?;
        let run = self.with_eval_stack(|this| {
            let mut last = Value::unit();
            let mut errors = Vec::new();
            for event in pipeline.by_ref() {
                match event {
                    ParseEvent::Statement(stmt) if errors.is_empty() => {
                        last = this.execute(&stmt).inspect_err(|err| {
                            debug!("stopping pipelined run: {err}");
                        })?;
                    }
                    ParseEvent::Statement(_) => {}
                    ParseEvent::Error(batch) => errors.extend(batch),
                }
            }
            Ok::<_, EvalError>((last, errors))
        });
        pipeline.join()?;

        let (last, errors) = run?;
        if errors.is_empty() {
            Ok(last)
        } else {
            Err(SourceError::Parse(errors))
        }
    }
}
