use std::fmt;
use std::sync::LazyLock;

use tracing::{debug, warn};

use crate::ast::{Block, Expr, Stmt, TypeExpr};
use crate::lexer::{Position, Token, TokenKind};

mod expressions;
pub mod grammar;
mod statements;
pub mod tape;
mod type_grammar;

use grammar::{Grammar, Precedence};
pub use tape::{TapeMark, TokenSource, TokenTape};

static EXPRESSIONS: LazyLock<Grammar<Expr>> = LazyLock::new(expressions::grammar);
static TYPES: LazyLock<Grammar<TypeExpr>> = LazyLock::new(type_grammar::grammar);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub token: Token,
    pub message: String,
}

impl ParseError {
    pub fn new(token: Token, message: impl Into<String>) -> Self {
        Self {
            token,
            message: message.into(),
        }
    }

    pub fn position(&self) -> Position {
        self.token.position
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.token.kind {
            TokenKind::Eof => write!(f, "{}: {} at end of input", self.position(), self.message),
            TokenKind::Newline => write!(f, "{}: {} at end of line", self.position(), self.message),
            _ => write!(
                f,
                "{}: {} at '{}'",
                self.position(),
                self.message,
                self.token.text
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Failure of one parse step: a single error, or the errors a nested block
/// collected while recovering internally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    Single(ParseError),
    Batch(Vec<ParseError>),
}

impl ParseFailure {
    pub fn into_errors(self) -> Vec<ParseError> {
        match self {
            ParseFailure::Single(err) => vec![err],
            ParseFailure::Batch(errors) => errors,
        }
    }
}

impl From<ParseError> for ParseFailure {
    fn from(value: ParseError) -> Self {
        ParseFailure::Single(value)
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseFailure::Single(err) => write!(f, "{err}"),
            ParseFailure::Batch(errors) => {
                for (index, err) in errors.iter().enumerate() {
                    if index > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{err}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ParseFailure {}

pub type ParseResult<T> = Result<T, ParseFailure>;

#[derive(Debug, Default)]
pub struct ParseOutput {
    pub statements: Vec<Stmt>,
    pub errors: Vec<ParseError>,
}

impl ParseOutput {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct Parser {
    tape: TokenTape,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Self {
            tape: TokenTape::from_source(source),
        }
    }

    pub fn with_source(source: Box<dyn TokenSource>) -> Self {
        Self {
            tape: TokenTape::new(source),
        }
    }

    pub fn tape(&mut self) -> &mut TokenTape {
        &mut self.tape
    }

    /// Parses everything, collecting every statement and every error.
    pub fn parse(&mut self) -> ParseOutput {
        let mut output = ParseOutput::default();
        while let Some(result) = self.next_statement() {
            match result {
                Ok(stmt) => output.statements.push(stmt),
                Err(errors) => output.errors.extend(errors),
            }
        }
        output
    }

    /// Parses the next top-level statement. A malformed statement yields its
    /// errors and leaves the tape at the start of the following line.
    pub fn next_statement(&mut self) -> Option<Result<Stmt, Vec<ParseError>>> {
        self.tape.skip_line_breaks();
        self.tape.compact();
        if self.tape.is_at_end() {
            return None;
        }

        let start = self.tape.mark();
        match self.parse_line(&[TokenKind::Newline, TokenKind::Eof]) {
            Ok(stmt) => {
                self.tape.release(start);
                debug!(position = %stmt.position, "parsed statement");
                Some(Ok(stmt))
            }
            Err(failure) => {
                let errors = failure.into_errors();
                for err in &errors {
                    warn!("recorded parse error: {err}");
                }
                self.synchronize(start, false);
                Some(Err(errors))
            }
        }
    }

    pub fn parse_expression(&mut self, min: Precedence) -> ParseResult<Expr> {
        self.climb(&EXPRESSIONS, min)
    }

    pub fn parse_type(&mut self, min: Precedence) -> ParseResult<TypeExpr> {
        self.climb(&TYPES, min)
    }

    fn parse_line(&mut self, terminators: &[TokenKind]) -> ParseResult<Stmt> {
        let stmt = self.parse_statement()?;
        let next = self.tape.peek(0);
        if !terminators.contains(&next.kind) {
            return Err(ParseError::new(next.clone(), "expected newline after statement").into());
        }
        self.tape.match_kind(TokenKind::Newline);
        Ok(stmt)
    }

    /// Rewinds to the start of the failed statement and skips to the next
    /// line, stepping over any braces the statement opened.
    fn synchronize(&mut self, start: TapeMark, nested: bool) {
        self.tape.rewind(start);
        let mut depth = 0usize;
        loop {
            match self.tape.peek_kind(0) {
                TokenKind::Eof => break,
                TokenKind::Newline if depth == 0 => break,
                TokenKind::RBrace if depth == 0 => {
                    if nested {
                        break;
                    }
                }
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth -= 1,
                _ => {}
            }
            self.tape.advance();
        }
        self.tape.skip_line_breaks();
    }

    pub(crate) fn parse_block(&mut self) -> ParseResult<Block> {
        self.tape
            .expect(TokenKind::LBrace, "expected '{' at beginning of block")?;
        self.parse_block_body()
    }

    /// Parses statements up to the closing brace. Each malformed inner
    /// statement is recovered from locally; all of them fail the block as
    /// one batch once the brace is consumed.
    pub(crate) fn parse_block_body(&mut self) -> ParseResult<Block> {
        let mut stmts = Vec::new();
        let mut errors = Vec::new();
        self.tape.skip_line_breaks();
        while !self.tape.check(TokenKind::RBrace) && !self.tape.is_at_end() {
            let start = self.tape.mark();
            match self.parse_line(&[TokenKind::Newline, TokenKind::RBrace]) {
                Ok(stmt) => {
                    self.tape.release(start);
                    stmts.push(stmt);
                }
                Err(failure) => {
                    errors.extend(failure.into_errors());
                    self.synchronize(start, true);
                }
            }
            self.tape.skip_line_breaks();
        }
        if let Err(err) = self
            .tape
            .expect(TokenKind::RBrace, "expected '}' at end of block")
        {
            errors.push(err);
        }
        if errors.is_empty() {
            Ok(Block::new(stmts))
        } else {
            Err(ParseFailure::Batch(errors))
        }
    }

    /// Parses comma separated items up to `close`, allowing line breaks
    /// between items. Consumes the closing token.
    pub(crate) fn parse_delimited<T>(
        &mut self,
        close: TokenKind,
        message: &str,
        mut item: impl FnMut(&mut Parser) -> ParseResult<T>,
    ) -> ParseResult<Vec<T>> {
        let mut items = Vec::new();
        self.tape.skip_line_breaks();
        while !self.tape.check(close) {
            if !items.is_empty() {
                self.tape.expect(TokenKind::Comma, message)?;
                self.tape.skip_line_breaks();
            }
            items.push(item(self)?);
            self.tape.skip_line_breaks();
        }
        self.tape.expect(close, message)?;
        Ok(items)
    }
}

pub fn parse_source(source: &str) -> ParseOutput {
    Parser::new(source).parse()
}
