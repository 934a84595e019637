use std::sync::mpsc::Receiver;

use crate::lexer::{Lexer, Position, Token, TokenKind};

use super::ParseError;

/// Pull-based producer of tokens. Implementations must eventually yield
/// `TokenKind::Eof` and keep yielding it.
pub trait TokenSource {
    fn next_token(&mut self) -> Token;
}

impl TokenSource for Lexer {
    fn next_token(&mut self) -> Token {
        Lexer::next_token(self)
    }
}

/// A hung-up producer reads as end of input.
impl TokenSource for Receiver<Token> {
    fn next_token(&mut self) -> Token {
        self.recv()
            .unwrap_or_else(|_| Token::eof(Position::default()))
    }
}

impl TokenSource for std::vec::IntoIter<Token> {
    fn next_token(&mut self) -> Token {
        self.next().unwrap_or_else(|| Token::eof(Position::default()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TapeMark(usize);

pub struct TokenTape {
    source: Box<dyn TokenSource>,
    buffer: Vec<Token>,
    cursor: usize,
    closed: bool,
    marks: usize,
    last_position: Position,
}

impl TokenTape {
    pub fn new(source: Box<dyn TokenSource>) -> Self {
        Self {
            source,
            buffer: Vec::new(),
            cursor: 0,
            closed: false,
            marks: 0,
            last_position: Position::new(1, 1),
        }
    }

    pub fn from_source(source: &str) -> Self {
        Self::new(Box::new(Lexer::new(source)))
    }

    /// Pulls from the source until `index` is buffered or end of input was seen.
    fn fill(&mut self, index: usize) {
        while !self.closed && self.buffer.len() <= index {
            let mut token = self.source.next_token();
            if token.kind == TokenKind::Eof {
                self.closed = true;
                if token.position == Position::default() {
                    token.position = self.last_position;
                }
            } else {
                self.last_position = token.position;
            }
            self.buffer.push(token);
        }
    }

    /// Looks `offset` tokens ahead. Past the end this is the end-of-input token.
    pub fn peek(&mut self, offset: usize) -> &Token {
        let index = self.cursor + offset;
        self.fill(index);
        let last = self.buffer.len() - 1;
        &self.buffer[index.min(last)]
    }

    pub fn peek_kind(&mut self, offset: usize) -> TokenKind {
        self.peek(offset).kind
    }

    pub fn validation_peek(&mut self, offset: usize, kind: TokenKind) -> bool {
        self.peek_kind(offset) == kind
    }

    pub fn check(&mut self, kind: TokenKind) -> bool {
        self.validation_peek(0, kind)
    }

    pub fn is_at_end(&mut self) -> bool {
        self.check(TokenKind::Eof)
    }

    /// True once the source has produced end of input.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn advance(&mut self) -> Token {
        let token = self.peek(0).clone();
        debug_assert!(
            token.kind != TokenKind::Eof || self.cursor < self.buffer.len(),
            "advanced past end of input"
        );
        if self.cursor < self.buffer.len() {
            self.cursor += 1;
        }
        token
    }

    pub fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes a token of `kind`; on mismatch nothing is consumed.
    pub fn expect(&mut self, kind: TokenKind, message: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::new(self.peek(0).clone(), message))
        }
    }

    pub fn skip_line_breaks(&mut self) {
        while self.match_kind(TokenKind::Newline) {}
    }

    /// Splices `tokens` in `offset` tokens ahead of the cursor.
    pub fn insert(&mut self, offset: usize, tokens: Vec<Token>) {
        let index = self.cursor + offset;
        self.fill(index);
        let index = index.min(self.buffer.len().saturating_sub(1));
        self.buffer.splice(index..index, tokens);
    }

    pub fn mark(&mut self) -> TapeMark {
        self.marks += 1;
        TapeMark(self.cursor)
    }

    pub fn rewind(&mut self, mark: TapeMark) {
        self.cursor = mark.0;
        self.release(mark);
    }

    pub fn release(&mut self, _mark: TapeMark) {
        self.marks = self.marks.saturating_sub(1);
    }

    /// Drops consumed tokens; a no-op while a mark is outstanding.
    pub fn compact(&mut self) {
        if self.marks > 0 {
            return;
        }
        // the end-of-input token stays buffered so peeking keeps working
        let keep_from = if self.closed {
            self.buffer.len().saturating_sub(1)
        } else {
            self.buffer.len()
        };
        let upto = self.cursor.min(keep_from);
        self.buffer.drain(..upto);
        self.cursor -= upto;
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len().saturating_sub(self.cursor)
    }
}
