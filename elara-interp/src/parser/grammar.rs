use std::collections::HashMap;

use crate::lexer::{Token, TokenKind};

use super::{ParseError, ParseResult, Parser};

pub type Precedence = u8;

pub const LOWEST: Precedence = 0;
pub const ASSIGNMENT: Precedence = 1;
pub const LOGICAL_OR: Precedence = 2;
pub const LOGICAL_AND: Precedence = 3;
pub const XOR: Precedence = 4;
pub const EQUALITY: Precedence = 5;
pub const COMPARISON: Precedence = 6;
pub const TYPE_CHECK: Precedence = 7;
pub const SUM: Precedence = 8;
pub const PRODUCT: Precedence = 9;
pub const PREFIX: Precedence = 10;
pub const POSTFIX: Precedence = 11;

pub const TYPE_UNION: Precedence = 1;
pub const TYPE_INTERSECTION: Precedence = 2;
pub const TYPE_APPLICATION: Precedence = 3;

/// Builds a node from the token that introduced it.
pub type PrefixRule<N> = fn(&mut Parser, Token) -> ParseResult<N>;

/// Combines an already parsed node with the operator token that follows it.
pub type InfixRule<N> = fn(&mut Parser, N, Token) -> ParseResult<N>;

pub struct Grammar<N> {
    name: &'static str,
    prefix: HashMap<TokenKind, PrefixRule<N>>,
    infix: HashMap<TokenKind, (Precedence, InfixRule<N>)>,
}

impl<N> Grammar<N> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            prefix: HashMap::new(),
            infix: HashMap::new(),
        }
    }

    pub fn prefix(mut self, kind: TokenKind, rule: PrefixRule<N>) -> Self {
        self.prefix.insert(kind, rule);
        self
    }

    pub fn infix(mut self, kind: TokenKind, precedence: Precedence, rule: InfixRule<N>) -> Self {
        self.infix.insert(kind, (precedence, rule));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn prefix_rule(&self, kind: TokenKind) -> Option<PrefixRule<N>> {
        self.prefix.get(&kind).copied()
    }

    pub fn infix_rule(&self, kind: TokenKind) -> Option<(Precedence, InfixRule<N>)> {
        self.infix.get(&kind).copied()
    }

    pub fn has_prefix(&self, kind: TokenKind) -> bool {
        self.prefix.contains_key(&kind)
    }
}

impl Parser {
    /// Precedence climbing shared by the expression and type grammars.
    pub(super) fn climb<N>(&mut self, grammar: &Grammar<N>, min: Precedence) -> ParseResult<N> {
        let kind = self.tape.peek_kind(0);
        let Some(prefix) = grammar.prefix_rule(kind) else {
            let token = self.tape.peek(0).clone();
            let message = if kind == TokenKind::Illegal {
                format!("invalid token '{}'", token.text)
            } else {
                format!("expected {}, found {}", grammar.name(), kind)
            };
            return Err(ParseError::new(token, message).into());
        };
        let token = self.tape.advance();
        let mut node = prefix(self, token)?;

        loop {
            let kind = self.tape.peek_kind(0);
            if kind.is_terminator() {
                break;
            }
            let Some((precedence, infix)) = grammar.infix_rule(kind) else {
                break;
            };
            if precedence <= min {
                break;
            }
            let token = self.tape.advance();
            node = infix(self, node, token)?;
        }
        Ok(node)
    }
}
