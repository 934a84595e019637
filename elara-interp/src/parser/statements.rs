use std::collections::HashMap;
use std::sync::LazyLock;

use crate::ast::{ContractDecl, FieldDecl, Stmt, StmtKind};
use crate::lexer::{Token, TokenKind};

use super::grammar::LOWEST;
use super::{ParseError, ParseFailure, ParseResult, Parser, expressions};

type StatementRule = fn(&mut Parser, Token) -> ParseResult<StmtKind>;

/// One-token dispatch on the leading keyword; anything else is an
/// expression statement.
static STATEMENTS: LazyLock<HashMap<TokenKind, StatementRule>> = LazyLock::new(|| {
    let mut rules: HashMap<TokenKind, StatementRule> = HashMap::new();
    rules.insert(TokenKind::Let, let_statement);
    rules.insert(TokenKind::While, while_statement);
    rules.insert(TokenKind::If, if_statement);
    rules.insert(TokenKind::LBrace, block_statement);
    rules.insert(TokenKind::Struct, struct_statement);
    rules.insert(TokenKind::Type, type_statement);
    rules.insert(TokenKind::LAngle, generic_statement);
    rules.insert(TokenKind::Return, return_statement);
    rules.insert(TokenKind::Extend, extend_statement);
    rules.insert(TokenKind::Namespace, namespace_statement);
    rules
});

impl Parser {
    pub(super) fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let position = self.tape.peek(0).position;
        let leading = self.tape.peek_kind(0);
        if let Some(rule) = STATEMENTS.get(&leading).copied() {
            let token = self.tape.advance();
            let kind = rule(self, token)?;
            return Ok(Stmt { kind, position });
        }
        let expr = self.parse_expression(LOWEST)?;
        Ok(Stmt {
            kind: StmtKind::Expression(expr),
            position,
        })
    }

    /// Rewrites function-shaped declarations into `= (params) -> body`:
    /// `let f(a) -> ..` gains `=`, `let f -> ..` gains `= ( )` and
    /// `let f = -> ..` gains `( )`. Injected tokens are synthetic, which
    /// keeps a second call from inserting again.
    pub(crate) fn normalize_function_initializer(&mut self) {
        let next = self.tape.peek(0);
        if next.synthetic {
            return;
        }
        let position = next.position;
        let equal = || Token::synthetic(TokenKind::Equal, "=", position);
        let open = || Token::synthetic(TokenKind::LParen, "(", position);
        let close = || Token::synthetic(TokenKind::RParen, ")", position);
        match next.kind {
            TokenKind::LParen => self.tape.insert(0, vec![equal()]),
            TokenKind::Arrow => self.tape.insert(0, vec![equal(), open(), close()]),
            TokenKind::Equal => {
                let after = self.tape.peek(1);
                if after.kind == TokenKind::Arrow && !after.synthetic {
                    self.tape.insert(1, vec![open(), close()]);
                }
            }
            _ => {}
        }
    }
}

fn let_statement(parser: &mut Parser, _token: Token) -> ParseResult<StmtKind> {
    let mutable = parser.tape.match_kind(TokenKind::Mut);
    let name = parser
        .tape
        .expect(
            TokenKind::Identifier,
            "expected identifier for variable declaration",
        )?
        .text;
    let ty = if parser.tape.match_kind(TokenKind::Colon) {
        Some(parser.parse_type(LOWEST)?)
    } else {
        None
    };
    if ty.is_none() {
        parser.normalize_function_initializer();
    }
    parser
        .tape
        .expect(TokenKind::Equal, "expected '=' in variable declaration")?;
    let value = parser.parse_expression(LOWEST)?;
    Ok(StmtKind::Let {
        name,
        mutable,
        ty,
        value,
    })
}

fn while_statement(parser: &mut Parser, _token: Token) -> ParseResult<StmtKind> {
    let condition = parser.parse_expression(LOWEST)?;
    let body = parser.parse_block()?;
    Ok(StmtKind::While { condition, body })
}

fn if_statement(parser: &mut Parser, token: Token) -> ParseResult<StmtKind> {
    let expr = expressions::if_expression(parser, token)?;
    Ok(StmtKind::Expression(expr))
}

fn block_statement(parser: &mut Parser, _token: Token) -> ParseResult<StmtKind> {
    Ok(StmtKind::Block(parser.parse_block_body()?))
}

fn struct_statement(parser: &mut Parser, _token: Token) -> ParseResult<StmtKind> {
    let name = parser
        .tape
        .expect(TokenKind::Identifier, "expected identifier after 'struct'")?
        .text;
    parser
        .tape
        .expect(TokenKind::LBrace, "expected '{' after struct name")?;

    let mut fields = Vec::new();
    let mut errors = Vec::new();
    parser.tape.skip_line_breaks();
    while !parser.tape.check(TokenKind::RBrace) && !parser.tape.is_at_end() {
        let start = parser.tape.mark();
        match struct_field(parser) {
            Ok(field) => {
                parser.tape.release(start);
                fields.push(field);
            }
            Err(failure) => {
                errors.extend(failure.into_errors());
                parser.synchronize(start, true);
            }
        }
        parser.tape.match_kind(TokenKind::Comma);
        parser.tape.skip_line_breaks();
    }
    if let Err(err) = parser
        .tape
        .expect(TokenKind::RBrace, "expected '}' at end of struct body")
    {
        errors.push(err);
    }
    if !errors.is_empty() {
        return Err(ParseFailure::Batch(errors));
    }
    Ok(StmtKind::Struct { name, fields })
}

fn struct_field(parser: &mut Parser) -> ParseResult<FieldDecl> {
    let mutable = parser.tape.match_kind(TokenKind::Mut);
    let name = parser
        .tape
        .expect(TokenKind::Identifier, "expected struct field name")?
        .text;
    parser
        .tape
        .expect(TokenKind::Colon, "expected ':' after struct field name")?;
    let ty = parser.parse_type(LOWEST)?;
    let default = if parser.tape.match_kind(TokenKind::Equal) {
        Some(parser.parse_expression(LOWEST)?)
    } else {
        None
    };
    let next = parser.tape.peek(0);
    if !matches!(
        next.kind,
        TokenKind::Newline | TokenKind::Comma | TokenKind::RBrace
    ) {
        return Err(ParseError::new(next.clone(), "expected newline after struct field").into());
    }
    Ok(FieldDecl {
        name,
        mutable,
        ty,
        default,
    })
}

fn type_statement(parser: &mut Parser, _token: Token) -> ParseResult<StmtKind> {
    let name = parser
        .tape
        .expect(TokenKind::Identifier, "expected identifier after 'type'")?
        .text;
    parser
        .tape
        .expect(TokenKind::Equal, "expected '=' in type declaration")?;
    let ty = parser.parse_type(LOWEST)?;
    Ok(StmtKind::TypeAlias { name, ty })
}

fn generic_statement(parser: &mut Parser, _token: Token) -> ParseResult<StmtKind> {
    let contracts = parser.parse_delimited(
        TokenKind::RAngle,
        "expected ',' or '>' in generic contract list",
        |parser| {
            let name = parser
                .tape
                .expect(TokenKind::Identifier, "expected generic parameter name")?
                .text;
            let bound = if parser.tape.match_kind(TokenKind::Colon) {
                Some(parser.parse_type(LOWEST)?)
            } else {
                None
            };
            Ok(ContractDecl { name, bound })
        },
    )?;
    if contracts.is_empty() {
        let token = parser.tape.peek(0).clone();
        return Err(ParseError::new(token, "generic statement declares no contracts").into());
    }
    parser.tape.skip_line_breaks();
    let body = parser.parse_statement()?;
    Ok(StmtKind::Generic {
        contracts,
        body: Box::new(body),
    })
}

fn return_statement(parser: &mut Parser, _token: Token) -> ParseResult<StmtKind> {
    if parser.tape.peek_kind(0).is_terminator() {
        return Ok(StmtKind::Return(None));
    }
    Ok(StmtKind::Return(Some(parser.parse_expression(LOWEST)?)))
}

fn extend_statement(parser: &mut Parser, _token: Token) -> ParseResult<StmtKind> {
    let target = parser.parse_type(LOWEST)?;
    let alias = if parser.tape.match_kind(TokenKind::As) {
        Some(
            parser
                .tape
                .expect(TokenKind::Identifier, "expected identifier for extend alias")?
                .text,
        )
    } else {
        None
    };
    let body = parser.parse_block()?;
    Ok(StmtKind::Extend {
        target,
        alias,
        body,
    })
}

fn namespace_statement(parser: &mut Parser, _token: Token) -> ParseResult<StmtKind> {
    let mut path = vec![
        parser
            .tape
            .expect(TokenKind::Identifier, "expected namespace name")?
            .text,
    ];
    while parser.tape.match_kind(TokenKind::Dot) {
        path.push(
            parser
                .tape
                .expect(TokenKind::Identifier, "expected namespace segment after '.'")?
                .text,
        );
    }
    let body = parser.parse_block()?;
    Ok(StmtKind::Namespace { path, body })
}
