use std::sync::Arc;

use crate::ast::{BinaryOp, Block, Expr, Lambda, LambdaBody, Param, Stmt, StmtKind, UnaryOp};
use crate::lexer::{Token, TokenKind};

use super::grammar::{
    ASSIGNMENT, COMPARISON, EQUALITY, Grammar, LOGICAL_AND, LOGICAL_OR, LOWEST, POSTFIX, PREFIX,
    PRODUCT, Precedence, SUM, TYPE_CHECK, XOR,
};
use super::{ParseError, ParseResult, Parser};

pub(super) fn grammar() -> Grammar<Expr> {
    Grammar::new("expression")
        .prefix(TokenKind::Int, int_literal)
        .prefix(TokenKind::Float, float_literal)
        .prefix(TokenKind::String, string_literal)
        .prefix(TokenKind::Char, char_literal)
        .prefix(TokenKind::BooleanTrue, bool_literal)
        .prefix(TokenKind::BooleanFalse, bool_literal)
        .prefix(TokenKind::Identifier, variable)
        .prefix(TokenKind::LParen, group_or_lambda)
        .prefix(TokenKind::LSquare, collection_literal)
        .prefix(TokenKind::LBrace, map_literal)
        .prefix(TokenKind::Subtract, unary)
        .prefix(TokenKind::Not, unary)
        .prefix(TokenKind::If, if_expression)
        .infix(TokenKind::Equal, ASSIGNMENT, assignment)
        .infix(TokenKind::Or, LOGICAL_OR, binary)
        .infix(TokenKind::And, LOGICAL_AND, binary)
        .infix(TokenKind::Xor, XOR, binary)
        .infix(TokenKind::Equals, EQUALITY, binary)
        .infix(TokenKind::NotEquals, EQUALITY, binary)
        .infix(TokenKind::LAngle, COMPARISON, binary)
        .infix(TokenKind::RAngle, COMPARISON, binary)
        .infix(TokenKind::LesserEqual, COMPARISON, binary)
        .infix(TokenKind::GreaterEqual, COMPARISON, binary)
        .infix(TokenKind::Is, TYPE_CHECK, type_check)
        .infix(TokenKind::Add, SUM, binary)
        .infix(TokenKind::Subtract, SUM, binary)
        .infix(TokenKind::Multiply, PRODUCT, binary)
        .infix(TokenKind::Slash, PRODUCT, binary)
        .infix(TokenKind::Mod, PRODUCT, binary)
        .infix(TokenKind::LParen, POSTFIX, call)
        .infix(TokenKind::LSquare, POSTFIX, index)
        .infix(TokenKind::Dot, POSTFIX, member)
}

fn int_literal(_parser: &mut Parser, token: Token) -> ParseResult<Expr> {
    match token.text.parse::<i64>() {
        Ok(value) => Ok(Expr::Int(value)),
        Err(_) => Err(ParseError::new(token, "integer literal out of range").into()),
    }
}

fn float_literal(_parser: &mut Parser, token: Token) -> ParseResult<Expr> {
    match token.text.parse::<f64>() {
        Ok(value) => Ok(Expr::Float(value)),
        Err(_) => Err(ParseError::new(token, "invalid float literal").into()),
    }
}

fn string_literal(_parser: &mut Parser, token: Token) -> ParseResult<Expr> {
    Ok(Expr::Str(token.text))
}

fn char_literal(_parser: &mut Parser, token: Token) -> ParseResult<Expr> {
    let mut chars = token.text.chars();
    match (chars.next(), chars.next()) {
        (Some(value), None) => Ok(Expr::Char(value)),
        _ => Err(ParseError::new(token, "invalid char literal").into()),
    }
}

fn bool_literal(_parser: &mut Parser, token: Token) -> ParseResult<Expr> {
    Ok(Expr::Bool(token.kind == TokenKind::BooleanTrue))
}

fn variable(_parser: &mut Parser, token: Token) -> ParseResult<Expr> {
    Ok(Expr::Variable(token.text))
}

fn unary(parser: &mut Parser, token: Token) -> ParseResult<Expr> {
    let op = match token.kind {
        TokenKind::Not => UnaryOp::Not,
        _ => UnaryOp::Negate,
    };
    let operand = parser.parse_expression(PREFIX)?;
    Ok(Expr::Unary {
        op,
        operand: Box::new(operand),
    })
}

/// True when the `(` just consumed closes with a `)` followed by `->`.
pub(super) fn opens_parameter_list(parser: &mut Parser) -> bool {
    let mut depth = 1usize;
    let mut offset = 0;
    loop {
        match parser.tape.peek_kind(offset) {
            TokenKind::Eof => return false,
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth -= 1;
                if depth == 0 {
                    return parser.tape.validation_peek(offset + 1, TokenKind::Arrow);
                }
            }
            _ => {}
        }
        offset += 1;
    }
}

fn group_or_lambda(parser: &mut Parser, _token: Token) -> ParseResult<Expr> {
    if opens_parameter_list(parser) {
        return lambda(parser);
    }
    parser.tape.skip_line_breaks();
    let inner = parser.parse_expression(LOWEST)?;
    parser.tape.skip_line_breaks();
    if parser.tape.check(TokenKind::Comma) {
        let token = parser.tape.peek(0).clone();
        return Err(ParseError::new(token, "tuple expressions are not supported").into());
    }
    parser
        .tape
        .expect(TokenKind::RParen, "expected ')' after expression")?;
    Ok(inner)
}

fn lambda(parser: &mut Parser) -> ParseResult<Expr> {
    let params = parser.parse_delimited(
        TokenKind::RParen,
        "expected ',' or ')' in parameter list",
        lambda_param,
    )?;
    parser
        .tape
        .expect(TokenKind::Arrow, "expected '->' after parameter list")?;
    let body = if parser.tape.check(TokenKind::LBrace) {
        LambdaBody::Block(parser.parse_block()?)
    } else {
        LambdaBody::Expr(parser.parse_expression(LOWEST)?)
    };
    Ok(Expr::Lambda(Arc::new(Lambda { params, body })))
}

fn lambda_param(parser: &mut Parser) -> ParseResult<Param> {
    let mutable = parser.tape.match_kind(TokenKind::Mut);
    let name = parser
        .tape
        .expect(TokenKind::Identifier, "expected parameter name")?
        .text;
    let ty = if parser.tape.match_kind(TokenKind::Colon) {
        Some(parser.parse_type(LOWEST)?)
    } else {
        None
    };
    Ok(Param { name, mutable, ty })
}

fn collection_literal(parser: &mut Parser, _token: Token) -> ParseResult<Expr> {
    let elements = parser.parse_delimited(
        TokenKind::RSquare,
        "expected ',' or ']' in collection literal",
        |parser| parser.parse_expression(LOWEST),
    )?;
    Ok(Expr::Collection(elements))
}

fn map_literal(parser: &mut Parser, _token: Token) -> ParseResult<Expr> {
    let entries = parser.parse_delimited(
        TokenKind::RBrace,
        "expected ',' or '}' in map literal",
        |parser| {
            let key = parser.parse_expression(LOWEST)?;
            parser
                .tape
                .expect(TokenKind::Colon, "expected ':' after map key")?;
            parser.tape.skip_line_breaks();
            let value = parser.parse_expression(LOWEST)?;
            Ok((key, value))
        },
    )?;
    Ok(Expr::Map(entries))
}

/// `if cond { .. } [else if ..] [else { .. }]`. An `else` may start on a
/// later line.
pub(super) fn if_expression(parser: &mut Parser, _token: Token) -> ParseResult<Expr> {
    let condition = parser.parse_expression(LOWEST)?;
    let then_branch = parser.parse_block()?;

    let mut offset = 0;
    while parser.tape.validation_peek(offset, TokenKind::Newline) {
        offset += 1;
    }
    if !parser.tape.validation_peek(offset, TokenKind::Else) {
        return Ok(Expr::If {
            condition: Box::new(condition),
            then_branch,
            else_branch: None,
        });
    }
    parser.tape.skip_line_breaks();
    parser.tape.advance();

    let else_branch = if parser.tape.check(TokenKind::If) {
        let nested_token = parser.tape.advance();
        let position = nested_token.position;
        let nested = if_expression(parser, nested_token)?;
        Block::new(vec![Stmt {
            kind: StmtKind::Expression(nested),
            position,
        }])
    } else {
        parser.parse_block()?
    };
    Ok(Expr::If {
        condition: Box::new(condition),
        then_branch,
        else_branch: Some(else_branch),
    })
}

fn binary_op(kind: TokenKind) -> Option<(BinaryOp, Precedence)> {
    let op = match kind {
        TokenKind::Or => (BinaryOp::Or, LOGICAL_OR),
        TokenKind::And => (BinaryOp::And, LOGICAL_AND),
        TokenKind::Xor => (BinaryOp::Xor, XOR),
        TokenKind::Equals => (BinaryOp::Equals, EQUALITY),
        TokenKind::NotEquals => (BinaryOp::NotEquals, EQUALITY),
        TokenKind::LAngle => (BinaryOp::Less, COMPARISON),
        TokenKind::RAngle => (BinaryOp::Greater, COMPARISON),
        TokenKind::LesserEqual => (BinaryOp::LessEqual, COMPARISON),
        TokenKind::GreaterEqual => (BinaryOp::GreaterEqual, COMPARISON),
        TokenKind::Add => (BinaryOp::Add, SUM),
        TokenKind::Subtract => (BinaryOp::Subtract, SUM),
        TokenKind::Multiply => (BinaryOp::Multiply, PRODUCT),
        TokenKind::Slash => (BinaryOp::Divide, PRODUCT),
        TokenKind::Mod => (BinaryOp::Modulo, PRODUCT),
        _ => return None,
    };
    Some(op)
}

fn binary(parser: &mut Parser, left: Expr, token: Token) -> ParseResult<Expr> {
    let Some((op, precedence)) = binary_op(token.kind) else {
        return Err(ParseError::new(token, "unknown binary operator").into());
    };
    parser.tape.skip_line_breaks();
    let right = parser.parse_expression(precedence)?;
    Ok(Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn assignment(parser: &mut Parser, left: Expr, token: Token) -> ParseResult<Expr> {
    if !matches!(
        left,
        Expr::Variable(_) | Expr::Access { .. } | Expr::Index { .. }
    ) {
        return Err(ParseError::new(token, "invalid assignment target").into());
    }
    // right associative: `a = b = c` is `a = (b = c)`
    let value = parser.parse_expression(ASSIGNMENT - 1)?;
    Ok(Expr::Assign {
        target: Box::new(left),
        value: Box::new(value),
    })
}

fn type_check(parser: &mut Parser, left: Expr, _token: Token) -> ParseResult<Expr> {
    let ty = parser.parse_type(LOWEST)?;
    Ok(Expr::Is {
        value: Box::new(left),
        ty,
    })
}

fn call(parser: &mut Parser, callee: Expr, _token: Token) -> ParseResult<Expr> {
    let args = parser.parse_delimited(
        TokenKind::RParen,
        "expected ',' or ')' in argument list",
        |parser| parser.parse_expression(LOWEST),
    )?;
    Ok(Expr::Call {
        callee: Box::new(callee),
        args,
    })
}

fn index(parser: &mut Parser, target: Expr, _token: Token) -> ParseResult<Expr> {
    let index = parser.parse_expression(LOWEST)?;
    parser
        .tape
        .expect(TokenKind::RSquare, "expected ']' after index")?;
    Ok(Expr::Index {
        target: Box::new(target),
        index: Box::new(index),
    })
}

fn member(parser: &mut Parser, target: Expr, _token: Token) -> ParseResult<Expr> {
    let member = parser
        .tape
        .expect(TokenKind::Identifier, "expected member name after '.'")?
        .text;
    Ok(Expr::Access {
        target: Box::new(target),
        member,
    })
}
