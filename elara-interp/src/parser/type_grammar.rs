use crate::ast::TypeExpr;
use crate::lexer::{Token, TokenKind};

use super::expressions::opens_parameter_list;
use super::grammar::{Grammar, LOWEST, TYPE_APPLICATION, TYPE_INTERSECTION, TYPE_UNION};
use super::{ParseError, ParseResult, Parser};

pub(super) fn grammar() -> Grammar<TypeExpr> {
    Grammar::new("type")
        .prefix(TokenKind::Identifier, named)
        .prefix(TokenKind::LParen, function_or_group)
        .prefix(TokenKind::LSquare, collection)
        .prefix(TokenKind::LBrace, map)
        .infix(TokenKind::TypeOr, TYPE_UNION, union)
        .infix(TokenKind::TypeAnd, TYPE_INTERSECTION, intersection)
        .infix(TokenKind::LAngle, TYPE_APPLICATION, application)
}

fn named(_parser: &mut Parser, token: Token) -> ParseResult<TypeExpr> {
    Ok(TypeExpr::Named(token.text))
}

fn function_or_group(parser: &mut Parser, _token: Token) -> ParseResult<TypeExpr> {
    if !opens_parameter_list(parser) {
        let inner = parser.parse_type(LOWEST)?;
        parser
            .tape
            .expect(TokenKind::RParen, "expected ')' after type")?;
        return Ok(inner);
    }
    let params = parser.parse_delimited(
        TokenKind::RParen,
        "expected ',' or ')' in function type",
        |parser| parser.parse_type(LOWEST),
    )?;
    parser
        .tape
        .expect(TokenKind::Arrow, "expected '->' in function type")?;
    let ret = parser.parse_type(LOWEST)?;
    Ok(TypeExpr::Function {
        params,
        ret: Box::new(ret),
    })
}

fn collection(parser: &mut Parser, _token: Token) -> ParseResult<TypeExpr> {
    let element = parser.parse_type(LOWEST)?;
    parser
        .tape
        .expect(TokenKind::RSquare, "expected ']' after collection element type")?;
    Ok(TypeExpr::Collection(Box::new(element)))
}

fn map(parser: &mut Parser, _token: Token) -> ParseResult<TypeExpr> {
    let key = parser.parse_type(LOWEST)?;
    parser
        .tape
        .expect(TokenKind::Colon, "expected ':' in map type")?;
    let value = parser.parse_type(LOWEST)?;
    parser
        .tape
        .expect(TokenKind::RBrace, "expected '}' after map value type")?;
    Ok(TypeExpr::Map {
        key: Box::new(key),
        value: Box::new(value),
    })
}

type Unwrap = fn(TypeExpr) -> Result<Vec<TypeExpr>, TypeExpr>;

/// Splices same-kind operands so `A | B | C` is one three-member union.
fn flatten(left: TypeExpr, right: TypeExpr, unwrap: Unwrap) -> Vec<TypeExpr> {
    let mut members = Vec::new();
    for side in [left, right] {
        match unwrap(side) {
            Ok(inner) => members.extend(inner),
            Err(single) => members.push(single),
        }
    }
    members
}

fn union(parser: &mut Parser, left: TypeExpr, _token: Token) -> ParseResult<TypeExpr> {
    let right = parser.parse_type(TYPE_UNION)?;
    Ok(TypeExpr::Union(flatten(left, right, |ty| match ty {
        TypeExpr::Union(members) => Ok(members),
        other => Err(other),
    })))
}

fn intersection(parser: &mut Parser, left: TypeExpr, _token: Token) -> ParseResult<TypeExpr> {
    let right = parser.parse_type(TYPE_INTERSECTION)?;
    Ok(TypeExpr::Intersection(flatten(left, right, |ty| match ty {
        TypeExpr::Intersection(members) => Ok(members),
        other => Err(other),
    })))
}

/// `Collection<T>` and `Map<K, V>`; the base must be a plain name.
fn application(parser: &mut Parser, left: TypeExpr, token: Token) -> ParseResult<TypeExpr> {
    let TypeExpr::Named(base) = left else {
        return Err(ParseError::new(token, "type arguments require a named type").into());
    };
    let args = parser.parse_delimited(
        TokenKind::RAngle,
        "expected ',' or '>' in type arguments",
        |parser| parser.parse_type(LOWEST),
    )?;
    if args.is_empty() {
        return Err(ParseError::new(token, "expected at least one type argument").into());
    }
    Ok(TypeExpr::Applied { base, args })
}
