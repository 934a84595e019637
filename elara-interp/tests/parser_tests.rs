mod common;
use common::*;

use interp::ast::{BinaryOp, Lambda, LambdaBody, Param, UnaryOp};
use std::sync::Arc;

fn var(name: &str) -> Expr {
    Expr::Variable(name.to_string())
}

fn named(name: &str) -> TypeExpr {
    TypeExpr::Named(name.to_string())
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn expression(source: &str) -> Expr {
    let mut statements = parse_ok(source);
    assert_eq!(statements.len(), 1);
    match statements.remove(0).kind {
        StmtKind::Expression(expr) => expr,
        other => panic!("expected expression statement, got {other:?}"),
    }
}

fn declared_type(source: &str) -> TypeExpr {
    let mut statements = parse_ok(source);
    match statements.remove(0).kind {
        StmtKind::Let { ty: Some(ty), .. } => ty,
        other => panic!("expected annotated let, got {other:?}"),
    }
}

#[test]
fn products_bind_tighter_than_sums() {
    assert_eq!(
        expression("1 + 2 * 3"),
        binary(
            BinaryOp::Add,
            Expr::Int(1),
            binary(BinaryOp::Multiply, Expr::Int(2), Expr::Int(3))
        )
    );
}

#[test]
fn binary_operators_associate_left() {
    assert_eq!(
        expression("a - b - c"),
        binary(
            BinaryOp::Subtract,
            binary(BinaryOp::Subtract, var("a"), var("b")),
            var("c")
        )
    );
}

#[test]
fn assignment_associates_right() {
    let expected = Expr::Assign {
        target: Box::new(var("a")),
        value: Box::new(Expr::Assign {
            target: Box::new(var("b")),
            value: Box::new(Expr::Int(1)),
        }),
    };
    assert_eq!(expression("a = b = 1"), expected);
}

#[test]
fn logical_and_comparison_precedence() {
    assert_eq!(
        expression("a < 1 || b && !c"),
        binary(
            BinaryOp::Or,
            binary(BinaryOp::Less, var("a"), Expr::Int(1)),
            binary(
                BinaryOp::And,
                var("b"),
                Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(var("c")),
                }
            )
        )
    );
}

#[test]
fn postfix_chains() {
    let expected = Expr::Call {
        callee: Box::new(Expr::Access {
            target: Box::new(Expr::Index {
                target: Box::new(var("xs")),
                index: Box::new(Expr::Int(0)),
            }),
            member: "size".to_string(),
        }),
        args: Vec::new(),
    };
    assert_eq!(expression("xs[0].size()"), expected);
}

#[test]
fn parenthesised_group_is_not_a_lambda() {
    assert_eq!(
        expression("(1 + 2) * 3"),
        binary(
            BinaryOp::Multiply,
            binary(BinaryOp::Add, Expr::Int(1), Expr::Int(2)),
            Expr::Int(3)
        )
    );
}

#[test]
fn lambda_value_is_the_same_with_or_without_annotation() {
    let bare = let_value("let x = (a) -> a");
    let annotated = let_value("let x: (Int) -> Int = (a) -> a");
    assert_eq!(bare, annotated);

    let expected = Expr::Lambda(Arc::new(Lambda {
        params: vec![Param {
            name: "a".to_string(),
            mutable: false,
            ty: None,
        }],
        body: LambdaBody::Expr(var("a")),
    }));
    assert_eq!(bare, expected);
}

#[test]
fn function_shorthand_declarations_normalize() {
    assert_eq!(let_value("let f(a) -> a"), let_value("let f = (a) -> a"));
    assert_eq!(let_value("let f -> 1"), let_value("let f = () -> 1"));
    assert_eq!(let_value("let f = -> 1"), let_value("let f = () -> 1"));
}

#[test]
fn lambda_with_block_body_and_typed_parameters() {
    let value = let_value("let f = (mut a: Int, b) -> {\n  a = a + b\n  a\n}");
    let Expr::Lambda(lambda) = value else {
        panic!("expected lambda");
    };
    assert_eq!(lambda.params.len(), 2);
    assert!(lambda.params[0].mutable);
    assert_eq!(lambda.params[0].ty, Some(named("Int")));
    assert_eq!(lambda.params[1].ty, None);
    let LambdaBody::Block(block) = &lambda.body else {
        panic!("expected block body");
    };
    assert_eq!(block.stmts.len(), 2);
}

#[test]
fn type_grammar_shapes() {
    assert_eq!(
        declared_type("let f: (Int, String) -> [Boolean] = g"),
        TypeExpr::Function {
            params: vec![named("Int"), named("String")],
            ret: Box::new(TypeExpr::Collection(Box::new(named("Boolean")))),
        }
    );
    assert_eq!(
        declared_type("let m: {String: Int | Float} = g"),
        TypeExpr::Map {
            key: Box::new(named("String")),
            value: Box::new(TypeExpr::Union(vec![named("Int"), named("Float")])),
        }
    );
    assert_eq!(
        declared_type("let u: Int | Float | Char = g"),
        TypeExpr::Union(vec![named("Int"), named("Float"), named("Char")])
    );
    assert_eq!(
        declared_type("let u: A | B & C = g"),
        TypeExpr::Union(vec![
            named("A"),
            TypeExpr::Intersection(vec![named("B"), named("C")])
        ])
    );
    assert_eq!(
        declared_type("let c: Map<String, Int> = g"),
        TypeExpr::Applied {
            base: "Map".to_string(),
            args: vec![named("String"), named("Int")],
        }
    );
    assert_eq!(declared_type("let g: (Int) = g"), named("Int"));
}

#[test]
fn if_else_chain_spans_lines() {
    let expr = expression("if a {\n  1\n}\nelse if b {\n  2\n} else {\n  3\n}");
    let Expr::If {
        else_branch: Some(else_branch),
        ..
    } = expr
    else {
        panic!("expected if with else");
    };
    assert_eq!(else_branch.stmts.len(), 1);
    assert!(matches!(
        &else_branch.stmts[0].kind,
        StmtKind::Expression(Expr::If {
            else_branch: Some(_),
            ..
        })
    ));
}

#[test]
fn if_without_else_leaves_following_statement_alone() {
    let statements = parse_ok("if a { 1 }\nb");
    assert_eq!(statements.len(), 2);
}

#[test]
fn statement_forms() {
    let source = r#"
        struct Point {
            x: Int
            mut y: Int = 0
        }
        type Number = Int | Float
        <T: Number> let twice = (v: T) -> v + v
        extend Point as p {
            let norm = () -> p.x + p.y
        }
        namespace geo.shapes {
            let unit = 1
        }
        while false { }
        return
    "#;
    let statements = parse_ok(source);
    assert_eq!(statements.len(), 7);
    match &statements[0].kind {
        StmtKind::Struct { name, fields } => {
            assert_eq!(name, "Point");
            assert_eq!(fields.len(), 2);
            assert!(fields[1].mutable);
            assert_eq!(fields[1].default, Some(Expr::Int(0)));
        }
        other => panic!("expected struct, got {other:?}"),
    }
    assert!(matches!(&statements[1].kind, StmtKind::TypeAlias { name, .. } if name == "Number"));
    match &statements[2].kind {
        StmtKind::Generic { contracts, body } => {
            assert_eq!(contracts.len(), 1);
            assert_eq!(contracts[0].bound, Some(named("Number")));
            assert!(matches!(body.kind, StmtKind::Let { .. }));
        }
        other => panic!("expected generic statement, got {other:?}"),
    }
    assert!(matches!(
        &statements[3].kind,
        StmtKind::Extend { alias: Some(alias), .. } if alias == "p"
    ));
    match &statements[4].kind {
        StmtKind::Namespace { path, body } => {
            assert_eq!(path, &vec!["geo".to_string(), "shapes".to_string()]);
            assert_eq!(body.stmts.len(), 1);
        }
        other => panic!("expected namespace, got {other:?}"),
    }
    assert!(matches!(&statements[5].kind, StmtKind::While { .. }));
    assert!(matches!(&statements[6].kind, StmtKind::Return(None)));
}

#[test]
fn collection_and_map_literals_span_lines() {
    let expr = expression("[\n  1,\n  2\n]");
    assert_eq!(expr, Expr::Collection(vec![Expr::Int(1), Expr::Int(2)]));
    let value = let_value("let m = {\n  \"a\": 1,\n  \"b\": 2\n}");
    assert_eq!(
        value,
        Expr::Map(vec![
            (Expr::Str("a".to_string()), Expr::Int(1)),
            (Expr::Str("b".to_string()), Expr::Int(2)),
        ])
    );
}

#[test]
fn statement_positions_point_at_first_token() {
    let statements = parse_ok("let a = 1\n\n  a");
    assert_eq!(statements[0].position, interp::Position::new(1, 1));
    assert_eq!(statements[1].position, interp::Position::new(3, 3));
}
