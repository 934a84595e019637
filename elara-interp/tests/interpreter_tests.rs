mod common;
use common::*;

fn int(value: i64) -> Value {
    Value::int(value)
}

#[test]
fn arithmetic_and_precedence() {
    assert_eq!(run("1 + 2 * 3 - 4"), int(3));
    assert_eq!(run("(1 + 2) * 3"), int(9));
    assert_eq!(run("7 % 4"), int(3));
    assert_eq!(run("7 / 2"), int(3));
    assert_eq!(run("1.5 * 2"), Value::float(3.0));
    assert_eq!(run("-3 + 1"), int(-2));
    assert_eq!(run("1 < 2 && !(2 < 1)"), Value::boolean(true));
    assert_eq!(run("3 ^ 1"), int(2));
}

#[test]
fn string_concatenation_and_indexing() {
    assert_eq!(run("\"a\" + 1 + true"), Value::string("a1true"));
    assert_eq!(run("\"héllo\".size()"), int(5));
    assert_eq!(run("\"abc\"[1]"), Value::char('b'));
    assert_eq!(run("\"abc\" == \"abc\""), Value::boolean(true));
}

#[test]
fn division_by_zero() {
    assert_eq!(eval_error("1 / 0").kind, EvalErrorKind::DivisionByZero);
    assert_eq!(eval_error("5 % 0").kind, EvalErrorKind::DivisionByZero);
}

#[test]
fn let_and_mutable_assignment() {
    assert_eq!(run("let mut a = 1\na = a + 41\na"), int(42));
    let err = eval_error("let a = 1\na = 2");
    assert_eq!(err.kind, EvalErrorKind::ImmutableAssignment("a".to_string()));
    assert_eq!(err.position.map(|position| position.line), Some(2));
}

#[test]
fn assignment_checks_the_declared_type() {
    let err = eval_error("let mut b = 1\nb = \"s\"");
    assert_eq!(
        err.kind,
        EvalErrorKind::TypeMismatch {
            expected: "Int".to_string(),
            actual: "String".to_string(),
        }
    );
    assert_eq!(
        err.kind.to_string(),
        "type mismatch: expected Int, found String"
    );
    assert_eq!(run("let mut n: Int | Float = 1\nn = 2.5\nn"), Value::float(2.5));
}

#[test]
fn unresolved_variable_carries_its_position() {
    let err = eval_error("let a = 1\n  missing + a");
    assert_eq!(
        err.kind,
        EvalErrorKind::Unresolved {
            category: NameCategory::Variable,
            name: "missing".to_string(),
        }
    );
    assert_eq!(err.position, Some(interp::Position::new(2, 3)));
}

#[test]
fn block_bindings_are_popped_on_exit() {
    assert_eq!(run("let x = 1\n{\n  let x = 2\n}\nx"), int(1));
    assert_eq!(run("let x = 1\n{\n  let x = 2\n  let g = () -> x\n}\nx"), int(1));
    let err = eval_error("{\n  let inner = 1\n}\ninner");
    assert!(matches!(
        err.kind,
        EvalErrorKind::Unresolved { ref name, .. } if name == "inner"
    ));
}

#[test]
fn while_loops_and_if_expressions() {
    let source = "
        let mut i = 0
        let mut total = 0
        while i < 5 {
            total = total + i
            i = i + 1
        }
        total
    ";
    assert_eq!(run(source), int(10));
    assert_eq!(
        run("let v = if 1 > 2 { \"a\" } else if false { \"b\" } else { \"c\" }\nv"),
        Value::string("c")
    );
    assert_eq!(run("if false { 1 }"), Value::unit());
    let err = eval_error("while 1 { }");
    assert!(matches!(err.kind, EvalErrorKind::TypeMismatch { .. }));
}

#[test]
fn recursion_through_the_root_binding() {
    let source = "
        let fact = (n) -> if n <= 1 { 1 } else { n * fact(n - 1) }
        fact(10)
    ";
    assert_eq!(run(source), int(3_628_800));
}

#[test]
fn closures_keep_their_captured_scope() {
    let source = "
        let make = (start) -> {
            let mut count = start
            () -> {
                count = count + 1
                count
            }
        }
        let next = make(10)
        next()
        next()
    ";
    assert_eq!(run(source), int(12));
}

#[test]
fn closures_made_in_a_block_keep_its_bindings() {
    let source = "
        let y = 1
        let mut f = (a: Int) -> a
        {
            let y = 5
            f = (a: Int) -> a + y
        }
        f(1) * 10 + y
    ";
    assert_eq!(run(source), int(61));

    let source = "
        let mut total = 0
        let mut add = (v) -> v
        let mut i = 0
        while i < 3 {
            let step = i
            add = (v) -> v + step
            total = add(total)
            i = i + 1
        }
        total + add(100)
    ";
    assert_eq!(run(source), int(105));
}

#[test]
fn lambdas_take_types_from_the_declaration() {
    let err = eval_error("let f: (Int) -> Int = (a) -> a + 1\nf(\"x\")");
    assert_eq!(
        err.kind,
        EvalErrorKind::TypeMismatch {
            expected: "Int".to_string(),
            actual: "String".to_string(),
        }
    );
    let err = eval_error("let g: (Int) -> String = (a) -> a\ng(1)");
    assert_eq!(
        err.kind,
        EvalErrorKind::TypeMismatch {
            expected: "String".to_string(),
            actual: "Int".to_string(),
        }
    );
    assert_eq!(run("let h: (Int) -> Int = (a) -> a * 2\nh(21)"), int(42));
}

#[test]
fn calls_check_arity_and_callability() {
    assert_eq!(
        eval_error("let f = (a, b) -> a\nf(1)").kind,
        EvalErrorKind::ArityMismatch {
            expected: 2,
            got: 1,
        }
    );
    assert_eq!(
        eval_error("let a = 1\na()").kind,
        EvalErrorKind::NotCallable("Int".to_string())
    );
}

#[test]
fn call_depth_is_bounded() {
    let (mut interpreter, _) =
        interpreter_with_input("", InterpreterConfig::default().with_max_call_depth(16));
    let err = match interpreter.eval_source("let f = (n) -> f(n + 1)\nf(0)") {
        Err(SourceError::Eval(err)) => err,
        other => panic!("expected call depth error, got {other:?}"),
    };
    assert_eq!(err.kind, EvalErrorKind::CallDepthExceeded(16));
    // the interpreter is still usable afterwards
    assert_eq!(
        interpreter.eval_source("f").map(|value| value.is_unit()).ok(),
        Some(false)
    );
}

#[test]
fn structs_with_defaults_and_mutable_fields() {
    let source = "
        struct Point {
            x: Int
            mut y: Int = 0
        }
        let p = Point(1)
        p.y = p.x + 4
        p.y
    ";
    assert_eq!(run(source), int(5));
    assert_eq!(
        run("struct P { x: Int }\nP(3).x"),
        int(3)
    );

    let err = eval_error("struct Point { x: Int }\nlet p = Point(1)\np.x = 2");
    assert_eq!(
        err.kind,
        EvalErrorKind::ImmutableAssignment("p.x".to_string())
    );
    let err = eval_error("struct Point { x: Int }\nPoint(\"a\")");
    assert!(matches!(err.kind, EvalErrorKind::TypeMismatch { .. }));
}

#[test]
fn struct_values_display_their_fields() {
    let value = run("struct Pair { a: Int\n b: String }\nPair(1, \"x\")");
    assert_eq!(value.to_string(), "Pair { a: 1, b: \"x\" }");
}

#[test]
fn self_referential_types_are_rejected() {
    assert_eq!(
        eval_error("type T = [T]").kind,
        EvalErrorKind::RecursiveType("T".to_string())
    );
    assert_eq!(
        eval_error("struct Node { next: Node }").kind,
        EvalErrorKind::RecursiveType("Node".to_string())
    );
    assert_eq!(
        eval_error("<T: [T]> let x = 1").kind,
        EvalErrorKind::RecursiveType("T".to_string())
    );
}

#[test]
fn type_aliases_and_type_checks() {
    let source = "
        type Number = Int | Float
        let n: Number = 2.5
        n is Number
    ";
    assert_eq!(run(source), Value::boolean(true));
    assert_eq!(run("\"a\" is Int | Float"), Value::boolean(false));
    assert!(matches!(
        eval_error("let n: Missing = 1").kind,
        EvalErrorKind::Unresolved {
            category: NameCategory::Type,
            ..
        }
    ));
}

#[test]
fn generic_contracts_bound_parameters() {
    let source = "
        <T: Int | Float> let twice = (v: T) -> v + v
        twice(21)
    ";
    assert_eq!(run(source), int(42));
    let err = eval_error("<T: Int | Float> let twice = (v: T) -> v + v\ntwice(\"a\")");
    assert!(matches!(err.kind, EvalErrorKind::TypeMismatch { ref actual, .. } if actual == "String"));
    // the contract name is gone once the statement finishes
    assert!(matches!(
        eval_error("<T> let id = (v: T) -> v\nlet x: T = 1").kind,
        EvalErrorKind::Unresolved {
            category: NameCategory::Type,
            ..
        }
    ));
}

#[test]
fn collections_and_native_extensions() {
    assert_eq!(run("let xs = [1, 2, 3]\nxs[1]"), int(2));
    assert_eq!(run("[1, 2, 3].append(4).size()"), int(4));
    assert_eq!(run("let xs = [1]\nxs.append(2)\nxs.size()"), int(1));
    assert_eq!(run("empty().size()"), int(0));
    assert_eq!(run("empty().append(\"a\")[0]"), Value::string("a"));
    assert_eq!(
        eval_error("[1, 2][5]").kind,
        EvalErrorKind::IndexOutOfBounds { index: 5, len: 2 }
    );
    assert_eq!(run("let mut ys = [1, 2]\nys[0] = 9\nys[0]"), int(9));
    assert_eq!(
        eval_error("let zs = [1]\nzs[0] = 2").kind,
        EvalErrorKind::ImmutableAssignment("zs".to_string())
    );
}

#[test]
fn collection_literals_take_the_declared_element_type() {
    assert_eq!(
        run("let xs: [Int | Float] = [1, 2.5]\nxs").ty,
        Type::collection(Type::Union(vec![Type::INT, Type::FLOAT]))
    );
    assert_eq!(run("[1, 2]").ty, Type::collection(Type::INT));
    assert_eq!(run("[1, \"a\"]").ty, Type::collection(Type::Any));
    let err = eval_error("let bad: [Int] = [1, \"a\"]");
    assert_eq!(
        err.kind,
        EvalErrorKind::TypeMismatch {
            expected: "[Int]".to_string(),
            actual: "[Any]".to_string(),
        }
    );
}

#[test]
fn maps_keep_the_first_of_duplicate_keys() {
    assert_eq!(run("let m = {\"a\": 1, \"a\": 2}\nm[\"a\"]"), int(1));
    assert_eq!(run("let m = {\"a\": 1}\nm.with(\"a\", 3).get(\"a\")"), int(1));
    assert_eq!(run("let m = {\"a\": 1}\nm.with(\"b\", 3).get(\"b\")"), int(3));
    assert_eq!(run("let m = {\"a\": 1, \"b\": 2}\nm.size()"), int(2));
    assert!(matches!(
        eval_error("let m = {\"a\": 1}\nm.get(\"z\")").kind,
        EvalErrorKind::Unresolved {
            category: NameCategory::Member,
            ..
        }
    ));
    assert_eq!(
        run("let mut m = {\"a\": 1}\nm[\"a\"] = 5\nm[\"a\"]"),
        int(5)
    );
}

#[test]
fn extensions_bind_the_receiver() {
    let source = "
        struct Point { x: Int\n y: Int }
        extend Point as p {
            let sum = () -> p.x + p.y
        }
        Point(2, 3).sum()
    ";
    assert_eq!(run(source), int(5));
    assert_eq!(
        run("extend Int {\n  let double = () -> this * 2\n}\n21.double()"),
        int(42)
    );
    // a method read as a member comes back bound to its receiver
    assert_eq!(
        run("extend Int {\n  let inc = (by) -> this + by\n}\nlet f = 1.inc\nf(2)"),
        int(3)
    );
}

#[test]
fn extension_alias_comes_from_config() {
    let config = InterpreterConfig {
        extension_alias: "me".to_string(),
        ..InterpreterConfig::default()
    };
    let (mut interpreter, _) = interpreter_with_input("", config);
    let value = interpreter
        .eval_source("extend String {\n  let shout = () -> me + \"!\"\n}\n\"hi\".shout()")
        .expect("source should run");
    assert_eq!(value, Value::string("hi!"));
}

#[test]
fn exact_extension_wins_over_accepting_one() {
    let source = "
        extend Any {
            let kind = () -> \"any\"
        }
        extend Int {
            let kind = () -> \"int\"
        }
        1.kind() + \",\" + \"a\".kind()
    ";
    assert_eq!(run(source), Value::string("int,any"));
}

#[test]
fn innermost_extension_wins() {
    let source = "
        extend Int {
            let describe = () -> \"outer\"
        }
        namespace inner {
            extend Int {
                let describe = () -> \"inner\"
            }
            let result = 1.describe()
        }
        inner.result + \" \" + 1.describe()
    ";
    assert_eq!(run(source), Value::string("inner outer"));
}

#[test]
fn extend_bodies_only_hold_declarations() {
    assert!(matches!(
        eval_error("extend Int {\n  1\n}").kind,
        EvalErrorKind::InvalidOperation(_)
    ));
    assert!(matches!(
        eval_error("1.nothing()").kind,
        EvalErrorKind::Unresolved {
            category: NameCategory::Extension,
            ..
        }
    ));
}

#[test]
fn namespaces_resolve_qualified_names() {
    let source = "
        namespace geo.shapes {
            let sides = 4
            let scaled = (v) -> v * sides
        }
        geo.shapes.sides + geo.shapes.scaled(2)
    ";
    assert_eq!(run(source), int(12));
    assert!(matches!(
        eval_error("namespace a {\n  let x = 1\n}\na.y").kind,
        EvalErrorKind::Unresolved { ref name, .. } if name == "a.y"
    ));
}

#[test]
fn stdout_and_input_builtins() {
    assert_eq!(
        run_output("stdout.println(1 + 2)\nstdout.print(\"x\")\nstdout.println([1, \"a\"])"),
        "3\nx[1, \"a\"]\n"
    );

    let (mut interpreter, output) =
        interpreter_with_input("alice\nbob\n", InterpreterConfig::default());
    interpreter
        .eval_source("stdout.println(\"hi \" + input())\nstdout.println(input())")
        .expect("source should run");
    assert_eq!(output.contents(), "hi alice\nbob\n");

    let err = interpreter
        .eval_source("input()")
        .expect_err("input is exhausted");
    assert!(err.is_fatal());
}

#[test]
fn top_level_return_yields_its_value() {
    assert_eq!(run("let a = 3\nreturn a * 2"), int(6));
    assert_eq!(run("return"), Value::unit());
}

#[test]
fn lambda_return_exits_early() {
    let source = "
        let pick = (flag) -> {
            if flag {
                return 1
            }
            2
        }
        pick(true) * 10 + pick(false)
    ";
    assert_eq!(run(source), int(12));
}

#[test]
fn interpreter_state_persists_between_calls() {
    let (mut interpreter, _) = interpreter();
    interpreter.eval_source("let mut total = 1").expect("first");
    interpreter.eval_source("total = total + 1").expect("second");
    assert_eq!(interpreter.value_of("total").expect("bound"), int(2));

    let double = interpreter
        .eval_source("(v) -> v * 2")
        .expect("lambda value");
    assert_eq!(
        interpreter.call_value(&double, vec![int(4)]).expect("call"),
        int(8)
    );
}

#[test]
fn contexts_are_recycled_after_calls() {
    let (mut interpreter, _) = interpreter();
    interpreter
        .eval_source("let f = (n) -> n + 1\nf(1)")
        .expect("warm up");
    let live = interpreter.contexts().live_count();
    interpreter
        .eval_source("f(2)\nf(3)\nf(4)")
        .expect("calls");
    assert_eq!(interpreter.contexts().live_count(), live);
}

/// Runs `repeated` twice after `setup` and checks the second run neither
/// keeps nor allocates context slots.
fn assert_recycled(setup: &str, repeated: &str) {
    let (mut interpreter, _) = interpreter();
    interpreter.eval_source(setup).expect("setup");
    interpreter.eval_source(repeated).expect("first run");
    let live = interpreter.contexts().live_count();
    let free = interpreter.contexts().free_count();
    interpreter.eval_source(repeated).expect("second run");
    assert_eq!(interpreter.contexts().live_count(), live);
    assert_eq!(interpreter.contexts().free_count(), free);
    assert_eq!(interpreter.contexts().retained_count(), 0);
}

#[test]
fn frames_that_pass_lambdas_along_are_recycled() {
    assert_recycled(
        "let apply = (g, v) -> g(v)\nlet f = (n) -> apply((x) -> x + 1, n)",
        "{\n  let mut i = 0\n  while i < 200 {\n    f(i)\n    i = i + 1\n  }\n}",
    );
}

#[test]
fn frames_that_keep_lambdas_locally_are_recycled() {
    assert_recycled(
        "let f = (n) -> {\n  let double = (x) -> x * 2\n  double(n)\n}",
        "{\n  let mut i = 0\n  while i < 200 {\n    f(i)\n    i = i + 1\n  }\n}",
    );
}

#[test]
fn recursive_call_chains_are_recycled() {
    assert_recycled(
        "let sum = (n) -> if n == 0 { 0 } else { n + sum(n - 1) }",
        "sum(100)",
    );
}

#[test]
fn native_calls_in_loops_are_recycled() {
    assert_recycled(
        "let show = (n) -> stdout.println(n)",
        "{\n  let mut i = 0\n  while i < 50 {\n    show(i)\n    stdout.print(\"\")\n    i = i + 1\n  }\n}",
    );
}

#[test]
fn escaped_closure_frees_its_frame_once_dropped() {
    let (mut interpreter, _) = interpreter();
    interpreter
        .eval_source("let make = (start) -> {\n  let mut count = start\n  () -> {\n    count = count + 1\n    count\n  }\n}")
        .expect("setup");
    let live = interpreter.contexts().live_count();

    let value = interpreter
        .eval_source("let mut next = make(1)\nnext()\nnext()")
        .expect("counter");
    assert_eq!(value, int(3));
    assert_eq!(interpreter.contexts().live_count(), live + 1);

    interpreter.eval_source("next = () -> 0").expect("reassign");
    assert_eq!(interpreter.contexts().live_count(), live);
    assert_eq!(interpreter.contexts().retained_count(), 0);
}

#[test]
fn deep_recursion_stops_at_the_default_depth_limit() {
    let source = "let sum = (n) -> if n == 0 { 0 } else { n + sum(n - 1) }";
    assert_eq!(run(&format!("{source}\nsum(200)")), int(20_100));

    let err = eval_error(&format!("{source}\nsum(300)"));
    assert_eq!(err.kind, EvalErrorKind::CallDepthExceeded(256));
    match interp::run_source(&format!("{source}\nsum(300)"), InterpreterConfig::default()) {
        Err(SourceError::Eval(err)) => {
            assert_eq!(err.kind, EvalErrorKind::CallDepthExceeded(256));
        }
        other => panic!("expected call depth error, got {other:?}"),
    }
}
