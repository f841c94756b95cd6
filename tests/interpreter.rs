use std::path::Path;

use numfu::{
    diagnostics::{ErrorKind, NumFuError},
    runtime::Interpreter,
};

fn interpreter() -> Interpreter {
    let mut interpreter = Interpreter::new().expect("interpreter should boot");
    interpreter.set_print_directly(false);
    interpreter
}

fn run(source: &str) -> Vec<String> {
    interpreter()
        .run_source(source, Path::new("."))
        .expect("evaluation should succeed")
}

fn out(source: &str) -> String {
    run(source).concat()
}

fn fail(source: &str) -> ErrorKind {
    let mut interpreter = interpreter();
    match interpreter.run_source(source, Path::new(".")) {
        Ok(output) => panic!("expected error, evaluated to {output:?}"),
        Err(NumFuError::Diagnostic(diag)) => diag.kind,
        Err(other) => panic!("expected diagnostic, got {other}"),
    }
}

#[test]
fn evaluates_basic_arithmetic() {
    assert_eq!(out("2 + 2"), "4\n");
    assert_eq!(out("2 + 3 * 4"), "14\n");
    assert_eq!(out("(2 + 3) * 4"), "20\n");
    assert_eq!(out("7 % 3"), "1\n");
    assert_eq!(out("10 ^ 6"), "1000000\n");
    assert_eq!(out("2 ^ -2"), "0.25\n");
    assert_eq!(out("-2 ^ 2"), "-4\n");
}

#[test]
fn renders_division_at_configured_precision() {
    assert_eq!(out("1 / 3"), "0.333333333333333\n");
    assert_eq!(out("sqrt(2)"), "1.4142135623731\n");
    assert_eq!(out("sqrt(49)"), "7\n");
}

#[test]
fn golden_ratio_scenario() {
    let source = "let g = {d -> let r = {k -> if k <= 0 then 1 else 1 + 1/r(k - 1)} in r(d)} in g(10)";
    assert_eq!(out(source), "1.61797752808989\n");
}

#[test]
fn ieee_edge_cases() {
    assert_eq!(out("1/0"), "inf\n");
    assert_eq!(out("-1/0"), "-inf\n");
    assert_eq!(out("0/0"), "nan\n");
    assert_eq!(out("nan > 42"), "false\n");
    assert_eq!(out("nan == nan"), "false\n");
    assert_eq!(out("nan != nan"), "true\n");
    assert_eq!(out("sqrt(-1)"), "nan\n");
    assert_eq!(out("isnan(0/0)"), "true\n");
    assert_eq!(out("isinf(1/0)"), "true\n");
}

#[test]
fn string_and_list_operators() {
    assert_eq!(out("\"ab\" + \"cd\""), "abcd\n");
    assert_eq!(out("\"ab\" * 3"), "ababab\n");
    assert_eq!(out("3 * \"ab\""), "ababab\n");
    assert_eq!(out("[1, 2] + [3]"), "[1, 2, 3]\n");
    assert_eq!(out("[1, 2] * 2"), "[1, 2, 1, 2]\n");
    assert_eq!(out("[\"a\", 1]"), "[\"a\", 1]\n");
    assert_eq!(fail("\"a\" + 1"), ErrorKind::Type);
    assert_eq!(fail("\"a\" * \"b\""), ErrorKind::Type);
    assert_eq!(fail("\"ab\" * 1.5"), ErrorKind::Type);
}

#[test]
fn currying_and_partial_application() {
    assert_eq!(out("{x, y -> x + y}(5)(3)"), "8\n");
    assert_eq!(out("{x, y -> x + y}(5)"), "{y -> 5 + y}\n");
    assert_eq!(out("{a, b, c -> a + b + c}(1)(2)(3)"), "6\n");
}

#[test]
fn placeholders_reserve_positional_slots() {
    assert_eq!(out("{a, b, c -> a + b + c}(_, 5, _)(10, 20)"), "35\n");
    assert_eq!(out("{a, b, c -> a + b + c}(_, 5, _)"), "{a, c -> a + 5 + c}\n");
    assert_eq!(out("{a, b, c -> [a, b, c]}(_, 2, _)(1, 3)"), "[1, 2, 3]\n");
    // a placeholder argument re-reserves the slot it lands on
    assert_eq!(out("{a, b -> a - b}(_, _)(_, 5)(9)"), "4\n");
}

#[test]
fn operator_sections() {
    assert_eq!(out("_ + 1"), "{x -> x + 1}\n");
    assert_eq!(out("let inc = _ + 1 in inc(41)"), "42\n");
    assert_eq!(out("let half = _ / 2 in half(5)"), "2.5\n");
    assert_eq!(out("let negated = -_ in negated(3)"), "-3\n");
    assert_eq!(out("map([1, 2, 3], _ * 10)"), "[10, 20, 30]\n");
}

#[test]
fn rest_parameters() {
    assert_eq!(out("{a, ...r -> [a] + r}(1, 2, 3)"), "[1, 2, 3]\n");
    assert_eq!(out("{a, ...r -> [a] + r}(1)"), "[1]\n");
    assert_eq!(out("{...r -> length(r)}(1, 2, 3, 4)"), "4\n");
    // placeholders at or past the rest position reserve single slots
    assert_eq!(out("{a, ...r -> [a] + r}(_, 1, 2)(0)"), "[0, 1, 2]\n");
    assert_eq!(out("{a, ...r -> [a] + r}(_, 1)(0, 2, 3)"), "[0, 1, 2, 3]\n");
}

#[test]
fn spread_arguments() {
    assert_eq!(out("{a, b, c -> a + b + c}(...[1, 2, 3])"), "6\n");
    assert_eq!(out("{a, b, c -> a + b + c}(1, ...[2, 3])"), "6\n");
    assert_eq!(out("[0, ...[1, 2], 3]"), "[0, 1, 2, 3]\n");
    assert_eq!(fail("{a, b -> a}(_, ...[1])"), ErrorKind::Type);
    assert_eq!(fail("{a -> a}(...5)"), ErrorKind::Type);
}

#[test]
fn over_application_flows_into_result() {
    assert_eq!(out("{x -> {y -> x + y}}(1, 2)"), "3\n");
    assert_eq!(fail("{x -> x}(1, 2)"), ErrorKind::Type);
}

#[test]
fn chained_comparisons() {
    assert_eq!(out("1 < 2 < 3"), "true\n");
    assert_eq!(out("1 < 2 > 3"), "false\n");
    assert_eq!(out("1 <= 1 <= 1"), "true\n");
    assert_eq!(out("1 < 2 == 2"), "true\n");
    assert_eq!(out("3 > 2 != 5"), "true\n");
    assert_eq!(fail("1 < \"a\""), ErrorKind::Type);
}

#[test]
fn logic_normalizes_to_booleans() {
    assert_eq!(out("1 && 2"), "true\n");
    assert_eq!(out("0 && 2"), "false\n");
    assert_eq!(out("0 || \"\""), "false\n");
    assert_eq!(out("\"x\" || 0"), "true\n");
    assert_eq!(out("!0"), "true\n");
    assert_eq!(out("!nan"), "false\n");
    assert_eq!(out("xor(1, 0)"), "true\n");
    // short-circuit: the right side never runs
    assert_eq!(out("0 && error(\"boom\")"), "false\n");
    assert_eq!(out("1 || error(\"boom\")"), "true\n");
}

#[test]
fn truthiness_in_conditionals() {
    assert_eq!(out("if [] then 1 else 2"), "2\n");
    assert_eq!(out("if \"\" then 1 else 2"), "2\n");
    assert_eq!(out("if 0 then 1 else 2"), "2\n");
    assert_eq!(out("if nan then 1 else 2"), "1\n");
    assert_eq!(out("if [0] then 1 else 2"), "1\n");
}

#[test]
fn let_bindings_do_not_see_each_other() {
    assert_eq!(out("let x = 1 in let x = x + 1, y = x + 10 in [x, y]"), "[2, 11]\n");
}

#[test]
fn let_closures_can_recurse() {
    assert_eq!(
        out("let f = {n, a -> if n <= 0 then a else f(n - 1, a + n)} in f(10, 0)"),
        "55\n"
    );
}

#[test]
fn tail_recursive_sum_terminates() {
    assert_eq!(
        out("let f = {n, a -> if n <= 0 then a else f(n - 1, a + n)} in f(100000, 0)"),
        "5000050000\n"
    );
}

#[test]
fn named_lambdas_recurse_and_bind() {
    assert_eq!(out("{fact: n -> if n <= 1 then 1 else n * fact(n - 1)}(10)"), "3628800\n");
    assert_eq!(out("{double: x -> x * 2}\ndouble(21)"), "42\n");
}

#[test]
fn iteration_limit_is_enforced() {
    let mut interpreter = interpreter();
    interpreter.set_iter_depth(Some(10));
    let err = interpreter
        .run_source(
            "let f = {n, a -> if n <= 0 then a else f(n - 1, a + n)} in f(100, 0)",
            Path::new("."),
        )
        .expect_err("iteration limit should trip");
    match err {
        NumFuError::Diagnostic(diag) => {
            assert_eq!(diag.kind, ErrorKind::Recursion);
            assert!(diag.message.contains("tail-call"), "{}", diag.message);
        }
        other => panic!("expected diagnostic, got {other}"),
    }
}

#[test]
fn recursion_limit_is_enforced() {
    let mut interpreter = interpreter();
    interpreter.set_rec_depth(50);
    let err = interpreter
        .run_source(
            "let g = {n -> if n <= 0 then 0 else 1 + g(n - 1)} in g(1000)",
            Path::new("."),
        )
        .expect_err("recursion limit should trip");
    match err {
        NumFuError::Diagnostic(diag) => {
            assert_eq!(diag.kind, ErrorKind::Recursion);
            assert!(diag.message.contains("recursion depth"), "{}", diag.message);
        }
        other => panic!("expected diagnostic, got {other}"),
    }
}

#[test]
fn assertion_sugar() {
    assert_eq!(out("2 + 2 ---> $ == 4"), "");
    assert_eq!(fail("2 + 2 ---> $ == 5"), ErrorKind::Assertion);
    assert_eq!(out("[1, 2] ---> length($) == 2"), "");
    assert_eq!(fail("1 ---> $"), ErrorKind::Assertion);
}

#[test]
fn assert_builtin() {
    assert_eq!(out("assert(1 < 2)"), "true\n");
    assert_eq!(fail("assert(1 > 2)"), ErrorKind::Assertion);
}

#[test]
fn indexing() {
    assert_eq!(out("[1, 2, 3][0]"), "1\n");
    assert_eq!(out("[1, 2, 3][-1]"), "3\n");
    assert_eq!(out("\"hello\"[1]"), "e\n");
    assert_eq!(out("\"hello\"[-1]"), "o\n");
    assert_eq!(fail("[1, 2][5]"), ErrorKind::Index);
    assert_eq!(fail("\"ab\"[-3]"), ErrorKind::Index);
    assert_eq!(fail("[1][0.5]"), ErrorKind::Type);
    assert_eq!(fail("5[0]"), ErrorKind::Type);
}

#[test]
fn indexing_does_not_cross_lines() {
    assert_eq!(out("let xs = [1, 2]\nxs\n[3]"), "[1, 2]\n[3]\n");
}

#[test]
fn slicing_is_end_inclusive() {
    assert_eq!(out("slice(\"hello\", 1, -1)"), "ello\n");
    assert_eq!(out("slice([1, 2, 3, 4], 1, 2)"), "[2, 3]\n");
    assert_eq!(out("slice([1, 2, 3, 4], 1, -2)"), "[2, 3]\n");
    assert_eq!(out("slice([1, 2], 1, 0)"), "[]\n");
    assert_eq!(out("slice([1, 2, 3], 0, 10)"), "[1, 2, 3]\n");
}

#[test]
fn list_builtins() {
    assert_eq!(out("length([1, 2, 3])"), "3\n");
    assert_eq!(out("length(\"hello\")"), "5\n");
    assert_eq!(out("append([1, 2], 3)"), "[1, 2, 3]\n");
    assert_eq!(out("contains([1, 2], 2)"), "true\n");
    assert_eq!(out("contains(\"hello\", \"ell\")"), "true\n");
    assert_eq!(out("reverse([1, 2, 3])"), "[3, 2, 1]\n");
    assert_eq!(out("reverse(\"abc\")"), "cba\n");
    assert_eq!(out("reverse(reverse([1, \"a\", [2]])) == [1, \"a\", [2]]"), "true\n");
    assert_eq!(out("sort([3, 1, 2])"), "[1, 2, 3]\n");
    assert_eq!(out("sort([\"b\", \"a\"])"), "[\"a\", \"b\"]\n");
    assert_eq!(out("sort(\"cba\")"), "abc\n");
    assert_eq!(fail("sort([1, \"a\"])"), ErrorKind::Type);
    assert_eq!(out("set([1, 2, 3], 1, 9)"), "[1, 9, 3]\n");
    assert_eq!(out("set(\"abc\", 1, \"X\")"), "aXc\n");
    assert_eq!(fail("set(\"abc\", 1, 5)"), ErrorKind::Value);
    assert_eq!(out("range(1, 5)"), "[1, 2, 3, 4]\n");
    assert_eq!(out("range(3, 3)"), "[]\n");
}

#[test]
fn map_and_filter() {
    assert_eq!(out("map([1, 2, 3], {x -> x * x})"), "[1, 4, 9]\n");
    assert_eq!(out("filter([1, 2, 3, 4], {x -> x % 2 == 0})"), "[2, 4]\n");
    assert_eq!(out("length(map([1, 2, 3], {x -> x * 2})) == 3"), "true\n");
    assert_eq!(fail("map(5, {x -> x})"), ErrorKind::Type);
}

#[test]
fn string_builtins() {
    assert_eq!(out("join([\"a\", \"b\", \"c\"], \"-\")"), "a-b-c\n");
    assert_eq!(out("split(\"a,b,c\", \",\")"), "[\"a\", \"b\", \"c\"]\n");
    assert_eq!(out("split(\"a b  c\", \"\")"), "[\"a\", \"b\", \"c\"]\n");
    assert_eq!(out("trim(\"  hi  \")"), "hi\n");
    assert_eq!(out("toUpperCase(\"abc\")"), "ABC\n");
    assert_eq!(out("toLowerCase(\"ABC\")"), "abc\n");
    assert_eq!(out("replace(\"aaa\", \"a\", \"b\")"), "bbb\n");
    assert_eq!(out("count(\"banana\", \"an\")"), "2\n");
    assert_eq!(out("format(\"{} + {} = {}\", 1, 2, 3)"), "1 + 2 = 3\n");
    assert_eq!(fail("format(\"{} {}\", 1)"), ErrorKind::Index);
    assert_eq!(fail("format(\"{}\", 1, 2)"), ErrorKind::Index);
}

#[test]
fn math_builtins() {
    assert_eq!(out("abs(-3)"), "3\n");
    assert_eq!(out("floor(2.7)"), "2\n");
    assert_eq!(out("ceil(2.1)"), "3\n");
    assert_eq!(out("round(2.5)"), "2\n");
    assert_eq!(out("round(3.14159, 2)"), "3.14\n");
    assert_eq!(out("sign(-9)"), "-1\n");
    assert_eq!(out("min(3, 1, 2)"), "1\n");
    assert_eq!(out("max([3, 1, 2])"), "3\n");
    assert_eq!(out("sum([1, 2, 3, 4])"), "10\n");
}

#[test]
fn conversions() {
    assert_eq!(out("Number(\"42\")"), "42\n");
    assert_eq!(out("Number(\"--42\")"), "42\n");
    assert_eq!(out("Number(\"-+-+42\")"), "42\n");
    assert_eq!(out("Number(\"---42\")"), "-42\n");
    assert_eq!(out("Number(true)"), "1\n");
    assert_eq!(fail("Number(\"zz\")"), ErrorKind::Value);
    assert_eq!(out("String(5)"), "5\n");
    assert_eq!(out("String([1, \"a\"])"), "[1, \"a\"]\n");
    assert_eq!(out("Bool(0)"), "false\n");
    assert_eq!(out("Bool([1])"), "true\n");
    assert_eq!(out("List(\"abc\")"), "[\"a\", \"b\", \"c\"]\n");
    assert_eq!(fail("List(5)"), ErrorKind::Type);
}

#[test]
fn equality_is_structural() {
    assert_eq!(out("[1, [2, \"x\"]] == [1, [2, \"x\"]]"), "true\n");
    assert_eq!(out("1 == \"1\""), "false\n");
    assert_eq!(out("[] == \"\""), "false\n");
    assert_eq!(out("let f = {x -> x} in f == f"), "true\n");
    assert_eq!(out("{x -> x} == {x -> x}"), "false\n");
}

#[test]
fn composition_and_pipe() {
    assert_eq!(out("5 |> {x -> x + 1}"), "6\n");
    assert_eq!(out("let f = {x -> x + 1} >> {x -> x * 2} in f(3)"), "8\n");
    assert_eq!(out("5 |> {x -> x + 1} >> {x -> x * 2}"), "12\n");
    assert_eq!(out("[1, 2, 3] |> reverse |> {l -> l[0]}"), "3\n");
    assert_eq!(fail("5 |> 6"), ErrorKind::Type);
    assert_eq!(fail("1 >> {x -> x}"), ErrorKind::Type);
}

#[test]
fn top_level_rebinding_and_del() {
    assert_eq!(out("let x = 1\nlet x = x + 1\nx"), "2\n");
    assert_eq!(fail("let x = 1\ndel x\nx"), ErrorKind::Name);
    assert_eq!(fail("del missing"), ErrorKind::Name);
}

#[test]
fn top_level_rebinds_are_visible_to_closures() {
    // closures share the mutable top frame, so later rebinding is observed
    assert_eq!(out("let f = {-> x}\nlet x = 1\nf()"), "1\n");
    assert_eq!(out("let x = 1\nlet f = {-> x}\nlet x = 2\nf()"), "2\n");
}

#[test]
fn prelude_helpers() {
    assert_eq!(out("fold({a, b -> a + b}, 0, [1, 2, 3])"), "6\n");
    assert_eq!(out("any({x -> x > 2}, [1, 2, 3])"), "true\n");
    assert_eq!(out("all({x -> x > 0}, [1, 2, 3])"), "true\n");
    assert_eq!(out("all({x -> x > 1}, [1, 2, 3])"), "false\n");
    assert_eq!(out("take(2, [1, 2, 3])"), "[1, 2]\n");
    assert_eq!(out("drop(2, [1, 2, 3])"), "[3]\n");
    assert_eq!(out("zip([1, 2], [\"a\", \"b\"])"), "[[1, \"a\"], [2, \"b\"]]\n");
    assert_eq!(out("flatten([[1], [2, 3], []])"), "[1, 2, 3]\n");
    assert_eq!(out("identity(9)"), "9\n");
    assert_eq!(out("repeat(\"x\", 3)"), "[\"x\", \"x\", \"x\"]\n");
}

#[test]
fn print_returns_unit() {
    assert_eq!(out("print(5)"), "5");
    assert_eq!(out("println(\"hi\")"), "hi\n");
    assert_eq!(out("println([1, 2])"), "[1, 2]\n");
}

#[test]
fn error_builtin_kinds() {
    assert_eq!(fail("error(\"boom\")"), ErrorKind::Runtime);
    assert_eq!(
        fail("error(\"boom\", \"MyError\")"),
        ErrorKind::Custom("MyError".into())
    );
    assert_eq!(fail("undefinedName"), ErrorKind::Name);
    assert_eq!(fail("5(1)"), ErrorKind::Type);
}

#[test]
fn syntax_errors() {
    assert_eq!(fail("let x = 1, y = 2"), ErrorKind::Syntax);
    assert_eq!(fail("(let x = 1)"), ErrorKind::Syntax);
    assert_eq!(fail("{...a, b -> a}"), ErrorKind::Syntax);
    assert_eq!(fail("{a, a -> a}"), ErrorKind::Syntax);
    assert_eq!(fail("f(..._)"), ErrorKind::Syntax);
    assert_eq!(fail("$ == 1"), ErrorKind::Syntax);
    assert_eq!(fail("1 +"), ErrorKind::Syntax);
}

#[test]
fn closure_reconstruction_inlines_captures() {
    assert_eq!(out("let a = 5 in {x -> x + a}"), "{x -> x + 5}\n");
    assert_eq!(out("{f, x -> f(x)}({y -> y}, _)"), "{x -> {y -> y}(x)}\n");
    assert_eq!(out("{x -> x < 5}"), "{x -> x < 5}\n");
    assert_eq!(out("_ < 5"), "{x -> x < 5}\n");
    assert_eq!(out("{x, y -> x * (y + 1)}(2)"), "{y -> 2 * (y + 1)}\n");
}

#[test]
fn repl_frame_persists_across_runs() {
    let mut interpreter = interpreter();
    interpreter
        .run_source("let x = 40", Path::new("."))
        .expect("bind x");
    let output = interpreter
        .run_source("x + 2", Path::new("."))
        .expect("use x");
    assert_eq!(output.concat(), "42\n");
}
