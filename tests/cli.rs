use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn numfu() -> Command {
    Command::cargo_bin("numfu").expect("binary exists")
}

#[test]
fn runs_quickstart_demo() {
    numfu()
        .arg("demos/quickstart.nfu")
        .assert()
        .success()
        .stdout(predicate::str::contains("1.61797752808989"))
        .stdout(predicate::str::contains("Hello from NumFu"));
}

#[test]
fn demo_scripts_run() {
    for script in ["demos/quickstart.nfu", "demos/lists.nfu", "demos/tailsum.nfu"] {
        numfu().arg(script).assert().success();
    }
}

#[test]
fn eval_prints_result() {
    numfu()
        .arg("eval")
        .arg("{x, y -> x + y}(5)(3)")
        .assert()
        .success()
        .stdout(predicate::str::contains("8"));
}

#[test]
fn precision_flag_changes_rendering() {
    numfu()
        .arg("eval")
        .arg("1/3")
        .arg("--precision")
        .arg("5")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.33333\n"));
}

#[test]
fn runtime_errors_exit_with_one() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("boom.nfu");
    fs::write(&script, "error(\"kaboom\")\n").expect("write script");
    numfu()
        .arg(&script)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("RuntimeError"))
        .stderr(predicate::str::contains("kaboom"));
}

#[test]
fn custom_error_tags_are_reported() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("tagged.nfu");
    fs::write(&script, "error(\"nope\", \"ConfigError\")\n").expect("write script");
    numfu()
        .arg(&script)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ConfigError: nope"));
}

#[test]
fn syntax_errors_exit_with_two() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("bad.nfu");
    fs::write(&script, "let x = \n").expect("write script");
    numfu()
        .arg(&script)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("SyntaxError"));
}

#[test]
fn import_errors_exit_with_two() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("main.nfu");
    fs::write(&script, "import x from \"missing\"\n").expect("write script");
    numfu()
        .arg(&script)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ImportError"))
        .stderr(predicate::str::contains("Cannot find module missing"));
}

#[test]
fn assertion_failures_exit_with_one() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("asserts.nfu");
    fs::write(&script, "2 + 2 ---> $ == 5\n").expect("write script");
    numfu()
        .arg(&script)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("AssertionError"));
}

#[test]
fn parse_reports_statement_count() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("ok.nfu");
    fs::write(&script, "1 + 1\nlet x = 2\n").expect("write script");
    numfu()
        .arg("parse")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 statements"));
}

#[test]
fn ast_roundtrip_runs_identically() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("prog.nfu");
    fs::write(&script, "let f = {n, a -> if n <= 0 then a else f(n - 1, a + n)} in f(100, 0)\n")
        .expect("write script");
    let tree = dir.path().join("prog.nfut");

    numfu()
        .arg("ast")
        .arg(&script)
        .arg("-o")
        .arg(&tree)
        .assert()
        .success();

    numfu()
        .arg(&tree)
        .assert()
        .success()
        .stdout(predicate::str::contains("5050"));
}

#[test]
fn exit_builtin_sets_status() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("quit.nfu");
    fs::write(&script, "exit(3)\n").expect("write script");
    numfu().arg(&script).assert().code(3);
}

#[test]
fn iter_depth_flag_limits_tail_calls() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("deep.nfu");
    fs::write(
        &script,
        "let f = {n, a -> if n <= 0 then a else f(n - 1, a + n)} in f(1000, 0)\n",
    )
    .expect("write script");
    numfu()
        .arg(&script)
        .arg("--iter-depth")
        .arg("10")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("RecursionError"));
}
