use std::fs;
use std::path::Path;

use numfu::{
    diagnostics::{ErrorKind, NumFuError},
    runtime::Interpreter,
};
use tempfile::tempdir;

fn interpreter() -> Interpreter {
    let mut interpreter = Interpreter::new().expect("interpreter should boot");
    interpreter.set_print_directly(false);
    interpreter
}

fn run_file(path: &Path) -> Vec<String> {
    interpreter()
        .run_file(path)
        .expect("evaluation should succeed")
}

fn fail_file(path: &Path) -> ErrorKind {
    match interpreter().run_file(path) {
        Ok(output) => panic!("expected error, evaluated to {output:?}"),
        Err(NumFuError::Diagnostic(diag)) => diag.kind,
        Err(other) => panic!("expected diagnostic, got {other}"),
    }
}

#[test]
fn named_import_resolves_sibling_file() {
    let dir = tempdir().expect("create temp dir");
    fs::write(
        dir.path().join("mathutil.nfu"),
        "{double: x -> x * 2}\nexport double\n",
    )
    .expect("write module");
    let main = dir.path().join("main.nfu");
    fs::write(&main, "import double from \"mathutil\"\ndouble(21)\n").expect("write main");

    assert_eq!(run_file(&main).concat(), "42\n");
}

#[test]
fn star_import_brings_every_export() {
    let dir = tempdir().expect("create temp dir");
    fs::write(
        dir.path().join("shapes.nfu"),
        "let area = {w, h -> w * h}\nlet unit = 1\nexport area, unit\n",
    )
    .expect("write module");
    let main = dir.path().join("main.nfu");
    fs::write(&main, "import * from \"shapes\"\narea(3, 4) + unit\n").expect("write main");

    assert_eq!(run_file(&main).concat(), "13\n");
}

#[test]
fn module_import_uses_prefixed_names() {
    let dir = tempdir().expect("create temp dir");
    fs::write(dir.path().join("geo.nfu"), "export tau = 2 * pi\n").expect("write module");
    let main = dir.path().join("main.nfu");
    fs::write(&main, "import \"geo\"\ngeo.tau > 6\n").expect("write main");

    assert_eq!(run_file(&main).concat(), "true\n");
}

#[test]
fn directory_index_resolution() {
    let dir = tempdir().expect("create temp dir");
    fs::create_dir(dir.path().join("util")).expect("create module dir");
    fs::write(
        dir.path().join("util/index.nfu"),
        "export answer = 42\n",
    )
    .expect("write index module");
    let main = dir.path().join("main.nfu");
    fs::write(&main, "import answer from \"util\"\nanswer\n").expect("write main");

    assert_eq!(run_file(&main).concat(), "42\n");
}

#[test]
fn relative_paths_resolve_from_importer() {
    let dir = tempdir().expect("create temp dir");
    fs::create_dir(dir.path().join("nested")).expect("create nested dir");
    fs::write(dir.path().join("base.nfu"), "export base = 7\n").expect("write base");
    fs::write(
        dir.path().join("nested/mid.nfu"),
        "import base from \"../base\"\nexport mid = base + 1\n",
    )
    .expect("write mid");
    let main = dir.path().join("main.nfu");
    fs::write(&main, "import mid from \"./nested/mid\"\nmid\n").expect("write main");

    assert_eq!(run_file(&main).concat(), "8\n");
}

#[test]
fn reexport_chains_pass_values_through() {
    let dir = tempdir().expect("create temp dir");
    fs::write(dir.path().join("inner.nfu"), "export secret = 99\n").expect("write inner");
    fs::write(
        dir.path().join("outer.nfu"),
        "import secret from \"inner\"\nexport secret\n",
    )
    .expect("write outer");
    let main = dir.path().join("main.nfu");
    fs::write(&main, "import secret from \"outer\"\nsecret\n").expect("write main");

    assert_eq!(run_file(&main).concat(), "99\n");
}

#[test]
fn module_top_level_runs_once() {
    let dir = tempdir().expect("create temp dir");
    fs::write(
        dir.path().join("loud.nfu"),
        "println(\"loaded\")\nexport marker = 1\n",
    )
    .expect("write module");
    let main = dir.path().join("main.nfu");
    fs::write(
        &main,
        "import marker from \"loud\"\nimport marker from \"loud\"\nmarker\n",
    )
    .expect("write main");

    let output = run_file(&main).concat();
    // imported modules do not print their own top-level results, and the
    // second import comes from the cache
    assert_eq!(output.matches("loaded").count(), 1);
    assert!(output.ends_with("1\n"));
}

#[test]
fn missing_module_is_an_import_error() {
    let dir = tempdir().expect("create temp dir");
    let main = dir.path().join("main.nfu");
    fs::write(&main, "import x from \"nowhere\"\n").expect("write main");
    assert_eq!(fail_file(&main), ErrorKind::Import);
}

#[test]
fn missing_export_is_an_import_error() {
    let dir = tempdir().expect("create temp dir");
    fs::write(dir.path().join("small.nfu"), "export a = 1\n").expect("write module");
    let main = dir.path().join("main.nfu");
    fs::write(&main, "import b from \"small\"\n").expect("write main");
    assert_eq!(fail_file(&main), ErrorKind::Import);
}

#[test]
fn cyclic_import_is_detected() {
    let dir = tempdir().expect("create temp dir");
    fs::write(
        dir.path().join("a.nfu"),
        "import b_value from \"b\"\nexport a_value = 1\n",
    )
    .expect("write a");
    fs::write(
        dir.path().join("b.nfu"),
        "import a_value from \"a\"\nexport b_value = 2\n",
    )
    .expect("write b");
    let main = dir.path().join("a.nfu");
    assert_eq!(fail_file(&main), ErrorKind::Import);
}

#[test]
fn invalid_module_name_is_rejected() {
    let dir = tempdir().expect("create temp dir");
    let main = dir.path().join("main.nfu");
    fs::write(&main, "import x from \"sp ace\"\n").expect("write main");
    assert_eq!(fail_file(&main), ErrorKind::Import);

    fs::write(&main, "import x from \"a//b\"\n").expect("write main");
    assert_eq!(fail_file(&main), ErrorKind::Import);
}

#[test]
fn export_of_undeclared_name_fails() {
    let dir = tempdir().expect("create temp dir");
    fs::write(dir.path().join("bad.nfu"), "export ghost\n").expect("write module");
    let main = dir.path().join("main.nfu");
    fs::write(&main, "import ghost from \"bad\"\n").expect("write main");
    assert_eq!(fail_file(&main), ErrorKind::Name);
}

#[test]
fn stdlib_fallback_resolves_builtins_module() {
    let dir = tempdir().expect("create temp dir");
    let main = dir.path().join("main.nfu");
    fs::write(&main, "import fold from \"builtins\"\nfold({a, b -> a + b}, 0, [1, 2])\n")
        .expect("write main");
    assert_eq!(run_file(&main).concat(), "3\n");
}

#[test]
fn local_module_shadows_stdlib() {
    let dir = tempdir().expect("create temp dir");
    fs::write(dir.path().join("builtins.nfu"), "export fold = 123\n").expect("write shadow");
    let main = dir.path().join("main.nfu");
    fs::write(&main, "import fold from \"builtins\"\nfold\n").expect("write main");
    assert_eq!(run_file(&main).concat(), "123\n");
}
