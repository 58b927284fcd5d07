//! End-to-end tests of the `isel` binary.

use std::io::Write;
use std::process::{Command, Output};

use tempfile::NamedTempFile;

const RULES: &str = r#"{
    "kinds": [
        { "name": "Param" },
        { "name": "Const", "free": true },
        { "name": "Add", "arity": 2, "commutative": true },
        { "name": "Mul", "arity": 2 }
    ],
    "rules": [
        { "action": "FMA_LOWER", "patterns": ["(Mul (Add a b) Const=c)"] },
        { "action": "ADD", "patterns": ["(Add a b)"] }
    ]
}"#;

const GRAPH: &str = r#"
^b0:
  %x = Param
  %y = Param
  %sum = Add %x, %y
  %two = Const #2
  %prod = Mul %sum, %two
"#;

fn temp_with(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(suffix).expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write temp file");
    file
}

fn isel(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_isel"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run isel")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "isel failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn parse_prints_canonical_form() {
    let out = isel(&["parse", "(  Mul (Add a b)\tConst = c )"]);
    assert_eq!(stdout(&out), "(Mul (Add a b) Const=c)\nspecificity: 3\n");
}

#[test]
fn parse_error_points_at_token() {
    let out = isel(&["parse", "(Add a"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("at offset 6"), "{stderr}");
}

#[test]
fn check_lists_ranked_rules() {
    let rules = temp_with(".json", RULES);
    let out = isel(&["check", rules.path().to_str().unwrap()]);
    assert_eq!(
        stdout(&out),
        "Add:\n  0. ADD (Add a b) (specificity 1)\n\
         Mul:\n  0. FMA_LOWER (Mul (Add a b) Const=c) (specificity 3)\n\
         2 rules, 4 registered kinds (closed)\n"
    );
}

#[test]
fn check_marks_kinds_outside_an_open_registry() {
    let rules = temp_with(
        ".json",
        r#"{
            "open_kinds": true,
            "kinds": [{ "name": "Const", "free": true }],
            "rules": [{ "action": "NEG", "patterns": ["(Neg a)"] }]
        }"#,
    );
    let out = isel(&["check", rules.path().to_str().unwrap()]);
    assert_eq!(
        stdout(&out),
        "Neg (unregistered):\n  0. NEG (Neg a) (specificity 1)\n\
         1 rules, 1 registered kinds (open)\n"
    );
}

#[test]
fn select_fuses_multiply_add() {
    let rules = temp_with(".json", RULES);
    let graph = temp_with(".isel", GRAPH);
    let out = isel(&[
        "select",
        rules.path().to_str().unwrap(),
        graph.path().to_str().unwrap(),
    ]);
    assert_eq!(
        stdout(&out),
        "^b0:\n\
         \x20 %x standalone\n\
         \x20 %y standalone\n\
         \x20 %prod => FMA_LOWER {a=%x, b=%y, c=%two} [%sum, %two]\n\
         fused 1, absorbed 1, standalone 2, conflicts 0, attempts 3\n"
    );
}

#[test]
fn bad_rule_table_exits_non_zero() {
    let rules = temp_with(
        ".json",
        r#"{ "rules": [{ "action": "BAD", "patterns": ["(Add x"] }] }"#,
    );
    let out = isel(&["check", rules.path().to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("rule BAD"), "{stderr}");
}
