// ABOUTME: Exercises Lox::run_file against real temp files, asserting the 0/65/70 exit-code contract

use lox_interpreter::interpreter::stdout_sink;
use lox_interpreter::lox::Lox;
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

fn script_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create temp file");
    write!(file, "{contents}").expect("failed to write temp file");
    file
}

#[test]
fn run_file_executes_a_real_script_and_returns_zero() {
    let source = fs::read_to_string("tests/fixtures/closures_and_classes.lox")
        .expect("fixture script should exist");
    let file = script_file(&source);

    let mut lox = Lox::new(stdout_sink());
    let code = lox.run_file(file.path());

    assert_eq!(code, 0);
    assert!(!lox.had_error());
    assert!(!lox.had_runtime_error());
}

#[test]
fn run_file_returns_65_on_a_parse_error() {
    let file = script_file("var = 1;");

    let mut lox = Lox::new(stdout_sink());
    let code = lox.run_file(file.path());

    assert_eq!(code, 65);
    assert!(lox.had_error());
}

#[test]
fn run_file_returns_70_on_a_runtime_error() {
    let file = script_file("print 1 / 0;");

    let mut lox = Lox::new(stdout_sink());
    let code = lox.run_file(file.path());

    assert_eq!(code, 70);
    assert!(lox.had_runtime_error());
}

#[test]
fn run_file_returns_74_when_the_file_cannot_be_read() {
    let mut lox = Lox::new(stdout_sink());
    let code = lox.run_file(std::path::Path::new("/nonexistent/path/to/script.lox"));
    assert_eq!(code, 74);
}
