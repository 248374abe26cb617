// ABOUTME: Top-level driver wiring scanner, parser, resolver, and interpreter together

use crate::env::Environment;
use crate::error::StaticError;
use crate::expr::{Expr, LiteralValue};
use crate::interpreter::{Interpreter, Output};
use crate::native::Clock;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::stmt::Stmt;
use crate::value::{Callable, Native, Value};
use std::fs;
use std::path::Path;
use std::rc::Rc;

/// Owns the global environment and the error-sink flags that drive the CLI's
/// exit code. One `Lox` instance is reused across every line a REPL session
/// evaluates, so top-level `var` declarations persist between inputs.
pub struct Lox {
    globals: Rc<Environment>,
    output: Output,
    had_error: bool,
    had_runtime_error: bool,
}

impl Lox {
    pub fn new(output: Output) -> Self {
        let globals = Environment::new();
        globals.define("clock".to_string(), Value::Callable(Callable::Native(Rc::new(Clock))));
        Lox {
            globals,
            output,
            had_error: false,
            had_runtime_error: false,
        }
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    pub fn reset(&mut self) {
        self.had_error = false;
        self.had_runtime_error = false;
    }

    pub fn define_global(&self, name: &str, native: impl Native + 'static) {
        self.globals
            .define(name.to_string(), Value::Callable(Callable::Native(Rc::new(native))));
    }

    /// Scans, parses, resolves, and (if no static errors turned up)
    /// interprets `source`. Static errors print to stderr and set
    /// `had_error`; a runtime fault prints and sets `had_runtime_error`.
    /// Interpretation is skipped entirely when any static pass reported
    /// an error, matching the rest of this pipeline's fail-soft-and-report
    /// discipline: a program that doesn't resolve cleanly never runs.
    pub fn run_source(&mut self, source: &str) {
        let (tokens, scan_errors) = Scanner::new(source).scan_tokens();
        let (statements, parse_errors) = Parser::new(tokens).parse();
        self.run_statements(statements, scan_errors, parse_errors, false);
    }

    /// Like `run_source`, but a trailing bare expression statement (e.g. the
    /// REPL line `1 + 2;`) additionally has its value echoed, matching the
    /// interactive convention a script run never exhibits.
    pub fn run_repl_line(&mut self, line: &str) {
        let (tokens, scan_errors) = Scanner::new(line).scan_tokens();
        let (statements, parse_errors) = Parser::new(tokens).parse();
        self.run_statements(statements, scan_errors, parse_errors, true);
    }

    fn run_statements(
        &mut self,
        mut statements: Vec<Stmt>,
        scan_errors: Vec<StaticError>,
        parse_errors: Vec<StaticError>,
        echo_trailing_expression: bool,
    ) {
        if echo_trailing_expression && parse_errors.is_empty() {
            if let Some(last @ Stmt::Expression(_)) = statements.last_mut() {
                let placeholder = Stmt::Expression(Expr::Literal { value: LiteralValue::Nil });
                if let Stmt::Expression(expr) = std::mem::replace(last, placeholder) {
                    *last = Stmt::Print(expr);
                }
            }
        }

        let (locals, resolve_errors) = Resolver::new().resolve(&statements);

        let mut had_static_error = false;
        for error in scan_errors.iter().chain(parse_errors.iter()).chain(resolve_errors.iter()) {
            eprintln!("{error}");
            had_static_error = true;
        }
        if had_static_error {
            self.had_error = true;
            return;
        }

        let mut interpreter = Interpreter::new(self.globals.clone(), locals, self.output.clone());
        if let Err(error) = interpreter.interpret(&statements) {
            eprintln!("{error}");
            self.had_runtime_error = true;
        }
    }

    /// Runs a whole file and returns the process exit code: 0 clean, 65 on a
    /// scan/parse/resolve error, 70 on a runtime error. A file that can't be
    /// read at all returns 74 (EX_IOERR), the standard sysexits code for an
    /// I/O failure, continuing the same convention as 65/70.
    pub fn run_file(&mut self, path: &Path) -> i32 {
        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Could not read file '{}': {e}", path.display());
                return 74;
            }
        };
        self.run_source(&source);
        if self.had_error {
            65
        } else if self.had_runtime_error {
            70
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn lox_with_buffer() -> (Lox, Rc<RefCell<Vec<u8>>>) {
        let buffer = Rc::new(RefCell::new(Vec::new()));
        let output: Output = buffer.clone();
        (Lox::new(output), buffer)
    }

    #[test]
    fn run_source_prints_and_clears_no_errors() {
        let (mut lox, buffer) = lox_with_buffer();
        lox.run_source("print 1 + 1;");
        assert!(!lox.had_error());
        assert!(!lox.had_runtime_error());
        assert_eq!(String::from_utf8_lossy(&buffer.borrow()).into_owned(), "2\n");
    }

    #[test]
    fn parse_error_sets_had_error() {
        let (mut lox, _) = lox_with_buffer();
        lox.run_source("var = 1;");
        assert!(lox.had_error());
    }

    #[test]
    fn runtime_error_sets_had_runtime_error() {
        let (mut lox, _) = lox_with_buffer();
        lox.run_source("print 1 / 0;");
        assert!(!lox.had_error());
        assert!(lox.had_runtime_error());
    }

    #[test]
    fn globals_persist_across_repeated_run_source_calls() {
        let (mut lox, buffer) = lox_with_buffer();
        lox.run_source("var x = 1;");
        lox.run_source("x = x + 1; print x;");
        assert!(!lox.had_error());
        assert_eq!(String::from_utf8_lossy(&buffer.borrow()).into_owned(), "2\n");
    }

    #[test]
    fn clock_is_registered_as_a_global() {
        let (mut lox, buffer) = lox_with_buffer();
        lox.run_source("print clock() > 0;");
        assert!(!lox.had_error());
        assert_eq!(String::from_utf8_lossy(&buffer.borrow()).into_owned(), "true\n");
    }

    #[test]
    fn repl_line_echoes_a_trailing_bare_expression() {
        let (mut lox, buffer) = lox_with_buffer();
        lox.run_repl_line("1 + 2;");
        assert!(!lox.had_error());
        assert_eq!(String::from_utf8_lossy(&buffer.borrow()).into_owned(), "3\n");
    }

    #[test]
    fn run_source_does_not_echo_a_bare_expression() {
        let (mut lox, buffer) = lox_with_buffer();
        lox.run_source("1 + 2;");
        assert!(!lox.had_error());
        assert!(buffer.borrow().is_empty());
    }

    #[test]
    fn reset_clears_error_flags() {
        let (mut lox, _) = lox_with_buffer();
        lox.run_source("print 1 / 0;");
        assert!(lox.had_runtime_error());
        lox.reset();
        assert!(!lox.had_runtime_error());
    }
}
