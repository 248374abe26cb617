// ABOUTME: Error types for the scan/parse/resolve/runtime error taxa

use thiserror::Error;

/// A scan-time or parse-time/resolve-time diagnostic. None of these abort
/// the pass that produced them; each is recorded and reported, and
/// interpretation is skipped only if any were recorded at all.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("[line {line}] Error{}: {message}", at_suffix(.lexeme))]
pub struct StaticError {
    pub line: usize,
    pub lexeme: Option<String>,
    pub message: String,
}

fn at_suffix(lexeme: &Option<String>) -> String {
    match lexeme {
        Some(l) if l.is_empty() => " at end".to_string(),
        Some(l) => format!(" at '{l}'"),
        None => String::new(),
    }
}

impl StaticError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        StaticError {
            line,
            lexeme: None,
            message: message.into(),
        }
    }

    pub fn at(line: usize, lexeme: impl Into<String>, message: impl Into<String>) -> Self {
        StaticError {
            line,
            lexeme: Some(lexeme.into()),
            message: message.into(),
        }
    }
}

/// A runtime fault: type mismatch, undefined variable, divide by zero,
/// non-callable call, arity mismatch, bad property access.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}\n[line {line}]")]
pub struct RuntimeError {
    pub line: usize,
    pub message: String,
}

impl RuntimeError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        RuntimeError {
            line,
            message: message.into(),
        }
    }

    pub fn undefined_variable(line: usize, name: &str) -> Self {
        RuntimeError::new(line, format!("Undefined variable '{name}'."))
    }
}
