// ABOUTME: Configuration and constants for the Lox interpreter
// This module contains version info and the REPL's static welcome banner

pub const VERSION: &str = "1.0.0";
pub const WELCOME_MESSAGE: &str = "Lox Interpreter v1.0";
pub const WELCOME_SUBTITLE: &str = "A tree-walking interpreter for Lox";
pub const WELCOME_FOOTER: &str = "Type Lox statements (ending in ';') to evaluate them. Ctrl-D, 'exit', or 'quit' to leave.";

pub const HISTORY_FILE: &str = ".lox_history";
