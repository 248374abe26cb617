// ABOUTME: CLI entry point: runs a script file, or starts an interactive REPL

mod config;
mod env;
mod error;
mod expr;
mod highlighter;
mod interpreter;
mod lox;
mod native;
mod parser;
mod resolver;
mod scanner;
mod stmt;
mod token;
mod value;

use clap::Parser as ClapParser;
use config::{HISTORY_FILE, WELCOME_FOOTER, WELCOME_MESSAGE, WELCOME_SUBTITLE};
use highlighter::LoxHelper;
use interpreter::stdout_sink;
use log::{debug, info};
use lox::Lox;
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};
use std::path::PathBuf;

/// A tree-walking interpreter for Lox
#[derive(ClapParser, Debug)]
#[command(name = "lox-interpreter")]
#[command(version = config::VERSION)]
#[command(about = "A tree-walking interpreter for Lox with a resolver, closures, classes, and a REPL")]
struct CliArgs {
    /// Script file to execute (optional - if not provided, starts the REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let args = CliArgs::parse();

    if let Some(script_path) = &args.script {
        let mut lox = Lox::new(stdout_sink());
        info!("running script {}", script_path.display());
        let code = lox.run_file(script_path);
        std::process::exit(code);
    }

    run_repl();
}

fn run_repl() {
    let mut lox = Lox::new(stdout_sink());

    let rl_config = Config::builder().auto_add_history(true).build();
    let mut rl = match Editor::with_config(rl_config) {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Failed to initialize REPL: {e}");
            std::process::exit(74);
        }
    };
    rl.set_helper(Some(LoxHelper::new()));
    let _ = rl.load_history(HISTORY_FILE);

    println!("{WELCOME_MESSAGE}");
    println!("{WELCOME_SUBTITLE}");
    println!("{WELCOME_FOOTER}");
    info!("REPL session started");

    loop {
        let readline = rl.readline("lox> ");
        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed == "exit" || trimmed == "quit" {
                    break;
                }
                debug!("evaluating REPL line: {trimmed}");
                lox.run_repl_line(&line);
                lox.reset();
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        }
    }

    info!("REPL session ended");
    let _ = rl.save_history(HISTORY_FILE);
}
