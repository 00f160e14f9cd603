use clap::{Parser, Subcommand};
use serde::Serialize;
use stache_parser::position::span_positions;
use std::path::Path;

#[derive(Parser)]
#[command(name = "stache")]
#[command(about = "stache — template parser and inspection tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a template for errors
    Check {
        /// Input template file
        path: String,

        /// Emit diagnostics as JSON
        #[arg(long)]
        json: bool,

        /// Stop at the first error
        #[arg(long)]
        fail_fast: bool,
    },

    /// Print the parsed tree as an s-expression
    Ast {
        /// Input template file
        path: String,
    },

    /// List every node with its resolved source positions
    Spans {
        /// Input template file
        path: String,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Check {
            path,
            json,
            fail_fast,
        } => cmd_check(&path, json, fail_fast),
        Command::Ast { path } => cmd_ast(&path),
        Command::Spans { path } => cmd_spans(&path),
    }
}

fn read_source(path: &str) -> String {
    let p = Path::new(path);
    if !p.exists() {
        eprintln!("Error: file not found: {path}");
        std::process::exit(1);
    }
    match std::fs::read_to_string(p) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {path}: {e}");
            std::process::exit(1);
        }
    }
}

#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    message: &'a str,
    start: Option<JsonPosition>,
    end: Option<JsonPosition>,
    span: Option<(usize, usize)>,
}

#[derive(Serialize)]
struct JsonPosition {
    line: usize,
    column: usize,
}

fn cmd_check(path: &str, json: bool, fail_fast: bool) {
    let source = read_source(path);
    let mode = if fail_fast {
        stache_parser::ErrorMode::FailFast
    } else {
        stache_parser::ErrorMode::Recover
    };
    let result = stache_parser::parse_with(
        &source,
        stache_parser::ParseOptions {
            mode,
            module_name: Some(path.to_owned()),
            trace: None,
        },
    );

    if result.errors.is_empty() {
        eprintln!("OK: {path}");
        return;
    }

    if json {
        let diagnostics: Vec<JsonDiagnostic<'_>> = result
            .errors
            .iter()
            .map(|d| {
                let positions = span_positions(&source, d.span);
                JsonDiagnostic {
                    message: &d.message,
                    start: positions.map(|(s, _)| JsonPosition {
                        line: s.line,
                        column: s.column,
                    }),
                    end: positions.map(|(_, e)| JsonPosition {
                        line: e.line,
                        column: e.column,
                    }),
                    span: (!d.span.is_missing()).then(|| (d.span.start, d.span.end)),
                }
            })
            .collect();
        match serde_json::to_string_pretty(&diagnostics) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("Error serializing diagnostics: {e}");
                std::process::exit(1);
            }
        }
    } else {
        for diag in &result.errors {
            match span_positions(&source, diag.span) {
                Some((start, _)) => {
                    eprintln!("{path}:{}:{}: {}", start.line, start.column, diag.message)
                }
                None => eprintln!("{path}: {}", diag.message),
            }
        }
    }
    std::process::exit(1);
}

fn cmd_ast(path: &str) {
    let source = read_source(path);
    let result = stache_parser::parse(&source);
    println!("{}", stache_parser::debug::to_sexp(&result.root));
    report_errors(path, &source, &result.errors);
}

fn cmd_spans(path: &str) {
    let source = read_source(path);
    let result = stache_parser::parse(&source);
    print!("{}", stache_parser::debug::annotate(&source, &result.root));
    report_errors(path, &source, &result.errors);
}

fn report_errors(path: &str, source: &str, errors: &[stache_parser::Diagnostic]) {
    if errors.is_empty() {
        return;
    }
    for diag in errors {
        match span_positions(source, diag.span) {
            Some((start, _)) => {
                eprintln!("{path}:{}:{}: {}", start.line, start.column, diag.message)
            }
            None => eprintln!("{path}: {}", diag.message),
        }
    }
    std::process::exit(1);
}
