//! The tsunroll Command-Line Interface.
//!
//! This module is the main entry point for all CLI commands and orchestrates
//! the core library functions.

use std::{path::Path, process};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::args::{Command, ExpandArgs, UnrollArgs};
use crate::cli::output::{print_declarations, print_trace, TraceRecorder};
use crate::engine::{expand_source, expand_source_observed, print_error, read_source, Expansion};
use crate::errors::UnrollError;
use crate::syntax::{dump, parser};
use crate::unroll::Locator;

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = UnrollArgs::parse();
    init_logging(args.verbose);

    let result = match args.command {
        Command::Expand(expand) => handle_expand(&expand),
        Command::Trace(trace) => handle_trace(&trace),
        Command::Ast { file } => handle_ast(&file),
        Command::List { file } => handle_list(&file),
    };

    match result {
        Ok(0) => {}
        Ok(_) => process::exit(1),
        Err(e) => {
            print_error(e);
            process::exit(1);
        }
    }
}

/// Installs a stderr logger. `RUST_LOG` wins over `-v` when set.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

// ============================================================================
// COMMAND HANDLERS
// ============================================================================
//
// Handlers return the number of failed declarations; a returned error means
// nothing could be processed.

/// Handles the `expand` subcommand.
fn handle_expand(args: &ExpandArgs) -> Result<usize, UnrollError> {
    let config = args.to_config()?;
    let source = read_source(&args.file)?;
    let expansion = expand_source(&source.content, &source, &config)?;
    for text in expansion.printed() {
        println!("{text}");
    }
    Ok(report_errors(expansion))
}

/// Handles the `trace` subcommand.
fn handle_trace(args: &ExpandArgs) -> Result<usize, UnrollError> {
    let config = args.to_config()?;
    let source = read_source(&args.file)?;
    let mut recorder = TraceRecorder::default();
    let expansion = expand_source_observed(&source.content, &source, &config, &mut recorder)?;
    print_trace(&recorder.steps);
    Ok(report_errors(expansion))
}

/// Handles the `ast` subcommand.
fn handle_ast(path: &Path) -> Result<usize, UnrollError> {
    let source = read_source(path)?;
    let tree = parser::parse(&source.content, &source)?;
    println!("{}", dump::to_json_string(&tree));
    Ok(0)
}

/// Handles the `list` subcommand.
fn handle_list(path: &Path) -> Result<usize, UnrollError> {
    let source = read_source(path)?;
    let tree = parser::parse(&source.content, &source)?;
    let locator = Locator::new();
    let named = source.to_named_source();

    let mut rows = Vec::new();
    let mut failed = 0;
    for found in locator.find_declarations(&tree) {
        match found.and_then(|d| d.body(&tree).map(|body| (body, d))) {
            Ok((body, declaration)) => {
                let recursive = !locator
                    .find_self_references(&tree, body, &declaration.name)
                    .is_empty();
                rows.push((declaration.name.clone(), declaration.parameter_names(), recursive));
            }
            Err(e) => {
                failed += 1;
                print_error(e.with_source(named.clone()));
            }
        }
    }
    print_declarations(&rows);
    Ok(failed)
}

/// Prints diagnostics and failures on stderr, returning the failure count.
fn report_errors(expansion: Expansion) -> usize {
    let (diagnostics, failures) = expansion.into_errors();
    for diagnostic in diagnostics {
        print_error(diagnostic);
    }
    let failed = failures.len();
    for failure in failures {
        print_error(failure);
    }
    failed
}
