//! Handles all user-facing output for the CLI.
//!
//! Expanded declarations go to stdout. Errors are rendered by
//! [`print_error`](crate::engine::print_error) on stderr.

use std::io::IsTerminal;

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::syntax::{printer, SyntaxTree};
use crate::unroll::{Declaration, RoundObserver, RoundStats};

// ============================================================================
// TRACE RECORDING
// ============================================================================

/// One rendering of a declaration during unrolling.
#[derive(Debug, Clone)]
pub struct TraceStep {
    pub declaration: String,
    /// `None` for the state before the first round.
    pub stats: Option<RoundStats>,
    pub text: String,
}

/// Collects a [`TraceStep`] per round.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    pub steps: Vec<TraceStep>,
}

impl RoundObserver for TraceRecorder {
    fn started(&mut self, tree: &SyntaxTree, declaration: &Declaration) {
        self.steps.push(TraceStep {
            declaration: declaration.name.clone(),
            stats: None,
            text: printer::print_node(tree, declaration.node),
        });
    }

    fn round_finished(&mut self, tree: &SyntaxTree, declaration: &Declaration, stats: &RoundStats) {
        self.steps.push(TraceStep {
            declaration: declaration.name.clone(),
            stats: Some(stats.clone()),
            text: printer::print_node(tree, declaration.node),
        });
    }
}

// ============================================================================
// CORE OUTPUT FUNCTIONS
// ============================================================================

/// Prints an unrolling trace to the console with colored word diffs.
pub fn print_trace(steps: &[TraceStep]) {
    let mut stdout = StandardStream::stdout(color_choice());
    let mut last_text = String::new();

    for step in steps {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
        match &step.stats {
            None => println!("--- {}: original ---", step.declaration),
            Some(stats) => println!(
                "--- {}: round {} ({} expanded, {} nodes) ---",
                step.declaration, stats.round, stats.expanded, stats.node_count
            ),
        }
        let _ = stdout.reset();

        if step.stats.is_none() {
            println!("{}", step.text);
        } else {
            let changeset = Changeset::new(&last_text, &step.text, " ");
            print_diff(&mut stdout, &changeset.diffs);
        }
        last_text = step.text.clone();
        println!();
    }
}

/// Prints the `list` table: name, parameters, and a marker for recursive aliases.
pub fn print_declarations(rows: &[(String, Vec<String>, bool)]) {
    let mut stdout = StandardStream::stdout(color_choice());
    for (name, parameters, recursive) in rows {
        let params = if parameters.is_empty() {
            String::new()
        } else {
            format!("<{}>", parameters.join(", "))
        };
        print!("{name}{params}");
        if *recursive {
            let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)));
            print!("  (self-referential)");
            let _ = stdout.reset();
        }
        println!();
    }
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

/// Colors only when stdout is a terminal, so piped output stays plain.
fn color_choice() -> ColorChoice {
    if std::io::stdout().is_terminal() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

fn print_diff(stdout: &mut StandardStream, diffs: &[Difference]) {
    let mut first = true;
    for diff in diffs {
        if !first {
            print!(" ");
        }
        first = false;
        match diff {
            Difference::Same(x) => {
                let _ = stdout.reset();
                print!("{x}");
            }
            Difference::Add(x) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
                print!("{x}");
            }
            Difference::Rem(x) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_strikethrough(true));
                print!("{x}");
            }
        }
    }
    let _ = stdout.reset();
    println!();
}
