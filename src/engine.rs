//! File-level pipeline: parse, unroll every selected declaration, print.
//!
//! Each declaration is an independent unit of work. A failure in one is
//! recorded in its [`DeclarationOutcome`] and never stops the others.

use std::{collections::HashMap, path::Path};

use miette::Report;
use tracing::{debug, info, warn};

use crate::errors::{ErrorContext, SourceArc, SourceContext, UnrollError};
use crate::syntax::{parser, printer, Field, NodeId, SyntaxTree};
use crate::unroll::{Declaration, Locator, RoundObserver, UnrollOptions, UnrollReport, Unroller};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Options for a whole file.
#[derive(Debug, Clone, Default)]
pub struct ExpandConfig {
    /// Options applied to every declaration.
    pub options: UnrollOptions,
    /// Per-declaration round counts, overriding `options.depth`.
    pub depth_overrides: HashMap<String, usize>,
    /// When non-empty, only these declarations are unrolled; the rest are printed as parsed.
    pub only: Vec<String>,
}

impl ExpandConfig {
    pub fn selects(&self, name: &str) -> bool {
        self.only.is_empty() || self.only.iter().any(|n| n == name)
    }

    /// Options for one declaration, with its depth override applied.
    pub fn options_for(&self, name: &str) -> UnrollOptions {
        let mut options = self.options.clone();
        if let Some(depth) = self.depth_overrides.get(name) {
            options.depth = *depth;
        }
        options
    }
}

// ============================================================================
// RESULTS
// ============================================================================

#[derive(Debug)]
pub enum Status {
    Unrolled(UnrollReport),
    /// Excluded by `--only`.
    Skipped,
    Failed(UnrollError),
}

#[derive(Debug)]
pub struct DeclarationOutcome {
    pub node: NodeId,
    /// `None` when the declaration's name could not be read.
    pub name: Option<String>,
    pub status: Status,
}

impl DeclarationOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, Status::Failed(_))
    }
}

/// A parsed file after unrolling.
#[derive(Debug)]
pub struct Expansion {
    pub tree: SyntaxTree,
    pub outcomes: Vec<DeclarationOutcome>,
}

impl Expansion {
    /// Printed declarations in source order. Failed declarations are left out.
    pub fn printed(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|outcome| !outcome.is_failed())
            .map(|outcome| printer::print_node(&self.tree, outcome.node))
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnrollError> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.status {
            Status::Failed(err) => Some(err),
            _ => None,
        })
    }

    /// Non-fatal diagnostics collected while unrolling.
    pub fn diagnostics(&self) -> impl Iterator<Item = &UnrollError> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match &outcome.status {
                Status::Unrolled(report) => Some(report),
                _ => None,
            })
            .flat_map(|report| report.diagnostics.iter())
    }

    /// Consumes the expansion, returning non-fatal diagnostics and failures.
    pub fn into_errors(self) -> (Vec<UnrollError>, Vec<UnrollError>) {
        let mut diagnostics = Vec::new();
        let mut failures = Vec::new();
        for outcome in self.outcomes {
            match outcome.status {
                Status::Unrolled(report) => diagnostics.extend(report.diagnostics),
                Status::Failed(err) => failures.push(err),
                Status::Skipped => {}
            }
        }
        (diagnostics, failures)
    }

    pub fn report_for(&self, name: &str) -> Option<&UnrollReport> {
        self.outcomes.iter().find_map(|outcome| match &outcome.status {
            Status::Unrolled(report) if report.name == name => Some(report),
            _ => None,
        })
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Parses and unrolls `text`.
///
/// Only a parse error fails the call as a whole. Errors from individual
/// declarations come back inside the [`Expansion`], with the source attached
/// so they render with a snippet.
pub fn expand_source(
    text: &str,
    source: &SourceContext,
    config: &ExpandConfig,
) -> Result<Expansion, UnrollError> {
    expand_source_observed(text, source, config, &mut ())
}

pub fn expand_source_observed(
    text: &str,
    source: &SourceContext,
    config: &ExpandConfig,
    observer: &mut dyn RoundObserver,
) -> Result<Expansion, UnrollError> {
    let mut tree = parser::parse(text, source)?;
    let named = source.to_named_source();
    let locator = Locator::new();
    let declarations = locator.find_declarations(&tree);
    let statements = tree.children(tree.root(), Field::Statements).to_vec();
    info!(file = %source.name, declarations = declarations.len(), "expanding");

    let mut outcomes = Vec::with_capacity(declarations.len());
    for (found, node) in declarations.into_iter().zip(statements) {
        let outcome = match found {
            Ok(declaration) => expand_one(&mut tree, declaration, config, observer, &named),
            Err(err) => {
                warn!(error = %err, "unreadable declaration");
                DeclarationOutcome {
                    node,
                    name: None,
                    status: Status::Failed(err.with_source(named.clone())),
                }
            }
        };
        outcomes.push(outcome);
    }

    Ok(Expansion { tree, outcomes })
}

fn expand_one(
    tree: &mut SyntaxTree,
    declaration: Declaration,
    config: &ExpandConfig,
    observer: &mut dyn RoundObserver,
    named: &SourceArc,
) -> DeclarationOutcome {
    let node = declaration.node;
    let name = declaration.name.clone();
    if !config.selects(&name) {
        debug!(declaration = %name, "not selected");
        return DeclarationOutcome {
            node,
            name: Some(name),
            status: Status::Skipped,
        };
    }

    let unroller = Unroller::new(config.options_for(&name));
    let status = match unroller.unroll_observed(tree, &declaration, observer) {
        Ok(mut report) => {
            report.diagnostics = report
                .diagnostics
                .into_iter()
                .map(|d| d.with_source(named.clone()))
                .collect();
            Status::Unrolled(report)
        }
        Err(err) => Status::Failed(err.with_source(named.clone())),
    };
    DeclarationOutcome {
        node,
        name: Some(name),
        status,
    }
}

/// Reads a file, mapping I/O failures into [`UnrollError::Io`].
pub fn read_source(path: &Path) -> Result<SourceContext, UnrollError> {
    let content = std::fs::read_to_string(path).map_err(|source| UnrollError::Io {
        path: path.display().to_string(),
        source,
        ctx: ErrorContext::none(),
    })?;
    Ok(SourceContext::from_file(path.display().to_string(), content))
}

/// Prints an error with full miette diagnostics.
pub fn print_error(error: UnrollError) {
    let report = Report::new(error);
    eprintln!("{report:?}");
}
