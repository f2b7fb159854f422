//! Defines the command-line arguments and subcommands for the tsunroll CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::engine::ExpandConfig;
use crate::errors::{invalid_option, SourceContext, UnrollError};
use crate::syntax::parser::parse_type;
use crate::unroll::{UnrollOptions, DEFAULT_DEPTH};

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "tsunroll",
    version,
    about = "Unrolls self-referential TypeScript type aliases to a fixed depth."
)]
pub struct UnrollArgs {
    /// Log more (-v info, -vv debug, -vvv trace). Logs go to stderr.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print every declaration after unrolling.
    Expand(ExpandArgs),
    /// Show each unrolling round with diffs.
    Trace(ExpandArgs),
    /// Show the syntax tree of a file as JSON.
    Ast {
        /// The path to the TypeScript file to parse.
        #[arg(required = true)]
        file: PathBuf,
    },
    /// List declarations and whether they refer to themselves.
    List {
        /// The path to the TypeScript file to inspect.
        #[arg(required = true)]
        file: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct ExpandArgs {
    /// The path to the TypeScript file to expand.
    #[arg(required = true)]
    pub file: PathBuf,

    /// Rounds of unrolling per declaration.
    #[arg(long, default_value_t = DEFAULT_DEPTH)]
    pub depth: usize,

    /// Rounds for one declaration (repeatable).
    #[arg(long = "depth-for", value_name = "NAME=N", value_parser = parse_depth_override)]
    pub depth_for: Vec<(String, usize)>,

    /// Only unroll these declarations (repeatable).
    #[arg(long, value_name = "NAME")]
    pub only: Vec<String>,

    /// Type that replaces self-references left after the last round.
    #[arg(long, value_name = "TYPE")]
    pub fallback: Option<String>,

    /// Fail a declaration whose body would grow past this many nodes.
    #[arg(long, value_name = "N")]
    pub max_nodes: Option<usize>,
}

impl ExpandArgs {
    pub fn to_config(&self) -> Result<ExpandConfig, UnrollError> {
        let fallback = match &self.fallback {
            Some(text) => {
                let source = SourceContext::from_file("--fallback", text.as_str());
                Some(parse_type(text, &source)?)
            }
            None => None,
        };
        if self.max_nodes == Some(0) {
            return Err(invalid_option("--max-nodes", "must be at least 1"));
        }

        Ok(ExpandConfig {
            options: UnrollOptions {
                depth: self.depth,
                max_nodes: self.max_nodes,
                fallback,
            },
            depth_overrides: self.depth_for.iter().cloned().collect(),
            only: self.only.clone(),
        })
    }
}

/// Parses `NAME=N` for `--depth-for`.
pub fn parse_depth_override(text: &str) -> Result<(String, usize), UnrollError> {
    let (name, depth) = text
        .split_once('=')
        .ok_or_else(|| invalid_option("--depth-for", format!("expected NAME=N, got `{text}`")))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid_option("--depth-for", "declaration name is empty"));
    }
    let depth = depth
        .trim()
        .parse()
        .map_err(|_| invalid_option("--depth-for", format!("`{depth}` is not a round count")))?;
    Ok((name.to_string(), depth))
}
