//! # tsunroll
//!
//! Unrolls self-referential TypeScript type aliases into finite ones.
//!
//! A recursive alias such as
//!
//! ```text
//! type List<T> = { value: T; next: List<T> | null };
//! ```
//!
//! is expanded by splicing parameter-bound copies of its body in place of
//! `List<...>`, a fixed number of rounds deep.
//!
//! ## Layout
//!
//! - [`syntax`]: parser, arena tree, printer and JSON dump.
//! - [`unroll`]: locator, parameter binder and the round-based unroller.
//! - [`engine`]: the per-file pipeline used by the CLI.
//! - [`errors`]: the error type and its `miette` diagnostics.
//!
//! ```rust
//! use tsunroll::{expand_source, ExpandConfig, SourceContext, UnrollOptions};
//!
//! let text = "type List<T> = { value: T; next: List<T> | null };";
//! let config = ExpandConfig {
//!     options: UnrollOptions::default().with_depth(1),
//!     ..ExpandConfig::default()
//! };
//! let expansion = expand_source(text, &SourceContext::from_file("list.ts", text), &config).unwrap();
//! assert_eq!(
//!     expansion.printed(),
//!     ["type List<T> = { value: T; next: { value: T; next: List<T> | null } | null };"]
//! );
//! ```

pub mod cli;
pub mod engine;
pub mod errors;
pub mod syntax;
pub mod unroll;

pub use engine::{expand_source, ExpandConfig, Expansion};
pub use errors::{SourceContext, UnrollError};
pub use unroll::{UnrollOptions, UnrollReport, Unroller};
