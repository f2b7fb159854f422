//! # Self-Reference Unrolling
//!
//! Turns a recursive type alias into a finite one by repeatedly splicing
//! parameter-bound copies of its body in place of its own name.
//!
//! ## Pipeline
//!
//! - **`locator`**: finds declarations, self-references and parameter usages
//!   through a small query engine over the syntax tree.
//! - **`binder`**: maps a declaration's parameters to the arguments of one
//!   reference, falling back to declared defaults.
//! - **`unroller`**: runs the rounds. Each round re-queries the current body,
//!   so references introduced by the previous round are expanded by the next.
//!
//! Node replacement itself lives on [`SyntaxTree::replace`](crate::syntax::SyntaxTree::replace).
//!
//! **INVARIANT:** every insertion comes from a [`Template`](crate::syntax::Template)
//! captured before the first round. The live body is never used as a clone
//! source.

pub mod binder;
pub mod locator;
pub mod unroller;

pub use binder::{bind, BindError, Bindings};
pub use locator::{Declaration, Locator, Parameter, PreorderQuery, QueryEngine, Reference, Selector};
pub use unroller::{RoundObserver, RoundStats, UnrollOptions, UnrollReport, Unroller, DEFAULT_DEPTH};
