//! Syntax layer for the TypeScript type-alias language.
//!
//! Source text is parsed into an arena [`SyntaxTree`](tree::SyntaxTree) by
//! [`parser`], serialized back to text by [`printer`], and dumped as JSON by
//! [`dump`].

use serde::{Deserialize, Serialize};

pub mod dump;
pub mod parser;
pub mod printer;
pub mod tree;

pub use tree::{Child, Field, Keyword, MappedModifier, NodeId, NodeKind, Slot, SyntaxTree, Template, TypeOperator};

/// Represents a span in the source code.
///
/// # Examples
///
/// ```rust
/// use tsunroll::syntax::Span;
/// let span = Span { start: 0, end: 5 };
/// assert_eq!(span.len(), 5);
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
