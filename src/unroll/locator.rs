//! Declaration and reference lookup.
//!
//! Lookups are expressed as [`Selector`]s answered by a [`QueryEngine`]. The
//! [`Locator`] turns matching nodes into typed views ([`Declaration`],
//! [`Parameter`], [`Reference`]) that the unroller works with.

use crate::errors::{ErrorContext, UnrollError};
use crate::syntax::{Field, NodeId, NodeKind, SyntaxTree};

// ============================================================================
// QUERY ENGINE
// ============================================================================

/// How many type arguments a matching usage may carry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Arity {
    Any,
    Zero,
}

/// Declarative node pattern.
#[derive(Debug, Clone, Copy)]
pub enum Selector<'a> {
    /// Every `type` alias declaration.
    Declarations,
    /// Type references whose name is one of `names`.
    Usage { names: &'a [String], arity: Arity },
}

impl Selector<'_> {
    pub fn matches(&self, tree: &SyntaxTree, id: NodeId) -> bool {
        match (self, tree.kind(id)) {
            (Selector::Declarations, NodeKind::TypeAlias { .. }) => true,
            (Selector::Usage { names, arity }, NodeKind::TypeReference { name }) => {
                names.iter().any(|n| n == name)
                    && match arity {
                        Arity::Any => true,
                        Arity::Zero => tree.children(id, Field::Arguments).is_empty(),
                    }
            }
            _ => false,
        }
    }
}

/// Answers selectors over a subtree.
pub trait QueryEngine {
    /// All nodes under `scope` (inclusive) matching `selector`, in a stable order.
    fn query(&self, tree: &SyntaxTree, scope: NodeId, selector: &Selector<'_>) -> Vec<NodeId>;
}

/// Walks the subtree in pre-order, so results come out in document order.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreorderQuery;

impl QueryEngine for PreorderQuery {
    fn query(&self, tree: &SyntaxTree, scope: NodeId, selector: &Selector<'_>) -> Vec<NodeId> {
        tree.descendants(scope)
            .into_iter()
            .filter(|id| selector.matches(tree, *id))
            .collect()
    }
}

// ============================================================================
// VIEWS
// ============================================================================

/// A type alias: name, formal parameters, and (through [`Declaration::body`]) its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub node: NodeId,
    pub name: String,
    pub parameters: Vec<Parameter>,
}

impl Declaration {
    /// Current body of the declaration.
    ///
    /// Read through the tree each time: replacing a body that is itself a
    /// self-reference changes which node sits in the body slot.
    pub fn body(&self, tree: &SyntaxTree) -> Result<NodeId, UnrollError> {
        tree.child(self.node, Field::Body)
            .ok_or_else(|| UnrollError::MissingBody {
                declaration: self.name.clone(),
                ctx: ErrorContext::at(tree.span(self.node)),
            })
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub node: NodeId,
    pub name: String,
    pub default: Option<NodeId>,
}

/// A usage of some name with its actual arguments. Transient: it is only
/// meaningful until the next mutation of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub node: NodeId,
    pub name: String,
    pub arguments: Vec<NodeId>,
}

// ============================================================================
// LOCATOR
// ============================================================================

#[derive(Debug, Default, Clone)]
pub struct Locator<Q = PreorderQuery> {
    engine: Q,
}

impl Locator<PreorderQuery> {
    pub fn new() -> Self {
        Self {
            engine: PreorderQuery,
        }
    }
}

impl<Q: QueryEngine> Locator<Q> {
    pub fn with_engine(engine: Q) -> Self {
        Self { engine }
    }

    /// Every declaration in the file, in source order.
    ///
    /// Declarations that cannot be read (no name) come back as errors in
    /// their position so callers can report them without losing the others.
    pub fn find_declarations(&self, tree: &SyntaxTree) -> Vec<Result<Declaration, UnrollError>> {
        self.engine
            .query(tree, tree.root(), &Selector::Declarations)
            .into_iter()
            .map(|id| self.declaration(tree, id))
            .collect()
    }

    /// Reads the declaration rooted at `id`.
    pub fn declaration(&self, tree: &SyntaxTree, id: NodeId) -> Result<Declaration, UnrollError> {
        let name = name_of(tree, id)?.to_string();
        let mut parameters = Vec::new();
        for param in tree.children(id, Field::Parameters) {
            parameters.push(Parameter {
                node: *param,
                name: name_of(tree, *param)?.to_string(),
                default: tree.child(*param, Field::Default),
            });
        }
        Ok(Declaration {
            node: id,
            name,
            parameters,
        })
    }

    /// References to `name` under `scope`, with any number of arguments.
    pub fn find_self_references(&self, tree: &SyntaxTree, scope: NodeId, name: &str) -> Vec<Reference> {
        let names = [name.to_string()];
        let selector = Selector::Usage {
            names: &names,
            arity: Arity::Any,
        };
        self.references(tree, scope, &selector)
    }

    /// Zero-argument references to any of `names` under `scope`.
    pub fn find_parameter_usages(
        &self,
        tree: &SyntaxTree,
        scope: NodeId,
        names: &[String],
    ) -> Vec<Reference> {
        if names.is_empty() {
            return Vec::new();
        }
        let selector = Selector::Usage {
            names,
            arity: Arity::Zero,
        };
        self.references(tree, scope, &selector)
    }

    fn references(&self, tree: &SyntaxTree, scope: NodeId, selector: &Selector<'_>) -> Vec<Reference> {
        self.engine
            .query(tree, scope, selector)
            .into_iter()
            .filter_map(|id| match tree.kind(id) {
                NodeKind::TypeReference { name } => Some(Reference {
                    node: id,
                    name: name.clone(),
                    arguments: tree.children(id, Field::Arguments).to_vec(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// Declared name of a declaration or type parameter node.
pub fn name_of(tree: &SyntaxTree, id: NodeId) -> Result<&str, UnrollError> {
    let kind = tree.kind(id);
    let name = match kind {
        NodeKind::TypeAlias { name, .. } | NodeKind::TypeParameter { name } => name.as_str(),
        _ => "",
    };
    if name.is_empty() {
        return Err(UnrollError::MissingIdentifier {
            node: kind.label().replace('_', " "),
            ctx: ErrorContext::at(tree.span(id)),
        });
    }
    Ok(name)
}
