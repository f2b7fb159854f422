//! Arena-backed syntax tree.
//!
//! Every node of a parsed file lives in one [`SyntaxTree`] arena and is named
//! by a [`NodeId`]. A node's children are stored as *properties* keyed by a
//! [`Field`]: either a single child or an ordered sequence of children.
//! Scalars (names, literal text, modifiers) live in the node's [`NodeKind`].
//!
//! Each attached node records the [`Slot`] it occupies in its parent. That
//! descriptor is the single source of truth for where a node sits, which is
//! what makes [`SyntaxTree::replace`] a direct write instead of a search.
//!
//! Detached nodes (the previous occupants of replaced slots) stay in the
//! arena but are unreachable from the root.

use serde::Serialize;

use crate::syntax::Span;

// ============================================================================
// IDENTITY AND PROPERTIES
// ============================================================================

/// Identity of a node inside one arena.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    /// Most nodes one arena can address.
    pub const LIMIT: usize = u32::MAX as usize;

    fn from_index(index: usize) -> Self {
        debug_assert!(index < Self::LIMIT, "node index {index} is out of range");
        NodeId(index as u32)
    }

    /// Returns the arena index of this node.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Name of a node property.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Statements,
    Parameters,
    Constraint,
    Default,
    Body,
    Arguments,
    Elements,
    Element,
    Object,
    Index,
    Check,
    Extends,
    TrueType,
    FalseType,
    Members,
    Operand,
    Inner,
    Spans,
    Type,
    Key,
    NameType,
}

/// Value of a node property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    One(NodeId),
    Many(Vec<NodeId>),
}

/// Position a node occupies inside its parent.
///
/// `index` is `Some` exactly when `field` holds a sequence.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Slot {
    pub parent: NodeId,
    pub field: Field,
    pub index: Option<usize>,
}

// ============================================================================
// NODE KINDS
// ============================================================================

/// Predefined type keywords (`string`, `never`, ...).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Keyword {
    Any,
    Unknown,
    Never,
    String,
    Number,
    Boolean,
    Bigint,
    Symbol,
    Object,
    Undefined,
    Null,
    Void,
    True,
    False,
    This,
}

impl Keyword {
    pub fn lookup(text: &str) -> Option<Self> {
        use Keyword::*;
        Some(match text {
            "any" => Any,
            "unknown" => Unknown,
            "never" => Never,
            "string" => String,
            "number" => Number,
            "boolean" => Boolean,
            "bigint" => Bigint,
            "symbol" => Symbol,
            "object" => Object,
            "undefined" => Undefined,
            "null" => Null,
            "void" => Void,
            "true" => True,
            "false" => False,
            "this" => This,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        use Keyword::*;
        match self {
            Any => "any",
            Unknown => "unknown",
            Never => "never",
            String => "string",
            Number => "number",
            Boolean => "boolean",
            Bigint => "bigint",
            Symbol => "symbol",
            Object => "object",
            Undefined => "undefined",
            Null => "null",
            Void => "void",
            True => "true",
            False => "false",
            This => "this",
        }
    }
}

/// Prefix type operators.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeOperator {
    Keyof,
    Readonly,
    Unique,
}

impl TypeOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeOperator::Keyof => "keyof",
            TypeOperator::Readonly => "readonly",
            TypeOperator::Unique => "unique",
        }
    }
}

/// `readonly` / `?` modifier of a mapped type: bare, `+` or `-`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MappedModifier {
    Bare,
    Add,
    Remove,
}

impl MappedModifier {
    pub fn sign(self) -> &'static str {
        match self {
            MappedModifier::Bare => "",
            MappedModifier::Add => "+",
            MappedModifier::Remove => "-",
        }
    }
}

/// What a node is, together with its scalar data.
///
/// The comment on each variant lists the properties the parser attaches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// statements*
    SourceFile,
    /// parameters*, body
    TypeAlias { name: String, exported: bool },
    /// constraint?, default?
    TypeParameter { name: String },
    /// arguments*
    TypeReference { name: String },
    Keyword { keyword: Keyword },
    /// Quoted as written, escapes untouched.
    StringLiteral { text: String },
    NumberLiteral { text: String },
    /// spans*
    TemplateLiteral { head: String },
    /// type
    TemplateSpan { tail: String },
    /// elements*
    Tuple,
    /// type
    RestElement,
    /// type
    OptionalElement,
    /// element
    Array,
    /// object, index
    IndexedAccess,
    /// check, extends, true_type, false_type
    Conditional,
    /// members*
    Union,
    /// members*
    Intersection,
    /// operand
    TypeOperator { operator: TypeOperator },
    Infer { name: String },
    /// inner
    Parenthesized,
    /// members*
    TypeLiteral,
    /// type
    PropertySignature { key: String, readonly: bool, optional: bool },
    /// key, type
    IndexSignature { parameter: String, readonly: bool },
    /// constraint, name_type?, type
    MappedType {
        parameter: String,
        readonly: Option<MappedModifier>,
        optional: Option<MappedModifier>,
    },
    TypeQuery { name: String },
}

impl NodeKind {
    /// Short, stable label for the kind, used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::SourceFile => "source_file",
            NodeKind::TypeAlias { .. } => "type_alias",
            NodeKind::TypeParameter { .. } => "type_parameter",
            NodeKind::TypeReference { .. } => "type_reference",
            NodeKind::Keyword { .. } => "keyword",
            NodeKind::StringLiteral { .. } => "string_literal",
            NodeKind::NumberLiteral { .. } => "number_literal",
            NodeKind::TemplateLiteral { .. } => "template_literal",
            NodeKind::TemplateSpan { .. } => "template_span",
            NodeKind::Tuple => "tuple",
            NodeKind::RestElement => "rest_element",
            NodeKind::OptionalElement => "optional_element",
            NodeKind::Array => "array",
            NodeKind::IndexedAccess => "indexed_access",
            NodeKind::Conditional => "conditional",
            NodeKind::Union => "union",
            NodeKind::Intersection => "intersection",
            NodeKind::TypeOperator { .. } => "type_operator",
            NodeKind::Infer { .. } => "infer",
            NodeKind::Parenthesized => "parenthesized",
            NodeKind::TypeLiteral => "type_literal",
            NodeKind::PropertySignature { .. } => "property_signature",
            NodeKind::IndexSignature { .. } => "index_signature",
            NodeKind::MappedType { .. } => "mapped_type",
            NodeKind::TypeQuery { .. } => "type_query",
        }
    }
}

// ============================================================================
// NODE AND ARENA
// ============================================================================

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    span: Option<Span>,
    slot: Option<Slot>,
    props: Vec<(Field, Child)>,
}

impl Node {
    fn new(kind: NodeKind, span: Option<Span>) -> Self {
        Self {
            kind,
            span,
            slot: None,
            props: Vec::new(),
        }
    }
}

/// Arena owning every node of one source file (or of one [`Template`]).
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl SyntaxTree {
    /// Creates a tree holding a single root node.
    pub fn new(kind: NodeKind, span: Option<Span>) -> Self {
        Self {
            nodes: vec![Node::new(kind, span)],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    /// Allocates a detached node with no properties.
    pub fn alloc(&mut self, kind: NodeKind, span: Option<Span>) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Node::new(kind, span));
        id
    }

    /// Attaches a detached `child` as the single-node property `field` of `parent`.
    pub fn set_child(&mut self, parent: NodeId, field: Field, child: NodeId) {
        debug_assert!(self.node(child).slot.is_none(), "child is already attached");
        self.nodes[child.index()].slot = Some(Slot {
            parent,
            field,
            index: None,
        });
        self.nodes[parent.index()].props.push((field, Child::One(child)));
    }

    /// Attaches detached `children` as the sequence property `field` of `parent`.
    pub fn set_children(&mut self, parent: NodeId, field: Field, children: Vec<NodeId>) {
        for (index, child) in children.iter().enumerate() {
            debug_assert!(self.node(*child).slot.is_none(), "child is already attached");
            self.nodes[child.index()].slot = Some(Slot {
                parent,
                field,
                index: Some(index),
            });
        }
        self.nodes[parent.index()]
            .props
            .push((field, Child::Many(children)));
    }

    // ------------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------------

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn span(&self, id: NodeId) -> Option<Span> {
        self.node(id).span
    }

    #[cfg(test)]
    pub fn slot(&self, id: NodeId) -> Option<Slot> {
        self.node(id).slot
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).slot.map(|slot| slot.parent)
    }

    /// All properties of `id`, in attachment order.
    pub fn properties(&self, id: NodeId) -> impl Iterator<Item = (Field, &Child)> + '_ {
        self.node(id).props.iter().map(|(field, child)| (*field, child))
    }

    /// The single child stored under `field`, if any.
    pub fn child(&self, id: NodeId, field: Field) -> Option<NodeId> {
        self.properties(id).find_map(|(f, child)| match child {
            Child::One(c) if f == field => Some(*c),
            _ => None,
        })
    }

    /// The sequence stored under `field`; empty when absent.
    pub fn children(&self, id: NodeId, field: Field) -> &[NodeId] {
        self.node(id)
            .props
            .iter()
            .find_map(|(f, child)| match child {
                Child::Many(cs) if *f == field => Some(cs.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Direct children of `id` in property order.
    pub fn child_nodes(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for (_, child) in self.properties(id) {
            match child {
                Child::One(c) => out.push(*c),
                Child::Many(cs) => out.extend_from_slice(cs),
            }
        }
        out
    }

    /// `id` and all its descendants in pre-order (document order).
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            let children = self.child_nodes(current);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Number of nodes in the subtree rooted at `id`.
    /// Whether `additional` more nodes still get distinct ids.
    pub fn has_room(&self, additional: usize) -> bool {
        self.nodes.len().saturating_add(additional) < NodeId::LIMIT
    }

    pub fn subtree_size(&self, id: NodeId) -> usize {
        let mut count = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            count += 1;
            stack.extend(self.child_nodes(current));
        }
        count
    }

    /// Returns true when `id` is reachable from the root through slot descriptors.
    #[cfg(test)]
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.node(current).slot {
                Some(slot) if self.holds(slot, current) => current = slot.parent,
                _ => return false,
            }
        }
    }

    /// Returns true when `ancestor` is `id` or one of its attached ancestors.
    pub fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == ancestor {
                return true;
            }
            match self.node(current).slot {
                Some(slot) if self.holds(slot, current) => current = slot.parent,
                _ => return false,
            }
        }
    }

    fn holds(&self, slot: Slot, id: NodeId) -> bool {
        self.node(slot.parent)
            .props
            .iter()
            .find(|(field, _)| *field == slot.field)
            .is_some_and(|(_, child)| match (child, slot.index) {
                (Child::One(c), None) => *c == id,
                (Child::Many(cs), Some(i)) => cs.get(i) == Some(&id),
                _ => false,
            })
    }

    // ------------------------------------------------------------------------
    // Substitution
    // ------------------------------------------------------------------------

    /// Puts `new` into the slot `old` occupies and detaches `old`.
    ///
    /// `new` must be detached. Returns false when `old` has no slot (it is
    /// the root, or an earlier replacement already detached it) or when its
    /// recorded slot no longer holds it.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> bool {
        let Some(slot) = self.node(old).slot else {
            return false;
        };
        if old == new {
            return self.holds(slot, old);
        }
        debug_assert!(self.node(new).slot.is_none(), "replacement is already attached");

        let parent = &mut self.nodes[slot.parent.index()];
        let Some((_, child)) = parent.props.iter_mut().find(|(f, _)| *f == slot.field) else {
            return false;
        };
        let target = match (child, slot.index) {
            (Child::One(c), None) => c,
            (Child::Many(cs), Some(i)) => match cs.get_mut(i) {
                Some(c) => c,
                None => return false,
            },
            _ => return false,
        };
        if *target != old {
            return false;
        }
        *target = new;

        self.nodes[new.index()].slot = Some(slot);
        self.nodes[old.index()].slot = None;
        true
    }

    // ------------------------------------------------------------------------
    // Cloning
    // ------------------------------------------------------------------------

    /// Copies the subtree rooted at `id` into fresh, detached nodes of this arena.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let base = self.nodes.len();
        let mut copied = Vec::new();
        let root = copy_subtree(self, id, base, &mut copied);
        self.nodes.extend(copied);
        root
    }

    /// Copies a template's body into fresh, detached nodes of this arena.
    pub fn instantiate(&mut self, template: &Template) -> NodeId {
        let base = self.nodes.len();
        let mut copied = Vec::new();
        let root = copy_subtree(&template.tree, template.tree.root, base, &mut copied);
        self.nodes.extend(copied);
        root
    }

    /// Structural equality of two subtrees, ignoring identity and spans.
    pub fn same_shape(&self, a: NodeId, other: &SyntaxTree, b: NodeId) -> bool {
        let left = self.node(a);
        let right = other.node(b);
        if left.kind != right.kind || left.props.len() != right.props.len() {
            return false;
        }
        left.props
            .iter()
            .zip(&right.props)
            .all(|((lf, lc), (rf, rc))| {
                lf == rf
                    && match (lc, rc) {
                        (Child::One(l), Child::One(r)) => self.same_shape(*l, other, *r),
                        (Child::Many(ls), Child::Many(rs)) => {
                            ls.len() == rs.len()
                                && ls.iter().zip(rs).all(|(l, r)| self.same_shape(*l, other, *r))
                        }
                        _ => false,
                    }
            })
    }
}

fn copy_subtree(src: &SyntaxTree, id: NodeId, base: usize, out: &mut Vec<Node>) -> NodeId {
    let source = src.node(id);
    let new_id = NodeId::from_index(base + out.len());
    out.push(Node::new(source.kind.clone(), source.span));

    let mut props = Vec::with_capacity(source.props.len());
    for (field, child) in &source.props {
        let copied = match child {
            Child::One(c) => {
                let copy = copy_subtree(src, *c, base, out);
                out[copy.index() - base].slot = Some(Slot {
                    parent: new_id,
                    field: *field,
                    index: None,
                });
                Child::One(copy)
            }
            Child::Many(cs) => {
                let mut copies = Vec::with_capacity(cs.len());
                for (index, c) in cs.iter().enumerate() {
                    let copy = copy_subtree(src, *c, base, out);
                    out[copy.index() - base].slot = Some(Slot {
                        parent: new_id,
                        field: *field,
                        index: Some(index),
                    });
                    copies.push(copy);
                }
                Child::Many(copies)
            }
        };
        props.push((*field, copied));
    }
    out[new_id.index() - base].props = props;
    new_id
}

// ============================================================================
// TEMPLATES
// ============================================================================

/// A frozen copy of a subtree, held in its own arena.
///
/// A template can be read and instantiated into a live [`SyntaxTree`], but
/// never mutated, so every instantiation starts from the same state.
#[derive(Debug, Clone)]
pub struct Template {
    tree: SyntaxTree,
}

impl Template {
    /// Captures the subtree rooted at `id`.
    pub fn capture(tree: &SyntaxTree, id: NodeId) -> Self {
        let mut nodes = Vec::new();
        let root = copy_subtree(tree, id, 0, &mut nodes);
        Self {
            tree: SyntaxTree { nodes, root },
        }
    }

    /// Read-only view of the captured nodes; the template's root is `tree().root()`.
    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    pub fn size(&self) -> usize {
        self.tree.subtree_size(self.tree.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(tree: &mut SyntaxTree, name: &str) -> NodeId {
        tree.alloc(
            NodeKind::TypeReference {
                name: name.to_string(),
            },
            None,
        )
    }

    /// `A | B[]` under a source file root.
    fn sample() -> (SyntaxTree, NodeId, NodeId, NodeId) {
        let mut tree = SyntaxTree::new(NodeKind::SourceFile, None);
        let union = tree.alloc(NodeKind::Union, None);
        let a = reference(&mut tree, "A");
        let array = tree.alloc(NodeKind::Array, None);
        let b = reference(&mut tree, "B");
        tree.set_child(array, Field::Element, b);
        tree.set_children(union, Field::Members, vec![a, array]);
        let root = tree.root();
        tree.set_children(root, Field::Statements, vec![union]);
        (tree, union, a, b)
    }

    #[test]
    fn arena_room_is_bounded_by_node_ids() {
        let (tree, ..) = sample();
        assert!(tree.has_room(0));
        assert!(tree.has_room(NodeId::LIMIT - 6));
        assert!(!tree.has_room(NodeId::LIMIT - 5));
        assert!(!tree.has_room(usize::MAX));
    }

    #[test]
    fn replace_writes_sequence_slot() {
        let (mut tree, union, a, _) = sample();
        let c = reference(&mut tree, "C");
        assert!(tree.replace(a, c));
        assert_eq!(tree.children(union, Field::Members)[0], c);
        assert_eq!(tree.parent(c), Some(union));
        assert_eq!(tree.slot(a), None);
        assert!(!tree.is_attached(a));
        assert!(tree.is_attached(c));
    }

    #[test]
    fn replace_writes_single_slot() {
        let (mut tree, _, _, b) = sample();
        let array = tree.parent(b).unwrap();
        let c = reference(&mut tree, "C");
        assert!(tree.replace(b, c));
        assert_eq!(tree.child(array, Field::Element), Some(c));
    }

    #[test]
    fn replace_rejects_root_and_stale_nodes() {
        let (mut tree, _, a, _) = sample();
        let root = tree.root();
        let c = reference(&mut tree, "C");
        assert!(!tree.replace(root, c));

        assert!(tree.replace(a, c));
        let d = reference(&mut tree, "D");
        assert!(!tree.replace(a, d), "a detached node has no slot left");
    }

    #[test]
    fn deep_clone_is_independent() {
        let (mut tree, union, _, _) = sample();
        let copy = tree.deep_clone(union);
        assert_ne!(copy, union);
        assert!(tree.same_shape(union, &tree, copy));
        assert_eq!(tree.slot(copy), None);

        let first = tree.children(copy, Field::Members)[0];
        let replacement = reference(&mut tree, "Z");
        assert!(tree.replace(first, replacement));
        assert!(!tree.same_shape(union, &tree, copy));
        assert!(matches!(
            tree.kind(tree.children(union, Field::Members)[0]),
            NodeKind::TypeReference { name } if name == "A"
        ));
    }

    #[test]
    fn template_instantiations_do_not_share_nodes() {
        let (mut tree, union, _, _) = sample();
        let template = Template::capture(&tree, union);
        let first = tree.instantiate(&template);
        let second = tree.instantiate(&template);
        assert_ne!(first, second);

        let member = tree.children(first, Field::Members)[0];
        let replacement = reference(&mut tree, "Z");
        assert!(tree.replace(member, replacement));
        assert!(tree.same_shape(second, template.tree(), template.tree().root()));
        assert_eq!(template.size(), 4);
    }

    #[test]
    fn descendants_are_pre_order() {
        let (tree, union, a, b) = sample();
        let order = tree.descendants(union);
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], union);
        assert_eq!(order[1], a);
        assert_eq!(order[3], b);
    }
}
