//! Serializes syntax trees back to TypeScript source.
//!
//! Output is single-line per declaration. Parentheses from the source are
//! kept as `Parenthesized` nodes; the printer adds its own wherever a node
//! sits in a position that binds tighter than the node itself, which happens
//! after substitution (a union bound into `T[]` prints as `(A | B)[]`).

use crate::syntax::{Field, NodeId, NodeKind, SyntaxTree, Template};

/// Binding strength of a type form, weakest first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Conditional,
    Union,
    Intersection,
    Operator,
    Postfix,
    Primary,
}

fn precedence(kind: &NodeKind) -> Precedence {
    match kind {
        NodeKind::Conditional => Precedence::Conditional,
        NodeKind::Union => Precedence::Union,
        NodeKind::Intersection => Precedence::Intersection,
        NodeKind::TypeOperator { .. } | NodeKind::Infer { .. } => Precedence::Operator,
        NodeKind::Array | NodeKind::IndexedAccess => Precedence::Postfix,
        _ => Precedence::Primary,
    }
}

/// Prints the subtree rooted at `id`.
pub fn print_node(tree: &SyntaxTree, id: NodeId) -> String {
    let mut printer = Printer::new(tree);
    printer.write(id);
    printer.out
}

/// Prints a template's captured subtree.
pub fn print_template(template: &Template) -> String {
    print_node(template.tree(), template.tree().root())
}

/// Prints every declaration of a file, one per line.
pub fn print_file(tree: &SyntaxTree) -> String {
    tree.children(tree.root(), Field::Statements)
        .iter()
        .map(|statement| print_node(tree, *statement))
        .collect::<Vec<_>>()
        .join("\n")
}

struct Printer<'t> {
    tree: &'t SyntaxTree,
    out: String,
}

impl<'t> Printer<'t> {
    fn new(tree: &'t SyntaxTree) -> Self {
        Self {
            tree,
            out: String::new(),
        }
    }

    fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    /// Writes `id`, parenthesized if it binds looser than `min`.
    fn write_at(&mut self, id: NodeId, min: Precedence) {
        if precedence(self.tree.kind(id)) < min {
            self.push("(");
            self.write(id);
            self.push(")");
        } else {
            self.write(id);
        }
    }

    fn write_field(&mut self, id: NodeId, field: Field, min: Precedence) {
        if let Some(child) = self.tree.child(id, field) {
            self.write_at(child, min);
        }
    }

    fn write_list(&mut self, items: &[NodeId], separator: &str, min: Precedence) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.push(separator);
            }
            self.write_at(*item, min);
        }
    }

    fn write(&mut self, id: NodeId) {
        let tree = self.tree;
        match tree.kind(id) {
            NodeKind::SourceFile => {
                let statements = tree.children(id, Field::Statements);
                for (i, statement) in statements.iter().enumerate() {
                    if i > 0 {
                        self.push("\n");
                    }
                    self.write(*statement);
                }
            }
            NodeKind::TypeAlias { name, exported } => {
                if *exported {
                    self.push("export ");
                }
                self.push("type ");
                self.push(name);
                let params = tree.children(id, Field::Parameters);
                if !params.is_empty() {
                    self.push("<");
                    self.write_list(params, ", ", Precedence::Conditional);
                    self.push(">");
                }
                self.push(" = ");
                self.write_field(id, Field::Body, Precedence::Conditional);
                self.push(";");
            }
            NodeKind::TypeParameter { name } => {
                self.push(name);
                if let Some(constraint) = tree.child(id, Field::Constraint) {
                    self.push(" extends ");
                    self.write(constraint);
                }
                if let Some(default) = tree.child(id, Field::Default) {
                    self.push(" = ");
                    self.write(default);
                }
            }
            NodeKind::TypeReference { name } => {
                self.push(name);
                let args = tree.children(id, Field::Arguments);
                if !args.is_empty() {
                    self.push("<");
                    self.write_list(args, ", ", Precedence::Conditional);
                    self.push(">");
                }
            }
            NodeKind::Keyword { keyword } => self.push(keyword.as_str()),
            NodeKind::StringLiteral { text } | NodeKind::NumberLiteral { text } => self.push(text),
            NodeKind::TemplateLiteral { head } => {
                self.push("`");
                self.push(head);
                for span in tree.children(id, Field::Spans) {
                    self.write(*span);
                }
                self.push("`");
            }
            NodeKind::TemplateSpan { tail } => {
                self.push("${");
                self.write_field(id, Field::Type, Precedence::Conditional);
                self.push("}");
                self.push(tail);
            }
            NodeKind::Tuple => {
                self.push("[");
                self.write_list(tree.children(id, Field::Elements), ", ", Precedence::Conditional);
                self.push("]");
            }
            NodeKind::RestElement => {
                self.push("...");
                self.write_field(id, Field::Type, Precedence::Conditional);
            }
            NodeKind::OptionalElement => {
                self.write_field(id, Field::Type, Precedence::Union);
                self.push("?");
            }
            NodeKind::Array => {
                self.write_field(id, Field::Element, Precedence::Postfix);
                self.push("[]");
            }
            NodeKind::IndexedAccess => {
                self.write_field(id, Field::Object, Precedence::Postfix);
                self.push("[");
                self.write_field(id, Field::Index, Precedence::Conditional);
                self.push("]");
            }
            NodeKind::Conditional => {
                self.write_field(id, Field::Check, Precedence::Union);
                self.push(" extends ");
                self.write_field(id, Field::Extends, Precedence::Union);
                self.push(" ? ");
                self.write_field(id, Field::TrueType, Precedence::Conditional);
                self.push(" : ");
                self.write_field(id, Field::FalseType, Precedence::Conditional);
            }
            NodeKind::Union => {
                self.write_list(tree.children(id, Field::Members), " | ", Precedence::Union);
            }
            NodeKind::Intersection => {
                self.write_list(
                    tree.children(id, Field::Members),
                    " & ",
                    Precedence::Intersection,
                );
            }
            NodeKind::TypeOperator { operator } => {
                self.push(operator.as_str());
                self.push(" ");
                self.write_field(id, Field::Operand, Precedence::Operator);
            }
            NodeKind::Infer { name } => {
                self.push("infer ");
                self.push(name);
            }
            NodeKind::Parenthesized => {
                self.push("(");
                self.write_field(id, Field::Inner, Precedence::Conditional);
                self.push(")");
            }
            NodeKind::TypeLiteral => {
                let members = tree.children(id, Field::Members);
                if members.is_empty() {
                    self.push("{}");
                } else {
                    self.push("{ ");
                    self.write_list(members, "; ", Precedence::Conditional);
                    self.push(" }");
                }
            }
            NodeKind::PropertySignature {
                key,
                readonly,
                optional,
            } => {
                if *readonly {
                    self.push("readonly ");
                }
                self.push(key);
                if *optional {
                    self.push("?");
                }
                self.push(": ");
                self.write_field(id, Field::Type, Precedence::Conditional);
            }
            NodeKind::IndexSignature {
                parameter,
                readonly,
            } => {
                if *readonly {
                    self.push("readonly ");
                }
                self.push("[");
                self.push(parameter);
                self.push(": ");
                self.write_field(id, Field::Key, Precedence::Conditional);
                self.push("]: ");
                self.write_field(id, Field::Type, Precedence::Conditional);
            }
            NodeKind::MappedType {
                parameter,
                readonly,
                optional,
            } => {
                self.push("{ ");
                if let Some(modifier) = readonly {
                    self.push(modifier.sign());
                    self.push("readonly ");
                }
                self.push("[");
                self.push(parameter);
                self.push(" in ");
                self.write_field(id, Field::Constraint, Precedence::Conditional);
                if tree.child(id, Field::NameType).is_some() {
                    self.push(" as ");
                    self.write_field(id, Field::NameType, Precedence::Conditional);
                }
                self.push("]");
                if let Some(modifier) = optional {
                    self.push(modifier.sign());
                    self.push("?");
                }
                self.push(": ");
                self.write_field(id, Field::Type, Precedence::Conditional);
                self.push(" }");
            }
            NodeKind::TypeQuery { name } => {
                self.push("typeof ");
                self.push(name);
            }
        }
    }
}
