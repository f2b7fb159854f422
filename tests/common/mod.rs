//! Shared helpers for the integration tests.

#![allow(dead_code)]

use tsunroll::engine::{expand_source, ExpandConfig, Expansion};
use tsunroll::syntax::{parser, Field, NodeId, NodeKind, SyntaxTree};
use tsunroll::unroll::{Declaration, Locator, UnrollOptions};
use tsunroll::SourceContext;

pub const STRING_TO_NUMBER: &str = r#"
type ToString<T extends any> = T extends number ? `${T}` : never;

type StringToNumber<T extends string, TTup extends readonly unknown[] = []>
  = T extends ToString<TTup["length"]>
    ? TTup["length"]
    : StringToNumber<T, [number, ...TTup]>;
"#;

pub fn parse(text: &str) -> SyntaxTree {
    parser::parse(text, &SourceContext::from_file("test.ts", text)).unwrap()
}

pub fn declarations(tree: &SyntaxTree) -> Vec<Declaration> {
    Locator::new()
        .find_declarations(tree)
        .into_iter()
        .map(Result::unwrap)
        .collect()
}

pub fn expand_with_depth(text: &str, depth: usize) -> Expansion {
    let config = ExpandConfig {
        options: UnrollOptions::default().with_depth(depth),
        ..ExpandConfig::default()
    };
    expand_source(text, &SourceContext::from_file("test.ts", text), &config).unwrap()
}

pub fn reference_name(tree: &SyntaxTree, id: NodeId) -> Option<&str> {
    match tree.kind(id) {
        NodeKind::TypeReference { name } => Some(name),
        _ => None,
    }
}

/// Counts `number` elements of an accumulator tuple, following nested `...[...]` spreads.
pub fn accumulated_numbers(tree: &SyntaxTree, tuple: NodeId) -> usize {
    let mut count = 0;
    for element in tree.children(tuple, Field::Elements) {
        match tree.kind(*element) {
            NodeKind::Keyword { keyword } if keyword.as_str() == "number" => count += 1,
            NodeKind::RestElement => {
                if let Some(inner) = tree.child(*element, Field::Type) {
                    if tree.kind(inner) == &NodeKind::Tuple {
                        count += accumulated_numbers(tree, inner);
                    }
                }
            }
            _ => {}
        }
    }
    count
}
