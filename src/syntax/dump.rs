//! JSON rendering of syntax trees, used by the `ast` command.

use serde_json::{Map, Value};

use crate::syntax::{Child, NodeId, SyntaxTree};

/// Renders the subtree rooted at `id` as nested JSON.
///
/// Each node becomes an object holding its kind tag and scalar data (as
/// serialized from `NodeKind`), its source span when it has one, and one key
/// per child property.
///
/// # Examples
///
/// ```rust
/// use tsunroll::errors::SourceContext;
/// use tsunroll::syntax::{dump::to_json, parser::parse};
///
/// let text = "type A = string;";
/// let tree = parse(text, &SourceContext::from_file("a.ts", text)).unwrap();
/// let json = to_json(&tree, tree.root());
/// assert_eq!(json["statements"][0]["name"], "A");
/// assert_eq!(json["statements"][0]["body"]["keyword"], "string");
/// ```
pub fn to_json(tree: &SyntaxTree, id: NodeId) -> Value {
    let mut object = match serde_json::to_value(tree.kind(id)) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    if let Some(span) = tree.span(id) {
        object.insert("span".into(), serde_json::json!([span.start, span.end]));
    }
    for (field, child) in tree.properties(id) {
        let key = match serde_json::to_value(field) {
            Ok(Value::String(name)) => name,
            _ => format!("{field:?}"),
        };
        let value = match child {
            Child::One(c) => to_json(tree, *c),
            Child::Many(cs) => Value::Array(cs.iter().map(|c| to_json(tree, *c)).collect()),
        };
        object.insert(key, value);
    }
    Value::Object(object)
}

/// Pretty-printed JSON of the whole tree.
pub fn to_json_string(tree: &SyntaxTree) -> String {
    format!("{:#}", to_json(tree, tree.root()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SourceContext;
    use crate::syntax::parser::parse;

    #[test]
    fn properties_become_keys() {
        let text = "type F<T = []> = T extends string ? [T] : never;";
        let tree = parse(text, &SourceContext::from_file("f.ts", text)).unwrap();
        let json = to_json(&tree, tree.root());

        let alias = &json["statements"][0];
        assert_eq!(alias["kind"], "type_alias");
        assert_eq!(alias["exported"], false);
        assert_eq!(alias["parameters"][0]["default"]["kind"], "tuple");
        assert_eq!(alias["body"]["kind"], "conditional");
        assert_eq!(alias["body"]["true_type"]["elements"][0]["name"], "T");
        assert_eq!(alias["span"][0], 0);
    }
}
