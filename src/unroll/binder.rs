//! Parameter binding for one reference.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::syntax::NodeId;
use crate::unroll::locator::Parameter;

/// Substitution table from parameter name to the node it is bound to.
///
/// Bound nodes belong to the live tree (reference arguments or parameter
/// defaults). Callers copy them before inserting; a binding is never spliced
/// in directly. A default may mention earlier parameters, so copies of a
/// defaulted binding must have those names substituted as well.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    map: HashMap<String, NodeId>,
    order: Vec<String>,
    defaulted: HashSet<String>,
}

impl Bindings {
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.map.get(name).copied()
    }

    /// Bound names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.map.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether `name` fell back to its declared default.
    pub fn is_default(&self, name: &str) -> bool {
        self.defaulted.contains(name)
    }

    /// Parameters declared before `name`; the only ones its default can see.
    pub fn earlier(&self, name: &str) -> &[String] {
        let end = self.order.iter().position(|n| n == name).unwrap_or(0);
        &self.order[..end]
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.map.iter().map(|(name, node)| (name.as_str(), *node))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("no argument or default for type parameter `{parameter}` (position {position})")]
    MissingArgument { parameter: String, position: usize },
}

/// Binds each parameter to the argument at its position, or to its default.
///
/// Arguments past the end of the parameter list are ignored. Fails on the
/// first parameter that has neither an argument nor a default; no partial
/// table is returned.
pub fn bind(parameters: &[Parameter], arguments: &[NodeId]) -> Result<Bindings, BindError> {
    let mut bindings = Bindings::default();
    for (position, parameter) in parameters.iter().enumerate() {
        let value = match (arguments.get(position), parameter.default) {
            (Some(argument), _) => *argument,
            (None, Some(default)) => {
                bindings.defaulted.insert(parameter.name.clone());
                default
            }
            (None, None) => {
                return Err(BindError::MissingArgument {
                    parameter: parameter.name.clone(),
                    position,
                });
            }
        };
        bindings.map.insert(parameter.name.clone(), value);
        bindings.order.push(parameter.name.clone());
    }
    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SourceContext;
    use crate::syntax::{parser::parse, Field, NodeKind, SyntaxTree};
    use crate::unroll::locator::Locator;

    /// Parameters of `Name` and the arguments of the first reference in its body.
    fn fixture(text: &str) -> (SyntaxTree, Vec<Parameter>, Vec<NodeId>) {
        let tree = parse(text, &SourceContext::from_file("b.ts", text)).unwrap();
        let locator = Locator::new();
        let declaration = locator
            .find_declarations(&tree)
            .into_iter()
            .next()
            .unwrap()
            .unwrap();
        let body = declaration.body(&tree).unwrap();
        let reference = locator
            .find_self_references(&tree, body, &declaration.name)
            .into_iter()
            .next()
            .unwrap();
        (tree, declaration.parameters, reference.arguments)
    }

    #[test]
    fn default_fills_missing_argument() {
        let (tree, parameters, arguments) =
            fixture("type Name<T, TTup = []> = T extends \"0\" ? TTup : Name<\"2\">;");
        let bindings = bind(&parameters, &arguments).unwrap();

        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings.names(), vec!["T".to_string(), "TTup".to_string()]);
        let t = bindings.get("T").unwrap();
        assert_eq!(t, arguments[0]);
        assert_eq!(
            tree.kind(t),
            &NodeKind::StringLiteral {
                text: "\"2\"".into()
            }
        );
        let ttup = bindings.get("TTup").unwrap();
        assert_eq!(Some(ttup), parameters[1].default);
        assert_eq!(tree.kind(ttup), &NodeKind::Tuple);
        assert!(tree.children(ttup, Field::Elements).is_empty());
    }

    #[test]
    fn binding_is_idempotent() {
        let (_, parameters, arguments) = fixture("type Name<A, B = A> = Name<string, number>;");
        let first = bind(&parameters, &arguments).unwrap();
        let second = bind(&parameters, &arguments).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn defaults_are_marked_and_see_earlier_parameters() {
        let (_, parameters, arguments) = fixture("type F<A, B = A, C = B> = F<string>;");
        let bindings = bind(&parameters, &arguments).unwrap();
        assert!(!bindings.is_default("A"));
        assert!(bindings.is_default("B"));
        assert!(bindings.is_default("C"));
        assert!(bindings.earlier("A").is_empty());
        assert_eq!(bindings.earlier("C"), ["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn missing_argument_names_the_parameter() {
        let (_, parameters, arguments) = fixture("type Pair<A, B> = [A, Pair<A>];");
        let err = bind(&parameters, &arguments).unwrap_err();
        assert_eq!(
            err,
            BindError::MissingArgument {
                parameter: "B".into(),
                position: 1
            }
        );
    }

    #[test]
    fn extra_arguments_are_ignored() {
        let (_, parameters, arguments) = fixture("type One<A> = One<1, 2, 3>;");
        let bindings = bind(&parameters, &arguments).unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings.get("A"), Some(arguments[0]));
    }

    #[test]
    fn no_parameters_binds_nothing() {
        let bindings = bind(&[], &[]).unwrap();
        assert!(bindings.is_empty());
        assert_eq!(bindings.iter().count(), 0);
    }
}
