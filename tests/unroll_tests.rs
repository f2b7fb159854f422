// End-to-end unrolling through the public API.

mod common;

use common::{accumulated_numbers, declarations, expand_with_depth, parse, reference_name, STRING_TO_NUMBER};
use tsunroll::errors::ErrorType;
use tsunroll::syntax::{Field, NodeKind, Template};
use tsunroll::unroll::{Locator, UnrollOptions, Unroller};

#[test]
fn string_to_number_first_round() {
    let expansion = expand_with_depth(STRING_TO_NUMBER, 1);
    let printed = expansion.printed();
    assert_eq!(
        printed[0],
        "type ToString<T extends any> = T extends number ? `${T}` : never;"
    );
    assert_eq!(
        printed[1],
        "type StringToNumber<T extends string, TTup extends readonly unknown[] = []> = \
         T extends ToString<TTup[\"length\"]> ? TTup[\"length\"] : \
         T extends ToString<[number, ...TTup][\"length\"]> ? [number, ...TTup][\"length\"] : \
         StringToNumber<T, [number, ...[number, ...TTup]]>;"
    );
}

#[test]
fn string_to_number_three_rounds() {
    let expansion = expand_with_depth(STRING_TO_NUMBER, 3);
    let tree = &expansion.tree;
    let declaration = &declarations(tree)[1];
    assert_eq!(declaration.name, "StringToNumber");

    // The original conditional plus one nested copy per round.
    let mut conditionals = Vec::new();
    let mut current = declaration.body(tree).unwrap();
    while tree.kind(current) == &NodeKind::Conditional {
        conditionals.push(current);
        current = tree.child(current, Field::FalseType).unwrap();
    }
    assert_eq!(conditionals.len(), 4);

    // Level k reads the length of an accumulator holding k `number`s.
    for (level, conditional) in conditionals.iter().enumerate() {
        let true_type = tree.child(*conditional, Field::TrueType).unwrap();
        assert_eq!(tree.kind(true_type), &NodeKind::IndexedAccess);
        let accumulator = tree.child(true_type, Field::Object).unwrap();
        if level == 0 {
            assert_eq!(reference_name(tree, accumulator), Some("TTup"));
        } else {
            assert_eq!(accumulated_numbers(tree, accumulator), level, "level {level}");
        }
    }

    // The innermost branch is the only unresolved reference: StringToNumber<T, [number, ...acc3]>.
    assert_eq!(reference_name(tree, current), Some("StringToNumber"));
    let arguments = tree.children(current, Field::Arguments);
    assert_eq!(arguments.len(), 2);
    assert_eq!(reference_name(tree, arguments[0]), Some("T"));
    let tuple = arguments[1];
    let elements = tree.children(tuple, Field::Elements);
    assert_eq!(elements.len(), 2);
    let spread = tree.child(elements[1], Field::Type).unwrap();
    assert_eq!(accumulated_numbers(tree, spread), 3);

    let report = expansion.report_for("StringToNumber").unwrap();
    assert_eq!(report.rounds.len(), 3);
    assert_eq!(report.dangling, 1);
    assert!(report.rounds.iter().all(|r| r.expanded == 1));
}

#[test]
fn non_recursive_declarations_are_untouched() {
    let text = "type Pair<A, B = A> = [A, B];\ntype Keys<T> = { [K in keyof T]: K }[keyof T];";
    let expansion = expand_with_depth(text, 4);
    assert_eq!(
        expansion.printed(),
        [
            "type Pair<A, B = A> = [A, B];",
            "type Keys<T> = { [K in keyof T]: K }[keyof T];"
        ]
    );
}

#[test]
fn zero_depth_is_identity_for_every_declaration() {
    let original = parse(STRING_TO_NUMBER);
    let expansion = expand_with_depth(STRING_TO_NUMBER, 0);
    for (before, after) in declarations(&original).iter().zip(declarations(&expansion.tree)) {
        let before_body = before.body(&original).unwrap();
        let after_body = after.body(&expansion.tree).unwrap();
        assert!(expansion.tree.same_shape(after_body, &original, before_body));
    }
}

#[test]
fn clones_share_no_nodes_with_the_template() {
    let mut tree = parse("type T2<X> = [X, T2<[X]>, T2<X>];");
    let declaration = declarations(&tree).remove(0);
    let original = Template::capture(&tree, declaration.body(&tree).unwrap());
    Unroller::new(UnrollOptions::default().with_depth(2))
        .unroll(&mut tree, &declaration)
        .unwrap();

    let body = declaration.body(&tree).unwrap();
    let nodes = tree.descendants(body);
    let mut seen = std::collections::HashSet::new();
    assert!(nodes.iter().all(|n| seen.insert(*n)), "a node is reachable twice");
    assert!(nodes.iter().all(|n| tree.parent(*n).is_some()));
    assert!(!tree.same_shape(body, original.tree(), original.tree().root()));
}

#[test]
fn missing_argument_reports_and_keeps_going() {
    let text = "type Repeat<S extends string, N extends unknown[]> = N extends [] ? \"\" : `${S}${Repeat<S>}` | Repeat<S, N>;";
    let expansion = expand_with_depth(text, 1);
    let diagnostics: Vec<_> = expansion.diagnostics().collect();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].error_type(), ErrorType::MissingArgument);
    let message = diagnostics[0].to_string();
    assert!(message.contains("`N`"), "{message}");
    assert!(message.contains("Repeat<S>"), "{message}");

    let report = expansion.report_for("Repeat").unwrap();
    assert_eq!(report.rounds[0].expanded, 1);
    assert_eq!(expansion.failures().count(), 0);
}

#[test]
fn every_round_grows_the_body() {
    let mut tree = parse("type Fork<T> = { left: Fork<[T]>; right: Fork<T> } | T;");
    let declaration = declarations(&tree).remove(0);
    let report = Unroller::new(UnrollOptions::default().with_depth(4))
        .unroll(&mut tree, &declaration)
        .unwrap();
    let counts: Vec<usize> = report.rounds.iter().map(|r| r.node_count).collect();
    assert_eq!(counts.len(), 4);
    assert!(counts.windows(2).all(|w| w[1] > w[0]), "{counts:?}");
    assert_eq!(report.dangling, 32);
    let remaining = Locator::new().find_self_references(&tree, declaration.body(&tree).unwrap(), "Fork");
    assert_eq!(remaining.len(), 32);
}
