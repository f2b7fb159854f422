//! Multi-round expansion of one declaration.
//!
//! Per round: find the self-references currently in the body, and for each
//! one instantiate the template, bind its parameter usages to copies of the
//! reference's arguments, then splice the bound copy over the reference.
//! Binding finishes before splicing, so no usage is looked up under a parent
//! that has already moved.

use std::collections::HashSet;

use tracing::{debug, info, trace, warn};

use crate::errors::{ErrorContext, UnrollError};
use crate::syntax::{printer, NodeId, SyntaxTree, Template};
use crate::unroll::binder::{bind, BindError, Bindings};
use crate::unroll::locator::{Declaration, Locator, PreorderQuery, QueryEngine, Reference};

/// Rounds applied when no depth is configured.
pub const DEFAULT_DEPTH: usize = 3;

// ============================================================================
// OPTIONS AND REPORTING
// ============================================================================

#[derive(Debug, Clone)]
pub struct UnrollOptions {
    /// Number of rounds.
    pub depth: usize,
    /// Upper bound on the body's node count.
    pub max_nodes: Option<usize>,
    /// Replaces self-references left after the last round. `None` leaves them dangling.
    pub fallback: Option<Template>,
}

impl Default for UnrollOptions {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            max_nodes: None,
            fallback: None,
        }
    }
}

impl UnrollOptions {
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundStats {
    /// 1-based round number.
    pub round: usize,
    /// References replaced during the round.
    pub expanded: usize,
    /// Body size once the round finished.
    pub node_count: usize,
}

/// Outcome of unrolling one declaration.
#[derive(Debug, Default)]
pub struct UnrollReport {
    pub name: String,
    pub rounds: Vec<RoundStats>,
    /// Non-fatal problems, one per skipped reference.
    pub diagnostics: Vec<UnrollError>,
    /// Self-references still present in the body.
    pub dangling: usize,
    /// Self-references replaced by the fallback type.
    pub fallbacks: usize,
}

impl UnrollReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn expanded(&self) -> usize {
        self.rounds.iter().map(|r| r.expanded).sum()
    }
}

/// Receives the tree between rounds (used by the `trace` command).
pub trait RoundObserver {
    fn started(&mut self, _tree: &SyntaxTree, _declaration: &Declaration) {}
    fn round_finished(&mut self, _tree: &SyntaxTree, _declaration: &Declaration, _stats: &RoundStats) {}
}

impl RoundObserver for () {}

// ============================================================================
// UNROLLER
// ============================================================================

/// State of one declaration's expansion.
struct Run<'a> {
    declaration: &'a Declaration,
    template: Template,
    node_count: usize,
    /// References that cannot be bound; reported once, then left alone.
    unbindable: HashSet<NodeId>,
    report: UnrollReport,
}

#[derive(Debug, Default, Clone)]
pub struct Unroller<Q = PreorderQuery> {
    locator: Locator<Q>,
    options: UnrollOptions,
}

impl Unroller<PreorderQuery> {
    pub fn new(options: UnrollOptions) -> Self {
        Self {
            locator: Locator::new(),
            options,
        }
    }
}

impl<Q: QueryEngine> Unroller<Q> {
    pub fn with_locator(locator: Locator<Q>, options: UnrollOptions) -> Self {
        Self { locator, options }
    }

    /// Unrolls `declaration` in place.
    ///
    /// On a fatal error the body is restored to its original shape before
    /// the error is returned.
    pub fn unroll(
        &self,
        tree: &mut SyntaxTree,
        declaration: &Declaration,
    ) -> Result<UnrollReport, UnrollError> {
        self.unroll_observed(tree, declaration, &mut ())
    }

    pub fn unroll_observed(
        &self,
        tree: &mut SyntaxTree,
        declaration: &Declaration,
        observer: &mut dyn RoundObserver,
    ) -> Result<UnrollReport, UnrollError> {
        let body = declaration.body(tree)?;
        let mut run = Run {
            declaration,
            template: Template::capture(tree, body),
            node_count: tree.subtree_size(body),
            unbindable: HashSet::new(),
            report: UnrollReport::new(&declaration.name),
        };
        info!(
            declaration = %declaration.name,
            depth = self.options.depth,
            nodes = run.node_count,
            "unrolling"
        );
        observer.started(tree, declaration);

        match self.run_rounds(tree, &mut run, observer) {
            Ok(()) => Ok(run.report),
            Err(err) => {
                warn!(declaration = %declaration.name, error = %err, "restoring original body");
                if let Err(restore) = restore(tree, declaration, &run.template) {
                    warn!(declaration = %declaration.name, error = %restore, "restore failed");
                }
                Err(err)
            }
        }
    }

    fn run_rounds(
        &self,
        tree: &mut SyntaxTree,
        run: &mut Run<'_>,
        observer: &mut dyn RoundObserver,
    ) -> Result<(), UnrollError> {
        let declaration = run.declaration;

        for round in 1..=self.options.depth {
            let body = declaration.body(tree)?;
            let references = self
                .locator
                .find_self_references(tree, body, &declaration.name);
            trace!(round, found = references.len(), "round start");

            let mut expanded = 0;
            for reference in references {
                if run.unbindable.contains(&reference.node) {
                    continue;
                }
                // Nested in the arguments of a reference replaced earlier this round.
                if !tree.is_within(reference.node, declaration.node) {
                    trace!(node = reference.node.index(), "skipping detached reference");
                    continue;
                }
                if self.expand_reference(tree, run, &reference)? {
                    expanded += 1;
                }
            }

            let stats = RoundStats {
                round,
                expanded,
                node_count: run.node_count,
            };
            debug!(declaration = %declaration.name, round, expanded, nodes = run.node_count, "round finished");
            observer.round_finished(tree, declaration, &stats);
            run.report.rounds.push(stats);

            if expanded == 0 {
                debug!(declaration = %declaration.name, round, "nothing left to expand");
                break;
            }
        }

        self.finish(tree, run)
    }

    /// Replaces one reference with a bound copy of the template.
    ///
    /// Returns `Ok(false)` when the reference was skipped.
    fn expand_reference(
        &self,
        tree: &mut SyntaxTree,
        run: &mut Run<'_>,
        reference: &Reference,
    ) -> Result<bool, UnrollError> {
        let declaration = run.declaration;
        let bindings = match bind(&declaration.parameters, &reference.arguments) {
            Ok(bindings) => bindings,
            Err(BindError::MissingArgument { parameter, .. }) => {
                let err = UnrollError::MissingArgument {
                    declaration: declaration.name.clone(),
                    parameter,
                    reference: printer::print_node(tree, reference.node),
                    ctx: ErrorContext::at(tree.span(reference.node)).with_help(
                        "pass the argument explicitly or give the parameter a default",
                    ),
                };
                warn!(declaration = %declaration.name, "{err}; reference left in place");
                run.unbindable.insert(reference.node);
                run.report.diagnostics.push(err);
                return Ok(false);
            }
        };

        reserve(tree, run, run.template.size())?;
        let clone = tree.instantiate(&run.template);
        let clone = self.bind_clone(tree, clone, &bindings, run)?;

        let added = tree.subtree_size(clone);
        let removed = tree.subtree_size(reference.node);
        self.grow(run, added, removed)?;

        if !tree.replace(reference.node, clone) {
            return Err(target_not_found(tree, declaration, reference.node));
        }
        debug!(
            declaration = %declaration.name,
            node = reference.node.index(),
            added,
            removed,
            "expanded reference"
        );
        Ok(true)
    }

    /// Substitutes copies of the bound values for every parameter usage in `clone`.
    ///
    /// Returns the clone's root, which changes when the template body is a
    /// bare parameter.
    fn bind_clone(
        &self,
        tree: &mut SyntaxTree,
        clone: NodeId,
        bindings: &Bindings,
        run: &Run<'_>,
    ) -> Result<NodeId, UnrollError> {
        let usages = self
            .locator
            .find_parameter_usages(tree, clone, &bindings.names());
        let mut root = clone;
        for usage in usages {
            let Some(copy) = self.bound_copy(tree, &usage.name, bindings, run)? else {
                continue;
            };
            if usage.node == root {
                root = copy;
                continue;
            }
            if !tree.replace(usage.node, copy) {
                return Err(target_not_found(tree, run.declaration, usage.node));
            }
        }
        Ok(root)
    }

    /// Copies the value bound to `name`. A copied default has the earlier
    /// parameters it mentions substituted in turn.
    fn bound_copy(
        &self,
        tree: &mut SyntaxTree,
        name: &str,
        bindings: &Bindings,
        run: &Run<'_>,
    ) -> Result<Option<NodeId>, UnrollError> {
        let Some(value) = bindings.get(name) else {
            return Ok(None);
        };
        reserve(tree, run, tree.subtree_size(value))?;
        let copy = tree.deep_clone(value);
        if !bindings.is_default(name) {
            return Ok(Some(copy));
        }

        let usages = self
            .locator
            .find_parameter_usages(tree, copy, bindings.earlier(name));
        let mut root = copy;
        for usage in usages {
            let Some(inner) = self.bound_copy(tree, &usage.name, bindings, run)? else {
                continue;
            };
            if usage.node == root {
                root = inner;
                continue;
            }
            if !tree.replace(usage.node, inner) {
                return Err(target_not_found(tree, run.declaration, usage.node));
            }
        }
        Ok(Some(root))
    }

    /// Handles the self-references left after the last round.
    fn finish(&self, tree: &mut SyntaxTree, run: &mut Run<'_>) -> Result<(), UnrollError> {
        let declaration = run.declaration;
        let body = declaration.body(tree)?;
        let remaining = self
            .locator
            .find_self_references(tree, body, &declaration.name);

        let Some(fallback) = &self.options.fallback else {
            run.report.dangling = remaining.len();
            if !remaining.is_empty() {
                debug!(declaration = %declaration.name, dangling = remaining.len(), "depth limit reached");
            }
            return Ok(());
        };

        for reference in remaining {
            if !tree.is_within(reference.node, declaration.node) {
                continue;
            }
            reserve(tree, run, fallback.size())?;
            let replacement = tree.instantiate(fallback);
            let removed = tree.subtree_size(reference.node);
            self.grow(run, fallback.size(), removed)?;
            if !tree.replace(reference.node, replacement) {
                return Err(target_not_found(tree, declaration, reference.node));
            }
            run.report.fallbacks += 1;
        }
        if run.report.fallbacks > 0 {
            debug!(
                declaration = %declaration.name,
                replaced = run.report.fallbacks,
                fallback = %printer::print_template(fallback),
                "applied fallback"
            );
        }
        Ok(())
    }

    /// Applies a size change to the running count, enforcing `max_nodes`.
    fn grow(&self, run: &mut Run<'_>, added: usize, removed: usize) -> Result<(), UnrollError> {
        let next = (run.node_count + added).saturating_sub(removed);
        if let Some(limit) = self.options.max_nodes {
            if next > limit {
                return Err(UnrollError::NodeLimitExceeded {
                    declaration: run.declaration.name.clone(),
                    limit,
                    reached: next,
                    ctx: ErrorContext::at(None)
                        .with_help("lower --depth or raise --max-nodes"),
                });
            }
        }
        run.node_count = next;
        Ok(())
    }
}

fn target_not_found(tree: &SyntaxTree, declaration: &Declaration, node: NodeId) -> UnrollError {
    UnrollError::SubstitutionTargetNotFound {
        declaration: declaration.name.clone(),
        target: printer::print_node(tree, node),
        ctx: ErrorContext::at(tree.span(node)),
    }
}

/// Fails once the arena could no longer hand out distinct node ids. Room for
/// one more copy of the template is kept so a failed run can still restore.
fn reserve(tree: &SyntaxTree, run: &Run<'_>, additional: usize) -> Result<(), UnrollError> {
    if tree.has_room(additional.saturating_add(run.template.size())) {
        return Ok(());
    }
    Err(UnrollError::NodeLimitExceeded {
        declaration: run.declaration.name.clone(),
        limit: NodeId::LIMIT,
        reached: run.node_count.saturating_add(additional),
        ctx: ErrorContext::at(None).with_help("lower --depth or set --max-nodes"),
    })
}

/// Puts a fresh copy of the original body back into the declaration.
fn restore(
    tree: &mut SyntaxTree,
    declaration: &Declaration,
    template: &Template,
) -> Result<(), UnrollError> {
    let current = declaration.body(tree)?;
    let original = tree.instantiate(template);
    if tree.replace(current, original) {
        Ok(())
    } else {
        Err(target_not_found(tree, declaration, current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorType, SourceContext};
    use crate::syntax::parser::{parse, parse_type};
    use crate::syntax::printer::print_node;
    use crate::syntax::{Field, NodeKind};

    struct Fixture {
        tree: SyntaxTree,
        declarations: Vec<Declaration>,
    }

    impl Fixture {
        fn new(text: &str) -> Self {
            let tree = parse(text, &SourceContext::from_file("u.ts", text)).unwrap();
            let declarations = Locator::new()
                .find_declarations(&tree)
                .into_iter()
                .map(Result::unwrap)
                .collect();
            Self { tree, declarations }
        }

        fn unroll(&mut self, index: usize, options: UnrollOptions) -> Result<UnrollReport, UnrollError> {
            let declaration = self.declarations[index].clone();
            Unroller::new(options).unroll(&mut self.tree, &declaration)
        }

        fn printed(&self, index: usize) -> String {
            print_node(&self.tree, self.declarations[index].node)
        }

        fn body(&self, index: usize) -> NodeId {
            self.declarations[index].body(&self.tree).unwrap()
        }

        fn self_references(&self, index: usize) -> Vec<Reference> {
            let name = &self.declarations[index].name;
            Locator::new().find_self_references(&self.tree, self.body(index), name)
        }
    }

    fn depth(n: usize) -> UnrollOptions {
        UnrollOptions::default().with_depth(n)
    }

    const LIST: &str = "type List<T> = { value: T; next: List<T> | null };";

    #[test]
    fn zero_rounds_leave_body_unchanged() {
        let mut fx = Fixture::new(LIST);
        let before = Template::capture(&fx.tree, fx.body(0));
        let report = fx.unroll(0, depth(0)).unwrap();
        assert!(report.rounds.is_empty());
        assert_eq!(report.dangling, 1);
        assert!(fx.tree.same_shape(fx.body(0), before.tree(), before.tree().root()));
    }

    #[test]
    fn non_recursive_body_is_unchanged() {
        let mut fx = Fixture::new("type Box<T> = { value: T; other: Unrelated<T> };");
        let before = fx.printed(0);
        let report = fx.unroll(0, depth(5)).unwrap();
        assert_eq!(fx.printed(0), before);
        assert_eq!(report.expanded(), 0);
        assert_eq!(report.rounds.len(), 1, "stops after the first empty round");
    }

    #[test]
    fn defaults_resolve_earlier_parameters() {
        let mut fx = Fixture::new("type F<A, B = A> = [B, F<string>];");
        fx.unroll(0, depth(1)).unwrap();
        assert_eq!(fx.printed(0), "type F<A, B = A> = [B, [string, F<string>]];");

        let mut fx = Fixture::new("type G<A, B = A[], C = [B]> = C | G<number>;");
        fx.unroll(0, depth(1)).unwrap();
        assert_eq!(fx.printed(0), "type G<A, B = A[], C = [B]> = C | [number[]] | G<number>;");
    }

    #[test]
    fn single_reference_ends_at_depth_n() {
        for n in 0..5 {
            let mut fx = Fixture::new(LIST);
            fx.unroll(0, depth(n)).unwrap();
            let remaining = fx.self_references(0);
            assert_eq!(remaining.len(), 1, "depth {n}");

            let body = fx.body(0);
            let mut nesting = 0;
            let mut current = remaining[0].node;
            while let Some(parent) = fx.tree.parent(current) {
                if parent == body {
                    break;
                }
                if fx.tree.kind(parent) == &NodeKind::TypeLiteral {
                    nesting += 1;
                }
                current = parent;
            }
            assert_eq!(nesting, n, "depth {n}");
        }
    }

    #[test]
    fn list_prints_nested_copies() {
        let mut fx = Fixture::new(LIST);
        fx.unroll(0, depth(2)).unwrap();
        assert_eq!(
            fx.printed(0),
            "type List<T> = { value: T; next: { value: T; next: { value: T; next: List<T> | null } | null } | null };"
        );
    }

    #[test]
    fn parameter_usages_get_fresh_copies() {
        let mut fx = Fixture::new("type Name<T, TTup = []> = T extends \"0\" ? TTup : Name<\"2\">;");
        let argument = fx.self_references(0)[0].arguments[0];
        let argument_copy = Template::capture(&fx.tree, argument);
        fx.unroll(0, depth(1)).unwrap();

        let inner = fx.tree.child(fx.body(0), Field::FalseType).unwrap();
        assert_eq!(fx.tree.kind(inner), &NodeKind::Conditional);
        let check = fx.tree.child(inner, Field::Check).unwrap();
        assert_ne!(check, argument);
        assert!(fx.tree.same_shape(check, argument_copy.tree(), argument_copy.tree().root()));

        let true_type = fx.tree.child(inner, Field::TrueType).unwrap();
        let default = fx.declarations[0].parameters[1].default.unwrap();
        assert_ne!(true_type, default);
        assert!(fx.tree.same_shape(true_type, &fx.tree, default));
        assert_eq!(
            fx.printed(0),
            "type Name<T, TTup = []> = T extends \"0\" ? TTup : \"2\" extends \"0\" ? [] : Name<\"2\">;"
        );
    }

    #[test]
    fn node_count_grows_every_round() {
        let mut fx = Fixture::new("type Tree<T> = [T, Tree<T>, Tree<T>];");
        let report = fx.unroll(0, depth(3)).unwrap();
        let counts: Vec<usize> = report.rounds.iter().map(|r| r.node_count).collect();
        assert_eq!(report.rounds.iter().map(|r| r.expanded).collect::<Vec<_>>(), [2, 4, 8]);
        assert!(counts.windows(2).all(|w| w[1] > w[0]), "{counts:?}");
        assert_eq!(*counts.last().unwrap(), fx.tree.subtree_size(fx.body(0)));
    }

    #[test]
    fn missing_argument_skips_only_that_reference() {
        let mut fx = Fixture::new("type P<A, B> = [P<A>, P<A, B>];");
        let report = fx.unroll(0, depth(1)).unwrap();
        assert_eq!(report.diagnostics.len(), 1);
        let err = &report.diagnostics[0];
        assert_eq!(err.error_type(), ErrorType::MissingArgument);
        assert!(err.to_string().contains("`B`"));
        assert_eq!(report.rounds[0].expanded, 1);
        assert_eq!(
            fx.printed(0),
            "type P<A, B> = [P<A>, [P<A>, P<A, B>]];"
        );
    }

    #[test]
    fn missing_argument_is_reported_once() {
        let mut fx = Fixture::new("type P<A, B> = P<A>;");
        let report = fx.unroll(0, depth(4)).unwrap();
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.rounds.len(), 1);
        assert_eq!(report.dangling, 1);
    }

    #[test]
    fn nested_reference_in_arguments_is_expanded_next_round() {
        let mut fx = Fixture::new("type F<T> = [T, F<F<T>>];");
        let report = fx.unroll(0, depth(1)).unwrap();
        assert_eq!(report.rounds[0].expanded, 1);
        assert_eq!(fx.printed(0), "type F<T> = [T, [F<T>, F<F<F<T>>>]];");
    }

    #[test]
    fn body_that_is_a_reference_is_replaced() {
        let mut fx = Fixture::new("type Loop<T> = Loop<[T]>;");
        fx.unroll(0, depth(2)).unwrap();
        assert_eq!(fx.printed(0), "type Loop<T> = Loop<[[[T]]]>;");
    }

    #[test]
    fn nested_unions_print_flat() {
        let mut fx = Fixture::new("type Id<T> = T | Id<string>;");
        fx.unroll(0, depth(1)).unwrap();
        assert_eq!(fx.printed(0), "type Id<T> = T | string | Id<string>;");
    }

    #[test]
    fn substituted_union_gets_parentheses() {
        let mut fx = Fixture::new("type Arr<T> = T[] | Arr<A | B>;");
        fx.unroll(0, depth(1)).unwrap();
        assert_eq!(fx.printed(0), "type Arr<T> = T[] | (A | B)[] | Arr<A | B>;");
    }

    #[test]
    fn fallback_replaces_remaining_references() {
        let text = "never";
        let fallback = parse_type(text, &SourceContext::from_file("--fallback", text)).unwrap();
        let mut fx = Fixture::new(LIST);
        let options = UnrollOptions {
            fallback: Some(fallback),
            ..depth(1)
        };
        let report = fx.unroll(0, options).unwrap();
        assert_eq!(report.fallbacks, 1);
        assert_eq!(report.dangling, 0);
        assert_eq!(
            fx.printed(0),
            "type List<T> = { value: T; next: { value: T; next: never | null } | null };"
        );
    }

    #[test]
    fn node_limit_restores_original_body() {
        let mut fx = Fixture::new("type Tree<T> = [T, Tree<T>, Tree<T>];");
        let before = fx.printed(0);
        let options = UnrollOptions {
            max_nodes: Some(40),
            ..depth(5)
        };
        let err = fx.unroll(0, options).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NodeLimitExceeded);
        assert_eq!(fx.printed(0), before);
    }

    #[test]
    fn observer_sees_every_round() {
        #[derive(Default)]
        struct Snapshots(Vec<String>);
        impl RoundObserver for Snapshots {
            fn started(&mut self, tree: &SyntaxTree, declaration: &Declaration) {
                self.0.push(print_node(tree, declaration.node));
            }
            fn round_finished(&mut self, tree: &SyntaxTree, declaration: &Declaration, _: &RoundStats) {
                self.0.push(print_node(tree, declaration.node));
            }
        }

        let mut fx = Fixture::new(LIST);
        let declaration = fx.declarations[0].clone();
        let mut snapshots = Snapshots::default();
        Unroller::with_locator(Locator::with_engine(PreorderQuery), depth(3))
            .unroll_observed(&mut fx.tree, &declaration, &mut snapshots)
            .unwrap();
        assert_eq!(snapshots.0.len(), 4);
        assert!(snapshots.0.windows(2).all(|w| w[1].len() > w[0].len()));
    }
}
