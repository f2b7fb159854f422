//! tsunroll parser.
//!
//! Converts source text into a [`SyntaxTree`] with source spans. The parser is
//! purely syntactic: names are not resolved and types are not checked.

use pest::{
    error::{Error, InputLocation},
    iterators::Pair,
    Parser,
};
use pest_derive::Parser;

use crate::errors::{parse_error, SourceContext, UnrollError};
use crate::syntax::{
    Field, Keyword, MappedModifier, NodeId, NodeKind, Span, SyntaxTree, Template, TypeOperator,
};

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct TypeAliasParser;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parses a file of type-alias declarations.
///
/// The returned tree's root is a `SourceFile` whose `statements` hold one
/// `TypeAlias` node per declaration, in source order.
pub fn parse(source_text: &str, source: &SourceContext) -> Result<SyntaxTree, UnrollError> {
    let mut pairs = TypeAliasParser::parse(Rule::program, source_text)
        .map_err(|e| convert_parse_error(e, source))?;
    let program = pairs.next().ok_or_else(|| {
        parse_error("empty parse result", Span::default(), source)
    })?;

    let mut builder = Builder::new(
        NodeKind::SourceFile,
        span_of(&program),
        source,
    );
    let mut statements = Vec::new();
    for pair in program.into_inner() {
        if pair.as_rule() == Rule::type_alias {
            statements.push(builder.build_alias(pair)?);
        }
    }
    let root = builder.tree.root();
    builder.tree.set_children(root, Field::Statements, statements);
    Ok(builder.tree)
}

/// Parses a single type expression into a standalone [`Template`].
pub fn parse_type(text: &str, source: &SourceContext) -> Result<Template, UnrollError> {
    let mut pairs = TypeAliasParser::parse(Rule::single_type, text)
        .map_err(|e| convert_parse_error(e, source))?;
    let single = pairs.next().ok_or_else(|| {
        parse_error("empty parse result", Span::default(), source)
    })?;
    let span = span_of(&single);
    let expr = single
        .into_inner()
        .find(|p| p.as_rule() == Rule::type_expr)
        .ok_or_else(|| parse_error("expected a type", span, source))?;

    let mut builder = Builder::new(NodeKind::SourceFile, span, source);
    let node = builder.build_type(expr)?;
    Ok(Template::capture(&builder.tree, node))
}

// ============================================================================
// TREE BUILDER
// ============================================================================

struct Builder<'s> {
    tree: SyntaxTree,
    source: &'s SourceContext,
}

impl<'s> Builder<'s> {
    fn new(root: NodeKind, span: Span, source: &'s SourceContext) -> Self {
        Self {
            tree: SyntaxTree::new(root, Some(span)),
            source,
        }
    }

    fn node(&mut self, kind: NodeKind, span: Span) -> NodeId {
        self.tree.alloc(kind, Some(span))
    }

    fn malformed(&self, what: &str, span: Span) -> UnrollError {
        parse_error(format!("malformed {what}"), span, self.source)
    }

    // ------------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------------

    fn build_alias(&mut self, pair: Pair<Rule>) -> Result<NodeId, UnrollError> {
        let span = span_of(&pair);
        let mut exported = false;
        let mut name = None;
        let mut parameters = Vec::new();
        let mut body = None;

        for item in significant(pair) {
            match item.as_rule() {
                Rule::export_kw => exported = true,
                Rule::identifier => name = Some(item.as_str().to_string()),
                Rule::type_params => {
                    for param in item.into_inner() {
                        parameters.push(self.build_type_param(param)?);
                    }
                }
                Rule::type_expr => body = Some(self.build_type(item)?),
                _ => {}
            }
        }

        let name = name.ok_or_else(|| self.malformed("type alias name", span))?;
        let body = body.ok_or_else(|| self.malformed("type alias body", span))?;
        let alias = self.node(NodeKind::TypeAlias { name, exported }, span);
        self.tree.set_children(alias, Field::Parameters, parameters);
        self.tree.set_child(alias, Field::Body, body);
        Ok(alias)
    }

    fn build_type_param(&mut self, pair: Pair<Rule>) -> Result<NodeId, UnrollError> {
        let span = span_of(&pair);
        let mut name = None;
        let mut constraint = None;
        let mut default = None;

        for item in significant(pair) {
            match item.as_rule() {
                Rule::identifier => name = Some(item.as_str().to_string()),
                Rule::param_constraint => constraint = Some(self.build_only_type(item)?),
                Rule::param_default => default = Some(self.build_only_type(item)?),
                _ => {}
            }
        }

        let name = name.ok_or_else(|| self.malformed("type parameter", span))?;
        let param = self.node(NodeKind::TypeParameter { name }, span);
        if let Some(constraint) = constraint {
            self.tree.set_child(param, Field::Constraint, constraint);
        }
        if let Some(default) = default {
            self.tree.set_child(param, Field::Default, default);
        }
        Ok(param)
    }

    // ------------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------------

    /// Builds the single type expression nested inside `pair`.
    fn build_only_type(&mut self, pair: Pair<Rule>) -> Result<NodeId, UnrollError> {
        let span = span_of(&pair);
        let inner = significant(pair)
            .into_iter()
            .next()
            .ok_or_else(|| self.malformed("type", span))?;
        self.build_type(inner)
    }

    fn build_type(&mut self, pair: Pair<Rule>) -> Result<NodeId, UnrollError> {
        let span = span_of(&pair);
        match pair.as_rule() {
            Rule::type_expr => self.build_conditional(pair),
            Rule::union_type => self.build_list(pair, NodeKind::Union),
            Rule::intersection_type => self.build_list(pair, NodeKind::Intersection),
            Rule::operator_type => self.build_operator(pair),
            Rule::infer_type => {
                let name = significant(pair)
                    .into_iter()
                    .find(|p| p.as_rule() == Rule::identifier)
                    .map(|p| p.as_str().to_string())
                    .ok_or_else(|| self.malformed("infer type", span))?;
                Ok(self.node(NodeKind::Infer { name }, span))
            }
            Rule::postfix_type => self.build_postfix(pair),
            Rule::parenthesized => {
                let inner = self.build_only_type(pair)?;
                let node = self.node(NodeKind::Parenthesized, span);
                self.tree.set_child(node, Field::Inner, inner);
                Ok(node)
            }
            Rule::tuple_type => {
                let mut elements = Vec::new();
                for element in significant(pair) {
                    elements.push(self.build_tuple_element(element)?);
                }
                let node = self.node(NodeKind::Tuple, span);
                self.tree.set_children(node, Field::Elements, elements);
                Ok(node)
            }
            Rule::mapped_type => self.build_mapped(pair),
            Rule::type_literal => {
                let mut members = Vec::new();
                for member in significant(pair) {
                    members.push(self.build_member(member)?);
                }
                let node = self.node(NodeKind::TypeLiteral, span);
                self.tree.set_children(node, Field::Members, members);
                Ok(node)
            }
            Rule::template_literal => self.build_template(pair),
            Rule::string_literal => {
                let text = pair.as_str().to_string();
                Ok(self.node(NodeKind::StringLiteral { text }, span))
            }
            Rule::number_literal => Ok(self.node(
                NodeKind::NumberLiteral {
                    text: pair.as_str().to_string(),
                },
                span,
            )),
            Rule::keyword_type => {
                let keyword = Keyword::lookup(pair.as_str())
                    .ok_or_else(|| self.malformed("keyword type", span))?;
                Ok(self.node(NodeKind::Keyword { keyword }, span))
            }
            Rule::type_query => {
                let name = significant(pair)
                    .into_iter()
                    .find(|p| p.as_rule() == Rule::entity_name)
                    .map(|p| p.as_str().to_string())
                    .ok_or_else(|| self.malformed("typeof query", span))?;
                Ok(self.node(NodeKind::TypeQuery { name }, span))
            }
            Rule::type_reference => self.build_reference(pair),
            rule => Err(self.malformed(&format!("type (unexpected {rule:?})"), span)),
        }
    }

    fn build_conditional(&mut self, pair: Pair<Rule>) -> Result<NodeId, UnrollError> {
        let span = span_of(&pair);
        let parts = significant(pair);
        if parts.len() == 1 {
            let only = parts.into_iter().next().ok_or_else(|| self.malformed("type", span))?;
            return self.build_type(only);
        }
        if parts.len() != 4 {
            return Err(self.malformed("conditional type", span));
        }

        let mut built = Vec::with_capacity(4);
        for part in parts {
            built.push(self.build_type(part)?);
        }
        let node = self.node(NodeKind::Conditional, span);
        let fields = [Field::Check, Field::Extends, Field::TrueType, Field::FalseType];
        for (field, child) in fields.into_iter().zip(built) {
            self.tree.set_child(node, field, child);
        }
        Ok(node)
    }

    /// Union and intersection: a single operand collapses to itself.
    fn build_list(&mut self, pair: Pair<Rule>, kind: NodeKind) -> Result<NodeId, UnrollError> {
        let span = span_of(&pair);
        let mut members = Vec::new();
        for member in significant(pair) {
            members.push(self.build_type(member)?);
        }
        if members.len() == 1 {
            return Ok(members[0]);
        }
        let node = self.node(kind, span);
        self.tree.set_children(node, Field::Members, members);
        Ok(node)
    }

    fn build_operator(&mut self, pair: Pair<Rule>) -> Result<NodeId, UnrollError> {
        let span = span_of(&pair);
        let mut parts = significant(pair).into_iter();
        let first = parts.next().ok_or_else(|| self.malformed("type", span))?;
        if first.as_rule() != Rule::type_operator {
            return self.build_type(first);
        }

        let operator = match first.into_inner().next().map(|p| p.as_rule()) {
            Some(Rule::keyof_kw) => TypeOperator::Keyof,
            Some(Rule::readonly_kw) => TypeOperator::Readonly,
            Some(Rule::unique_kw) => TypeOperator::Unique,
            _ => return Err(self.malformed("type operator", span)),
        };
        let operand = parts
            .next()
            .ok_or_else(|| self.malformed("type operator operand", span))?;
        let operand = self.build_type(operand)?;
        let node = self.node(NodeKind::TypeOperator { operator }, span);
        self.tree.set_child(node, Field::Operand, operand);
        Ok(node)
    }

    fn build_postfix(&mut self, pair: Pair<Rule>) -> Result<NodeId, UnrollError> {
        let start = pair.as_span().start();
        let mut parts = significant(pair).into_iter();
        let primary = parts
            .next()
            .ok_or_else(|| self.malformed("type", Span { start, end: start }))?;
        let mut current = self.build_type(primary)?;

        for suffix in parts {
            let span = Span {
                start,
                end: suffix.as_span().end(),
            };
            match suffix.as_rule() {
                Rule::array_suffix => {
                    let node = self.node(NodeKind::Array, span);
                    self.tree.set_child(node, Field::Element, current);
                    current = node;
                }
                Rule::index_suffix => {
                    let index = self.build_only_type(suffix)?;
                    let node = self.node(NodeKind::IndexedAccess, span);
                    self.tree.set_child(node, Field::Object, current);
                    self.tree.set_child(node, Field::Index, index);
                    current = node;
                }
                _ => return Err(self.malformed("postfix type", span)),
            }
        }
        Ok(current)
    }

    fn build_tuple_element(&mut self, pair: Pair<Rule>) -> Result<NodeId, UnrollError> {
        let span = span_of(&pair);
        match pair.as_rule() {
            Rule::rest_element => {
                let inner = self.build_only_type(pair)?;
                let node = self.node(NodeKind::RestElement, span);
                self.tree.set_child(node, Field::Type, inner);
                Ok(node)
            }
            Rule::plain_element => {
                let mut parts = significant(pair).into_iter();
                let ty = parts
                    .next()
                    .ok_or_else(|| self.malformed("tuple element", span))?;
                let ty = self.build_type(ty)?;
                if parts.any(|p| p.as_rule() == Rule::optional_mark) {
                    let node = self.node(NodeKind::OptionalElement, span);
                    self.tree.set_child(node, Field::Type, ty);
                    return Ok(node);
                }
                Ok(ty)
            }
            _ => Err(self.malformed("tuple element", span)),
        }
    }

    fn build_mapped(&mut self, pair: Pair<Rule>) -> Result<NodeId, UnrollError> {
        let span = span_of(&pair);
        let mut parameter = None;
        let mut readonly = None;
        let mut optional = None;
        let mut name_type = None;
        let mut types = Vec::new();

        for item in significant(pair) {
            match item.as_rule() {
                Rule::mapped_readonly => readonly = Some(modifier_of(item)),
                Rule::mapped_optional => optional = Some(modifier_of(item)),
                Rule::identifier => parameter = Some(item.as_str().to_string()),
                Rule::mapped_as => name_type = Some(self.build_only_type(item)?),
                Rule::type_expr => types.push(self.build_type(item)?),
                _ => {}
            }
        }

        let parameter = parameter.ok_or_else(|| self.malformed("mapped type parameter", span))?;
        let [constraint, value]: [NodeId; 2] = types
            .try_into()
            .map_err(|_| self.malformed("mapped type", span))?;
        let node = self.node(
            NodeKind::MappedType {
                parameter,
                readonly,
                optional,
            },
            span,
        );
        self.tree.set_child(node, Field::Constraint, constraint);
        if let Some(name_type) = name_type {
            self.tree.set_child(node, Field::NameType, name_type);
        }
        self.tree.set_child(node, Field::Type, value);
        Ok(node)
    }

    fn build_member(&mut self, pair: Pair<Rule>) -> Result<NodeId, UnrollError> {
        let span = span_of(&pair);
        let rule = pair.as_rule();
        let mut readonly = false;
        let mut optional = false;
        let mut key = None;
        let mut parameter = None;
        let mut types = Vec::new();

        for item in significant(pair) {
            match item.as_rule() {
                Rule::member_readonly => readonly = true,
                Rule::optional_mark => optional = true,
                Rule::property_key => key = Some(item.as_str().to_string()),
                Rule::identifier => parameter = Some(item.as_str().to_string()),
                Rule::type_expr => types.push(self.build_type(item)?),
                _ => {}
            }
        }

        match rule {
            Rule::property_signature => {
                let key = key.ok_or_else(|| self.malformed("property name", span))?;
                let [value]: [NodeId; 1] = types
                    .try_into()
                    .map_err(|_| self.malformed("property signature", span))?;
                let node = self.node(
                    NodeKind::PropertySignature {
                        key,
                        readonly,
                        optional,
                    },
                    span,
                );
                self.tree.set_child(node, Field::Type, value);
                Ok(node)
            }
            Rule::index_signature => {
                let parameter =
                    parameter.ok_or_else(|| self.malformed("index signature parameter", span))?;
                let [key_type, value]: [NodeId; 2] = types
                    .try_into()
                    .map_err(|_| self.malformed("index signature", span))?;
                let node = self.node(
                    NodeKind::IndexSignature {
                        parameter,
                        readonly,
                    },
                    span,
                );
                self.tree.set_child(node, Field::Key, key_type);
                self.tree.set_child(node, Field::Type, value);
                Ok(node)
            }
            _ => Err(self.malformed("type member", span)),
        }
    }

    fn build_template(&mut self, pair: Pair<Rule>) -> Result<NodeId, UnrollError> {
        let span = span_of(&pair);
        let mut head = String::new();
        let mut spans = Vec::new();

        for item in pair.into_inner() {
            match item.as_rule() {
                Rule::template_chunk => head = item.as_str().to_string(),
                Rule::template_span => {
                    let span_span = span_of(&item);
                    let mut ty = None;
                    let mut tail = String::new();
                    for part in item.into_inner() {
                        match part.as_rule() {
                            Rule::template_type => ty = Some(self.build_only_type(part)?),
                            Rule::template_chunk => tail = part.as_str().to_string(),
                            _ => {}
                        }
                    }
                    let ty = ty.ok_or_else(|| self.malformed("template span", span_span))?;
                    let node = self.node(NodeKind::TemplateSpan { tail }, span_span);
                    self.tree.set_child(node, Field::Type, ty);
                    spans.push(node);
                }
                _ => {}
            }
        }

        let node = self.node(NodeKind::TemplateLiteral { head }, span);
        self.tree.set_children(node, Field::Spans, spans);
        Ok(node)
    }

    fn build_reference(&mut self, pair: Pair<Rule>) -> Result<NodeId, UnrollError> {
        let span = span_of(&pair);
        let mut name = None;
        let mut arguments = Vec::new();

        for item in significant(pair) {
            match item.as_rule() {
                Rule::entity_name => name = Some(item.as_str().to_string()),
                Rule::type_arguments => {
                    for argument in significant(item) {
                        arguments.push(self.build_type(argument)?);
                    }
                }
                _ => {}
            }
        }

        let name = name.ok_or_else(|| self.malformed("type reference", span))?;
        let node = self.node(NodeKind::TypeReference { name }, span);
        self.tree.set_children(node, Field::Arguments, arguments);
        Ok(node)
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

/// Inner pairs of `pair` without pure punctuation keywords.
fn significant(pair: Pair<Rule>) -> Vec<Pair<Rule>> {
    pair.into_inner()
        .filter(|p| {
            !matches!(
                p.as_rule(),
                Rule::type_kw
                    | Rule::extends_kw
                    | Rule::infer_kw
                    | Rule::typeof_kw
                    | Rule::in_kw
                    | Rule::as_kw
                    | Rule::EOI
            )
        })
        .collect()
}

fn modifier_of(pair: Pair<Rule>) -> MappedModifier {
    let sign = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::modifier_sign)
        .map(|p| p.as_str().to_string());
    match sign.as_deref() {
        Some("+") => MappedModifier::Add,
        Some("-") => MappedModifier::Remove,
        _ => MappedModifier::Bare,
    }
}

fn span_of(pair: &Pair<Rule>) -> Span {
    Span {
        start: pair.as_span().start(),
        end: pair.as_span().end(),
    }
}

fn convert_parse_error(error: Error<Rule>, source: &SourceContext) -> UnrollError {
    let span = match error.location {
        InputLocation::Pos(pos) => Span {
            start: pos,
            end: pos,
        },
        InputLocation::Span((start, end)) => Span { start, end },
    };

    let error = error.renamed_rules(|rule| {
        let name = match rule {
            Rule::type_expr | Rule::union_type | Rule::intersection_type | Rule::operator_type => {
                "a type"
            }
            Rule::type_alias | Rule::type_kw | Rule::export_kw => "a `type` declaration",
            Rule::identifier | Rule::entity_name => "an identifier",
            Rule::type_param => "a type parameter",
            Rule::type_params => "type parameters",
            Rule::type_arguments => "type arguments",
            Rule::param_constraint => "a constraint",
            Rule::param_default => "a default type",
            Rule::extends_kw => "`extends`",
            Rule::array_suffix => "`[]`",
            Rule::index_suffix => "an indexed access `[...]`",
            Rule::parenthesized => "a parenthesized type",
            Rule::tuple_type => "a tuple type",
            Rule::rest_element => "a rest element",
            Rule::plain_element => "a tuple element",
            Rule::optional_mark => "`?`",
            Rule::mapped_type => "a mapped type",
            Rule::type_literal => "an object type",
            Rule::property_signature | Rule::index_signature => "a member",
            Rule::template_literal => "a template literal type",
            Rule::string_literal => "a string literal",
            Rule::number_literal => "a number literal",
            Rule::keyword_type => "a keyword type",
            Rule::type_query => "a `typeof` query",
            Rule::type_reference => "a type reference",
            Rule::EOI => "end of input",
            other => return format!("{other:?}").replace('_', " "),
        };
        name.to_string()
    });

    parse_error(error.variant.message(), span, source)
}
