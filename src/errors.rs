//! tsunroll error handling.
//!
//! Every failure the engine can report is an [`UnrollError`]. Errors carry an
//! [`ErrorContext`] with the source file and span they point at, so the CLI
//! can render them as `miette` diagnostics with a labelled snippet.
//!
//! Scoping rules:
//! - `Parse` errors are fatal to the whole file.
//! - `MissingArgument` is fatal to one reference only; the unroller records it
//!   as a diagnostic and carries on.
//! - Every other unrolling error is fatal to one declaration, never to its
//!   siblings.

use std::{fmt, sync::Arc};

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use thiserror::Error;

use crate::syntax::Span;

pub type SourceArc = Arc<NamedSource<String>>;

// ============================================================================
// SOURCE CONTEXT
// ============================================================================

/// Name and content of the file being processed.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    pub fn from_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Convert to NamedSource for use with miette error reporting
    pub fn to_named_source(&self) -> SourceArc {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }
}

/// Where an error points, plus an optional hint.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub source: Option<SourceArc>,
    pub span: Option<Span>,
    pub help: Option<String>,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn at(span: Option<Span>) -> Self {
        Self {
            span,
            ..Self::default()
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

// ============================================================================
// ERROR TYPE
// ============================================================================

#[derive(Debug, Error)]
pub enum UnrollError {
    #[error("Parse error: {message}")]
    Parse { message: String, ctx: ErrorContext },

    #[error("{node} does not carry an identifier")]
    MissingIdentifier { node: String, ctx: ErrorContext },

    #[error("type alias `{declaration}` has no body")]
    MissingBody { declaration: String, ctx: ErrorContext },

    #[error("`{reference}` omits type parameter `{parameter}` of `{declaration}`, which has no default")]
    MissingArgument {
        declaration: String,
        parameter: String,
        reference: String,
        ctx: ErrorContext,
    },

    #[error("`{target}` could not be found under its parent while unrolling `{declaration}`")]
    SubstitutionTargetNotFound {
        declaration: String,
        target: String,
        ctx: ErrorContext,
    },

    #[error("unrolling `{declaration}` grew its body to {reached} nodes, over the limit of {limit}")]
    NodeLimitExceeded {
        declaration: String,
        limit: usize,
        reached: usize,
        ctx: ErrorContext,
    },

    #[error("invalid value for {option}: {message}")]
    InvalidOption {
        option: String,
        message: String,
        ctx: ErrorContext,
    },

    #[error("failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
        ctx: ErrorContext,
    },
}

/// Type-safe classification of an [`UnrollError`], used by tests and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    Parse,
    MissingIdentifier,
    MissingBody,
    MissingArgument,
    SubstitutionTargetNotFound,
    NodeLimitExceeded,
    InvalidOption,
    Io,
}

impl ErrorType {
    pub const fn code_suffix(self) -> &'static str {
        match self {
            ErrorType::Parse => "parse",
            ErrorType::MissingIdentifier => "missing_identifier",
            ErrorType::MissingBody => "missing_body",
            ErrorType::MissingArgument => "missing_argument",
            ErrorType::SubstitutionTargetNotFound => "substitution_target_not_found",
            ErrorType::NodeLimitExceeded => "node_limit_exceeded",
            ErrorType::InvalidOption => "invalid_option",
            ErrorType::Io => "io",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code_suffix())
    }
}

impl UnrollError {
    fn ctx(&self) -> &ErrorContext {
        match self {
            UnrollError::Parse { ctx, .. }
            | UnrollError::MissingIdentifier { ctx, .. }
            | UnrollError::MissingBody { ctx, .. }
            | UnrollError::MissingArgument { ctx, .. }
            | UnrollError::SubstitutionTargetNotFound { ctx, .. }
            | UnrollError::NodeLimitExceeded { ctx, .. }
            | UnrollError::InvalidOption { ctx, .. }
            | UnrollError::Io { ctx, .. } => ctx,
        }
    }

    fn ctx_mut(&mut self) -> &mut ErrorContext {
        match self {
            UnrollError::Parse { ctx, .. }
            | UnrollError::MissingIdentifier { ctx, .. }
            | UnrollError::MissingBody { ctx, .. }
            | UnrollError::MissingArgument { ctx, .. }
            | UnrollError::SubstitutionTargetNotFound { ctx, .. }
            | UnrollError::NodeLimitExceeded { ctx, .. }
            | UnrollError::InvalidOption { ctx, .. }
            | UnrollError::Io { ctx, .. } => ctx,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            UnrollError::Parse { .. } => ErrorType::Parse,
            UnrollError::MissingIdentifier { .. } => ErrorType::MissingIdentifier,
            UnrollError::MissingBody { .. } => ErrorType::MissingBody,
            UnrollError::MissingArgument { .. } => ErrorType::MissingArgument,
            UnrollError::SubstitutionTargetNotFound { .. } => ErrorType::SubstitutionTargetNotFound,
            UnrollError::NodeLimitExceeded { .. } => ErrorType::NodeLimitExceeded,
            UnrollError::InvalidOption { .. } => ErrorType::InvalidOption,
            UnrollError::Io { .. } => ErrorType::Io,
        }
    }

    pub fn span(&self) -> Option<Span> {
        self.ctx().span
    }

    /// Attaches the file the error's span points into.
    pub fn with_source(mut self, source: SourceArc) -> Self {
        self.ctx_mut().source = Some(source);
        self
    }

    /// Short label for the primary span.
    fn label(&self) -> String {
        match self {
            UnrollError::Parse { message, .. } => message.clone(),
            UnrollError::MissingIdentifier { .. } => "no identifier here".into(),
            UnrollError::MissingBody { .. } => "declared here".into(),
            UnrollError::MissingArgument { parameter, .. } => {
                format!("no argument for `{parameter}`")
            }
            UnrollError::SubstitutionTargetNotFound { .. } => "stale node".into(),
            UnrollError::NodeLimitExceeded { .. } => "expanding this declaration".into(),
            UnrollError::InvalidOption { .. } | UnrollError::Io { .. } => String::new(),
        }
    }
}

impl Diagnostic for UnrollError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(format!(
            "tsunroll::{}",
            self.error_type().code_suffix()
        )))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.ctx()
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.ctx()
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let ctx = self.ctx();
        // A label without source code to point into renders as noise.
        ctx.source.as_ref()?;
        let span = ctx.span?;
        let label = LabeledSpan::new(Some(self.label()), span.start, span.len().max(1));
        Some(Box::new(std::iter::once(label)))
    }
}

// ============================================================================
// CONSTRUCTORS
// ============================================================================

pub fn parse_error(message: impl Into<String>, span: Span, source: &SourceContext) -> UnrollError {
    UnrollError::Parse {
        message: message.into(),
        ctx: ErrorContext {
            source: Some(source.to_named_source()),
            span: Some(span),
            help: None,
        },
    }
}

pub fn invalid_option(option: impl Into<String>, message: impl Into<String>) -> UnrollError {
    UnrollError::InvalidOption {
        option: option.into(),
        message: message.into(),
        ctx: ErrorContext::none(),
    }
}
