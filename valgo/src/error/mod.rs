//! Error types and reporting

use crate::ast::Span;
use crate::types::TypeError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CompileError>;

/// Lowering error
///
/// Every variant is fatal: a lowering run yields a complete target tree or
/// exactly one of these.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Assignment to a value binding or to a field not declared `var`
    #[error("Immutability error at {span}: {message}")]
    Immutability { message: String, span: Span },

    /// A required concrete type could not be determined
    #[error("Inference error at {span}: {message}")]
    Inference { message: String, span: Span },

    /// Exhaustiveness and shape errors in matches and argument lists
    #[error("Pattern error at {span}: {message}")]
    Pattern { message: String, span: Span },

    /// Match clauses disagree on their result type
    #[error("Result type conflict at {span}: {message}")]
    ResultConflict { message: String, span: Span },

    /// Internal invariant broken upstream, e.g. double wrapping
    #[error("Invariant violation at {span}: {message}")]
    Invariant { message: String, span: Span },

    /// Source nesting exceeded the configured depth limit
    #[error("Nesting limit exceeded at {span}: {message}")]
    DepthLimit { message: String, span: Span },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Metadata error: {message}")]
    Metadata { message: String },
}

impl CompileError {
    pub fn immutability(message: impl Into<String>, span: Span) -> Self {
        Self::Immutability {
            message: message.into(),
            span,
        }
    }

    pub fn inference(message: impl Into<String>, span: Span) -> Self {
        Self::Inference {
            message: message.into(),
            span,
        }
    }

    pub fn pattern(message: impl Into<String>, span: Span) -> Self {
        Self::Pattern {
            message: message.into(),
            span,
        }
    }

    pub fn result_conflict(message: impl Into<String>, span: Span) -> Self {
        Self::ResultConflict {
            message: message.into(),
            span,
        }
    }

    pub fn invariant(message: impl Into<String>, span: Span) -> Self {
        Self::Invariant {
            message: message.into(),
            span,
        }
    }

    pub fn depth_limit(message: impl Into<String>, span: Span) -> Self {
        Self::DepthLimit {
            message: message.into(),
            span,
        }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn metadata_error(message: impl Into<String>) -> Self {
        Self::Metadata {
            message: message.into(),
        }
    }

    /// Attach a location to a type-model violation
    pub fn from_type_error(err: TypeError, span: Span) -> Self {
        Self::invariant(err.to_string(), span)
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Immutability { span, .. }
            | Self::Inference { span, .. }
            | Self::Pattern { span, .. }
            | Self::ResultConflict { span, .. }
            | Self::Invariant { span, .. }
            | Self::DepthLimit { span, .. } => Some(*span),
            Self::Io { .. } | Self::Config { .. } | Self::Metadata { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Immutability { message, .. }
            | Self::Inference { message, .. }
            | Self::Pattern { message, .. }
            | Self::ResultConflict { message, .. }
            | Self::Invariant { message, .. }
            | Self::DepthLimit { message, .. }
            | Self::Io { message }
            | Self::Config { message }
            | Self::Metadata { message } => message,
        }
    }

    /// Short category name used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Immutability { .. } => "Immutability",
            Self::Inference { .. } => "Inference",
            Self::Pattern { .. } => "Pattern",
            Self::ResultConflict { .. } => "Result type",
            Self::Invariant { .. } => "Invariant",
            Self::DepthLimit { .. } => "Nesting",
            Self::Io { .. } => "IO",
            Self::Config { .. } => "Configuration",
            Self::Metadata { .. } => "Metadata",
        }
    }
}

impl From<std::io::Error> for CompileError {
    fn from(err: std::io::Error) -> Self {
        Self::io_error(err.to_string())
    }
}

/// Report error with ariadne
pub fn report_error(filename: &str, source: &str, error: &CompileError) -> std::io::Result<()> {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let kind = error.kind();

    match error.span() {
        Some(span) if !span.is_synthetic() => Report::build(ReportKind::Error, (filename, span.start..span.end))
            .with_message(format!("{kind} error"))
            .with_label(
                Label::new((filename, span.start..span.end))
                    .with_message(error.message())
                    .with_color(Color::Red),
            )
            .finish()
            .eprint((filename, Source::from(source))),
        _ => Report::build(ReportKind::Error, (filename, 0..0))
            .with_message(format!("{kind} error: {}", error.message()))
            .finish()
            .eprint((filename, Source::from(source))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_span_and_message() {
        let err = CompileError::immutability("cannot assign to val `x`", Span::new(3, 8));
        assert_eq!(err.span(), Some(Span::new(3, 8)));
        assert_eq!(err.message(), "cannot assign to val `x`");
        assert_eq!(err.kind(), "Immutability");
    }

    #[test]
    fn test_display_includes_location() {
        let err = CompileError::pattern("match needs a default case", Span::new(10, 20));
        assert_eq!(
            err.to_string(),
            "Pattern error at 10..20: match needs a default case"
        );
    }

    #[test]
    fn test_spanless_errors() {
        let err = CompileError::config_error("bad key");
        assert_eq!(err.span(), None);
        assert_eq!(err.to_string(), "Configuration error: bad key");
    }

    #[test]
    fn test_type_error_becomes_invariant() {
        let err = CompileError::from_type_error(
            TypeError::DoubleWrap("std.Immutable[std.Immutable[int]]".into()),
            Span::new(1, 2),
        );
        assert!(matches!(err, CompileError::Invariant { .. }));
        assert!(err.message().contains("std.Immutable[std.Immutable[int]]"));
    }
}
