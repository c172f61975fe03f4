//! Error and diagnostic types for the semantic core
//!
//! Two layers, deliberately distinct:
//!
//! - `DiagnosticCode` identifies a *problem sentinel*: a first-class
//!   degraded result (problem binding, problem type, incomplete
//!   execution) that flows by value through the normal APIs. Sentinels
//!   are valid results, never raised.
//! - `SemanticError` is a reportable diagnostic built with miette, used
//!   when analysis wants to tell a human what went wrong.

use cxxfront_ast::Span;
use miette::{Diagnostic, SourceSpan};
use std::fmt;
use thiserror::Error;

/// Identifier carried by every problem sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    NameNotFound,
    AmbiguousLookup,
    InvalidType,
    InvalidOverload,
    BadTemplateArguments,
    AmbiguousInstantiation,
    InstantiationDepthExceeded,
    TypeNestingExceeded,
    BadMarshalData,
    InvalidRedeclaration,
    MemberOfNonClass,
    NoAlternativeValid,
    NotConstexpr,
    ExecutionDepthExceeded,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::NameNotFound => "name-not-found",
            DiagnosticCode::AmbiguousLookup => "ambiguous-lookup",
            DiagnosticCode::InvalidType => "invalid-type",
            DiagnosticCode::InvalidOverload => "invalid-overload",
            DiagnosticCode::BadTemplateArguments => "bad-template-arguments",
            DiagnosticCode::AmbiguousInstantiation => "ambiguous-instantiation",
            DiagnosticCode::InstantiationDepthExceeded => "instantiation-depth-exceeded",
            DiagnosticCode::TypeNestingExceeded => "type-nesting-exceeded",
            DiagnosticCode::BadMarshalData => "bad-marshal-data",
            DiagnosticCode::InvalidRedeclaration => "invalid-redeclaration",
            DiagnosticCode::MemberOfNonClass => "member-of-non-class",
            DiagnosticCode::NoAlternativeValid => "no-alternative-valid",
            DiagnosticCode::NotConstexpr => "not-constexpr",
            DiagnosticCode::ExecutionDepthExceeded => "execution-depth-exceeded",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reportable semantic diagnostics
#[derive(Error, Diagnostic, Debug)]
pub enum SemanticError {
    #[error("use of undeclared name `{name}`")]
    #[diagnostic(
        code(cxxfront::sema::undeclared_name),
        help("declare `{name}` before this point, or check the spelling")
    )]
    UndeclaredName {
        name: String,
        #[label("not found in this scope or any enclosing scope")]
        span: Option<SourceSpan>,
    },

    #[error("reference to `{name}` is ambiguous")]
    #[diagnostic(
        code(cxxfront::sema::ambiguous_reference),
        help("qualify the name to select one of the candidates")
    )]
    AmbiguousReference {
        name: String,
        candidate_count: usize,
        #[label("{candidate_count} candidates match")]
        span: Option<SourceSpan>,
    },

    #[error("no matching overload for call to `{name}`")]
    #[diagnostic(
        code(cxxfront::sema::no_matching_overload),
        help("every candidate was disqualified by argument deduction or conversion")
    )]
    NoMatchingOverload {
        name: String,
        #[label("no viable candidate")]
        span: Option<SourceSpan>,
    },

    #[error("instantiation of `{template_name}` is ambiguous")]
    #[diagnostic(
        code(cxxfront::sema::ambiguous_instantiation),
        help("more than one partial specialization matches and none is more specialized than the rest")
    )]
    AmbiguousInstantiation {
        template_name: String,
        #[label("partial specializations are incomparable for these arguments")]
        span: Option<SourceSpan>,
    },

    #[error("template instantiation exceeded the depth limit of {max_depth}")]
    #[diagnostic(
        code(cxxfront::sema::instantiation_depth),
        help("a template that instantiates itself with a growing argument never converges")
    )]
    InstantiationDepthExceeded {
        max_depth: usize,
        #[label("instantiation requested here")]
        span: Option<SourceSpan>,
    },

    #[error("no alternative of an ambiguous construct is semantically valid")]
    #[diagnostic(
        code(cxxfront::sema::unresolvable_ambiguity),
        help("the syntactically preferred alternative was kept so analysis can continue")
    )]
    UnresolvableAmbiguity {
        #[label("all alternatives failed")]
        span: Option<SourceSpan>,
    },
}

/// Helper for creating source spans from AST spans
pub fn to_source_span(span: Span) -> Option<SourceSpan> {
    if span.is_empty() && span.start == 0 {
        None
    } else {
        Some(SourceSpan::new(span.start.into(), span.len()))
    }
}
