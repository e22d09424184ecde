//! Construction diagnostics and runtime coding errors.
use std::fmt;

use serde_json::Value;

use crate::ir::{TagType, TagValue};
use crate::keys::DuplicateKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// What a diagnostic is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    SumType(String),
    Case(String),
    Field { case: String, field: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DiagnosticKind {
    #[error(transparent)]
    DuplicateKey(#[from] DuplicateKey),
    #[error("field `{field}` is declared more than once")]
    DuplicateField { field: String },
    #[error("case `{case}` is declared more than once")]
    DuplicateCase { case: String },
    #[error("tag {tag} is already used by case `{existing}`")]
    DuplicateTag { tag: TagValue, existing: String },
    #[error("tag {tag} does not fit tag type {expected:?}")]
    TagTypeMismatch { tag: TagValue, expected: TagType },
    #[error("fallback case `{case}` is not declared")]
    UnknownFallback { case: String },
    #[error("field `{field}` is not decoded and has no default value")]
    DecodeDisabledWithoutDefault { field: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub subject: Subject,
    pub kind: DiagnosticKind,
}

/// Failure while executing a decode plan.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("at {path}: tag {tag} matches no case")]
    UnmatchedTag { tag: Value, path: String },
    #[error("at {path}: missing key `{key}`")]
    MissingKey { key: String, path: String },
    #[error("at {path}: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: Value, path: String },
    #[error("at {path}: expected an object")]
    ExpectedObject { path: String },
    #[error("unbound handle `{0}`")]
    Unbound(String),
    #[error("statement not valid while decoding: {0}")]
    Unsupported(String),
}

/// Failure while executing an encode plan.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("`{0}` is not a case of this type")]
    UnknownCase(String),
    #[error("case `{case}` is missing field `{field}`")]
    MissingField { case: String, field: String },
    #[error("field `{field}`: expected {expected}, found {found}")]
    TypeMismatch { field: String, expected: String, found: Value },
    #[error("slot `{0}` already holds a non-object value")]
    Occupied(String),
    #[error("unbound handle `{0}`")]
    Unbound(String),
    #[error("statement not valid while encoding: {0}")]
    Unsupported(String),
}

impl Diagnostic {
    pub fn error(subject: Subject, kind: impl Into<DiagnosticKind>) -> Self {
        Self { severity: Severity::Error, subject, kind: kind.into() }
    }

    pub fn warning(subject: Subject, kind: impl Into<DiagnosticKind>) -> Self {
        Self { severity: Severity::Warning, subject, kind: kind.into() }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::SumType(name) => write!(f, "{name}"),
            Subject::Case(case) => write!(f, "case `{case}`"),
            Subject::Field { case, field } => write!(f, "case `{case}`, field `{field}`"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{level}: {}: {}", self.subject, self.kind)
    }
}

/// All error diagnostics of a failed assembly.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{} error(s) while building plan for `{type_name}`", .diagnostics.iter().filter(|d| d.is_error()).count())]
pub struct AssemblyError {
    pub type_name: String,
    pub diagnostics: Vec<Diagnostic>,
}
