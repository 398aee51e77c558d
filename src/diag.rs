//! Diagnostics: structured validation issues and their per-instance collector.

use std::fmt;

use serde::Serialize;

use crate::provenance::{Path, Span};

/// Default cap on issues kept per instance.
pub const DEFAULT_MAX_ISSUES: usize = 100;

/// Stable issue codes. The string forms are part of the public contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Code {
    TypeNotFound,
    AbstractType,
    PartTypeDirect,
    MissingRequired,
    UnknownField,
    TypeMismatch,
    ConstraintFail,
    InvariantFail,
    MissingPrimaryKey,
    EdgeShapeMismatch,
    #[serde(rename = "MissingFKTarget")]
    MissingFkTarget,
    #[serde(rename = "PartialCompositeFK")]
    PartialCompositeFk,
    UnknownEdgeField,
    UnresolvedRequiredComposition,
    CompositionNotFound,
    #[serde(rename = "DuplicateComposedPK")]
    DuplicateComposedPk,
    EvalError,
    CaseFoldCollision,
}

impl Code {
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::TypeNotFound => "TypeNotFound",
            Code::AbstractType => "AbstractType",
            Code::PartTypeDirect => "PartTypeDirect",
            Code::MissingRequired => "MissingRequired",
            Code::UnknownField => "UnknownField",
            Code::TypeMismatch => "TypeMismatch",
            Code::ConstraintFail => "ConstraintFail",
            Code::InvariantFail => "InvariantFail",
            Code::MissingPrimaryKey => "MissingPrimaryKey",
            Code::EdgeShapeMismatch => "EdgeShapeMismatch",
            Code::MissingFkTarget => "MissingFKTarget",
            Code::PartialCompositeFk => "PartialCompositeFK",
            Code::UnknownEdgeField => "UnknownEdgeField",
            Code::UnresolvedRequiredComposition => "UnresolvedRequiredComposition",
            Code::CompositionNotFound => "CompositionNotFound",
            Code::DuplicateComposedPk => "DuplicateComposedPK",
            Code::EvalError => "EvalError",
            Code::CaseFoldCollision => "CaseFoldCollision",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One structured diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub code: Code,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    /// Ordered key/value details (`relation`, `json_field`, `expected`, ...).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<(String, String)>,
}

impl Issue {
    pub fn new(severity: Severity, code: Code, message: impl Into<String>) -> Self {
        Self { severity, code, message: message.into(), path: None, span: None, details: Vec::new() }
    }

    pub fn error(code: Code, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Attach a path; the root path is left out.
    pub fn at(mut self, path: &Path) -> Self {
        self.path = (!path.is_root()).then(|| path.to_string());
        self
    }

    pub fn with_span(mut self, span: Option<Span>) -> Self {
        self.span = span;
        self
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }

    pub fn detail_value(&self, key: &str) -> Option<&str> {
        self.details.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.severity, self.code)?;
        if let Some(path) = &self.path {
            write!(f, " {path}")?;
        }
        if let Some(span) = &self.span {
            write!(f, " ({span})")?;
        }
        write!(f, ": {}", self.message)
    }
}

// ============================================================================
// Collector
// ============================================================================

/// Ordered, bounded issue sink for one instance.
///
/// Issues beyond the cap are dropped, but an error is still remembered so
/// `has_errors` stays truthful past the cap.
#[derive(Debug, Clone)]
pub struct Collector {
    issues: Vec<Issue>,
    max: usize,
    saw_error: bool,
    dropped: usize,
}

impl Collector {
    pub fn new(max: usize) -> Self {
        let max = if max == 0 { DEFAULT_MAX_ISSUES } else { max };
        Self { issues: Vec::new(), max, saw_error: false, dropped: 0 }
    }

    /// A collector with the same cap, for an isolated sub-scope.
    pub fn scope(&self) -> Self {
        Self::new(self.max)
    }

    pub fn push(&mut self, issue: Issue) {
        self.saw_error |= issue.is_error();
        if self.issues.len() < self.max {
            self.issues.push(issue);
        } else {
            self.dropped += 1;
        }
    }

    /// Merge a finished sub-scope, passing each issue through `annotate`.
    pub fn merge(&mut self, other: Collector, mut annotate: impl FnMut(Issue) -> Issue) {
        self.saw_error |= other.saw_error;
        self.dropped += other.dropped;
        for issue in other.issues {
            self.push(annotate(issue));
        }
    }

    pub fn has_errors(&self) -> bool {
        self.saw_error
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn finish(self) -> DiagnosticResult {
        DiagnosticResult { issues: self.issues, dropped: self.dropped }
    }
}

/// Finalized, read-only diagnostics for one instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiagnosticResult {
    issues: Vec<Issue>,
    #[serde(skip_serializing_if = "is_zero")]
    dropped: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl DiagnosticResult {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn is_ok(&self) -> bool {
        !self.has_errors()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(Issue::is_error)
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Issue> {
        self.issues.iter()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues dropped because the per-instance cap was reached.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn with_code(&self, code: Code) -> impl Iterator<Item = &Issue> + '_ {
        self.issues.iter().filter(move |i| i.code == code)
    }

    pub fn has_code(&self, code: Code) -> bool {
        self.with_code(code).next().is_some()
    }
}

impl fmt::Display for DiagnosticResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 { writeln!(f)?; }
            write!(f, "{issue}")?;
        }
        if self.dropped > 0 {
            write!(f, "\n... {} more issue(s) dropped", self.dropped)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_drops_but_keeps_error_flag() {
        let mut c = Collector::new(2);
        c.push(Issue::new(Severity::Warning, Code::UnknownField, "a"));
        c.push(Issue::new(Severity::Warning, Code::UnknownField, "b"));
        c.push(Issue::error(Code::MissingRequired, "c"));
        assert_eq!(c.len(), 2);
        assert_eq!(c.dropped(), 1);
        assert!(c.has_errors());
    }

    #[test]
    fn test_zero_cap_falls_back() {
        let mut c = Collector::new(0);
        for i in 0..150 {
            c.push(Issue::error(Code::TypeMismatch, format!("issue {i}")));
        }
        assert_eq!(c.len(), DEFAULT_MAX_ISSUES);
    }

    #[test]
    fn test_merge_annotates() {
        let mut parent = Collector::new(10);
        let mut child = parent.scope();
        child.push(Issue::error(Code::TypeMismatch, "bad"));
        parent.merge(child, |i| i.detail("relation", "lines"));
        let result = parent.finish();
        assert!(result.has_errors());
        assert_eq!(result.issues()[0].detail_value("relation"), Some("lines"));
    }

    #[test]
    fn test_display_and_serialize() {
        let path = Path::root().field("age");
        let issue = Issue::error(Code::MissingFkTarget, "missing").at(&path).detail("relation", "owner");
        assert_eq!(issue.to_string(), "error [MissingFKTarget] age: missing");
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["code"], "MissingFKTarget");
        assert_eq!(json["severity"], "error");
        assert_eq!(json["details"][0][0], "relation");
    }
}
