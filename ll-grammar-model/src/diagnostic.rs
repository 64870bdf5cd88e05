//! Structured diagnostics produced by validation and resolution.
//!
//! Every grammar-level problem ends up here as a [`Diagnostic`]; the surrounding
//! tool decides how to print them and derives its exit status from
//! [`Diagnostics::has_errors`].

use crate::model::Location;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// What went wrong. The severity of a diagnostic follows from its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DiagnosticKind {
    UndefinedProduction,
    UndefinedToken,
    DuplicateProduction,
    ArityMismatch,
    UndefinedStart,
    SemanticLookaheadDisabled,
    LeftRecursion,
    EmptyRepetition,
    UnreachableProduction,
    EmptyOptional,
    MisplacedLookahead,
    Ambiguity,
    LoopConflict,
    UnreachableAlternative,
    GuardContradiction,
}

impl DiagnosticKind {
    pub fn severity(self) -> Severity {
        use DiagnosticKind::*;
        match self {
            UndefinedProduction | UndefinedToken | DuplicateProduction | ArityMismatch
            | UndefinedStart | SemanticLookaheadDisabled | LeftRecursion | EmptyRepetition => {
                Severity::Error
            }
            UnreachableProduction | EmptyOptional | MisplacedLookahead | Ambiguity
            | LoopConflict | UnreachableAlternative | GuardContradiction => Severity::Warning,
        }
    }

    /// Structural errors keep the lookahead engine away from the production
    /// they occur in, but not from the rest of the grammar.
    pub fn is_structural(self) -> bool {
        use DiagnosticKind::*;
        matches!(
            self,
            UndefinedProduction
                | UndefinedToken
                | DuplicateProduction
                | ArityMismatch
                | SemanticLookaheadDisabled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub production: String,
    pub location: Location,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        production: impl Into<String>,
        location: Location,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: kind.severity(),
            kind,
            production: production.into(),
            location,
            message: message.into(),
        }
    }

    pub fn line(&self) -> usize {
        self.location.line
    }

    pub fn column(&self) -> usize {
        self.location.column
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{} @ {}]: {}",
            self.severity, self.production, self.location, self.message
        )
    }
}

/// Ordered collector of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::debug!("{}", diagnostic);
        self.items.push(diagnostic);
    }

    pub fn report(
        &mut self,
        kind: DiagnosticKind,
        production: &str,
        location: Location,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic::new(kind, production, location, message));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity.is_error())
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| !d.severity.is_error())
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.kind == kind)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.items
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in &self.items {
            writeln!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}
