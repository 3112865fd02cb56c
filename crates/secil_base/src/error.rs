//! Error types with source location tracking.
//!
//! Compilation failures are a closed set of [`ErrorKind`]s. Every error
//! carries the [`Location`] of the AST node that produced it and a
//! human-readable message naming the symbols involved.
//!
//! One kind is special: [`ErrorKind::UnresolvedName`] raised *inside an
//! optional block* is not an error at all — the resolver catches it,
//! disables the optional, and re-runs. Everywhere else it is fatal, like
//! the rest of the set.
//!
//! # Example
//!
//! ```
//! use secil_base::{CompileError, ErrorKind, Location};
//!
//! let err = CompileError::new(
//!     ErrorKind::UnresolvedName,
//!     Location::line(7),
//!     "failed to resolve type t_missing",
//! );
//! assert!(err.to_string().contains("t_missing"));
//! assert!(err.to_string().contains("line 7"));
//! ```

use crate::location::Location;
use std::fmt;

/// The closed set of compilation failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The inbound parse tree violates a structural precondition
    /// (e.g. a booleanif body contains a non-rule statement).
    ParseInputMalformed,
    /// Two declarations collide in the same scope.
    DuplicateDeclaration,
    /// A reference target is absent. Recoverable only inside an optional.
    UnresolvedName,
    /// A name resolved to a datum of the wrong flavor.
    TypeMismatch,
    /// A macro expansion re-entered a macro already being expanded.
    RecursiveCall,
    /// A typealias chain forms a cycle.
    RecursiveAlias,
    /// An order declaration contradicts an already-merged adjacency.
    OrderConflict,
    /// The order declarations do not connect into a single total order.
    IncompleteOrder,
    /// A declared sensitivity or category is missing from the total order.
    MissingInOrder,
    /// A constraint expression is inconsistent.
    ConstraintMalformed,
    /// An access-vector rule intersects a neverallow assertion.
    NeverallowViolation,
    /// A nodecon address and mask differ in IP family.
    IpFamilyMismatch,
    /// A policycap name is not in the known capability table.
    PolicycapUnknown,
    /// A lowered datum received a value outside `[1, nprim]`.
    InvalidValue,
}

impl ErrorKind {
    /// Short identifier used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ParseInputMalformed => "malformed input",
            ErrorKind::DuplicateDeclaration => "duplicate declaration",
            ErrorKind::UnresolvedName => "unresolved name",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::RecursiveCall => "recursive macro call",
            ErrorKind::RecursiveAlias => "recursive alias",
            ErrorKind::OrderConflict => "order conflict",
            ErrorKind::IncompleteOrder => "incomplete order",
            ErrorKind::MissingInOrder => "missing from order",
            ErrorKind::ConstraintMalformed => "malformed constraint",
            ErrorKind::NeverallowViolation => "neverallow violation",
            ErrorKind::IpFamilyMismatch => "ip family mismatch",
            ErrorKind::PolicycapUnknown => "unknown policycap",
            ErrorKind::InvalidValue => "invalid value",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compilation error annotated with its source location.
#[derive(Debug, Clone)]
pub struct CompileError {
    /// Which failure this is.
    pub kind: ErrorKind,
    /// Where in the source the failing statement sits.
    pub location: Location,
    /// Human-readable description naming the symbols involved.
    pub message: String,
}

impl CompileError {
    /// Creates an error with the given kind, location, and message.
    pub fn new(kind: ErrorKind, location: Location, message: impl Into<String>) -> Self {
        Self {
            kind,
            location,
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} at {}", self.kind, self.message, self.location)
    }
}

impl std::error::Error for CompileError {}

/// Alias for `std::result::Result<T, CompileError>`.
pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_names_kind_and_location() {
        let err = CompileError::new(
            ErrorKind::DuplicateDeclaration,
            Location::line(3),
            "type t_a declared twice",
        );
        let display = err.to_string();
        assert!(display.contains("duplicate declaration"));
        assert!(display.contains("t_a"));
        assert!(display.contains("line 3"));
    }

    #[test]
    fn kinds_have_distinct_names() {
        assert_ne!(
            ErrorKind::OrderConflict.as_str(),
            ErrorKind::IncompleteOrder.as_str()
        );
    }
}
