//! Diagnostics produced by the analysis and the sink that collects them

use crate::symbols::OriginShape;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque host-defined position of an operation or declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.line, self.column)
    }
}

/// Declaration kinds checked by annotation placement validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementKind {
    Field,
    Parameter,
    Property,
    ReturnValue,
    Method,
}

/// What went wrong; the stable code is derived from the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// A value whose members cannot be statically known reaches `target`.
    Unverifiable { target: OriginShape },
    /// An annotated value lacks capabilities required by `target`.
    Mismatch { source: OriginShape, target: OriginShape },
    /// An annotation is placed on a declaration that cannot carry one.
    InvalidPlacement(PlacementKind),
}

const UNVERIFIABLE_BASE: u16 = 2062;
const MISMATCH_BASE: u16 = 2067;

impl DiagnosticKind {
    pub fn code(&self) -> u16 {
        match self {
            DiagnosticKind::Unverifiable { target } => UNVERIFIABLE_BASE + target.index(),
            DiagnosticKind::Mismatch { source, target } => MISMATCH_BASE + source.index() * 5 + target.index(),
            DiagnosticKind::InvalidPlacement(placement) => match placement {
                PlacementKind::Method => 2041,
                PlacementKind::Field => 2097,
                PlacementKind::Parameter => 2098,
                PlacementKind::Property => 2099,
                PlacementKind::ReturnValue => 2106,
            },
        }
    }

    /// Code with its tool prefix, e.g. `IL2072`
    pub fn id(&self) -> String {
        format!("IL{}", self.code())
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL{}", self.code())
    }
}

/// An immutable finding: kind, positional arguments and location.
///
/// Rendering human-readable text from the arguments is the host's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    kind: DiagnosticKind,
    arguments: Vec<String>,
    location: Location,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, arguments: Vec<String>, location: Location) -> Self {
        Self {
            kind,
            arguments,
            location,
        }
    }

    pub fn kind(&self) -> DiagnosticKind {
        self.kind
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn code(&self) -> u16 {
        self.kind.code()
    }

    pub fn id(&self) -> String {
        self.kind.id()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.location, self.kind, self.arguments.join(", "))
    }
}

/// Append-only collector for one analysis unit.
///
/// Emission order is preserved and nothing is deduplicated: several
/// insufficient values reaching the same site each produce a diagnostic.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Take every accumulated diagnostic, leaving the sink empty
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unverifiable_codes_by_target() {
        let codes: Vec<u16> = OriginShape::ALL
            .iter()
            .map(|&target| DiagnosticKind::Unverifiable { target }.code())
            .collect();
        assert_eq!(codes, vec![2062, 2063, 2064, 2065, 2066]);
    }

    #[test]
    fn test_mismatch_codes() {
        let kind = |source, target| DiagnosticKind::Mismatch { source, target }.code();
        assert_eq!(kind(OriginShape::Parameter, OriginShape::Parameter), 2067);
        assert_eq!(kind(OriginShape::Parameter, OriginShape::GenericParameter), 2071);
        assert_eq!(kind(OriginShape::ReturnValue, OriginShape::Parameter), 2072);
        assert_eq!(kind(OriginShape::Field, OriginShape::Field), 2079);
        assert_eq!(kind(OriginShape::ThisParameter, OriginShape::ReturnValue), 2083);
        assert_eq!(kind(OriginShape::GenericParameter, OriginShape::GenericParameter), 2091);
    }

    #[test]
    fn test_placement_codes() {
        assert_eq!(DiagnosticKind::InvalidPlacement(PlacementKind::Field).id(), "IL2097");
        assert_eq!(DiagnosticKind::InvalidPlacement(PlacementKind::ReturnValue).id(), "IL2106");
        assert_eq!(DiagnosticKind::InvalidPlacement(PlacementKind::Method).id(), "IL2041");
    }

    #[test]
    fn test_sink_preserves_order_and_duplicates() {
        let mut sink = DiagnosticSink::new();
        let kind = DiagnosticKind::Unverifiable {
            target: OriginShape::Parameter,
        };
        let location = Location::new(3, 7);
        sink.report(Diagnostic::new(kind, vec!["a".into()], location));
        sink.report(Diagnostic::new(kind, vec!["a".into()], location));
        sink.report(Diagnostic::new(kind, vec!["b".into()], location));

        assert_eq!(sink.len(), 3);
        let drained = sink.drain();
        assert_eq!(drained[0], drained[1]);
        assert_eq!(drained[2].arguments(), ["b".to_string()]);
        assert!(sink.is_empty());
    }
}
