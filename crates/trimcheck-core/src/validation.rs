//! Placement checks for capability annotations
//!
//! An annotation only means something on a declaration that holds a
//! `System.Type` or a type-name string. Anything else is reported once per
//! declaration, independently of any dataflow.

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, Location, PlacementKind};
use crate::symbols::MethodRef;
use serde::{Deserialize, Serialize};
use trimcheck_annotations::CapabilityKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclarationSite {
    Field,
    Property,
    /// `name` is the method whose return value is annotated
    ReturnValue,
    Parameter { method: MethodRef },
    /// An annotation on a method itself, describing its implicit `this`
    Method,
}

/// A declared annotation and the type it is attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub site: DeclarationSite,
    pub capabilities: CapabilityKind,
    /// Whether the declared type is `System.Type` (or derived) or `string`.
    /// For [`DeclarationSite::Method`] this describes the declaring type.
    pub carries_type_or_string: bool,
    #[serde(default)]
    pub location: Location,
}

/// Report an annotation placed on a declaration that cannot carry one
pub fn validate_declaration(declaration: &Declaration, sink: &mut DiagnosticSink) {
    if declaration.capabilities.is_empty() || declaration.carries_type_or_string {
        return;
    }

    let name = declaration.name.clone();
    let (placement, arguments) = match &declaration.site {
        DeclarationSite::Field => (PlacementKind::Field, vec![name]),
        DeclarationSite::Property => (PlacementKind::Property, vec![name]),
        DeclarationSite::ReturnValue => (PlacementKind::ReturnValue, vec![name]),
        DeclarationSite::Parameter { method } => (PlacementKind::Parameter, vec![name, method.to_string()]),
        DeclarationSite::Method => (PlacementKind::Method, Vec::new()),
    };
    sink.report(Diagnostic::new(
        DiagnosticKind::InvalidPlacement(placement),
        arguments,
        declaration.location,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declaration(site: DeclarationSite, carries_type_or_string: bool) -> Declaration {
        Declaration {
            name: "C.member".into(),
            site,
            capabilities: CapabilityKind::PUBLIC_METHODS,
            carries_type_or_string,
            location: Location::new(10, 5),
        }
    }

    fn validate(declaration: &Declaration) -> Vec<Diagnostic> {
        let mut sink = DiagnosticSink::new();
        validate_declaration(declaration, &mut sink);
        sink.drain()
    }

    #[test]
    fn test_type_or_string_declarations_are_valid() {
        assert!(validate(&declaration(DeclarationSite::Field, true)).is_empty());
    }

    #[test]
    fn test_unannotated_declarations_never_diagnose() {
        let mut decl = declaration(DeclarationSite::Property, false);
        decl.capabilities = CapabilityKind::NONE;
        assert!(validate(&decl).is_empty());
    }

    #[test]
    fn test_placement_codes_and_arguments() {
        let cases = [
            (DeclarationSite::Field, 2097, vec!["C.member"]),
            (
                DeclarationSite::Parameter {
                    method: MethodRef::new("C.M(int)"),
                },
                2098,
                vec!["C.member", "C.M(int)"],
            ),
            (DeclarationSite::Property, 2099, vec!["C.member"]),
            (DeclarationSite::ReturnValue, 2106, vec!["C.member"]),
            (DeclarationSite::Method, 2041, vec![]),
        ];

        for (site, code, arguments) in cases {
            let diagnostics = validate(&declaration(site.clone(), false));
            assert_eq!(diagnostics.len(), 1, "site {site:?}");
            assert_eq!(diagnostics[0].code(), code, "site {site:?}");
            assert_eq!(diagnostics[0].arguments(), arguments.as_slice(), "site {site:?}");
            assert_eq!(diagnostics[0].location(), Location::new(10, 5));
        }
    }
}
