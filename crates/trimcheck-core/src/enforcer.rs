//! Checking values against required capabilities
//!
//! Every distinct value reaching a checked position is judged on its own:
//! a merged set containing one insufficient value and one fine value
//! produces exactly one diagnostic.

use crate::dataflow::{LatticeValue, MultiValue};
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, Location};
use crate::symbols::{MemberMarker, SymbolOrigin, TypeNameResolver, TypeRef};
use tracing::trace;
use trimcheck_annotations::CapabilityKind;

/// A checked position and the capabilities it declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredCapability {
    pub target: SymbolOrigin,
    pub required: CapabilityKind,
}

impl RequiredCapability {
    pub fn new(target: SymbolOrigin, required: CapabilityKind) -> Self {
        Self { target, required }
    }
}

pub struct CapabilityEnforcer<'a> {
    resolver: &'a dyn TypeNameResolver,
    marker: &'a dyn MemberMarker,
}

impl<'a> CapabilityEnforcer<'a> {
    pub fn new(resolver: &'a dyn TypeNameResolver, marker: &'a dyn MemberMarker) -> Self {
        Self { resolver, marker }
    }

    /// Check every value in `values` against `requirement`, reporting one
    /// diagnostic per insufficient value
    pub fn enforce(
        &self,
        values: &MultiValue,
        requirement: &RequiredCapability,
        location: Location,
        sink: &mut DiagnosticSink,
    ) {
        if requirement.required.is_empty() {
            return;
        }

        for value in values {
            trace!(%value, target = %requirement.target, required = %requirement.required, "enforcing");
            self.enforce_value(value, requirement, location, sink);
        }
    }

    fn enforce_value(
        &self,
        value: &LatticeValue,
        requirement: &RequiredCapability,
        location: Location,
        sink: &mut DiagnosticSink,
    ) {
        let required = requirement.required;
        match value {
            LatticeValue::GenericParameterWithCtorConstraint { parameter, capabilities } => {
                // The new() constraint only guarantees the parameterless constructor
                if required == CapabilityKind::PUBLIC_PARAMETERLESS_CONSTRUCTOR {
                    return;
                }
                let source = SymbolOrigin::GenericParameter {
                    parameter: parameter.clone(),
                };
                self.check_annotated(&source, *capabilities, requirement, location, sink);
            }
            LatticeValue::Annotated(annotated) => {
                self.check_annotated(&annotated.origin, annotated.capabilities, requirement, location, sink);
            }
            LatticeValue::ConcreteType(ty) => self.mark(ty, required),
            LatticeValue::ConstantString(text) => match self.resolver.resolve(text) {
                Some(ty) => self.mark(&ty, required),
                None => trace!(text = %text, "string does not resolve to a type, accepted"),
            },
            LatticeValue::Null => {}
            LatticeValue::Unknown => {
                let target = &requirement.target;
                sink.report(Diagnostic::new(
                    DiagnosticKind::Unverifiable { target: target.shape() },
                    target.diagnostic_arguments(),
                    location,
                ));
            }
        }
    }

    fn check_annotated(
        &self,
        source: &SymbolOrigin,
        available: CapabilityKind,
        requirement: &RequiredCapability,
        location: Location,
        sink: &mut DiagnosticSink,
    ) {
        if available.satisfies(requirement.required) {
            return;
        }

        let missing = available.missing_from(requirement.required);
        let target = &requirement.target;
        let mut arguments = target.diagnostic_arguments();
        arguments.extend(source.diagnostic_arguments());
        arguments.push(missing.to_string());

        sink.report(Diagnostic::new(
            DiagnosticKind::Mismatch {
                source: source.shape(),
                target: target.shape(),
            },
            arguments,
            location,
        ));
    }

    fn mark(&self, ty: &TypeRef, required: CapabilityKind) {
        self.marker.mark_type(ty, required);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{GenericParamRef, MethodRef, OriginShape};
    use crate::table::SymbolTable;

    fn parameter_target(required: CapabilityKind) -> RequiredCapability {
        RequiredCapability::new(
            SymbolOrigin::Parameter {
                method: MethodRef::new("Sink.Require(Type)"),
                index: 0,
                name: "type".into(),
            },
            required,
        )
    }

    fn return_of(method: &str, capabilities: CapabilityKind) -> LatticeValue {
        LatticeValue::annotated(
            SymbolOrigin::ReturnValue {
                method: MethodRef::new(method),
            },
            capabilities,
        )
    }

    fn run(values: MultiValue, requirement: &RequiredCapability, table: &SymbolTable) -> Vec<Diagnostic> {
        let enforcer = CapabilityEnforcer::new(table, table);
        let mut sink = DiagnosticSink::new();
        enforcer.enforce(&values, requirement, Location::new(1, 1), &mut sink);
        sink.drain()
    }

    #[test]
    fn test_no_requirement_is_a_no_op() {
        let table = SymbolTable::new();
        let diagnostics = run(
            MultiValue::singleton(LatticeValue::Unknown),
            &parameter_target(CapabilityKind::NONE),
            &table,
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_mismatch_reports_missing_bits() {
        let table = SymbolTable::new();
        let diagnostics = run(
            MultiValue::singleton(return_of("C.Get()", CapabilityKind::PUBLIC_FIELDS)),
            &parameter_target(CapabilityKind::PUBLIC_METHODS | CapabilityKind::PUBLIC_FIELDS),
            &table,
        );

        assert_eq!(diagnostics.len(), 1);
        let diagnostic = &diagnostics[0];
        assert_eq!(diagnostic.code(), 2072);
        assert_eq!(
            diagnostic.arguments(),
            ["type", "Sink.Require(Type)", "C.Get()", "PublicMethods"].map(String::from)
        );
    }

    #[test]
    fn test_each_insufficient_value_reports() {
        let table = SymbolTable::new();
        let values = MultiValue::from_values([
            return_of("A()", CapabilityKind::PUBLIC_FIELDS),
            return_of("B()", CapabilityKind::PUBLIC_METHODS),
            return_of("C()", CapabilityKind::NONE),
            LatticeValue::Unknown,
        ]);
        let diagnostics = run(values, &parameter_target(CapabilityKind::PUBLIC_METHODS), &table);

        let codes: Vec<u16> = diagnostics.iter().map(Diagnostic::code).collect();
        assert_eq!(codes, vec![2072, 2072, 2062]);
    }

    #[test]
    fn test_null_and_unresolved_strings_are_accepted() {
        let table = SymbolTable::new();
        let values = MultiValue::from_values([LatticeValue::Null, LatticeValue::string_constant("Missing.Type")]);
        let diagnostics = run(values, &parameter_target(CapabilityKind::ALL), &table);
        assert!(diagnostics.is_empty());
        assert!(table.marked_types().is_empty());
    }

    #[test]
    fn test_known_types_are_marked() {
        let mut table = SymbolTable::new();
        table.type_symbol("Ns.Foo");
        let values = MultiValue::from_values([
            LatticeValue::concrete("Ns.Bar"),
            LatticeValue::string_constant("Ns.Foo, Assembly"),
        ]);
        let diagnostics = run(values, &parameter_target(CapabilityKind::PUBLIC_METHODS), &table);

        assert!(diagnostics.is_empty());
        assert_eq!(
            table.marked_types(),
            vec![
                (TypeRef::new("Ns.Bar"), CapabilityKind::PUBLIC_METHODS),
                (TypeRef::new("Ns.Foo"), CapabilityKind::PUBLIC_METHODS),
            ]
        );
    }

    #[test]
    fn test_constructor_constraint_exemption_is_exact() {
        let table = SymbolTable::new();
        let value = LatticeValue::GenericParameterWithCtorConstraint {
            parameter: GenericParamRef::new("C.M<T>()", "T"),
            capabilities: CapabilityKind::NONE,
        };

        let exact = run(
            MultiValue::singleton(value.clone()),
            &parameter_target(CapabilityKind::PUBLIC_PARAMETERLESS_CONSTRUCTOR),
            &table,
        );
        assert!(exact.is_empty());

        let other = run(
            MultiValue::singleton(value.clone()),
            &parameter_target(CapabilityKind::PUBLIC_METHODS),
            &table,
        );
        assert_eq!(other.len(), 1);
        assert_eq!(
            other[0].kind(),
            DiagnosticKind::Mismatch {
                source: OriginShape::GenericParameter,
                target: OriginShape::Parameter
            }
        );

        let wider = run(
            MultiValue::singleton(value),
            &parameter_target(CapabilityKind::PUBLIC_CONSTRUCTORS),
            &table,
        );
        assert_eq!(wider.len(), 1);
    }

    #[test]
    fn test_unknown_kind_follows_target_shape() {
        let table = SymbolTable::new();
        let target = RequiredCapability::new(
            SymbolOrigin::Field {
                field: crate::symbols::FieldRef::new("C._type"),
            },
            CapabilityKind::PUBLIC_METHODS,
        );
        let diagnostics = run(MultiValue::singleton(LatticeValue::Unknown), &target, &table);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code(), 2064);
        assert_eq!(diagnostics[0].arguments(), ["C._type".to_string()]);
    }
}
