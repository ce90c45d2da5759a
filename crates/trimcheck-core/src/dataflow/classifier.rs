//! Classification of operations into lattice values
//!
//! The classifier answers "what is this leaf" questions from the symbol
//! model alone. Reading slots, evaluating calls and enforcing annotations is
//! the driver's job; it calls back into here for every leaf it meets.

use super::cfg::TypeArgument;
use super::value::{AnnotatedValue, LatticeValue, MultiValue};
use crate::symbols::{
    FieldRef, GenericParamRef, MethodRef, SymbolModel, SymbolOrigin, TypeRef, BASE_TYPE_GETTER, SYSTEM_ARRAY,
};
use trimcheck_annotations::CapabilityKind;

pub struct ValueClassifier<'a> {
    symbols: &'a dyn SymbolModel,
}

impl<'a> ValueClassifier<'a> {
    pub fn new(symbols: &'a dyn SymbolModel) -> Self {
        Self { symbols }
    }

    /// Initial value of a parameter slot on method entry
    pub fn parameter(&self, method: &MethodRef, index: u32) -> LatticeValue {
        LatticeValue::annotated(
            SymbolOrigin::Parameter {
                method: method.clone(),
                index,
                name: self.symbols.parameter_name(method, index),
            },
            self.symbols.parameter_capabilities(method, index),
        )
    }

    /// Initial value of the implicit `this` slot
    pub fn this_parameter(&self, method: &MethodRef) -> LatticeValue {
        LatticeValue::annotated(
            SymbolOrigin::ThisParameter { method: method.clone() },
            self.symbols.this_capabilities(method),
        )
    }

    pub fn field(&self, field: &FieldRef) -> LatticeValue {
        LatticeValue::annotated(
            SymbolOrigin::Field { field: field.clone() },
            self.symbols.field_capabilities(field),
        )
    }

    /// Value returned by a call; the callee's return annotation describes it
    /// even when no annotation is declared
    pub fn call_result(&self, method: &MethodRef) -> LatticeValue {
        LatticeValue::annotated(
            SymbolOrigin::ReturnValue { method: method.clone() },
            self.symbols.return_capabilities(method),
        )
    }

    /// `typeof(T)` for a generic parameter
    pub fn generic_parameter(&self, parameter: &GenericParamRef) -> LatticeValue {
        let info = self.symbols.generic_parameter(parameter);
        if info.has_default_constructor_constraint {
            LatticeValue::GenericParameterWithCtorConstraint {
                parameter: parameter.clone(),
                capabilities: info.capabilities,
            }
        } else {
            LatticeValue::annotated(
                SymbolOrigin::GenericParameter {
                    parameter: parameter.clone(),
                },
                info.capabilities,
            )
        }
    }

    /// Value supplied by a type argument, `None` for placeholders that are
    /// never checked
    ///
    /// A constructed argument classifies as its definition; the caller
    /// checks the nested arguments as an instantiation of their own.
    pub fn type_argument(&self, argument: &TypeArgument) -> Option<LatticeValue> {
        match argument {
            TypeArgument::Named(ty) => Some(LatticeValue::ConcreteType(ty.clone())),
            TypeArgument::Array(_) => Some(LatticeValue::concrete(SYSTEM_ARRAY)),
            TypeArgument::GenericParameter(parameter) => Some(self.generic_parameter(parameter)),
            TypeArgument::Constructed(instantiation) => Some(LatticeValue::concrete(instantiation.definition.clone())),
            TypeArgument::Error => None,
        }
    }

    /// Values of `value.BaseType` for every value in `values`
    pub fn base_type_of(&self, values: &MultiValue) -> MultiValue {
        values.map(|value| self.base_type_of_value(value))
    }

    fn base_type_of_value(&self, value: &LatticeValue) -> LatticeValue {
        let projected = |capabilities: CapabilityKind| {
            LatticeValue::Annotated(AnnotatedValue::new(
                SymbolOrigin::ReturnValue {
                    method: MethodRef::new(BASE_TYPE_GETTER),
                },
                capabilities.propagated_to_base_type(),
            ))
        };

        match value {
            LatticeValue::Annotated(annotated) => projected(annotated.capabilities),
            LatticeValue::GenericParameterWithCtorConstraint { capabilities, .. } => projected(*capabilities),
            LatticeValue::ConcreteType(ty) => match self.symbols.base_type_of(ty) {
                Some(base) => LatticeValue::ConcreteType(base),
                None => LatticeValue::Null,
            },
            LatticeValue::Null => LatticeValue::Null,
            LatticeValue::ConstantString(_) | LatticeValue::Unknown => LatticeValue::Unknown,
        }
    }

    pub fn type_of(&self, ty: &TypeRef) -> LatticeValue {
        LatticeValue::ConcreteType(ty.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::cfg::GenericInstantiation;
    use crate::table::SymbolTable;

    fn table() -> SymbolTable {
        let mut table = SymbolTable::new();
        table
            .method("C.M(Type)")
            .parameter("type", CapabilityKind::PUBLIC_METHODS)
            .returns(CapabilityKind::PUBLIC_FIELDS);
        table.field("C._field", CapabilityKind::INTERFACES);
        table.declare_generic_parameter("C.Gen<T>", "T", CapabilityKind::PUBLIC_METHODS, false);
        table.declare_generic_parameter("C.New<T>", "T", CapabilityKind::PUBLIC_PARAMETERLESS_CONSTRUCTOR, true);
        table.type_symbol("Derived").base("Base");
        table
    }

    #[test]
    fn test_parameter_carries_declared_annotation_and_name() {
        let table = table();
        let classifier = ValueClassifier::new(&table);
        let value = classifier.parameter(&MethodRef::new("C.M(Type)"), 0);

        match value {
            LatticeValue::Annotated(annotated) => {
                assert_eq!(annotated.capabilities, CapabilityKind::PUBLIC_METHODS);
                assert_eq!(annotated.origin.diagnostic_arguments(), vec!["type", "C.M(Type)"]);
            }
            other => panic!("expected annotated value, got {other:?}"),
        }
    }

    #[test]
    fn test_unannotated_call_result_is_still_annotated() {
        let table = table();
        let classifier = ValueClassifier::new(&table);
        let value = classifier.call_result(&MethodRef::new("C.Other()"));
        assert_eq!(
            value,
            LatticeValue::annotated(
                SymbolOrigin::ReturnValue {
                    method: MethodRef::new("C.Other()")
                },
                CapabilityKind::NONE
            )
        );
    }

    #[test]
    fn test_generic_parameter_classification_respects_constraint() {
        let table = table();
        let classifier = ValueClassifier::new(&table);

        let constrained = classifier.generic_parameter(&GenericParamRef::new("C.New<T>", "T"));
        assert!(matches!(
            constrained,
            LatticeValue::GenericParameterWithCtorConstraint { .. }
        ));

        let plain = classifier.generic_parameter(&GenericParamRef::new("C.Gen<T>", "T"));
        assert!(matches!(plain, LatticeValue::Annotated(ref a) if a.capabilities == CapabilityKind::PUBLIC_METHODS));
    }

    #[test]
    fn test_type_arguments() {
        let table = table();
        let classifier = ValueClassifier::new(&table);

        assert_eq!(
            classifier.type_argument(&TypeArgument::Named(TypeRef::new("System.String"))),
            Some(LatticeValue::concrete("System.String"))
        );
        assert_eq!(
            classifier.type_argument(&TypeArgument::Array(Box::new(TypeArgument::Named(TypeRef::new("Foo"))))),
            Some(LatticeValue::concrete(SYSTEM_ARRAY))
        );
        assert_eq!(
            classifier.type_argument(&TypeArgument::Constructed(GenericInstantiation::new("List`1", vec![]))),
            Some(LatticeValue::concrete("List`1"))
        );
        assert_eq!(classifier.type_argument(&TypeArgument::Error), None);
    }

    #[test]
    fn test_base_type_projection() {
        let table = table();
        let classifier = ValueClassifier::new(&table);
        let source = MultiValue::from_values([
            classifier.parameter(&MethodRef::new("C.M(Type)"), 0),
            LatticeValue::concrete("Derived"),
            LatticeValue::concrete("Base"),
            LatticeValue::Null,
            LatticeValue::string_constant("Derived"),
        ]);

        let projected = classifier.base_type_of(&source);
        assert!(projected.contains(&LatticeValue::annotated(
            SymbolOrigin::ReturnValue {
                method: MethodRef::new(BASE_TYPE_GETTER)
            },
            CapabilityKind::PUBLIC_METHODS
        )));
        assert!(projected.contains(&LatticeValue::concrete("Base")));
        // Base has no base type in the table
        assert!(projected.contains(&LatticeValue::Null));
        assert!(projected.contains(&LatticeValue::Unknown));
        assert_eq!(projected.len(), 4);
    }

    #[test]
    fn test_base_type_drops_constructor_capabilities() {
        let table = table();
        let classifier = ValueClassifier::new(&table);
        let source = MultiValue::singleton(classifier.generic_parameter(&GenericParamRef::new("C.New<T>", "T")));

        let projected = classifier.base_type_of(&source);
        assert!(matches!(
            projected.iter().next(),
            Some(LatticeValue::Annotated(a)) if a.capabilities == CapabilityKind::NONE
        ));
    }
}
