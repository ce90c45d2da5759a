//! Abstract values tracked by the analysis

use super::lattice::ValueSet;
use crate::symbols::{GenericParamRef, SymbolOrigin, TypeRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use trimcheck_annotations::CapabilityKind;

/// A value whose capability set is declared by the symbol it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotatedValue {
    pub origin: SymbolOrigin,
    pub capabilities: CapabilityKind,
}

impl AnnotatedValue {
    pub fn new(origin: SymbolOrigin, capabilities: CapabilityKind) -> Self {
        Self { origin, capabilities }
    }
}

/// What a single expression could be at runtime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LatticeValue {
    /// Top: nothing is known about the value
    Unknown,
    /// A null reference
    Null,
    /// A statically known type
    ConcreteType(TypeRef),
    /// A literal string that may name a type
    ConstantString(String),
    /// A value carrying its origin's declared annotation
    Annotated(AnnotatedValue),
    /// A generic parameter with a public parameterless constructor constraint
    GenericParameterWithCtorConstraint {
        parameter: GenericParamRef,
        capabilities: CapabilityKind,
    },
}

/// The value-set type the driver tracks per slot
pub type MultiValue = ValueSet<LatticeValue>;

impl LatticeValue {
    pub fn annotated(origin: SymbolOrigin, capabilities: CapabilityKind) -> Self {
        LatticeValue::Annotated(AnnotatedValue::new(origin, capabilities))
    }

    pub fn concrete(name: impl Into<String>) -> Self {
        LatticeValue::ConcreteType(TypeRef::new(name))
    }

    pub fn string_constant(text: impl Into<String>) -> Self {
        LatticeValue::ConstantString(text.into())
    }
}

impl fmt::Display for LatticeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LatticeValue::Unknown => f.write_str("<unknown>"),
            LatticeValue::Null => f.write_str("null"),
            LatticeValue::ConcreteType(ty) => write!(f, "typeof({ty})"),
            LatticeValue::ConstantString(text) => write!(f, "\"{text}\""),
            LatticeValue::Annotated(value) => write!(f, "{} [{}]", value.origin, value.capabilities),
            LatticeValue::GenericParameterWithCtorConstraint { parameter, capabilities } => {
                write!(f, "{parameter} : new() [{capabilities}]")
            }
        }
    }
}
