//! Symbol identities and the interfaces the host supplies
//!
//! The engine never loads metadata itself. Everything it needs to know about
//! declarations (their annotations, generic constraints, base types) comes
//! through [`SymbolModel`]; string-to-type lookups go through
//! [`TypeNameResolver`]; and keeping the members of statically known types is
//! delegated to [`MemberMarker`].

use serde::{Deserialize, Serialize};
use std::fmt;
use trimcheck_annotations::CapabilityKind;

macro_rules! symbol_name {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

symbol_name!(
    /// Fully qualified name of a type
    TypeRef
);
symbol_name!(
    /// Display name of a method, unique within one symbol model
    MethodRef
);
symbol_name!(
    /// Fully qualified name of a field
    FieldRef
);

/// Well-known type produced by `typeof(T[])` style type arguments.
pub const SYSTEM_ARRAY: &str = "System.Array";

/// Method whose return value models `Type.BaseType`.
pub const BASE_TYPE_GETTER: &str = "System.Type.get_BaseType()";

/// A generic type parameter, identified by its declaring type or method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GenericParamRef {
    pub owner: String,
    pub name: String,
}

impl GenericParamRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for GenericParamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// What the host knows about a generic parameter's declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenericParameterInfo {
    pub capabilities: CapabilityKind,
    pub has_default_constructor_constraint: bool,
}

/// Shape of a capability-bearing symbol; indexes the diagnostic vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OriginShape {
    Parameter,
    ReturnValue,
    Field,
    ThisParameter,
    GenericParameter,
}

impl OriginShape {
    pub const ALL: [OriginShape; 5] = [
        OriginShape::Parameter,
        OriginShape::ReturnValue,
        OriginShape::Field,
        OriginShape::ThisParameter,
        OriginShape::GenericParameter,
    ];

    pub(crate) fn index(self) -> u16 {
        match self {
            OriginShape::Parameter => 0,
            OriginShape::ReturnValue => 1,
            OriginShape::Field => 2,
            OriginShape::ThisParameter => 3,
            OriginShape::GenericParameter => 4,
        }
    }
}

/// A declaration that can carry a capability annotation.
///
/// Used both as the provenance of an annotated value and as the description
/// of a checked target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolOrigin {
    Parameter { method: MethodRef, index: u32, name: String },
    ReturnValue { method: MethodRef },
    Field { field: FieldRef },
    ThisParameter { method: MethodRef },
    GenericParameter { parameter: GenericParamRef },
}

impl SymbolOrigin {
    pub fn shape(&self) -> OriginShape {
        match self {
            SymbolOrigin::Parameter { .. } => OriginShape::Parameter,
            SymbolOrigin::ReturnValue { .. } => OriginShape::ReturnValue,
            SymbolOrigin::Field { .. } => OriginShape::Field,
            SymbolOrigin::ThisParameter { .. } => OriginShape::ThisParameter,
            SymbolOrigin::GenericParameter { .. } => OriginShape::GenericParameter,
        }
    }

    /// Positional arguments describing this symbol in a diagnostic
    pub fn diagnostic_arguments(&self) -> Vec<String> {
        match self {
            SymbolOrigin::Parameter { method, name, .. } => vec![name.clone(), method.to_string()],
            SymbolOrigin::ReturnValue { method } => vec![method.to_string()],
            SymbolOrigin::Field { field } => vec![field.to_string()],
            SymbolOrigin::ThisParameter { method } => vec![method.to_string()],
            SymbolOrigin::GenericParameter { parameter } => {
                vec![parameter.name.clone(), parameter.owner.clone()]
            }
        }
    }
}

impl fmt::Display for SymbolOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolOrigin::Parameter { method, name, .. } => write!(f, "parameter '{name}' of '{method}'"),
            SymbolOrigin::ReturnValue { method } => write!(f, "return value of '{method}'"),
            SymbolOrigin::Field { field } => write!(f, "field '{field}'"),
            SymbolOrigin::ThisParameter { method } => write!(f, "implicit 'this' of '{method}'"),
            SymbolOrigin::GenericParameter { parameter } => {
                write!(f, "generic parameter '{}' of '{}'", parameter.name, parameter.owner)
            }
        }
    }
}

/// Declarations and their annotations, as seen by the host's type system.
///
/// Undeclared annotations are [`CapabilityKind::NONE`].
pub trait SymbolModel {
    fn parameter_capabilities(&self, method: &MethodRef, index: u32) -> CapabilityKind;

    fn parameter_name(&self, _method: &MethodRef, index: u32) -> String {
        format!("#{index}")
    }

    fn return_capabilities(&self, method: &MethodRef) -> CapabilityKind;

    fn this_capabilities(&self, method: &MethodRef) -> CapabilityKind;

    fn field_capabilities(&self, field: &FieldRef) -> CapabilityKind;

    fn generic_parameter(&self, parameter: &GenericParamRef) -> GenericParameterInfo;

    /// Generic parameters declared by a generic type or method definition, in
    /// order; `None` when the definition is unknown to the model.
    fn generic_parameters(&self, definition: &str) -> Option<Vec<GenericParamRef>>;

    fn base_type_of(&self, ty: &TypeRef) -> Option<TypeRef>;

    /// Whether the member carries the unreferenced-code escape, directly or
    /// through its declaring type.
    fn is_exempt(&self, method: &MethodRef) -> bool;
}

/// Resolves the text of a string constant to a type, as `Type.GetType` would.
pub trait TypeNameResolver {
    fn resolve(&self, text: &str) -> Option<TypeRef>;
}

/// Receives statically known types whose members must be kept.
pub trait MemberMarker {
    fn mark_type(&self, ty: &TypeRef, required: CapabilityKind);
}
