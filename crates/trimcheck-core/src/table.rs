//! In-memory symbol model
//!
//! `SymbolTable` is the reference host: it implements [`SymbolModel`],
//! [`TypeNameResolver`] and [`MemberMarker`] from declarations that are
//! either built in code or deserialized from JSON/TOML. Types passed to
//! [`MemberMarker::mark_type`] are recorded once per requirement.

use crate::symbols::{
    FieldRef, GenericParamRef, GenericParameterInfo, MemberMarker, MethodRef, SymbolModel, TypeNameResolver, TypeRef,
};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use trimcheck_annotations::CapabilityKind;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSymbol {
    pub name: String,
    #[serde(default)]
    pub capabilities: CapabilityKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodSymbol {
    pub declaring_type: Option<String>,
    pub parameters: Vec<ParameterSymbol>,
    pub return_capabilities: CapabilityKind,
    pub this_capabilities: CapabilityKind,
    pub requires_unreferenced_code: bool,
}

impl MethodSymbol {
    pub fn parameter(&mut self, name: impl Into<String>, capabilities: CapabilityKind) -> &mut Self {
        self.parameters.push(ParameterSymbol {
            name: name.into(),
            capabilities,
        });
        self
    }

    pub fn returns(&mut self, capabilities: CapabilityKind) -> &mut Self {
        self.return_capabilities = capabilities;
        self
    }

    pub fn this(&mut self, capabilities: CapabilityKind) -> &mut Self {
        self.this_capabilities = capabilities;
        self
    }

    pub fn declared_in(&mut self, ty: impl Into<String>) -> &mut Self {
        self.declaring_type = Some(ty.into());
        self
    }

    pub fn requires_unreferenced_code(&mut self) -> &mut Self {
        self.requires_unreferenced_code = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeSymbol {
    pub base_type: Option<String>,
    pub requires_unreferenced_code: bool,
}

impl TypeSymbol {
    pub fn base(&mut self, base: impl Into<String>) -> &mut Self {
        self.base_type = Some(base.into());
        self
    }

    pub fn requires_unreferenced_code(&mut self) -> &mut Self {
        self.requires_unreferenced_code = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericParameterSymbol {
    pub name: String,
    #[serde(default)]
    pub capabilities: CapabilityKind,
    #[serde(default)]
    pub has_default_constructor_constraint: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolTable {
    methods: IndexMap<String, MethodSymbol>,
    fields: IndexMap<String, CapabilityKind>,
    types: IndexMap<String, TypeSymbol>,
    /// Generic parameters keyed by the declaring type or method definition
    generics: IndexMap<String, Vec<GenericParameterSymbol>>,
    #[serde(skip)]
    marked: Mutex<IndexSet<(TypeRef, CapabilityKind)>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(&mut self, name: impl Into<String>) -> &mut MethodSymbol {
        self.methods.entry(name.into()).or_default()
    }

    pub fn field(&mut self, name: impl Into<String>, capabilities: CapabilityKind) -> &mut Self {
        self.fields.insert(name.into(), capabilities);
        self
    }

    pub fn type_symbol(&mut self, name: impl Into<String>) -> &mut TypeSymbol {
        self.types.entry(name.into()).or_default()
    }

    /// Append a generic parameter to `definition`
    pub fn declare_generic_parameter(
        &mut self,
        definition: impl Into<String>,
        name: impl Into<String>,
        capabilities: CapabilityKind,
        has_default_constructor_constraint: bool,
    ) -> &mut Self {
        self.generics
            .entry(definition.into())
            .or_default()
            .push(GenericParameterSymbol {
                name: name.into(),
                capabilities,
                has_default_constructor_constraint,
            });
        self
    }

    /// Distinct types handed to [`MemberMarker::mark_type`], in first-call order
    pub fn marked_types(&self) -> Vec<(TypeRef, CapabilityKind)> {
        self.marked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn method_symbol(&self, method: &MethodRef) -> Option<&MethodSymbol> {
        self.methods.get(method.as_str())
    }

    fn type_exempt(&self, ty: &str) -> bool {
        self.types.get(ty).is_some_and(|ty| ty.requires_unreferenced_code)
    }
}

impl SymbolModel for SymbolTable {
    fn parameter_capabilities(&self, method: &MethodRef, index: u32) -> CapabilityKind {
        self.method_symbol(method)
            .and_then(|m| m.parameters.get(index as usize))
            .map(|p| p.capabilities)
            .unwrap_or_default()
    }

    fn parameter_name(&self, method: &MethodRef, index: u32) -> String {
        self.method_symbol(method)
            .and_then(|m| m.parameters.get(index as usize))
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("#{index}"))
    }

    fn return_capabilities(&self, method: &MethodRef) -> CapabilityKind {
        self.method_symbol(method)
            .map(|m| m.return_capabilities)
            .unwrap_or_default()
    }

    fn this_capabilities(&self, method: &MethodRef) -> CapabilityKind {
        self.method_symbol(method)
            .map(|m| m.this_capabilities)
            .unwrap_or_default()
    }

    fn field_capabilities(&self, field: &FieldRef) -> CapabilityKind {
        self.fields.get(field.as_str()).copied().unwrap_or_default()
    }

    fn generic_parameter(&self, parameter: &GenericParamRef) -> GenericParameterInfo {
        self.generics
            .get(&parameter.owner)
            .and_then(|params| params.iter().find(|p| p.name == parameter.name))
            .map(|p| GenericParameterInfo {
                capabilities: p.capabilities,
                has_default_constructor_constraint: p.has_default_constructor_constraint,
            })
            .unwrap_or_default()
    }

    fn generic_parameters(&self, definition: &str) -> Option<Vec<GenericParamRef>> {
        self.generics.get(definition).map(|params| {
            params
                .iter()
                .map(|p| GenericParamRef::new(definition, p.name.clone()))
                .collect()
        })
    }

    fn base_type_of(&self, ty: &TypeRef) -> Option<TypeRef> {
        self.types
            .get(ty.as_str())
            .and_then(|t| t.base_type.as_deref())
            .map(TypeRef::new)
    }

    fn is_exempt(&self, method: &MethodRef) -> bool {
        self.method_symbol(method).is_some_and(|m| {
            m.requires_unreferenced_code || m.declaring_type.as_deref().is_some_and(|ty| self.type_exempt(ty))
        })
    }
}

impl TypeNameResolver for SymbolTable {
    /// Resolves declared types; an assembly qualifier after `,` is ignored
    fn resolve(&self, text: &str) -> Option<TypeRef> {
        let name = text.split(',').next().unwrap_or(text).trim();
        self.types.contains_key(name).then(|| TypeRef::new(name))
    }
}

impl MemberMarker for SymbolTable {
    fn mark_type(&self, ty: &TypeRef, required: CapabilityKind) {
        self.marked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((ty.clone(), required));
    }
}
