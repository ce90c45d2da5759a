//! Generic argument dataflow
//!
//! Each type argument flows into the corresponding generic parameter exactly
//! like a value flows into an annotated method parameter.

use crate::dataflow::{GenericInstantiation, MultiValue, TypeArgument, ValueClassifier};
use crate::diagnostics::{DiagnosticSink, Location};
use crate::enforcer::{CapabilityEnforcer, RequiredCapability};
use crate::error::{AnalysisError, Result};
use crate::symbols::{MethodRef, SymbolModel, SymbolOrigin, TypeRef};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Who declares a standalone instantiation site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteOwner {
    /// A member signature or body
    Member(MethodRef),
    /// A type declaration, e.g. its base type list
    Type(TypeRef),
}

/// A generic instantiation outside any analyzed body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantiationSite {
    pub owner: SiteOwner,
    pub instantiation: GenericInstantiation,
    #[serde(default)]
    pub location: Location,
}

pub(crate) struct InstantiationChecker<'a> {
    symbols: &'a dyn SymbolModel,
    classifier: ValueClassifier<'a>,
    enforcer: &'a CapabilityEnforcer<'a>,
}

impl<'a> InstantiationChecker<'a> {
    pub(crate) fn new(symbols: &'a dyn SymbolModel, enforcer: &'a CapabilityEnforcer<'a>) -> Self {
        Self {
            symbols,
            classifier: ValueClassifier::new(symbols),
            enforcer,
        }
    }

    pub(crate) fn check(
        &self,
        instantiation: &GenericInstantiation,
        location: Location,
        sink: &mut DiagnosticSink,
    ) -> Result<()> {
        self.check_arguments(&instantiation.definition, &instantiation.arguments, location, sink)
    }

    /// Check `arguments` against the generic parameters of `definition`
    pub(crate) fn check_arguments(
        &self,
        definition: &str,
        arguments: &[TypeArgument],
        location: Location,
        sink: &mut DiagnosticSink,
    ) -> Result<()> {
        let Some(parameters) = self.symbols.generic_parameters(definition) else {
            trace!(definition, "generic definition unknown to the symbol model");
            return Ok(());
        };
        if parameters.len() != arguments.len() {
            return Err(AnalysisError::GenericArityMismatch {
                definition: definition.to_string(),
                expected: parameters.len(),
                actual: arguments.len(),
            });
        }

        for (parameter, argument) in parameters.iter().zip(arguments) {
            if let TypeArgument::Constructed(nested) = argument {
                self.check(nested, location, sink)?;
            }
            let Some(value) = self.classifier.type_argument(argument) else {
                continue;
            };
            let requirement = RequiredCapability::new(
                SymbolOrigin::GenericParameter {
                    parameter: parameter.clone(),
                },
                self.symbols.generic_parameter(parameter).capabilities,
            );
            self.enforcer
                .enforce(&MultiValue::singleton(value), &requirement, location, sink);
        }
        Ok(())
    }
}
