//! Entry points for hosts
//!
//! [`TrimAnalyzer`] ties the host's symbol model, type-name resolver and
//! member marker together and runs one unit at a time. It holds no state
//! between calls, so one analyzer may serve any number of units.

use crate::dataflow::{AnalysisUnit, DataflowDriver};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::enforcer::CapabilityEnforcer;
use crate::error::Result;
use crate::generics::{InstantiationChecker, InstantiationSite, SiteOwner};
use crate::symbols::{MemberMarker, SymbolModel, TypeNameResolver};
use crate::validation::{validate_declaration, Declaration};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerOptions {
    /// Skip async bodies and bodies containing lambdas, local functions or
    /// iterator yields
    pub skip_compiler_generated: bool,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            skip_compiler_generated: true,
        }
    }
}

/// Why a unit produced no diagnostics without being analyzed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExemptionReason {
    RequiresUnreferencedCode,
    Async,
    CompilerGenerated,
}

impl fmt::Display for ExemptionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExemptionReason::RequiresUnreferencedCode => write!(f, "requires unreferenced code"),
            ExemptionReason::Async => write!(f, "async method"),
            ExemptionReason::CompilerGenerated => write!(f, "contains compiler-generated code"),
        }
    }
}

pub struct TrimAnalyzer<'a> {
    symbols: &'a dyn SymbolModel,
    enforcer: CapabilityEnforcer<'a>,
    options: AnalyzerOptions,
}

impl<'a> TrimAnalyzer<'a> {
    pub fn new(
        symbols: &'a dyn SymbolModel,
        resolver: &'a dyn TypeNameResolver,
        marker: &'a dyn MemberMarker,
    ) -> Self {
        Self {
            symbols,
            enforcer: CapabilityEnforcer::new(resolver, marker),
            options: AnalyzerOptions::default(),
        }
    }

    /// Analyzer for a host implementing every interface itself
    pub fn for_host<H>(host: &'a H) -> Self
    where
        H: SymbolModel + TypeNameResolver + MemberMarker,
    {
        Self::new(host, host, host)
    }

    pub fn with_options(mut self, options: AnalyzerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> AnalyzerOptions {
        self.options
    }

    /// Reason the unit is skipped entirely, if any
    pub fn exemption(&self, unit: &AnalysisUnit) -> Option<ExemptionReason> {
        if self.symbols.is_exempt(&unit.method) {
            return Some(ExemptionReason::RequiresUnreferencedCode);
        }
        if !self.options.skip_compiler_generated {
            return None;
        }
        if unit.is_async {
            Some(ExemptionReason::Async)
        } else if unit.has_compiler_generated_code() {
            Some(ExemptionReason::CompilerGenerated)
        } else {
            None
        }
    }

    /// Analyze one method body
    ///
    /// Returns every diagnostic of the unit in emission order. Exempt units
    /// return no diagnostics. `Err` means the host handed over a malformed
    /// unit; nothing from the unit should be trusted in that case.
    pub fn analyze(&self, unit: &AnalysisUnit) -> Result<Vec<Diagnostic>> {
        if let Some(reason) = self.exemption(unit) {
            debug!(method = %unit.method, %reason, "skipping exempt unit");
            return Ok(Vec::new());
        }

        let mut sink = DiagnosticSink::new();
        DataflowDriver::new(unit, self.symbols, &self.enforcer).run(&mut sink)?;
        let diagnostics = sink.drain();
        debug!(method = %unit.method, diagnostics = diagnostics.len(), "analyzed unit");
        Ok(diagnostics)
    }

    /// Check a generic instantiation appearing in a declaration rather than
    /// a body
    ///
    /// A site owned by an exempt member is skipped. Sites owned by a type
    /// are always checked: exempting a derived type does not cover the
    /// arguments of its base type.
    pub fn check_instantiation_site(&self, site: &InstantiationSite) -> Result<Vec<Diagnostic>> {
        if let SiteOwner::Member(member) = &site.owner {
            if self.symbols.is_exempt(member) {
                debug!(member = %member, "skipping instantiation site in exempt member");
                return Ok(Vec::new());
            }
        }

        let mut sink = DiagnosticSink::new();
        InstantiationChecker::new(self.symbols, &self.enforcer).check(&site.instantiation, site.location, &mut sink)?;
        Ok(sink.drain())
    }

    /// Check annotation placement on `declarations`
    pub fn validate(&self, declarations: &[Declaration]) -> Vec<Diagnostic> {
        let mut sink = DiagnosticSink::new();
        for declaration in declarations {
            validate_declaration(declaration, &mut sink);
        }
        sink.drain()
    }
}
