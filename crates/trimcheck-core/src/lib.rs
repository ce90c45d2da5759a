//! # Trimcheck Core
//!
//! Flow-sensitive analysis of reflection capability annotations.
//!
//! Values of type `System.Type` (and type-name strings) are tracked through a
//! method body. Wherever such a value flows into a parameter, return value,
//! field, implicit `this` or generic parameter that declares a
//! [`CapabilityKind`] requirement, every value that may reach the position is
//! checked. Insufficient values become [`Diagnostic`]s for the host to render.
//!
//! ## Modules
//!
//! - **[`dataflow`]** - CFG model, value lattice, classifier and driver
//! - **[`enforcer`]** - Checking values against requirements
//! - **[`symbols`]** - Symbol identities and host interfaces
//! - **[`table`]** - In-memory symbol model
//! - **[`validation`]** - Annotation placement checks
//!
//! ## Quick Start
//!
//! ```rust
//! use trimcheck_core::prelude::*;
//!
//! let mut table = SymbolTable::new();
//! table
//!     .method("Sink.Require(Type)")
//!     .parameter("type", CapabilityKind::PUBLIC_METHODS);
//! table.method("Source.Get()").returns(CapabilityKind::PUBLIC_FIELDS);
//!
//! let mut builder = CfgBuilder::new();
//! let entry = builder.entry();
//! let source = Operand::call(Invocation::new("Source.Get()"));
//! let call = Invocation::new("Sink.Require(Type)").with_argument(source);
//! builder.push(entry, Operation::Evaluate(Operand::call(call)), Location::new(3, 9));
//! let unit = AnalysisUnit::new("Program.Main()", builder.build()?);
//!
//! let diagnostics = TrimAnalyzer::for_host(&table).analyze(&unit)?;
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].code(), 2072);
//! # Ok::<(), trimcheck_core::AnalysisError>(())
//! ```

pub mod analyzer;
pub mod dataflow;
pub mod diagnostics;
pub mod enforcer;
pub mod error;
pub mod generics;
pub mod symbols;
pub mod table;
pub mod validation;

pub use analyzer::{AnalyzerOptions, ExemptionReason, TrimAnalyzer};
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, Location, PlacementKind};
pub use error::{AnalysisError, Result};
pub use trimcheck_annotations::CapabilityKind;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::analyzer::{AnalyzerOptions, ExemptionReason, TrimAnalyzer};
    pub use crate::dataflow::{
        AnalysisUnit, BlockId, CfgBuilder, ControlFlowGraph, GenericInstantiation, Invocation, LatticeValue,
        MultiValue, Operand, Operation, RegionKind, Slot, TypeArgument, ValueSet,
    };
    pub use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, Location, PlacementKind};
    pub use crate::enforcer::{CapabilityEnforcer, RequiredCapability};
    pub use crate::error::AnalysisError;
    pub use crate::generics::{InstantiationSite, SiteOwner};
    pub use crate::symbols::{
        FieldRef, GenericParamRef, MemberMarker, MethodRef, OriginShape, SymbolModel, SymbolOrigin, TypeNameResolver,
        TypeRef,
    };
    pub use crate::table::SymbolTable;
    pub use crate::validation::{validate_declaration, Declaration, DeclarationSite};
    pub use trimcheck_annotations::CapabilityKind;
}
