//! # Trimcheck Analysis
//!
//! Batch host integration for the trimcheck engine: analyzes many units in
//! parallel, applies configuration and summarizes the run. Declaration-level
//! checks (standalone generic instantiations and annotation placement) run
//! through the same host.
//!
//! ## Modules
//!
//! - **[`batch`]** - Parallel driver, cancellation and reports
//! - **[`config`]** - Configuration loaded from TOML or JSON
//!
//! ## Quick Start
//!
//! ```rust
//! use trimcheck_analysis::prelude::*;
//!
//! let table = SymbolTable::new();
//! let units = vec![AnalysisUnit::new("Program.Main()", CfgBuilder::new().build()?)];
//!
//! let report = BatchAnalyzer::new(&table, AnalysisConfig::default()).run(&units)?;
//! assert!(report.is_clean());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod batch;
pub mod config;

use anyhow::{Context, Result};
use std::path::Path;
use trimcheck_core::dataflow::AnalysisUnit;
use trimcheck_core::table::SymbolTable;

pub use batch::{
    BatchAnalyzer, BatchError, BatchReport, CancellationToken, DeclarationInput, DeclarationReport, SiteFailure,
    UnitOutcome, UnitReport,
};
pub use config::{AnalysisConfig, ConfigError};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::batch::{
        BatchAnalyzer, BatchError, BatchReport, CancellationToken, DeclarationInput, DeclarationReport, SiteFailure,
        UnitOutcome, UnitReport,
    };
    pub use crate::config::{AnalysisConfig, ConfigError};
    pub use trimcheck_annotations::{AnnotationParseError, CapabilityKind};
    pub use trimcheck_core::prelude::*;
}

/// Analyze units stored as JSON against a JSON symbol table
pub fn analyze_files(symbols: &Path, units: &Path, config: AnalysisConfig) -> Result<BatchReport> {
    let table: SymbolTable = read_json(symbols).context("failed to load symbol table")?;
    let units: Vec<AnalysisUnit> = read_json(units).context("failed to load analysis units")?;
    let report = BatchAnalyzer::new(&table, config).run(&units)?;
    Ok(report)
}

/// Check standalone instantiation sites and declaration placement stored as
/// JSON (`{"sites": [...], "declarations": [...]}`) against a JSON symbol table
pub fn check_declaration_files(symbols: &Path, input: &Path, config: AnalysisConfig) -> Result<DeclarationReport> {
    let table: SymbolTable = read_json(symbols).context("failed to load symbol table")?;
    let input: DeclarationInput = read_json(input).context("failed to load declarations")?;
    let report = BatchAnalyzer::new(&table, config).check_declarations(&input)?;
    Ok(report)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}
