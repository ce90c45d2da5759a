//! Parallel analysis of many units
//!
//! Units share nothing but the read-only host, so they are analyzed
//! independently on a rayon pool. Results come back in input order.

use crate::config::AnalysisConfig;
use rayon::prelude::*;
use rayon::{ThreadPoolBuildError, ThreadPoolBuilder};
use serde::{Deserialize, Serialize, Serializer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use trimcheck_core::dataflow::AnalysisUnit;
use trimcheck_core::generics::InstantiationSite;
use trimcheck_core::symbols::{MemberMarker, MethodRef, SymbolModel, TypeNameResolver};
use trimcheck_core::validation::Declaration;
use trimcheck_core::{AnalysisError, AnalyzerOptions, Diagnostic, ExemptionReason, TrimAnalyzer};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to start analysis workers: {0}")]
    ThreadPool(#[from] ThreadPoolBuildError),
}

/// Cooperative cancellation, checked before each unit starts
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

fn serialize_display<S: Serializer>(error: &AnalysisError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitOutcome {
    Completed {
        diagnostics: Vec<Diagnostic>,
        /// Diagnostics removed by the suppression list
        suppressed: usize,
    },
    Exempt {
        reason: ExemptionReason,
    },
    /// The unit violated the host contract; nothing from it is reported
    Aborted {
        #[serde(serialize_with = "serialize_display")]
        error: AnalysisError,
    },
    /// Not started because the run was cancelled or an earlier unit aborted
    /// under `fail_fast`
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub method: MethodRef,
    #[serde(flatten)]
    pub outcome: UnitOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub units: Vec<UnitReport>,
}

impl BatchReport {
    /// Reported diagnostics of every completed unit, in unit order
    pub fn diagnostics(&self) -> impl Iterator<Item = (&MethodRef, &Diagnostic)> {
        self.units.iter().flat_map(|unit| {
            let diagnostics: &[Diagnostic] = match &unit.outcome {
                UnitOutcome::Completed { diagnostics, .. } => diagnostics.as_slice(),
                _ => &[],
            };
            diagnostics.iter().map(move |diagnostic| (&unit.method, diagnostic))
        })
    }

    pub fn diagnostic_count(&self) -> usize {
        self.diagnostics().count()
    }

    pub fn suppressed_count(&self) -> usize {
        self.units
            .iter()
            .map(|unit| match unit.outcome {
                UnitOutcome::Completed { suppressed, .. } => suppressed,
                _ => 0,
            })
            .sum()
    }

    pub fn completed_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, UnitOutcome::Completed { .. }))
    }

    pub fn exempt_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, UnitOutcome::Exempt { .. }))
    }

    pub fn cancelled_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, UnitOutcome::Cancelled))
    }

    /// Units aborted with a contract violation
    pub fn aborted(&self) -> impl Iterator<Item = (&MethodRef, &AnalysisError)> {
        self.units.iter().filter_map(|unit| match &unit.outcome {
            UnitOutcome::Aborted { error } => Some((&unit.method, error)),
            _ => None,
        })
    }

    /// No diagnostics, no aborted units and nothing left unanalyzed
    pub fn is_clean(&self) -> bool {
        self.units.iter().all(|unit| match &unit.outcome {
            UnitOutcome::Completed { diagnostics, .. } => diagnostics.is_empty(),
            UnitOutcome::Exempt { .. } => true,
            UnitOutcome::Aborted { .. } | UnitOutcome::Cancelled => false,
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn count(&self, predicate: impl Fn(&UnitOutcome) -> bool) -> usize {
        self.units.iter().filter(|unit| predicate(&unit.outcome)).count()
    }
}

/// Declaration-level inputs: generic instantiations outside any body and
/// annotated declarations whose placement is checked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclarationInput {
    pub sites: Vec<InstantiationSite>,
    pub declarations: Vec<Declaration>,
}

/// A standalone site that violated the host contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteFailure {
    /// Position of the site in [`DeclarationInput::sites`]
    pub index: usize,
    #[serde(serialize_with = "serialize_display")]
    pub error: AnalysisError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeclarationReport {
    /// Site diagnostics in site order, then placement diagnostics
    pub diagnostics: Vec<Diagnostic>,
    pub suppressed: usize,
    pub aborted: Vec<SiteFailure>,
    /// Sites not checked because the run was cancelled or stopped early
    pub cancelled: usize,
}

impl DeclarationReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty() && self.aborted.is_empty() && self.cancelled == 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

enum SiteOutcome {
    Checked(Vec<Diagnostic>),
    Aborted(AnalysisError),
    Cancelled,
}

/// Analyzes many units against one shared host
pub struct BatchAnalyzer<'h, H> {
    host: &'h H,
    config: AnalysisConfig,
    cancellation: CancellationToken,
}

impl<'h, H> BatchAnalyzer<'h, H>
where
    H: SymbolModel + TypeNameResolver + MemberMarker + Sync,
{
    pub fn new(host: &'h H, config: AnalysisConfig) -> Self {
        Self {
            host,
            config,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Token that cancels units not yet started
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn run(&self, units: &[AnalysisUnit]) -> Result<BatchReport, BatchError> {
        let start = Instant::now();
        let pool = self.thread_pool()?;

        let options = self.config.analyzer_options();
        let suppressed = self.config.suppressed_codes();
        let stop = AtomicBool::new(false);

        let units: Vec<UnitReport> = pool.install(|| {
            units
                .par_iter()
                .map(|unit| UnitReport {
                    method: unit.method.clone(),
                    outcome: self.analyze_unit(unit, options, &suppressed, &stop),
                })
                .collect()
        });

        let report = BatchReport { units };
        info!(
            units = report.units.len(),
            diagnostics = report.diagnostic_count(),
            suppressed = report.suppressed_count(),
            exempt = report.exempt_count(),
            aborted = report.aborted().count(),
            cancelled = report.cancelled_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "batch analysis finished"
        );
        Ok(report)
    }

    /// Check standalone instantiation sites in parallel, then validate
    /// annotation placement
    pub fn check_declarations(&self, input: &DeclarationInput) -> Result<DeclarationReport, BatchError> {
        let start = Instant::now();
        let pool = self.thread_pool()?;
        let suppressed = self.config.suppressed_codes();
        let stop = AtomicBool::new(false);

        let outcomes: Vec<SiteOutcome> = pool.install(|| {
            input
                .sites
                .par_iter()
                .map(|site| self.check_site(site, &stop))
                .collect()
        });

        let analyzer = TrimAnalyzer::for_host(self.host);
        let mut report = DeclarationReport::default();
        let mut diagnostics = Vec::new();
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                SiteOutcome::Checked(found) => diagnostics.extend(found),
                SiteOutcome::Aborted(error) => report.aborted.push(SiteFailure { index, error }),
                SiteOutcome::Cancelled => report.cancelled += 1,
            }
        }
        diagnostics.extend(analyzer.validate(&input.declarations));

        let total = diagnostics.len();
        diagnostics.retain(|diagnostic| !suppressed.contains(&diagnostic.code()));
        report.suppressed = total - diagnostics.len();
        report.diagnostics = diagnostics;

        info!(
            sites = input.sites.len(),
            declarations = input.declarations.len(),
            diagnostics = report.diagnostics.len(),
            suppressed = report.suppressed,
            aborted = report.aborted.len(),
            cancelled = report.cancelled,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "declaration checks finished"
        );
        Ok(report)
    }

    fn thread_pool(&self) -> Result<rayon::ThreadPool, BatchError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.threads.unwrap_or(0))
            .build()?;
        Ok(pool)
    }

    fn check_site(&self, site: &InstantiationSite, stop: &AtomicBool) -> SiteOutcome {
        if self.cancellation.is_cancelled() || stop.load(Ordering::Relaxed) {
            return SiteOutcome::Cancelled;
        }
        match TrimAnalyzer::for_host(self.host).check_instantiation_site(site) {
            Ok(diagnostics) => SiteOutcome::Checked(diagnostics),
            Err(error) => {
                warn!(definition = %site.instantiation.definition, %error, "instantiation site aborted");
                if self.config.fail_fast {
                    stop.store(true, Ordering::Relaxed);
                }
                SiteOutcome::Aborted(error)
            }
        }
    }

    fn analyze_unit(
        &self,
        unit: &AnalysisUnit,
        options: AnalyzerOptions,
        suppressed: &[u16],
        stop: &AtomicBool,
    ) -> UnitOutcome {
        if self.cancellation.is_cancelled() || stop.load(Ordering::Relaxed) {
            debug!(method = %unit.method, "unit not started");
            return UnitOutcome::Cancelled;
        }

        let analyzer = TrimAnalyzer::for_host(self.host).with_options(options);
        if let Some(reason) = analyzer.exemption(unit) {
            return UnitOutcome::Exempt { reason };
        }

        match analyzer.analyze(unit) {
            Ok(mut diagnostics) => {
                let total = diagnostics.len();
                diagnostics.retain(|diagnostic| !suppressed.contains(&diagnostic.code()));
                UnitOutcome::Completed {
                    suppressed: total - diagnostics.len(),
                    diagnostics,
                }
            }
            Err(error) => {
                warn!(method = %unit.method, %error, "unit aborted");
                if self.config.fail_fast {
                    stop.store(true, Ordering::Relaxed);
                }
                UnitOutcome::Aborted { error }
            }
        }
    }
}
