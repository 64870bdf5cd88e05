//! # ll-grammar-model
//!
//! Analysis core of an LL(k) parser generator. It takes a grammar that a front
//! end has already built into a [`GrammarRegistry`] and decides, for every
//! choice and repetition, how a predictive parser picks its way with at most
//! `k` tokens of lookahead.
//!
//! ## Pipeline
//!
//! 1. **[registry]**: Productions, declared tokens and the arena of [`model`] nodes.
//! 2. **[validator]**: Undefined symbols, unreachable productions, left recursion
//!    and empty repetitions, reported as [`diagnostic`]s.
//! 3. **[analysis]**: Nullability and first-k sets, solved by fixpoint iteration.
//! 4. **[resolver]**: Decision procedures for choices and loops, plus ambiguity
//!    warnings.
//!
//! [`analyze`] runs all of it.

pub mod analysis;
pub mod diagnostic;
pub mod error;
pub mod first_set;
pub mod model;
pub mod options;
pub mod registry;
pub mod resolver;
pub mod validator;

pub use analysis::{LookaheadEngine, Nullability};
pub use diagnostic::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::{AnalysisError, Result};
pub use first_set::FirstKSet;
pub use options::AnalysisOptions;
pub use registry::GrammarRegistry;
pub use resolver::{ChoiceDecision, Decision, DecisionEntry, DecisionTable, Guard, LoopDecision};
pub use validator::{validate, ProductionStatus, ValidationReport};

use indexmap::IndexMap;
use log::info;
use model::ExprId;

/// Everything the backend needs from one analysis run.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub diagnostics: Diagnostics,
    pub decisions: DecisionTable,
    pub status: IndexMap<String, ProductionStatus>,
    /// False when left recursion kept the lookahead engine from running.
    pub lookahead_ran: bool,
}

impl Analysis {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    pub fn decision(&self, id: ExprId) -> Option<&Decision> {
        self.decisions.get(id)
    }

    pub fn production_status(&self, name: &str) -> Option<&ProductionStatus> {
        self.status.get(name)
    }
}

/// Validates the grammar and, unless it is left-recursive, resolves every
/// decision in it.
///
/// Grammar problems come back as diagnostics inside the [`Analysis`]; only
/// internal failures (bad options, a malformed arena, an exploding first-k
/// set) are errors.
pub fn analyze(registry: &GrammarRegistry, options: &AnalysisOptions) -> Result<Analysis> {
    options.validate()?;
    registry.parents()?;

    let report = validate(registry, options);
    let mut diagnostics = report.diagnostics.clone();
    let mut decisions = DecisionTable::default();

    let lookahead_ran = report.is_left_recursion_free();
    if lookahead_ran {
        let mut engine = LookaheadEngine::new(registry, &report, options)?;
        let resolution = resolver::resolve(registry, &mut engine, &report, options)?;
        diagnostics.extend(resolution.diagnostics);
        decisions = resolution.decisions;
    } else {
        info!(
            "skipping lookahead analysis: {} left-recursive cycle(s)",
            report.cycles.len()
        );
    }

    info!(
        "analysis done: {} error(s), {} warning(s), {} decision(s)",
        diagnostics.errors().count(),
        diagnostics.warnings().count(),
        decisions.len()
    );

    Ok(Analysis {
        diagnostics,
        decisions,
        status: report.status,
        lookahead_ran,
    })
}
