//! Turns first-k sets into decision procedures.
//!
//! Every `Choice` and repetition node of a production that passed validation
//! gets a [`Decision`] in the [`DecisionTable`], keyed by its [`ExprId`]. The
//! backend translates those decisions into conditionals and never recomputes
//! lookahead itself.

use crate::analysis::LookaheadEngine;
use crate::diagnostic::{DiagnosticKind, Diagnostics};
use crate::error::Result;
use crate::first_set::{display_sequence, display_sequences, FirstKSet};
use crate::model::*;
use crate::options::AnalysisOptions;
use crate::registry::GrammarRegistry;
use crate::validator::ValidationReport;
use itertools::Itertools;
use log::{info, trace};
use std::collections::BTreeMap;
use std::fmt;
use syn::Expr;

/// An explicit lookahead attached to an alternative or a loop. A syntactic
/// guard or a semantic predicate takes the place of the computed first-k test
/// and exempts the decision from conflict checks; a bare depth only changes
/// how far the computed test looks.
#[derive(Debug, Clone)]
pub struct Guard {
    /// Local depth, never 0.
    pub amount: Option<usize>,
    /// The guard expansion and its first-k set at the decision depth.
    pub syntactic: Option<(ExprId, FirstKSet)>,
    pub semantic: Option<Expr>,
}

impl Guard {
    pub fn overrides(&self) -> bool {
        self.syntactic.is_some() || self.semantic.is_some()
    }

    /// `own` is the computed set, scanned only when the guard gives a depth
    /// without a syntactic expansion, or nothing but a depth.
    fn admits<S, F>(&self, own: &FirstKSet, upcoming: &[S], eval: &mut F) -> bool
    where
        S: AsRef<str>,
        F: FnMut(&Expr) -> bool,
    {
        let scan = match &self.syntactic {
            Some((_, set)) => Some(set),
            None if self.amount.is_some() || self.semantic.is_none() => Some(own),
            None => None,
        };
        if let Some(set) = scan {
            if !set.is_nullable() && !set.matches(upcoming) {
                return false;
            }
        }
        match &self.semantic {
            Some(predicate) => eval(predicate),
            None => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecisionEntry {
    /// Index of the alternative in the choice, starting at 0.
    pub alternative: usize,
    pub node: ExprId,
    pub depth: usize,
    pub lookahead: FirstKSet,
    pub guard: Option<Guard>,
    /// Selected whenever it is reached: the alternative can match nothing.
    pub is_default: bool,
}

impl DecisionEntry {
    fn admits<S, F>(&self, upcoming: &[S], eval: &mut F) -> bool
    where
        S: AsRef<str>,
        F: FnMut(&Expr) -> bool,
    {
        match &self.guard {
            Some(guard) => guard.admits(&self.lookahead, upcoming, eval),
            None => self.is_default || self.lookahead.matches(upcoming),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChoiceDecision {
    /// Largest depth used by any entry.
    pub depth: usize,
    pub entries: Vec<DecisionEntry>,
}

impl ChoiceDecision {
    /// First alternative admitting the upcoming tokens. Semantic predicates
    /// are taken to hold.
    pub fn select<S: AsRef<str>>(&self, upcoming: &[S]) -> Option<usize> {
        self.select_with(upcoming, |_| true)
    }

    pub fn select_with<S, F>(&self, upcoming: &[S], mut eval: F) -> Option<usize>
    where
        S: AsRef<str>,
        F: FnMut(&Expr) -> bool,
    {
        self.entries
            .iter()
            .find(|e| e.admits(upcoming, &mut eval))
            .map(|e| e.alternative)
    }

    pub fn default_alternative(&self) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.is_default)
            .map(|e| e.alternative)
    }
}

#[derive(Debug, Clone)]
pub struct LoopDecision {
    pub kind: RepetitionKind,
    pub inner: ExprId,
    pub depth: usize,
    /// Entry (for `(...)?`) or continuation set: first-k of the body.
    pub lookahead: FirstKSet,
    pub guard: Option<Guard>,
}

impl LoopDecision {
    pub fn should_enter<S: AsRef<str>>(&self, upcoming: &[S]) -> bool {
        self.should_enter_with(upcoming, |_| true)
    }

    pub fn should_enter_with<S, F>(&self, upcoming: &[S], mut eval: F) -> bool
    where
        S: AsRef<str>,
        F: FnMut(&Expr) -> bool,
    {
        match &self.guard {
            Some(guard) => guard.admits(&self.lookahead, upcoming, &mut eval),
            None => self.lookahead.matches(upcoming),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Decision {
    Choice(ChoiceDecision),
    Loop(LoopDecision),
}

impl Decision {
    pub fn as_choice(&self) -> Option<&ChoiceDecision> {
        match self {
            Decision::Choice(choice) => Some(choice),
            Decision::Loop(_) => None,
        }
    }

    pub fn as_loop(&self) -> Option<&LoopDecision> {
        match self {
            Decision::Loop(repetition) => Some(repetition),
            Decision::Choice(_) => None,
        }
    }
}

fn fmt_guard(guard: Option<&Guard>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if let Some(guard) = guard {
        if let Some(amount) = guard.amount {
            write!(f, " lookahead({})", amount)?;
        }
        if let Some((id, set)) = &guard.syntactic {
            write!(f, " guard {} {}", id, set)?;
        }
        if guard.semantic.is_some() {
            write!(f, " if {{..}}")?;
        }
    }
    Ok(())
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Choice(choice) => {
                write!(f, "choice k={}", choice.depth)?;
                for entry in &choice.entries {
                    write!(f, " | {}: {}", entry.alternative + 1, entry.lookahead)?;
                    fmt_guard(entry.guard.as_ref(), f)?;
                    if entry.is_default {
                        write!(f, " default")?;
                    }
                }
                Ok(())
            }
            Decision::Loop(repetition) => {
                write!(
                    f,
                    "{} k={}: {}",
                    repetition.kind, repetition.depth, repetition.lookahead
                )?;
                fmt_guard(repetition.guard.as_ref(), f)
            }
        }
    }
}

/// Side table of decisions, ordered by node id.
#[derive(Debug, Clone, Default)]
pub struct DecisionTable {
    decisions: BTreeMap<ExprId, Decision>,
}

impl DecisionTable {
    pub fn get(&self, id: ExprId) -> Option<&Decision> {
        self.decisions.get(&id)
    }

    pub fn choice(&self, id: ExprId) -> Option<&ChoiceDecision> {
        self.get(id).and_then(Decision::as_choice)
    }

    pub fn repetition(&self, id: ExprId) -> Option<&LoopDecision> {
        self.get(id).and_then(Decision::as_loop)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ExprId, &Decision)> {
        self.decisions.iter()
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

impl fmt::Display for DecisionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, decision) in &self.decisions {
            writeln!(f, "{}: {}", id, decision)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub decisions: DecisionTable,
    pub diagnostics: Diagnostics,
}

/// Computes a decision for every choice and repetition node of the productions
/// the validator did not block.
pub fn resolve<'g>(
    registry: &'g GrammarRegistry,
    engine: &mut LookaheadEngine<'g>,
    report: &ValidationReport,
    options: &AnalysisOptions,
) -> Result<Resolution> {
    info!(
        "resolving decisions at k = {} for {} productions",
        options.lookahead,
        registry.production_count()
    );
    registry.parents()?;
    let mut resolution = Resolution::default();
    for production in registry.productions() {
        if report.is_blocked(&production.name) {
            trace!("skipping blocked production {}", production.name);
            continue;
        }
        trace!("{}:\n{}", production.name, registry.dump(production.root));
        let mut resolver = Resolver {
            registry,
            engine: &mut *engine,
            options,
            production,
            resolution: &mut resolution,
            follow_depth: deepest_amount(registry, production.root).max(options.lookahead),
        };
        resolver.visit(production.root, &FirstKSet::epsilon())?;
    }
    for (id, decision) in resolution.decisions.iter() {
        trace!("decision {}: {}", id, decision);
    }
    Ok(resolution)
}

struct Resolver<'r, 'g> {
    registry: &'g GrammarRegistry,
    engine: &'r mut LookaheadEngine<'g>,
    options: &'r AnalysisOptions,
    production: &'g Production,
    resolution: &'r mut Resolution,
    /// Depth of the follow sets threaded through `visit`: the default `k` or
    /// the deepest local lookahead of the production, whichever is larger.
    follow_depth: usize,
}

impl Resolver<'_, '_> {
    fn k(&self) -> usize {
        self.options.lookahead
    }

    fn warn(&mut self, kind: DiagnosticKind, id: ExprId, message: String) {
        let location = self.registry.location(id);
        self.resolution
            .diagnostics
            .report(kind, &self.production.name, location, message);
    }

    /// Walks the tree; `follow` is the first-k set of what comes after `id`
    /// inside the production.
    fn visit(&mut self, id: ExprId, follow: &FirstKSet) -> Result<()> {
        let registry = self.registry;
        let depth = self.follow_depth;
        match registry.expansion(id) {
            Expansion::Terminal(_) | Expansion::NonTerminal { .. } | Expansion::Action(_) => {}
            Expansion::Sequence(units) => {
                let mut follows = vec![follow.clone(); units.len()];
                let mut after = follow.clone();
                for (i, unit) in units.iter().enumerate().rev() {
                    follows[i] = after.clone();
                    after = self.engine.first_k(*unit, depth)?.concat(&after, depth);
                }
                for (unit, unit_follow) in units.iter().zip(&follows) {
                    self.visit(*unit, unit_follow)?;
                }
            }
            Expansion::Choice(alts) => {
                self.resolve_choice(id, alts)?;
                for alt in alts {
                    self.visit(*alt, follow)?;
                }
            }
            Expansion::ZeroOrOne { inner, lookahead }
            | Expansion::ZeroOrMore { inner, lookahead }
            | Expansion::OneOrMore { inner, lookahead } => {
                let Some((kind, _, _)) = registry.expansion(id).repetition() else {
                    return Ok(());
                };
                self.resolve_loop(id, kind, *inner, *lookahead, follow)?;
                let inner_follow = match kind {
                    RepetitionKind::ZeroOrOne => follow.clone(),
                    // another iteration or whatever follows the loop
                    RepetitionKind::ZeroOrMore | RepetitionKind::OneOrMore => {
                        self.engine
                            .first_k(*inner, depth)?
                            .union(&FirstKSet::epsilon())
                            .concat(follow, depth)
                    }
                };
                if let Some(guard) = lookahead {
                    self.visit(*guard, &FirstKSet::epsilon())?;
                }
                self.visit(*inner, &inner_follow)?;
            }
            Expansion::Lookahead(spec) => {
                if let Some(guard) = spec.syntactic {
                    self.visit(guard, &FirstKSet::epsilon())?;
                }
            }
            Expansion::TryBlock { body, .. } => self.visit(*body, follow)?,
        }
        Ok(())
    }

    /// Depth and guard of a lookahead directive.
    fn guard(&mut self, spec: Option<LookaheadSpec>) -> Result<(usize, Option<Guard>)> {
        let Some(spec) = spec else {
            return Ok((self.k(), None));
        };
        let amount = spec.amount.filter(|a| *a > 0);
        let depth = amount.unwrap_or(self.k());
        let syntactic = match spec.syntactic {
            Some(guard) => Some((guard, self.engine.first_k(guard, depth)?)),
            None => None,
        };
        let semantic = spec
            .semantic
            .filter(|_| self.options.allow_semantic_lookahead);
        if amount.is_none() && syntactic.is_none() && semantic.is_none() {
            return Ok((depth, None));
        }
        Ok((
            depth,
            Some(Guard {
                amount,
                syntactic,
                semantic,
            }),
        ))
    }

    fn resolve_choice(&mut self, id: ExprId, alts: &[ExprId]) -> Result<()> {
        let mut entries: Vec<DecisionEntry> = Vec::with_capacity(alts.len());
        let mut default: Option<usize> = None;

        for (i, alt) in alts.iter().enumerate() {
            let spec = leading_lookahead(self.registry, *alt);
            let (depth, guard) = self.guard(spec)?;
            let lookahead = self.engine.first_k(*alt, depth)?;

            if let Some(d) = default {
                self.warn(
                    DiagnosticKind::UnreachableAlternative,
                    *alt,
                    format!(
                        "alternative {} can never be chosen: alternative {} matches the empty string",
                        i + 1,
                        d + 1
                    ),
                );
            }
            if let Some(Guard {
                syntactic: Some((_, guard_set)),
                ..
            }) = &guard
            {
                self.check_guard(*alt, i, guard_set, &lookahead);
            }

            let is_default = default.is_none() && !overrides(&guard) && lookahead.is_nullable();
            if is_default {
                default = Some(i);
            }
            entries.push(DecisionEntry {
                alternative: i,
                node: *alt,
                depth,
                lookahead,
                guard,
                is_default,
            });
        }

        let reachable = default.map_or(entries.len(), |d| d + 1);
        for (i, j) in (0..reachable).tuple_combinations() {
            let (a, b) = (&entries[i], &entries[j]);
            if overrides(&a.guard) || overrides(&b.guard) {
                continue;
            }
            // compare at the deeper of the two depths
            let depth = a.depth.max(b.depth);
            let (a_node, b_node) = (a.node, b.node);
            let a_set = if a.depth == depth {
                a.lookahead.clone()
            } else {
                self.engine.first_k(a_node, depth)?
            };
            let b_set = if b.depth == depth {
                b.lookahead.clone()
            } else {
                self.engine.first_k(b_node, depth)?
            };
            let common = a_set.conflicts(&b_set);
            if common.is_empty() {
                continue;
            }
            self.warn(
                DiagnosticKind::Ambiguity,
                id,
                format!(
                    "choice conflict between alternatives {} and {}: both can start with {}; alternative {} will be used",
                    i + 1,
                    j + 1,
                    display_sequences(&common),
                    i + 1
                ),
            );
        }

        let depth = entries.iter().map(|e| e.depth).max().unwrap_or(self.k());
        self.resolution
            .decisions
            .decisions
            .insert(id, Decision::Choice(ChoiceDecision { depth, entries }));
        Ok(())
    }

    /// The guard still wins; the contradiction is only reported.
    fn check_guard(&mut self, alt: ExprId, index: usize, guard_set: &FirstKSet, set: &FirstKSet) {
        if self.engine.nullable(alt) {
            return;
        }
        let stray: Vec<TokenSeq> = guard_set
            .iter()
            .filter(|seq| {
                FirstKSet::from_sequences([seq.to_vec()], false)
                    .conflicts(set)
                    .is_empty()
            })
            .cloned()
            .collect();
        if stray.is_empty() {
            return;
        }
        self.warn(
            DiagnosticKind::GuardContradiction,
            alt,
            format!(
                "lookahead guard of alternative {} admits {}, which cannot begin the alternative; the guard takes precedence",
                index + 1,
                stray.iter().map(|s| display_sequence(s)).join(", ")
            ),
        );
    }

    fn resolve_loop(
        &mut self,
        id: ExprId,
        kind: RepetitionKind,
        inner: ExprId,
        lookahead: Option<ExprId>,
        follow: &FirstKSet,
    ) -> Result<()> {
        let spec = match lookahead {
            Some(guard) => Some(match self.registry.expansion(guard) {
                Expansion::Lookahead(spec) => spec.clone(),
                _ => LookaheadSpec::syntactic(guard),
            }),
            None => leading_lookahead(self.registry, inner),
        };
        let (depth, guard) = self.guard(spec)?;
        let set = self.engine.first_k(inner, depth)?;

        if !overrides(&guard) {
            let common = set.conflicts(&follow.truncate(depth));
            if !common.is_empty() {
                self.warn(
                    DiagnosticKind::LoopConflict,
                    id,
                    format!(
                        "choice conflict in \"{}\": {} can begin the body and also follow it; the body will be entered",
                        kind,
                        display_sequences(&common)
                    ),
                );
            }
        }

        self.resolution.decisions.decisions.insert(
            id,
            Decision::Loop(LoopDecision {
                kind,
                inner,
                depth,
                lookahead: set,
                guard,
            }),
        );
        Ok(())
    }
}

fn overrides(guard: &Option<Guard>) -> bool {
    guard.as_ref().is_some_and(Guard::overrides)
}

/// A `Lookahead` that is the node itself or, recursively, the first unit of
/// its sequence. The validator accepts lookahead in exactly these places.
fn leading_lookahead(registry: &GrammarRegistry, id: ExprId) -> Option<LookaheadSpec> {
    match registry.expansion(id) {
        Expansion::Lookahead(spec) => Some(spec.clone()),
        Expansion::Sequence(units) => units.first().and_then(|u| leading_lookahead(registry, *u)),
        _ => None,
    }
}

/// Largest explicit lookahead depth in the subtree.
fn deepest_amount(registry: &GrammarRegistry, id: ExprId) -> usize {
    let own = match registry.expansion(id) {
        Expansion::Lookahead(spec) => spec.amount.unwrap_or(0),
        _ => 0,
    };
    registry
        .children(id)
        .into_iter()
        .map(|child| deepest_amount(registry, child))
        .fold(own, usize::max)
}
