use crate::analysis::Nullability;
use crate::diagnostic::{DiagnosticKind, Diagnostics};
use crate::model::*;
use crate::options::AnalysisOptions;
use crate::registry::GrammarRegistry;
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use log::{debug, info};
use std::collections::{HashSet, VecDeque};

/// What the backend may do with a production after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ProductionStatus {
    Valid,
    /// A structural error inside; no decisions are computed for it.
    Blocked,
    /// Repetitions whose body can match the empty string. Only these nodes are
    /// unfit for code generation.
    EmptyRepetitionAt(Vec<ExprId>),
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub diagnostics: Diagnostics,
    pub status: IndexMap<String, ProductionStatus>,
    pub nullability: Nullability,
    /// Left-recursive reference cycles, each listed from its entry production.
    pub cycles: Vec<Vec<String>>,
}

impl ValidationReport {
    pub fn is_left_recursion_free(&self) -> bool {
        self.cycles.is_empty()
    }

    pub fn nullability(&self) -> &Nullability {
        &self.nullability
    }

    pub fn status(&self, production: &str) -> Option<&ProductionStatus> {
        self.status.get(production)
    }

    pub fn is_blocked(&self, production: &str) -> bool {
        matches!(self.status.get(production), Some(ProductionStatus::Blocked))
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Checks the whole grammar in one pass. Problems become diagnostics; nothing
/// here stops at the first one.
///
/// Expects an arena that passed [`GrammarRegistry::parents`] and panics on a
/// node id it does not hold; [`crate::analyze`] checks that first.
pub fn validate(registry: &GrammarRegistry, options: &AnalysisOptions) -> ValidationReport {
    info!(
        "validating {} productions over {} nodes",
        registry.production_count(),
        registry.node_count()
    );
    let mut diagnostics = Diagnostics::new();
    let mut status: IndexMap<String, ProductionStatus> = registry
        .productions()
        .map(|p| (p.name.clone(), ProductionStatus::Valid))
        .collect();

    let nullability = Nullability::compute(registry);

    // 1. Duplicate definitions
    for duplicate in registry.duplicates() {
        let first = registry
            .production(&duplicate.name)
            .map(|p| p.location)
            .unwrap_or_default();
        diagnostics.report(
            DiagnosticKind::DuplicateProduction,
            &duplicate.name,
            duplicate.location,
            format!(
                "production '{}' is already defined at {}",
                duplicate.name, first
            ),
        );
        status.insert(duplicate.name.clone(), ProductionStatus::Blocked);
    }

    // 2. Start production
    let start = match &options.start_production {
        Some(name) if registry.production(name).is_none() => {
            diagnostics.report(
                DiagnosticKind::UndefinedStart,
                name,
                Location::default(),
                format!("start production '{}' is not defined", name),
            );
            None
        }
        Some(name) => Some(name.clone()),
        None => registry.productions().next().map(|p| p.name.clone()),
    };

    // 3. Per-production tree checks
    for production in registry.productions() {
        let mut checker = TreeChecker {
            registry,
            options,
            nullability: &nullability,
            production,
            diagnostics: &mut diagnostics,
            structural: false,
            empty_repetitions: Vec::new(),
        };
        checker.check(production.root, Slot::Plain);
        let TreeChecker {
            structural,
            empty_repetitions,
            ..
        } = checker;

        if structural {
            status.insert(production.name.clone(), ProductionStatus::Blocked);
        } else if !empty_repetitions.is_empty()
            && status.get(&production.name) == Some(&ProductionStatus::Valid)
        {
            status.insert(
                production.name.clone(),
                ProductionStatus::EmptyRepetitionAt(empty_repetitions),
            );
        }
    }

    // 4. Left recursion
    let cycles = find_cycles(registry, &nullability);
    for cycle in &cycles {
        let entry = &cycle[0];
        let location = registry
            .production(entry)
            .map(|p| p.location)
            .unwrap_or_default();
        diagnostics.report(
            DiagnosticKind::LeftRecursion,
            entry,
            location,
            format!(
                "left recursion detected: {} -> {}",
                cycle.iter().join(" -> "),
                entry
            ),
        );
    }

    // 5. Unreachable productions
    if let Some(start) = start {
        for name in find_unused_productions(registry, &start) {
            if let Some(production) = registry.production(&name) {
                diagnostics.report(
                    DiagnosticKind::UnreachableProduction,
                    &name,
                    production.location,
                    format!(
                        "production '{}' is never used (unreachable from '{}')",
                        name, start
                    ),
                );
            }
        }
    }

    for (name, production_status) in &status {
        debug!("production {}: {:?}", name, production_status);
    }

    ValidationReport {
        diagnostics,
        status,
        nullability,
        cycles,
    }
}

/// Whether a node sits where a lookahead can steer a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Plain,
    ChoicePoint,
}

struct TreeChecker<'a> {
    registry: &'a GrammarRegistry,
    options: &'a AnalysisOptions,
    nullability: &'a Nullability,
    production: &'a Production,
    diagnostics: &'a mut Diagnostics,
    structural: bool,
    empty_repetitions: Vec<ExprId>,
}

impl TreeChecker<'_> {
    fn report(&mut self, kind: DiagnosticKind, id: ExprId, message: String) {
        if kind.is_structural() {
            self.structural = true;
        }
        let location = self.registry.location(id);
        self.diagnostics
            .report(kind, &self.production.name, location, message);
    }

    fn check(&mut self, id: ExprId, slot: Slot) {
        let registry = self.registry;
        match registry.expansion(id) {
            Expansion::Terminal(kind) => {
                if !registry.is_token_declared(kind) {
                    self.report(
                        DiagnosticKind::UndefinedToken,
                        id,
                        format!("undeclared token '{}'", kind),
                    );
                }
            }
            Expansion::NonTerminal { name, args } => match registry.production(name) {
                None => self.report(
                    DiagnosticKind::UndefinedProduction,
                    id,
                    format!("undefined production '{}'", name),
                ),
                Some(callee) if callee.params.len() != args.len() => self.report(
                    DiagnosticKind::ArityMismatch,
                    id,
                    format!(
                        "production '{}' expects {} argument(s), but got {}",
                        name,
                        callee.params.len(),
                        args.len()
                    ),
                ),
                Some(_) => {}
            },
            Expansion::Sequence(units) => {
                for (i, unit) in units.iter().enumerate() {
                    let slot = if i == 0 { slot } else { Slot::Plain };
                    self.check(*unit, slot);
                }
            }
            Expansion::Choice(alts) => {
                for alt in alts {
                    self.check(*alt, Slot::ChoicePoint);
                }
            }
            Expansion::ZeroOrOne { inner, lookahead }
            | Expansion::ZeroOrMore { inner, lookahead }
            | Expansion::OneOrMore { inner, lookahead } => {
                if let Some(guard) = lookahead {
                    self.check(*guard, Slot::ChoicePoint);
                }
                self.check(*inner, Slot::ChoicePoint);
                self.check_repetition(id);
            }
            Expansion::Lookahead(spec) => {
                if spec.semantic.is_some() && !self.options.allow_semantic_lookahead {
                    self.report(
                        DiagnosticKind::SemanticLookaheadDisabled,
                        id,
                        "semantic lookahead is not allowed here; the predicate is ignored"
                            .to_string(),
                    );
                }
                if slot != Slot::ChoicePoint {
                    self.report(
                        DiagnosticKind::MisplacedLookahead,
                        id,
                        "lookahead at a non-choice point will be ignored".to_string(),
                    );
                }
                if let Some(guard) = spec.syntactic {
                    self.check(guard, Slot::Plain);
                }
            }
            Expansion::Action(_) => {}
            Expansion::TryBlock { body, .. } => self.check(*body, Slot::Plain),
        }
    }

    fn check_repetition(&mut self, id: ExprId) {
        let Some((kind, inner, _)) = self.registry.expansion(id).repetition() else {
            return;
        };
        if !self.nullability.is_nullable(self.registry, inner) {
            return;
        }
        match kind {
            RepetitionKind::ZeroOrMore | RepetitionKind::OneOrMore => {
                self.report(
                    DiagnosticKind::EmptyRepetition,
                    id,
                    format!(
                        "expansion within \"{}\" can be matched by the empty string",
                        kind.operator()
                    ),
                );
                self.empty_repetitions.push(id);
            }
            RepetitionKind::ZeroOrOne => self.report(
                DiagnosticKind::EmptyOptional,
                id,
                format!(
                    "expansion within \"{}\" can be matched by the empty string",
                    kind.operator()
                ),
            ),
        }
    }
}

// ==============================================================================
//  Left recursion
// ==============================================================================

fn find_cycles(registry: &GrammarRegistry, nullability: &Nullability) -> Vec<Vec<String>> {
    let mut adj: IndexMap<String, IndexSet<String>> = IndexMap::new();
    for production in registry.productions() {
        let mut deps = IndexSet::new();
        collect_left_calls(registry, nullability, production.root, &mut deps);
        deps.retain(|name| registry.production(name).is_some());
        adj.insert(production.name.clone(), deps);
    }

    let mut cycles = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = Vec::new();
    let mut on_stack = HashSet::new();

    for name in adj.keys() {
        if !visited.contains(name) {
            find_cycles_dfs(
                name,
                &adj,
                &mut visited,
                &mut stack,
                &mut on_stack,
                &mut cycles,
            );
        }
    }
    cycles
}

fn find_cycles_dfs(
    u: &String,
    adj: &IndexMap<String, IndexSet<String>>,
    visited: &mut HashSet<String>,
    stack: &mut Vec<String>,
    on_stack: &mut HashSet<String>,
    cycles: &mut Vec<Vec<String>>,
) {
    visited.insert(u.clone());
    stack.push(u.clone());
    on_stack.insert(u.clone());

    if let Some(neighbors) = adj.get(u) {
        for v in neighbors {
            if on_stack.contains(v) {
                // v ... u -> v
                if let Some(pos) = stack.iter().position(|x| x == v) {
                    cycles.push(stack[pos..].to_vec());
                }
            } else if !visited.contains(v) {
                find_cycles_dfs(v, adj, visited, stack, on_stack, cycles);
            }
        }
    }

    on_stack.remove(u);
    stack.pop();
}

/// Productions referenced at column zero of `id`: reachable through a prefix
/// that consumes no token.
fn collect_left_calls(
    registry: &GrammarRegistry,
    nullability: &Nullability,
    id: ExprId,
    deps: &mut IndexSet<String>,
) {
    match registry.expansion(id) {
        Expansion::Terminal(_) | Expansion::Lookahead(_) | Expansion::Action(_) => {}
        Expansion::NonTerminal { name, .. } => {
            deps.insert(name.clone());
        }
        Expansion::Sequence(units) => {
            for unit in units {
                collect_left_calls(registry, nullability, *unit, deps);
                if !nullability.is_nullable(registry, *unit) {
                    break;
                }
            }
        }
        Expansion::Choice(alts) => {
            for alt in alts {
                collect_left_calls(registry, nullability, *alt, deps);
            }
        }
        Expansion::ZeroOrOne { inner, .. }
        | Expansion::ZeroOrMore { inner, .. }
        | Expansion::OneOrMore { inner, .. } => {
            collect_left_calls(registry, nullability, *inner, deps);
        }
        Expansion::TryBlock { body, .. } => collect_left_calls(registry, nullability, *body, deps),
    }
}

// ==============================================================================
//  Reachability
// ==============================================================================

fn find_unused_productions(registry: &GrammarRegistry, start: &str) -> Vec<String> {
    let mut used = HashSet::new();
    let mut queue = VecDeque::new();
    used.insert(start.to_string());
    queue.push_back(start.to_string());

    while let Some(current) = queue.pop_front() {
        if let Some(production) = registry.production(&current) {
            collect_called_productions(registry, production.root, &mut |callee| {
                if used.insert(callee.clone()) {
                    queue.push_back(callee);
                }
            });
        }
    }

    registry
        .productions()
        .map(|p| p.name.clone())
        .filter(|n| !used.contains(n))
        .collect()
}

/// Every reference in the subtree, lookahead guards included.
fn collect_called_productions<F: FnMut(String)>(
    registry: &GrammarRegistry,
    id: ExprId,
    cb: &mut F,
) {
    if let Expansion::NonTerminal { name, .. } = registry.expansion(id) {
        cb(name.clone());
    }
    for child in registry.children(id) {
        collect_called_productions(registry, child, cb);
    }
}
