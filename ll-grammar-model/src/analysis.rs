use crate::error::{AnalysisError, Result};
use crate::first_set::FirstKSet;
use crate::model::*;
use crate::options::AnalysisOptions;
use crate::registry::GrammarRegistry;
use crate::validator::ValidationReport;
use indexmap::IndexMap;
use log::{debug, trace};
use std::collections::{HashMap, HashSet};

// ==============================================================================
//  Nullability
// ==============================================================================

/// Which productions can derive the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nullability {
    productions: HashSet<String>,
}

impl Nullability {
    /// Least fixpoint over the productions: start with none nullable and add
    /// productions until nothing changes.
    pub fn compute(registry: &GrammarRegistry) -> Self {
        let mut nullable = Nullability::default();
        let mut changed = true;
        while changed {
            changed = false;
            for production in registry.productions() {
                if nullable.productions.contains(&production.name) {
                    continue;
                }
                if nullable.is_nullable(registry, production.root) {
                    nullable.productions.insert(production.name.clone());
                    changed = true;
                }
            }
        }
        nullable
    }

    pub fn is_production_nullable(&self, name: &str) -> bool {
        self.productions.contains(name)
    }

    pub fn is_nullable(&self, registry: &GrammarRegistry, id: ExprId) -> bool {
        match registry.expansion(id) {
            Expansion::Terminal(_) => false,
            Expansion::NonTerminal { name, .. } => self.productions.contains(name),
            Expansion::Sequence(units) => units.iter().all(|u| self.is_nullable(registry, *u)),
            Expansion::Choice(alts) => alts.iter().any(|a| self.is_nullable(registry, *a)),
            Expansion::ZeroOrOne { .. } | Expansion::ZeroOrMore { .. } => true,
            Expansion::OneOrMore { inner, .. } => self.is_nullable(registry, *inner),
            Expansion::Lookahead(_) | Expansion::Action(_) => true,
            Expansion::TryBlock { body, .. } => self.is_nullable(registry, *body),
        }
    }
}

// ==============================================================================
//  First-k sets
// ==============================================================================

/// Computes first-k sets of expansion nodes.
///
/// Production sets are solved once per depth `k` by a round-synchronous fixpoint;
/// node sets are then derived structurally and memoized per `(node, k)`.
pub struct LookaheadEngine<'g> {
    registry: &'g GrammarRegistry,
    nullability: &'g Nullability,
    expansion_limit: usize,
    production_sets: HashMap<usize, IndexMap<String, FirstKSet>>,
    memo: HashMap<usize, HashMap<ExprId, FirstKSet>>,
}

impl<'g> LookaheadEngine<'g> {
    /// Fails with [`AnalysisError::PrerequisiteNotMet`] unless `report` certifies
    /// that the grammar has no left recursion, and with the errors of
    /// [`GrammarRegistry::parents`] on a malformed arena.
    pub fn new(
        registry: &'g GrammarRegistry,
        report: &'g ValidationReport,
        options: &AnalysisOptions,
    ) -> Result<Self> {
        if !report.is_left_recursion_free() {
            return Err(AnalysisError::PrerequisiteNotMet);
        }
        options.validate()?;
        registry.parents()?;
        Ok(Self {
            registry,
            nullability: report.nullability(),
            expansion_limit: options.expansion_limit,
            production_sets: HashMap::new(),
            memo: HashMap::new(),
        })
    }

    pub fn registry(&self) -> &'g GrammarRegistry {
        self.registry
    }

    pub fn nullable(&self, id: ExprId) -> bool {
        self.nullability.is_nullable(self.registry, id)
    }

    pub fn first_k(&mut self, id: ExprId, k: usize) -> Result<FirstKSet> {
        if let Some(set) = self.memo.get(&k).and_then(|m| m.get(&id)) {
            return Ok(set.clone());
        }
        self.solve_productions(k)?;
        let walker = FirstK {
            registry: self.registry,
            productions: &self.production_sets[&k],
            k,
            limit: self.expansion_limit,
        };
        walker.first(id, self.memo.entry(k).or_default())
    }

    /// First-k set of a sequence of sibling nodes, as if they formed a `Sequence`.
    pub fn first_k_of_units(&mut self, units: &[ExprId], k: usize) -> Result<FirstKSet> {
        let mut acc = FirstKSet::epsilon();
        for unit in units {
            if is_saturated(&acc, k) {
                break;
            }
            let set = self.first_k(*unit, k)?;
            acc = acc.concat(&set, k);
        }
        Ok(acc)
    }

    pub fn production_first_k(&mut self, name: &str, k: usize) -> Result<FirstKSet> {
        self.solve_productions(k)?;
        Ok(self.production_sets[&k]
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    fn solve_productions(&mut self, k: usize) -> Result<()> {
        if self.production_sets.contains_key(&k) {
            return Ok(());
        }
        let mut sets: IndexMap<String, FirstKSet> = self
            .registry
            .productions()
            .map(|p| (p.name.clone(), FirstKSet::empty()))
            .collect();

        let mut round = 0usize;
        loop {
            round += 1;
            // Every production of a round reads the sets of the previous round.
            let walker = FirstK {
                registry: self.registry,
                productions: &sets,
                k,
                limit: self.expansion_limit,
            };
            let mut memo = HashMap::new();
            let mut next = IndexMap::with_capacity(sets.len());
            for production in self.registry.productions() {
                let set = walker.first(production.root, &mut memo)?;
                next.insert(production.name.clone(), set);
            }
            let changed = next != sets;
            debug!(
                "first-{} fixpoint round {}: {}",
                k,
                round,
                if changed { "changed" } else { "stable" }
            );
            sets = next;
            if !changed {
                break;
            }
        }
        for (name, set) in &sets {
            trace!("first-{}({}) = {}", k, name, set);
        }
        self.production_sets.insert(k, sets);
        Ok(())
    }
}

fn is_saturated(set: &FirstKSet, k: usize) -> bool {
    !set.is_nullable() && set.iter().all(|s| s.len() >= k)
}

/// One structural pass over the tree against a fixed snapshot of production sets.
struct FirstK<'a> {
    registry: &'a GrammarRegistry,
    productions: &'a IndexMap<String, FirstKSet>,
    k: usize,
    limit: usize,
}

impl FirstK<'_> {
    fn first(&self, id: ExprId, memo: &mut HashMap<ExprId, FirstKSet>) -> Result<FirstKSet> {
        if let Some(set) = memo.get(&id) {
            return Ok(set.clone());
        }
        let set = match self.registry.expansion(id) {
            Expansion::Terminal(kind) => FirstKSet::token(kind.clone()),
            Expansion::NonTerminal { name, .. } => {
                self.productions.get(name).cloned().unwrap_or_default()
            }
            Expansion::Sequence(units) => {
                let mut acc = FirstKSet::epsilon();
                for unit in units {
                    if is_saturated(&acc, self.k) {
                        break;
                    }
                    acc = acc.concat(&self.first(*unit, memo)?, self.k);
                }
                acc
            }
            Expansion::Choice(alts) => {
                let mut acc = FirstKSet::empty();
                for alt in alts {
                    acc.union_with(&self.first(*alt, memo)?);
                }
                acc
            }
            Expansion::ZeroOrOne { inner, .. } | Expansion::ZeroOrMore { inner, .. } => {
                self.first(*inner, memo)?.union(&FirstKSet::epsilon())
            }
            // One required iteration decides; further iterations are a loop decision.
            Expansion::OneOrMore { inner, .. } => self.first(*inner, memo)?,
            Expansion::Lookahead(_) | Expansion::Action(_) => FirstKSet::epsilon(),
            Expansion::TryBlock { body, .. } => self.first(*body, memo)?,
        };
        if set.len() > self.limit {
            return Err(AnalysisError::ExpansionLimitExceeded {
                node: id,
                k: self.k,
                size: set.len(),
                limit: self.limit,
            });
        }
        memo.insert(id, set.clone());
        Ok(set)
    }
}
