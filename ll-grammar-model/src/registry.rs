use crate::error::{AnalysisError, Result};
use crate::model::*;
use indexmap::{IndexMap, IndexSet};
use proc_macro2::TokenStream;
use quote::ToTokens;
use std::collections::HashMap;
use std::fmt::Write;
use syn::Expr;

/// Owner of a node: either another node or the production whose root it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    Node(ExprId),
    Production(String),
}

/// Productions, declared tokens and the arena holding every expansion node.
///
/// Productions keep their insertion order so diagnostics come out in grammar order.
/// Redefinitions do not replace the first definition; they are kept aside in
/// [`GrammarRegistry::duplicates`] for the validator to report.
#[derive(Debug, Clone, Default)]
pub struct GrammarRegistry {
    nodes: Vec<Node>,
    productions: IndexMap<String, Production>,
    duplicates: Vec<Production>,
    tokens: IndexSet<TokenKind>,
}

impl GrammarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_token(&mut self, kind: impl Into<TokenKind>) -> &mut Self {
        self.tokens.insert(kind.into());
        self
    }

    pub fn declare_tokens<I, S>(&mut self, kinds: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TokenKind>,
    {
        self.tokens.extend(kinds.into_iter().map(Into::into));
        self
    }

    pub fn is_token_declared(&self, kind: &str) -> bool {
        self.tokens.contains(kind)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &TokenKind> {
        self.tokens.iter()
    }

    pub fn alloc(&mut self, expansion: Expansion, location: Location) -> ExprId {
        let id = ExprId(self.nodes.len());
        self.nodes.push(Node {
            expansion,
            location,
        });
        id
    }

    pub fn add_production(&mut self, production: Production) {
        if self.productions.contains_key(&production.name) {
            self.duplicates.push(production);
        } else {
            self.productions.insert(production.name.clone(), production);
        }
    }

    pub fn production(&self, name: &str) -> Option<&Production> {
        self.productions.get(name)
    }

    pub fn productions(&self) -> impl Iterator<Item = &Production> {
        self.productions.values()
    }

    pub fn production_count(&self) -> usize {
        self.productions.len()
    }

    pub fn duplicates(&self) -> &[Production] {
        &self.duplicates
    }

    pub fn node(&self, id: ExprId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .ok_or(AnalysisError::UnknownExpansion(id))
    }

    /// Panics on an id that was not allocated by this registry. [`Self::node`]
    /// is the checked variant.
    pub fn expansion(&self, id: ExprId) -> &Expansion {
        &self.nodes[id.0].expansion
    }

    pub fn location(&self, id: ExprId) -> Location {
        self.nodes[id.0].location
    }

    pub fn children(&self, id: ExprId) -> Vec<ExprId> {
        self.expansion(id).children()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Computes the owner of every node reachable from a production root and
    /// checks that the trees do not share nodes.
    pub fn parents(&self) -> Result<HashMap<ExprId, Owner>> {
        let mut owners = HashMap::with_capacity(self.nodes.len());
        for production in self.productions.values().chain(self.duplicates.iter()) {
            self.node(production.root)?;
            if owners
                .insert(production.root, Owner::Production(production.name.clone()))
                .is_some()
            {
                return Err(AnalysisError::SharedExpansion(production.root));
            }
            let mut stack = vec![production.root];
            while let Some(id) = stack.pop() {
                for child in self.node(id)?.expansion.children() {
                    self.node(child)?;
                    if owners.insert(child, Owner::Node(id)).is_some() {
                        return Err(AnalysisError::SharedExpansion(child));
                    }
                    stack.push(child);
                }
            }
        }
        Ok(owners)
    }

    // ==========================================================================
    //  Builder helpers
    // ==========================================================================

    pub fn terminal(&mut self, kind: impl Into<TokenKind>, location: Location) -> ExprId {
        self.alloc(Expansion::Terminal(kind.into()), location)
    }

    pub fn non_terminal(
        &mut self,
        name: impl Into<String>,
        args: Vec<Expr>,
        location: Location,
    ) -> ExprId {
        self.alloc(
            Expansion::NonTerminal {
                name: name.into(),
                args,
            },
            location,
        )
    }

    pub fn sequence(&mut self, units: Vec<ExprId>, location: Location) -> ExprId {
        self.alloc(Expansion::Sequence(units), location)
    }

    pub fn choice(&mut self, alternatives: Vec<ExprId>, location: Location) -> ExprId {
        self.alloc(Expansion::Choice(alternatives), location)
    }

    pub fn zero_or_one(
        &mut self,
        inner: ExprId,
        lookahead: Option<ExprId>,
        location: Location,
    ) -> ExprId {
        self.alloc(Expansion::ZeroOrOne { inner, lookahead }, location)
    }

    pub fn zero_or_more(
        &mut self,
        inner: ExprId,
        lookahead: Option<ExprId>,
        location: Location,
    ) -> ExprId {
        self.alloc(Expansion::ZeroOrMore { inner, lookahead }, location)
    }

    pub fn one_or_more(
        &mut self,
        inner: ExprId,
        lookahead: Option<ExprId>,
        location: Location,
    ) -> ExprId {
        self.alloc(Expansion::OneOrMore { inner, lookahead }, location)
    }

    pub fn lookahead(&mut self, spec: LookaheadSpec, location: Location) -> ExprId {
        self.alloc(Expansion::Lookahead(spec), location)
    }

    pub fn action(&mut self, payload: TokenStream, location: Location) -> ExprId {
        self.alloc(Expansion::Action(payload), location)
    }

    pub fn try_block(
        &mut self,
        body: ExprId,
        catches: Vec<CatchSpec>,
        finally: Option<TokenStream>,
        location: Location,
    ) -> ExprId {
        self.alloc(
            Expansion::TryBlock {
                body,
                catches,
                finally,
            },
            location,
        )
    }

    // ==========================================================================
    //  Dump
    // ==========================================================================

    /// Renders the subtree rooted at `id`, one node per line, indented by depth.
    /// Panics like [`Self::expansion`] on a foreign id.
    pub fn dump(&self, id: ExprId) -> String {
        let mut out = String::new();
        self.dump_into(id, 0, &mut out);
        out
    }

    fn dump_into(&self, id: ExprId, indent: usize, out: &mut String) {
        let node = &self.nodes[id.0];
        let _ = write!(
            out,
            "{:width$}{} {}",
            "",
            node.expansion.kind_name(),
            node.location,
            width = indent * 2
        );
        match &node.expansion {
            Expansion::Terminal(kind) => {
                let _ = write!(out, " {}", kind);
            }
            Expansion::NonTerminal { name, args } => {
                let _ = write!(out, " {}", name);
                if !args.is_empty() {
                    let args = args
                        .iter()
                        .map(|a| a.to_token_stream().to_string())
                        .collect::<Vec<_>>();
                    let _ = write!(out, "({})", args.join(", "));
                }
            }
            Expansion::Lookahead(spec) => {
                if let Some(amount) = spec.amount {
                    let _ = write!(out, " amount={}", amount);
                }
                if let Some(predicate) = &spec.semantic {
                    let _ = write!(out, " {{ {} }}", predicate.to_token_stream());
                }
            }
            Expansion::Action(payload) => {
                let _ = write!(out, " {{ {} }}", payload);
            }
            Expansion::TryBlock { catches, .. } => {
                for catch in catches {
                    let _ = write!(out, " catch({})", catch.exception.to_token_stream());
                }
            }
            _ => {}
        }
        out.push('\n');
        for child in node.expansion.children() {
            self.dump_into(child, indent + 1, out);
        }
    }
}
