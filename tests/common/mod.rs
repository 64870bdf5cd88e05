#![allow(dead_code)]

use ll_grammar::model::*;
use ll_grammar::proc_macro2::TokenStream;
use ll_grammar::{analyze, Analysis, AnalysisError, AnalysisOptions, GrammarRegistry};

/// Installs a test logger once; `RUST_LOG=debug cargo test` shows the fixpoint rounds.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Builds grammars with a location per node: one line per production,
/// columns counting up as nodes are created.
pub struct Grammar {
    pub reg: GrammarRegistry,
    line: usize,
    column: usize,
}

impl Grammar {
    pub fn new(tokens: &[&str]) -> Self {
        init_logging();
        let mut reg = GrammarRegistry::new();
        reg.declare_tokens(tokens.iter().copied());
        Self {
            reg,
            line: 1,
            column: 1,
        }
    }

    fn at(&mut self) -> Location {
        self.column += 1;
        Location::new(self.line, self.column)
    }

    pub fn t(&mut self, kind: &str) -> ExprId {
        let at = self.at();
        self.reg.terminal(kind, at)
    }

    pub fn nt(&mut self, name: &str) -> ExprId {
        self.call(name, vec![])
    }

    pub fn call(&mut self, name: &str, args: Vec<syn::Expr>) -> ExprId {
        let at = self.at();
        self.reg.non_terminal(name, args, at)
    }

    pub fn seq(&mut self, units: Vec<ExprId>) -> ExprId {
        let at = self.at();
        self.reg.sequence(units, at)
    }

    /// A sequence of terminals.
    pub fn tokens(&mut self, kinds: &[&str]) -> ExprId {
        let units = kinds.iter().map(|k| self.t(k)).collect();
        self.seq(units)
    }

    pub fn empty(&mut self) -> ExprId {
        self.seq(vec![])
    }

    pub fn alt(&mut self, alts: Vec<ExprId>) -> ExprId {
        let at = self.at();
        self.reg.choice(alts, at)
    }

    pub fn opt(&mut self, inner: ExprId) -> ExprId {
        let at = self.at();
        self.reg.zero_or_one(inner, None, at)
    }

    pub fn star(&mut self, inner: ExprId) -> ExprId {
        let at = self.at();
        self.reg.zero_or_more(inner, None, at)
    }

    pub fn plus(&mut self, inner: ExprId) -> ExprId {
        let at = self.at();
        self.reg.one_or_more(inner, None, at)
    }

    pub fn la(&mut self, spec: LookaheadSpec) -> ExprId {
        let at = self.at();
        self.reg.lookahead(spec, at)
    }

    pub fn action(&mut self, payload: TokenStream) -> ExprId {
        let at = self.at();
        self.reg.action(payload, at)
    }

    /// Registers a production on the current line and moves to the next one.
    pub fn rule(&mut self, name: &str, root: ExprId) -> &mut Self {
        self.add(Production::new(name, root, Location::new(self.line, 1)))
    }

    pub fn add(&mut self, production: Production) -> &mut Self {
        self.reg.add_production(production);
        self.line += 1;
        self.column = 1;
        self
    }

    pub fn analyze(&self, options: &AnalysisOptions) -> Result<Analysis, AnalysisError> {
        analyze(&self.reg, options)
    }
}
