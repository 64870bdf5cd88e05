pub mod types;

pub use types::*;

use proc_macro2::{Ident, TokenStream};
use syn::{parse_quote, Expr, Type};

/// One node of a production's expansion tree.
///
/// Children are referenced by [`ExprId`] into the registry's arena; references to
/// other productions go through `NonTerminal::name` and are resolved by lookup.
#[derive(Debug, Clone)]
pub enum Expansion {
    Terminal(TokenKind),
    NonTerminal {
        name: String,
        args: Vec<Expr>,
    },
    Sequence(Vec<ExprId>),
    Choice(Vec<ExprId>),
    ZeroOrOne {
        inner: ExprId,
        lookahead: Option<ExprId>,
    },
    ZeroOrMore {
        inner: ExprId,
        lookahead: Option<ExprId>,
    },
    OneOrMore {
        inner: ExprId,
        lookahead: Option<ExprId>,
    },
    Lookahead(LookaheadSpec),
    Action(TokenStream),
    TryBlock {
        body: ExprId,
        catches: Vec<CatchSpec>,
        finally: Option<TokenStream>,
    },
}

/// An explicit lookahead directive: `LOOKAHEAD(amount, syntactic, { semantic })`.
#[derive(Debug, Clone, Default)]
pub struct LookaheadSpec {
    /// Decision depth override; `None` keeps the grammar default.
    pub amount: Option<usize>,
    pub semantic: Option<Expr>,
    pub syntactic: Option<ExprId>,
}

impl LookaheadSpec {
    pub fn amount(amount: usize) -> Self {
        Self {
            amount: Some(amount),
            ..Self::default()
        }
    }

    pub fn syntactic(guard: ExprId) -> Self {
        Self {
            syntactic: Some(guard),
            ..Self::default()
        }
    }

    pub fn semantic(predicate: Expr) -> Self {
        Self {
            semantic: Some(predicate),
            ..Self::default()
        }
    }

    pub fn with_amount(mut self, amount: usize) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_semantic(mut self, predicate: Expr) -> Self {
        self.semantic = Some(predicate);
        self
    }
}

/// A `catch (Exception binding) { block }` clause of a try block.
#[derive(Debug, Clone)]
pub struct CatchSpec {
    pub exception: Type,
    pub binding: Ident,
    pub block: TokenStream,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub expansion: Expansion,
    pub location: Location,
}

impl Expansion {
    /// Direct children in declaration order. A repetition's explicit lookahead
    /// comes before its inner expansion.
    pub fn children(&self) -> Vec<ExprId> {
        match self {
            Expansion::Sequence(units) => units.clone(),
            Expansion::Choice(alts) => alts.clone(),
            Expansion::ZeroOrOne { inner, lookahead }
            | Expansion::ZeroOrMore { inner, lookahead }
            | Expansion::OneOrMore { inner, lookahead } => {
                lookahead.iter().copied().chain(Some(*inner)).collect()
            }
            Expansion::Lookahead(spec) => spec.syntactic.into_iter().collect(),
            Expansion::TryBlock { body, .. } => vec![*body],
            Expansion::Terminal(_) | Expansion::NonTerminal { .. } | Expansion::Action(_) => {
                Vec::new()
            }
        }
    }

    pub fn repetition(&self) -> Option<(RepetitionKind, ExprId, Option<ExprId>)> {
        match self {
            Expansion::ZeroOrOne { inner, lookahead } => {
                Some((RepetitionKind::ZeroOrOne, *inner, *lookahead))
            }
            Expansion::ZeroOrMore { inner, lookahead } => {
                Some((RepetitionKind::ZeroOrMore, *inner, *lookahead))
            }
            Expansion::OneOrMore { inner, lookahead } => {
                Some((RepetitionKind::OneOrMore, *inner, *lookahead))
            }
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Expansion::Terminal(_) => "Terminal",
            Expansion::NonTerminal { .. } => "NonTerminal",
            Expansion::Sequence(_) => "Sequence",
            Expansion::Choice(_) => "Choice",
            Expansion::ZeroOrOne { .. } => "ZeroOrOne",
            Expansion::ZeroOrMore { .. } => "ZeroOrMore",
            Expansion::OneOrMore { .. } => "OneOrMore",
            Expansion::Lookahead(_) => "Lookahead",
            Expansion::Action(_) => "Action",
            Expansion::TryBlock { .. } => "TryBlock",
        }
    }
}

/// A named grammar rule.
#[derive(Debug, Clone)]
pub struct Production {
    pub name: String,
    pub location: Location,
    pub params: Vec<(Ident, Type)>,
    pub return_type: Type,
    pub root: ExprId,
    pub throws: Vec<String>,
}

impl Production {
    pub fn new(name: impl Into<String>, root: ExprId, location: Location) -> Self {
        Self {
            name: name.into(),
            location,
            params: Vec::new(),
            return_type: parse_quote!(()),
            root,
            throws: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Vec<(Ident, Type)>) -> Self {
        self.params = params;
        self
    }

    pub fn with_return_type(mut self, return_type: Type) -> Self {
        self.return_type = return_type;
        self
    }

    pub fn with_throws<I, S>(mut self, throws: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.throws = throws.into_iter().map(Into::into).collect();
        self
    }
}
