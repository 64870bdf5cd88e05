//! # ll-grammar
//!
//! Validation and lookahead analysis for LL(k) grammars. A front end builds a
//! [`GrammarRegistry`], [`analyze`] checks it and attaches a decision procedure
//! to every choice and repetition, and a backend turns those decisions into
//! parser code.
//!
//! ```
//! use ll_grammar::{analyze, AnalysisOptions, GrammarRegistry};
//! use ll_grammar::model::{Location, Production};
//!
//! let mut reg = GrammarRegistry::new();
//! reg.declare_tokens(["a", "b"]);
//! let a = reg.terminal("a", Location::new(1, 8));
//! let b = reg.terminal("b", Location::new(1, 14));
//! let choice = reg.choice(vec![a, b], Location::new(1, 8));
//! reg.add_production(Production::new("Start", choice, Location::new(1, 1)));
//!
//! let analysis = analyze(&reg, &AnalysisOptions::default()).unwrap();
//! assert!(analysis.diagnostics.is_empty());
//! let decision = analysis.decisions.choice(choice).unwrap();
//! assert_eq!(decision.select(&["b"]), Some(1));
//! ```

pub use ll_grammar_model::*;

// Payload types of the model, re-exported for front ends.
pub use proc_macro2;
pub use quote;
pub use syn;

// Fluent assertions over analysis results (feature "testing")
#[cfg(feature = "testing")]
pub mod testing;
