use crate::model::ExprId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Conditions that abort an analysis run.
///
/// Problems in the user's grammar are never reported through this type; they
/// are collected as [`Diagnostic`](crate::diagnostic::Diagnostic)s instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("lookahead engine invoked before the grammar was certified free of left recursion")]
    PrerequisiteNotMet,

    #[error(
        "first-{k} set of node {node} exceeds the expansion limit of {limit} sequences \
         (reached {size}); lower the lookahead depth"
    )]
    ExpansionLimitExceeded {
        node: ExprId,
        k: usize,
        size: usize,
        limit: usize,
    },

    #[error("invalid analysis option `{option}`: {reason}")]
    InvalidOption {
        option: &'static str,
        reason: String,
    },

    #[error("expansion node {0} is owned by more than one parent")]
    SharedExpansion(ExprId),

    #[error("expansion node {0} does not exist in the registry")]
    UnknownExpansion(ExprId),
}
