use crate::error::{AnalysisError, Result};

pub const DEFAULT_LOOKAHEAD: usize = 1;
pub const DEFAULT_EXPANSION_LIMIT: usize = 10_000;

/// Global analysis options, threaded explicitly through every component.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "kebab-case"))]
pub struct AnalysisOptions {
    /// Default decision depth `k`.
    pub lookahead: usize,
    pub allow_semantic_lookahead: bool,
    /// Root of the reachability check; the first production when unset.
    pub start_production: Option<String>,
    /// Maximum number of sequences a single first-k set may hold.
    pub expansion_limit: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            lookahead: DEFAULT_LOOKAHEAD,
            allow_semantic_lookahead: true,
            start_production: None,
            expansion_limit: DEFAULT_EXPANSION_LIMIT,
        }
    }
}

impl AnalysisOptions {
    pub fn with_lookahead(mut self, k: usize) -> Self {
        self.lookahead = k;
        self
    }

    pub fn with_semantic_lookahead(mut self, allow: bool) -> Self {
        self.allow_semantic_lookahead = allow;
        self
    }

    pub fn with_start(mut self, name: impl Into<String>) -> Self {
        self.start_production = Some(name.into());
        self
    }

    pub fn with_expansion_limit(mut self, limit: usize) -> Self {
        self.expansion_limit = limit;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.lookahead == 0 {
            return Err(AnalysisError::InvalidOption {
                option: "lookahead",
                reason: "the lookahead depth must be at least 1".to_string(),
            });
        }
        if self.expansion_limit == 0 {
            return Err(AnalysisError::InvalidOption {
                option: "expansion-limit",
                reason: "the expansion limit must be positive".to_string(),
            });
        }
        Ok(())
    }
}
