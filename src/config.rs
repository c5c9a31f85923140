//! Engine configuration
//!
//! Every field has a default, so an empty JSON object or Python dict is a
//! valid configuration.

use crate::error::{Result, RuleEngineError};
use crate::rule::MAX_ENCODED_DEPTH;
use serde::Deserialize;

/// Default maximum parenthesis nesting accepted by the parser
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default maximum number of comparisons in one rule
pub const DEFAULT_MAX_TERMS: usize = 256;

/// Parser limits and compatibility switches
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    /// Maximum parenthesis nesting
    pub max_depth: usize,
    /// Maximum comparisons in a parsed or combined rule. Bounds the tree
    /// depth, which grows by one per term of a flat `AND`/`OR` chain.
    pub max_terms: usize,
    /// Skip any single character after a parenthesized sub-expression
    /// instead of requiring `)`
    pub lenient_parentheses: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_terms: DEFAULT_MAX_TERMS,
            lenient_parentheses: false,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub parser: ParserConfig,
    /// Route `check_rule` through the parse cache
    pub cache_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parser: ParserConfig::default(),
            cache_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Decode a configuration from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| RuleEngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Decode a configuration from an already parsed JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let config: EngineConfig = serde_json::from_value(value)
            .map_err(|e| RuleEngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.parser.max_depth == 0 {
            return Err(RuleEngineError::InvalidConfig(
                "parser.max_depth must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_ENCODED_DEPTH).contains(&self.parser.max_terms) {
            return Err(RuleEngineError::InvalidConfig(format!(
                "parser.max_terms must be between 1 and {}",
                MAX_ENCODED_DEPTH
            )));
        }
        Ok(())
    }
}
