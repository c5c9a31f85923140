//! Error types for the rule engine

use thiserror::Error;

/// Main error type for the rule engine
#[derive(Error, Debug)]
pub enum RuleEngineError {
    /// Rule string does not match the grammar
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Combination error: {0}")]
    Combination(String),

    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RuleEngineError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        RuleEngineError::Syntax {
            position,
            message: message.into(),
        }
    }

    /// True for failures raised by the parser
    pub fn is_syntax(&self) -> bool {
        matches!(self, RuleEngineError::Syntax { .. })
    }
}

#[cfg(feature = "python")]
impl From<RuleEngineError> for pyo3::PyErr {
    fn from(err: RuleEngineError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyValueError};

        match err {
            RuleEngineError::Syntax { .. }
            | RuleEngineError::InvalidRule(_)
            | RuleEngineError::InvalidRecord(_)
            | RuleEngineError::InvalidConfig(_)
            | RuleEngineError::Serialization(_) => PyValueError::new_err(err.to_string()),
            RuleEngineError::RuleNotFound(_) => PyKeyError::new_err(err.to_string()),
            RuleEngineError::Evaluation(_) | RuleEngineError::Combination(_) => {
                PyRuntimeError::new_err(err.to_string())
            }
        }
    }
}

/// Result type alias for the rule engine
pub type Result<T> = std::result::Result<T, RuleEngineError>;
