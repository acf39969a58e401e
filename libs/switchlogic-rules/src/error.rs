//! Rule Engine Error Types

use thiserror::Error;

/// Result type for rule operations
pub type Result<T> = std::result::Result<T, RuleError>;

/// Rule engine errors
#[derive(Debug, Error)]
pub enum RuleError {
    /// Term string matches no term form
    #[error("Undefined term: '{0}'")]
    UndefinedTerm(String),

    /// Input expression failed to compile or evaluate
    #[error("Malformed expression '{expression}': {reason}")]
    MalformedExpression { expression: String, reason: String },

    /// Required rule property absent
    #[error("missing '{0}' property")]
    MissingProperty(&'static str),

    /// Configuration has no usable rules
    #[error("configuration 'rules' property is missing or empty")]
    NoRules,

    /// Engine already started
    #[error("Rule engine is already running")]
    AlreadyRunning,

    /// Output term kind cannot be driven
    #[error("bad output type ({0})")]
    BadOutputType(&'static str),

    /// Internal consistency error
    #[error("internal error - {0}")]
    Internal(String),
}

impl RuleError {
    pub fn undefined_term(term: impl Into<String>) -> Self {
        Self::UndefinedTerm(term.into())
    }

    pub fn malformed(expression: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedExpression {
            expression: expression.into(),
            reason: reason.to_string(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            RuleError::undefined_term("a:b:c:d").to_string(),
            "Undefined term: 'a:b:c:d'"
        );
        assert_eq!(
            RuleError::MissingProperty("output").to_string(),
            "missing 'output' property"
        );
        assert_eq!(
            RuleError::malformed("A and", "operator 'and' is missing an operand").to_string(),
            "Malformed expression 'A and': operator 'and' is missing an operand"
        );
        assert_eq!(
            RuleError::BadOutputType("on").to_string(),
            "bad output type (on)"
        );
    }
}
