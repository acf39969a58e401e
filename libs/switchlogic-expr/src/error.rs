//! Error types for switchlogic-expr

use thiserror::Error;

/// Expression compile and evaluation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("Unmatched ')' in expression")]
    UnmatchedClose,

    #[error("Unmatched '(' in expression")]
    UnmatchedOpen,

    #[error("Empty expression")]
    Empty,

    #[error("Operator '{0}' is missing an operand")]
    MissingOperand(String),

    #[error("Unexpected trailing token '{0}'")]
    TrailingToken(String),

    #[error("Cannot resolve operand '{0}'")]
    UnresolvedOperand(String),
}

impl ExprError {
    pub fn missing_operand(operator: impl Into<String>) -> Self {
        Self::MissingOperand(operator.into())
    }

    pub fn trailing_token(token: impl Into<String>) -> Self {
        Self::TrailingToken(token.into())
    }

    pub fn unresolved_operand(token: impl Into<String>) -> Self {
        Self::UnresolvedOperand(token.into())
    }
}

pub type Result<T> = std::result::Result<T, ExprError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ExprError::UnmatchedClose.to_string(),
            "Unmatched ')' in expression"
        );
        assert_eq!(
            ExprError::missing_operand("and").to_string(),
            "Operator 'and' is missing an operand"
        );
        assert_eq!(
            ExprError::unresolved_operand("a:b:c:d").to_string(),
            "Cannot resolve operand 'a:b:c:d'"
        );
    }
}
