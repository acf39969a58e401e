//! Operator table
//!
//! Maps operator tokens to their precedence and application function.
//! Every token that is not an operator or a parenthesis is an operand and is
//! handed to the table's operand resolver.

use std::collections::HashMap;
use std::fmt;

/// Unary operator function
pub type UnaryFn<T> = Box<dyn Fn(T) -> T + Send + Sync>;

/// Binary operator function
pub type BinaryFn<T> = Box<dyn Fn(T, T) -> T + Send + Sync>;

/// Operand resolver: leaf token to value, `None` when the token cannot be resolved
pub type OperandFn<T> = Box<dyn Fn(&str) -> Option<T> + Send + Sync>;

/// Operator application function, tagged by arity
pub enum Operator<T> {
    Unary(UnaryFn<T>),
    Binary(BinaryFn<T>),
}

impl<T> Operator<T> {
    /// Number of operands consumed
    pub fn arity(&self) -> usize {
        match self {
            Operator::Unary(_) => 1,
            Operator::Binary(_) => 2,
        }
    }
}

impl<T> fmt::Debug for Operator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Unary(_) => write!(f, "Unary"),
            Operator::Binary(_) => write!(f, "Binary"),
        }
    }
}

/// Operator entry: precedence plus application function
///
/// Higher precedence binds tighter. Precedence 0 is reserved for operands.
#[derive(Debug)]
pub struct OperatorDef<T> {
    pub precedence: u32,
    pub operator: Operator<T>,
}

/// Classified expression token
#[derive(Debug)]
pub enum Token<'a, T> {
    Open,
    Close,
    Operator(&'a str, &'a OperatorDef<T>),
    Operand(&'a str),
}

/// Operator table keyed by token
pub struct OperatorTable<T> {
    operators: HashMap<String, OperatorDef<T>>,
    operand: OperandFn<T>,
}

impl<T> OperatorTable<T> {
    /// Create a table with the given operand resolver and no operators
    pub fn new<F>(operand: F) -> Self
    where
        F: Fn(&str) -> Option<T> + Send + Sync + 'static,
    {
        Self {
            operators: HashMap::new(),
            operand: Box::new(operand),
        }
    }

    /// Register a unary operator
    ///
    /// # Panics
    /// Panics if `precedence` is 0 or `token` is a parenthesis.
    pub fn unary<F>(mut self, token: &str, precedence: u32, apply: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.insert(token, precedence, Operator::Unary(Box::new(apply)));
        self
    }

    /// Register a binary operator
    ///
    /// The function receives the operands in prefix order: `op X Y` applies `f(X, Y)`.
    ///
    /// # Panics
    /// Panics if `precedence` is 0 or `token` is a parenthesis.
    pub fn binary<F>(mut self, token: &str, precedence: u32, apply: F) -> Self
    where
        F: Fn(T, T) -> T + Send + Sync + 'static,
    {
        self.insert(token, precedence, Operator::Binary(Box::new(apply)));
        self
    }

    fn insert(&mut self, token: &str, precedence: u32, operator: Operator<T>) {
        assert!(precedence > 0, "operator precedence must be positive");
        assert!(
            token != "(" && token != ")",
            "parentheses are reserved tokens"
        );
        self.operators.insert(
            token.to_string(),
            OperatorDef {
                precedence,
                operator,
            },
        );
    }

    /// Classify a token
    pub fn classify<'a>(&'a self, token: &'a str) -> Token<'a, T> {
        match token {
            "(" => Token::Open,
            ")" => Token::Close,
            _ => match self.operators.get_key_value(token) {
                Some((name, def)) => Token::Operator(name.as_str(), def),
                None => Token::Operand(token),
            },
        }
    }

    /// Precedence of a token (0 for operands and parentheses)
    pub fn precedence(&self, token: &str) -> u32 {
        self.operators.get(token).map_or(0, |def| def.precedence)
    }

    /// Resolve an operand token
    pub fn resolve(&self, token: &str) -> Option<T> {
        (self.operand)(token)
    }

    /// Registered operator tokens
    pub fn operators(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(String::as_str)
    }
}

/// Standard boolean table: `not` (3) > `and` (2) > `or` (1)
pub fn boolean_table<F>(operand: F) -> OperatorTable<bool>
where
    F: Fn(&str) -> Option<bool> + Send + Sync + 'static,
{
    OperatorTable::new(operand)
        .unary("not", 3, |a| !a)
        .binary("and", 2, |a, b| a && b)
        .binary("or", 1, |a, b| a || b)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_classify_tokens() {
        let table = boolean_table(|_| Some(true));

        assert!(matches!(table.classify("("), Token::Open));
        assert!(matches!(table.classify(")"), Token::Close));
        assert!(matches!(table.classify("A"), Token::Operand("A")));
        match table.classify("and") {
            Token::Operator(name, def) => {
                assert_eq!(name, "and");
                assert_eq!(def.precedence, 2);
                assert_eq!(def.operator.arity(), 2);
            },
            other => panic!("expected operator, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence_lookup() {
        let table = boolean_table(|_| None);

        assert_eq!(table.precedence("not"), 3);
        assert_eq!(table.precedence("and"), 2);
        assert_eq!(table.precedence("or"), 1);
        assert_eq!(table.precedence("tanks.0.level"), 0);
        assert_eq!(table.precedence("("), 0);
    }

    #[test]
    fn test_operand_resolver() {
        let table = boolean_table(|t| match t {
            "1" => Some(true),
            "0" => Some(false),
            _ => None,
        });

        assert_eq!(table.resolve("1"), Some(true));
        assert_eq!(table.resolve("0"), Some(false));
        assert_eq!(table.resolve("x"), None);
    }

    #[test]
    #[should_panic(expected = "parentheses are reserved tokens")]
    fn test_parenthesis_cannot_be_operator() {
        let _ = OperatorTable::<bool>::new(|_| None).unary("(", 1, |a| a);
    }

    #[test]
    #[should_panic(expected = "operator precedence must be positive")]
    fn test_zero_precedence_rejected() {
        let _ = OperatorTable::<bool>::new(|_| None).binary("xor", 0, |a, b| a ^ b);
    }
}
