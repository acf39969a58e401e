//! ExpressionParser - prefix expression evaluation over an operator table
//!
//! Two evaluation strategies produce identical results for well-formed input:
//! - `parse_prefix`: stack machine over the reversed token sequence; an
//!   operator short of operands is skipped, and the result is `None` unless
//!   exactly one value remains.
//! - `parse_prefix_strict`: recursive descent from the left; malformations are
//!   reported as `ExprError`.

use crate::compiler;
use crate::error::{ExprError, Result};
use crate::operator::{Operator, OperatorTable, Token};

/// ExpressionParser - compiles and evaluates logic expressions
///
/// # Example
/// ```
/// use switchlogic_expr::{boolean_table, ExpressionParser};
///
/// let parser = ExpressionParser::new(boolean_table(|t| match t {
///     "A" => Some(true),
///     "B" => Some(false),
///     _ => None,
/// }));
///
/// assert_eq!(parser.parse_expression("A and not B"), Some(true));
/// assert_eq!(parser.parse_expression("A and (B"), None);
/// ```
pub struct ExpressionParser<T> {
    table: OperatorTable<T>,
}

impl<T> ExpressionParser<T> {
    pub fn new(table: OperatorTable<T>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &OperatorTable<T> {
        &self.table
    }

    /// Compile an infix expression to its prefix form
    pub fn infix_to_prefix(&self, expression: &str) -> Result<String> {
        compiler::infix_to_prefix(expression, &self.table)
    }

    /// Compile and evaluate an infix expression
    ///
    /// Returns `None` if the expression does not compile or does not reduce
    /// to exactly one value.
    pub fn parse_expression(&self, expression: &str) -> Option<T> {
        match self.infix_to_prefix(expression) {
            Ok(prefix) => self.parse_prefix(&prefix),
            Err(e) => {
                tracing::debug!("Expression '{}' rejected: {}", expression, e);
                None
            },
        }
    }

    /// Compile and evaluate an infix expression, reporting failures
    pub fn parse_expression_strict(&self, expression: &str) -> Result<T> {
        let prefix = self.infix_to_prefix(expression)?;
        self.parse_prefix_strict(&prefix)
    }

    /// Evaluate a prefix expression with a stack machine
    ///
    /// Tokens are consumed right to left. Operands are resolved and pushed;
    /// an operator pops its operands (the most recently pushed first) and
    /// pushes the result. An operator without enough operands is skipped and
    /// leaves the stack untouched. An operand the resolver rejects makes the
    /// expression malformed, as does anything other than exactly one value
    /// left at the end.
    pub fn parse_prefix(&self, expression: &str) -> Option<T> {
        tracing::debug!("Evaluating prefix expression '{}'", expression);

        let mut stack: Vec<T> = Vec::new();

        for token in expression.split_whitespace().rev() {
            match self.table.classify(token) {
                Token::Operator(name, def) => match &def.operator {
                    Operator::Unary(apply) => match stack.pop() {
                        Some(a) => stack.push(apply(a)),
                        None => tracing::debug!("Operator '{}' has no operand, skipped", name),
                    },
                    Operator::Binary(apply) => {
                        if stack.len() < 2 {
                            tracing::debug!("Operator '{}' is missing an operand, skipped", name);
                            continue;
                        }
                        let a = stack.pop()?;
                        let b = stack.pop()?;
                        stack.push(apply(a, b));
                    },
                },
                Token::Open | Token::Close | Token::Operand(_) => match self.table.resolve(token) {
                    Some(value) => stack.push(value),
                    None => {
                        tracing::debug!("Operand '{}' did not resolve", token);
                        return None;
                    },
                },
            }
        }

        if stack.len() == 1 {
            stack.pop()
        } else {
            tracing::debug!(
                "Prefix expression '{}' left {} values on the stack",
                expression,
                stack.len()
            );
            None
        }
    }

    /// Evaluate a prefix expression by recursive descent
    pub fn parse_prefix_strict(&self, expression: &str) -> Result<T> {
        let tokens: Vec<&str> = expression.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(ExprError::Empty);
        }

        let mut cursor = 0;
        let value = self.resolve_at(&tokens, &mut cursor, None)?;

        match tokens.get(cursor) {
            Some(extra) => Err(ExprError::trailing_token(*extra)),
            None => Ok(value),
        }
    }

    fn resolve_at(&self, tokens: &[&str], cursor: &mut usize, parent: Option<&str>) -> Result<T> {
        let Some(&token) = tokens.get(*cursor) else {
            return Err(ExprError::missing_operand(parent.unwrap_or_default()));
        };
        *cursor += 1;

        match self.table.classify(token) {
            Token::Operator(name, def) => match &def.operator {
                Operator::Unary(apply) => {
                    let a = self.resolve_at(tokens, cursor, Some(name))?;
                    Ok(apply(a))
                },
                Operator::Binary(apply) => {
                    let a = self.resolve_at(tokens, cursor, Some(name))?;
                    let b = self.resolve_at(tokens, cursor, Some(name))?;
                    Ok(apply(a, b))
                },
            },
            Token::Open | Token::Close | Token::Operand(_) => self
                .table
                .resolve(token)
                .ok_or_else(|| ExprError::unresolved_operand(token)),
        }
    }
}
