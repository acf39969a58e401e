//! Infix to prefix compiler
//!
//! Shunting-yard over the operator table. Operators are popped only while the
//! stack top binds strictly tighter than the incoming operator, so operators
//! of equal precedence group from the right. For associative operators such
//! as `and`/`or` the result is the same.
//!
//! The emitted postfix sequence is reversed to give the prefix form consumed
//! by the evaluator; operands therefore appear mirrored (`A and B` compiles to
//! `and B A`).

use crate::error::{ExprError, Result};
use crate::operator::{OperatorTable, Token};

/// Split an expression into tokens, treating parentheses as separate tokens
pub fn tokenize(expression: &str) -> Vec<String> {
    expression
        .replace('(', " ( ")
        .replace(')', " ) ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Convert infix tokens to prefix tokens
pub fn to_prefix<T, S>(tokens: &[S], table: &OperatorTable<T>) -> Result<Vec<String>>
where
    S: AsRef<str>,
{
    let mut output: Vec<String> = Vec::with_capacity(tokens.len());
    let mut stack: Vec<&str> = Vec::new();

    for token in tokens {
        match table.classify(token.as_ref()) {
            Token::Open => stack.push("("),
            Token::Close => loop {
                match stack.pop() {
                    Some("(") => break,
                    Some(op) => output.push(op.to_string()),
                    None => return Err(ExprError::UnmatchedClose),
                }
            },
            Token::Operator(name, def) => {
                while let Some(&top) = stack.last() {
                    if top == "(" || table.precedence(top) <= def.precedence {
                        break;
                    }
                    output.push(top.to_string());
                    stack.pop();
                }
                stack.push(name);
            },
            Token::Operand(operand) => output.push(operand.to_string()),
        }
    }

    while let Some(op) = stack.pop() {
        if op == "(" {
            return Err(ExprError::UnmatchedOpen);
        }
        output.push(op.to_string());
    }

    output.reverse();
    Ok(output)
}

/// Convert an infix expression string to a space-joined prefix expression
pub fn infix_to_prefix<T>(expression: &str, table: &OperatorTable<T>) -> Result<String> {
    let tokens = tokenize(expression);
    let prefix = to_prefix(&tokens, table)?;
    tracing::debug!("Compiled '{}' => '{}'", expression, prefix.join(" "));
    Ok(prefix.join(" "))
}
