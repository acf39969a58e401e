//! switchlogic-expr - Logic expression compiler for switchlogic
//!
//! Converts infix logic expressions into prefix (Polish) form and evaluates
//! them over a caller-supplied operator table.
//!
//! # Features
//!
//! - **Operator table**: tokens mapped to unary or binary functions with precedence
//! - **Compiler**: shunting-yard infix to prefix conversion with parenthesis checks
//! - **Evaluator**: stack-machine and recursive-descent prefix evaluation
//!
//! The value type is generic: the rule engine evaluates over observable
//! boolean streams, tests and tooling evaluate over plain `bool`.
//!
//! # Example
//!
//! ```rust
//! use switchlogic_expr::{boolean_table, ExpressionParser};
//!
//! let parser = ExpressionParser::new(boolean_table(|t| match t {
//!     "A" => Some(true),
//!     "B" => Some(false),
//!     _ => None,
//! }));
//!
//! assert_eq!(parser.infix_to_prefix("A and B").unwrap(), "and B A");
//! assert_eq!(parser.parse_expression("A or B"), Some(true));
//! ```
//!
//! # Standard operators
//!
//! | Token | Arity | Precedence |
//! |-------|-------|------------|
//! | `not` | 1 | 3 |
//! | `and` | 2 | 2 |
//! | `or`  | 2 | 1 |

pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod operator;

// Re-exports for convenience
pub use compiler::{infix_to_prefix, to_prefix, tokenize};
pub use error::{ExprError, Result};
pub use evaluator::ExpressionParser;
pub use operator::{boolean_table, Operator, OperatorDef, OperatorTable, Token};
