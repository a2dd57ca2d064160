//! The boolean expression language used by `visible-if` directives.
//!
//! Grammar (whitespace-insensitive except where noted):
//!
//! ```text
//! expr        := or_rule
//! or_rule     := and_rule ( SPACE+ "or"  SPACE+ and_rule )*
//! and_rule    := atom_expr ( SPACE+ "and" SPACE+ atom_expr )*
//! atom_expr   := "not" "(" or_rule ")"
//!              | "(" or_rule ")"
//!              | atom SPACE+ unary_op
//!              | atom binary_op atom
//! atom        := function | variable | string_literal | real | integer
//! unary_op    := "is true" | "is not true" | "is false"
//!              | "is empty" | "is not empty" | "is null" | "is not null"
//! binary_op   := "=" | "!=" | "<" | "<=" | ">" | ">="
//! ```
//!
//! A bare atom is not a valid expression; `foo is true` must be written
//! explicitly. Evaluation failures carry `At token …` frames naming the
//! operator and the offending sub-expression.

mod ast;
mod eval;
mod parser;

pub use ast::{Expr, Operand};
pub use parser::parse;

use crate::context::RenderContext;
use crate::error::{Result, ResultExt};

/// Parse and evaluate a boolean expression against a render context.
pub fn evaluate(expression: &str, rnd: &RenderContext) -> Result<bool> {
    parse(expression)
        .and_then(|expr| expr.evaluate(rnd))
        .frame(|| format!("evaluate test expression: {}", expression))
}
