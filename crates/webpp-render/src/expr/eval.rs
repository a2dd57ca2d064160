//! Typed evaluation of parsed expressions.

use crate::context::RenderContext;
use crate::error::{Error, Result};
use crate::expr::ast::{Expr, Operand};
use crate::tree::TreeElement;
use crate::value::Value;

type EResult<T> = std::result::Result<T, ExprError>;

/// An evaluation failure with `At token …` frames, outermost first.
pub(crate) struct ExprError {
    message: String,
    frames: Vec<(String, String)>,
}

impl ExprError {
    fn bare(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            frames: Vec::new(),
        }
    }

    fn at(token: &str, value: String, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            frames: vec![(token.to_string(), value)],
        }
    }

    fn wrap(mut self, token: &str, value: String) -> Self {
        self.frames.insert(0, (token.to_string(), value));
        self
    }

    fn render(&self) -> String {
        let mut out = format!("Expression error: {}\n", self.message);
        for (i, (token, value)) in self.frames.iter().enumerate() {
            out.push_str(&format!("{}. At token {}(value = {})\n", i + 1, token, value));
        }
        out
    }
}

impl From<ExprError> for Error {
    fn from(err: ExprError) -> Self {
        Error::new(err.render())
    }
}

/// An evaluated atom, tagged with the type the comparison algorithm
/// reasons about. `Unknown` covers context values whose type the
/// expression language does not model (booleans, lazy results).
enum TypedValue {
    Integer(i64),
    Real(f64),
    Str(String),
    Unknown(String),
}

impl TypedValue {
    fn type_name(&self) -> &'static str {
        match self {
            TypedValue::Integer(_) => "integer",
            TypedValue::Real(_) => "real",
            TypedValue::Str(_) => "string",
            TypedValue::Unknown(_) => "unknown",
        }
    }
}

impl Expr {
    /// Evaluate this expression as a boolean.
    pub fn evaluate(&self, rnd: &RenderContext) -> Result<bool> {
        self.eval_bool(rnd).map_err(Error::from)
    }

    fn eval_bool(&self, rnd: &RenderContext) -> EResult<bool> {
        match self {
            Expr::And(lhs, rhs) => Ok(lhs.eval_bool(rnd)? && rhs.eval_bool(rnd)?),
            Expr::Or(lhs, rhs) => Ok(lhs.eval_bool(rnd)? || rhs.eval_bool(rnd)?),
            Expr::Not(rhs) => Ok(!rhs.eval_bool(rnd)?),
            Expr::Unary { op, operand } => eval_unary(*op, operand, rnd),
            Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, rnd),
            Expr::Literal(s) => Err(ExprError::at(
                "string",
                s.clone(),
                "String can not be evaluated as boolean expression",
            )),
            Expr::Variable(v) => Err(ExprError::at(
                "variable",
                v.clone(),
                "Variable can not be evaluated as boolean expression, use 'foo is true' instead",
            )),
            Expr::Function { path, name } => Err(ExprError::at(
                "function",
                format!("{}.{}()", path, name),
                "Function can not be evaluated as boolean expression, use 'foo.bar() is true' instead",
            )),
            Expr::Int(v) => Err(ExprError::at(
                "integer",
                v.to_string(),
                "Integer can not be evaluated as boolean expression",
            )),
            Expr::Real(v) => Err(ExprError::at(
                "real",
                v.to_string(),
                "Real can not be evaluated as boolean expression",
            )),
        }
    }

    /// Resolve the context slot a unary test applies to. Only variables
    /// name slots.
    fn tree_element(&self, rnd: &RenderContext) -> EResult<TreeElement> {
        match self {
            Expr::Variable(name) => Ok(rnd.get(name)),
            other => Err(ExprError::at(
                other.token_name(),
                other.token_value(),
                "Expected variable",
            )),
        }
    }

    fn typed_value(&self, rnd: &RenderContext) -> EResult<TypedValue> {
        match self {
            Expr::Literal(s) => Ok(TypedValue::Str(s.clone())),
            Expr::Int(v) => Ok(TypedValue::Integer(*v)),
            Expr::Real(v) => Ok(TypedValue::Real(*v)),
            Expr::Variable(name) => {
                let slot = rnd.get(name);
                if slot.empty() {
                    return Err(ExprError::bare(format!("Variable is null: {}", name)));
                }
                slot.with_value(|value| {
                    Ok(match value {
                        Value::Int(v) => TypedValue::Integer(*v),
                        Value::Real(v) => TypedValue::Real(*v),
                        Value::String(v) => TypedValue::Str(v.clone()),
                        other => TypedValue::Unknown(other.output()?),
                    })
                })
                .map_err(|err| ExprError::bare(err.message().to_string()))
            }
            Expr::Function { path, name } => {
                if name == "size" {
                    let slot = rnd.get(path);
                    if !slot.is_array() {
                        return Err(ExprError::bare(format!(
                            "size(): variable is not array: {}",
                            path
                        )));
                    }
                    let size = slot
                        .array_size()
                        .map_err(|err| ExprError::bare(err.message().to_string()))?;
                    Ok(TypedValue::Integer(size as i64))
                } else {
                    Err(ExprError::bare(format!(
                        "Unknown function {}: {}.{}()",
                        name, path, name
                    )))
                }
            }
            other => Err(ExprError::at(
                other.token_name(),
                other.token_value(),
                "Expected atom",
            )),
        }
    }
}

fn eval_unary(op: Operand, operand: &Expr, rnd: &RenderContext) -> EResult<bool> {
    let result = (|| {
        let slot = operand.tree_element(rnd)?;
        match op {
            Operand::IsNull => Ok(slot.empty()),
            Operand::IsNotNull => Ok(slot.is_array() || slot.is_value()),
            Operand::IsNotEmpty => {
                if slot.is_array() {
                    slot.array_empty()
                        .map(|empty| !empty)
                        .map_err(|err| ExprError::bare(err.message().to_string()))
                } else {
                    Ok(false)
                }
            }
            Operand::IsEmpty => {
                if slot.is_array() {
                    slot.array_empty()
                        .map_err(|err| ExprError::bare(err.message().to_string()))
                } else {
                    Ok(true)
                }
            }
            Operand::IsTrue | Operand::IsNotTrue => {
                if !slot.is_value() {
                    return Err(ExprError::bare("Expected boolean value"));
                }
                let truth = slot
                    .value_is_true()
                    .map_err(|err| ExprError::bare(err.message().to_string()))?;
                Ok(if op == Operand::IsTrue { truth } else { !truth })
            }
            other => Err(ExprError::bare(format!(
                "unary evaluation does not support {}",
                other.name()
            ))),
        }
    })();
    result.map_err(|err| err.wrap(op.name(), operand.repr()))
}

fn eval_binary(op: Operand, lhs: &Expr, rhs: &Expr, rnd: &RenderContext) -> EResult<bool> {
    let result = (|| {
        let right = rhs.typed_value(rnd)?;
        let left = lhs.typed_value(rnd)?;

        match (&left, &right) {
            // two untyped values can only be compared textually
            (TypedValue::Unknown(l), TypedValue::Unknown(r)) => compare(op, l, r),
            (TypedValue::Unknown(_), _) => compare_as(op, &right, &left, &right),
            (_, TypedValue::Unknown(_)) => compare_as(op, &left, &left, &right),
            _ if left.type_name() == right.type_name() => compare_as(op, &left, &left, &right),
            _ => Err(ExprError::bare(format!(
                "Could not use operator {} on different types: {}({}) and {}({})",
                op.name(),
                left.type_name(),
                lhs.repr(),
                right.type_name(),
                rhs.repr()
            ))),
        }
    })();
    result.map_err(|err| err.wrap(op.name(), format!("{},{}", lhs.repr(), rhs.repr())))
}

/// Compare `lhs` and `rhs` in the type of `model`, lexically casting
/// untyped sides.
fn compare_as(
    op: Operand,
    model: &TypedValue,
    lhs: &TypedValue,
    rhs: &TypedValue,
) -> EResult<bool> {
    match model {
        TypedValue::Integer(_) => compare(op, &cast_integer(lhs)?, &cast_integer(rhs)?),
        TypedValue::Real(_) => compare(op, &cast_real(lhs)?, &cast_real(rhs)?),
        TypedValue::Str(_) | TypedValue::Unknown(_) => {
            compare(op, &cast_text(lhs), &cast_text(rhs))
        }
    }
}

fn cast_integer(value: &TypedValue) -> EResult<i64> {
    match value {
        TypedValue::Integer(v) => Ok(*v),
        TypedValue::Unknown(s) | TypedValue::Str(s) => s
            .parse::<i64>()
            .map_err(|_| ExprError::bare(format!("bad cast '{}' to integer", s))),
        TypedValue::Real(v) => Err(ExprError::bare(format!("bad cast '{}' to integer", v))),
    }
}

fn cast_real(value: &TypedValue) -> EResult<f64> {
    match value {
        TypedValue::Real(v) => Ok(*v),
        TypedValue::Integer(v) => Err(ExprError::bare(format!("bad cast '{}' to real", v))),
        TypedValue::Unknown(s) | TypedValue::Str(s) => s
            .parse::<f64>()
            .map_err(|_| ExprError::bare(format!("bad cast '{}' to real", s))),
    }
}

fn cast_text(value: &TypedValue) -> String {
    match value {
        TypedValue::Str(s) | TypedValue::Unknown(s) => s.clone(),
        TypedValue::Integer(v) => v.to_string(),
        TypedValue::Real(v) => v.to_string(),
    }
}

/// String ordering is lexical by code units; numeric ordering is
/// numeric.
fn compare<T: PartialOrd + ?Sized>(op: Operand, lhs: &T, rhs: &T) -> EResult<bool> {
    match op {
        Operand::Eq => Ok(lhs == rhs),
        Operand::Ne => Ok(lhs != rhs),
        Operand::Lt => Ok(lhs < rhs),
        Operand::Le => Ok(lhs <= rhs),
        Operand::Gt => Ok(lhs > rhs),
        Operand::Ge => Ok(lhs >= rhs),
        other => Err(ExprError::bare(format!(
            "comparison does not support {}",
            other.name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse;
    use crate::tree::Array;

    fn eval(expression: &str, rnd: &RenderContext) -> Result<bool> {
        parse(expression).unwrap().evaluate(rnd)
    }

    #[test]
    fn unknown_sides_compare_as_strings() {
        let rnd = RenderContext::new();
        rnd.create_value("a", true);
        rnd.create_value("b", true);
        assert!(eval("a = b", &rnd).unwrap());

        rnd.create_value("b", false);
        assert!(eval("a != b", &rnd).unwrap());
    }

    #[test]
    fn unknown_casts_to_the_typed_side() {
        let rnd = RenderContext::new();
        // boolean output "1" lexically casts to the integer literal side
        rnd.create_value("flag", true);
        assert!(eval("flag = 1", &rnd).unwrap());
        assert!(eval("flag < 2", &rnd).unwrap());
    }

    #[test]
    fn typed_comparisons_use_stored_types() {
        let rnd = RenderContext::new();
        rnd.create_value("n", 3);
        rnd.create_value("m", 5);
        assert!(eval("n < m", &rnd).unwrap());
        assert!(eval("n != m", &rnd).unwrap());

        rnd.create_value("x", 1.5);
        assert!(eval("x > 1.0", &rnd).unwrap());

        rnd.create_value("s", "abc");
        assert!(eval("s < 'abd'", &rnd).unwrap());
    }

    #[test]
    fn bad_lexical_cast_fails() {
        let rnd = RenderContext::new();
        rnd.create_value("flag", true); // outputs "1", but…
        rnd.create_value("word", "abc");
        let err = eval("word = 1", &rnd).unwrap_err();
        assert!(err.message().contains("Could not use operator eq"));

        // an untyped (boolean) value against a string literal casts textually
        assert!(eval("flag = '1'", &rnd).unwrap());
        let err = eval("flag = 1", &rnd);
        assert!(err.unwrap());
    }

    #[test]
    fn different_types_error_names_both_sides() {
        let rnd = RenderContext::new();
        rnd.create_value("a", 3);
        rnd.create_value("b", "x");
        let err = eval("a < b", &rnd).unwrap_err();
        let message = err.message();
        assert!(message.contains(
            "Could not use operator lt on different types: integer(variable(a)) and string(variable(b))"
        ));
        assert!(message.contains("1. At token lt(value = variable(a),variable(b))"));
    }

    #[test]
    fn missing_variable_is_null_error() {
        let rnd = RenderContext::new();
        let err = eval("ghost = 1", &rnd).unwrap_err();
        assert!(err.message().contains("Variable is null: ghost"));
        assert!(err.message().contains("At token eq"));
    }

    #[test]
    fn bare_operands_are_rejected_in_unary_position() {
        let rnd = RenderContext::new();
        let err = eval("'lit' is null", &rnd).unwrap_err();
        assert!(err.message().contains("Expected variable"));
        assert!(err.message().contains("At token is_null(value = string(lit))"));
    }

    #[test]
    fn size_of_non_array_fails() {
        let rnd = RenderContext::new();
        rnd.create_value("xs", 1);
        let err = eval("xs.size() = 1", &rnd).unwrap_err();
        assert!(err.message().contains("size(): variable is not array: xs"));
    }

    #[test]
    fn unknown_function_fails() {
        let rnd = RenderContext::new();
        let err = eval("a.b.count() = 1", &rnd).unwrap_err();
        assert!(err.message().contains("Unknown function count: a.b.count()"));
    }

    #[test]
    fn is_empty_on_arrays() {
        let rnd = RenderContext::new();
        rnd.create_array("xs", Array::new());
        assert!(eval("xs is empty", &rnd).unwrap());
        assert!(!eval("xs is not empty", &rnd).unwrap());
        // a non-array slot counts as empty
        assert!(eval("missing is empty", &rnd).unwrap());
    }
}
