use std::cmp::Ordering;

use crate::ast::{BinaryOp, UnaryOp};
use crate::evaluator::{EvalError, EvalResult};
use crate::source::Span;
use crate::types::Value;

fn type_error(expected: &'static str, found: &Value, span: Span) -> EvalError {
    EvalError::TypeMismatch {
        expected,
        found: found.type_name(),
        span,
    }
}

fn expect_integer(value: &Value, span: Span) -> EvalResult<i64> {
    match value {
        Value::Integer(n) => Ok(*n),
        other => Err(type_error("integer", other, span)),
    }
}

// Booleans take part in comparisons as 0 and 1.
fn as_number(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(n) => Some(*n),
        Value::Boolean(b) => Some(i64::from(*b)),
        Value::Procedure(_) | Value::Void => None,
    }
}

/// Integer division rounding toward negative infinity. `None` on overflow.
pub fn floor_div(a: i64, b: i64) -> Option<i64> {
    let quotient = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        quotient.checked_sub(1)
    } else {
        Some(quotient)
    }
}

/// Remainder matching [`floor_div`]: takes the sign of the divisor.
pub fn floor_mod(a: i64, b: i64) -> i64 {
    // i64::MIN % -1 overflows in hardware, but the remainder is 0
    let remainder = if b == -1 { 0 } else { a % b };
    if remainder != 0 && ((remainder < 0) != (b < 0)) {
        remainder + b
    } else {
        remainder
    }
}

fn arithmetic<F: Fn(i64, i64) -> Option<i64>>(
    left: &Value,
    right: &Value,
    span: Span,
    func: F,
) -> EvalResult {
    let a = expect_integer(left, span)?;
    let b = expect_integer(right, span)?;
    func(a, b)
        .map(Value::Integer)
        .ok_or(EvalError::IntegerOverflow(span))
}

// Orders integers and booleans on one scale: False == 0, True == 1.
fn compare(left: &Value, right: &Value, span: Span) -> EvalResult<Ordering> {
    match (as_number(left), as_number(right)) {
        (Some(a), Some(b)) => Ok(a.cmp(&b)),
        (None, _) => Err(type_error("integer or boolean", left, span)),
        (_, None) => Err(type_error("integer or boolean", right, span)),
    }
}

/// `!` negates the operand's truthiness, as `if` judges it.
pub fn apply_unary(op: UnaryOp, operand: &Value, _span: Span) -> EvalResult {
    match op {
        UnaryOp::Not => Ok(Value::Boolean(!operand.is_truthy())),
    }
}

/// Applies `op` to two already evaluated operands.
pub fn apply_binary(op: BinaryOp, left: &Value, right: &Value, span: Span) -> EvalResult {
    match op {
        BinaryOp::Add => arithmetic(left, right, span, i64::checked_add),
        BinaryOp::Sub => arithmetic(left, right, span, i64::checked_sub),
        BinaryOp::Mul => arithmetic(left, right, span, i64::checked_mul),
        BinaryOp::Div => {
            let a = expect_integer(left, span)?;
            let b = expect_integer(right, span)?;
            if b == 0 {
                return Err(EvalError::DivisionByZero(span));
            }
            floor_div(a, b)
                .map(Value::Integer)
                .ok_or(EvalError::IntegerOverflow(span))
        }
        BinaryOp::Mod => {
            let a = expect_integer(left, span)?;
            let b = expect_integer(right, span)?;
            if b == 0 {
                return Err(EvalError::ModuloByZero(span));
            }
            Ok(Value::Integer(floor_mod(a, b)))
        }
        BinaryOp::And => Ok(Value::Boolean(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Ok(Value::Boolean(left.is_truthy() || right.is_truthy())),
        BinaryOp::Eq => Ok(Value::Boolean(compare(left, right, span)?.is_eq())),
        BinaryOp::NotEq => Ok(Value::Boolean(compare(left, right, span)?.is_ne())),
        BinaryOp::Greater => Ok(Value::Boolean(compare(left, right, span)?.is_gt())),
        BinaryOp::Less => Ok(Value::Boolean(compare(left, right, span)?.is_lt())),
        BinaryOp::GreaterEq => Ok(Value::Boolean(compare(left, right, span)?.is_ge())),
        BinaryOp::LessEq => Ok(Value::Boolean(compare(left, right, span)?.is_le())),
    }
}
