// Checked arithmetic with NULL propagation. Operands promote to their
// common type first; integral math is performed in 64 bits and then
// range-checked against the result type. Division and modulo detect a zero
// divisor before evaluating.

use serde::{Deserialize, Serialize};

use super::{cast, LogicalType, Value};
use crate::error::{DbError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }
}

/// The result type of `a op b`, or a type error when no operator applies.
pub fn result_type(a: LogicalType, b: LogicalType) -> Result<LogicalType> {
    let common = cast::promote_pair(a, b)?;
    if !common.is_numeric() {
        return Err(DbError::TypeError(format!("no arithmetic operator for {a} and {b}")));
    }
    Ok(common)
}

/// Evaluate `a op b` with NULL propagation.
pub fn evaluate(op: ArithOp, a: &Value, b: &Value) -> Result<Value> {
    let out_ty = result_type(a.ty(), b.ty())?;
    if a.is_null() || b.is_null() {
        return Ok(Value::null(out_ty));
    }
    if out_ty == LogicalType::Decimal {
        let x = a.as_f64().ok_or_else(|| bad_payload(a))?;
        let y = b.as_f64().ok_or_else(|| bad_payload(b))?;
        evaluate_decimal(op, x, y)
    } else {
        let x = a.as_i64().ok_or_else(|| bad_payload(a))?;
        let y = b.as_i64().ok_or_else(|| bad_payload(b))?;
        evaluate_integral(op, x, y, out_ty)
    }
}

/// Unary minus, implemented as `0 - v` over the value's own type.
pub fn negate(v: &Value) -> Result<Value> {
    let zero = match v.ty() {
        LogicalType::Decimal => Value::decimal(0.0),
        ty if ty.is_integral() => Value::integral(ty, 0)?,
        LogicalType::Null => Value::null(LogicalType::Null),
        ty => return Err(DbError::TypeError(format!("cannot negate {ty}"))),
    };
    evaluate(ArithOp::Sub, &zero, v)
}

fn evaluate_integral(op: ArithOp, x: i64, y: i64, out_ty: LogicalType) -> Result<Value> {
    let raw = match op {
        ArithOp::Add => x.checked_add(y),
        ArithOp::Sub => x.checked_sub(y),
        ArithOp::Mul => x.checked_mul(y),
        ArithOp::Div => {
            if y == 0 {
                return Err(DbError::Arithmetic("division by zero".into()));
            }
            x.checked_div(y)
        }
        ArithOp::Mod => {
            if y == 0 {
                return Err(DbError::Arithmetic("division by zero".into()));
            }
            x.checked_rem(y)
        }
    };
    let raw = raw.ok_or_else(|| overflow(op, x, y))?;
    Value::integral(out_ty, raw).map_err(|_| overflow(op, x, y))
}

fn evaluate_decimal(op: ArithOp, x: f64, y: f64) -> Result<Value> {
    let raw = match op {
        ArithOp::Add => x + y,
        ArithOp::Sub => x - y,
        ArithOp::Mul => x * y,
        ArithOp::Div => {
            if y == 0.0 {
                return Err(DbError::Arithmetic("division by zero".into()));
            }
            x / y
        }
        ArithOp::Mod => {
            if y == 0.0 {
                return Err(DbError::Arithmetic("division by zero".into()));
            }
            x % y
        }
    };
    if !raw.is_finite() {
        return Err(DbError::Arithmetic(format!("decimal overflow in {x} {} {y}", op.symbol())));
    }
    Ok(Value::decimal(raw))
}

fn bad_payload(v: &Value) -> DbError {
    DbError::Internal(format!("non-numeric payload in arithmetic: {}", v.ty()))
}

fn overflow(op: ArithOp, x: i64, y: i64) -> DbError {
    DbError::Arithmetic(format!("integer overflow in {x} {} {y}", op.symbol()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_addition_promotes_width() {
        let r = evaluate(ArithOp::Add, &Value::tinyint(100), &Value::integer(100)).unwrap();
        assert_eq!(r.ty(), LogicalType::Integer);
        assert_eq!(r.as_i64(), Some(200));
    }

    #[test]
    fn integer_decimal_promotes_to_decimal() {
        let r = evaluate(ArithOp::Mul, &Value::integer(3), &Value::decimal(1.5)).unwrap();
        assert_eq!(r.ty(), LogicalType::Decimal);
        assert_eq!(r.as_f64(), Some(4.5));
    }

    #[test]
    fn null_propagates_with_result_type() {
        let r = evaluate(ArithOp::Add, &Value::null(LogicalType::Integer), &Value::decimal(1.0)).unwrap();
        assert!(r.is_null());
        assert_eq!(r.ty(), LogicalType::Decimal);
    }

    #[test]
    fn division_by_zero_fails() {
        assert!(matches!(
            evaluate(ArithOp::Div, &Value::integer(1), &Value::integer(0)),
            Err(DbError::Arithmetic(_))
        ));
        assert!(matches!(
            evaluate(ArithOp::Mod, &Value::decimal(1.0), &Value::decimal(0.0)),
            Err(DbError::Arithmetic(_))
        ));
    }

    #[test]
    fn overflow_is_detected() {
        assert!(evaluate(ArithOp::Add, &Value::bigint(i64::MAX), &Value::bigint(1)).is_err());
        // Fits in 64 bits but not in the promoted SMALLINT result type.
        assert!(evaluate(ArithOp::Add, &Value::smallint(32_000), &Value::smallint(1_000)).is_err());
    }

    #[test]
    fn negate_flips_sign() {
        assert_eq!(negate(&Value::integer(5)).unwrap().as_i64(), Some(-5));
        assert!(negate(&Value::null(LogicalType::Integer)).unwrap().is_null());
        assert!(negate(&Value::varchar("x")).is_err());
    }
}
