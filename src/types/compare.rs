// Three-valued comparisons plus the total ordering used by sorting.
//
// SQL comparison of a NULL with anything yields NULL, never false. Sorting
// needs a total order, so compare_for_sort places NULLs after all non-NULL
// values under an ascending key.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::{cast, LogicalType, Value};
use crate::error::{DbError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    pub fn matches(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        }
    }
}

/// SQL comparison. NULL operands produce a NULL BOOL.
pub fn compare(op: CmpOp, a: &Value, b: &Value) -> Result<Value> {
    if a.is_null() || b.is_null() {
        return Ok(Value::null(LogicalType::Bool));
    }
    let ord = compare_raw(a, b)?;
    Ok(Value::boolean(op.matches(ord)))
}

/// Compare two non-NULL values after implicit promotion. Fails when the
/// operand types have no comparison operator.
pub fn compare_raw(a: &Value, b: &Value) -> Result<Ordering> {
    debug_assert!(!a.is_null() && !b.is_null());
    let common = cast::promote_pair(a.ty(), b.ty())?;
    match common {
        LogicalType::Bool => Ok(cmp_opt(a.as_bool(), b.as_bool())?),
        ty if ty.is_integral() => Ok(cmp_opt(a.as_i64(), b.as_i64())?),
        LogicalType::Decimal => {
            let (x, y) = (
                a.as_f64().ok_or_else(|| no_operator(a, b))?,
                b.as_f64().ok_or_else(|| no_operator(a, b))?,
            );
            Ok(x.total_cmp(&y))
        }
        LogicalType::Date => Ok(cmp_opt(a.as_date(), b.as_date())?),
        LogicalType::Timestamp => {
            let ts = |v: &Value| {
                v.as_timestamp()
                    .or_else(|| v.as_date().and_then(|d| d.and_hms_opt(0, 0, 0)))
            };
            Ok(cmp_opt(ts(a), ts(b))?)
        }
        LogicalType::Varchar => Ok(cmp_opt(a.as_str(), b.as_str())?),
        LogicalType::Varbinary => Ok(cmp_opt(a.as_bytes(), b.as_bytes())?),
        _ => Err(no_operator(a, b)),
    }
}

fn cmp_opt<T: Ord>(a: Option<T>, b: Option<T>) -> Result<Ordering> {
    match (a, b) {
        (Some(x), Some(y)) => Ok(x.cmp(&y)),
        _ => Err(DbError::TypeError("mismatched payloads in comparison".into())),
    }
}

fn no_operator(a: &Value, b: &Value) -> DbError {
    DbError::TypeError(format!("no comparison operator for {} and {}", a.ty(), b.ty()))
}

/// Total order for sorting: NULLs sort after every non-NULL value, and
/// incomparable types tie-break on the type tag so the order stays total.
pub fn compare_for_sort(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare_raw(a, b).unwrap_or_else(|_| a.ty().cmp(&b.ty())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_comparison_is_null() {
        let r = compare(CmpOp::Eq, &Value::null(LogicalType::Integer), &Value::integer(3)).unwrap();
        assert!(r.is_null());
        assert_eq!(r.ty(), LogicalType::Bool);
    }

    #[test]
    fn cross_width_integers_compare() {
        let r = compare(CmpOp::Lt, &Value::tinyint(5), &Value::bigint(6)).unwrap();
        assert_eq!(r.as_bool(), Some(true));
    }

    #[test]
    fn integer_decimal_promotion() {
        let r = compare(CmpOp::Eq, &Value::integer(2), &Value::decimal(2.0)).unwrap();
        assert_eq!(r.as_bool(), Some(true));
    }

    #[test]
    fn nulls_sort_last() {
        let null = Value::null(LogicalType::Integer);
        let one = Value::integer(1);
        assert_eq!(compare_for_sort(&null, &one), Ordering::Greater);
        assert_eq!(compare_for_sort(&one, &null), Ordering::Less);
        assert_eq!(compare_for_sort(&null, &null), Ordering::Equal);
    }

    #[test]
    fn varchar_and_integer_have_no_operator() {
        assert!(compare(CmpOp::Eq, &Value::varchar("a"), &Value::integer(1)).is_err());
    }
}
