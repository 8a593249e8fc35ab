// Cast rules between logical types. Implicit casts cover the promotions a
// binary operator may apply on its own; everything else requires an explicit
// CAST expression. Out-of-range and unparseable casts are type errors.

use chrono::{NaiveDate, NaiveDateTime};

use super::{LogicalType, Value};
use crate::error::{DbError, Result};

/// Numeric widening order used for implicit promotion.
fn numeric_rank(ty: LogicalType) -> Option<u8> {
    match ty {
        LogicalType::TinyInt => Some(0),
        LogicalType::SmallInt => Some(1),
        LogicalType::Integer => Some(2),
        LogicalType::BigInt => Some(3),
        LogicalType::Decimal => Some(4),
        _ => None,
    }
}

/// Whether a value of `from` may be silently converted to `to`.
pub fn implicit_cast_allowed(from: LogicalType, to: LogicalType) -> bool {
    if from == to || from == LogicalType::Null {
        return true;
    }
    match (numeric_rank(from), numeric_rank(to)) {
        (Some(f), Some(t)) => f <= t,
        _ => from == LogicalType::Date && to == LogicalType::Timestamp,
    }
}

/// The common type two operands promote to, or a type error if the pair has
/// no viable operator type.
pub fn promote_pair(a: LogicalType, b: LogicalType) -> Result<LogicalType> {
    if a == b {
        return Ok(a);
    }
    if a == LogicalType::Null {
        return Ok(b);
    }
    if b == LogicalType::Null {
        return Ok(a);
    }
    if let (Some(ra), Some(rb)) = (numeric_rank(a), numeric_rank(b)) {
        return Ok(if ra >= rb { a } else { b });
    }
    if (a == LogicalType::Date && b == LogicalType::Timestamp)
        || (a == LogicalType::Timestamp && b == LogicalType::Date)
    {
        return Ok(LogicalType::Timestamp);
    }
    Err(DbError::TypeError(format!("no common type for {a} and {b}")))
}

/// Cast `value` to `to`. NULL casts to NULL of the target type.
pub fn cast(value: &Value, to: LogicalType) -> Result<Value> {
    if value.ty() == to {
        return Ok(value.clone());
    }
    if value.is_null() {
        return Ok(Value::null(to));
    }
    match to {
        LogicalType::Bool => cast_to_bool(value),
        LogicalType::TinyInt | LogicalType::SmallInt | LogicalType::Integer | LogicalType::BigInt => {
            cast_to_integral(value, to)
        }
        LogicalType::Decimal => cast_to_decimal(value),
        LogicalType::Varchar => Ok(Value::varchar(value.to_string())),
        LogicalType::Date => cast_to_date(value),
        LogicalType::Timestamp => cast_to_timestamp(value),
        _ => Err(cast_error(value, to)),
    }
}

fn cast_error(value: &Value, to: LogicalType) -> DbError {
    DbError::TypeError(format!("cannot cast {} value '{}' to {}", value.ty(), value, to))
}

fn cast_to_bool(value: &Value) -> Result<Value> {
    if let Some(i) = value.as_i64() {
        return Ok(Value::boolean(i != 0));
    }
    match value.as_str() {
        Some(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Ok(Value::boolean(true)),
            "false" | "f" | "0" => Ok(Value::boolean(false)),
            _ => Err(cast_error(value, LogicalType::Bool)),
        },
        None => Err(cast_error(value, LogicalType::Bool)),
    }
}

fn cast_to_integral(value: &Value, to: LogicalType) -> Result<Value> {
    let raw = if let Some(i) = value.as_i64() {
        i
    } else if let Some(f) = value.as_f64() {
        if !f.is_finite() || f < i64::MIN as f64 || f > i64::MAX as f64 {
            return Err(cast_error(value, to));
        }
        f.trunc() as i64
    } else if let Some(s) = value.as_str() {
        s.trim().parse::<i64>().map_err(|_| cast_error(value, to))?
    } else {
        return Err(cast_error(value, to));
    };
    // Range failures surface as type errors, not arithmetic errors.
    Value::integral(to, raw).map_err(|_| cast_error(value, to))
}

fn cast_to_decimal(value: &Value) -> Result<Value> {
    if let Some(f) = value.as_f64() {
        return Ok(Value::decimal(f));
    }
    match value.as_str() {
        Some(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::decimal)
            .map_err(|_| cast_error(value, LogicalType::Decimal)),
        None => Err(cast_error(value, LogicalType::Decimal)),
    }
}

fn cast_to_date(value: &Value) -> Result<Value> {
    match value.as_str() {
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Value::date)
            .map_err(|_| cast_error(value, LogicalType::Date)),
        None => Err(cast_error(value, LogicalType::Date)),
    }
}

fn cast_to_timestamp(value: &Value) -> Result<Value> {
    if let Some(d) = value.as_date() {
        return Ok(Value::timestamp(d.and_hms_opt(0, 0, 0).unwrap_or_default()));
    }
    match value.as_str() {
        Some(s) => NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S")
            .map(Value::timestamp)
            .map_err(|_| cast_error(value, LogicalType::Timestamp)),
        None => Err(cast_error(value, LogicalType::Timestamp)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_widening() {
        assert!(implicit_cast_allowed(LogicalType::TinyInt, LogicalType::BigInt));
        assert!(implicit_cast_allowed(LogicalType::Integer, LogicalType::Decimal));
        assert!(!implicit_cast_allowed(LogicalType::BigInt, LogicalType::Integer));
        assert!(!implicit_cast_allowed(LogicalType::Varchar, LogicalType::Integer));
        assert!(implicit_cast_allowed(LogicalType::Null, LogicalType::Varchar));
    }

    #[test]
    fn promotion_picks_wider_type() {
        assert_eq!(
            promote_pair(LogicalType::Integer, LogicalType::Decimal).unwrap(),
            LogicalType::Decimal
        );
        assert_eq!(
            promote_pair(LogicalType::SmallInt, LogicalType::BigInt).unwrap(),
            LogicalType::BigInt
        );
        assert!(promote_pair(LogicalType::Varchar, LogicalType::Integer).is_err());
    }

    #[test]
    fn out_of_range_cast_fails() {
        let v = Value::bigint(40_000);
        assert!(cast(&v, LogicalType::SmallInt).is_err());
        assert!(cast(&v, LogicalType::Integer).is_ok());
    }

    #[test]
    fn varchar_round_trips() {
        let v = cast(&Value::varchar("42"), LogicalType::Integer).unwrap();
        assert_eq!(v.as_i64(), Some(42));
        let d = cast(&Value::varchar("2024-05-01"), LogicalType::Date).unwrap();
        assert!(!d.is_null());
    }

    #[test]
    fn null_casts_to_null_of_target() {
        let v = cast(&Value::null(LogicalType::Integer), LogicalType::Varchar).unwrap();
        assert!(v.is_null());
        assert_eq!(v.ty(), LogicalType::Varchar);
    }
}
