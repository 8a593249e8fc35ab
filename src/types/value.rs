use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use super::LogicalType;
use crate::error::{DbError, Result};

/// A typed scalar value. The type tag is kept even when the payload is NULL.
#[derive(Debug, Clone)]
pub struct Value {
    ty: LogicalType,
    payload: Payload,
}

#[derive(Debug, Clone)]
pub(crate) enum Payload {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Str(Arc<str>),
    Bytes(Arc<[u8]>),
    Array(Arc<[Value]>),
}

impl Value {
    pub fn null(ty: LogicalType) -> Self {
        Value { ty, payload: Payload::Null }
    }

    pub fn boolean(v: bool) -> Self {
        Value { ty: LogicalType::Bool, payload: Payload::Bool(v) }
    }

    pub fn tinyint(v: i8) -> Self {
        Value { ty: LogicalType::TinyInt, payload: Payload::Int(v as i64) }
    }

    pub fn smallint(v: i16) -> Self {
        Value { ty: LogicalType::SmallInt, payload: Payload::Int(v as i64) }
    }

    pub fn integer(v: i32) -> Self {
        Value { ty: LogicalType::Integer, payload: Payload::Int(v as i64) }
    }

    pub fn bigint(v: i64) -> Self {
        Value { ty: LogicalType::BigInt, payload: Payload::Int(v) }
    }

    pub fn decimal(v: f64) -> Self {
        Value { ty: LogicalType::Decimal, payload: Payload::Double(v) }
    }

    pub fn date(v: NaiveDate) -> Self {
        Value { ty: LogicalType::Date, payload: Payload::Date(v) }
    }

    pub fn timestamp(v: NaiveDateTime) -> Self {
        Value { ty: LogicalType::Timestamp, payload: Payload::Timestamp(v) }
    }

    pub fn varchar<S: Into<Arc<str>>>(v: S) -> Self {
        Value { ty: LogicalType::Varchar, payload: Payload::Str(v.into()) }
    }

    pub fn varbinary<B: Into<Arc<[u8]>>>(v: B) -> Self {
        Value { ty: LogicalType::Varbinary, payload: Payload::Bytes(v.into()) }
    }

    pub fn array<A: Into<Arc<[Value]>>>(v: A) -> Self {
        Value { ty: LogicalType::Array, payload: Payload::Array(v.into()) }
    }

    /// An integral value of the given width. Fails if `v` is out of range.
    pub fn integral(ty: LogicalType, v: i64) -> Result<Self> {
        let (lo, hi) = ty
            .integral_range()
            .ok_or_else(|| DbError::TypeError(format!("{ty} is not an integral type")))?;
        if v < lo || v > hi {
            return Err(DbError::Arithmetic(format!("value {v} out of range for {ty}")));
        }
        Ok(Value { ty, payload: Payload::Int(v) })
    }

    pub fn ty(&self) -> LogicalType {
        self.ty
    }

    pub fn is_null(&self) -> bool {
        matches!(self.payload, Payload::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.payload {
            Payload::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.payload {
            Payload::Int(v) => Some(v),
            Payload::Bool(b) => Some(b as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.payload {
            Payload::Double(v) => Some(v),
            Payload::Int(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.payload {
            Payload::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self.payload {
            Payload::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self.payload {
            Payload::Timestamp(t) => Some(t),
            _ => None,
        }
    }

    /// Structural hash, consistent with structural equality.
    pub fn hash_into<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(&self.payload).hash(state);
        match &self.payload {
            Payload::Null => {}
            Payload::Bool(b) => b.hash(state),
            Payload::Int(v) => v.hash(state),
            Payload::Double(v) => v.to_bits().hash(state),
            Payload::Date(d) => d.hash(state),
            Payload::Timestamp(t) => t.hash(state),
            Payload::Str(s) => s.hash(state),
            Payload::Bytes(b) => b.hash(state),
            Payload::Array(vs) => {
                vs.len().hash(state);
                for v in vs.iter() {
                    v.hash_into(state);
                }
            }
        }
    }
}

// Structural equality: same type tag, bitwise-equal payload. This is the
// equality used by plan comparison and hashing, not SQL equality (which is
// three-valued and lives in types::compare).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.ty != other.ty {
            return false;
        }
        match (&self.payload, &other.payload) {
            (Payload::Null, Payload::Null) => true,
            (Payload::Bool(a), Payload::Bool(b)) => a == b,
            (Payload::Int(a), Payload::Int(b)) => a == b,
            (Payload::Double(a), Payload::Double(b)) => a.to_bits() == b.to_bits(),
            (Payload::Date(a), Payload::Date(b)) => a == b,
            (Payload::Timestamp(a), Payload::Timestamp(b)) => a == b,
            (Payload::Str(a), Payload::Str(b)) => a == b,
            (Payload::Bytes(a), Payload::Bytes(b)) => a == b,
            (Payload::Array(a), Payload::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.payload {
            Payload::Null => f.write_str("NULL"),
            Payload::Bool(b) => write!(f, "{b}"),
            Payload::Int(v) => write!(f, "{v}"),
            Payload::Double(v) => write!(f, "{v}"),
            Payload::Date(d) => write!(f, "{d}"),
            Payload::Timestamp(t) => write!(f, "{t}"),
            Payload::Str(s) => f.write_str(s),
            Payload::Bytes(b) => {
                for byte in b.iter() {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Payload::Array(vs) => write!(f, "[{} values]", vs.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_keeps_type_tag() {
        let v = Value::null(LogicalType::Integer);
        assert!(v.is_null());
        assert_eq!(v.ty(), LogicalType::Integer);
    }

    #[test]
    fn integral_range_checks() {
        assert!(Value::integral(LogicalType::TinyInt, 127).is_ok());
        assert!(Value::integral(LogicalType::TinyInt, 128).is_err());
        assert!(Value::integral(LogicalType::SmallInt, -32_768).is_ok());
        assert!(Value::integral(LogicalType::SmallInt, -32_769).is_err());
    }

    #[test]
    fn structural_equality_is_type_sensitive() {
        assert_ne!(Value::integer(1), Value::bigint(1));
        assert_eq!(Value::integer(1), Value::integer(1));
        assert_eq!(Value::null(LogicalType::Integer), Value::null(LogicalType::Integer));
        assert_ne!(Value::null(LogicalType::Integer), Value::null(LogicalType::Varchar));
    }
}
