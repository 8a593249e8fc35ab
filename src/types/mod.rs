// Typed scalar values with SQL NULL semantics.
//
// A value is a (type tag, payload) pair where the payload may be NULL while
// the tag is retained, so NULL INTEGER and NULL VARCHAR stay distinguishable.
// Comparisons and arithmetic follow three-valued logic: any NULL input
// produces a NULL output.

pub mod arithmetic;
pub mod cast;
pub mod compare;
pub mod value;

pub use arithmetic::ArithOp;
pub use compare::CmpOp;
pub use value::Value;

use serde::{Deserialize, Serialize};

// Supported logical column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogicalType {
    Bool,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Decimal,
    Date,
    Timestamp,
    Varchar,
    Varbinary,
    Array,
    Null,
}

impl LogicalType {
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            LogicalType::TinyInt | LogicalType::SmallInt | LogicalType::Integer | LogicalType::BigInt
        )
    }

    pub fn is_numeric(self) -> bool {
        self.is_integral() || self == LogicalType::Decimal
    }

    /// Inclusive range of the integral type, if it is one.
    pub fn integral_range(self) -> Option<(i64, i64)> {
        match self {
            LogicalType::TinyInt => Some((i8::MIN as i64, i8::MAX as i64)),
            LogicalType::SmallInt => Some((i16::MIN as i64, i16::MAX as i64)),
            LogicalType::Integer => Some((i32::MIN as i64, i32::MAX as i64)),
            LogicalType::BigInt => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LogicalType::Bool => "BOOL",
            LogicalType::TinyInt => "TINYINT",
            LogicalType::SmallInt => "SMALLINT",
            LogicalType::Integer => "INTEGER",
            LogicalType::BigInt => "BIGINT",
            LogicalType::Decimal => "DECIMAL",
            LogicalType::Date => "DATE",
            LogicalType::Timestamp => "TIMESTAMP",
            LogicalType::Varchar => "VARCHAR",
            LogicalType::Varbinary => "VARBINARY",
            LogicalType::Array => "ARRAY",
            LogicalType::Null => "NULL",
        }
    }
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
