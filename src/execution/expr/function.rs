// Built-in scalar functions. NULL in, NULL out for every function.

use std::sync::Arc;

use super::{CompiledExpression, ExprRef};
use crate::error::{DbError, Result};
use crate::execution::context::ExecutionContext;
use crate::execution::row::RowRef;
use crate::plan::BuiltinFunction;
use crate::types::{LogicalType, Value};

struct FunctionExpr {
    function: BuiltinFunction,
    args: Vec<ExprRef>,
    output_ty: LogicalType,
}

impl CompiledExpression for FunctionExpr {
    fn eval(&self, ctx: &ExecutionContext<'_>, row: &RowRef<'_>) -> Result<Value> {
        let mut values = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            let v = arg.eval(ctx, row)?;
            if v.is_null() {
                return Ok(Value::null(self.output_ty));
            }
            values.push(v);
        }
        apply(self.function, &values, self.output_ty)
    }
}

pub fn call(function: BuiltinFunction, args: Vec<ExprRef>, output_ty: LogicalType) -> ExprRef {
    Arc::new(FunctionExpr { function, args, output_ty })
}

fn apply(function: BuiltinFunction, args: &[Value], output_ty: LogicalType) -> Result<Value> {
    use BuiltinFunction::*;
    let text = |v: &Value| {
        v.as_str()
            .map(str::to_owned)
            .ok_or_else(|| DbError::TypeError(format!("{} expects VARCHAR", function.name())))
    };
    let number = |v: &Value| {
        v.as_f64()
            .ok_or_else(|| DbError::TypeError(format!("{} expects a numeric type", function.name())))
    };
    match function {
        Upper => Ok(Value::varchar(text(&args[0])?.to_uppercase())),
        Lower => Ok(Value::varchar(text(&args[0])?.to_lowercase())),
        Trim => Ok(Value::varchar(text(&args[0])?.trim().to_owned())),
        Length => Ok(Value::integer(text(&args[0])?.chars().count() as i32)),
        Substr => {
            let s = text(&args[0])?;
            let start = args[1]
                .as_i64()
                .ok_or_else(|| DbError::TypeError("substr start must be integral".into()))?;
            let len = args[2]
                .as_i64()
                .ok_or_else(|| DbError::TypeError("substr length must be integral".into()))?;
            if len < 0 {
                return Err(DbError::InvalidArgument("substr length is negative".into()));
            }
            // 1-based start, clamped into the string.
            let skip = (start.max(1) - 1) as usize;
            let out: String = s.chars().skip(skip).take(len as usize).collect();
            Ok(Value::varchar(out))
        }
        Abs => match args[0].ty() {
            LogicalType::Decimal => Ok(Value::decimal(number(&args[0])?.abs())),
            ty if ty.is_integral() => {
                let v = args[0]
                    .as_i64()
                    .ok_or_else(|| DbError::Internal("integral payload expected".into()))?;
                let flipped = v
                    .checked_abs()
                    .ok_or_else(|| DbError::Arithmetic(format!("integer overflow in abs({v})")))?;
                Value::integral(ty, flipped)
            }
            ty => Err(DbError::TypeError(format!("abs over non-numeric type {ty}"))),
        },
        Floor => Ok(Value::decimal(number(&args[0])?.floor())),
        Ceil => Ok(Value::decimal(number(&args[0])?.ceil())),
        Round => Ok(Value::decimal(number(&args[0])?.round())),
        Sqrt => {
            let v = number(&args[0])?;
            if v < 0.0 {
                return Err(DbError::Arithmetic(format!("sqrt of negative value {v}")));
            }
            Ok(Value::decimal(v.sqrt()))
        }
    }
}
