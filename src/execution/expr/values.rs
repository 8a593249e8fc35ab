// Leaf evaluators: constants, column references, parameters.

use std::sync::Arc;

use super::{CompiledExpression, ExprRef};
use crate::error::{DbError, Result};
use crate::execution::context::ExecutionContext;
use crate::execution::row::RowRef;
use crate::plan::AttrId;
use crate::types::{LogicalType, Value};

struct ConstantExpr {
    value: Value,
}

impl CompiledExpression for ConstantExpr {
    fn eval(&self, _ctx: &ExecutionContext<'_>, _row: &RowRef<'_>) -> Result<Value> {
        Ok(self.value.clone())
    }
}

pub fn constant(value: Value) -> ExprRef {
    Arc::new(ConstantExpr { value })
}

struct ColumnRefExpr {
    attr: AttrId,
}

impl CompiledExpression for ColumnRefExpr {
    fn eval(&self, _ctx: &ExecutionContext<'_>, row: &RowRef<'_>) -> Result<Value> {
        row.derive_value(self.attr)
    }
}

pub fn column_ref(attr: AttrId) -> ExprRef {
    Arc::new(ColumnRefExpr { attr })
}

struct ParameterExpr {
    index: usize,
    ty: LogicalType,
}

impl CompiledExpression for ParameterExpr {
    fn eval(&self, ctx: &ExecutionContext<'_>, _row: &RowRef<'_>) -> Result<Value> {
        let value = ctx.params.get(self.index).ok_or_else(|| {
            DbError::ParameterType(format!(
                "parameter ${} missing ({} provided)",
                self.index,
                ctx.params.len()
            ))
        })?;
        if !value.is_null() && value.ty() != self.ty {
            return Err(DbError::ParameterType(format!(
                "parameter ${} has type {}, expected {}",
                self.index,
                value.ty(),
                self.ty
            )));
        }
        Ok(value.clone())
    }
}

pub fn parameter(index: usize, ty: LogicalType) -> ExprRef {
    Arc::new(ParameterExpr { index, ty })
}
