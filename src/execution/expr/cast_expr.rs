// Explicit CAST. The viable source/target pairs were checked at bind time;
// value-dependent failures (out of range, unparseable text) surface here.

use std::sync::Arc;

use super::{CompiledExpression, ExprRef};
use crate::error::Result;
use crate::execution::context::ExecutionContext;
use crate::execution::row::RowRef;
use crate::types::{cast as cast_table, LogicalType, Value};

struct CastExpr {
    input: ExprRef,
    to: LogicalType,
}

impl CompiledExpression for CastExpr {
    fn eval(&self, ctx: &ExecutionContext<'_>, row: &RowRef<'_>) -> Result<Value> {
        let v = self.input.eval(ctx, row)?;
        cast_table::cast(&v, self.to)
    }
}

pub fn cast(input: ExprRef, to: LogicalType) -> ExprRef {
    Arc::new(CastExpr { input, to })
}
