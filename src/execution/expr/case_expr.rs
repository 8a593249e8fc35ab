// CASE WHEN chains. Clauses evaluate in order; a NULL WHEN counts as
// not-taken. Every branch result is cast to the common result type chosen
// at compile time so downstream columns stay uniformly typed.

use std::sync::Arc;

use super::{CompiledExpression, ExprRef};
use crate::error::Result;
use crate::execution::context::ExecutionContext;
use crate::execution::row::RowRef;
use crate::types::{cast, LogicalType, Value};

struct CaseExpr {
    clauses: Vec<(ExprRef, ExprRef)>,
    default: Option<ExprRef>,
    result_ty: LogicalType,
}

impl CompiledExpression for CaseExpr {
    fn eval(&self, ctx: &ExecutionContext<'_>, row: &RowRef<'_>) -> Result<Value> {
        for (when, then) in &self.clauses {
            if when.eval(ctx, row)?.as_bool() == Some(true) {
                return cast::cast(&then.eval(ctx, row)?, self.result_ty);
            }
        }
        match &self.default {
            Some(d) => cast::cast(&d.eval(ctx, row)?, self.result_ty),
            None => Ok(Value::null(self.result_ty)),
        }
    }
}

pub fn case(
    clauses: Vec<(ExprRef, ExprRef)>,
    default: Option<ExprRef>,
    result_ty: LogicalType,
) -> ExprRef {
    Arc::new(CaseExpr { clauses, default, result_ty })
}
