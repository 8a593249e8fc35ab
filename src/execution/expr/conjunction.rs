// AND / OR / NOT under three-valued logic, with left-to-right short
// circuiting: NULL AND false is false, NULL OR true is true.

use std::sync::Arc;

use super::{CompiledExpression, ExprRef};
use crate::error::Result;
use crate::execution::context::ExecutionContext;
use crate::execution::row::RowRef;
use crate::plan::LogicalOp;
use crate::types::{LogicalType, Value};

struct ConjunctionExpr {
    op: LogicalOp,
    left: ExprRef,
    right: ExprRef,
}

impl CompiledExpression for ConjunctionExpr {
    fn eval(&self, ctx: &ExecutionContext<'_>, row: &RowRef<'_>) -> Result<Value> {
        let l = self.left.eval(ctx, row)?.as_bool();
        match self.op {
            LogicalOp::And => {
                if l == Some(false) {
                    return Ok(Value::boolean(false));
                }
                let r = self.right.eval(ctx, row)?.as_bool();
                Ok(match (l, r) {
                    (_, Some(false)) => Value::boolean(false),
                    (Some(true), Some(true)) => Value::boolean(true),
                    _ => Value::null(LogicalType::Bool),
                })
            }
            LogicalOp::Or => {
                if l == Some(true) {
                    return Ok(Value::boolean(true));
                }
                let r = self.right.eval(ctx, row)?.as_bool();
                Ok(match (l, r) {
                    (_, Some(true)) => Value::boolean(true),
                    (Some(false), Some(false)) => Value::boolean(false),
                    _ => Value::null(LogicalType::Bool),
                })
            }
        }
    }
}

pub fn logical(op: LogicalOp, left: ExprRef, right: ExprRef) -> ExprRef {
    Arc::new(ConjunctionExpr { op, left, right })
}

struct NotExpr {
    input: ExprRef,
}

impl CompiledExpression for NotExpr {
    fn eval(&self, ctx: &ExecutionContext<'_>, row: &RowRef<'_>) -> Result<Value> {
        Ok(match self.input.eval(ctx, row)?.as_bool() {
            Some(b) => Value::boolean(!b),
            None => Value::null(LogicalType::Bool),
        })
    }
}

pub fn not(input: ExprRef) -> ExprRef {
    Arc::new(NotExpr { input })
}
