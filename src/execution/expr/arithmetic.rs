// Arithmetic and unary minus. NULL propagation and divide-by-zero
// detection live in types::arithmetic; the evaluators just wire operands.

use std::sync::Arc;

use super::{CompiledExpression, ExprRef};
use crate::error::Result;
use crate::execution::context::ExecutionContext;
use crate::execution::row::RowRef;
use crate::types::{arithmetic, ArithOp, Value};

struct ArithmeticExpr {
    op: ArithOp,
    left: ExprRef,
    right: ExprRef,
}

impl CompiledExpression for ArithmeticExpr {
    fn eval(&self, ctx: &ExecutionContext<'_>, row: &RowRef<'_>) -> Result<Value> {
        let l = self.left.eval(ctx, row)?;
        let r = self.right.eval(ctx, row)?;
        arithmetic::evaluate(self.op, &l, &r)
    }
}

pub fn binary(op: ArithOp, left: ExprRef, right: ExprRef) -> ExprRef {
    Arc::new(ArithmeticExpr { op, left, right })
}

struct NegationExpr {
    input: ExprRef,
}

impl CompiledExpression for NegationExpr {
    fn eval(&self, ctx: &ExecutionContext<'_>, row: &RowRef<'_>) -> Result<Value> {
        let v = self.input.eval(ctx, row)?;
        arithmetic::negate(&v)
    }
}

pub fn negation(input: ExprRef) -> ExprRef {
    Arc::new(NegationExpr { input })
}
