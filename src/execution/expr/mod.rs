// Expression translation. Each expression kind compiles to a small
// evaluator object; all dispatch, type promotion, cast selection and
// null-propagation wrapping happen here, once per query, so the compiled
// evaluators run straight-line per row.

mod arithmetic;
mod case_expr;
mod cast_expr;
mod comparison;
mod conjunction;
mod function;
mod values;

use std::sync::Arc;

use crate::error::{DbError, Result};
use crate::execution::context::ExecutionContext;
use crate::execution::row::RowRef;
use crate::plan::binding::{self, AttributeInfo};
use crate::plan::Expression;
use crate::types::{LogicalType, Value};

/// A compiled scalar evaluator.
pub trait CompiledExpression: Send + Sync {
    fn eval(&self, ctx: &ExecutionContext<'_>, row: &RowRef<'_>) -> Result<Value>;
}

pub type ExprRef = Arc<dyn CompiledExpression>;

/// Everything a translator needs to resolve names and types.
pub struct TranslationScope<'a> {
    inputs: Vec<&'a [AttributeInfo]>,
    param_types: &'a [LogicalType],
    /// Output attributes of the enclosing aggregation's terms, for
    /// aggregate references.
    agg_output: Option<&'a [AttributeInfo]>,
}

impl<'a> TranslationScope<'a> {
    pub fn new(inputs: Vec<&'a [AttributeInfo]>, param_types: &'a [LogicalType]) -> Self {
        Self { inputs, param_types, agg_output: None }
    }

    pub fn with_aggregates(
        inputs: Vec<&'a [AttributeInfo]>,
        param_types: &'a [LogicalType],
        agg_output: &'a [AttributeInfo],
    ) -> Self {
        Self { inputs, param_types, agg_output: Some(agg_output) }
    }

    pub fn resolve_column(&self, tuple_idx: usize, column_idx: usize) -> Result<&AttributeInfo> {
        self.inputs
            .get(tuple_idx)
            .and_then(|schema| schema.get(column_idx))
            .ok_or_else(|| {
                DbError::Internal(format!("unbound column reference ({tuple_idx}, {column_idx})"))
            })
    }

    /// Compile-time type of a subexpression.
    pub fn infer(&self, expr: &Expression) -> Result<(LogicalType, bool)> {
        let agg_types: Option<Vec<LogicalType>> =
            self.agg_output.map(|attrs| attrs.iter().map(|a| a.ty).collect());
        binding::infer_expr(expr, &self.inputs, self.param_types, agg_types.as_deref())
    }
}

/// Translate an expression tree into its compiled form.
pub fn translate(expr: &Expression, scope: &TranslationScope<'_>) -> Result<ExprRef> {
    match expr {
        Expression::Constant(v) => Ok(values::constant(v.clone())),
        Expression::ColumnRef { tuple_idx, column_idx } => {
            let attr = scope.resolve_column(*tuple_idx, *column_idx)?;
            Ok(values::column_ref(attr.id))
        }
        Expression::Parameter { index } => {
            let ty = scope.param_types.get(*index).copied().ok_or_else(|| {
                DbError::ParameterType(format!("parameter ${index} has no declared type"))
            })?;
            Ok(values::parameter(*index, ty))
        }
        Expression::AggregateRef { term_idx } => {
            let attrs = scope.agg_output.ok_or_else(|| {
                DbError::Compile("aggregate reference outside an aggregation".into())
            })?;
            let attr = attrs.get(*term_idx).ok_or_else(|| {
                DbError::Compile(format!("aggregate term {term_idx} out of range"))
            })?;
            Ok(values::column_ref(attr.id))
        }
        Expression::Arithmetic { op, left, right } => {
            let l = translate(left, scope)?;
            let r = translate(right, scope)?;
            Ok(arithmetic::binary(*op, l, r))
        }
        Expression::Negate(child) => Ok(arithmetic::negation(translate(child, scope)?)),
        Expression::Compare { op, left, right } => {
            let l = translate(left, scope)?;
            let r = translate(right, scope)?;
            Ok(comparison::compare(*op, l, r))
        }
        Expression::Like { input, pattern } => {
            let i = translate(input, scope)?;
            comparison::like(i, pattern, scope)
        }
        Expression::InList { needle, list } => {
            let n = translate(needle, scope)?;
            let items = list.iter().map(|e| translate(e, scope)).collect::<Result<Vec<_>>>()?;
            Ok(comparison::in_list(n, items))
        }
        Expression::Logical { op, left, right } => {
            let l = translate(left, scope)?;
            let r = translate(right, scope)?;
            Ok(conjunction::logical(*op, l, r))
        }
        Expression::Not(child) => Ok(conjunction::not(translate(child, scope)?)),
        Expression::Cast { child, to } => Ok(cast_expr::cast(translate(child, scope)?, *to)),
        Expression::Case { clauses, default } => {
            let (result_ty, _) = scope.infer(expr)?;
            let compiled_clauses = clauses
                .iter()
                .map(|c| Ok((translate(&c.when, scope)?, translate(&c.then, scope)?)))
                .collect::<Result<Vec<_>>>()?;
            let compiled_default = match default {
                Some(d) => Some(translate(d, scope)?),
                None => None,
            };
            Ok(case_expr::case(compiled_clauses, compiled_default, result_ty))
        }
        Expression::FunctionCall { function, args } => {
            let (output_ty, _) = scope.infer(expr)?;
            let compiled = args.iter().map(|a| translate(a, scope)).collect::<Result<Vec<_>>>()?;
            Ok(function::call(*function, compiled, output_ty))
        }
    }
}

/// Evaluate a compiled predicate for one row; NULL counts as not-matching.
pub fn matches(pred: &ExprRef, ctx: &ExecutionContext<'_>, row: &RowRef<'_>) -> Result<bool> {
    Ok(pred.eval(ctx, row)?.as_bool().unwrap_or(false))
}
