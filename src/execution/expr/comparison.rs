// Comparisons, LIKE, and IN. Comparisons of NULL with anything yield the
// three-valued NULL. LIKE patterns that are literal constants compile to a
// regex once, here; non-literal patterns compile per evaluation.

use std::sync::Arc;

use regex::Regex;

use super::{translate, CompiledExpression, ExprRef, TranslationScope};
use crate::error::{DbError, Result};
use crate::execution::context::ExecutionContext;
use crate::execution::row::RowRef;
use crate::plan::Expression;
use crate::types::{compare, CmpOp, LogicalType, Value};

struct ComparisonExpr {
    op: CmpOp,
    left: ExprRef,
    right: ExprRef,
}

impl CompiledExpression for ComparisonExpr {
    fn eval(&self, ctx: &ExecutionContext<'_>, row: &RowRef<'_>) -> Result<Value> {
        let l = self.left.eval(ctx, row)?;
        let r = self.right.eval(ctx, row)?;
        compare::compare(self.op, &l, &r)
    }
}

pub fn compare(op: CmpOp, left: ExprRef, right: ExprRef) -> ExprRef {
    Arc::new(ComparisonExpr { op, left, right })
}

enum LikePattern {
    Static(Regex),
    Dynamic(ExprRef),
}

struct LikeExpr {
    input: ExprRef,
    pattern: LikePattern,
}

impl CompiledExpression for LikeExpr {
    fn eval(&self, ctx: &ExecutionContext<'_>, row: &RowRef<'_>) -> Result<Value> {
        let input = self.input.eval(ctx, row)?;
        if input.is_null() {
            return Ok(Value::null(LogicalType::Bool));
        }
        let text = input
            .as_str()
            .ok_or_else(|| DbError::TypeError(format!("LIKE input has type {}", input.ty())))?;
        let matched = match &self.pattern {
            LikePattern::Static(re) => re.is_match(text),
            LikePattern::Dynamic(expr) => {
                let pattern = expr.eval(ctx, row)?;
                if pattern.is_null() {
                    return Ok(Value::null(LogicalType::Bool));
                }
                let pattern = pattern.as_str().ok_or_else(|| {
                    DbError::TypeError(format!("LIKE pattern has type {}", pattern.ty()))
                })?;
                compile_like_pattern(pattern)?.is_match(text)
            }
        };
        Ok(Value::boolean(matched))
    }
}

pub fn like(input: ExprRef, pattern: &Expression, scope: &TranslationScope<'_>) -> Result<ExprRef> {
    let compiled_pattern = match pattern {
        Expression::Constant(v) if !v.is_null() => {
            let text = v
                .as_str()
                .ok_or_else(|| DbError::TypeError(format!("LIKE pattern has type {}", v.ty())))?;
            LikePattern::Static(compile_like_pattern(text)?)
        }
        _ => LikePattern::Dynamic(translate(pattern, scope)?),
    };
    Ok(Arc::new(LikeExpr { input, pattern: compiled_pattern }))
}

/// Translate a SQL LIKE pattern into an anchored regex. `%` matches any
/// run of characters (including newlines), `_` exactly one.
fn compile_like_pattern(pattern: &str) -> Result<Regex> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push_str("(?s)^");
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| DbError::Compile(format!("invalid LIKE pattern '{pattern}': {e}")))
}

struct InListExpr {
    needle: ExprRef,
    items: Vec<ExprRef>,
}

impl CompiledExpression for InListExpr {
    fn eval(&self, ctx: &ExecutionContext<'_>, row: &RowRef<'_>) -> Result<Value> {
        let needle = self.needle.eval(ctx, row)?;
        if needle.is_null() {
            return Ok(Value::null(LogicalType::Bool));
        }
        let mut saw_null = false;
        for item in &self.items {
            let v = item.eval(ctx, row)?;
            let eq = compare::compare(CmpOp::Eq, &needle, &v)?;
            match eq.as_bool() {
                Some(true) => return Ok(Value::boolean(true)),
                Some(false) => {}
                None => saw_null = true,
            }
        }
        if saw_null {
            Ok(Value::null(LogicalType::Bool))
        } else {
            Ok(Value::boolean(false))
        }
    }
}

pub fn in_list(needle: ExprRef, items: Vec<ExprRef>) -> ExprRef {
    Arc::new(InListExpr { needle, items })
}
