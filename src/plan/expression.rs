use serde::{Deserialize, Serialize};

use crate::types::{ArithOp, CmpOp, LogicalType, Value};

/// Scalar functions callable from expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuiltinFunction {
    Upper,
    Lower,
    Length,
    Substr,
    Trim,
    Abs,
    Floor,
    Ceil,
    Round,
    Sqrt,
}

impl BuiltinFunction {
    pub fn name(self) -> &'static str {
        match self {
            BuiltinFunction::Upper => "upper",
            BuiltinFunction::Lower => "lower",
            BuiltinFunction::Length => "length",
            BuiltinFunction::Substr => "substr",
            BuiltinFunction::Trim => "trim",
            BuiltinFunction::Abs => "abs",
            BuiltinFunction::Floor => "floor",
            BuiltinFunction::Ceil => "ceil",
            BuiltinFunction::Round => "round",
            BuiltinFunction::Sqrt => "sqrt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone)]
pub struct CaseClause {
    pub when: Expression,
    pub then: Expression,
}

/// Immutable expression tree. Column references are positional until
/// binding resolves them against an operator's input schema.
#[derive(Debug, Clone)]
pub enum Expression {
    Constant(Value),
    ColumnRef {
        /// Which child of the enclosing operator the column comes from.
        tuple_idx: usize,
        column_idx: usize,
    },
    Arithmetic {
        op: ArithOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Compare {
        op: CmpOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Like {
        input: Box<Expression>,
        pattern: Box<Expression>,
    },
    InList {
        needle: Box<Expression>,
        list: Vec<Expression>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Not(Box<Expression>),
    Negate(Box<Expression>),
    Cast {
        child: Box<Expression>,
        to: LogicalType,
    },
    Case {
        clauses: Vec<CaseClause>,
        default: Option<Box<Expression>>,
    },
    Parameter {
        index: usize,
    },
    /// Reference to the finalized cell of the i-th aggregate term of the
    /// enclosing aggregation.
    AggregateRef {
        term_idx: usize,
    },
    FunctionCall {
        function: BuiltinFunction,
        args: Vec<Expression>,
    },
}

impl Expression {
    pub fn column(tuple_idx: usize, column_idx: usize) -> Self {
        Expression::ColumnRef { tuple_idx, column_idx }
    }

    pub fn constant(v: Value) -> Self {
        Expression::Constant(v)
    }

    pub fn compare(op: CmpOp, left: Expression, right: Expression) -> Self {
        Expression::Compare { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn arithmetic(op: ArithOp, left: Expression, right: Expression) -> Self {
        Expression::Arithmetic { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::Logical { op: LogicalOp::And, left: Box::new(left), right: Box::new(right) }
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::Logical { op: LogicalOp::Or, left: Box::new(left), right: Box::new(right) }
    }

    /// Integer tag used to order expressions of different kinds.
    pub fn kind_tag(&self) -> u8 {
        match self {
            Expression::Constant(_) => 0,
            Expression::ColumnRef { .. } => 1,
            Expression::Arithmetic { .. } => 2,
            Expression::Compare { .. } => 3,
            Expression::Like { .. } => 4,
            Expression::InList { .. } => 5,
            Expression::Logical { .. } => 6,
            Expression::Not(_) => 7,
            Expression::Negate(_) => 8,
            Expression::Cast { .. } => 9,
            Expression::Case { .. } => 10,
            Expression::Parameter { .. } => 11,
            Expression::AggregateRef { .. } => 12,
            Expression::FunctionCall { .. } => 13,
        }
    }

    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Constant(_)
            | Expression::ColumnRef { .. }
            | Expression::Parameter { .. }
            | Expression::AggregateRef { .. } => Vec::new(),
            Expression::Arithmetic { left, right, .. }
            | Expression::Compare { left, right, .. }
            | Expression::Logical { left, right, .. } => vec![left, right],
            Expression::Like { input, pattern } => vec![input, pattern],
            Expression::InList { needle, list } => {
                let mut out = vec![needle.as_ref()];
                out.extend(list.iter());
                out
            }
            Expression::Not(c) | Expression::Negate(c) => vec![c],
            Expression::Cast { child, .. } => vec![child],
            Expression::Case { clauses, default } => {
                let mut out = Vec::with_capacity(clauses.len() * 2 + 1);
                for c in clauses {
                    out.push(&c.when);
                    out.push(&c.then);
                }
                if let Some(d) = default {
                    out.push(d);
                }
                out
            }
            Expression::FunctionCall { args, .. } => args.iter().collect(),
        }
    }
}
