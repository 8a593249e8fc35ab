// Immutable physical plan trees. A plan is constructed once, may be shared
// by concurrent executions, and is compared structurally for query-cache
// lookups. The comparator and hash live in plan::comparator and stay in
// lockstep with the fields declared here.

pub mod binding;
pub mod comparator;
pub mod expression;

pub use binding::{AttrId, AttributeInfo, BoundPlan};
pub use expression::{BuiltinFunction, CaseClause, Expression, LogicalOp};

use std::hash::{Hash, Hasher};

use crate::catalog::Oid;
use crate::types::{CmpOp, LogicalType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AggregateStrategy {
    /// Grouped aggregation through a hash table.
    Hash,
    /// Single-group (global) aggregation.
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AggregateKind {
    CountStar,
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

#[derive(Debug, Clone)]
pub struct AggregateTerm {
    pub kind: AggregateKind,
    /// Argument expression; None only for COUNT(*).
    pub input: Option<Expression>,
    pub distinct: bool,
}

#[derive(Debug, Clone)]
pub struct SeqScanPlan {
    pub table_oid: Oid,
    pub predicate: Option<Expression>,
    pub column_ids: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct IndexScanPlan {
    pub table_oid: Oid,
    pub index_oid: Oid,
    pub column_ids: Vec<usize>,
    /// Equality bindings for a prefix of the index key columns.
    pub eq_keys: Vec<Expression>,
    /// Optional bound on the key column after the equality prefix.
    pub low: Option<(CmpOp, Expression)>,
    pub high: Option<(CmpOp, Expression)>,
    /// Residual predicate evaluated after index qualification.
    pub predicate: Option<Expression>,
}

#[derive(Debug, Clone)]
pub struct ProjectionPlan {
    pub child: Box<PlanNode>,
    /// dest column <- computed expression
    pub target_list: Vec<(usize, Expression)>,
    /// dest column <- (child tuple index, child column)
    pub direct_map_list: Vec<(usize, (usize, usize))>,
}

#[derive(Debug, Clone)]
pub struct LimitPlan {
    pub child: Box<PlanNode>,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone)]
pub struct OrderByPlan {
    pub child: Box<PlanNode>,
    /// (child output column, descending?)
    pub sort_keys: Vec<(usize, bool)>,
}

#[derive(Debug, Clone)]
pub struct AggregatePlan {
    pub child: Box<PlanNode>,
    pub strategy: AggregateStrategy,
    /// Child output columns forming the group key; empty for global.
    pub group_by: Vec<usize>,
    pub terms: Vec<AggregateTerm>,
    /// HAVING predicate over this node's output schema.
    pub having: Option<Expression>,
}

#[derive(Debug, Clone)]
pub struct HashPlan {
    pub child: Box<PlanNode>,
    pub keys: Vec<Expression>,
}

#[derive(Debug, Clone)]
pub struct HashJoinPlan {
    pub left: Box<PlanNode>,
    /// Build side; by convention a Hash plan.
    pub right: Box<PlanNode>,
    pub join_type: JoinType,
    pub left_keys: Vec<Expression>,
    pub right_keys: Vec<Expression>,
    /// Residual predicate evaluated on each candidate match.
    pub predicate: Option<Expression>,
    /// Output projection: (tuple index, that side's output column).
    pub output: Vec<(usize, usize)>,
}

#[derive(Debug, Clone)]
pub struct NestedLoopJoinPlan {
    pub left: Box<PlanNode>,
    pub right: Box<PlanNode>,
    pub join_type: JoinType,
    pub predicate: Option<Expression>,
    pub output: Vec<(usize, usize)>,
}

#[derive(Debug, Clone)]
pub struct InsertPlan {
    pub table_oid: Oid,
    /// Literal VALUES rows; mutually exclusive with `child`.
    pub tuples: Vec<Vec<Expression>>,
    pub child: Option<Box<PlanNode>>,
}

#[derive(Debug, Clone)]
pub struct UpdatePlan {
    pub table_oid: Oid,
    /// Child must produce every table column, in table order.
    pub child: Box<PlanNode>,
    /// table column <- new value expression (over the child's output)
    pub target_list: Vec<(usize, Expression)>,
}

#[derive(Debug, Clone)]
pub struct DeletePlan {
    pub table_oid: Oid,
    pub child: Box<PlanNode>,
}

#[derive(Debug, Clone)]
pub struct CsvScanPlan {
    pub path: String,
    pub column_types: Vec<LogicalType>,
    pub delimiter: char,
    pub quote: char,
    pub escape: char,
}

#[derive(Debug, Clone)]
pub struct ExportExternalFilePlan {
    pub child: Box<PlanNode>,
    pub path: String,
    pub delimiter: char,
    pub quote: char,
    pub escape: char,
}

#[derive(Debug, Clone)]
pub enum PlanNode {
    SeqScan(SeqScanPlan),
    IndexScan(IndexScanPlan),
    Projection(ProjectionPlan),
    Limit(LimitPlan),
    OrderBy(OrderByPlan),
    Aggregate(AggregatePlan),
    Hash(HashPlan),
    HashJoin(HashJoinPlan),
    NestedLoopJoin(NestedLoopJoinPlan),
    Insert(InsertPlan),
    Update(UpdatePlan),
    Delete(DeletePlan),
    CsvScan(CsvScanPlan),
    ExportExternalFile(ExportExternalFilePlan),
}

impl PlanNode {
    pub fn kind_tag(&self) -> u8 {
        match self {
            PlanNode::SeqScan(_) => 0,
            PlanNode::IndexScan(_) => 1,
            PlanNode::Projection(_) => 2,
            PlanNode::Limit(_) => 3,
            PlanNode::OrderBy(_) => 4,
            PlanNode::Aggregate(_) => 5,
            PlanNode::Hash(_) => 6,
            PlanNode::HashJoin(_) => 7,
            PlanNode::NestedLoopJoin(_) => 8,
            PlanNode::Insert(_) => 9,
            PlanNode::Update(_) => 10,
            PlanNode::Delete(_) => 11,
            PlanNode::CsvScan(_) => 12,
            PlanNode::ExportExternalFile(_) => 13,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            PlanNode::SeqScan(_) => "SeqScan",
            PlanNode::IndexScan(_) => "IndexScan",
            PlanNode::Projection(_) => "Projection",
            PlanNode::Limit(_) => "Limit",
            PlanNode::OrderBy(_) => "OrderBy",
            PlanNode::Aggregate(_) => "Aggregate",
            PlanNode::Hash(_) => "Hash",
            PlanNode::HashJoin(_) => "HashJoin",
            PlanNode::NestedLoopJoin(_) => "NestedLoopJoin",
            PlanNode::Insert(_) => "Insert",
            PlanNode::Update(_) => "Update",
            PlanNode::Delete(_) => "Delete",
            PlanNode::CsvScan(_) => "CsvScan",
            PlanNode::ExportExternalFile(_) => "ExportExternalFile",
        }
    }

    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::SeqScan(_) | PlanNode::IndexScan(_) | PlanNode::CsvScan(_) => Vec::new(),
            PlanNode::Projection(p) => vec![&p.child],
            PlanNode::Limit(p) => vec![&p.child],
            PlanNode::OrderBy(p) => vec![&p.child],
            PlanNode::Aggregate(p) => vec![&p.child],
            PlanNode::Hash(p) => vec![&p.child],
            PlanNode::HashJoin(p) => vec![&p.left, &p.right],
            PlanNode::NestedLoopJoin(p) => vec![&p.left, &p.right],
            PlanNode::Insert(p) => p.child.as_deref().into_iter().collect(),
            PlanNode::Update(p) => vec![&p.child],
            PlanNode::Delete(p) => vec![&p.child],
            PlanNode::ExportExternalFile(p) => vec![&p.child],
        }
    }

    /// Every table OID the plan references, for cache invalidation.
    pub fn referenced_tables(&self) -> Vec<Oid> {
        let mut out = Vec::new();
        self.collect_tables(&mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn collect_tables(&self, out: &mut Vec<Oid>) {
        match self {
            PlanNode::SeqScan(p) => out.push(p.table_oid),
            PlanNode::IndexScan(p) => out.push(p.table_oid),
            PlanNode::Insert(p) => out.push(p.table_oid),
            PlanNode::Update(p) => out.push(p.table_oid),
            PlanNode::Delete(p) => out.push(p.table_oid),
            _ => {}
        }
        for child in self.children() {
            child.collect_tables(out);
        }
    }

    pub fn structural_hash(&self) -> u64 {
        comparator::hash_plan(self)
    }
}

impl PartialEq for PlanNode {
    fn eq(&self, other: &Self) -> bool {
        comparator::compare(self, other) == std::cmp::Ordering::Equal
    }
}

impl Eq for PlanNode {}

impl Hash for PlanNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.structural_hash());
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        comparator::compare_expr(self, other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Expression {}
