//! Relational algebra in the JSON shape produced by Calcite's `RelJsonWriter`:
//! a flat list of nodes under `"rels"`, each consuming the node before it.
//!
//! ```json
//! {"rels": [
//!   {"relOp": "LogicalTableScan", "table": ["mapd", "public", "emp"], "fieldNames": ["empno", "deptno"]},
//!   {"relOp": "LogicalFilter", "condition": {"op": ">", "operands": [{"input": 1}, 10], "type": {"type": "BOOLEAN", "nullable": false}}},
//!   {"relOp": "LogicalProject", "fields": ["empno"], "exprs": [{"input": 0}]}
//! ]}
//! ```

mod convert;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppResult;
use crate::types::RelDataType;

pub use convert::to_rel;

/// A row expression over the fields of the input node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RexNode {
    Input { input: usize },
    Literal {
        literal: Value,
        #[serde(rename = "type")]
        ty: RelDataType,
    },
    Call {
        op: String,
        operands: Vec<RexNode>,
        #[serde(rename = "type")]
        ty: RelDataType,
    },
    /// Bare integer literal, as older writers emit them.
    Int(i64),
}

impl RexNode {
    pub fn input(i: usize) -> Self { RexNode::Input { input: i } }

    pub fn call(op: &str, operands: Vec<RexNode>, ty: RelDataType) -> Self {
        RexNode::Call { op: op.to_string(), operands, ty }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggCall {
    pub agg: String,
    #[serde(rename = "type")]
    pub ty: RelDataType,
    #[serde(default)]
    pub distinct: bool,
    /// Indices into the input node's fields.
    #[serde(default)]
    pub operands: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NullDirection {
    First,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collation {
    pub field: usize,
    pub direction: Direction,
    pub nulls: NullDirection,
}

impl Collation {
    /// NULLs sort high: last when ascending, first when descending.
    pub fn new(field: usize, asc: bool) -> Self {
        if asc {
            Self { field, direction: Direction::Ascending, nulls: NullDirection::Last }
        } else {
            Self { field, direction: Direction::Descending, nulls: NullDirection::First }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "relOp")]
pub enum RelNode {
    LogicalTableScan {
        table: Vec<String>,
        #[serde(rename = "fieldNames")]
        field_names: Vec<String>,
    },
    LogicalFilter { condition: RexNode },
    LogicalProject { fields: Vec<String>, exprs: Vec<RexNode> },
    LogicalAggregate {
        group: Vec<usize>,
        #[serde(default)]
        aggs: Vec<AggCall>,
    },
    LogicalSort {
        #[serde(default)]
        collation: Vec<Collation>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fetch: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset: Option<u64>,
    },
}

impl RelNode {
    pub fn rel_op(&self) -> &'static str {
        match self {
            RelNode::LogicalTableScan { .. } => "LogicalTableScan",
            RelNode::LogicalFilter { .. } => "LogicalFilter",
            RelNode::LogicalProject { .. } => "LogicalProject",
            RelNode::LogicalAggregate { .. } => "LogicalAggregate",
            RelNode::LogicalSort { .. } => "LogicalSort",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RelPlan {
    pub rels: Vec<RelNode>,
}

impl RelPlan {
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// First node with the given `relOp`.
    pub fn find(&self, rel_op: &str) -> Option<&RelNode> {
        self.rels.iter().find(|r| r.rel_op() == rel_op)
    }
}

#[cfg(test)]
mod tests;
