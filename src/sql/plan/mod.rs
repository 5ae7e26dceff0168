use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    sql::{
        executor::{Executor, ResultSet},
        parser::ast::{self, AggregateFunc, OrderDirection, Predicate, WhereClause},
        schema::{Column, Database, Row},
        types::Value,
    },
};

pub mod planner;

pub use planner::Planner;

/// Operator tree produced by the planner and consumed by the executors.
///
/// SELECT always lowers to the same fixed chain:
/// scan → join → filter → sort → aggregate → group → having → offset/limit.
#[derive(Debug, PartialEq)]
pub enum Node {
    CreateTable {
        name: String,
        if_not_exists: bool,
        columns: Vec<Column>,
        /// (column, referenced table, referenced column), resolved at execution
        references: Vec<(String, String, String)>,
    },
    AlterTable {
        table_name: String,
        column: Column,
        reference: Option<(String, String)>,
    },
    DropTable {
        table_name: String,
        if_exists: bool,
    },
    Insert {
        table_name: String,
        columns: Option<Vec<String>>,
        values: Vec<Vec<Value>>,
    },
    Update {
        table_name: String,
        columns: BTreeMap<String, Value>,
        filter: Option<(String, Value)>,
    },
    Delete {
        table_name: String,
        filter: Option<(String, Value)>,
    },
    /// Literal rows, used by FROM-less SELECT of system functions
    Values {
        columns: Vec<String>,
        rows: Vec<Row>,
    },
    Scan {
        table_name: String,
    },
    NestedLoopJoin {
        source: Box<Node>,
        left_table: String,
        join: ast::Join,
    },
    Filter {
        source: Box<Node>,
        condition: WhereClause,
    },
    Order {
        source: Box<Node>,
        order_by: Vec<(String, OrderDirection)>,
    },
    Aggregate {
        source: Box<Node>,
        /// (function, column or None for `*`, output label)
        exprs: Vec<(AggregateFunc, Option<String>, String)>,
    },
    Group {
        source: Box<Node>,
        column: String,
    },
    Having {
        source: Box<Node>,
        predicate: Predicate,
    },
    Offset {
        source: Box<Node>,
        offset: usize,
    },
    Limit {
        source: Box<Node>,
        limit: usize,
    },
}

/// Executable plan for one table-level statement
#[derive(Debug, PartialEq)]
pub struct Plan(pub Node);

impl Plan {
    pub fn build(stmt: ast::Statement, planner: &Planner) -> Result<Self> {
        Ok(Plan(planner.build_statement(stmt)?))
    }

    pub fn execute(self, db: &mut Database) -> Result<ResultSet> {
        <dyn Executor>::build(self.0).execute(db)
    }
}

/// Diagnostic description of the operators a SELECT went through.
///
/// Attached to query results for observability only; nothing reads it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlanNode {
    #[serde(rename = "type")]
    pub kind: PlanKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    pub cost: f64,
    pub details: String,
    #[serde(default)]
    pub children: Vec<ExecutionPlanNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanKind {
    Scan,
    Join,
    Filter,
    Sort,
    Aggregate,
    Group,
    Having,
    Offset,
    Limit,
}

impl ExecutionPlanNode {
    /// Leaf node for a full table scan
    pub fn scan(table_name: &str, rows: usize) -> Self {
        Self {
            kind: PlanKind::Scan,
            table_name: Some(table_name.to_string()),
            cost: rows as f64 * 0.1,
            details: format!("Full Table Scan on {}", table_name),
            children: Vec::new(),
        }
    }

    /// Makes a new root with `self` as its only child
    pub fn wrap(self, kind: PlanKind, details: String, cost: f64) -> Self {
        Self {
            kind,
            table_name: None,
            cost,
            details,
            children: vec![self],
        }
    }

    /// Number of nodes in the tree
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }
}
