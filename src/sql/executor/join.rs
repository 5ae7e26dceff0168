use crate::{
    error::Result,
    sql::{
        parser::ast::{self, JoinType},
        plan::{ExecutionPlanNode, PlanKind},
        schema::{Database, Row},
        types::Value,
    },
};

use super::{Executor, ResultSet};

/// Nested loop equi-join of the accumulated rows with one more table
pub struct NestedLoopJoin {
    source: Box<dyn Executor>,
    left_table: String,
    join: ast::Join,
}

impl NestedLoopJoin {
    pub fn new(source: Box<dyn Executor>, left_table: String, join: ast::Join) -> Box<Self> {
        Box::new(Self {
            source,
            left_table,
            join,
        })
    }
}

impl Executor for NestedLoopJoin {
    fn execute(self: Box<Self>, db: &mut Database) -> Result<ResultSet> {
        let (lcols, lrows, plan) = self.source.execute(db)?.into_scan()?;

        let table = db.must_get_table(&self.join.table)?;
        let rcols = table.column_names();
        let rrows: Vec<Row> = table.rows.iter().map(|r| table.backfill(r)).collect();

        // ON may name the joined table's column first
        let (left, right) = if !lcols.contains(&self.join.left)
            && lcols.contains(&self.join.right)
            && rcols.contains(&self.join.left)
        {
            (&self.join.right, &self.join.left)
        } else {
            (&self.join.left, &self.join.right)
        };

        let mut columns = lcols.clone();
        for c in &rcols {
            if !columns.contains(c) {
                columns.push(c.clone());
            }
        }

        // Nested loop: for each left row, iterate through all right rows.
        // NULL keys never match; right values win on a column name collision.
        let mut rows = Vec::new();
        for lrow in &lrows {
            let key = lrow.get(left).filter(|v| !v.is_null()).map(Value::to_text);
            let mut matched = false;
            if let Some(key) = &key {
                for rrow in &rrows {
                    let hit = rrow
                        .get(right)
                        .filter(|v| !v.is_null())
                        .is_some_and(|v| v.to_text() == *key);
                    if hit {
                        let mut row = lrow.clone();
                        row.extend(rrow.clone());
                        rows.push(row);
                        matched = true;
                    }
                }
            }

            // For outer joins, fill with NULL if no match found
            if self.join.join_type == JoinType::Left && !matched {
                let mut row = lrow.clone();
                for c in &rcols {
                    row.insert(c.clone(), Value::Null);
                }
                rows.push(row);
            }
        }

        let kind = match self.join.join_type {
            JoinType::Inner => "Inner",
            JoinType::Left => "Left",
        };
        let cost = lrows.len() as f64 * rrows.len() as f64 * 0.05;
        let plan = plan.map(|left_plan| ExecutionPlanNode {
            kind: PlanKind::Join,
            table_name: None,
            cost,
            details: format!(
                "{} Join ({}, {}) on {} = {}",
                kind, self.left_table, self.join.table, left, right
            ),
            children: vec![left_plan, ExecutionPlanNode::scan(&self.join.table, rrows.len())],
        });

        Ok(ResultSet::Scan {
            columns,
            rows,
            plan,
        })
    }
}
