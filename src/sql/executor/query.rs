use std::{cmp::Ordering, collections::HashSet};

use crate::{
    error::Result,
    sql::{
        executor::ResultSet,
        parser::ast::{Connective, Operator, OrderDirection, Predicate, WhereClause},
        plan::{ExecutionPlanNode, PlanKind},
        schema::{Database, Row},
        types::Value,
    },
};

use super::Executor;

/// Literal rows (FROM-less SELECT)
pub struct Values {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Values {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Box<Self> {
        Box::new(Self { columns, rows })
    }
}

impl Executor for Values {
    fn execute(self: Box<Self>, _db: &mut Database) -> Result<ResultSet> {
        Ok(ResultSet::Scan {
            columns: self.columns,
            rows: self.rows,
            plan: None,
        })
    }
}

/// Table scan executor (SELECT)
pub struct Scan {
    table_name: String,
}

impl Scan {
    pub fn new(table_name: String) -> Box<Self> {
        Box::new(Self { table_name })
    }
}

impl Executor for Scan {
    fn execute(self: Box<Self>, db: &mut Database) -> Result<ResultSet> {
        let table = db.must_get_table(&self.table_name)?;
        let rows: Vec<Row> = table.rows.iter().map(|r| table.backfill(r)).collect();
        Ok(ResultSet::Scan {
            columns: table.column_names(),
            plan: Some(ExecutionPlanNode::scan(&table.name, rows.len())),
            rows,
        })
    }
}

/// WHERE executor. Conditions are applied strictly left to right:
/// AND narrows the accumulated rows, OR appends new matches not already present.
pub struct Filter {
    source: Box<dyn Executor>,
    condition: WhereClause,
}

impl Filter {
    pub fn new(source: Box<dyn Executor>, condition: WhereClause) -> Box<Self> {
        Box::new(Self { source, condition })
    }
}

impl Executor for Filter {
    fn execute(self: Box<Self>, db: &mut Database) -> Result<ResultSet> {
        let (columns, rows, plan) = self.source.execute(db)?.into_scan()?;
        let rows = filter_rows(&rows, &self.condition);
        let details = format!("Filter: {}", describe_where(&self.condition));
        let plan = plan.map(|p| p.wrap(PlanKind::Filter, details, rows.len() as f64 * 0.01));
        Ok(ResultSet::Scan {
            columns,
            rows,
            plan,
        })
    }
}

fn filter_rows(rows: &[Row], clause: &WhereClause) -> Vec<Row> {
    let matching = |predicate: &Predicate| -> Vec<usize> {
        (0..rows.len())
            .filter(|&i| matches(predicate, &rows[i]))
            .collect()
    };

    let mut selected = matching(&clause.first);
    for (connective, predicate) in &clause.rest {
        let other = matching(predicate);
        match connective {
            Connective::And => selected.retain(|i| other.contains(i)),
            Connective::Or => {
                for i in other {
                    if !selected.iter().any(|&j| rows[j] == rows[i]) {
                        selected.push(i);
                    }
                }
            }
        }
    }
    selected.into_iter().map(|i| rows[i].clone()).collect()
}

/// Evaluates one atomic condition against a row. A missing or NULL column
/// never matches; `>` and `<` compare numerically only; LIKE is a substring
/// test once `%` wildcards are dropped.
pub fn matches(predicate: &Predicate, row: &Row) -> bool {
    let Some(value) = row.get(&predicate.column).filter(|v| !v.is_null()) else {
        return false;
    };
    let literal = Value::from_consts(predicate.value.clone());
    match predicate.operator {
        Operator::Equal => value.loose_eq(&literal),
        Operator::GreaterThan => match (value.as_number(), literal.as_number()) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        },
        Operator::LessThan => match (value.as_number(), literal.as_number()) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        },
        Operator::Like => {
            let needle = literal.to_text().replace('%', "");
            value.to_text().contains(&needle)
        }
    }
}

fn describe_predicate(predicate: &Predicate) -> String {
    format!(
        "{} {} {}",
        predicate.column, predicate.operator, predicate.value
    )
}

fn describe_where(clause: &WhereClause) -> String {
    let mut text = describe_predicate(&clause.first);
    for (connective, predicate) in &clause.rest {
        let word = match connective {
            Connective::And => "AND",
            Connective::Or => "OR",
        };
        text.push_str(&format!(" {} {}", word, describe_predicate(predicate)));
    }
    text
}

/// ORDER BY executor - sorts rows by specified columns
pub struct Order {
    source: Box<dyn Executor>,
    order_by: Vec<(String, OrderDirection)>,
}

impl Order {
    pub fn new(source: Box<dyn Executor>, order_by: Vec<(String, OrderDirection)>) -> Box<Self> {
        Box::new(Self { source, order_by })
    }
}

impl Executor for Order {
    fn execute(self: Box<Self>, db: &mut Database) -> Result<ResultSet> {
        let (columns, mut rows, plan) = self.source.execute(db)?.into_scan()?;

        // Multi-column stable sort. A missing or NULL key sorts below every
        // value ascending and above every value descending.
        rows.sort_by(|a, b| {
            for (column, direction) in &self.order_by {
                let x = a.get(column).filter(|v| !v.is_null());
                let y = b.get(column).filter(|v| !v.is_null());
                let ordering = match direction {
                    OrderDirection::Asc => compare_keys(x, y, false),
                    OrderDirection::Desc => compare_keys(x, y, true).reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        let details = format!(
            "Sort by {}",
            self.order_by
                .iter()
                .map(|(c, d)| format!("{} {}", c, if *d == OrderDirection::Asc { "ASC" } else { "DESC" }))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let plan = plan.map(|p| p.wrap(PlanKind::Sort, details, rows.len() as f64 * 0.02));
        Ok(ResultSet::Scan {
            columns,
            rows,
            plan,
        })
    }
}

fn compare_keys(x: Option<&Value>, y: Option<&Value>, missing_high: bool) -> Ordering {
    match (x, y) {
        (Some(x), Some(y)) => x.sort_cmp(y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) if missing_high => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) if missing_high => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

/// GROUP BY executor - keeps the first row seen for each distinct key.
/// NULL keys form one group.
pub struct Group {
    source: Box<dyn Executor>,
    column: String,
}

impl Group {
    pub fn new(source: Box<dyn Executor>, column: String) -> Box<Self> {
        Box::new(Self { source, column })
    }
}

impl Executor for Group {
    fn execute(self: Box<Self>, db: &mut Database) -> Result<ResultSet> {
        let (columns, rows, plan) = self.source.execute(db)?.into_scan()?;
        let input = rows.len();
        let mut seen = HashSet::new();
        let rows: Vec<Row> = rows
            .into_iter()
            .filter(|row| {
                let key = row
                    .get(&self.column)
                    .filter(|v| !v.is_null())
                    .map(Value::to_text);
                seen.insert(key)
            })
            .collect();
        let details = format!("Group by {}", self.column);
        let plan = plan.map(|p| p.wrap(PlanKind::Group, details, input as f64 * 0.02));
        Ok(ResultSet::Scan {
            columns,
            rows,
            plan,
        })
    }
}

/// HAVING executor - filters the grouped rows with a single condition
pub struct Having {
    source: Box<dyn Executor>,
    predicate: Predicate,
}

impl Having {
    pub fn new(source: Box<dyn Executor>, predicate: Predicate) -> Box<Self> {
        Box::new(Self { source, predicate })
    }
}

impl Executor for Having {
    fn execute(self: Box<Self>, db: &mut Database) -> Result<ResultSet> {
        let (columns, rows, plan) = self.source.execute(db)?.into_scan()?;
        let rows: Vec<Row> = rows
            .into_iter()
            .filter(|row| matches(&self.predicate, row))
            .collect();
        let details = format!("Having {}", describe_predicate(&self.predicate));
        let plan = plan.map(|p| p.wrap(PlanKind::Having, details, rows.len() as f64 * 0.01));
        Ok(ResultSet::Scan {
            columns,
            rows,
            plan,
        })
    }
}

/// OFFSET executor - skips the first N rows
pub struct Offset {
    source: Box<dyn Executor>,
    offset: usize,
}

impl Offset {
    pub fn new(source: Box<dyn Executor>, offset: usize) -> Box<Self> {
        Box::new(Self { source, offset })
    }
}

impl Executor for Offset {
    fn execute(self: Box<Self>, db: &mut Database) -> Result<ResultSet> {
        let (columns, rows, plan) = self.source.execute(db)?.into_scan()?;
        let rows: Vec<Row> = rows.into_iter().skip(self.offset).collect();
        let details = format!("Offset {}", self.offset);
        let plan = plan.map(|p| p.wrap(PlanKind::Offset, details, 0.01));
        Ok(ResultSet::Scan {
            columns,
            rows,
            plan,
        })
    }
}

/// LIMIT executor - keeps the first N rows
pub struct Limit {
    source: Box<dyn Executor>,
    limit: usize,
}

impl Limit {
    pub fn new(source: Box<dyn Executor>, limit: usize) -> Box<Self> {
        Box::new(Self { source, limit })
    }
}

impl Executor for Limit {
    fn execute(self: Box<Self>, db: &mut Database) -> Result<ResultSet> {
        let (columns, rows, plan) = self.source.execute(db)?.into_scan()?;
        let rows: Vec<Row> = rows.into_iter().take(self.limit).collect();
        let details = format!("Limit {}", self.limit);
        let plan = plan.map(|p| p.wrap(PlanKind::Limit, details, 0.01));
        Ok(ResultSet::Scan {
            columns,
            rows,
            plan,
        })
    }
}
