use crate::{
    error::Result,
    sql::{
        parser::ast::AggregateFunc,
        plan::PlanKind,
        schema::{Database, Row},
        types::Value,
    },
};

use super::{Executor, ResultSet};

/// Aggregate executor - collapses the input into a single row holding one
/// value per aggregate, keyed by its label (alias or `FUNC(col)`).
pub struct Aggregate {
    source: Box<dyn Executor>,
    exprs: Vec<(AggregateFunc, Option<String>, String)>,
}

impl Aggregate {
    pub fn new(
        source: Box<dyn Executor>,
        exprs: Vec<(AggregateFunc, Option<String>, String)>,
    ) -> Box<Self> {
        Box::new(Self { source, exprs })
    }
}

impl Executor for Aggregate {
    fn execute(self: Box<Self>, db: &mut Database) -> Result<ResultSet> {
        let (_, rows, plan) = self.source.execute(db)?.into_scan()?;

        let mut columns = Vec::new();
        let mut row = Row::new();
        for (func, column, label) in &self.exprs {
            let value = <dyn Calculator>::build(*func).calc(column.as_deref(), &rows);
            row.insert(label.clone(), value);
            columns.push(label.clone());
        }

        let details = format!(
            "Aggregate: {}",
            self.exprs
                .iter()
                .map(|(f, c, _)| f.label(c.as_deref()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let plan = plan.map(|p| p.wrap(PlanKind::Aggregate, details, rows.len() as f64 * 0.01));
        Ok(ResultSet::Scan {
            columns,
            rows: vec![row],
            plan,
        })
    }
}

/// Trait for aggregate function calculations. `column` is None for `*`.
pub trait Calculator {
    fn calc(&self, column: Option<&str>, rows: &[Row]) -> Value;
}

impl dyn Calculator {
    pub fn build(func: AggregateFunc) -> Box<dyn Calculator> {
        match func {
            AggregateFunc::Count => Count::new(),
            AggregateFunc::Sum => Sum::new(),
            AggregateFunc::Avg => Avg::new(),
            AggregateFunc::Min => Min::new(),
            AggregateFunc::Max => Max::new(),
        }
    }
}

/// Non-null values of a column across the rows
fn present<'a>(column: &'a str, rows: &'a [Row]) -> impl Iterator<Item = &'a Value> {
    rows.iter()
        .filter_map(move |row| row.get(column))
        .filter(|v| !v.is_null())
}

/// COUNT(*) counts rows, COUNT(col) counts non-null values
pub struct Count;

impl Count {
    fn new() -> Box<Self> {
        Box::new(Self {})
    }
}

impl Calculator for Count {
    fn calc(&self, column: Option<&str>, rows: &[Row]) -> Value {
        let count = match column {
            None => rows.len(),
            Some(column) => present(column, rows).count(),
        };
        Value::Integer(count as i64)
    }
}

/// SUM over the numeric-coercible values; stays integral when every input is
pub struct Sum;

impl Sum {
    fn new() -> Box<Self> {
        Box::new(Self {})
    }
}

impl Calculator for Sum {
    fn calc(&self, column: Option<&str>, rows: &[Row]) -> Value {
        let Some(column) = column else {
            return Value::Integer(0);
        };
        // Integers add exactly; a total beyond i64 degrades to float
        let mut exact: Option<i128> = Some(0);
        let mut sum = 0.0;
        for value in present(column, rows) {
            if let Some(n) = value.as_number() {
                sum += n;
                exact = match value {
                    Value::Integer(i) => exact.and_then(|total| total.checked_add(*i as i128)),
                    _ => None,
                };
            }
        }
        match exact.map(i64::try_from) {
            Some(Ok(total)) => Value::Integer(total),
            _ => Value::Float(sum),
        }
    }
}

/// AVG over the numeric-coercible values, NULL when there are none
pub struct Avg;

impl Avg {
    fn new() -> Box<Self> {
        Box::new(Self {})
    }
}

impl Calculator for Avg {
    fn calc(&self, column: Option<&str>, rows: &[Row]) -> Value {
        let Some(column) = column else {
            return Value::Null;
        };
        let numbers: Vec<f64> = present(column, rows).filter_map(Value::as_number).collect();
        if numbers.is_empty() {
            return Value::Null;
        }
        Value::Float(numbers.iter().sum::<f64>() / numbers.len() as f64)
    }
}

/// MIN - smallest non-null value
pub struct Min;

impl Min {
    fn new() -> Box<Self> {
        Box::new(Self {})
    }
}

impl Calculator for Min {
    fn calc(&self, column: Option<&str>, rows: &[Row]) -> Value {
        column
            .and_then(|c| present(c, rows).min_by(|a, b| a.sort_cmp(b)))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

/// MAX - largest non-null value
pub struct Max;

impl Max {
    fn new() -> Box<Self> {
        Box::new(Self {})
    }
}

impl Calculator for Max {
    fn calc(&self, column: Option<&str>, rows: &[Row]) -> Value {
        column
            .and_then(|c| present(c, rows).max_by(|a, b| a.sort_cmp(b)))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::Calculator;
    use crate::sql::{parser::ast::AggregateFunc, schema::Row, types::Value};

    fn rows(values: Vec<Value>) -> Vec<Row> {
        values
            .into_iter()
            .map(|v| Row::from([("amount".to_string(), v)]))
            .collect()
    }

    fn calc(func: AggregateFunc, column: Option<&str>, rows: &[Row]) -> Value {
        <dyn Calculator>::build(func).calc(column, rows)
    }

    #[test]
    fn test_aggregates() {
        let data = rows(vec![
            Value::Integer(10),
            Value::Null,
            Value::Integer(30),
            Value::String("n/a".into()),
        ]);
        assert_eq!(calc(AggregateFunc::Count, None, &data), Value::Integer(4));
        assert_eq!(calc(AggregateFunc::Count, Some("amount"), &data), Value::Integer(3));
        assert_eq!(calc(AggregateFunc::Sum, Some("amount"), &data), Value::Integer(40));
        assert_eq!(calc(AggregateFunc::Avg, Some("amount"), &data), Value::Float(20.0));
        assert_eq!(calc(AggregateFunc::Min, Some("amount"), &data), Value::Integer(10));
    }

    #[test]
    fn test_aggregates_empty() {
        let data = rows(vec![]);
        assert_eq!(calc(AggregateFunc::Count, None, &data), Value::Integer(0));
        assert_eq!(calc(AggregateFunc::Sum, Some("amount"), &data), Value::Integer(0));
        assert_eq!(calc(AggregateFunc::Avg, Some("amount"), &data), Value::Null);
        assert_eq!(calc(AggregateFunc::Max, Some("amount"), &data), Value::Null);
    }

    #[test]
    fn test_sum_integers_exact() {
        let data = rows(vec![Value::Integer(9_007_199_254_740_993), Value::Integer(0)]);
        assert_eq!(
            calc(AggregateFunc::Sum, Some("amount"), &data),
            Value::Integer(9_007_199_254_740_993)
        );

        let data = rows(vec![Value::Integer(i64::MAX), Value::Integer(1)]);
        assert_eq!(
            calc(AggregateFunc::Sum, Some("amount"), &data),
            Value::Float(i64::MAX as f64 + 1.0)
        );
    }

    #[test]
    fn test_sum_mixed() {
        let data = rows(vec![Value::Integer(1), Value::Float(2.5)]);
        assert_eq!(calc(AggregateFunc::Sum, Some("amount"), &data), Value::Float(3.5));
    }
}
