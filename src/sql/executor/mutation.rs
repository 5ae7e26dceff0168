use std::collections::{BTreeMap, HashSet};

use crate::{
    error::{Error, Result},
    sql::{
        constraint,
        executor::ResultSet,
        schema::{Column, Database, Row, Table},
        types::Value,
    },
};

use super::Executor;

/// INSERT executor. Every row is checked before any is stored, so a
/// failing row leaves the table untouched.
pub struct Insert {
    table_name: String,
    columns: Option<Vec<String>>,
    values: Vec<Vec<Value>>,
}

impl Insert {
    pub fn new(table_name: String, columns: Option<Vec<String>>, values: Vec<Vec<Value>>) -> Box<Self> {
        Box::new(Self {
            table_name,
            columns,
            values,
        })
    }
}

impl Executor for Insert {
    fn execute(self: Box<Self>, db: &mut Database) -> Result<ResultSet> {
        let table = db.must_get_table(&self.table_name)?;
        let mut pending: Vec<Row> = Vec::with_capacity(self.values.len());
        let mut last_insert_id = None;

        for values in self.values {
            let mut row = match &self.columns {
                Some(columns) => make_row(table, columns, values)?,
                None => pad_row(table, values)?,
            };

            for column in table.columns.iter().filter(|c| c.auto_increment) {
                if row.get(&column.name).is_none_or(Value::is_null) {
                    let next = next_auto_increment(column, table.rows.iter().chain(pending.iter()))?;
                    row.insert(column.name.clone(), Value::Integer(next));
                    last_insert_id = Some(next);
                }
            }

            for column in &table.columns {
                if row.contains_key(&column.name) {
                    continue;
                }
                let value = match column.resolve_default() {
                    Some(value) => value,
                    None if column.nullable => Value::Null,
                    None => {
                        return Err(Error::Integrity(format!(
                            "Field '{}' doesn't have a default value",
                            column.name
                        )));
                    }
                };
                row.insert(column.name.clone(), value);
            }

            let existing: Vec<&Row> = table.rows.iter().chain(pending.iter()).collect();
            constraint::check_row(db, table, &existing, &row)?;
            pending.push(row);
        }

        let count = pending.len();
        db.must_get_table_mut(&self.table_name)?.rows.extend(pending);
        Ok(ResultSet::Insert {
            count,
            last_insert_id,
        })
    }
}

/// Maps an explicit column list onto the values
fn make_row(table: &Table, columns: &[String], values: Vec<Value>) -> Result<Row> {
    if columns.len() != values.len() {
        return Err(Error::Parse(format!(
            "Column count doesn't match value count: {} columns, {} values",
            columns.len(),
            values.len()
        )));
    }
    let mut seen = HashSet::new();
    let mut row = Row::new();
    for (name, value) in columns.iter().zip(values) {
        let column = table.must_get_column(name)?;
        if !seen.insert(name) {
            return Err(Error::Parse(format!("Column '{}' specified twice", name)));
        }
        row.insert(name.clone(), column.datatype.coerce(value));
    }
    Ok(row)
}

/// Maps positional values onto the table's leading columns
fn pad_row(table: &Table, values: Vec<Value>) -> Result<Row> {
    if values.len() > table.columns.len() {
        return Err(Error::Parse(format!(
            "Column count doesn't match value count: table '{}' has {} columns, got {} values",
            table.name,
            table.columns.len(),
            values.len()
        )));
    }
    Ok(table
        .columns
        .iter()
        .zip(values)
        .map(|(column, value)| (column.name.clone(), column.datatype.coerce(value)))
        .collect())
}

fn next_auto_increment<'a>(column: &Column, rows: impl Iterator<Item = &'a Row>) -> Result<i64> {
    let max = rows
        .filter_map(|row| match row.get(&column.name)? {
            Value::Integer(i) => Some(*i),
            v => v.as_number().map(|n| n as i64),
        })
        .max();
    match max {
        None => Ok(1),
        Some(max) => max.checked_add(1).ok_or_else(|| {
            Error::Integrity(format!("Auto-increment overflow on column '{}'", column.name))
        }),
    }
}

/// Rows a single-equality WHERE selects; all rows without one
fn selected(table: &Table, row: &Row, filter: &Option<(String, Value)>) -> bool {
    match filter {
        Some((column, value)) => table
            .backfill(row)
            .get(column)
            .is_some_and(|v| !v.is_null() && v.loose_eq(value)),
        None => true,
    }
}

/// UPDATE executor. Values are coerced to the column types; constraints
/// are not re-checked.
pub struct Update {
    table_name: String,
    columns: BTreeMap<String, Value>,
    filter: Option<(String, Value)>,
}

impl Update {
    pub fn new(
        table_name: String,
        columns: BTreeMap<String, Value>,
        filter: Option<(String, Value)>,
    ) -> Box<Self> {
        Box::new(Self {
            table_name,
            columns,
            filter,
        })
    }
}

impl Executor for Update {
    fn execute(self: Box<Self>, db: &mut Database) -> Result<ResultSet> {
        let table = db.must_get_table_mut(&self.table_name)?;
        let mut assignments = Vec::with_capacity(self.columns.len());
        for (name, value) in self.columns {
            let column = table.must_get_column(&name)?;
            assignments.push((name, column.datatype.coerce(value)));
        }
        if let Some((column, _)) = &self.filter {
            table.must_get_column(column)?;
        }

        let matched: Vec<usize> = (0..table.rows.len())
            .filter(|&i| selected(table, &table.rows[i], &self.filter))
            .collect();
        for &i in &matched {
            for (name, value) in &assignments {
                table.rows[i].insert(name.clone(), value.clone());
            }
        }
        Ok(ResultSet::Update {
            count: matched.len(),
        })
    }
}

/// DELETE executor
pub struct Delete {
    table_name: String,
    filter: Option<(String, Value)>,
}

impl Delete {
    pub fn new(table_name: String, filter: Option<(String, Value)>) -> Box<Self> {
        Box::new(Self { table_name, filter })
    }
}

impl Executor for Delete {
    fn execute(self: Box<Self>, db: &mut Database) -> Result<ResultSet> {
        let table = db.must_get_table_mut(&self.table_name)?;
        if let Some((column, _)) = &self.filter {
            table.must_get_column(column)?;
        }
        let before = table.rows.len();
        let rows = std::mem::take(&mut table.rows);
        let kept: Vec<Row> = rows
            .into_iter()
            .filter(|row| !selected(table, row, &self.filter))
            .collect();
        table.rows = kept;
        Ok(ResultSet::Delete {
            count: before - table.rows.len(),
        })
    }
}

/// Overwrites one stored cell with a raw textual value, coerced the way
/// INSERT coerces. Constraints are not checked.
pub fn update_cell(table: &mut Table, row_index: usize, column: &str, raw: &str) -> Result<()> {
    let value = table
        .must_get_column(column)?
        .datatype
        .coerce(Value::String(raw.to_string()));
    let rows = table.rows.len();
    let row = table.rows.get_mut(row_index).ok_or_else(|| {
        Error::Reference(format!(
            "Row index {} out of bounds ({} rows)",
            row_index, rows
        ))
    })?;
    row.insert(column.to_string(), value);
    Ok(())
}
