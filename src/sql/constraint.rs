//! Row admission checks run before INSERT and schema migration commit rows.
//!
//! Checks run in a fixed order: NOT NULL, then PRIMARY KEY / UNIQUE, then
//! FOREIGN KEY. The first violation aborts the whole statement.

use crate::{
    error::{Error, Result},
    sql::{
        schema::{Column, Database, Row, Table},
        types::Value,
    },
};

/// Verifies `row` against `table`'s constraints.
///
/// `existing` holds the rows the candidate must not collide with: the
/// table's stored rows plus rows admitted earlier in the same statement.
/// Self-referencing foreign keys are checked against `existing` and the
/// candidate itself.
pub fn check_row(db: &Database, table: &Table, existing: &[&Row], row: &Row) -> Result<()> {
    for column in &table.columns {
        check_not_null(column, row)?;
    }
    for column in table.columns.iter().filter(|c| c.is_unique_key()) {
        check_unique(table, column, existing, row)?;
    }
    for column in &table.columns {
        check_foreign_key(db, table, column, existing, row)?;
    }
    Ok(())
}

fn present<'a>(column: &Column, row: &'a Row) -> Option<&'a Value> {
    row.get(&column.name).filter(|v| !v.is_null())
}

fn check_not_null(column: &Column, row: &Row) -> Result<()> {
    // auto-increment fills the value itself
    if column.nullable || column.auto_increment || present(column, row).is_some() {
        return Ok(());
    }
    Err(Error::Integrity(format!(
        "Column '{}' cannot be null",
        column.name
    )))
}

fn check_unique(table: &Table, column: &Column, existing: &[&Row], row: &Row) -> Result<()> {
    let Some(value) = present(column, row) else {
        return Ok(());
    };
    let duplicate = existing
        .iter()
        .filter_map(|other| present(column, other))
        .any(|other| other.loose_eq(value));
    if duplicate {
        let key = if column.is_primary_key {
            "PRIMARY"
        } else {
            column.name.as_str()
        };
        return Err(Error::Integrity(format!(
            "Duplicate entry '{}' for key '{}.{}'",
            value.to_text(),
            table.name,
            key
        )));
    }
    Ok(())
}

fn check_foreign_key(
    db: &Database,
    table: &Table,
    column: &Column,
    existing: &[&Row],
    row: &Row,
) -> Result<()> {
    let Some(fk) = &column.references else {
        return Ok(());
    };
    let Some(value) = present(column, row) else {
        return Ok(());
    };

    let target = if fk.table_id == table.id {
        table
    } else {
        db.table_by_id(&fk.table_id).ok_or_else(|| {
            Error::Integrity(format!(
                "Referenced table '{}' for column '{}' not found",
                fk.table_id, column.name
            ))
        })?
    };
    let target_column = target
        .columns
        .iter()
        .find(|c| c.id == fk.column_id)
        .ok_or_else(|| {
            Error::Integrity(format!(
                "Referenced column '{}' in table '{}' not found",
                fk.column_id, target.name
            ))
        })?;

    let found = if fk.table_id == table.id {
        // a row may reference itself
        existing
            .iter()
            .copied()
            .chain(std::iter::once(row))
            .filter_map(|r| present(target_column, r))
            .any(|v| v.loose_eq(value))
    } else {
        target
            .rows
            .iter()
            .filter_map(|r| present(target_column, r))
            .any(|v| v.loose_eq(value))
    };
    if !found {
        return Err(Error::Integrity(format!(
            "Cannot add or update a child row: a foreign key constraint fails ('{}'.'{}' references '{}'.'{}')",
            table.name, column.name, target.name, target_column.name
        )));
    }
    Ok(())
}
