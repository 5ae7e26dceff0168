use crate::{
    error::{Error, Result},
    sql::{
        constraint,
        executor::ResultSet,
        schema::{Column, Database, ForeignKey, Index, IndexKind, Row, Table},
        types::Value,
    },
};

use super::Executor;

/// CREATE TABLE executor
pub struct CreateTable {
    name: String,
    if_not_exists: bool,
    columns: Vec<Column>,
    references: Vec<(String, String, String)>,
}

impl CreateTable {
    pub fn new(
        name: String,
        if_not_exists: bool,
        columns: Vec<Column>,
        references: Vec<(String, String, String)>,
    ) -> Box<Self> {
        Box::new(Self {
            name,
            if_not_exists,
            columns,
            references,
        })
    }
}

impl Executor for CreateTable {
    fn execute(self: Box<Self>, db: &mut Database) -> Result<ResultSet> {
        if db.get_table(&self.name).is_some() {
            if !self.if_not_exists {
                return Err(Error::Duplicate(format!("Table '{}' already exists", self.name)));
            }
            return Ok(ResultSet::CreateTable {
                table_name: self.name,
                created: false,
            });
        }

        let mut table = Table {
            id: self.name.clone(),
            name: self.name,
            columns: self.columns,
            indexes: Vec::new(),
            rows: Vec::new(),
        };

        // Resolve first, then link, so a table may reference itself
        let mut links = Vec::with_capacity(self.references.len());
        for (column, ref_table, ref_column) in &self.references {
            let position = table
                .columns
                .iter()
                .position(|c| c.name == *column)
                .ok_or_else(|| {
                    Error::Reference(format!(
                        "Key column '{}' doesn't exist in table '{}'",
                        column, table.name
                    ))
                })?;
            links.push((position, resolve_reference(db, &table, ref_table, ref_column)?));
        }
        for (position, fk) in links {
            let column = &mut table.columns[position];
            column.is_foreign_key = true;
            column.references = Some(fk);
        }

        let indexes: Vec<Index> = table
            .columns
            .iter()
            .filter(|c| c.is_unique && !c.is_primary_key)
            .map(|c| unique_index(&table, c))
            .collect();
        table.indexes = indexes;

        let table_name = table.name.clone();
        add_table(db, table)?;
        Ok(ResultSet::CreateTable {
            table_name,
            created: true,
        })
    }
}

/// Registers a fully built table schema
pub fn add_table(db: &mut Database, table: Table) -> Result<()> {
    table.validate()?;
    if db.get_table(&table.name).is_some() {
        return Err(Error::Duplicate(format!(
            "Table '{}' already exists",
            table.name
        )));
    }
    db.tables.push(table);
    Ok(())
}

/// Resolves `REFERENCES ref_table(ref_column)` to ids. `table` is the table
/// being defined, which may not be registered yet.
fn resolve_reference(
    db: &Database,
    table: &Table,
    ref_table: &str,
    ref_column: &str,
) -> Result<ForeignKey> {
    let target = if ref_table == table.name {
        table
    } else {
        db.get_table(ref_table).ok_or_else(|| {
            Error::Reference(format!("Referenced table '{}' not found", ref_table))
        })?
    };
    let column = target.get_column(ref_column).ok_or_else(|| {
        Error::Reference(format!(
            "Referenced column '{}' not found in table '{}'",
            ref_column, ref_table
        ))
    })?;
    Ok(ForeignKey {
        table_id: target.id.clone(),
        column_id: column.id.clone(),
    })
}

fn unique_index(table: &Table, column: &Column) -> Index {
    Index {
        id: format!("{}_idx_{}", table.id, column.id),
        name: format!("{}_{}_unique", table.name, column.name),
        column_ids: vec![column.id.clone()],
        kind: IndexKind::Unique,
    }
}

/// ALTER TABLE ... ADD COLUMN executor
pub struct AlterTable {
    table_name: String,
    column: Column,
    reference: Option<(String, String)>,
}

impl AlterTable {
    pub fn new(table_name: String, column: Column, reference: Option<(String, String)>) -> Box<Self> {
        Box::new(Self {
            table_name,
            column,
            reference,
        })
    }
}

impl Executor for AlterTable {
    fn execute(self: Box<Self>, db: &mut Database) -> Result<ResultSet> {
        let mut column = self.column;
        let table = db.must_get_table(&self.table_name)?;
        if table.get_column(&column.name).is_some() {
            return Err(Error::Duplicate(format!(
                "Duplicate column name '{}'",
                column.name
            )));
        }

        let mut n = table.columns.len();
        column.id = loop {
            let id = format!("{}_col_{}", table.id, n);
            if table.columns.iter().all(|c| c.id != id) {
                break id;
            }
            n += 1;
        };

        if let Some((ref_table, ref_column)) = &self.reference {
            column.is_foreign_key = true;
            column.references = Some(resolve_reference(db, table, ref_table, ref_column)?);
        }

        let fill = column.default_or_null();
        if fill.is_null() && !column.nullable && !column.auto_increment && !table.rows.is_empty() {
            return Err(Error::Integrity(format!(
                "Column '{}' cannot be null and has no default value",
                column.name
            )));
        }
        let index = (column.is_unique && !column.is_primary_key).then(|| unique_index(table, &column));

        let table = db.must_get_table_mut(&self.table_name)?;
        for row in table.rows.iter_mut() {
            row.insert(column.name.clone(), fill.clone());
        }
        table.indexes.extend(index);
        let column_name = column.name.clone();
        table.columns.push(column);

        Ok(ResultSet::AlterTable {
            table_name: self.table_name,
            column_name,
        })
    }
}

/// DROP TABLE executor
pub struct DropTable {
    table_name: String,
    if_exists: bool,
}

impl DropTable {
    pub fn new(table_name: String, if_exists: bool) -> Box<Self> {
        Box::new(Self {
            table_name,
            if_exists,
        })
    }
}

impl Executor for DropTable {
    fn execute(self: Box<Self>, db: &mut Database) -> Result<ResultSet> {
        let before = db.tables.len();
        db.tables.retain(|t| t.name != self.table_name);
        let dropped = db.tables.len() < before;
        if !dropped && !self.if_exists {
            return Err(Error::Reference(format!(
                "Unknown table '{}'",
                self.table_name
            )));
        }
        Ok(ResultSet::DropTable {
            table_name: self.table_name,
            dropped,
        })
    }
}

/// Rebuilds `old`'s rows under the `new` schema.
///
/// Each new column takes its value from the old column with the same id,
/// then from an old column with the same name, then from its default.
/// Every rebuilt row must pass the new schema's constraints.
pub fn migrate_table(db: &Database, old: &Table, mut new: Table) -> Result<Table> {
    new.validate()?;
    let mut rows: Vec<Row> = Vec::with_capacity(old.rows.len());
    for stored in &old.rows {
        let source = old.backfill(stored);
        let mut row = Row::new();
        for column in &new.columns {
            let value = match old.columns.iter().find(|c| c.id == column.id) {
                Some(prev) => source.get(&prev.name).cloned().unwrap_or(Value::Null),
                None => source
                    .get(&column.name)
                    .cloned()
                    .unwrap_or_else(|| column.default_or_null()),
            };
            row.insert(column.name.clone(), column.datatype.coerce(value));
        }
        let existing: Vec<&Row> = rows.iter().collect();
        constraint::check_row(db, &new, &existing, &row)?;
        rows.push(row);
    }
    new.rows = rows;
    Ok(new)
}
