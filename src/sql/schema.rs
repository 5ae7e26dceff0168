use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    sql::types::{DataType, Value},
};

/// A row maps column names to values. Columns absent from storage are
/// back-filled from the schema when the row is read.
pub type Row = BTreeMap<String, Value>;

/// Default marker evaluated to the current time whenever a row is admitted
pub const CURRENT_TIMESTAMP: &str = "CURRENT_TIMESTAMP";

/// A named collection of tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<Table>,
}

impl Database {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
        }
    }

    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Returns the table, or a reference error if it doesn't exist
    pub fn must_get_table(&self, name: &str) -> Result<&Table> {
        self.get_table(name)
            .ok_or_else(|| Error::Reference(format!("Table '{}' not found", name)))
    }

    pub fn must_get_table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::Reference(format!("Table '{}' not found", name)))
    }

    pub fn table_by_id(&self, id: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.id == id)
    }
}

/// Table schema definition together with its rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub indexes: Vec<Index>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl Table {
    /// Validates table schema
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Parse("table name cannot be empty".into()));
        }
        if self.columns.is_empty() {
            return Err(Error::Parse(format!("Table '{}' has no columns", self.name)));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(Error::Duplicate(format!(
                    "Duplicate column name '{}' in table '{}'",
                    column.name, self.name
                )));
            }
        }
        Ok(())
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn must_get_column(&self, name: &str) -> Result<&Column> {
        self.get_column(name).ok_or_else(|| {
            Error::Reference(format!("Unknown column '{}' in table '{}'", name, self.name))
        })
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Copies a stored row, filling declared columns that storage lacks
    pub fn backfill(&self, row: &Row) -> Row {
        let mut result = row.clone();
        for column in &self.columns {
            if !result.contains_key(&column.name) {
                result.insert(column.name.clone(), column.default_or_null());
            }
        }
        result
    }
}

/// Column schema definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub datatype: DataType,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub is_foreign_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub references: Option<ForeignKey>,
}

fn default_nullable() -> bool {
    true
}

impl Column {
    pub fn new(id: impl Into<String>, name: impl Into<String>, datatype: DataType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            datatype,
            length: None,
            nullable: true,
            default_value: None,
            is_primary_key: false,
            is_unique: false,
            is_foreign_key: false,
            auto_increment: false,
            references: None,
        }
    }

    /// Primary-key and unique columns reject duplicate non-null values
    pub fn is_unique_key(&self) -> bool {
        self.is_primary_key || self.is_unique
    }

    /// Value for a column the statement didn't supply, if one exists
    pub fn resolve_default(&self) -> Option<Value> {
        match &self.default_value {
            Some(Value::String(s)) if s.eq_ignore_ascii_case(CURRENT_TIMESTAMP) => {
                Some(Value::String(now()))
            }
            Some(v) => Some(v.clone()),
            None => None,
        }
    }

    pub fn default_or_null(&self) -> Value {
        self.resolve_default().unwrap_or(Value::Null)
    }
}

/// Current local time in the `YYYY-MM-DD HH:MM:SS` form
pub fn now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Foreign-key target: referenced table id and column id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    pub table_id: String,
    pub column_id: String,
}

/// Descriptive index metadata. Recorded and persisted, never consulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub id: String,
    pub name: String,
    pub column_ids: Vec<String>,
    #[serde(rename = "type", default)]
    pub kind: IndexKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndexKind {
    #[default]
    Btree,
    Hash,
    Unique,
}
