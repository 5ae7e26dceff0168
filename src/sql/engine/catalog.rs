use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    sql::{
        schema::{Column, Database, ForeignKey, Index, IndexKind, Row, Table},
        types::{DataType, Value},
    },
};

/// Registry of databases keyed by name. Serializes as the snapshot
/// document: one object member per database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    databases: BTreeMap<String, Database>,
}

impl Catalog {
    /// Registry holding one empty database
    pub fn seed(name: &str) -> Self {
        let mut catalog = Self::default();
        catalog.insert(Database::new(name));
        catalog
    }

    /// Registry holding one database with the sample company schema
    pub fn seed_demo(name: &str) -> Self {
        let mut catalog = Self::default();
        catalog.insert(demo_database(name));
        catalog
    }

    fn insert(&mut self, db: Database) {
        self.databases.insert(db.name.clone(), db);
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.databases.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.databases.keys().cloned().collect()
    }

    pub fn first_name(&self) -> Option<String> {
        self.databases.keys().next().cloned()
    }

    pub fn get(&self, name: &str) -> Option<&Database> {
        self.databases.get(name)
    }

    pub fn must_get(&self, name: &str) -> Result<&Database> {
        self.get(name)
            .ok_or_else(|| Error::Reference(format!("Unknown database '{}'", name)))
    }

    pub fn must_get_mut(&mut self, name: &str) -> Result<&mut Database> {
        self.databases
            .get_mut(name)
            .ok_or_else(|| Error::Reference(format!("Unknown database '{}'", name)))
    }

    pub fn create(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::Parse("database name cannot be empty".into()));
        }
        if self.contains(name) {
            return Err(Error::Duplicate(format!(
                "Database '{}' already exists",
                name
            )));
        }
        self.insert(Database::new(name));
        Ok(())
    }

    /// Removes a database. When that empties the registry, `fallback` is
    /// created so at least one database always exists.
    pub fn remove(&mut self, name: &str, fallback: &str) -> Result<Database> {
        let db = self
            .databases
            .remove(name)
            .ok_or_else(|| Error::Reference(format!("Can't drop database '{}'; database doesn't exist", name)))?;
        if self.databases.is_empty() {
            self.insert(Database::new(fallback));
        }
        Ok(db)
    }
}

fn column(id: &str, name: &str, datatype: DataType, length: Option<u32>, nullable: bool) -> Column {
    let mut column = Column::new(id, name, datatype);
    column.length = length;
    column.nullable = nullable;
    column
}

fn primary_key(id: &str) -> Column {
    let mut column = column(id, "id", DataType::Int, None, false);
    column.is_primary_key = true;
    column
}

fn rows<const N: usize>(columns: [&str; N], data: Vec<[Value; N]>) -> Vec<Row> {
    data.into_iter()
        .map(|values| {
            columns
                .iter()
                .map(|c| c.to_string())
                .zip(values)
                .collect()
        })
        .collect()
}

fn text(s: &str) -> Value {
    Value::String(s.to_string())
}

/// Departments, employees and projects with a handful of rows each
fn demo_database(name: &str) -> Database {
    let departments = Table {
        id: "departments".into(),
        name: "departments".into(),
        columns: vec![
            primary_key("d1"),
            column("d2", "name", DataType::Varchar, Some(100), false),
            column("d3", "location", DataType::Varchar, Some(100), true),
        ],
        indexes: vec![],
        rows: rows(
            ["id", "name", "location"],
            vec![
                [Value::Integer(1), text("Engineering"), text("Building A")],
                [Value::Integer(2), text("HR"), text("Building B")],
                [Value::Integer(3), text("Sales"), text("Building C")],
                [Value::Integer(4), text("Marketing"), text("Building A")],
            ],
        ),
    };

    let mut department_id = column("e4", "department_id", DataType::Int, None, true);
    department_id.is_foreign_key = true;
    department_id.references = Some(ForeignKey {
        table_id: "departments".into(),
        column_id: "d1".into(),
    });
    let employees = Table {
        id: "employees".into(),
        name: "employees".into(),
        columns: vec![
            primary_key("e1"),
            column("e2", "name", DataType::Varchar, Some(100), false),
            column("e3", "role", DataType::Varchar, Some(50), false),
            department_id,
            column("e5", "salary", DataType::Decimal, None, false),
        ],
        indexes: vec![Index {
            id: "idx_emp_dept".into(),
            name: "idx_department_id".into(),
            column_ids: vec!["e4".into()],
            kind: IndexKind::Btree,
        }],
        rows: rows(
            ["id", "name", "role", "department_id", "salary"],
            vec![
                [Value::Integer(101), text("Alice Johnson"), text("Senior Engineer"), Value::Integer(1), Value::Integer(95000)],
                [Value::Integer(102), text("Bob Smith"), text("Product Manager"), Value::Integer(1), Value::Integer(105000)],
                [Value::Integer(103), text("Charlie Brown"), text("HR Specialist"), Value::Integer(2), Value::Integer(65000)],
                [Value::Integer(104), text("Diana Prince"), text("Sales Lead"), Value::Integer(3), Value::Integer(85000)],
                [Value::Integer(105), text("Evan Wright"), text("Engineer"), Value::Integer(1), Value::Integer(75000)],
            ],
        ),
    };

    let projects = Table {
        id: "projects".into(),
        name: "projects".into(),
        columns: vec![
            primary_key("p1"),
            column("p2", "name", DataType::Varchar, Some(100), false),
            column("p3", "budget", DataType::Decimal, None, true),
        ],
        indexes: vec![],
        rows: rows(
            ["id", "name", "budget"],
            vec![
                [Value::Integer(1), text("Project Alpha"), Value::Integer(50000)],
                [Value::Integer(2), text("Project Beta"), Value::Integer(120000)],
                [Value::Integer(3), text("Website Redesign"), Value::Integer(30000)],
            ],
        ),
    };

    let mut db = Database::new(name);
    db.tables = vec![departments, employees, projects];
    db
}

#[cfg(test)]
mod tests {
    use super::Catalog;
    use crate::error::{Error, Result};

    #[test]
    fn test_create_and_drop() -> Result<()> {
        let mut catalog = Catalog::seed("main");
        catalog.create("other")?;
        assert!(matches!(catalog.create("other"), Err(Error::Duplicate(_))));
        assert_eq!(catalog.names(), vec!["main".to_string(), "other".to_string()]);

        catalog.remove("main", "main")?;
        catalog.remove("other", "main")?;
        // never empty
        assert_eq!(catalog.names(), vec!["main".to_string()]);
        assert!(catalog.remove("ghost", "main").is_err());
        Ok(())
    }

    #[test]
    fn test_demo_seed() -> Result<()> {
        let catalog = Catalog::seed_demo("DemoDB");
        let db = catalog.must_get("DemoDB")?;
        assert_eq!(db.tables.len(), 3);
        assert_eq!(db.must_get_table("employees")?.rows.len(), 5);
        for table in &db.tables {
            table.validate()?;
        }
        Ok(())
    }

    #[test]
    fn test_snapshot_layout() -> Result<()> {
        let catalog = Catalog::seed_demo("DemoDB");
        let json = serde_json::to_value(&catalog)?;
        let employees = &json["DemoDB"]["tables"][1];
        assert_eq!(employees["name"], "employees");
        assert_eq!(employees["columns"][3]["references"]["tableId"], "departments");
        assert_eq!(employees["indexes"][0]["type"], "BTREE");

        let back: Catalog = serde_json::from_value(json)?;
        assert_eq!(back, catalog);
        Ok(())
    }
}
