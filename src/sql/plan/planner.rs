use std::collections::BTreeMap;

use crate::{
    error::{Error, Result},
    sql::{
        parser::ast::{self, Expression, SelectItem, SystemFunc},
        plan::Node,
        schema::{self, CURRENT_TIMESTAMP, Row},
        types::Value,
    },
};

/// Reported by VERSION()
pub const SERVER_VERSION: &str = concat!("8.0.0-emudb-", env!("CARGO_PKG_VERSION"));

/// Reported by USER()
pub const SERVER_USER: &str = "root@localhost";

/// Query planner - converts AST into operator nodes.
///
/// Session-dependent functions (DATABASE(), LAST_INSERT_ID()) are resolved
/// here, so the resulting plan only needs the database it runs against.
pub struct Planner<'a> {
    database: &'a str,
    last_insert_id: Option<i64>,
}

impl<'a> Planner<'a> {
    pub fn new(database: &'a str, last_insert_id: Option<i64>) -> Self {
        Self {
            database,
            last_insert_id,
        }
    }

    pub fn build_statement(&self, stmt: ast::Statement) -> Result<Node> {
        Ok(match stmt {
            ast::Statement::CreateTable {
                name,
                if_not_exists,
                columns,
                foreign_keys,
            } => {
                let mut references = Vec::new();
                let mut schema_columns = Vec::with_capacity(columns.len());
                for (i, c) in columns.into_iter().enumerate() {
                    if let Some((table, column)) = &c.references {
                        references.push((c.name.clone(), table.clone(), column.clone()));
                    }
                    schema_columns.push(self.build_column(format!("{}_col_{}", name, i), c));
                }
                references.extend(
                    foreign_keys
                        .into_iter()
                        .map(|fk| (fk.column, fk.table, fk.ref_column)),
                );
                Node::CreateTable {
                    name,
                    if_not_exists,
                    columns: schema_columns,
                    references,
                }
            }
            ast::Statement::AlterTable { name, column } => {
                let reference = column.references.clone();
                Node::AlterTable {
                    table_name: name,
                    // the executor assigns the id once it knows the existing columns
                    column: self.build_column(String::new(), column),
                    reference,
                }
            }
            ast::Statement::DropTable { name, if_exists } => Node::DropTable {
                table_name: name,
                if_exists,
            },
            ast::Statement::Insert {
                table_name,
                columns,
                values,
            } => Node::Insert {
                table_name,
                columns,
                values: values
                    .into_iter()
                    .map(|row| row.into_iter().map(|e| self.evaluate(e)).collect())
                    .collect(),
            },
            ast::Statement::Update {
                table_name,
                columns,
                where_clause,
            } => Node::Update {
                table_name,
                columns: columns
                    .into_iter()
                    .map(|(name, e)| (name, self.evaluate(e)))
                    .collect::<BTreeMap<_, _>>(),
                filter: where_clause.map(|(column, e)| (column, self.evaluate(e))),
            },
            ast::Statement::Delete {
                table_name,
                where_clause,
            } => Node::Delete {
                table_name,
                filter: where_clause.map(|(column, e)| (column, self.evaluate(e))),
            },
            ast::Statement::Select(select) => self.build_select(select)?,
            stmt => {
                return Err(Error::Internal(format!(
                    "statement is not planned against a database: {:?}",
                    stmt
                )));
            }
        })
    }

    fn build_select(&self, select: ast::Select) -> Result<Node> {
        let Some(from) = select.from else {
            return self.build_values(select.items);
        };

        let mut node = Node::Scan {
            table_name: from.clone(),
        };

        if let Some(join) = select.join {
            node = Node::NestedLoopJoin {
                source: Box::new(node),
                left_table: from,
                join,
            };
        }

        if let Some(condition) = select.where_clause {
            node = Node::Filter {
                source: Box::new(node),
                condition,
            };
        }

        if !select.order_by.is_empty() {
            node = Node::Order {
                source: Box::new(node),
                order_by: select.order_by,
            };
        }

        let exprs: Vec<_> = select
            .items
            .into_iter()
            .filter_map(|item| match item {
                SelectItem::Aggregate {
                    func,
                    column,
                    alias,
                } => {
                    let label = alias.unwrap_or_else(|| func.label(column.as_deref()));
                    Some((func, column, label))
                }
                _ => None,
            })
            .collect();
        if !exprs.is_empty() {
            node = Node::Aggregate {
                source: Box::new(node),
                exprs,
            };
        }

        if let Some(column) = select.group_by {
            node = Node::Group {
                source: Box::new(node),
                column,
            };
        }

        if let Some(predicate) = select.having {
            node = Node::Having {
                source: Box::new(node),
                predicate,
            };
        }

        // OFFSET - must be processed before LIMIT when both are present
        if let Some(offset) = select.offset {
            node = Node::Offset {
                source: Box::new(node),
                offset,
            };
        }

        if let Some(limit) = select.limit {
            node = Node::Limit {
                source: Box::new(node),
                limit,
            };
        }

        Ok(node)
    }

    /// FROM-less SELECT: a single row holding each system function's value
    fn build_values(&self, items: Vec<SelectItem>) -> Result<Node> {
        let mut columns = Vec::with_capacity(items.len());
        let mut row = Row::new();
        for item in items {
            match item {
                SelectItem::System { func, alias } => {
                    let label = alias.unwrap_or_else(|| func.to_string());
                    row.insert(label.clone(), self.system_value(func));
                    columns.push(label);
                }
                _ => return Err(Error::Parse("Missing FROM clause".into())),
            }
        }
        Ok(Node::Values {
            columns,
            rows: vec![row],
        })
    }

    fn build_column(&self, id: String, c: ast::Column) -> schema::Column {
        let nullable = !c.primary_key && c.nullable.unwrap_or(true);
        let default_value = c.default.and_then(|expr| match expr {
            // stored as a marker and evaluated each time a row is admitted
            Expression::Function(SystemFunc::Now) => {
                Some(Value::String(CURRENT_TIMESTAMP.to_string()))
            }
            expr => match self.evaluate(expr) {
                Value::Null => None,
                value => Some(c.datatype.coerce(value)),
            },
        });

        schema::Column {
            id,
            name: c.name,
            datatype: c.datatype,
            length: c.length,
            nullable,
            default_value,
            is_primary_key: c.primary_key,
            is_unique: c.unique,
            is_foreign_key: c.references.is_some(),
            auto_increment: c.auto_increment,
            references: None,
        }
    }

    fn evaluate(&self, expr: Expression) -> Value {
        match expr {
            Expression::Consts(c) => Value::from_consts(c),
            Expression::Function(func) => self.system_value(func),
        }
    }

    fn system_value(&self, func: SystemFunc) -> Value {
        match func {
            SystemFunc::Version => Value::String(SERVER_VERSION.to_string()),
            SystemFunc::User => Value::String(SERVER_USER.to_string()),
            SystemFunc::Database => Value::String(self.database.to_string()),
            SystemFunc::Now => Value::String(schema::now()),
            SystemFunc::LastInsertId => self.last_insert_id.map_or(Value::Null, Value::Integer),
        }
    }
}
