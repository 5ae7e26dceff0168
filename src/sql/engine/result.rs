use std::time::Duration;

use serde::Serialize;

use crate::{
    error::Error,
    sql::{
        executor::{ResultSet, TransactionMode},
        parser::ast::TransactionCommand,
        plan::ExecutionPlanNode,
        schema::Row,
    },
};

/// Outcome of one `execute` call, successful or not
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Row>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    /// Seconds spent, including parsing
    pub execution_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<ExecutionPlanNode>,
}

impl QueryResult {
    fn empty(success: bool, elapsed: Duration) -> Self {
        Self {
            success,
            message: None,
            data: None,
            columns: None,
            execution_time: elapsed.as_secs_f64(),
            affected_rows: None,
            plan: None,
        }
    }

    pub fn failure(err: &Error, elapsed: Duration) -> Self {
        Self {
            message: Some(err.to_string()),
            ..Self::empty(false, elapsed)
        }
    }

    pub fn message(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::empty(true, elapsed)
        }
    }

    pub fn from_result_set(rs: ResultSet, elapsed: Duration) -> Self {
        let mut result = Self::empty(true, elapsed);
        match rs {
            ResultSet::Scan {
                columns,
                rows,
                plan,
            } => {
                result.data = Some(rows);
                result.columns = Some(columns);
                result.plan = plan;
            }
            ResultSet::Insert { count, .. } => {
                result.message = Some(format!("{} row(s) inserted", count));
                result.affected_rows = Some(count);
            }
            ResultSet::Update { count } => {
                result.message = Some(format!("{} row(s) updated", count));
                result.affected_rows = Some(count);
            }
            ResultSet::Delete { count } => {
                result.message = Some(format!("{} row(s) deleted", count));
                result.affected_rows = Some(count);
            }
            rs => result.message = Some(describe(rs)),
        }
        result
    }

    /// Rows returned by a SELECT, empty for other statements
    pub fn rows(&self) -> &[Row] {
        self.data.as_deref().unwrap_or_default()
    }
}

fn describe(rs: ResultSet) -> String {
    match rs {
        ResultSet::CreateDatabase {
            name,
            created: true,
        } => format!("Database '{}' created", name),
        ResultSet::CreateDatabase {
            name,
            created: false,
        } => format!("Database '{}' already exists, switched to it", name),
        ResultSet::DropDatabase {
            name,
            dropped: true,
        } => format!("Database '{}' dropped", name),
        ResultSet::DropDatabase {
            name,
            dropped: false,
        } => format!("Database '{}' doesn't exist, nothing dropped", name),
        ResultSet::UseDatabase { name } => format!("Database changed to '{}'", name),
        ResultSet::CreateTable {
            table_name,
            created: true,
        } => format!("Table '{}' created", table_name),
        ResultSet::CreateTable {
            table_name,
            created: false,
        } => format!("Table '{}' already exists", table_name),
        ResultSet::AlterTable {
            table_name,
            column_name,
        } => format!("Column '{}' added to table '{}'", column_name, table_name),
        ResultSet::DropTable {
            table_name,
            dropped: true,
        } => format!("Table '{}' dropped", table_name),
        ResultSet::DropTable {
            table_name,
            dropped: false,
        } => format!("Table '{}' doesn't exist, nothing dropped", table_name),
        ResultSet::Transaction {
            command,
            mode: TransactionMode::AutoCommit,
        } => match command {
            TransactionCommand::Start => {
                "Transaction started (auto-commit mode: each statement is applied immediately)"
            }
            TransactionCommand::Commit => {
                "Transaction committed (auto-commit mode: changes were already applied)"
            }
            TransactionCommand::Rollback => {
                "Rollback acknowledged (auto-commit mode: no changes were undone)"
            }
        }
        .to_string(),
        ResultSet::Insert { count, .. } => format!("{} row(s) inserted", count),
        ResultSet::Update { count } => format!("{} row(s) updated", count),
        ResultSet::Delete { count } => format!("{} row(s) deleted", count),
        ResultSet::Scan { rows, .. } => format!("{} row(s) returned", rows.len()),
    }
}
