use crate::{
    error::{Error, Result},
    sql::{
        executor::{
            agg::Aggregate,
            join::NestedLoopJoin,
            mutation::{Delete, Insert, Update},
            query::{Filter, Group, Having, Limit, Offset, Order, Scan, Values},
            schema::{AlterTable, CreateTable, DropTable},
        },
        parser::ast::TransactionCommand,
        plan::{ExecutionPlanNode, Node},
        schema::{Database, Row},
    },
};

mod agg;
mod join;
mod mutation;
mod query;
mod schema;

pub use mutation::update_cell;
pub use schema::{add_table, migrate_table};

/// SQL executor trait
pub trait Executor {
    fn execute(self: Box<Self>, db: &mut Database) -> Result<ResultSet>;
}

/// Builds an executor from a plan node
impl dyn Executor {
    pub fn build(node: Node) -> Box<dyn Executor> {
        match node {
            Node::CreateTable {
                name,
                if_not_exists,
                columns,
                references,
            } => CreateTable::new(name, if_not_exists, columns, references),
            Node::AlterTable {
                table_name,
                column,
                reference,
            } => AlterTable::new(table_name, column, reference),
            Node::DropTable {
                table_name,
                if_exists,
            } => DropTable::new(table_name, if_exists),
            Node::Insert {
                table_name,
                columns,
                values,
            } => Insert::new(table_name, columns, values),
            Node::Update {
                table_name,
                columns,
                filter,
            } => Update::new(table_name, columns, filter),
            Node::Delete { table_name, filter } => Delete::new(table_name, filter),
            Node::Values { columns, rows } => Values::new(columns, rows),
            Node::Scan { table_name } => Scan::new(table_name),
            Node::NestedLoopJoin {
                source,
                left_table,
                join,
            } => NestedLoopJoin::new(Self::build(*source), left_table, join),
            Node::Filter { source, condition } => Filter::new(Self::build(*source), condition),
            Node::Order { source, order_by } => Order::new(Self::build(*source), order_by),
            Node::Aggregate { source, exprs } => Aggregate::new(Self::build(*source), exprs),
            Node::Group { source, column } => Group::new(Self::build(*source), column),
            Node::Having { source, predicate } => Having::new(Self::build(*source), predicate),
            Node::Offset { source, offset } => Offset::new(Self::build(*source), offset),
            Node::Limit { source, limit } => Limit::new(Self::build(*source), limit),
        }
    }
}

/// How transaction statements are honoured. Only auto-commit exists:
/// every statement is applied immediately, and transaction commands are
/// acknowledged without buffering or undoing anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionMode {
    #[default]
    AutoCommit,
}

/// Execution result set
#[derive(Debug, PartialEq)]
pub enum ResultSet {
    CreateDatabase {
        name: String,
        created: bool,
    },
    DropDatabase {
        name: String,
        dropped: bool,
    },
    UseDatabase {
        name: String,
    },
    CreateTable {
        table_name: String,
        created: bool,
    },
    AlterTable {
        table_name: String,
        column_name: String,
    },
    DropTable {
        table_name: String,
        dropped: bool,
    },
    Insert {
        count: usize,
        last_insert_id: Option<i64>,
    },
    Update {
        count: usize,
    },
    Delete {
        count: usize,
    },
    Scan {
        columns: Vec<String>,
        rows: Vec<Row>,
        plan: Option<ExecutionPlanNode>,
    },
    Transaction {
        command: TransactionCommand,
        mode: TransactionMode,
    },
}

impl ResultSet {
    /// Unpacks the rows flowing between query operators
    fn into_scan(self) -> Result<(Vec<String>, Vec<Row>, Option<ExecutionPlanNode>)> {
        match self {
            ResultSet::Scan {
                columns,
                rows,
                plan,
            } => Ok((columns, rows, plan)),
            _ => Err(Error::Internal("Unexpected result set".into())),
        }
    }
}
