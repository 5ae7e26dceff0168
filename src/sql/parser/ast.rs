use std::{collections::BTreeMap, fmt::Display};

use crate::sql::types::DataType;

/// Abstract Syntax Tree (AST) node definitions for SQL statements
#[derive(Debug, PartialEq)]
pub enum Statement {
    CreateDatabase {
        name: String,
        if_not_exists: bool,
    },
    DropDatabase {
        name: String,
        if_exists: bool,
    },
    Use {
        name: String,
    },
    CreateTable {
        name: String,
        if_not_exists: bool,
        columns: Vec<Column>,
        /// Table-level `FOREIGN KEY (col) REFERENCES table(col)` constraints
        foreign_keys: Vec<ForeignKey>,
    },
    /// ALTER TABLE ... ADD [COLUMN]
    AlterTable {
        name: String,
        column: Column,
    },
    DropTable {
        name: String,
        if_exists: bool,
    },
    Insert {
        table_name: String,
        columns: Option<Vec<String>>,
        values: Vec<Vec<Expression>>,
    },
    Select(Select),
    Update {
        table_name: String,
        columns: BTreeMap<String, Expression>,
        where_clause: Option<(String, Expression)>,
    },
    Delete {
        table_name: String,
        where_clause: Option<(String, Expression)>,
    },
    Transaction(TransactionCommand),
}

impl Statement {
    /// Whether a successful run of this statement changes persisted state
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Statement::Select(_) | Statement::Use { .. } | Statement::Transaction(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransactionCommand {
    Start,
    Commit,
    Rollback,
}

/// SELECT statement. Every clause is optional; each may appear at most once.
#[derive(Debug, Default, PartialEq)]
pub struct Select {
    pub items: Vec<SelectItem>,
    pub from: Option<String>,
    pub join: Option<Join>,
    pub where_clause: Option<WhereClause>,
    pub group_by: Option<String>,
    pub having: Option<Predicate>,
    pub order_by: Vec<(String, OrderDirection)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// One entry of the SELECT list
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// `*` or `table.*`
    Wildcard,
    /// Column reference, qualifier already stripped
    Field { name: String, alias: Option<String> },
    /// COUNT/SUM/AVG/MIN/MAX over a column, or over `*` when `column` is None
    Aggregate {
        func: AggregateFunc,
        column: Option<String>,
        alias: Option<String>,
    },
    /// VERSION(), USER(), DATABASE(), NOW(), LAST_INSERT_ID()
    System {
        func: SystemFunc,
        alias: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunc {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_uppercase().as_ref() {
            "COUNT" => AggregateFunc::Count,
            "SUM" => AggregateFunc::Sum,
            "AVG" => AggregateFunc::Avg,
            "MIN" => AggregateFunc::Min,
            "MAX" => AggregateFunc::Max,
            _ => return None,
        })
    }

    /// Textual label used as the output column, e.g. `COUNT(*)`, `SUM(amount)`
    pub fn label(&self, column: Option<&str>) -> String {
        format!("{}({})", self, column.unwrap_or("*"))
    }
}

impl Display for AggregateFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SystemFunc {
    Version,
    User,
    Database,
    Now,
    LastInsertId,
}

impl SystemFunc {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_uppercase().as_ref() {
            "VERSION" => SystemFunc::Version,
            "USER" | "CURRENT_USER" => SystemFunc::User,
            "DATABASE" => SystemFunc::Database,
            "NOW" => SystemFunc::Now,
            "LAST_INSERT_ID" => SystemFunc::LastInsertId,
            _ => return None,
        })
    }
}

impl Display for SystemFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SystemFunc::Version => "VERSION()",
            SystemFunc::User => "USER()",
            SystemFunc::Database => "DATABASE()",
            SystemFunc::Now => "NOW()",
            SystemFunc::LastInsertId => "LAST_INSERT_ID()",
        })
    }
}

/// FROM ... [INNER|LEFT] JOIN table ON left = right
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: String,
    pub join_type: JoinType,
    /// Column read from the accumulated (left) rows
    pub left: String,
    /// Column read from the joined table's rows
    pub right: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JoinType {
    Inner,
    Left,
}

/// WHERE clause as written: a first condition followed by connective/condition
/// pairs, evaluated strictly left to right with no precedence.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub first: Predicate,
    pub rest: Vec<(Connective, Predicate)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Connective {
    And,
    Or,
}

/// Atomic condition `column operator value`
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub operator: Operator,
    pub value: Consts,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operator {
    Equal,
    GreaterThan,
    LessThan,
    Like,
}

impl Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Operator::Equal => "=",
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::Like => "LIKE",
        })
    }
}

/// Sort direction (ascending or descending)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// Column definition for CREATE TABLE / ALTER TABLE ADD COLUMN
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub datatype: DataType,
    pub length: Option<u32>,
    pub nullable: Option<bool>,
    pub default: Option<Expression>,
    pub primary_key: bool,
    pub unique: bool,
    pub auto_increment: bool,
    /// Inline `REFERENCES table(column)`
    pub references: Option<(String, String)>,
}

/// Table-level `FOREIGN KEY (column) REFERENCES table(ref_column)`
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub column: String,
    pub table: String,
    pub ref_column: String,
}

/// Value expressions accepted in INSERT, UPDATE SET and DEFAULT
#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    /// Constant value
    Consts(Consts),
    /// Session-dependent function such as NOW() or LAST_INSERT_ID()
    Function(SystemFunc),
}

/// Implements From trait to convert Consts into Expression
impl From<Consts> for Expression {
    fn from(value: Consts) -> Self {
        Self::Consts(value)
    }
}

/// Constant values in SQL expressions
#[derive(Debug, PartialEq, Clone)]
pub enum Consts {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Display for Consts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Consts::Null => write!(f, "NULL"),
            Consts::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Consts::Integer(i) => write!(f, "{}", i),
            Consts::Float(v) => write!(f, "{}", v),
            Consts::String(s) => write!(f, "'{}'", s),
        }
    }
}
