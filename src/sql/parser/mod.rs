use std::collections::BTreeMap;
use std::iter::Peekable;

use crate::error::{Error, Result};
use crate::sql::parser::ast::{
    AggregateFunc, Column, Connective, Consts, Expression, ForeignKey, Join, JoinType, Operator,
    OrderDirection, Predicate, Select, SelectItem, SystemFunc, TransactionCommand, WhereClause,
};
use crate::sql::parser::lexer::{Keyword, Lexer, Token};
use crate::sql::types::DataType;

pub mod ast;
mod lexer;
pub mod script;

/// SQL Parser - Converts tokens into Abstract Syntax Tree (AST)
pub struct Parser<'a> {
    lexer: Peekable<Lexer<'a>>,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for a single statement
    pub fn new(input: &'a str) -> Self {
        Parser {
            lexer: Lexer::new(input).peekable(),
        }
    }

    /// Parses the input into one statement. A trailing semicolon is optional.
    pub fn parse(&mut self) -> Result<ast::Statement> {
        let stmt = self.parse_statement()?;
        self.next_if_token(Token::Semicolon);
        // No tokens allowed after the statement
        if let Some(token) = self.peek()? {
            return Err(Error::Parse(format!("Unexpected token {}", token)));
        }
        Ok(stmt)
    }

    /// Classifies the statement by its leading keyword
    fn parse_statement(&mut self) -> Result<ast::Statement> {
        match self.peek()? {
            Some(Token::Keyword(Keyword::Create)) => self.parse_create(),
            Some(Token::Keyword(Keyword::Drop)) => self.parse_drop(),
            Some(Token::Keyword(Keyword::Alter)) => self.parse_alter_table(),
            Some(Token::Keyword(Keyword::Use)) => self.parse_use(),
            Some(Token::Keyword(Keyword::Select)) => self.parse_select(),
            Some(Token::Keyword(Keyword::Insert)) => self.parse_insert(),
            Some(Token::Keyword(Keyword::Update)) => self.parse_update(),
            Some(Token::Keyword(Keyword::Delete)) => self.parse_delete(),
            Some(Token::Keyword(
                Keyword::Start | Keyword::Begin | Keyword::Commit | Keyword::Rollback,
            )) => self.parse_transaction(),
            Some(t) => Err(Error::Parse(format!("Unsupported SQL command: {}", t))),
            None => Err(Error::Parse("Unexpected end of input".into())),
        }
    }

    /// Parses CREATE DATABASE / CREATE TABLE
    fn parse_create(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Create))?;
        match self.next()? {
            Token::Keyword(Keyword::Database) => {
                let if_not_exists = self.parse_if_not_exists()?;
                Ok(ast::Statement::CreateDatabase {
                    name: self.next_ident()?,
                    if_not_exists,
                })
            }
            Token::Keyword(Keyword::Table) => self.parse_ddl_create_table(),
            token => Err(Error::Parse(format!("Unsupported SQL command: CREATE {}", token))),
        }
    }

    /// Parses DROP DATABASE / DROP TABLE
    fn parse_drop(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Drop))?;
        match self.next()? {
            Token::Keyword(Keyword::Database) => {
                let if_exists = self.parse_if_exists()?;
                Ok(ast::Statement::DropDatabase {
                    name: self.next_ident()?,
                    if_exists,
                })
            }
            Token::Keyword(Keyword::Table) => {
                let if_exists = self.parse_if_exists()?;
                Ok(ast::Statement::DropTable {
                    name: self.next_ident()?,
                    if_exists,
                })
            }
            token => Err(Error::Parse(format!("Unsupported SQL command: DROP {}", token))),
        }
    }

    fn parse_if_not_exists(&mut self) -> Result<bool> {
        if self.next_if_token(Token::Keyword(Keyword::If)).is_none() {
            return Ok(false);
        }
        self.next_expect(Token::Keyword(Keyword::Not))?;
        self.next_expect(Token::Keyword(Keyword::Exists))?;
        Ok(true)
    }

    fn parse_if_exists(&mut self) -> Result<bool> {
        if self.next_if_token(Token::Keyword(Keyword::If)).is_none() {
            return Ok(false);
        }
        self.next_expect(Token::Keyword(Keyword::Exists))?;
        Ok(true)
    }

    fn parse_use(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Use))?;
        Ok(ast::Statement::Use {
            name: self.next_ident()?,
        })
    }

    fn parse_transaction(&mut self) -> Result<ast::Statement> {
        let command = match self.next()? {
            Token::Keyword(Keyword::Start) => {
                self.next_expect(Token::Keyword(Keyword::Transaction))?;
                TransactionCommand::Start
            }
            Token::Keyword(Keyword::Begin) => {
                self.next_if_token(Token::Keyword(Keyword::Transaction));
                TransactionCommand::Start
            }
            Token::Keyword(Keyword::Commit) => TransactionCommand::Commit,
            Token::Keyword(Keyword::Rollback) => TransactionCommand::Rollback,
            token => return Err(Error::Parse(format!("Unexpected token {}", token))),
        };
        Ok(ast::Statement::Transaction(command))
    }

    /// Parses CREATE TABLE statement
    fn parse_ddl_create_table(&mut self) -> Result<ast::Statement> {
        let if_not_exists = self.parse_if_not_exists()?;
        let table_name = self.next_ident()?;
        self.next_expect(Token::OpenParen)?;

        let mut columns = Vec::new();
        let mut foreign_keys = Vec::new();
        let mut primary_keys = Vec::new();
        let mut uniques = Vec::new();
        loop {
            match self.peek()? {
                Some(Token::Keyword(Keyword::Foreign)) => {
                    foreign_keys.push(self.parse_ddl_foreign_key()?)
                }
                Some(Token::Keyword(Keyword::Primary)) => {
                    self.next()?;
                    self.next_expect(Token::Keyword(Keyword::Key))?;
                    primary_keys.extend(self.parse_ident_list()?);
                }
                Some(Token::Keyword(Keyword::Unique)) => {
                    self.next()?;
                    self.next_if_token(Token::Keyword(Keyword::Key));
                    uniques.extend(self.parse_ident_list()?);
                }
                _ => columns.push(self.parse_ddl_column()?),
            }
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }
        self.next_expect(Token::CloseParen)?;

        // Table-level PRIMARY KEY (..) / UNIQUE (..) land on their columns
        for (names, primary) in [(primary_keys, true), (uniques, false)] {
            for name in names {
                let column = columns
                    .iter_mut()
                    .find(|c: &&mut Column| c.name == name)
                    .ok_or_else(|| Error::Parse(format!("Key column '{}' doesn't exist in table", name)))?;
                if primary {
                    column.primary_key = true;
                } else {
                    column.unique = true;
                }
            }
        }

        Ok(ast::Statement::CreateTable {
            name: table_name,
            if_not_exists,
            columns,
            foreign_keys,
        })
    }

    /// Parses `FOREIGN KEY (col) REFERENCES table(col)`
    fn parse_ddl_foreign_key(&mut self) -> Result<ForeignKey> {
        self.next_expect(Token::Keyword(Keyword::Foreign))?;
        self.next_expect(Token::Keyword(Keyword::Key))?;
        self.next_expect(Token::OpenParen)?;
        let column = self.next_ident()?;
        self.next_expect(Token::CloseParen)?;
        self.next_expect(Token::Keyword(Keyword::References))?;
        let (table, ref_column) = self.parse_reference()?;
        Ok(ForeignKey {
            column,
            table,
            ref_column,
        })
    }

    /// Parses `table(column)` after REFERENCES
    fn parse_reference(&mut self) -> Result<(String, String)> {
        let table = self.next_ident()?;
        self.next_expect(Token::OpenParen)?;
        let column = self.next_ident()?;
        self.next_expect(Token::CloseParen)?;
        Ok((table, column))
    }

    /// Parses a parenthesized, comma-separated identifier list
    fn parse_ident_list(&mut self) -> Result<Vec<String>> {
        self.next_expect(Token::OpenParen)?;
        let mut idents = Vec::new();
        loop {
            idents.push(self.next_ident()?);
            match self.next()? {
                Token::CloseParen => break,
                Token::Comma => {}
                token => return Err(Error::Parse(format!("Unexpected token {}", token))),
            }
        }
        Ok(idents)
    }

    /// Parses column definition in CREATE TABLE / ALTER TABLE
    fn parse_ddl_column(&mut self) -> Result<Column> {
        let name = self.next_ident()?;
        let datatype = match self.next()? {
            Token::Ident(type_name) => DataType::from_name(&type_name)?,
            token => return Err(Error::Parse(format!("Unsupported data type: {}", token))),
        };
        let mut column = Column {
            name,
            datatype,
            length: None,
            nullable: None,
            default: None,
            primary_key: false,
            unique: false,
            auto_increment: false,
            references: None,
        };

        // VARCHAR(50), DECIMAL(10, 2): the first number is kept as the length
        if self.next_if_token(Token::OpenParen).is_some() {
            column.length = Some(self.next_number()?);
            if self.next_if_token(Token::Comma).is_some() {
                self.next_number::<u32>()?;
            }
            self.next_expect(Token::CloseParen)?;
        }

        // Parse column constraints
        while let Some(Token::Keyword(keyword)) = self.next_if_keyword() {
            match keyword {
                Keyword::Null => column.nullable = Some(true),
                Keyword::Not => {
                    self.next_expect(Token::Keyword(Keyword::Null))?;
                    column.nullable = Some(false);
                }
                Keyword::Default => column.default = Some(self.parse_expression()?),
                Keyword::Primary => {
                    self.next_expect(Token::Keyword(Keyword::Key))?;
                    column.primary_key = true;
                }
                Keyword::Unique => {
                    self.next_if_token(Token::Keyword(Keyword::Key));
                    column.unique = true;
                }
                Keyword::AutoIncrement => column.auto_increment = true,
                Keyword::References => column.references = Some(self.parse_reference()?),
                k => return Err(Error::Parse(format!("Unexpected keyword {}", k))),
            }
        }

        Ok(column)
    }

    /// Parses ALTER TABLE name ADD [COLUMN] definition
    fn parse_alter_table(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Alter))?;
        self.next_expect(Token::Keyword(Keyword::Table))?;
        let name = self.next_ident()?;
        match self.next()? {
            Token::Keyword(Keyword::Add) => {
                self.next_if_token(Token::Keyword(Keyword::Column));
                Ok(ast::Statement::AlterTable {
                    name,
                    column: self.parse_ddl_column()?,
                })
            }
            token => Err(Error::Parse(format!(
                "Unsupported ALTER TABLE operation {}, only ADD COLUMN is supported",
                token
            ))),
        }
    }

    /// Parses SELECT statement. Clauses after the select list may come in any order.
    fn parse_select(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Select))?;
        let mut select = Select {
            items: self.parse_select_items()?,
            ..Default::default()
        };

        loop {
            match self.peek()? {
                Some(Token::Keyword(Keyword::From)) => {
                    self.next()?;
                    if select.from.is_some() {
                        return Err(Error::Parse("Duplicate FROM clause".into()));
                    }
                    select.from = Some(self.parse_table_ref()?);
                }
                Some(Token::Keyword(Keyword::Join | Keyword::Inner | Keyword::Left)) => {
                    if select.join.is_some() {
                        return Err(Error::Parse("Only one JOIN is supported".into()));
                    }
                    select.join = Some(self.parse_join()?);
                }
                Some(Token::Keyword(Keyword::Where)) => {
                    self.next()?;
                    if select.where_clause.is_some() {
                        return Err(Error::Parse("Duplicate WHERE clause".into()));
                    }
                    select.where_clause = Some(self.parse_where_conditions()?);
                }
                Some(Token::Keyword(Keyword::Group)) => {
                    self.next()?;
                    self.next_expect(Token::Keyword(Keyword::By))?;
                    if select.group_by.is_some() {
                        return Err(Error::Parse("Duplicate GROUP BY clause".into()));
                    }
                    select.group_by = Some(self.parse_operand_name()?);
                }
                Some(Token::Keyword(Keyword::Having)) => {
                    self.next()?;
                    if select.having.is_some() {
                        return Err(Error::Parse("Duplicate HAVING clause".into()));
                    }
                    select.having = Some(self.parse_predicate()?);
                }
                Some(Token::Keyword(Keyword::Order)) => {
                    self.next()?;
                    self.next_expect(Token::Keyword(Keyword::By))?;
                    if !select.order_by.is_empty() {
                        return Err(Error::Parse("Duplicate ORDER BY clause".into()));
                    }
                    select.order_by = self.parse_order_by()?;
                }
                Some(Token::Keyword(Keyword::Limit)) => {
                    self.next()?;
                    if select.limit.is_some() {
                        return Err(Error::Parse("Duplicate LIMIT clause".into()));
                    }
                    let first = self.next_number()?;
                    // MySQL form: LIMIT offset, count
                    if self.next_if_token(Token::Comma).is_some() {
                        select.offset = Some(first);
                        select.limit = Some(self.next_number()?);
                    } else {
                        select.limit = Some(first);
                    }
                }
                Some(Token::Keyword(Keyword::Offset)) => {
                    self.next()?;
                    select.offset = Some(self.next_number()?);
                }
                _ => break,
            }
        }

        let needs_table = select
            .items
            .iter()
            .any(|item| !matches!(item, SelectItem::System { .. }));
        if select.from.is_none() && (needs_table || select.join.is_some()) {
            return Err(Error::Parse("Missing FROM clause".into()));
        }
        Ok(ast::Statement::Select(select))
    }

    /// Table name with an optional alias, the alias is discarded
    fn parse_table_ref(&mut self) -> Result<String> {
        let name = self.next_ident()?;
        if self.next_if_token(Token::Keyword(Keyword::As)).is_some() {
            self.next_ident()?;
        } else {
            self.next_if(|t| matches!(t, Token::Ident(_)));
        }
        Ok(name)
    }

    fn parse_select_items(&mut self) -> Result<Vec<SelectItem>> {
        let mut items = Vec::new();
        loop {
            items.push(self.parse_select_item()?);
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }
        Ok(items)
    }

    fn parse_select_item(&mut self) -> Result<SelectItem> {
        let item = match self.next()? {
            Token::Asterisk => return Ok(SelectItem::Wildcard),
            Token::Keyword(Keyword::Database) => {
                self.parse_empty_args()?;
                SelectItem::System {
                    func: SystemFunc::Database,
                    alias: None,
                }
            }
            Token::Ident(name) if self.next_if_token(Token::OpenParen).is_some() => {
                if let Some(func) = AggregateFunc::from_name(&name) {
                    let column = self.parse_aggregate_arg(func)?;
                    SelectItem::Aggregate {
                        func,
                        column,
                        alias: None,
                    }
                } else if let Some(func) = SystemFunc::from_name(&name) {
                    self.next_expect(Token::CloseParen)?;
                    SelectItem::System { func, alias: None }
                } else {
                    return Err(Error::Parse(format!("Unsupported function {}()", name)));
                }
            }
            Token::Ident(name) => {
                if self.next_if_token(Token::Period).is_some() {
                    match self.next()? {
                        Token::Asterisk => return Ok(SelectItem::Wildcard),
                        Token::Ident(column) => SelectItem::Field {
                            name: column,
                            alias: None,
                        },
                        token => return Err(Error::Parse(format!("Unexpected token {}", token))),
                    }
                } else {
                    SelectItem::Field { name, alias: None }
                }
            }
            token => return Err(Error::Parse(format!("Unexpected token {} in select list", token))),
        };

        let alias = self.parse_alias()?;
        Ok(match item {
            SelectItem::Field { name, .. } => SelectItem::Field { name, alias },
            SelectItem::Aggregate { func, column, .. } => SelectItem::Aggregate { func, column, alias },
            SelectItem::System { func, .. } => SelectItem::System { func, alias },
            SelectItem::Wildcard => SelectItem::Wildcard,
        })
    }

    fn parse_alias(&mut self) -> Result<Option<String>> {
        if self.next_if_token(Token::Keyword(Keyword::As)).is_some() {
            return Ok(Some(self.next_ident()?));
        }
        Ok(match self.next_if(|t| matches!(t, Token::Ident(_))) {
            Some(Token::Ident(alias)) => Some(alias),
            _ => None,
        })
    }

    /// Parses `*)` or `column)` after an aggregate function name
    fn parse_aggregate_arg(&mut self, func: AggregateFunc) -> Result<Option<String>> {
        let column = if self.next_if_token(Token::Asterisk).is_some() {
            if func != AggregateFunc::Count {
                return Err(Error::Parse(format!("{}(*) is not supported", func)));
            }
            None
        } else {
            Some(self.parse_column_ref()?)
        };
        self.next_expect(Token::CloseParen)?;
        Ok(column)
    }

    fn parse_empty_args(&mut self) -> Result<()> {
        self.next_expect(Token::OpenParen)?;
        self.next_expect(Token::CloseParen)
    }

    /// Parses `[INNER|LEFT [OUTER]] JOIN table ON a = b`
    fn parse_join(&mut self) -> Result<Join> {
        let join_type = match self.next()? {
            Token::Keyword(Keyword::Join) => JoinType::Inner,
            Token::Keyword(Keyword::Inner) => {
                self.next_expect(Token::Keyword(Keyword::Join))?;
                JoinType::Inner
            }
            Token::Keyword(Keyword::Left) => {
                self.next_if_token(Token::Keyword(Keyword::Outer));
                self.next_expect(Token::Keyword(Keyword::Join))?;
                JoinType::Left
            }
            token => return Err(Error::Parse(format!("Unexpected token {}", token))),
        };
        let table = self.parse_table_ref()?;
        self.next_expect(Token::Keyword(Keyword::On))?;
        let left = self.parse_column_ref()?;
        self.next_expect(Token::Equal)?;
        let right = self.parse_column_ref()?;
        Ok(Join {
            table,
            join_type,
            left,
            right,
        })
    }

    /// Parses `cond (AND|OR cond)*` without precedence
    fn parse_where_conditions(&mut self) -> Result<WhereClause> {
        let first = self.parse_predicate()?;
        let mut rest = Vec::new();
        loop {
            let connective = match self.peek()? {
                Some(Token::Keyword(Keyword::And)) => Connective::And,
                Some(Token::Keyword(Keyword::Or)) => Connective::Or,
                _ => break,
            };
            self.next()?;
            rest.push((connective, self.parse_predicate()?));
        }
        Ok(WhereClause { first, rest })
    }

    /// Parses `column (=|>|<|LIKE) literal`
    fn parse_predicate(&mut self) -> Result<Predicate> {
        let column = self.parse_operand_name()?;
        let operator = match self.next()? {
            Token::Equal => Operator::Equal,
            Token::GreaterThan => Operator::GreaterThan,
            Token::LessThan => Operator::LessThan,
            Token::Keyword(Keyword::Like) => Operator::Like,
            token => return Err(Error::Parse(format!("Unsupported operator {}", token))),
        };
        let value = self.parse_condition_value()?;
        Ok(Predicate {
            column,
            operator,
            value,
        })
    }

    /// A condition value: a literal, or a bare word taken as text
    fn parse_condition_value(&mut self) -> Result<Consts> {
        match self.peek()? {
            Some(Token::Ident(word)) => {
                self.next()?;
                Ok(Consts::String(word))
            }
            _ => self.parse_literal(),
        }
    }

    fn parse_order_by(&mut self) -> Result<Vec<(String, OrderDirection)>> {
        let mut order_by = Vec::new();
        loop {
            let column = self.parse_operand_name()?;
            let direction = match self.next_if_token(Token::Keyword(Keyword::Desc)) {
                Some(_) => OrderDirection::Desc,
                None => {
                    self.next_if_token(Token::Keyword(Keyword::Asc));
                    OrderDirection::Asc
                }
            };
            order_by.push((column, direction));
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }
        Ok(order_by)
    }

    /// Column reference with the `table.` qualifier stripped
    fn parse_column_ref(&mut self) -> Result<String> {
        let mut name = self.next_ident()?;
        if self.next_if_token(Token::Period).is_some() {
            name = self.next_ident()?;
        }
        Ok(name)
    }

    /// Column reference or aggregate label such as `SUM(amount)`
    fn parse_operand_name(&mut self) -> Result<String> {
        let name = self.next_ident()?;
        if self.next_if_token(Token::OpenParen).is_some() {
            let func = AggregateFunc::from_name(&name)
                .ok_or_else(|| Error::Parse(format!("Unsupported function {}()", name)))?;
            let column = self.parse_aggregate_arg(func)?;
            return Ok(func.label(column.as_deref()));
        }
        if self.next_if_token(Token::Period).is_some() {
            return self.next_ident();
        }
        Ok(name)
    }

    /// Parses INSERT statement
    fn parse_insert(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Insert))?;
        self.next_expect(Token::Keyword(Keyword::Into))?;

        let table_name = self.next_ident()?;

        // Check if specific columns are specified
        let columns = if self.peek()? == Some(Token::OpenParen) {
            Some(self.parse_ident_list()?)
        } else {
            None
        };

        self.next_expect(Token::Keyword(Keyword::Values))?;
        // Parse multiple value rows: INSERT INTO tbl VALUES (1,2),(3,4);
        let mut values = Vec::new();
        loop {
            self.next_expect(Token::OpenParen)?;
            let mut exprs = Vec::new();
            loop {
                exprs.push(self.parse_expression()?);
                match self.next()? {
                    Token::CloseParen => break,
                    Token::Comma => {}
                    token => {
                        return Err(Error::Parse(format!("Unexpected token {}", token)));
                    }
                }
            }
            values.push(exprs);
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }
        Ok(ast::Statement::Insert {
            table_name,
            columns,
            values,
        })
    }

    /// Parses UPDATE statement
    fn parse_update(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Update))?;
        let table_name = self.next_ident()?;
        self.next_expect(Token::Keyword(Keyword::Set))?;

        let mut columns = BTreeMap::new();
        loop {
            let col = self.parse_column_ref()?;
            self.next_expect(Token::Equal)?;
            let value = self.parse_expression()?;
            if columns.contains_key(&col) {
                return Err(Error::Parse(format!("Duplicate column {} for update", col)));
            }
            columns.insert(col, value);
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }
        Ok(ast::Statement::Update {
            table_name,
            columns,
            where_clause: self.parse_where_clause()?,
        })
    }

    /// Parses DELETE statement
    fn parse_delete(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Delete))?;
        self.next_expect(Token::Keyword(Keyword::From))?;
        let table_name = self.next_ident()?;
        Ok(ast::Statement::Delete {
            table_name,
            where_clause: self.parse_where_clause()?,
        })
    }

    /// Parses the single-equality WHERE of UPDATE and DELETE: column = expr
    fn parse_where_clause(&mut self) -> Result<Option<(String, Expression)>> {
        if self.next_if_token(Token::Keyword(Keyword::Where)).is_none() {
            return Ok(None);
        }
        let col = self.parse_column_ref()?;
        self.next_expect(Token::Equal)?;
        let val = match self.peek()? {
            Some(Token::Ident(word)) => {
                self.next()?;
                if self.next_if_token(Token::OpenParen).is_some() {
                    self.next_expect(Token::CloseParen)?;
                    let func = SystemFunc::from_name(&word)
                        .ok_or_else(|| Error::Parse(format!("Unsupported function {}()", word)))?;
                    Expression::Function(func)
                } else {
                    Consts::String(word).into()
                }
            }
            _ => self.parse_expression()?,
        };
        if let Some(Token::Keyword(k @ (Keyword::And | Keyword::Or))) = self.peek()? {
            return Err(Error::Parse(format!(
                "{} is not supported here, only a single equality condition",
                k
            )));
        }
        Ok(Some((col, val)))
    }

    /// Parses a value expression: a literal or a session function
    fn parse_expression(&mut self) -> Result<Expression> {
        match self.peek()? {
            Some(Token::Keyword(Keyword::CurrentTimestamp)) => {
                self.next()?;
                // CURRENT_TIMESTAMP() is accepted too
                if self.next_if_token(Token::OpenParen).is_some() {
                    self.next_expect(Token::CloseParen)?;
                }
                Ok(Expression::Function(SystemFunc::Now))
            }
            Some(Token::Keyword(Keyword::Database)) => {
                self.next()?;
                self.parse_empty_args()?;
                Ok(Expression::Function(SystemFunc::Database))
            }
            Some(Token::Ident(name)) => {
                self.next()?;
                let func = SystemFunc::from_name(&name)
                    .ok_or_else(|| Error::Parse(format!("Unexpected expression token {}", name)))?;
                self.parse_empty_args()?;
                Ok(Expression::Function(func))
            }
            _ => Ok(self.parse_literal()?.into()),
        }
    }

    /// Parses a constant
    fn parse_literal(&mut self) -> Result<Consts> {
        Ok(match self.next()? {
            Token::Number(n) => Self::parse_number(&n)?,
            Token::Minus => match self.next()? {
                Token::Number(n) => match Self::parse_number(&n)? {
                    Consts::Integer(i) => Consts::Integer(-i),
                    Consts::Float(f) => Consts::Float(-f),
                    c => c,
                },
                t => return Err(Error::Parse(format!("Unexpected expression token -{}", t))),
            },
            Token::String(s) => Consts::String(s),
            Token::Keyword(Keyword::True) => Consts::Boolean(true),
            Token::Keyword(Keyword::False) => Consts::Boolean(false),
            Token::Keyword(Keyword::Null) => Consts::Null,
            t => return Err(Error::Parse(format!("Unexpected expression token {}", t))),
        })
    }

    /// Lexer scans both 123 and 123.45 as Token::Number(String)
    fn parse_number(n: &str) -> Result<Consts> {
        Ok(if n.chars().all(|c| c.is_ascii_digit()) {
            Consts::Integer(n.parse()?)
        } else {
            Consts::Float(n.parse()?)
        })
    }

    /// Expects and consumes an unsigned integer literal
    fn next_number<T: std::str::FromStr<Err = std::num::ParseIntError>>(&mut self) -> Result<T> {
        match self.next()? {
            Token::Number(n) => Ok(n.parse::<T>()?),
            token => Err(Error::Parse(format!("Expected number, got {}", token))),
        }
    }

    /// Peeks at the next token
    fn peek(&mut self) -> Result<Option<Token>> {
        match self.lexer.peek() {
            Some(Ok(token)) => Ok(Some(token.clone())),
            // a lexing error is taken out of the stream and reported
            Some(Err(_)) => match self.lexer.next() {
                Some(Err(err)) => Err(err),
                _ => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// Consumes and returns the next token
    fn next(&mut self) -> Result<Token> {
        self.lexer
            .next()
            .unwrap_or_else(|| Err(Error::Parse("Unexpected end of input".into())))
    }

    /// Expects and consumes an identifier
    fn next_ident(&mut self) -> Result<String> {
        match self.next()? {
            Token::Ident(ident) => Ok(ident),
            token => Err(Error::Parse(format!("Expected identifier, got {}", token))),
        }
    }

    /// Expects a specific token, returns error if different
    fn next_expect(&mut self, expect: Token) -> Result<()> {
        let token = self.next()?;
        if token != expect {
            return Err(Error::Parse(format!("Expected {}, got {}", expect, token)));
        }
        Ok(())
    }

    /// Consumes next token if it satisfies the predicate
    fn next_if<F: Fn(&Token) -> bool>(&mut self, predicate: F) -> Option<Token> {
        self.peek().unwrap_or(None).filter(|t| predicate(t))?;
        self.next().ok()
    }

    /// Consumes next token if it's a keyword
    fn next_if_keyword(&mut self) -> Option<Token> {
        self.next_if(|t| matches!(t, Token::Keyword(_)))
    }

    /// Consumes next token if it matches the given token
    fn next_if_token(&mut self, token: Token) -> Option<Token> {
        self.next_if(|t| t == &token)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::Result,
        sql::parser::ast::{
            self, AggregateFunc, Connective, Consts, Expression, JoinType, Operator, OrderDirection,
            Predicate, SelectItem, SystemFunc,
        },
        sql::types::DataType,
    };

    use super::Parser;

    #[test]
    fn test_parser_create_table() -> Result<()> {
        let sql1 = "
            create table orders (
                order_id INT AUTO_INCREMENT PRIMARY KEY,
                user_id INT,
                amount DECIMAL(10, 2) not null default 0,
                FOREIGN KEY (user_id) REFERENCES users(user_id)
            );
        ";
        let stmt1 = Parser::new(sql1).parse()?;

        let sql2 = "
        create            table orders (
            order_id   INT AUTO_INCREMENT   PRIMARY KEY,
            user_id INT  ,
            amount DECIMAL(10,2) NOT NULL DEFAULT     0,
            foreign key(user_id) references users (user_id)
        )
        ";
        let stmt2 = Parser::new(sql2).parse()?;
        assert_eq!(stmt1, stmt2);

        match stmt1 {
            ast::Statement::CreateTable {
                name,
                columns,
                foreign_keys,
                ..
            } => {
                assert_eq!(name, "orders");
                assert_eq!(columns.len(), 3);
                assert!(columns[0].primary_key && columns[0].auto_increment);
                assert_eq!(columns[2].datatype, DataType::Decimal);
                assert_eq!(columns[2].length, Some(10));
                assert_eq!(columns[2].nullable, Some(false));
                assert_eq!(columns[2].default, Some(Consts::Integer(0).into()));
                assert_eq!(foreign_keys.len(), 1);
                assert_eq!(foreign_keys[0].table, "users");
            }
            stmt => panic!("unexpected statement {:?}", stmt),
        }

        assert!(Parser::new("create table t (a BLOB)").parse().is_err());
        Ok(())
    }

    #[test]
    fn test_parser_insert() -> Result<()> {
        let stmt1 = Parser::new("insert into tbl1 values (1, -2, 3.5, 'a', true, null);").parse()?;
        assert_eq!(
            stmt1,
            ast::Statement::Insert {
                table_name: "tbl1".to_string(),
                columns: None,
                values: vec![vec![
                    Consts::Integer(1).into(),
                    Consts::Integer(-2).into(),
                    Consts::Float(3.5).into(),
                    Consts::String("a".to_string()).into(),
                    Consts::Boolean(true).into(),
                    Consts::Null.into(),
                ]],
            }
        );

        let stmt2 = Parser::new("insert into tbl2 (c1, c2) values (3, NOW()),(LAST_INSERT_ID(), 'b')").parse()?;
        assert_eq!(
            stmt2,
            ast::Statement::Insert {
                table_name: "tbl2".to_string(),
                columns: Some(vec!["c1".to_string(), "c2".to_string()]),
                values: vec![
                    vec![Consts::Integer(3).into(), Expression::Function(SystemFunc::Now)],
                    vec![
                        Expression::Function(SystemFunc::LastInsertId),
                        Consts::String("b".to_string()).into(),
                    ],
                ],
            }
        );
        Ok(())
    }

    #[test]
    fn test_parser_select() -> Result<()> {
        let stmt = Parser::new(
            "SELECT users.username, orders.amount FROM users LEFT JOIN orders ON users.user_id = orders.user_id \
             WHERE amount > 40 AND user_id = 1 OR email LIKE '%@example.com' ORDER BY amount DESC LIMIT 2",
        )
        .parse()?;
        let ast::Statement::Select(select) = stmt else {
            panic!("expected select");
        };
        assert_eq!(select.from.as_deref(), Some("users"));
        let join = select.join.expect("join");
        assert_eq!(join.join_type, JoinType::Left);
        assert_eq!((join.left.as_str(), join.right.as_str()), ("user_id", "user_id"));
        let where_clause = select.where_clause.expect("where");
        assert_eq!(where_clause.first.operator, Operator::GreaterThan);
        assert_eq!(where_clause.rest.len(), 2);
        assert_eq!(where_clause.rest[0].0, Connective::And);
        assert_eq!(where_clause.rest[1].0, Connective::Or);
        assert_eq!(where_clause.rest[1].1.operator, Operator::Like);
        assert_eq!(select.order_by, vec![("amount".to_string(), OrderDirection::Desc)]);
        assert_eq!(select.limit, Some(2));
        Ok(())
    }

    #[test]
    fn test_parser_select_clause_order_insensitive() -> Result<()> {
        let a = Parser::new("SELECT * FROM t LIMIT 3 WHERE id = 1").parse()?;
        let b = Parser::new("SELECT * FROM t WHERE id = 1 LIMIT 3").parse()?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn test_parser_aggregates() -> Result<()> {
        let stmt = Parser::new(
            "SELECT user_id, SUM(amount) AS total_spent FROM orders GROUP BY user_id HAVING total_spent > 30.00",
        )
        .parse()?;
        let ast::Statement::Select(select) = stmt else {
            panic!("expected select");
        };
        assert_eq!(
            select.items[1],
            SelectItem::Aggregate {
                func: AggregateFunc::Sum,
                column: Some("amount".to_string()),
                alias: Some("total_spent".to_string()),
            }
        );
        assert_eq!(select.group_by.as_deref(), Some("user_id"));
        assert_eq!(
            select.having,
            Some(Predicate {
                column: "total_spent".to_string(),
                operator: Operator::GreaterThan,
                value: Consts::Float(30.0),
            })
        );

        let stmt = Parser::new("SELECT COUNT(*) FROM t HAVING COUNT(*) > 1").parse()?;
        let ast::Statement::Select(select) = stmt else {
            panic!("expected select");
        };
        assert_eq!(select.having.map(|p| p.column), Some("COUNT(*)".to_string()));
        assert!(Parser::new("SELECT SUM(*) FROM t").parse().is_err());
        Ok(())
    }

    #[test]
    fn test_parser_system_functions() -> Result<()> {
        let stmt = Parser::new("SELECT VERSION(), DATABASE(), now() AS ts").parse()?;
        let ast::Statement::Select(select) = stmt else {
            panic!("expected select");
        };
        assert_eq!(select.from, None);
        assert_eq!(select.items.len(), 3);
        assert!(Parser::new("SELECT id").parse().is_err());
        Ok(())
    }

    #[test]
    fn test_parser_update_delete() -> Result<()> {
        let stmt = Parser::new("UPDATE users SET email = 'a@b.c' WHERE username = 'alice_dev'").parse()?;
        match stmt {
            ast::Statement::Update {
                columns,
                where_clause,
                ..
            } => {
                assert_eq!(columns.len(), 1);
                assert_eq!(
                    where_clause,
                    Some(("username".to_string(), Consts::String("alice_dev".to_string()).into()))
                );
            }
            stmt => panic!("unexpected statement {:?}", stmt),
        }
        assert!(Parser::new("UPDATE t SET a = 1, a = 2").parse().is_err());
        assert!(Parser::new("DELETE FROM t WHERE a = 1 AND b = 2").parse().is_err());
        assert_eq!(
            Parser::new("DELETE FROM t").parse()?,
            ast::Statement::Delete {
                table_name: "t".to_string(),
                where_clause: None
            }
        );
        Ok(())
    }

    #[test]
    fn test_parser_misc_statements() -> Result<()> {
        assert_eq!(
            Parser::new("CREATE DATABASE IF NOT EXISTS test_db").parse()?,
            ast::Statement::CreateDatabase {
                name: "test_db".to_string(),
                if_not_exists: true
            }
        );
        assert_eq!(
            Parser::new("use test_db;").parse()?,
            ast::Statement::Use {
                name: "test_db".to_string()
            }
        );
        assert_eq!(
            Parser::new("START TRANSACTION").parse()?,
            ast::Statement::Transaction(ast::TransactionCommand::Start)
        );
        assert!(matches!(
            Parser::new("ALTER TABLE users ADD COLUMN is_active BOOLEAN DEFAULT TRUE").parse()?,
            ast::Statement::AlterTable { .. }
        ));
        let err = Parser::new("GRANT ALL ON x").parse().map(|_| ()).unwrap_err();
        assert!(err.to_string().contains("Unsupported SQL command"));
        Ok(())
    }
}
