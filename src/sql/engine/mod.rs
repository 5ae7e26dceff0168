use std::time::Instant;

use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::{Error, Result},
    sql::{
        executor::{self, ResultSet, TransactionMode},
        parser::{Parser, ast::Statement, script},
        plan::{Plan, Planner},
        schema::{Database, Table},
    },
    storage::Storage,
};

mod catalog;
mod result;

pub use catalog::Catalog;
pub use result::QueryResult;

/// The database engine: a registry of databases plus the storage its
/// snapshot is written to.
///
/// Every mutating operation takes `&mut self`, so one engine has exactly
/// one writer at a time. Callers sharing an engine across threads wrap it
/// in a lock of their choosing.
pub struct Engine<S: Storage> {
    catalog: Catalog,
    storage: S,
    config: Config,
}

impl Engine<Box<dyn Storage>> {
    /// Opens an engine on the storage `config` names
    pub fn from_config(config: Config) -> Result<Self> {
        let storage = config.storage();
        Self::open(config, storage)
    }
}

impl<S: Storage> Engine<S> {
    /// Loads the registry from storage. A missing or unreadable snapshot
    /// falls back to a fresh seed.
    pub fn open(config: Config, mut storage: S) -> Result<Self> {
        let loaded = match storage.load() {
            Ok(Some(data)) => match serde_json::from_slice::<Catalog>(&data) {
                Ok(catalog) if !catalog.is_empty() => Some(catalog),
                Ok(_) => {
                    warn!("snapshot holds no databases, reseeding");
                    None
                }
                Err(err) => {
                    warn!(error = %err, "snapshot is malformed, reseeding");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "snapshot could not be read, reseeding");
                None
            }
        };

        let seeded = loaded.is_none();
        let catalog = loaded.unwrap_or_else(|| Self::seed(&config));
        let mut engine = Self {
            catalog,
            storage,
            config,
        };
        if seeded && engine.config.persist_seed {
            engine.persist()?;
        }
        info!(databases = ?engine.catalog.names(), seeded, "engine opened");
        Ok(engine)
    }

    fn seed(config: &Config) -> Catalog {
        if config.seed_demo {
            Catalog::seed_demo(&config.default_database)
        } else {
            Catalog::seed(&config.default_database)
        }
    }

    /// Writes the whole registry out as one document
    fn persist(&mut self) -> Result<()> {
        let data = serde_json::to_vec_pretty(&self.catalog)?;
        self.storage.save(&data)?;
        debug!(bytes = data.len(), "snapshot written");
        Ok(())
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Starts a session on the configured default database, or on the
    /// first database when that one no longer exists
    pub fn session(&mut self) -> Session<'_, S> {
        let database = if self.catalog.contains(&self.config.default_database) {
            self.config.default_database.clone()
        } else {
            self.catalog.first_name().unwrap_or_default()
        };
        Session::new(self, database)
    }

    /// Starts a session on the named database
    pub fn session_on(&mut self, database: &str) -> Result<Session<'_, S>> {
        self.catalog.must_get(database)?;
        Ok(Session::new(self, database.to_string()))
    }

    /// Runs a script against `database` in a fresh session
    pub fn execute(&mut self, database: &str, sql: &str) -> QueryResult {
        let start = Instant::now();
        match self.session_on(database) {
            Ok(mut session) => session.execute(sql),
            Err(err) => QueryResult::failure(&err, start.elapsed()),
        }
    }

    pub fn list_databases(&self) -> Vec<String> {
        self.catalog.names()
    }

    pub fn database_state(&self, name: &str) -> Result<&Database> {
        self.catalog.must_get(name)
    }

    pub fn create_database(&mut self, name: &str) -> Result<()> {
        self.catalog.create(name)?;
        info!(database = name, "database created");
        self.persist()
    }

    pub fn drop_database(&mut self, name: &str) -> Result<()> {
        self.catalog.remove(name, &self.config.default_database)?;
        info!(database = name, "database dropped");
        self.persist()
    }

    /// Adds a table built outside SQL, e.g. by a schema editor
    pub fn create_table(&mut self, database: &str, table: Table) -> Result<()> {
        let db = self.catalog.must_get_mut(database)?;
        let name = table.name.clone();
        executor::add_table(db, table)?;
        info!(database, table = %name, "table created");
        self.persist()
    }

    /// Replaces table `old_name` with `table`, carrying the stored rows
    /// over by column id, then name, then default. Creates the table when
    /// `old_name` doesn't exist.
    pub fn update_table(&mut self, database: &str, old_name: &str, table: Table) -> Result<()> {
        let db = self.catalog.must_get_mut(database)?;
        let Some(position) = db.tables.iter().position(|t| t.name == old_name) else {
            return self.create_table(database, table);
        };
        if table.name != old_name && db.get_table(&table.name).is_some() {
            return Err(Error::Duplicate(format!(
                "Table '{}' already exists",
                table.name
            )));
        }
        let migrated = executor::migrate_table(db, &db.tables[position], table)?;
        info!(database, from = old_name, to = %migrated.name, rows = migrated.rows.len(), "table updated");
        db.tables[position] = migrated;
        self.persist()
    }

    pub fn drop_table(&mut self, database: &str, name: &str) -> Result<()> {
        let db = self.catalog.must_get_mut(database)?;
        let before = db.tables.len();
        db.tables.retain(|t| t.name != name);
        if db.tables.len() == before {
            return Err(Error::Reference(format!("Unknown table '{}'", name)));
        }
        info!(database, table = name, "table dropped");
        self.persist()
    }

    /// Overwrites a single stored cell, as a grid editor would
    pub fn update_cell(
        &mut self,
        database: &str,
        table: &str,
        row_index: usize,
        column: &str,
        value: &str,
    ) -> Result<()> {
        let table = self
            .catalog
            .must_get_mut(database)?
            .must_get_table_mut(table)?;
        executor::update_cell(table, row_index, column, value)?;
        self.persist()
    }

    /// Discards every database and reseeds
    pub fn reset(&mut self) -> Result<()> {
        self.catalog = Self::seed(&self.config);
        info!("registry reset");
        self.persist()
    }
}

/// An explicit handle on the engine carrying the current database and the
/// last generated auto-increment id
pub struct Session<'a, S: Storage> {
    engine: &'a mut Engine<S>,
    database: String,
    last_insert_id: Option<i64>,
    mode: TransactionMode,
}

impl<'a, S: Storage> Session<'a, S> {
    fn new(engine: &'a mut Engine<S>, database: String) -> Self {
        Self {
            engine,
            database,
            last_insert_id: None,
            mode: TransactionMode::AutoCommit,
        }
    }

    /// Current database name
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    /// Executes a script of `;`-separated statements in order. The first
    /// failure stops the script; statements before it stay applied.
    pub fn execute(&mut self, sql: &str) -> QueryResult {
        let start = Instant::now();
        let statements = script::split_statements(sql);
        if statements.is_empty() {
            return QueryResult::message("No statements to execute", start.elapsed());
        }

        let mut last = None;
        for (i, text) in statements.iter().enumerate() {
            match self.execute_statement(text) {
                Ok(rs) => last = Some(rs),
                Err(err) => {
                    debug!(statement = i + 1, error = %err, "statement failed");
                    return QueryResult::failure(&err, start.elapsed());
                }
            }
        }

        let mut result = match last {
            Some(rs) => QueryResult::from_result_set(rs, start.elapsed()),
            None => QueryResult::message("No statements to execute", start.elapsed()),
        };
        if statements.len() > 1 {
            result.message = Some(format!(
                "{} statements executed successfully",
                statements.len()
            ));
        }
        result
    }

    fn execute_statement(&mut self, text: &str) -> Result<ResultSet> {
        let stmt = Parser::new(text).parse()?;
        debug!(database = %self.database, statement = text, "executing");
        let mutation = stmt.is_mutation();

        let result = match stmt {
            Statement::CreateDatabase {
                name,
                if_not_exists,
            } => {
                let created = if self.engine.catalog.contains(&name) && if_not_exists {
                    false
                } else {
                    self.engine.catalog.create(&name)?;
                    info!(database = %name, "database created");
                    true
                };
                self.database = name.clone();
                ResultSet::CreateDatabase { name, created }
            }
            Statement::DropDatabase { name, if_exists } => {
                let dropped = if !self.engine.catalog.contains(&name) && if_exists {
                    false
                } else {
                    let fallback = self.engine.config.default_database.clone();
                    self.engine.catalog.remove(&name, &fallback)?;
                    info!(database = %name, "database dropped");
                    true
                };
                if !self.engine.catalog.contains(&self.database) {
                    self.database = self.engine.catalog.first_name().unwrap_or_default();
                }
                ResultSet::DropDatabase { name, dropped }
            }
            Statement::Use { name } => {
                self.engine.catalog.must_get(&name)?;
                self.database = name.clone();
                ResultSet::UseDatabase { name }
            }
            Statement::Transaction(command) => ResultSet::Transaction {
                command,
                mode: self.mode,
            },
            stmt => {
                let plan = Plan::build(stmt, &Planner::new(&self.database, self.last_insert_id))?;
                let db = self.engine.catalog.must_get_mut(&self.database)?;
                plan.execute(db)?
            }
        };

        if let ResultSet::Insert {
            last_insert_id: Some(id),
            ..
        } = &result
        {
            self.last_insert_id = Some(*id);
        }
        if mutation {
            self.engine.persist()?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::{Engine, QueryResult};
    use crate::{
        config::Config,
        error::Result,
        sql::{
            plan::PlanKind,
            schema::{Column, Row, Table},
            types::{DataType, Value},
        },
        storage::{MemoryStorage, Storage},
    };

    fn engine() -> Result<Engine<MemoryStorage>> {
        Engine::open(Config::default(), MemoryStorage::new())
    }

    fn demo() -> Result<Engine<MemoryStorage>> {
        let config = Config {
            seed_demo: true,
            ..Config::default()
        };
        Engine::open(config, MemoryStorage::new())
    }

    fn ok(result: QueryResult) -> QueryResult {
        assert!(result.success, "query failed: {:?}", result.message);
        result
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    const SETUP: &str = "
        CREATE TABLE t (id INT PRIMARY KEY, name VARCHAR(50) NOT NULL);
        INSERT INTO t (id, name) VALUES (1, 'a'), (2, 'b');
    ";

    #[test]
    fn test_select_where() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();
        ok(s.execute(SETUP));
        let result = ok(s.execute("SELECT * FROM t WHERE id > 1"));
        assert_eq!(
            result.rows(),
            &[row(&[("id", Value::Integer(2)), ("name", Value::String("b".into()))])]
        );
        assert_eq!(result.columns, Some(vec!["id".to_string(), "name".to_string()]));
        Ok(())
    }

    #[test]
    fn test_duplicate_key() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();
        ok(s.execute(SETUP));
        let result = s.execute("INSERT INTO t (id, name) VALUES (3, 'c'), (1, 'dup')");
        assert!(!result.success);
        assert!(result.message.unwrap_or_default().contains("Duplicate entry"));
        // all-or-nothing per statement
        assert_eq!(ok(s.execute("SELECT * FROM t")).rows().len(), 2);
        Ok(())
    }

    #[test]
    fn test_not_null() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();
        ok(s.execute(SETUP));
        assert!(!s.execute("INSERT INTO t (id, name) VALUES (3, NULL)").success);
        assert!(!s.execute("INSERT INTO t (id) VALUES (4)").success);
        Ok(())
    }

    #[test]
    fn test_alter_add_column() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();
        ok(s.execute(SETUP));
        ok(s.execute("ALTER TABLE t ADD COLUMN active BOOLEAN DEFAULT TRUE"));
        let result = ok(s.execute("SELECT * FROM t"));
        assert!(result.rows().iter().all(|r| r["active"] == Value::Boolean(true)));
        Ok(())
    }

    #[test]
    fn test_count_empty() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();
        ok(s.execute("CREATE TABLE e (id INT)"));
        let result = ok(s.execute("SELECT COUNT(*) FROM e"));
        assert_eq!(result.rows(), &[row(&[("COUNT(*)", Value::Integer(0))])]);
        assert_eq!(result.columns, Some(vec!["COUNT(*)".to_string()]));
        Ok(())
    }

    #[test]
    fn test_insert_select_round_trip() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();
        ok(s.execute(
            "CREATE TABLE p (id INT PRIMARY KEY, label VARCHAR(20), price DECIMAL(10,2), ok BOOLEAN)",
        ));
        ok(s.execute("INSERT INTO p (id, label, price, ok) VALUES ('7', 42, 9.99, 1)"));
        let result = ok(s.execute("SELECT * FROM p WHERE id = 7"));
        assert_eq!(
            result.rows(),
            &[row(&[
                ("id", Value::Integer(7)),
                ("label", Value::String("42".into())),
                ("price", Value::Integer(9)),
                ("ok", Value::Boolean(true)),
            ])]
        );
        Ok(())
    }

    #[test]
    fn test_delete() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();
        ok(s.execute(SETUP));
        ok(s.execute("INSERT INTO t VALUES (3, 'b')"));
        let result = ok(s.execute("DELETE FROM t WHERE name = 'b'"));
        assert_eq!(result.affected_rows, Some(2));
        assert_eq!(ok(s.execute("SELECT * FROM t")).rows().len(), 1);

        let result = ok(s.execute("DELETE FROM t"));
        assert_eq!(result.affected_rows, Some(1));
        assert!(ok(s.execute("SELECT * FROM t")).rows().is_empty());
        Ok(())
    }

    #[test]
    fn test_update() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();
        ok(s.execute(SETUP));
        let result = ok(s.execute("UPDATE t SET name = 'z' WHERE id = 2"));
        assert_eq!(result.affected_rows, Some(1));
        let result = ok(s.execute("SELECT * FROM t WHERE name = 'z'"));
        assert_eq!(result.rows()[0]["id"], Value::Integer(2));

        assert!(!s.execute("UPDATE t SET nope = 1").success);
        assert_eq!(ok(s.execute("UPDATE t SET name = 'all'")).affected_rows, Some(2));
        Ok(())
    }

    #[test]
    fn test_joins() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();
        ok(s.execute(
            "CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(20));
             CREATE TABLE orders (oid INT PRIMARY KEY, user_id INT REFERENCES users(id), amount INT);
             INSERT INTO users VALUES (1, 'ann'), (2, 'bob');
             INSERT INTO orders VALUES (10, 1, 5), (11, 1, 7);",
        ));

        let inner = ok(s.execute(
            "SELECT * FROM users INNER JOIN orders ON users.id = orders.user_id",
        ));
        assert_eq!(inner.rows().len(), 2);
        assert!(inner.rows().iter().all(|r| r["name"] == Value::String("ann".into())));

        let left = ok(s.execute("SELECT * FROM users LEFT JOIN orders ON users.id = orders.user_id"));
        assert_eq!(left.rows().len(), 3);
        let bob: Vec<_> = left
            .rows()
            .iter()
            .filter(|r| r["name"] == Value::String("bob".into()))
            .collect();
        assert_eq!(bob.len(), 1);
        assert_eq!(bob[0]["oid"], Value::Null);
        assert_eq!(bob[0]["amount"], Value::Null);
        assert_eq!(
            left.columns,
            Some(vec!["id", "name", "oid", "user_id", "amount"].into_iter().map(String::from).collect())
        );

        let plan = left.plan.expect("select carries a plan");
        assert_eq!(plan.kind, PlanKind::Join);
        assert_eq!(plan.children.len(), 2);
        Ok(())
    }

    #[test]
    fn test_foreign_key_enforced() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();
        ok(s.execute(
            "CREATE TABLE users (id INT PRIMARY KEY);
             CREATE TABLE orders (id INT, user_id INT, FOREIGN KEY (user_id) REFERENCES users(id));
             INSERT INTO users VALUES (1);",
        ));
        ok(s.execute("INSERT INTO orders VALUES (1, 1)"));
        ok(s.execute("INSERT INTO orders (id) VALUES (2)"));
        let result = s.execute("INSERT INTO orders VALUES (3, 99)");
        assert!(!result.success);
        assert!(!s.execute("CREATE TABLE bad (x INT REFERENCES ghost(id))").success);
        Ok(())
    }

    #[test]
    fn test_auto_increment_and_defaults() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();
        ok(s.execute(
            "CREATE TABLE log (id INT PRIMARY KEY AUTO_INCREMENT, msg TEXT NOT NULL,
             level VARCHAR(10) DEFAULT 'info', at DATETIME DEFAULT CURRENT_TIMESTAMP)",
        ));
        ok(s.execute("INSERT INTO log (msg) VALUES ('a'), ('b')"));
        assert_eq!(s.last_insert_id(), Some(2));
        ok(s.execute("INSERT INTO log (id, msg) VALUES (10, 'c')"));
        ok(s.execute("INSERT INTO log (msg) VALUES ('d')"));

        let result = ok(s.execute("SELECT * FROM log ORDER BY id DESC LIMIT 1"));
        let last = &result.rows()[0];
        assert_eq!(last["id"], Value::Integer(11));
        assert_eq!(last["level"], Value::String("info".into()));
        assert!(matches!(&last["at"], Value::String(at) if at.len() == 19));

        let result = ok(s.execute("SELECT LAST_INSERT_ID()"));
        assert_eq!(result.rows()[0]["LAST_INSERT_ID()"], Value::Integer(11));
        Ok(())
    }

    #[test]
    fn test_order_group_having_limit() -> Result<()> {
        let mut engine = demo()?;
        let mut s = engine.session();

        let result = ok(s.execute("SELECT * FROM employees ORDER BY salary DESC LIMIT 2"));
        let names: Vec<_> = result.rows().iter().map(|r| r["name"].to_text()).collect();
        assert_eq!(names, vec!["Bob Smith", "Alice Johnson"]);

        let result = ok(s.execute("SELECT * FROM employees ORDER BY id LIMIT 2 OFFSET 3"));
        let ids: Vec<_> = result.rows().iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![Value::Integer(104), Value::Integer(105)]);
        let plan = result.plan.expect("plan");
        assert_eq!(plan.kind, PlanKind::Limit);
        assert_eq!(plan.children[0].kind, PlanKind::Offset);

        // one representative row per group
        let result = ok(s.execute("SELECT department_id FROM employees GROUP BY department_id"));
        assert_eq!(result.rows().len(), 3);
        assert_eq!(result.rows()[0]["id"], Value::Integer(101));

        let result = ok(s.execute(
            "SELECT * FROM employees GROUP BY department_id HAVING salary > 80000",
        ));
        assert_eq!(result.rows().len(), 2);

        let result = ok(s.execute("SELECT SUM(salary) AS total, AVG(salary) FROM employees WHERE department_id = 1"));
        assert_eq!(result.rows()[0]["total"], Value::Integer(275000));
        assert_eq!(result.columns, Some(vec!["total".to_string(), "AVG(salary)".to_string()]));

        let plan = result.plan.expect("plan");
        assert_eq!(plan.kind, PlanKind::Aggregate);
        assert_eq!(plan.children[0].kind, PlanKind::Filter);
        assert_eq!(plan.node_count(), 3);
        Ok(())
    }

    #[test]
    fn test_where_connectives() -> Result<()> {
        let mut engine = demo()?;
        let mut s = engine.session();
        let result = ok(s.execute(
            "SELECT * FROM employees WHERE department_id = 2 OR department_id = 3 AND salary > 80000",
        ));
        // (dept 2 OR dept 3) AND salary > 80000, strictly left to right
        assert_eq!(result.rows().len(), 1);
        assert_eq!(result.rows()[0]["id"], Value::Integer(104));

        let result = ok(s.execute("SELECT * FROM employees WHERE name LIKE '%son%'"));
        assert_eq!(result.rows().len(), 1);
        Ok(())
    }

    #[test]
    fn test_where_bare_word_value() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();
        ok(s.execute(SETUP));

        let result = ok(s.execute("SELECT * FROM t WHERE name = b"));
        assert_eq!(result.rows().len(), 1);
        assert_eq!(result.rows()[0]["id"], Value::Integer(2));

        let result = ok(s.execute("UPDATE t SET name = 'c' WHERE name = b"));
        assert_eq!(result.affected_rows, Some(1));
        let result = ok(s.execute("DELETE FROM t WHERE name = a"));
        assert_eq!(result.affected_rows, Some(1));
        assert_eq!(ok(s.execute("SELECT * FROM t")).rows()[0]["name"], Value::String("c".into()));
        Ok(())
    }

    #[test]
    fn test_order_by_null_keys() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();
        ok(s.execute(
            "CREATE TABLE s (id INT PRIMARY KEY, score INT);
             INSERT INTO s VALUES (1, 20), (2, NULL), (3, 10), (5, 20);
             INSERT INTO s (id) VALUES (4)",
        ));
        let ids = |result: QueryResult| -> Vec<Value> {
            result.rows().iter().map(|r| r["id"].clone()).collect()
        };
        let expect = |v: &[i64]| -> Vec<Value> { v.iter().copied().map(Value::Integer).collect() };

        let asc = ids(ok(s.execute("SELECT * FROM s ORDER BY score ASC")));
        assert_eq!(asc, expect(&[2, 4, 3, 1, 5]));
        let desc = ids(ok(s.execute("SELECT * FROM s ORDER BY score DESC")));
        assert_eq!(desc, expect(&[2, 4, 1, 5, 3]));
        Ok(())
    }

    #[test]
    fn test_auto_increment_overflow() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();
        ok(s.execute(
            "CREATE TABLE a (id INT PRIMARY KEY AUTO_INCREMENT, v INT);
             INSERT INTO a (id, v) VALUES (9223372036854775807, 1)",
        ));
        let result = s.execute("INSERT INTO a (v) VALUES (2)");
        assert!(!result.success);
        assert!(result.message.unwrap_or_default().contains("overflow"));
        assert_eq!(ok(s.execute("SELECT * FROM a")).rows().len(), 1);
        Ok(())
    }

    #[test]
    fn test_sum_large_integers() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();
        ok(s.execute("CREATE TABLE n (v INT); INSERT INTO n VALUES (9007199254740993), (0)"));
        let result = ok(s.execute("SELECT SUM(v) FROM n"));
        assert_eq!(result.rows()[0]["SUM(v)"], Value::Integer(9_007_199_254_740_993));
        Ok(())
    }

    #[test]
    fn test_self_referencing_row() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();
        ok(s.execute("CREATE TABLE emp (id INT PRIMARY KEY, boss INT REFERENCES emp(id))"));
        ok(s.execute("INSERT INTO emp VALUES (1, 1)"));
        ok(s.execute("INSERT INTO emp VALUES (2, 1)"));
        assert!(!s.execute("INSERT INTO emp VALUES (3, 9)").success);
        Ok(())
    }

    #[test]
    fn test_databases_and_sessions() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();
        assert_eq!(s.database(), "DemoDB");

        ok(s.execute("CREATE DATABASE shop"));
        assert_eq!(s.database(), "shop");
        assert!(!s.execute("CREATE DATABASE shop").success);
        ok(s.execute("CREATE DATABASE IF NOT EXISTS DemoDB"));
        assert_eq!(s.database(), "DemoDB");
        ok(s.execute("USE shop; CREATE TABLE x (id INT)"));
        assert!(!s.execute("USE nowhere").success);

        let result = ok(s.execute("SELECT DATABASE(), USER()"));
        assert_eq!(result.rows()[0]["DATABASE()"], Value::String("shop".into()));
        assert_eq!(result.rows()[0]["USER()"], Value::String("root@localhost".into()));

        ok(s.execute("DROP DATABASE shop"));
        assert_eq!(s.database(), "DemoDB");
        ok(s.execute("DROP DATABASE DemoDB"));
        // the registry is never left empty
        assert_eq!(s.database(), "DemoDB");
        ok(s.execute("DROP DATABASE IF EXISTS ghost"));
        assert!(!s.execute("DROP DATABASE ghost").success);
        Ok(())
    }

    #[test]
    fn test_tables_lifecycle() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();
        ok(s.execute(SETUP));
        assert!(!s.execute("CREATE TABLE t (id INT)").success);
        ok(s.execute("CREATE TABLE IF NOT EXISTS t (id INT)"));
        ok(s.execute("DROP TABLE t"));
        assert!(!s.execute("SELECT * FROM t").success);
        assert!(!s.execute("DROP TABLE t").success);
        ok(s.execute("DROP TABLE IF EXISTS t"));
        Ok(())
    }

    #[test]
    fn test_transactions_auto_commit() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();
        ok(s.execute(SETUP));
        let result = ok(s.execute("START TRANSACTION"));
        assert!(result.message.unwrap_or_default().contains("auto-commit"));
        ok(s.execute("DELETE FROM t WHERE id = 1"));
        ok(s.execute("ROLLBACK"));
        // nothing is undone
        assert_eq!(ok(s.execute("SELECT * FROM t")).rows().len(), 1);
        ok(s.execute("BEGIN; COMMIT"));
        Ok(())
    }

    #[test]
    fn test_batch_results() -> Result<()> {
        let mut engine = engine()?;
        let mut s = engine.session();

        let result = ok(s.execute("-- only a comment\n"));
        assert_eq!(result.message.as_deref(), Some("No statements to execute"));

        let result = ok(s.execute(&format!("{} SELECT * FROM t;", SETUP)));
        assert_eq!(result.message.as_deref(), Some("3 statements executed successfully"));
        assert_eq!(result.rows().len(), 2);

        // the first failure halts the batch, earlier statements stay applied
        let result = s.execute("INSERT INTO t VALUES (3, 'c'); SELECT * FROM nope; INSERT INTO t VALUES (4, 'd')");
        assert!(!result.success);
        assert_eq!(ok(s.execute("SELECT * FROM t")).rows().len(), 3);

        let result = s.execute("FROBNICATE t");
        assert!(!result.success);
        assert!(result.message.unwrap_or_default().starts_with("Syntax error"));
        Ok(())
    }

    #[test]
    fn test_persistence() -> Result<()> {
        let mut engine = engine()?;
        // seed persisted on open
        assert_eq!(engine.storage().saves(), 1);
        ok(engine.execute("DemoDB", SETUP));
        ok(engine.execute("DemoDB", "SELECT * FROM t"));
        // one write per mutating statement, none for SELECT
        assert_eq!(engine.storage().saves(), 3);

        let snapshot = engine.storage().snapshot().map(<[u8]>::to_vec).unwrap_or_default();
        let mut reopened = Engine::open(Config::default(), MemoryStorage::with_data(snapshot))?;
        let result = ok(reopened.execute("DemoDB", "SELECT * FROM t WHERE id = 2"));
        assert_eq!(result.rows()[0]["name"], Value::String("b".into()));
        Ok(())
    }

    #[test]
    fn test_malformed_snapshot_reseeds() -> Result<()> {
        let mut storage = MemoryStorage::with_data(b"{not json".to_vec());
        assert!(storage.load()?.is_some());
        let engine = Engine::open(Config::default(), storage)?;
        assert_eq!(engine.list_databases(), vec!["DemoDB".to_string()]);
        assert_eq!(engine.storage().saves(), 1);
        Ok(())
    }

    #[test]
    fn test_core_operations() -> Result<()> {
        let mut engine = demo()?;
        engine.create_database("crm")?;
        assert!(engine.create_database("crm").is_err());
        assert_eq!(engine.list_databases(), vec!["DemoDB".to_string(), "crm".to_string()]);

        let table = Table {
            id: "contacts".into(),
            name: "contacts".into(),
            columns: vec![
                Column::new("c1", "id", DataType::Int),
                Column::new("c2", "email", DataType::Varchar),
            ],
            indexes: vec![],
            rows: vec![],
        };
        engine.create_table("crm", table.clone())?;
        assert!(engine.create_table("crm", table.clone()).is_err());
        ok(engine.execute("crm", "INSERT INTO contacts VALUES (1, 'a@x')"));

        // rename a column and the table; rows follow by column id
        let mut renamed = table.clone();
        renamed.name = "people".into();
        renamed.columns[1].name = "mail".into();
        engine.update_table("crm", "contacts", renamed)?;
        let db = engine.database_state("crm")?;
        assert_eq!(db.must_get_table("people")?.rows[0]["mail"], Value::String("a@x".into()));

        engine.update_cell("crm", "people", 0, "id", "5")?;
        assert_eq!(engine.database_state("crm")?.must_get_table("people")?.rows[0]["id"], Value::Integer(5));
        assert!(engine.update_cell("crm", "people", 9, "id", "5").is_err());

        engine.drop_table("crm", "people")?;
        assert!(engine.drop_table("crm", "people").is_err());
        engine.drop_database("crm")?;
        assert!(engine.database_state("crm").is_err());
        assert!(!engine.execute("crm", "SELECT 1").success);

        engine.reset()?;
        assert_eq!(engine.database_state("DemoDB")?.tables.len(), 3);
        Ok(())
    }
}
