use crate::{
    adapters::database::sql,
    ports::driver::{
        Connection, ConnectionProvider, Cursor, DriverError, ResourceKind, Row, SqlValue,
        Statement,
    },
};
use std::{
    collections::{btree_map::Entry, BTreeMap},
    sync::{Arc, Mutex, PoisonError},
};

/// In-process driver holding a single `member` table
///
/// Understands only the statements in [`sql`]. Faults can be injected on every step of the
/// resource lifecycle, and every acquisition and release is recorded in a journal.
#[derive(Clone, Debug, Default)]
pub struct MemoryDriver {
    members: Arc<Mutex<BTreeMap<String, i64>>>,
    faults: Arc<Mutex<Faults>>,
    journal: Arc<Mutex<Vec<Lifecycle>>>,
}

/// Steps of the resource lifecycle that should fail
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Faults {
    pub connect: bool,
    pub execute: bool,
    pub close_connection: bool,
    pub close_statement: bool,
    pub close_cursor: bool,
}

/// Journal entry for a driver resource
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Acquired(ResourceKind),
    Released(ResourceKind),
    ReleaseFailed(ResourceKind),
}

impl MemoryDriver {
    pub fn with_faults(faults: Faults) -> Self {
        Self {
            faults: Arc::new(Mutex::new(faults)),
            ..Self::default()
        }
    }

    pub fn set_faults(&self, faults: Faults) -> Result<(), DriverError> {
        *self.faults.lock()? = faults;
        Ok(())
    }

    /// Everything acquired and released so far, in order
    pub fn journal(&self) -> Result<Vec<Lifecycle>, DriverError> {
        Ok(self.journal.lock()?.clone())
    }

    /// Number of resources acquired but not yet released
    ///
    /// A failed release still counts as released: the driver gave up on the resource.
    pub fn open_resources(&self) -> Result<usize, DriverError> {
        let journal = self.journal.lock()?;
        let acquired = journal
            .iter()
            .filter(|entry| matches!(entry, Lifecycle::Acquired(_)))
            .count();
        Ok(acquired.saturating_sub(journal.len() - acquired))
    }

    fn faults(&self) -> Result<Faults, DriverError> {
        Ok(*self.faults.lock()?)
    }

    fn record(&self, entry: Lifecycle) -> Result<(), DriverError> {
        self.journal.lock()?.push(entry);
        Ok(())
    }

    /// Record the release of a resource, failing if a fault is set for it
    fn release(&self, kind: ResourceKind, fail: bool) -> Result<(), DriverError> {
        if fail {
            self.record(Lifecycle::ReleaseFailed(kind))?;
            return Err(DriverError::new(format!("{kind} close failed")));
        }
        self.record(Lifecycle::Released(kind))
    }
}

impl ConnectionProvider for MemoryDriver {
    fn get_connection(&self) -> Result<Box<dyn Connection>, DriverError> {
        if self.faults()?.connect {
            return Err(DriverError::new("connection refused"));
        }
        self.record(Lifecycle::Acquired(ResourceKind::Connection))?;
        Ok(Box::new(MemoryConnection {
            driver: self.clone(),
        }))
    }
}

struct MemoryConnection {
    driver: MemoryDriver,
}

impl Connection for MemoryConnection {
    fn prepare_statement<'c>(
        &'c mut self,
        sql: &str,
    ) -> Result<Box<dyn Statement + 'c>, DriverError> {
        self.driver
            .record(Lifecycle::Acquired(ResourceKind::Statement))?;
        Ok(Box::new(MemoryStatement {
            driver: self.driver.clone(),
            sql: sql.to_string(),
            params: BTreeMap::new(),
        }))
    }

    fn close(self: Box<Self>) -> Result<(), DriverError> {
        let fail = self.driver.faults()?.close_connection;
        self.driver.release(ResourceKind::Connection, fail)
    }
}

struct MemoryStatement {
    driver: MemoryDriver,
    sql: String,
    params: BTreeMap<usize, SqlValue>,
}

impl MemoryStatement {
    fn text(&self, index: usize) -> Result<String, DriverError> {
        match self.params.get(&index) {
            Some(SqlValue::Text(value)) => Ok(value.clone()),
            Some(other) => Err(DriverError::new(format!(
                "parameter {index} is not text: {other:?}"
            ))),
            None => Err(DriverError::new(format!("parameter {index} is not bound"))),
        }
    }

    fn integer(&self, index: usize) -> Result<i64, DriverError> {
        match self.params.get(&index) {
            Some(SqlValue::Integer(value)) => Ok(*value),
            Some(other) => Err(DriverError::new(format!(
                "parameter {index} is not an integer: {other:?}"
            ))),
            None => Err(DriverError::new(format!("parameter {index} is not bound"))),
        }
    }

    fn check_execute(&self) -> Result<(), DriverError> {
        if self.driver.faults()?.execute {
            return Err(DriverError::new("execution failed"));
        }
        Ok(())
    }
}

impl Statement for MemoryStatement {
    fn bind(&mut self, index: usize, value: SqlValue) -> Result<(), DriverError> {
        if index == 0 {
            return Err(DriverError::new("parameter positions start at 1"));
        }
        self.params.insert(index, value);
        Ok(())
    }

    fn execute_update(&mut self) -> Result<usize, DriverError> {
        self.check_execute()?;
        let mut members = self.driver.members.lock()?;
        let affected = match self.sql.as_str() {
            sql::INSERT_MEMBER => {
                let member_id = self.text(1)?;
                let money = self.integer(2)?;
                match members.entry(member_id) {
                    // Member already exists
                    Entry::Occupied(entry) => {
                        return Err(DriverError::new(format!(
                            "unique constraint violated: member_id={}",
                            entry.key()
                        )));
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(money);
                        1
                    }
                }
            }
            sql::UPDATE_MONEY => {
                let money = self.integer(1)?;
                match members.get_mut(&self.text(2)?) {
                    Some(current) => {
                        *current = money;
                        1
                    }
                    None => 0,
                }
            }
            sql::DELETE_MEMBER => members.remove(&self.text(1)?).map_or(0, |_| 1),
            sql::SELECT_MEMBER => {
                return Err(DriverError::new("statement returns rows"));
            }
            other => return Err(DriverError::new(format!("unsupported statement: {other}"))),
        };

        Ok(affected)
    }

    fn execute_query<'s>(&'s mut self) -> Result<Box<dyn Cursor + 's>, DriverError> {
        self.check_execute()?;
        if self.sql != sql::SELECT_MEMBER {
            return Err(DriverError::new(format!(
                "statement does not return rows: {}",
                self.sql
            )));
        }

        let member_id = self.text(1)?;
        let rows: Vec<Row> = self
            .driver
            .members
            .lock()?
            .get_key_value(&member_id)
            .map(|(member_id, money)| {
                Row::new(vec![
                    ("MEMBER_ID".to_string(), SqlValue::Text(member_id.clone())),
                    ("MONEY".to_string(), SqlValue::Integer(*money)),
                ])
            })
            .into_iter()
            .collect();

        self.driver
            .record(Lifecycle::Acquired(ResourceKind::Cursor))?;
        Ok(Box::new(MemoryCursor {
            driver: self.driver.clone(),
            rows: rows.into_iter(),
        }))
    }

    fn close(self: Box<Self>) -> Result<(), DriverError> {
        let fail = self.driver.faults()?.close_statement;
        self.driver.release(ResourceKind::Statement, fail)
    }
}

struct MemoryCursor {
    driver: MemoryDriver,
    rows: std::vec::IntoIter<Row>,
}

impl Cursor for MemoryCursor {
    fn next_row(&mut self) -> Result<Option<Row>, DriverError> {
        Ok(self.rows.next())
    }

    fn close(self: Box<Self>) -> Result<(), DriverError> {
        let fail = self.driver.faults()?.close_cursor;
        self.driver.release(ResourceKind::Cursor, fail)
    }
}

/// Message of a [`PoisonError`] raised by one of the driver's locks
///
/// Lets a poisoned table, fault set or journal surface as a [`DriverError`], which must be
/// `Send + Sync` and so cannot carry the guard.
#[derive(Debug, thiserror::Error)]
#[error("poison error: {0}")]
pub struct ErasedPoisonError(String);

impl<T> From<PoisonError<T>> for DriverError {
    fn from(err: PoisonError<T>) -> Self {
        DriverError::new(ErasedPoisonError(err.to_string()))
    }
}
