use std::fmt;

/// Source of connections for the member store
///
/// Every call must hand out a connection that is not shared with any other caller. No pooling or
/// retry behaviour is expected from implementations.
#[mockall::automock]
pub trait ConnectionProvider: Send + Sync {
    fn get_connection(&self) -> Result<Box<dyn Connection>, DriverError>;
}

/// An open connection to the relational store
pub trait Connection {
    /// Prepare a parameterized statement
    ///
    /// The statement borrows the connection, so it must be closed before the connection is.
    fn prepare_statement<'c>(&'c mut self, sql: &str)
        -> Result<Box<dyn Statement + 'c>, DriverError>;

    fn close(self: Box<Self>) -> Result<(), DriverError>;
}

/// A prepared statement with positional parameters
pub trait Statement {
    /// Bind a value to a 1-based parameter position
    fn bind(&mut self, index: usize, value: SqlValue) -> Result<(), DriverError>;

    /// Execute a statement that does not return rows
    ///
    /// Returns the number of affected rows.
    fn execute_update(&mut self) -> Result<usize, DriverError>;

    /// Execute a statement that returns rows
    fn execute_query<'s>(&'s mut self) -> Result<Box<dyn Cursor + 's>, DriverError>;

    fn close(self: Box<Self>) -> Result<(), DriverError>;
}

/// Forward-only cursor over the rows returned by a query
pub trait Cursor {
    fn next_row(&mut self) -> Result<Option<Row>, DriverError>;

    fn close(self: Box<Self>) -> Result<(), DriverError>;
}

/// Kind of driver resource held during a store operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Connection,
    Statement,
    Cursor,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Connection => "connection",
            ResourceKind::Statement => "statement",
            ResourceKind::Cursor => "cursor",
        };
        f.write_str(name)
    }
}

/// Value bound to a statement parameter or read from a column
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// A single row, materialized from a cursor
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new(columns: Vec<(String, SqlValue)>) -> Self {
        Self { columns }
    }

    /// Value of a column, looked up by name
    ///
    /// Drivers disagree on the case of column labels, so the lookup ignores ASCII case.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    }

    pub fn get_text(&self, column: &str) -> Result<String, DriverError> {
        match self.get(column) {
            Some(SqlValue::Text(value)) => Ok(value.clone()),
            Some(other) => Err(DriverError::new(format!(
                "column {column} is not text: {other:?}"
            ))),
            None => Err(DriverError::new(format!("no such column: {column}"))),
        }
    }

    pub fn get_integer(&self, column: &str) -> Result<i64, DriverError> {
        match self.get(column) {
            Some(SqlValue::Integer(value)) => Ok(*value),
            Some(other) => Err(DriverError::new(format!(
                "column {column} is not an integer: {other:?}"
            ))),
            None => Err(DriverError::new(format!("no such column: {column}"))),
        }
    }
}

/// Error raised by a concrete driver
///
/// This could be anything from the underlying store, such as connectivity, constraint or type
/// errors.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct DriverError(Box<dyn std::error::Error + Send + Sync>);

impl DriverError {
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speculoos::prelude::*;

    fn member_row() -> Row {
        Row::new(vec![
            ("MEMBER_ID".to_string(), SqlValue::Text("user1".to_string())),
            ("MONEY".to_string(), SqlValue::Integer(10_000)),
        ])
    }

    #[test]
    fn test_get_ignores_case() {
        let row = member_row();

        assert_that!(row.get_text("member_id"))
            .is_ok()
            .is_equal_to("user1".to_string());
        assert_that!(row.get_integer("Money")).is_ok().is_equal_to(10_000);
    }

    #[test]
    fn test_get_missing_column() {
        let row = member_row();

        assert_that!(row.get("email")).is_none();
        assert_that!(row.get_text("email"))
            .is_err()
            .matches(|err| err.to_string().contains("no such column"));
    }

    #[test]
    fn test_get_wrong_type() {
        let row = member_row();

        assert_that!(row.get_integer("member_id")).is_err();
        assert_that!(row.get_text("money")).is_err();
    }
}
