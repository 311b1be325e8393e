use crate::{
    config::SqliteConfig,
    ports::driver::{Connection, ConnectionProvider, Cursor, DriverError, Row, SqlValue, Statement},
};
use rusqlite::types::{Null, ValueRef};

/// Opens a new SQLite connection for every call
///
/// Nothing is pooled: closing the connection closes the database handle.
#[derive(Clone, Debug)]
pub struct SqliteConnectionProvider {
    config: SqliteConfig,
}

impl SqliteConnectionProvider {
    /// Create a provider, making sure the directory of the database file exists
    pub fn new(config: SqliteConfig) -> Result<Self, DriverError> {
        if let Some(dir) = config.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(DriverError::new)?;
            }
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }
}

impl ConnectionProvider for SqliteConnectionProvider {
    fn get_connection(&self) -> Result<Box<dyn Connection>, DriverError> {
        let connection = rusqlite::Connection::open(&self.config.path)?;
        connection.busy_timeout(self.config.busy_timeout)?;
        tracing::debug!(path = %self.config.path.display(), "opened sqlite connection");
        Ok(Box::new(SqliteConnection { connection }))
    }
}

struct SqliteConnection {
    connection: rusqlite::Connection,
}

impl Connection for SqliteConnection {
    fn prepare_statement<'c>(
        &'c mut self,
        sql: &str,
    ) -> Result<Box<dyn Statement + 'c>, DriverError> {
        let statement = self.connection.prepare(sql)?;
        Ok(Box::new(SqliteStatement { statement }))
    }

    fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.connection
            .close()
            .map_err(|(_, err)| DriverError::from(err))
    }
}

struct SqliteStatement<'c> {
    statement: rusqlite::Statement<'c>,
}

impl<'c> Statement for SqliteStatement<'c> {
    fn bind(&mut self, index: usize, value: SqlValue) -> Result<(), DriverError> {
        match value {
            SqlValue::Null => self.statement.raw_bind_parameter(index, Null),
            SqlValue::Integer(value) => self.statement.raw_bind_parameter(index, value),
            SqlValue::Real(value) => self.statement.raw_bind_parameter(index, value),
            SqlValue::Text(value) => self.statement.raw_bind_parameter(index, value),
            SqlValue::Blob(value) => self.statement.raw_bind_parameter(index, value),
        }?;
        Ok(())
    }

    fn execute_update(&mut self) -> Result<usize, DriverError> {
        Ok(self.statement.raw_execute()?)
    }

    fn execute_query<'s>(&'s mut self) -> Result<Box<dyn Cursor + 's>, DriverError> {
        Ok(Box::new(SqliteCursor {
            rows: self.statement.raw_query(),
        }))
    }

    fn close(self: Box<Self>) -> Result<(), DriverError> {
        Ok(self.statement.finalize()?)
    }
}

struct SqliteCursor<'s> {
    rows: rusqlite::Rows<'s>,
}

impl<'s> Cursor for SqliteCursor<'s> {
    fn next_row(&mut self) -> Result<Option<Row>, DriverError> {
        let Some(row) = self.rows.next()? else {
            return Ok(None);
        };

        let statement: &rusqlite::Statement<'_> = row.as_ref();
        let columns = statement
            .column_names()
            .into_iter()
            .enumerate()
            .map(|(index, name)| Ok((name.to_string(), sql_value(row.get_ref(index)?))))
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;

        Ok(Some(Row::new(columns)))
    }

    /// Rows are reset when dropped; SQLite has nothing else to release for them.
    ///
    /// This never fails, so the fatal cursor release policy can only fire on drivers whose
    /// cursors can fail to close, never on this one.
    fn close(self: Box<Self>) -> Result<(), DriverError> {
        Ok(())
    }
}

fn sql_value(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(value) => SqlValue::Integer(value),
        ValueRef::Real(value) => SqlValue::Real(value),
        ValueRef::Text(value) => SqlValue::Text(String::from_utf8_lossy(value).into_owned()),
        ValueRef::Blob(value) => SqlValue::Blob(value.to_vec()),
    }
}

impl From<rusqlite::Error> for DriverError {
    fn from(err: rusqlite::Error) -> Self {
        DriverError::new(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::{database::member_store::MemberStore, logger::TracingLogger},
        domain::Member,
        ports::database::{Error, MemberRepository},
    };
    use crate::ports::logger::MockLogger;
    use rstest::*;
    use speculoos::prelude::*;
    use std::{sync::Arc, time::Duration};
    use tempfile::TempDir;

    const CREATE_MEMBER_TABLE: &str = "create table member (
        member_id varchar(10),
        money integer not null default 0,
        primary key (member_id)
    )";

    /// Provider on a fresh database file, in a directory that does not exist yet
    fn provider() -> (TempDir, SqliteConnectionProvider) {
        let dir = tempfile::tempdir().unwrap();
        let provider = SqliteConnectionProvider::new(SqliteConfig {
            path: dir.path().join("data").join("member.db"),
            busy_timeout: Duration::from_millis(500),
        })
        .unwrap();
        (dir, provider)
    }

    /// Member table without a key, so that one identifier can have several rows
    const CREATE_UNKEYED_MEMBER_TABLE: &str = "create table member (
        member_id varchar(10),
        money integer
    )";

    fn execute_sql(provider: &SqliteConnectionProvider, sql: &str) {
        let mut connection = provider.get_connection().unwrap();
        let mut statement = connection.prepare_statement(sql).unwrap();
        statement.execute_update().unwrap();
        statement.close().unwrap();
        connection.close().unwrap();
    }

    fn create_member_table(provider: &SqliteConnectionProvider) {
        execute_sql(provider, CREATE_MEMBER_TABLE);
    }

    fn store(provider: SqliteConnectionProvider) -> MemberStore<SqliteConnectionProvider, TracingLogger> {
        MemberStore::new(Arc::new(provider), Arc::new(TracingLogger))
    }

    #[test]
    fn test_new_creates_directory() {
        let (dir, provider) = provider();

        assert_that!(provider.config().path.parent().map(|parent| parent.is_dir()))
            .is_some()
            .is_true();
        assert_that!(dir.path().join("data").is_dir()).is_true();
    }

    #[test]
    fn test_row_columns() {
        let (_dir, provider) = provider();
        create_member_table(&provider);
        let store = store(provider.clone());
        assert_that!(store.blocking_save(Member::new("user1", 10_000))).is_ok();

        let mut connection = provider.get_connection().unwrap();
        let mut statement = connection
            .prepare_statement("select * from member where member_id = ?")
            .unwrap();
        statement
            .bind(1, SqlValue::Text("user1".to_string()))
            .unwrap();
        let mut cursor = statement.execute_query().unwrap();
        let row = cursor.next_row().unwrap();

        assert_that!(row).is_some().is_equal_to(Row::new(vec![
            ("member_id".to_string(), SqlValue::Text("user1".to_string())),
            ("money".to_string(), SqlValue::Integer(10_000)),
        ]));
        assert_that!(cursor.next_row().unwrap()).is_none();
    }

    #[tokio::test]
    async fn test_crud_scenario() -> Result<(), Error> {
        let (_dir, provider) = provider();
        create_member_table(&provider);
        let store = store(provider);

        let saved = store.save(Member::new("user1", 10_000)).await?;
        assert_that!(saved).is_equal_to(Member::new("user1", 10_000));
        assert_that!(store.find_by_id("user1").await)
            .is_ok()
            .is_equal_to(Member::new("user1", 10_000));

        store.update("user1", 5_000).await?;
        assert_that!(store.find_by_id("user1").await)
            .is_ok()
            .is_equal_to(Member::new("user1", 5_000));

        store.delete("user1").await?;
        assert_that!(store.find_by_id("user1").await)
            .is_err()
            .matches(|err| matches!(err, Error::MemberNotFound(id) if id == "user1"));

        // Deleting again is a no-op
        store.delete("user1").await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_key() {
        let (_dir, provider) = provider();
        create_member_table(&provider);
        let store = store(provider);
        assert_that!(store.save(Member::new("user1", 10_000)).await).is_ok();

        let res = store.save(Member::new("user1", 1)).await;

        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_missing_table() {
        let (_dir, provider) = provider();
        let store = store(provider);

        let res = store.find_by_id("user1").await;

        assert_that!(res).is_err().matches(|err| {
            matches!(err, Error::Storage(source) if source.to_string().contains("no such table"))
        });
    }

    #[test]
    fn test_find_reads_first_row() {
        // GIVEN two rows for the same identifier
        let (_dir, provider) = provider();
        execute_sql(&provider, CREATE_UNKEYED_MEMBER_TABLE);
        execute_sql(
            &provider,
            "insert into member(member_id, money) values('dup', 1), ('dup', 2)",
        );
        let store = store(provider);

        // WHEN reading the identifier
        let res = store.blocking_find_by_id("dup");

        // THEN only the first row is used
        assert_that!(res).is_ok().is_equal_to(Member::new("dup", 1));
    }

    /// Rows whose balance is not an integer cannot become a member
    #[rstest]
    #[case("'abc'", "column money is not an integer: Text(\"abc\")")]
    #[case("null", "column money is not an integer: Null")]
    fn test_find_unconvertible_row(#[case] money: &str, #[case] expected_cause: &'static str) {
        // GIVEN a row with a balance of the wrong type
        let (_dir, provider) = provider();
        execute_sql(&provider, CREATE_UNKEYED_MEMBER_TABLE);
        execute_sql(
            &provider,
            &format!("insert into member(member_id, money) values('bad', {money})"),
        );
        let mut logger = MockLogger::new();
        logger
            .expect_error()
            .times(1)
            .withf(move |message, cause| message == "db error" && cause == expected_cause)
            .return_const(());
        let store = MemberStore::new(Arc::new(provider), Arc::new(logger));

        // WHEN reading it
        let res = store.blocking_find_by_id("bad");

        // THEN a storage error is reported once and returned
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::Storage(_)));
    }
}
