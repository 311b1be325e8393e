use std::sync::Arc;

use super::{release::scoped, sql};
use crate::{
    domain::Member,
    ports::{
        database::{Error, MemberRepository},
        driver::{Connection, ConnectionProvider, DriverError, Row, SqlValue, Statement},
        logger::Logger,
    },
};

/// Member repository on top of a [`ConnectionProvider`]
///
/// Every operation acquires its own connection, runs exactly one statement and releases the
/// cursor, statement and connection (in that order) before returning. The store keeps no state
/// of its own besides its collaborators.
pub struct MemberStore<P, L> {
    provider: Arc<P>,
    logger: Arc<L>,
}

impl<P, L> Clone for MemberStore<P, L> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            logger: Arc::clone(&self.logger),
        }
    }
}

impl<P, L> MemberStore<P, L>
where
    P: ConnectionProvider,
    L: Logger,
{
    pub fn new(provider: Arc<P>, logger: Arc<L>) -> Self {
        Self { provider, logger }
    }

    pub fn blocking_save(&self, member: Member) -> Result<Member, Error> {
        if !member.has_identifier() {
            return Err(Error::InvalidMember("member_id must not be empty".into()));
        }

        self.execute_update(
            sql::INSERT_MEMBER,
            vec![
                SqlValue::Text(member.member_id.clone()),
                SqlValue::Integer(member.money),
            ],
        )?;
        Ok(member)
    }

    pub fn blocking_update(&self, member_id: &str, money: i64) -> Result<(), Error> {
        let result_size = self.execute_update(
            sql::UPDATE_MONEY,
            vec![SqlValue::Integer(money), SqlValue::Text(member_id.to_string())],
        )?;
        self.logger
            .info(&format!("update result size={result_size}"));
        Ok(())
    }

    pub fn blocking_delete(&self, member_id: &str) -> Result<(), Error> {
        self.execute_update(
            sql::DELETE_MEMBER,
            vec![SqlValue::Text(member_id.to_string())],
        )?;
        Ok(())
    }

    pub fn blocking_find_by_id(&self, member_id: &str) -> Result<Member, Error> {
        let logger = self.logger.as_ref();
        scoped(self.connection()?, logger, |connection| {
            let statement = self.prepare(connection, sql::SELECT_MEMBER)?;
            scoped(statement, logger, |statement| {
                self.bind_all(statement, vec![SqlValue::Text(member_id.to_string())])?;
                let cursor = statement
                    .execute_query()
                    .map_err(|err| self.storage_error(err))?;
                scoped(cursor, logger, |cursor| {
                    match cursor.next_row().map_err(|err| self.storage_error(err))? {
                        Some(row) => member_from_row(&row).map_err(|err| self.storage_error(err)),
                        None => Err(Error::MemberNotFound(member_id.to_string())),
                    }
                })
            })
        })
    }

    /// Run a statement that does not return rows and return the number of affected rows
    fn execute_update(&self, statement_sql: &str, params: Vec<SqlValue>) -> Result<usize, Error> {
        let logger = self.logger.as_ref();
        scoped(self.connection()?, logger, |connection| {
            let statement = self.prepare(connection, statement_sql)?;
            scoped(statement, logger, |statement| {
                self.bind_all(statement, params)?;
                statement
                    .execute_update()
                    .map_err(|err| self.storage_error(err))
            })
        })
    }

    fn connection(&self) -> Result<Box<dyn Connection>, Error> {
        self.provider
            .get_connection()
            .map_err(|err| self.storage_error(err))
    }

    fn prepare<'c>(
        &self,
        connection: &'c mut Box<dyn Connection>,
        statement_sql: &str,
    ) -> Result<Box<dyn Statement + 'c>, Error> {
        connection
            .prepare_statement(statement_sql)
            .map_err(|err| self.storage_error(err))
    }

    fn bind_all(
        &self,
        statement: &mut Box<dyn Statement + '_>,
        params: Vec<SqlValue>,
    ) -> Result<(), Error> {
        params
            .into_iter()
            .enumerate()
            .try_for_each(|(index, value)| statement.bind(index + 1, value))
            .map_err(|err| self.storage_error(err))
    }

    /// Report a failed statement and wrap it for the caller
    fn storage_error(&self, err: DriverError) -> Error {
        self.logger.error("db error", &err.to_string());
        Error::Storage(err)
    }
}

fn member_from_row(row: &Row) -> Result<Member, DriverError> {
    Ok(Member::new(
        row.get_text("member_id")?,
        row.get_integer("money")?,
    ))
}

#[async_trait::async_trait]
impl<P, L> MemberRepository for MemberStore<P, L>
where
    P: ConnectionProvider + 'static,
    L: Logger + 'static,
{
    async fn save(&self, member: Member) -> Result<Member, Error> {
        let store = self.clone();
        run_blocking(move || store.blocking_save(member)).await
    }

    async fn update(&self, member_id: &str, money: i64) -> Result<(), Error> {
        let store = self.clone();
        let member_id = member_id.to_string();
        run_blocking(move || store.blocking_update(&member_id, money)).await
    }

    async fn delete(&self, member_id: &str) -> Result<(), Error> {
        let store = self.clone();
        let member_id = member_id.to_string();
        run_blocking(move || store.blocking_delete(&member_id)).await
    }

    async fn find_by_id(&self, member_id: &str) -> Result<Member, Error> {
        let store = self.clone();
        let member_id = member_id.to_string();
        run_blocking(move || store.blocking_find_by_id(&member_id)).await
    }
}

/// Run a driver call on the blocking thread pool
async fn run_blocking<T, F>(f: F) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, Error> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| Error::Adapter(Box::new(err)))?
}
