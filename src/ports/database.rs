use std::borrow::Cow;

use crate::{
    domain::Member,
    ports::driver::{DriverError, ResourceKind},
};

/// Create, read, update and delete operations on members
#[async_trait::async_trait]
pub trait MemberRepository {
    /// Insert a new member and return it
    async fn save(&self, member: Member) -> Result<Member, Error>;
    /// Set the balance of a member
    ///
    /// Updating a member that does not exist is not an error.
    async fn update(&self, member_id: &str, money: i64) -> Result<(), Error>;
    /// Remove a member
    ///
    /// Deleting a member that does not exist is not an error.
    async fn delete(&self, member_id: &str) -> Result<(), Error>;
    async fn find_by_id(&self, member_id: &str) -> Result<Member, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No member matches the requested identifier
    #[error("member {0} not found")]
    MemberNotFound(String),

    /// The statement could not be executed
    ///
    /// Covers connection acquisition, statement preparation, execution and reading results.
    #[error("storage error: {0}")]
    Storage(#[source] DriverError),

    /// A result cursor could not be released
    ///
    /// Unlike statements and connections, this is never swallowed as it points to an
    /// inconsistent driver.
    #[error("fatal: {0}")]
    CursorRelease(#[source] ReleaseError),

    /// The member cannot be persisted, e.g. its identifier is empty
    #[error("invalid member: {0}")]
    InvalidMember(Cow<'static, str>),

    /// Failures outside of the driver, such as a blocking task that panicked
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}

/// A driver resource could not be released
#[derive(Debug, thiserror::Error)]
#[error("failed to release {kind}: {source}")]
pub struct ReleaseError {
    pub kind: ResourceKind,
    #[source]
    pub source: DriverError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use speculoos::prelude::*;

    #[test]
    fn test_not_found_names_member() {
        let err = Error::MemberNotFound("user1".to_string());

        assert_that!(err.to_string()).is_equal_to("member user1 not found".to_string());
    }
}
