//! Scoped acquisition of driver resources.
//!
//! Every resource handed to [`scoped`] is released once its body returns, whatever the outcome.
//! Resources nest (connection, then statement, then cursor), so they are released in reverse
//! acquisition order. What happens when a release fails is decided by [`ReleasePolicy`].

use crate::ports::{
    database::{Error, ReleaseError},
    driver::{Connection, Cursor, DriverError, ResourceKind, Statement},
    logger::Logger,
};

/// What to do when releasing a resource fails
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// Report the failure and keep the outcome of the operation
    LogOnly,
    /// Report the failure and return it instead of the outcome of the operation
    Fatal,
}

impl ReleasePolicy {
    pub const fn for_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Connection | ResourceKind::Statement => ReleasePolicy::LogOnly,
            ResourceKind::Cursor => ReleasePolicy::Fatal,
        }
    }
}

/// Driver resource that must be released explicitly
pub(crate) trait Releasable {
    const KIND: ResourceKind;

    fn release(self) -> Result<(), DriverError>;
}

impl Releasable for Box<dyn Connection> {
    const KIND: ResourceKind = ResourceKind::Connection;

    fn release(self) -> Result<(), DriverError> {
        self.close()
    }
}

impl<'c> Releasable for Box<dyn Statement + 'c> {
    const KIND: ResourceKind = ResourceKind::Statement;

    fn release(self) -> Result<(), DriverError> {
        self.close()
    }
}

impl<'s> Releasable for Box<dyn Cursor + 's> {
    const KIND: ResourceKind = ResourceKind::Cursor;

    fn release(self) -> Result<(), DriverError> {
        self.close()
    }
}

/// Run `body` with `resource`, then release it
///
/// The resource is released on every exit path of `body`. A failed release either leaves the
/// outcome of `body` untouched or replaces it, depending on the [`ReleasePolicy`] for the
/// resource kind.
pub(crate) fn scoped<R, T, F>(mut resource: R, logger: &dyn Logger, body: F) -> Result<T, Error>
where
    R: Releasable,
    F: FnOnce(&mut R) -> Result<T, Error>,
{
    let outcome = body(&mut resource);
    release(resource, logger)?;
    outcome
}

fn release<R: Releasable>(resource: R, logger: &dyn Logger) -> Result<(), Error> {
    let Err(source) = resource.release() else {
        return Ok(());
    };

    let err = ReleaseError {
        kind: R::KIND,
        source,
    };
    logger.error(&format!("failed to release {}", R::KIND), &err.source.to_string());

    match ReleasePolicy::for_kind(R::KIND) {
        ReleasePolicy::LogOnly => Ok(()),
        ReleasePolicy::Fatal => Err(Error::CursorRelease(err)),
    }
}
