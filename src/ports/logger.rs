/// Log sink used by the member store
///
/// Injected rather than global so that tests can observe what the store reports.
#[mockall::automock]
pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str, cause: &str);
}
