pub mod database;
pub mod driver;
pub mod logger;
