pub mod member_store;
pub mod release;
pub mod sql;
