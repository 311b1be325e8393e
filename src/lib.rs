//! Member records on a relational store.
//!
//! [`MemberStore`](adapters::database::member_store::MemberStore) maps create, read, update and
//! delete operations on a [`Member`](domain::Member) onto prepared statements, acquiring a fresh
//! connection from a [`ConnectionProvider`](ports::driver::ConnectionProvider) for every call and
//! releasing every driver resource before returning.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
