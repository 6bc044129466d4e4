//! CLI command implementations

pub mod health;
pub mod query;
pub mod session;
