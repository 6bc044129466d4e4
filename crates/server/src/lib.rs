//! Vitals server: query API over the running pipeline

pub mod api;
pub mod auth;
pub mod config;
