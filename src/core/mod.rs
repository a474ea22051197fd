pub mod auth;
pub mod config;
pub mod error;
pub mod fetch;
pub mod http;
pub mod pipeline;
pub mod query;
pub mod retry;
pub mod table;
pub mod writer;

#[cfg(test)]
pub mod testutil;
