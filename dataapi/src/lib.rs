//! Data code interpreter and test-report service.
//!
//! Scripts of bracket calls (`[Post(url, body, headers)][AssertSuccess()]`)
//! drive integration tests against an external API; every line's outcome is
//! folded into a report tree and classified into failures and successes.

pub mod cli;
pub mod config;
pub mod script;
pub mod scripts;
pub mod service;
pub mod transport;
