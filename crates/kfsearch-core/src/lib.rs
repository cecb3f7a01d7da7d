//! kfsearch-core
//!
//! Shared domain types, the error taxonomy, capability traits implemented by
//! the vector/text/embedding crates, and the configuration loader.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
