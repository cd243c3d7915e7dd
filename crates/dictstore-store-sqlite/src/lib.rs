//! SQLite backend for the dictionary store.
//!
//! Each content collection is a table of JSON documents; the dictionary
//! versions live in a typed table. Wraps [`tokio_rusqlite`] so all database
//! access runs on a dedicated thread without blocking the async runtime.

mod content;
mod dictionary;
mod encode;
mod guard;
mod query;
mod resolve;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
