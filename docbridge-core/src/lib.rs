// docbridge-core/src/lib.rs
//! Identity-oriented convenience client over the official MongoDB driver.
//!
//! Lookups, updates and deletes "by id" go through an application-chosen
//! field (`id` by default) instead of `_id`. The driver client is created
//! eagerly or on first use, can be closed explicitly, and reconnects on
//! demand. Driver results and errors are passed through unchanged.

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod find_options;
pub mod identity;
pub mod logging;
pub mod validate;

// Public exports
pub use client::DocumentStoreClient;
pub use config::{ClientConfig, ConnectMode};
pub use connection::{Connection, ConnectionInfo, ConnectionState};
pub use error::{DocBridgeError, Result};
pub use find_options::FindOptions;
pub use identity::{IdField, Identifier, NATIVE_ID_FIELD};
pub use logging::LogLevel;

// Driver types that appear in this crate's signatures
pub use mongodb::bson;
pub use mongodb::options::UpdateOptions;
pub use mongodb::results::{DeleteResult, InsertManyResult, InsertOneResult, UpdateResult};
