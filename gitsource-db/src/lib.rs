//! SQLite-backed content graph for gitsource
//!
//! Nodes are stored as JSON bodies keyed by ID, with their outgoing links
//! kept in a separate table so reverse lookups ("every file of this remote")
//! are an index scan.

pub mod db;
pub mod error;
pub mod nodes;

pub use db::{Database, DatabaseConfig};
pub use error::{Error, Result};
pub use nodes::NodeStore;
