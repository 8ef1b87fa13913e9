//! askdb catalog
//!
//! The data access capability, its HTTP client, and the cached schema
//! catalog built on top of it. All access is read-only.

pub mod access;
pub mod catalog;
pub mod http;
pub mod snapshot;

pub use access::{DataAccess, QueryResponse};
pub use catalog::{CatalogStats, SchemaCatalog};
pub use http::HttpDataAccess;
pub use snapshot::{export_snapshot, DatabaseInfo, SchemaSnapshot, TableSnapshot};
