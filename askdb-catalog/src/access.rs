//! Data access service capability.

use askdb_core::{Column, DataAccessError, Row};
use async_trait::async_trait;

/// What the data store answered to a query.
///
/// A store-side rejection is a normal answer, not a transport failure: the
/// message is surfaced verbatim so it can be fed back into synthesis.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResponse {
    Rows(Vec<Row>),
    Error(String),
}

/// Read-only access to the relational store.
///
/// Implementations never write back to the store.
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// Names of all tables, in the order the store reports them.
    async fn list_tables(&self) -> Result<Vec<String>, DataAccessError>;

    /// Column metadata for `table`, in declaration order.
    async fn columns(&self, table: &str) -> Result<Vec<Column>, DataAccessError>;

    /// Submit `sql` unchanged.
    async fn query(&self, sql: &str) -> Result<QueryResponse, DataAccessError>;
}
