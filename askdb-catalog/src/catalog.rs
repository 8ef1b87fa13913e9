//! Lazily populated schema catalog.
//!
//! Holds the last-fetched table-name set and per-table column metadata.
//! Column entries are inserted only if absent, so concurrent fetches for the
//! same table may race harmlessly: the fetched values are equivalent. A fetch
//! that completes after a refresh dropped its table does not stay cached.

use crate::access::DataAccess;
use askdb_core::{CatalogError, Column, DataAccessConfig, DataAccessError, TableSchema};
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub hits: u64,
    pub misses: u64,
    pub cached_tables: u64,
    pub table_refreshes: u64,
}

impl CatalogStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub struct SchemaCatalog {
    access: Arc<dyn DataAccess>,
    excluded_prefixes: Vec<String>,
    timeout: Duration,
    tables: RwLock<Option<Arc<Vec<String>>>>,
    columns: DashMap<String, Arc<Vec<Column>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    refreshes: AtomicU64,
}

impl SchemaCatalog {
    /// Create an empty catalog. Nothing is fetched until first use.
    pub fn new(access: Arc<dyn DataAccess>, timeout: Duration) -> Self {
        Self {
            access,
            excluded_prefixes: Vec::new(),
            timeout,
            tables: RwLock::new(None),
            columns: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
        }
    }

    pub fn from_config(access: Arc<dyn DataAccess>, config: &DataAccessConfig) -> Self {
        Self::new(access, config.request_timeout())
            .with_excluded_prefixes(config.excluded_table_prefixes.clone())
    }

    /// Hide tables whose name starts with any of `prefixes`.
    pub fn with_excluded_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.excluded_prefixes = prefixes;
        self
    }

    pub fn access(&self) -> &Arc<dyn DataAccess> {
        &self.access
    }

    /// Fetch the table list from the store and replace the cached set.
    ///
    /// Cached columns of tables that disappeared are dropped.
    #[tracing::instrument(skip(self))]
    pub async fn list_tables(&self) -> Result<Vec<String>, CatalogError> {
        let fetched = self.bounded(self.access.list_tables()).await?;

        let mut tables: Vec<String> = Vec::with_capacity(fetched.len());
        for name in fetched {
            if self.is_excluded(&name) || tables.contains(&name) {
                continue;
            }
            tables.push(name);
        }

        let tables = Arc::new(tables);
        *self.tables.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&tables));
        self.columns.retain(|name, _| tables.contains(name));
        self.refreshes.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(count = tables.len(), "table list refreshed");
        Ok(tables.as_ref().clone())
    }

    /// The last-fetched table set, fetching it on first use.
    pub async fn tables(&self) -> Result<Vec<String>, CatalogError> {
        match self.cached_tables() {
            Some(tables) => Ok(tables.as_ref().clone()),
            None => self.list_tables().await,
        }
    }

    /// Column metadata for `table`, served from cache after the first fetch.
    ///
    /// # Errors
    /// * `UnknownTable` - `table` is not in the last-fetched table set
    /// * `Unavailable` - the store could not be reached
    #[tracing::instrument(skip(self))]
    pub async fn columns(&self, table: &str) -> Result<Arc<Vec<Column>>, CatalogError> {
        let known = match self.cached_tables() {
            Some(tables) => tables,
            None => {
                self.list_tables().await?;
                self.cached_tables().unwrap_or_default()
            }
        };
        if !known.iter().any(|t| t == table) {
            return Err(CatalogError::UnknownTable {
                table: table.to_string(),
            });
        }

        if let Some(cached) = self.columns.get(table) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(table, "column cache hit");
            return Ok(Arc::clone(cached.value()));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let fetched = Arc::new(self.bounded(self.access.columns(table)).await?);
        let columns = Arc::clone(
            self.columns
                .entry(table.to_string())
                .or_insert_with(|| Arc::clone(&fetched))
                .value(),
        );

        // A refresh may have run while the fetch was in flight.
        let still_listed = self
            .cached_tables()
            .is_some_and(|tables| tables.iter().any(|t| t == table));
        if !still_listed {
            self.columns.remove(table);
            tracing::debug!(table, "table dropped during column fetch");
        }
        Ok(columns)
    }

    /// Columns of `table` wrapped as a [`TableSchema`].
    pub async fn schema(&self, table: &str) -> Result<TableSchema, CatalogError> {
        let columns = self.columns(table).await?;
        Ok(TableSchema::new(table, columns.as_ref().clone()))
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            cached_tables: self.columns.len() as u64,
            table_refreshes: self.refreshes.load(Ordering::Relaxed),
        }
    }

    fn cached_tables(&self) -> Option<Arc<Vec<String>>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_excluded(&self, table: &str) -> bool {
        self.excluded_prefixes
            .iter()
            .any(|prefix| table.starts_with(prefix.as_str()))
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, DataAccessError>>,
    ) -> Result<T, CatalogError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(CatalogError::from),
            Err(_) => Err(CatalogError::Unavailable {
                reason: format!("schema request timed out after {}ms", self.timeout.as_millis()),
            }),
        }
    }
}

impl std::fmt::Debug for SchemaCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCatalog")
            .field("excluded_prefixes", &self.excluded_prefixes)
            .field("timeout", &self.timeout)
            .field("stats", &self.stats())
            .finish()
    }
}
