//! YAML schema snapshot export.
//!
//! Walks the catalog, counts rows per table and records the columns of every
//! table holding more than one row. Tables whose count or column fetch fails
//! are skipped with a warning.

use crate::access::QueryResponse;
use crate::catalog::SchemaCatalog;
use askdb_core::{CatalogError, Column, FewShotExample, SqlDialect};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub database: DatabaseInfo,
    pub tables: Vec<TableSnapshot>,
    #[serde(default)]
    pub few_shot_examples: Vec<FewShotExample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub name: String,
    /// Tables listed by the store, before row-count filtering
    pub total_tables: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub name: String,
    pub row_count: i64,
    pub columns: Vec<Column>,
}

impl SchemaSnapshot {
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Build a snapshot of every table with more than one row.
///
/// Only the table list is required; per-table failures are logged and skipped.
#[tracing::instrument(skip_all, fields(database = database_name))]
pub async fn export_snapshot(
    catalog: &SchemaCatalog,
    dialect: &dyn SqlDialect,
    database_name: &str,
    few_shot_examples: &[FewShotExample],
) -> Result<SchemaSnapshot, CatalogError> {
    let tables = catalog.list_tables().await?;
    let mut snapshot = SchemaSnapshot {
        database: DatabaseInfo {
            name: database_name.to_string(),
            total_tables: tables.len(),
        },
        tables: Vec::new(),
        few_shot_examples: few_shot_examples.to_vec(),
    };

    for table in tables {
        let row_count = match count_rows(catalog, dialect, &table).await {
            Ok(count) => count,
            Err(reason) => {
                tracing::warn!(table = %table, %reason, "skipping table: row count failed");
                continue;
            }
        };
        if row_count <= 1 {
            tracing::debug!(table = %table, row_count, "skipping near-empty table");
            continue;
        }

        match catalog.columns(&table).await {
            Ok(columns) => snapshot.tables.push(TableSnapshot {
                name: table,
                row_count,
                columns: columns.as_ref().clone(),
            }),
            Err(err) => {
                tracing::warn!(table = %table, error = %err, "skipping table: column fetch failed");
            }
        }
    }

    tracing::info!(
        listed = snapshot.database.total_tables,
        exported = snapshot.tables.len(),
        "schema snapshot built"
    );
    Ok(snapshot)
}

async fn count_rows(
    catalog: &SchemaCatalog,
    dialect: &dyn SqlDialect,
    table: &str,
) -> Result<i64, String> {
    let sql = dialect.count_rows_query(table);
    match catalog.access().query(&sql).await {
        Ok(QueryResponse::Rows(rows)) => rows
            .first()
            .and_then(|row| row.first())
            .and_then(|value| value.as_i64())
            .ok_or_else(|| "count query returned no integer".to_string()),
        Ok(QueryResponse::Error(message)) => Err(message),
        Err(err) => Err(err.to_string()),
    }
}
