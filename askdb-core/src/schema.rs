//! Table and column metadata as reported by the data store.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Column metadata for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name, case preserved as reported by the store
    pub name: String,
    /// Reported type name (e.g., "VARCHAR", "INTEGER", "DATETIME")
    pub type_name: String,
    /// Declared size, when the store reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    /// Nullability flag, when the store reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Column {
    /// Create a column with only a name and type.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            size: None,
            nullable: None,
            description: None,
        }
    }

    pub fn with_size(mut self, size: i64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Render as a single prompt line, e.g. `- item_id (VARCHAR(20), NOT NULL)`.
    pub fn prompt_line(&self) -> String {
        let mut line = format!("- {} ({}", self.name, self.type_name);
        if let Some(size) = self.size {
            let _ = write!(line, "({})", size);
        }
        match self.nullable {
            Some(true) => line.push_str(", NULL"),
            Some(false) => line.push_str(", NOT NULL"),
            None => {}
        }
        line.push(')');
        if let Some(description) = self.description.as_deref().filter(|d| !d.trim().is_empty()) {
            let _ = write!(line, ": {}", description.trim());
        }
        line
    }
}

/// A table together with its ordered columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Look up a column by exact name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Render the table header followed by one line per column.
    pub fn prompt_block(&self) -> String {
        let mut block = format!("Table {}:", self.name);
        for column in &self.columns {
            block.push('\n');
            block.push_str(&column.prompt_line());
        }
        block
    }
}
