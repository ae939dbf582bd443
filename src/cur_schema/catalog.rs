//! # Schema Catalog
//!
//! The query-engine seam. The proxy compiler never talks to an engine
//! directly, it goes through [`SchemaCatalog`]:
//!
//! - `list_columns`: column metadata for a table or view
//! - `get_definition_text`: the stored DDL text of an existing view
//! - `execute`: run a DDL statement
//!
//! Engine clients bring their own implementation (with whatever timeout and
//! retry behavior they have). [`InMemoryCatalog`] is a self-contained
//! implementation used by the offline CLI and the tests. It can be populated
//! programmatically or from a YAML catalog snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::column_info::ColumnInfo;

/// Errors reported by a catalog implementation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("Table or view '{name}' does not exist")]
    NotFound { name: String },
    #[error("Query engine rejected statement: {message}")]
    Engine { message: String },
    #[error("Failed to load catalog snapshot: {message}")]
    Snapshot { message: String },
}

pub type Result<T> = std::result::Result<T, CatalogError>;

#[async_trait]
pub trait SchemaCatalog: Send + Sync {
    /// Columns of a table or view in their declared order
    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// DDL text of an existing view
    async fn get_definition_text(&self, view: &str) -> Result<String>;

    /// Execute a statement; errors are engine-specific and returned as-is
    async fn execute(&self, sql: &str) -> Result<()>;
}

/// One table or view in a catalog snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogTable {
    pub columns: Vec<ColumnInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

/// Serialized catalog snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub tables: HashMap<String, CatalogTable>,
}

/// Counts of catalog round-trips, by operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list_columns: usize,
    pub get_definition_text: usize,
    pub execute: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.list_columns + self.get_definition_text + self.execute
    }
}

/// In-memory catalog for offline compilation and tests.
///
/// Tables are keyed by name exactly as the compiler refers to them (either
/// `table` or `database.table`). Executed statements are recorded in order,
/// and a `CREATE OR REPLACE VIEW <name>` statement stores its text as that
/// view's definition. Column metadata for views is not derived from DDL, it
/// must be registered with [`InMemoryCatalog::add_view`].
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    tables: Mutex<HashMap<String, CatalogTable>>,
    executed: Mutex<Vec<String>>,
    fail_execute_with: Mutex<Option<String>>,
    list_columns_calls: AtomicUsize,
    definition_calls: AtomicUsize,
    execute_calls: AtomicUsize,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let catalog = Self::new();
        *lock(&catalog.tables) = snapshot.tables;
        catalog
    }

    /// Load a catalog snapshot from YAML text
    pub fn from_yaml(text: &str) -> Result<Self> {
        let snapshot: CatalogSnapshot =
            serde_yaml::from_str(text).map_err(|e| CatalogError::Snapshot {
                message: e.to_string(),
            })?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::Snapshot {
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::from_yaml(&content)
    }

    pub fn add_table(&self, name: impl Into<String>, columns: Vec<ColumnInfo>) {
        lock(&self.tables).insert(
            name.into(),
            CatalogTable {
                columns,
                definition: None,
            },
        );
    }

    pub fn add_view(&self, name: impl Into<String>, columns: Vec<ColumnInfo>, definition: &str) {
        lock(&self.tables).insert(
            name.into(),
            CatalogTable {
                columns,
                definition: Some(definition.to_string()),
            },
        );
    }

    /// Make every subsequent `execute` fail with an engine error
    pub fn fail_execute(&self, message: impl Into<String>) {
        *lock(&self.fail_execute_with) = Some(message.into());
    }

    /// Statements executed so far, in order
    pub fn executed(&self) -> Vec<String> {
        lock(&self.executed).clone()
    }

    pub fn call_counts(&self) -> CallCounts {
        CallCounts {
            list_columns: self.list_columns_calls.load(Ordering::SeqCst),
            get_definition_text: self.definition_calls.load(Ordering::SeqCst),
            execute: self.execute_calls.load(Ordering::SeqCst),
        }
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            tables: lock(&self.tables).clone(),
        }
    }
}

#[async_trait]
impl SchemaCatalog for InMemoryCatalog {
    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.list_columns_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.tables)
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| CatalogError::NotFound {
                name: table.to_string(),
            })
    }

    async fn get_definition_text(&self, view: &str) -> Result<String> {
        self.definition_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.tables)
            .get(view)
            .and_then(|t| t.definition.clone())
            .ok_or_else(|| CatalogError::NotFound {
                name: view.to_string(),
            })
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = lock(&self.fail_execute_with).clone() {
            return Err(CatalogError::Engine { message });
        }

        debug!("InMemoryCatalog executing: {}", sql);
        lock(&self.executed).push(sql.to_string());

        if let Some(view) = created_view_name(sql) {
            let mut tables = lock(&self.tables);
            let entry = tables.entry(view).or_default();
            entry.definition = Some(sql.to_string());
        }
        Ok(())
    }
}

/// Name of the view created by a `CREATE OR REPLACE VIEW <name> AS ...` statement
fn created_view_name(sql: &str) -> Option<String> {
    let mut words = sql.split_whitespace();
    let prefix: Vec<String> = words
        .by_ref()
        .take(4)
        .map(|w| w.to_ascii_uppercase())
        .collect();
    if prefix != ["CREATE", "OR", "REPLACE", "VIEW"] {
        return None;
    }
    words.next().map(|name| name.to_string())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
