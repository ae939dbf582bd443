//! Exposed view state
//!
//! What a proxy view currently exposes: its columns (with their carrier
//! types, when known) and, per map column, the keys baked into its map
//! expression. A state only ever grows. `extend` adds and nothing removes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::cur_schema::column_info::ColumnInfo;
use crate::cur_schema::sql_types::SqlType;

/// One exposed identifier: a column, or a key inside a map column
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Exposure {
    pub column: String,
    pub key: Option<String>,
}

impl Exposure {
    pub fn column(name: impl Into<String>) -> Self {
        Exposure {
            column: name.into(),
            key: None,
        }
    }

    pub fn map_key(container: impl Into<String>, key: impl Into<String>) -> Self {
        Exposure {
            column: container.into(),
            key: Some(key.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposedViewState {
    columns: BTreeMap<String, Option<SqlType>>,
    #[serde(default)]
    map_keys: BTreeMap<String, BTreeSet<String>>,
}

impl ExposedViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in sorted order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_type(&self, name: &str) -> Option<&SqlType> {
        self.columns.get(name).and_then(Option::as_ref)
    }

    /// Keys baked into a map column; empty for non-map columns
    pub fn keys(&self, column: &str) -> BTreeSet<String> {
        self.map_keys.get(column).cloned().unwrap_or_default()
    }

    pub fn contains(&self, exposure: &Exposure) -> bool {
        if !self.columns.contains_key(&exposure.column) {
            return false;
        }
        match &exposure.key {
            None => true,
            Some(key) => self
                .map_keys
                .get(&exposure.column)
                .is_some_and(|keys| keys.contains(key)),
        }
    }

    pub fn covers<'a, I>(&self, exposures: I) -> bool
    where
        I: IntoIterator<Item = &'a Exposure>,
    {
        exposures.into_iter().all(|e| self.contains(e))
    }

    pub fn expose(&mut self, exposure: &Exposure) {
        self.columns.entry(exposure.column.clone()).or_insert(None);
        if let Some(key) = &exposure.key {
            self.map_keys
                .entry(exposure.column.clone())
                .or_default()
                .insert(key.clone());
        }
    }

    pub fn extend<'a, I>(&mut self, exposures: I)
    where
        I: IntoIterator<Item = &'a Exposure>,
    {
        for exposure in exposures {
            self.expose(exposure);
        }
    }

    /// Record a column; an already known type is kept when `sql_type` is `None`
    pub fn insert_column(&mut self, name: impl Into<String>, sql_type: Option<SqlType>) {
        let slot = self.columns.entry(name.into()).or_insert(None);
        if sql_type.is_some() {
            *slot = sql_type;
        }
    }

    pub fn insert_keys<I, S>(&mut self, column: &str, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.map_keys
            .entry(column.to_string())
            .or_default()
            .extend(keys.into_iter().map(Into::into));
    }

    /// Every exposed identifier: one per column plus one per map key
    pub fn exposures(&self) -> BTreeSet<Exposure> {
        let mut all: BTreeSet<Exposure> = self
            .columns
            .keys()
            .map(|c| Exposure::column(c.clone()))
            .collect();
        for (column, keys) in &self.map_keys {
            all.extend(keys.iter().map(|k| Exposure::map_key(column.clone(), k.clone())));
        }
        all
    }

    /// Column metadata as the engine would report it for this view
    pub fn column_infos(&self) -> Vec<ColumnInfo> {
        self.columns
            .iter()
            .map(|(name, ty)| {
                let data_type = ty
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "unknown".to_string());
                ColumnInfo::new(name.clone(), data_type)
            })
            .collect()
    }
}

/// Where a compiler stands for one view during a deployment run.
///
/// `Fresh` means nothing has been compiled yet this run, so the live view
/// must be introspected before it is replaced. `Compiled` carries the state
/// produced by the last successful compilation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum ViewSnapshot {
    #[default]
    Fresh,
    Compiled(ExposedViewState),
}

impl ViewSnapshot {
    pub fn state(&self) -> Option<&ExposedViewState> {
        match self {
            ViewSnapshot::Fresh => None,
            ViewSnapshot::Compiled(state) => Some(state),
        }
    }
}
