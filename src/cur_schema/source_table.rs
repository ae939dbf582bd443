//! Source CUR table metadata and schema generation detection
//!
//! The proxy compiler needs two facts about its source table: which columns
//! exist (for NULL substitution) and which CUR generation it is. Both are
//! read once per compiler instance.

use std::collections::HashMap;

use log::{debug, info};

use super::catalog::{CatalogError, SchemaCatalog};
use super::column_info::ColumnInfo;
use super::expression_parser::parse_cur_expression;
use super::field_table::FieldEquivalenceTable;
use super::generation::SchemaGeneration;
use super::sql_types::SqlType;

#[derive(Debug, Clone)]
pub struct CurTable {
    /// Table reference as used in SQL (`table` or `database.table`)
    pub name: String,
    pub generation: SchemaGeneration,
    columns: HashMap<String, SqlType>,
}

impl CurTable {
    pub fn new(
        name: impl Into<String>,
        generation: SchemaGeneration,
        columns: &[ColumnInfo],
    ) -> Self {
        CurTable {
            name: name.into(),
            generation,
            columns: columns
                .iter()
                .map(|c| (c.name.to_ascii_lowercase(), c.sql_type()))
                .collect(),
        }
    }

    /// Read the source table's columns and detect its generation unless one is given
    pub async fn load(
        catalog: &dyn SchemaCatalog,
        name: &str,
        generation: Option<SchemaGeneration>,
        table: &FieldEquivalenceTable,
    ) -> Result<Self, CatalogError> {
        let columns = catalog.list_columns(name).await?;
        debug!("Source table {} has {} columns", name, columns.len());

        let generation = match generation {
            Some(generation) => generation,
            None => {
                let detected = detect_generation(&columns, table);
                info!("Detected CUR{} schema for table {}", detected, name);
                detected
            }
        };

        Ok(CurTable::new(name, generation, &columns))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(&name.to_ascii_lowercase())
    }

    pub fn column_type(&self, name: &str) -> Option<&SqlType> {
        self.columns.get(&name.to_ascii_lowercase())
    }

    /// Whether a resolver requirement is satisfiable.
    ///
    /// `container['key']` only needs the container column. Map keys aren't
    /// part of the column metadata.
    pub fn has_requirement(&self, requirement: &str) -> bool {
        match parse_cur_expression(requirement) {
            Ok(expr) => match expr.as_subscript() {
                Some((container, _)) => self.has_column(container),
                None => self.has_column(requirement.trim_matches('"')),
            },
            Err(_) => self.has_column(requirement),
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// A table is CUR2 if any of the V2 map containers is present as a map column
pub fn detect_generation(columns: &[ColumnInfo], table: &FieldEquivalenceTable) -> SchemaGeneration {
    let has_map_container = columns
        .iter()
        .any(|c| table.is_map_field(&c.name.to_ascii_lowercase()) && c.sql_type().is_map());

    if has_map_container {
        SchemaGeneration::V2
    } else {
        SchemaGeneration::V1
    }
}
