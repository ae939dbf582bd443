//! Catalog column metadata
//!
//! This is the unit of metadata the query engine returns for tables and
//! views: a column name and its engine-reported type string.

use serde::{Deserialize, Serialize};

use super::sql_types::SqlType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    pub fn sql_type(&self) -> SqlType {
        SqlType::parse(&self.data_type)
    }
}
