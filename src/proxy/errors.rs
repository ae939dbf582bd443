//! Proxy compilation errors
//!
//! Only two conditions stop a compilation: a field nobody knows how to
//! derive (`UnknownField`), and an engine that rejects the generated DDL
//! (`Catalog`, passed through untouched). Missing source columns are handled
//! by NULL substitution and never surface here.

use thiserror::Error;

use crate::cur_schema::catalog::CatalogError;
use crate::cur_schema::errors::CurSchemaError;
use crate::cur_schema::generation::SchemaGeneration;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProxyError {
    #[error(
        "Cannot expose field '{field}' in the CUR{target} proxy: {reason}. \
         Add a mapping for it to the field equivalence table"
    )]
    UnknownField {
        field: String,
        target: SchemaGeneration,
        reason: String,
    },
    #[error("Invalid field request: {0}")]
    InvalidRequest(#[from] CurSchemaError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl ProxyError {
    pub fn unknown_field(
        field: impl Into<String>,
        target: SchemaGeneration,
        reason: impl Into<String>,
    ) -> Self {
        ProxyError::UnknownField {
            field: field.into(),
            target,
            reason: reason.into(),
        }
    }
}
