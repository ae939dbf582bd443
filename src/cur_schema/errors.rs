//! # CUR Schema Error Types
//!
//! Errors raised while loading the field-equivalence table, parsing field
//! identifiers and interpreting catalog metadata.
//!
//! ## Error Categories
//!
//! - **Table Errors**: the embedded equivalence table is malformed (a build defect)
//! - **Identifier Errors**: a requested field name or table expression does not parse
//! - **Generation Errors**: an unrecognised schema generation string

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CurSchemaError {
    #[error("Unknown CUR schema generation '{value}' (expected 1 or 2)")]
    InvalidGeneration { value: String },
    #[error("Invalid field identifier '{value}': {reason}")]
    InvalidIdentifier { value: String, reason: String },
    #[error("Failed to parse field equivalence table: {error}")]
    FieldTableParse { error: String },
    #[error("Invalid field equivalence table entry '{entry}': {message}")]
    FieldTableEntry { entry: String, message: String },
}

impl CurSchemaError {
    /// Create an identifier error, keeping the offending text for the message
    ///
    /// # Example
    /// ```ignore
    /// CurSchemaError::identifier_error("product['region'", "unclosed subscript")
    /// ```
    pub fn identifier_error(value: impl Into<String>, reason: impl Into<String>) -> Self {
        CurSchemaError::InvalidIdentifier {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn entry_error(entry: impl Into<String>, message: impl Into<String>) -> Self {
        CurSchemaError::FieldTableEntry {
            entry: entry.into(),
            message: message.into(),
        }
    }
}
