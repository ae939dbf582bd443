pub mod catalog;
pub mod column_info;
pub mod errors;
pub mod expression_parser;
pub mod field_table;
pub mod generation;
pub mod source_table;
pub mod sql_types;

// Re-export commonly used types
pub use catalog::{CatalogError, InMemoryCatalog, SchemaCatalog};
pub use column_info::ColumnInfo;
pub use errors::CurSchemaError;
pub use field_table::{FieldEquivalenceTable, MapField};
pub use generation::SchemaGeneration;
pub use source_table::CurTable;
pub use sql_types::SqlType;
