//! Unit tests - tests that exercise one component without a query engine
//!
//! Each file targets a single component through the public API.

mod field_table_tests;
mod request_tests;
mod synthesizer_tests;
