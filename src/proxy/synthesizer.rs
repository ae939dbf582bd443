//! SQL expression synthesis for proxy view columns
//!
//! Turns a [`Resolution`] into the SQL expression of one view column. Rules,
//! in priority order:
//!
//! 1. A missing requirement with a NULL-renderable target type becomes that
//!    typed NULL literal.
//! 2. A missing requirement with any other type is an `UnknownField` error.
//! 3. Otherwise the resolved expression is emitted (a passthrough column, the
//!    table's V1 column, or the table's V2 expression / map subscript).
//! 4. Map containers assembled from V1 columns become
//!    `MAP(ARRAY[keys], ARRAY[values])`. Both arrays are split into groups of
//!    at most [`MAX_ARRAY_LITERAL_ELEMENTS`] joined with `||`.

use std::collections::BTreeSet;

use crate::cur_schema::expression_parser::{column_sql, quote_string};
use crate::cur_schema::field_table::{FieldEquivalenceTable, MapField};
use crate::cur_schema::generation::SchemaGeneration;
use crate::cur_schema::sql_types::{SqlType, NULL_MAP_LITERAL};

use super::diagnostics::{report_once, DiagnosticKind};
use super::errors::ProxyError;
use super::resolver::Resolution;

/// Query engine ceiling on elements in one literal `ARRAY[...]`
pub const MAX_ARRAY_LITERAL_ELEMENTS: usize = 254;

const NULL_VARCHAR_LITERAL: &str = "cast(null as varchar)";

pub struct ExpressionSynthesizer<'a> {
    table: &'a FieldEquivalenceTable,
    target: SchemaGeneration,
    exists: &'a dyn Fn(&str) -> bool,
}

impl<'a> ExpressionSynthesizer<'a> {
    pub fn new(
        table: &'a FieldEquivalenceTable,
        target: SchemaGeneration,
        exists: &'a dyn Fn(&str) -> bool,
    ) -> Self {
        ExpressionSynthesizer {
            table,
            target,
            exists,
        }
    }

    /// SQL expression for `field`. `keys` is the full key set for map assemblies
    pub fn synthesize(
        &self,
        field: &str,
        target_type: Option<&SqlType>,
        resolution: &Resolution,
        keys: &BTreeSet<String>,
    ) -> Result<String, ProxyError> {
        match resolution {
            Resolution::Derived {
                expression,
                requirements,
            } => {
                let missing = requirements.iter().find(|r| !(self.exists)(r));
                match missing {
                    None => Ok(expression.to_sql()),
                    Some(requirement) => self.null_for_missing(field, requirement, target_type),
                }
            }
            Resolution::MapAssembly { container } => Ok(self.assemble_map(container, keys)),
        }
    }

    fn null_for_missing(
        &self,
        field: &str,
        requirement: &str,
        target_type: Option<&SqlType>,
    ) -> Result<String, ProxyError> {
        match target_type.and_then(SqlType::null_literal) {
            Some(literal) => {
                report_once(DiagnosticKind::MissingRequirement, field, || {
                    format!(
                        "Source column '{}' not found, exposing '{}' as NULL",
                        requirement, field
                    )
                });
                Ok(literal.to_string())
            }
            None => {
                let reason = match target_type {
                    Some(ty) => format!(
                        "source column '{}' is missing and type '{}' has no NULL rendering",
                        requirement, ty
                    ),
                    None => format!(
                        "source column '{}' is missing and the field type is unknown",
                        requirement
                    ),
                };
                Err(ProxyError::unknown_field(field, self.target, reason))
            }
        }
    }

    fn assemble_map(&self, container: &MapField, keys: &BTreeSet<String>) -> String {
        if keys.is_empty() {
            return NULL_MAP_LITERAL.to_string();
        }

        let null_value = container
            .value_type
            .null_literal()
            .unwrap_or(NULL_VARCHAR_LITERAL);

        let mut key_literals = Vec::with_capacity(keys.len());
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let column = self.table.v1_column_for_key(container, key);
            key_literals.push(quote_string(key));
            if (self.exists)(&column) {
                values.push(column_sql(&column));
            } else {
                let subject = format!("{}['{}']", container.name, key);
                report_once(DiagnosticKind::MissingRequirement, &subject, || {
                    format!(
                        "Source column '{}' not found, exposing {} as NULL",
                        column, subject
                    )
                });
                values.push(null_value.to_string());
            }
        }

        render_map(&key_literals, &values)
    }
}

/// `MAP(ARRAY[k..], ARRAY[v..])`, chunking both arrays at the engine ceiling
pub fn render_map(keys: &[String], values: &[String]) -> String {
    format!(
        "MAP({}, {})",
        render_chunked_array(keys, ","),
        render_chunked_array(values, ", ")
    )
}

fn render_chunked_array(items: &[String], separator: &str) -> String {
    items
        .chunks(MAX_ARRAY_LITERAL_ELEMENTS)
        .map(|chunk| format!("ARRAY[{}]", chunk.join(separator)))
        .collect::<Vec<_>>()
        .join(" || ")
}
