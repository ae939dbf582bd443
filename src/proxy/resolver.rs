//! Field equivalence resolution
//!
//! Maps each field of the target layout to what it needs from the source
//! table. Resolution is pure. It reads the equivalence table and nothing
//! else, and it is an exhaustive match over the `(source, target)` generation
//! pair with one function per arm.

use log::debug;

use crate::cur_schema::expression_parser::{needs_quoting, subscript_sql, CurExpr};
use crate::cur_schema::field_table::{is_quoting_sensitive, FieldEquivalenceTable, MapField};
use crate::cur_schema::generation::SchemaGeneration;

use super::diagnostics::{report_once, DiagnosticKind};
use super::errors::ProxyError;
use super::request::TargetField;
use super::state::Exposure;

/// How a target field is derived from the source table
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// `expression` over the source table, valid when every requirement exists.
    /// Requirements are base identifiers, or `container['key']` for map lookups.
    /// A bare map container passed through from a V2 source has none.
    Derived {
        expression: CurExpr,
        requirements: Vec<String>,
    },
    /// A V2 map container assembled from one flat V1 column per key
    MapAssembly { container: MapField },
}

impl Resolution {
    pub fn requirements(&self) -> &[String] {
        match self {
            Resolution::Derived { requirements, .. } => requirements,
            Resolution::MapAssembly { .. } => &[],
        }
    }
}

pub struct FieldEquivalenceResolver<'t> {
    table: &'t FieldEquivalenceTable,
    source: SchemaGeneration,
    target: SchemaGeneration,
}

impl<'t> FieldEquivalenceResolver<'t> {
    pub fn new(
        table: &'t FieldEquivalenceTable,
        source: SchemaGeneration,
        target: SchemaGeneration,
    ) -> Self {
        FieldEquivalenceResolver {
            table,
            source,
            target,
        }
    }

    /// The view column (and map key) a requested field occupies in the target layout.
    ///
    /// In a V2 layout `container['key']` lives inside the `container` column.
    /// In a V1 layout the same key is its own flat column, `container_key`,
    /// lowercased like every other column name the engine reports.
    pub fn exposure_of(&self, field: &TargetField) -> Exposure {
        match (field, self.target) {
            (TargetField::Plain(name), _) => Exposure::column(name.clone()),
            (TargetField::MapKey { container, key }, SchemaGeneration::V2) => {
                Exposure::map_key(container.clone(), key.clone())
            }
            (TargetField::MapKey { container, key }, SchemaGeneration::V1) => {
                let column = match self.table.map_field(container) {
                    Some(map_field) => self.table.v1_column_for_key(map_field, key),
                    None => format!("{}_{}", container, key),
                };
                Exposure::column(column.to_ascii_lowercase())
            }
        }
    }

    /// Resolve one exposed column of the target layout
    pub fn resolve(&self, field: &str) -> Result<Resolution, ProxyError> {
        match (self.source, self.target) {
            (SchemaGeneration::V1, SchemaGeneration::V1)
            | (SchemaGeneration::V2, SchemaGeneration::V2) => Ok(resolve_passthrough(field)),
            (SchemaGeneration::V1, SchemaGeneration::V2) => self.resolve_flat_to_map(field),
            (SchemaGeneration::V2, SchemaGeneration::V1) => self.resolve_map_to_flat(field),
        }
    }

    /// V1 source exposed in the V2 layout
    fn resolve_flat_to_map(&self, field: &str) -> Result<Resolution, ProxyError> {
        if let Some(container) = self.table.map_field(field) {
            report_once(DiagnosticKind::MapContainer, field, || {
                format!(
                    "'{}' is a map container with no single V1 column, assembling it from '{}_*' columns",
                    field, field
                )
            });
            return Ok(Resolution::MapAssembly {
                container: container.clone(),
            });
        }

        match self.table.v2_flat_entry(field) {
            Some(entry) => Ok(resolve_passthrough(&entry.v1_name)),
            None => Err(self.unknown(field, "no V1 column maps to this V2 field")),
        }
    }

    /// V2 source exposed in the V1 layout
    fn resolve_map_to_flat(&self, field: &str) -> Result<Resolution, ProxyError> {
        if self.table.is_map_field(field) {
            debug!("'{}' is a bare map container, passing it through", field);
            return Ok(Resolution::Derived {
                expression: CurExpr::Column(field.to_string()),
                requirements: vec![],
            });
        }

        if let Some(entry) = self.table.v1_entry(field) {
            return Ok(Resolution::Derived {
                requirements: entry.v2_expr.requirements(),
                expression: entry.v2_expr.clone(),
            });
        }

        if let Some((container, key)) = self.table.split_map_prefixed(field) {
            return Ok(Resolution::Derived {
                expression: CurExpr::Subscript {
                    container: Box::new(CurExpr::Column(container.name.clone())),
                    key: key.to_string(),
                },
                requirements: vec![subscript_sql(&container.name, key)],
            });
        }

        Err(self.unknown(field, "no V2 expression maps to this V1 field"))
    }

    fn unknown(&self, field: &str, reason: &str) -> ProxyError {
        report_once(DiagnosticKind::UnknownField, field, || {
            format!(
                "Field '{}' cannot be derived for a CUR{} -> CUR{} proxy: {}",
                field, self.source, self.target, reason
            )
        });
        ProxyError::unknown_field(field, self.target, reason)
    }
}

/// Same-name column reference, quoted when the name ends in a reserved word
/// or isn't a plain identifier
fn resolve_passthrough(column: &str) -> Resolution {
    let expression = if is_quoting_sensitive(column) || needs_quoting(column) {
        CurExpr::QuotedColumn(column.to_string())
    } else {
        CurExpr::Column(column.to_string())
    };
    Resolution::Derived {
        requirements: expression.base_columns(),
        expression,
    }
}
