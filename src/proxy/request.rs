//! Field requests
//!
//! Downstream views and datasets ask for proxy fields by name. A request is
//! either a plain column (`line_item_usage_amount`, `product`) or a single map
//! key (`resource_tags['user_cost_center']`).

use std::collections::BTreeSet;
use std::fmt;

use crate::cur_schema::errors::CurSchemaError;
use crate::cur_schema::expression_parser::{parse_cur_expression, subscript_sql, CurExpr};
use crate::cur_schema::field_table::FieldEquivalenceTable;
use crate::cur_schema::generation::SchemaGeneration;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetField {
    Plain(String),
    MapKey { container: String, key: String },
}

impl TargetField {
    pub fn parse(value: &str, table: &FieldEquivalenceTable) -> Result<Self, CurSchemaError> {
        let expr = parse_cur_expression(value)?;
        if let Some(name) = expr.as_column() {
            return Ok(TargetField::Plain(name.to_ascii_lowercase()));
        }

        match expr.as_subscript() {
            Some((container, key)) => {
                let container = container.to_ascii_lowercase();
                if !table.is_map_field(&container) {
                    return Err(CurSchemaError::identifier_error(
                        value,
                        format!("'{}' is not a map field", container),
                    ));
                }
                Ok(TargetField::MapKey {
                    container,
                    key: key.to_string(),
                })
            }
            None => Err(CurSchemaError::identifier_error(
                value,
                match expr {
                    CurExpr::FunctionCall { .. } => "expressions cannot be requested as fields",
                    _ => "expected a column name or container['key']",
                },
            )),
        }
    }
}

impl fmt::Display for TargetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetField::Plain(name) => f.write_str(name),
            TargetField::MapKey { container, key } => f.write_str(&subscript_sql(container, key)),
        }
    }
}

/// The set of target fields consumers need exposed in this run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilationRequest {
    fields: BTreeSet<TargetField>,
}

impl CompilationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a list of field identifiers
    pub fn parse<I, S>(fields: I, table: &FieldEquivalenceTable) -> Result<Self, CurSchemaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields = fields
            .into_iter()
            .map(|f| TargetField::parse(f.as_ref(), table))
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(CompilationRequest { fields })
    }

    /// The default column set of the target generation
    pub fn defaults(target: SchemaGeneration, table: &FieldEquivalenceTable) -> Self {
        let fields = table
            .default_fields(target)
            .iter()
            .filter_map(|f| TargetField::parse(f, table).ok())
            .collect();
        CompilationRequest { fields }
    }

    /// Use the given fields, or the target's defaults when none are given
    pub fn parse_or_defaults<I, S>(
        fields: I,
        target: SchemaGeneration,
        table: &FieldEquivalenceTable,
    ) -> Result<Self, CurSchemaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let request = Self::parse(fields, table)?;
        if request.is_empty() {
            Ok(Self::defaults(target, table))
        } else {
            Ok(request)
        }
    }

    pub fn insert(&mut self, field: TargetField) -> bool {
        self.fields.insert(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &TargetField> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
