//! # Field Equivalence Table
//!
//! The static, versioned mapping between V1 (flat) and V2 (flat + map) CUR
//! columns. The table ships inside the binary as a YAML resource
//! (`resources/cur_field_equivalence.yaml`), is parsed and validated once on
//! first use, and is immutable afterwards.
//!
//! Each entry pairs a V1 column name with the V2 expression yielding the same
//! value. Lookups in both directions are precomputed:
//!
//! - V1 name → V2 expression (`product_operating_system` → `product['operating_system']`)
//! - V2 flat name → V1 name (`line_item_usage_amount` → `line_item_usage_amount`)
//! - `(container, key)` → V1 name (`("product", "region")` → `product_region`)

use std::collections::{BTreeSet, HashMap};

use lazy_static::lazy_static;
use serde::Deserialize;

use super::errors::CurSchemaError;
use super::expression_parser::{parse_cur_expression, CurExpr};
use super::generation::SchemaGeneration;
use super::sql_types::SqlType;

const EMBEDDED_TABLE_YAML: &str = include_str!("../../resources/cur_field_equivalence.yaml");

/// Field-name suffixes that collide with SQL reserved words and must be quoted
const RESERVED_SUFFIXES: &[&str] = &["_interval"];

lazy_static! {
    static ref EMBEDDED_TABLE: Result<FieldEquivalenceTable, CurSchemaError> =
        FieldEquivalenceTable::from_yaml(EMBEDDED_TABLE_YAML);
}

#[derive(Debug, Deserialize)]
struct RawTable {
    version: String,
    map_fields: Vec<RawMapField>,
    fields: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawMapField {
    name: String,
    value_type: String,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    v1: String,
    v2: Option<String>,
    #[serde(rename = "type")]
    data_type: String,
    #[serde(default)]
    default: bool,
}

/// One V1 column and its V2 equivalent
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    pub v1_name: String,
    pub v2_expr: CurExpr,
    pub sql_type: SqlType,
    pub default: bool,
}

impl FieldEntry {
    /// V2 flat column name, if the V2 side is not a map subscript
    pub fn v2_flat_name(&self) -> Option<&str> {
        self.v2_expr.as_column()
    }
}

/// A V2 map-typed container and the type of its values
#[derive(Debug, Clone, PartialEq)]
pub struct MapField {
    pub name: String,
    pub value_type: SqlType,
}

impl MapField {
    pub fn sql_type(&self) -> SqlType {
        SqlType::map_of(self.value_type.clone())
    }

    /// V1 column holding `key` when no table entry names one
    pub fn flat_column(&self, key: &str) -> String {
        format!("{}_{}", self.name, key)
    }
}

#[derive(Debug)]
pub struct FieldEquivalenceTable {
    version: String,
    entries: Vec<FieldEntry>,
    map_fields: Vec<MapField>,
    by_v1: HashMap<String, usize>,
    by_v2_flat: HashMap<String, usize>,
    by_v2_subscript: HashMap<(String, String), usize>,
}

impl FieldEquivalenceTable {
    /// The table compiled into this binary
    pub fn embedded() -> Result<&'static FieldEquivalenceTable, CurSchemaError> {
        EMBEDDED_TABLE.as_ref().map_err(Clone::clone)
    }

    /// Parse and validate a table from YAML text
    pub fn from_yaml(text: &str) -> Result<Self, CurSchemaError> {
        let raw: RawTable =
            serde_yaml::from_str(text).map_err(|e| CurSchemaError::FieldTableParse {
                error: e.to_string(),
            })?;

        let map_fields: Vec<MapField> = raw
            .map_fields
            .into_iter()
            .map(|m| MapField {
                value_type: SqlType::parse(&m.value_type),
                name: m.name,
            })
            .collect();

        let mut table = FieldEquivalenceTable {
            version: raw.version,
            entries: Vec::with_capacity(raw.fields.len()),
            map_fields,
            by_v1: HashMap::new(),
            by_v2_flat: HashMap::new(),
            by_v2_subscript: HashMap::new(),
        };

        for raw_entry in raw.fields {
            let v2_text = raw_entry.v2.as_deref().unwrap_or(&raw_entry.v1);
            let v2_expr = parse_cur_expression(v2_text)
                .map_err(|e| CurSchemaError::entry_error(&raw_entry.v1, e.to_string()))?;

            let entry = FieldEntry {
                v1_name: raw_entry.v1,
                v2_expr,
                sql_type: SqlType::parse(&raw_entry.data_type),
                default: raw_entry.default,
            };
            table.insert(entry)?;
        }

        Ok(table)
    }

    fn insert(&mut self, entry: FieldEntry) -> Result<(), CurSchemaError> {
        let index = self.entries.len();
        let name = entry.v1_name.clone();

        if self.is_map_field(&name) {
            return Err(CurSchemaError::entry_error(
                &name,
                "V1 name collides with a map container",
            ));
        }
        if self.by_v1.insert(name.clone(), index).is_some() {
            return Err(CurSchemaError::entry_error(&name, "duplicate V1 name"));
        }

        if let Some((container, key)) = entry.v2_expr.as_subscript() {
            if !self.is_map_field(container) {
                return Err(CurSchemaError::entry_error(
                    &name,
                    format!("'{}' is not a known map container", container),
                ));
            }
            let slot = (container.to_string(), key.to_string());
            if self.by_v2_subscript.insert(slot, index).is_some() {
                return Err(CurSchemaError::entry_error(&name, "duplicate V2 map key"));
            }
        } else if let Some(flat) = entry.v2_flat_name() {
            if self.by_v2_flat.insert(flat.to_string(), index).is_some() {
                return Err(CurSchemaError::entry_error(&name, "duplicate V2 column"));
            }
        } else {
            return Err(CurSchemaError::entry_error(
                &name,
                "V2 side must be a column or a map subscript",
            ));
        }

        self.entries.push(entry);
        Ok(())
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn entries(&self) -> &[FieldEntry] {
        &self.entries
    }

    pub fn map_fields(&self) -> &[MapField] {
        &self.map_fields
    }

    pub fn map_field(&self, name: &str) -> Option<&MapField> {
        self.map_fields.iter().find(|m| m.name == name)
    }

    pub fn is_map_field(&self, name: &str) -> bool {
        self.map_field(name).is_some()
    }

    pub fn v1_entry(&self, v1_name: &str) -> Option<&FieldEntry> {
        self.by_v1.get(v1_name).map(|&i| &self.entries[i])
    }

    pub fn v2_flat_entry(&self, v2_name: &str) -> Option<&FieldEntry> {
        self.by_v2_flat.get(v2_name).map(|&i| &self.entries[i])
    }

    /// V1 column that carries `container[key]`
    pub fn v1_column_for_key(&self, container: &MapField, key: &str) -> String {
        self.by_v2_subscript
            .get(&(container.name.clone(), key.to_string()))
            .map(|&i| self.entries[i].v1_name.clone())
            .unwrap_or_else(|| container.flat_column(key))
    }

    /// Split a V1 name like `resource_tags_user_team` into its container and key.
    /// The longest matching container prefix wins.
    pub fn split_map_prefixed<'a>(&self, v1_name: &'a str) -> Option<(&MapField, &'a str)> {
        self.map_fields
            .iter()
            .filter_map(|m| {
                v1_name
                    .strip_prefix(m.name.as_str())
                    .and_then(|rest| rest.strip_prefix('_'))
                    .filter(|key| !key.is_empty())
                    .map(|key| (m, key))
            })
            .max_by_key(|(m, _)| m.name.len())
    }

    /// Declared carrier type of a field in the given generation's layout
    pub fn declared_type(&self, name: &str, generation: SchemaGeneration) -> Option<SqlType> {
        match generation {
            SchemaGeneration::V1 => self
                .v1_entry(name)
                .map(|e| e.sql_type.clone())
                .or_else(|| {
                    self.split_map_prefixed(name)
                        .map(|(m, _)| m.value_type.clone())
                }),
            SchemaGeneration::V2 => self
                .map_field(name)
                .map(MapField::sql_type)
                .or_else(|| self.v2_flat_entry(name).map(|e| e.sql_type.clone())),
        }
    }

    /// Field identifiers exposed when a caller requests no specific fields.
    ///
    /// For V2 this includes every map container, plus `container['key']`
    /// subscripts for default entries that live inside a map.
    pub fn default_fields(&self, generation: SchemaGeneration) -> BTreeSet<String> {
        let defaults = self.entries.iter().filter(|e| e.default);
        match generation {
            SchemaGeneration::V1 => defaults.map(|e| e.v1_name.clone()).collect(),
            SchemaGeneration::V2 => {
                let mut fields: BTreeSet<String> = defaults
                    .map(|e| match e.v2_flat_name() {
                        Some(flat) => flat.to_string(),
                        None => e.v2_expr.to_sql(),
                    })
                    .collect();
                fields.extend(self.map_fields.iter().map(|m| m.name.clone()));
                fields
            }
        }
    }
}

/// True if a column must be referenced as a quoted identifier in source SQL
pub fn is_quoting_sensitive(name: &str) -> bool {
    RESERVED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}
