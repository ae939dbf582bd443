//! SQL carrier types of CUR columns
//!
//! Catalog metadata reports types as free-form strings (`varchar`,
//! `timestamp(3)`, `map(varchar, varchar)`, `map<string,double>`, ...).
//! Only the handful of types that have a NULL literal rendering matter to the
//! proxy compiler, everything else is kept verbatim in [`SqlType::Other`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// NULL literal used for any map-typed field
pub const NULL_MAP_LITERAL: &str = "cast(NULL AS MAP<VARCHAR, VARCHAR>)";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SqlType {
    Varchar,
    Double,
    Timestamp,
    Map { value: Box<SqlType> },
    Other(String),
}

impl SqlType {
    /// Parse a catalog type string. Never fails: unrecognised types become `Other`.
    pub fn parse(raw: &str) -> SqlType {
        let normalized = raw.trim().to_ascii_lowercase();
        let base = normalized
            .split(|c| c == '(' || c == '<')
            .next()
            .unwrap_or("")
            .trim();

        match base {
            "varchar" | "string" | "char" => SqlType::Varchar,
            "double" => SqlType::Double,
            "timestamp" => SqlType::Timestamp,
            "map" => SqlType::Map {
                value: Box::new(parse_map_value_type(&normalized)),
            },
            _ => SqlType::Other(raw.trim().to_string()),
        }
    }

    pub fn map_of(value: SqlType) -> SqlType {
        SqlType::Map {
            value: Box::new(value),
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, SqlType::Map { .. })
    }

    /// The typed NULL literal for this type, if one is defined
    pub fn null_literal(&self) -> Option<&'static str> {
        match self {
            SqlType::Varchar => Some("cast(null as varchar)"),
            SqlType::Double => Some("cast(null as double)"),
            SqlType::Timestamp => Some("cast(null as timestamp)"),
            SqlType::Map { .. } => Some(NULL_MAP_LITERAL),
            SqlType::Other(_) => None,
        }
    }
}

/// Extract the value type from `map(k, v)` / `map<k,v>`; defaults to varchar
fn parse_map_value_type(normalized: &str) -> SqlType {
    let inner = normalized
        .find(|c| c == '(' || c == '<')
        .map(|start| &normalized[start + 1..])
        .map(|rest| rest.trim_end_matches(|c| c == ')' || c == '>'))
        .unwrap_or("");

    match inner.split_once(',') {
        Some((_, value)) => SqlType::parse(value),
        None => SqlType::Varchar,
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Varchar => f.write_str("varchar"),
            SqlType::Double => f.write_str("double"),
            SqlType::Timestamp => f.write_str("timestamp"),
            SqlType::Map { value } => write!(f, "map(varchar, {})", value),
            SqlType::Other(raw) => f.write_str(raw),
        }
    }
}

impl From<String> for SqlType {
    fn from(raw: String) -> Self {
        SqlType::parse(&raw)
    }
}

impl From<SqlType> for String {
    fn from(ty: SqlType) -> Self {
        ty.to_string()
    }
}
