//! CUR schema generations
//!
//! AWS publishes two incompatible Cost and Usage Report layouts:
//! - **V1** ("legacy CUR"): every attribute is a flat column, including one
//!   column per product attribute, resource tag and cost category.
//! - **V2** ("CUR 2.0"): mostly flat columns, plus map-typed columns
//!   (`product`, `resource_tags`, `cost_category`, `discount`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::CurSchemaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SchemaGeneration {
    V1,
    V2,
}

impl SchemaGeneration {
    /// Version digit as used in view names (`cur2_proxy`) and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaGeneration::V1 => "1",
            SchemaGeneration::V2 => "2",
        }
    }

    /// Deterministic name of the proxy view exposing this generation
    pub fn proxy_view_name(&self) -> String {
        format!("cur{}_proxy", self.as_str())
    }

    pub fn other(&self) -> SchemaGeneration {
        match self {
            SchemaGeneration::V1 => SchemaGeneration::V2,
            SchemaGeneration::V2 => SchemaGeneration::V1,
        }
    }
}

impl fmt::Display for SchemaGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaGeneration {
    type Err = CurSchemaError;

    /// Accepts `1`, `v1`, `cur1` (and the same for 2), case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let digit = lowered
            .strip_prefix("cur")
            .or_else(|| lowered.strip_prefix('v'))
            .unwrap_or(&lowered);
        match digit {
            "1" => Ok(SchemaGeneration::V1),
            "2" => Ok(SchemaGeneration::V2),
            _ => Err(CurSchemaError::InvalidGeneration {
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for SchemaGeneration {
    type Error = CurSchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SchemaGeneration> for String {
    fn from(generation: SchemaGeneration) -> Self {
        generation.as_str().to_string()
    }
}
