use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::cur_schema::generation::SchemaGeneration;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// One proxy compilation: which table to read and which layout to expose
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Source CUR table, optionally qualified as `database.table`
    #[validate(
        length(min = 1, message = "Source table cannot be empty"),
        custom(function = "validate_table_name")
    )]
    pub source_table: String,

    /// Database of the source table and the proxy view
    #[serde(default)]
    #[validate(custom(function = "validate_table_name"))]
    pub database: Option<String>,

    /// Source schema generation; detected from the table when absent
    #[serde(default)]
    pub source_version: Option<SchemaGeneration>,

    /// Generation whose layout the proxy view exposes
    pub target_version: SchemaGeneration,

    /// Fields to expose; the target's default column set when empty
    #[serde(default)]
    #[validate(length(max = 4096, message = "At most 4096 fields can be requested at once"))]
    pub fields: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            source_table: "cur".to_string(),
            database: None,
            source_version: None,
            target_version: SchemaGeneration::V2,
            fields: Vec::new(),
        }
    }
}

impl ProxyConfig {
    /// Create configuration from environment variables (and `.env`) with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Self {
            source_table: env::var("CUR_PROXY_SOURCE_TABLE")?,
            database: env::var("CUR_PROXY_DATABASE").ok(),
            source_version: match env::var("CUR_PROXY_SOURCE_VERSION") {
                Ok(value) => Some(parse_value("CUR_PROXY_SOURCE_VERSION", value)?),
                Err(_) => None,
            },
            target_version: parse_env_var("CUR_PROXY_TARGET_VERSION", "2")?,
            fields: env::var("CUR_PROXY_FIELDS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|f| !f.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments with validation
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let source_version = cli
            .source_version
            .map(|v| parse_value("source_version", v))
            .transpose()?;

        let config = Self {
            source_table: cli.source_table,
            database: cli.database,
            source_version,
            target_version: parse_value("target_version", cli.target_version)?,
            fields: cli.fields,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Overlay CLI-provided values on a file or environment configuration
    pub fn merge(&mut self, other: Self) {
        self.source_table = other.source_table;
        if other.database.is_some() {
            self.database = other.database;
        }
        if other.source_version.is_some() {
            self.source_version = other.source_version;
        }
        self.target_version = other.target_version;
        if !other.fields.is_empty() {
            self.fields = other.fields;
        }
    }

    /// Source table as referenced in SQL, `database.table` when a database is set
    pub fn qualified_source_table(&self) -> String {
        match &self.database {
            Some(db) if !self.source_table.contains('.') => format!("{}.{}", db, self.source_table),
            _ => self.source_table.clone(),
        }
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug)]
pub struct CliConfig {
    pub source_table: String,
    pub database: Option<String>,
    pub source_version: Option<String>,
    pub target_version: String,
    pub fields: Vec<String>,
}

/// Table and database names are plain SQL identifiers, optionally dotted
fn validate_table_name(name: &str) -> Result<(), ValidationError> {
    let valid = !name.is_empty()
        && name.split('.').all(|part| {
            !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(())
    } else {
        let mut error = ValidationError::new("table_name");
        error.message = Some(format!("'{}' is not a valid table name", name).into());
        Err(error)
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    parse_value(key, value)
}

fn parse_value<T: std::str::FromStr>(field: &str, value: String) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().map_err(|e| ConfigError::Parse {
        field: field.to_string(),
        value,
        source: Box::new(e),
    })
}
