//! Live view introspection
//!
//! Recovers what an existing proxy view exposes so a recompilation never
//! drops columns or map keys. Only this compiler's own output is understood:
//! map columns are read back from `MAP(ARRAY[keys], ARRAY[values]) AS column`
//! in the stored definition. Failures are never fatal. They produce an empty
//! (or partial) state and a warning.

use std::sync::LazyLock;

use log::{debug, warn};
use nom::{
    bytes::complete::tag,
    character::complete::multispace0,
    combinator::all_consuming,
    multi::separated_list0,
    sequence::delimited,
    Parser,
};
use regex::Regex;

use crate::cur_schema::catalog::SchemaCatalog;
use crate::cur_schema::expression_parser::parse_sql_string;
use crate::cur_schema::field_table::FieldEquivalenceTable;

use super::state::ExposedViewState;

/// Joint between two chunks of one logical array: `] || ARRAY[`
static ARRAY_CONCATENATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\]\s*\|\|\s*ARRAY\s*\[").unwrap());

pub struct LiveViewIntrospector<'a> {
    catalog: &'a dyn SchemaCatalog,
    table: &'a FieldEquivalenceTable,
}

impl<'a> LiveViewIntrospector<'a> {
    pub fn new(catalog: &'a dyn SchemaCatalog, table: &'a FieldEquivalenceTable) -> Self {
        LiveViewIntrospector { catalog, table }
    }

    /// Exposed columns and map keys of `view`; empty when the view can't be read
    pub async fn introspect(&self, view: &str) -> ExposedViewState {
        let mut state = ExposedViewState::new();

        let columns = match self.catalog.list_columns(view).await {
            Ok(columns) => columns,
            Err(e) => {
                warn!("Could not read columns of view {}, treating it as empty: {}", view, e);
                return state;
            }
        };

        let mut map_columns = Vec::new();
        for column in &columns {
            let name = column.name.to_ascii_lowercase();
            let sql_type = column.sql_type();
            if sql_type.is_map() || self.table.is_map_field(&name) {
                map_columns.push(name.clone());
            }
            let known = !column.data_type.eq_ignore_ascii_case("unknown");
            state.insert_column(name, known.then_some(sql_type));
        }

        if map_columns.is_empty() {
            return state;
        }

        let definition = match self.catalog.get_definition_text(view).await {
            Ok(text) => collapse_array_concatenation(&text),
            Err(e) => {
                warn!(
                    "Could not read definition of view {}, map keys will not be preserved: {}",
                    view, e
                );
                return state;
            }
        };

        for column in &map_columns {
            match parse_map_keys(&definition, column) {
                Some(keys) => {
                    debug!("View {} exposes {} keys in {}", view, keys.len(), column);
                    state.insert_keys(column, keys);
                }
                None => warn!(
                    "Map column {} of view {} is not in the expected MAP(ARRAY[...], ARRAY[...]) form, its keys will not be preserved",
                    column, view
                ),
            }
        }

        state
    }
}

/// Merge chunked `ARRAY[a] || ARRAY[b]` literals into `ARRAY[a, b]`
pub fn collapse_array_concatenation(sql: &str) -> String {
    ARRAY_CONCATENATION.replace_all(sql, ", ").into_owned()
}

/// Keys of `MAP(ARRAY['k', ...], ARRAY[...]) AS column` in an unchunked definition.
///
/// Best effort: a key containing `]` is not supported, and neither is the text
/// `] || ARRAY[` inside a key literal. Tag keys can't contain `]`.
pub fn parse_map_keys(sql: &str, column: &str) -> Option<Vec<String>> {
    let pattern = format!(
        r#"(?i)MAP\s*\(\s*ARRAY\s*\[([^\]]*)\]\s*,\s*ARRAY\s*\[[^\]]*\]\s*\)\s+AS\s+"?{}"?(?:[\s,]|$)"#,
        regex::escape(column)
    );
    let re = Regex::new(&pattern).ok()?;
    let key_list = re.captures(sql)?.get(1)?.as_str();
    parse_key_list(key_list)
}

fn parse_key_list(input: &str) -> Option<Vec<String>> {
    let separator = delimited(multispace0, tag(","), multispace0);
    let mut parser = all_consuming(delimited(
        multispace0,
        separated_list0(separator, parse_sql_string),
        multispace0,
    ));
    parser.parse(input).ok().map(|(_, keys)| keys)
}
