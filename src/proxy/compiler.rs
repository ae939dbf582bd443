//! # Proxy View Compiler
//!
//! Builds and deploys `cur{N}_proxy`, a view that exposes a CUR table of one
//! schema generation under the column layout of the other (or the same)
//! generation.
//!
//! `compile` is a function from `(snapshot, request)` to a new snapshot:
//!
//! 1. A `Compiled` snapshot that already covers the request is returned
//!    unchanged, without any engine round-trip.
//! 2. A `Fresh` snapshot means the live view was never read this run, so it
//!    is introspected first.
//! 3. The new state is the previous state plus the request. Nothing is
//!    ever removed.
//! 4. Every column is resolved and synthesized. An unknown field aborts
//!    here, before any DDL is sent.
//! 5. `CREATE OR REPLACE VIEW` is executed once. Engine errors pass through
//!    untouched.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, info};

use crate::cur_schema::catalog::SchemaCatalog;
use crate::cur_schema::expression_parser::column_sql;
use crate::cur_schema::field_table::{is_quoting_sensitive, FieldEquivalenceTable};
use crate::cur_schema::generation::SchemaGeneration;
use crate::cur_schema::source_table::CurTable;
use crate::cur_schema::sql_types::SqlType;

use super::errors::ProxyError;
use super::introspector::LiveViewIntrospector;
use super::request::CompilationRequest;
use super::resolver::FieldEquivalenceResolver;
use super::state::{ExposedViewState, Exposure, ViewSnapshot};
use super::synthesizer::ExpressionSynthesizer;

/// Result of one `compile` call
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutcome {
    /// The executed DDL, or `None` when the view already covered the request
    pub sql: Option<String>,
    /// Snapshot to pass into the next `compile` for this view
    pub snapshot: ViewSnapshot,
}

impl CompileOutcome {
    pub fn is_up_to_date(&self) -> bool {
        self.sql.is_none()
    }
}

pub struct ProxyViewCompiler<'t> {
    catalog: Arc<dyn SchemaCatalog>,
    table: &'t FieldEquivalenceTable,
    source: CurTable,
    target: SchemaGeneration,
    view_name: String,
}

impl<'t> ProxyViewCompiler<'t> {
    /// The view is created next to the source table (`db.cur` gives `db.cur2_proxy`)
    pub fn new(
        catalog: Arc<dyn SchemaCatalog>,
        table: &'t FieldEquivalenceTable,
        source: CurTable,
        target: SchemaGeneration,
    ) -> Self {
        let view_name = match source.name.rsplit_once('.') {
            Some((database, _)) => format!("{}.{}", database, target.proxy_view_name()),
            None => target.proxy_view_name(),
        };
        ProxyViewCompiler {
            catalog,
            table,
            source,
            target,
            view_name,
        }
    }

    pub fn view_name(&self) -> &str {
        &self.view_name
    }

    pub fn source(&self) -> &CurTable {
        &self.source
    }

    pub fn target(&self) -> SchemaGeneration {
        self.target
    }

    pub async fn compile(
        &self,
        snapshot: &ViewSnapshot,
        request: &CompilationRequest,
    ) -> Result<CompileOutcome, ProxyError> {
        let resolver =
            FieldEquivalenceResolver::new(self.table, self.source.generation, self.target);
        let requested: BTreeSet<Exposure> =
            request.fields().map(|f| resolver.exposure_of(f)).collect();

        let mut state = match snapshot {
            ViewSnapshot::Compiled(state) if state.covers(&requested) => {
                debug!(
                    "{} already exposes all {} requested fields",
                    self.view_name,
                    requested.len()
                );
                return Ok(CompileOutcome {
                    sql: None,
                    snapshot: snapshot.clone(),
                });
            }
            ViewSnapshot::Compiled(state) => state.clone(),
            ViewSnapshot::Fresh => {
                LiveViewIntrospector::new(self.catalog.as_ref(), self.table)
                    .introspect(&self.view_name)
                    .await
            }
        };
        state.extend(&requested);

        let sql = self.render(&resolver, &mut state)?;

        info!(
            "Creating {} over {} (CUR{} -> CUR{}, {} columns)",
            self.view_name,
            self.source.name,
            self.source.generation,
            self.target,
            state.columns().count()
        );
        debug!("{}", sql);
        self.catalog.execute(&sql).await?;

        Ok(CompileOutcome {
            sql: Some(sql),
            snapshot: ViewSnapshot::Compiled(state),
        })
    }

    /// Render the view DDL, recording each column's target type in `state`
    fn render(
        &self,
        resolver: &FieldEquivalenceResolver<'_>,
        state: &mut ExposedViewState,
    ) -> Result<String, ProxyError> {
        let exists = |requirement: &str| self.source.has_requirement(requirement);
        let synthesizer = ExpressionSynthesizer::new(self.table, self.target, &exists);

        let mut select = Vec::new();
        let mut types = Vec::new();
        for column in state.columns() {
            let resolution = resolver.resolve(column)?;
            let target_type = self.target_type(column, state);
            let expression =
                synthesizer.synthesize(column, target_type.as_ref(), &resolution, &state.keys(column))?;
            select.push(format!("{} AS {}", expression, alias_sql(column)));
            types.push((column.to_string(), target_type));
        }

        for (column, sql_type) in types {
            state.insert_column(column, sql_type);
        }

        Ok(format!(
            "CREATE OR REPLACE VIEW {} AS SELECT {} FROM {}",
            self.view_name,
            select.join(", "),
            self.source.name
        ))
    }

    /// Declared type, else the type recorded for the live view, else the
    /// source column type when no translation is involved
    fn target_type(&self, column: &str, state: &ExposedViewState) -> Option<SqlType> {
        self.table
            .declared_type(column, self.target)
            .or_else(|| state.column_type(column).cloned())
            .or_else(|| {
                (self.source.generation == self.target)
                    .then(|| self.source.column_type(column).cloned())
                    .flatten()
            })
    }
}

fn alias_sql(column: &str) -> String {
    if is_quoting_sensitive(column) {
        format!("\"{}\"", column)
    } else {
        column_sql(column)
    }
}
