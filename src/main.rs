use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::info;

use curproxy::config::{CliConfig, ProxyConfig};
use curproxy::cur_schema::{CurTable, FieldEquivalenceTable, InMemoryCatalog};
use curproxy::proxy::{CompilationRequest, ProxyViewCompiler, ViewSnapshot};

/// cur-proxy - compile a CUR schema proxy view against a catalog snapshot
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Catalog snapshot (YAML) with the source table and any existing proxy view
    #[arg(long)]
    catalog: PathBuf,

    /// Proxy configuration file (YAML); CLI options override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source CUR table, optionally `database.table`
    #[arg(long)]
    source_table: Option<String>,

    /// Database of the source table and the proxy view
    #[arg(long)]
    database: Option<String>,

    /// Source schema generation (1 or 2); detected from the table when omitted
    #[arg(long)]
    source_version: Option<String>,

    /// Schema generation the proxy view exposes (1 or 2)
    #[arg(long, default_value = "2")]
    target_version: String,

    /// Field to expose, e.g. `product['region']`; repeatable. Defaults to the target's default columns
    #[arg(long = "field")]
    fields: Vec<String>,

    /// View snapshot (JSON) from a previous run; updated after compilation
    #[arg(long)]
    state: Option<PathBuf>,

    /// Write the updated catalog snapshot (including the new view) here
    #[arg(long)]
    save_catalog: Option<PathBuf>,

    /// Print the result as JSON instead of plain SQL
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn cli_config(&self) -> Option<CliConfig> {
        self.source_table.as_ref().map(|source_table| CliConfig {
            source_table: source_table.clone(),
            database: self.database.clone(),
            source_version: self.source_version.clone(),
            target_version: self.target_version.clone(),
            fields: self.fields.clone(),
        })
    }
}

fn resolve_config(cli: &Cli) -> anyhow::Result<ProxyConfig> {
    let overrides = cli.cli_config().map(ProxyConfig::from_cli).transpose()?;

    match (&cli.config, overrides) {
        (Some(path), overrides) => {
            let mut config = ProxyConfig::from_yaml_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?;
            if let Some(overrides) = overrides {
                config.merge(overrides);
            }
            Ok(config)
        }
        (None, Some(config)) => Ok(config),
        (None, None) => ProxyConfig::from_env()
            .context("no --source-table or --config given, reading CUR_PROXY_* environment"),
    }
}

fn load_snapshot(path: Option<&Path>) -> anyhow::Result<ViewSnapshot> {
    match path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading view snapshot {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing view snapshot {}", path.display()))
        }
        _ => Ok(ViewSnapshot::Fresh),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger - defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    let table = FieldEquivalenceTable::embedded().context("loading field equivalence table")?;
    info!("Field equivalence table version {}", table.version());

    let catalog = Arc::new(
        InMemoryCatalog::from_yaml_file(&cli.catalog)
            .with_context(|| format!("loading catalog snapshot {}", cli.catalog.display()))?,
    );

    let source_name = config.qualified_source_table();
    let source = CurTable::load(catalog.as_ref(), &source_name, config.source_version, table)
        .await
        .with_context(|| format!("reading source table {}", source_name))?;

    let request =
        CompilationRequest::parse_or_defaults(&config.fields, config.target_version, table)?;
    let compiler = ProxyViewCompiler::new(catalog.clone(), table, source, config.target_version);
    info!(
        "Compiling {} from {} ({} columns, CUR{} -> CUR{}, {} fields requested)",
        compiler.view_name(),
        compiler.source().name,
        compiler.source().column_count(),
        compiler.source().generation,
        compiler.target(),
        request.len()
    );

    let snapshot = load_snapshot(cli.state.as_deref())?;
    let outcome = compiler.compile(&snapshot, &request).await?;

    if let (Some(sql), Some(state)) = (&outcome.sql, outcome.snapshot.state()) {
        catalog.add_view(compiler.view_name(), state.column_infos(), sql);
    }

    if cli.json {
        let report = serde_json::json!({
            "view": compiler.view_name(),
            "sql": outcome.sql,
            "snapshot": outcome.snapshot,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match &outcome.sql {
            Some(sql) => println!("{}", sql),
            None => info!("{} is up to date, nothing to do", compiler.view_name()),
        }
    }

    if let Some(path) = &cli.state {
        std::fs::write(path, serde_json::to_string_pretty(&outcome.snapshot)?)
            .with_context(|| format!("writing view snapshot {}", path.display()))?;
    }

    if let Some(path) = &cli.save_catalog {
        std::fs::write(path, serde_yaml::to_string(&catalog.snapshot())?)
            .with_context(|| format!("writing catalog snapshot {}", path.display()))?;
    }

    Ok(())
}
