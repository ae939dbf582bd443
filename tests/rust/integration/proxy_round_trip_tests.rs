//! Round trips through the in-memory catalog: a compiled view is deployed,
//! read back by a later run, and extended without losing anything.

use std::sync::Arc;

use curproxy::cur_schema::{ColumnInfo, CurTable, FieldEquivalenceTable, InMemoryCatalog, SchemaGeneration};
use curproxy::proxy::{
    CompilationRequest, CompileOutcome, ExposedViewState, LiveViewIntrospector, ProxyError,
    ProxyViewCompiler, ViewSnapshot,
};

fn table() -> &'static FieldEquivalenceTable {
    FieldEquivalenceTable::embedded().expect("embedded table must load")
}

fn v1_catalog() -> Arc<InMemoryCatalog> {
    let catalog = InMemoryCatalog::new();
    catalog.add_table(
        "billing.cur",
        vec![
            ColumnInfo::new("bill_payer_account_id", "varchar"),
            ColumnInfo::new("line_item_unblended_cost", "double"),
            ColumnInfo::new("line_item_usage_start_date", "timestamp(3)"),
            ColumnInfo::new("product_operating_system", "varchar"),
            ColumnInfo::new("resource_tags_user_team", "varchar"),
            ColumnInfo::new("resource_tags_user_owner", "varchar"),
        ],
    );
    Arc::new(catalog)
}

fn v2_catalog() -> Arc<InMemoryCatalog> {
    let catalog = InMemoryCatalog::new();
    catalog.add_table(
        "billing.cur2",
        vec![
            ColumnInfo::new("bill_payer_account_id", "varchar"),
            ColumnInfo::new("identity_time_interval", "varchar"),
            ColumnInfo::new("line_item_unblended_cost", "double"),
            ColumnInfo::new("product", "map(varchar,varchar)"),
            ColumnInfo::new("resource_tags", "map(varchar,varchar)"),
        ],
    );
    Arc::new(catalog)
}

async fn compiler_for(
    catalog: &Arc<InMemoryCatalog>,
    source: &str,
    target: SchemaGeneration,
) -> ProxyViewCompiler<'static> {
    let cur = CurTable::load(catalog.as_ref(), source, None, table())
        .await
        .expect("source table must load");
    ProxyViewCompiler::new(catalog.clone(), table(), cur, target)
}

/// Compile and register the resulting view in the catalog, as a deployment would
async fn deploy(
    catalog: &InMemoryCatalog,
    compiler: &ProxyViewCompiler<'_>,
    snapshot: &ViewSnapshot,
    fields: &[&str],
) -> Result<CompileOutcome, ProxyError> {
    let request = CompilationRequest::parse(fields.iter().copied(), table())?;
    let outcome = compiler.compile(snapshot, &request).await?;
    if let (Some(sql), Some(state)) = (&outcome.sql, outcome.snapshot.state()) {
        catalog.add_view(compiler.view_name(), state.column_infos(), sql);
    }
    Ok(outcome)
}

#[tokio::test]
async fn test_source_generation_is_detected() {
    let v1 = v1_catalog();
    let v2 = v2_catalog();
    assert_eq!(
        compiler_for(&v1, "billing.cur", SchemaGeneration::V2).await.source().generation,
        SchemaGeneration::V1
    );
    assert_eq!(
        compiler_for(&v2, "billing.cur2", SchemaGeneration::V1).await.source().generation,
        SchemaGeneration::V2
    );
}

#[tokio::test]
async fn test_recompilation_is_idempotent() {
    let catalog = v1_catalog();
    let compiler = compiler_for(&catalog, "billing.cur", SchemaGeneration::V2).await;
    let fields = ["line_item_unblended_cost", "product['operating_system']"];

    let first = deploy(&catalog, &compiler, &ViewSnapshot::Fresh, &fields)
        .await
        .unwrap();
    assert!(first.sql.is_some());
    let calls_after_first = catalog.call_counts();

    let second = deploy(&catalog, &compiler, &first.snapshot, &fields)
        .await
        .unwrap();
    assert!(second.is_up_to_date());
    assert_eq!(second.snapshot, first.snapshot);
    assert_eq!(catalog.call_counts(), calls_after_first);
    assert_eq!(catalog.call_counts().total(), calls_after_first.total());

    // a subset of what is exposed is covered too
    let third = deploy(&catalog, &compiler, &second.snapshot, &["product['operating_system']"])
        .await
        .unwrap();
    assert!(third.is_up_to_date());
}

#[tokio::test]
async fn test_new_run_keeps_keys_of_deployed_view() {
    let catalog = v1_catalog();

    let first_run = compiler_for(&catalog, "billing.cur", SchemaGeneration::V2).await;
    deploy(
        &catalog,
        &first_run,
        &ViewSnapshot::Fresh,
        &["resource_tags['user_team']", "line_item_unblended_cost"],
    )
    .await
    .unwrap();

    // a later deployment run starts from scratch and only asks for a new key
    let second_run = compiler_for(&catalog, "billing.cur", SchemaGeneration::V2).await;
    let outcome = deploy(
        &catalog,
        &second_run,
        &ViewSnapshot::Fresh,
        &["resource_tags['user_owner']"],
    )
    .await
    .unwrap();

    let sql = outcome.sql.unwrap();
    assert!(sql.contains("line_item_unblended_cost AS line_item_unblended_cost"));
    assert!(sql.contains(
        "MAP(ARRAY['user_owner','user_team'], ARRAY[resource_tags_user_owner, resource_tags_user_team]) AS resource_tags"
    ));
}

#[tokio::test]
async fn test_exposed_set_only_grows() {
    let catalog = v1_catalog();
    let compiler = compiler_for(&catalog, "billing.cur", SchemaGeneration::V2).await;

    let requests: [&[&str]; 4] = [
        &["product['operating_system']"],
        &["bill_payer_account_id"],
        &["product['region']", "cost_category['team']"],
        &["line_item_usage_start_date"],
    ];

    let mut snapshot = ViewSnapshot::Fresh;
    let mut previous = ExposedViewState::new();
    for fields in requests {
        let outcome = deploy(&catalog, &compiler, &snapshot, fields).await.unwrap();
        let state = outcome.snapshot.state().unwrap().clone();
        assert!(state.covers(&previous.exposures()));
        previous = state;
        snapshot = outcome.snapshot;
    }

    assert_eq!(previous.columns().count(), 4);
    assert_eq!(previous.keys("product").len(), 2);
    let last_sql = catalog.executed().pop().unwrap();
    assert!(last_sql.contains("MAP(ARRAY['team'], ARRAY[cast(null as varchar)]) AS cost_category"));
    assert!(last_sql.contains("line_item_usage_start_date AS line_item_usage_start_date"));
}

#[tokio::test]
async fn test_v2_source_defaults_for_v1_target() {
    let catalog = v2_catalog();
    let compiler = compiler_for(&catalog, "billing.cur2", SchemaGeneration::V1).await;
    let request = CompilationRequest::defaults(SchemaGeneration::V1, table());

    let outcome = compiler.compile(&ViewSnapshot::Fresh, &request).await.unwrap();
    let sql = outcome.sql.unwrap();

    assert!(sql.starts_with("CREATE OR REPLACE VIEW billing.cur1_proxy AS SELECT "));
    assert!(sql.ends_with(" FROM billing.cur2"));
    assert!(sql.contains("product['region'] AS product_region"));
    assert!(sql.contains("\"identity_time_interval\" AS \"identity_time_interval\""));
    // a flat CUR2 column this source lacks
    assert!(sql.contains("cast(null as double) AS line_item_usage_amount"));
}

#[tokio::test]
async fn test_unknown_field_leaves_view_untouched() {
    let catalog = v2_catalog();
    let compiler = compiler_for(&catalog, "billing.cur2", SchemaGeneration::V1).await;

    let err = deploy(
        &catalog,
        &compiler,
        &ViewSnapshot::Fresh,
        &["bill_payer_account_id", "not_a_cur_column"],
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("not_a_cur_column"));
    assert!(catalog.executed().is_empty());
}

#[tokio::test]
async fn test_engine_rejection_is_returned_verbatim() {
    let catalog = v1_catalog();
    catalog.fail_execute("TABLE_NOT_FOUND: billing.cur");
    let compiler = compiler_for(&catalog, "billing.cur", SchemaGeneration::V1).await;

    let err = deploy(&catalog, &compiler, &ViewSnapshot::Fresh, &["bill_payer_account_id"])
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Query engine rejected statement: TABLE_NOT_FOUND: billing.cur"
    );
    assert_eq!(catalog.call_counts().execute, 1);
}

#[tokio::test]
async fn test_many_tags_survive_a_new_run() {
    let catalog = InMemoryCatalog::new();
    let tags: Vec<String> = (0..700).map(|i| format!("user_tag{:03}", i)).collect();
    let columns: Vec<ColumnInfo> = tags
        .iter()
        .map(|t| ColumnInfo::new(format!("resource_tags_{}", t), "varchar"))
        .collect();
    catalog.add_table("billing.cur", columns);
    let catalog = Arc::new(catalog);

    let fields: Vec<String> = tags.iter().map(|t| format!("resource_tags['{}']", t)).collect();
    let field_refs: Vec<&str> = fields.iter().map(String::as_str).collect();

    let first_run = compiler_for(&catalog, "billing.cur", SchemaGeneration::V2).await;
    let outcome = deploy(&catalog, &first_run, &ViewSnapshot::Fresh, &field_refs)
        .await
        .unwrap();
    // ceil(700 / 254) = 3 groups for keys and 3 for values
    assert_eq!(outcome.sql.unwrap().matches("ARRAY[").count(), 6);

    let second_run = compiler_for(&catalog, "billing.cur", SchemaGeneration::V2).await;
    let outcome = deploy(
        &catalog,
        &second_run,
        &ViewSnapshot::Fresh,
        &["bill_payer_account_id"],
    )
    .await
    .unwrap();

    let state = outcome.snapshot.state().unwrap();
    let recovered: Vec<String> = state.keys("resource_tags").into_iter().collect();
    assert_eq!(recovered, tags);
}

/// What a later run reads back from the deployed view
async fn read_back(catalog: &Arc<InMemoryCatalog>, view: &str) -> ExposedViewState {
    LiveViewIntrospector::new(catalog.as_ref(), table())
        .introspect(view)
        .await
}

#[tokio::test]
async fn test_map_layout_reads_back_as_compiled() {
    let catalog = v1_catalog();
    let compiler = compiler_for(&catalog, "billing.cur", SchemaGeneration::V2).await;
    let outcome = deploy(
        &catalog,
        &compiler,
        &ViewSnapshot::Fresh,
        &[
            "line_item_unblended_cost",
            "product['operating_system']",
            "resource_tags['user_team']",
            "resource_tags['user_owner']",
            "cost_category['team']",
        ],
    )
    .await
    .unwrap();

    let compiled = outcome.snapshot.state().unwrap();
    let recovered = read_back(&catalog, compiler.view_name()).await;
    assert_eq!(recovered.exposures(), compiled.exposures());
    assert_eq!(recovered.keys("resource_tags").len(), 2);
}

#[tokio::test]
async fn test_flat_layout_reads_back_as_compiled() {
    let catalog = v2_catalog();
    let compiler = compiler_for(&catalog, "billing.cur2", SchemaGeneration::V1).await;
    let outcome = deploy(
        &catalog,
        &compiler,
        &ViewSnapshot::Fresh,
        &[
            "bill_payer_account_id",
            "identity_time_interval",
            "product['region']",
            "resource_tags['user_Team']",
        ],
    )
    .await
    .unwrap();

    let compiled = outcome.snapshot.state().unwrap();
    let recovered = read_back(&catalog, compiler.view_name()).await;
    assert_eq!(recovered.exposures(), compiled.exposures());
}

#[tokio::test]
async fn test_mixed_case_tag_is_one_column_across_runs() {
    let catalog = v2_catalog();
    let fields = ["resource_tags['user_Team']"];

    let first_run = compiler_for(&catalog, "billing.cur2", SchemaGeneration::V1).await;
    let first = deploy(&catalog, &first_run, &ViewSnapshot::Fresh, &fields)
        .await
        .unwrap();

    let second_run = compiler_for(&catalog, "billing.cur2", SchemaGeneration::V1).await;
    let second = deploy(&catalog, &second_run, &ViewSnapshot::Fresh, &fields)
        .await
        .unwrap();

    let sql = second.sql.unwrap();
    assert_eq!(Some(sql.clone()), first.sql);
    assert_eq!(sql.matches(" AS ").count(), 2);
    assert!(sql.contains("AS resource_tags_user_team FROM"));
    let columns: Vec<&str> = second.snapshot.state().unwrap().columns().collect();
    assert_eq!(columns, vec!["resource_tags_user_team"]);
}

#[tokio::test]
async fn test_same_generation_quotes_non_identifier_columns() {
    let catalog = InMemoryCatalog::new();
    catalog.add_table(
        "billing.cur",
        vec![
            ColumnInfo::new("bill_payer_account_id", "varchar"),
            ColumnInfo::new("resource_tags_aws:createdBy", "varchar"),
        ],
    );
    let catalog = Arc::new(catalog);
    let compiler = compiler_for(&catalog, "billing.cur", SchemaGeneration::V1).await;

    let outcome = deploy(
        &catalog,
        &compiler,
        &ViewSnapshot::Fresh,
        &["resource_tags['aws:createdBy']"],
    )
    .await
    .unwrap();

    assert_eq!(
        outcome.sql.unwrap(),
        "CREATE OR REPLACE VIEW billing.cur1_proxy AS SELECT \"resource_tags_aws:createdby\" AS \"resource_tags_aws:createdby\" FROM billing.cur"
    );
}
