//! BigQuery REST API v2, authenticated with a Google service account.

use serde_json::{json, Value};

use crate::auth::Credentials;
use crate::connectors::{nested_error_message, seg, Connector};
use crate::dispatch::args::Args;
use crate::dispatch::operation::{
    copy_present, copy_present_as, is_non_empty_array, present_params, OperationDefinition,
    OperationTable, Payload,
};
use crate::http::executor::ErrorHandling;

pub const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

pub struct BigQueryConnector {
    ops: OperationTable,
}

impl BigQueryConnector {
    pub fn new() -> Self {
        let ops = OperationTable::new()
            .with(
                "run_query",
                OperationDefinition::post(queries_path)
                    .require(&["query"])
                    .body(build_query),
            )
            .with(
                "list_datasets",
                OperationDefinition::get(datasets_path).query(page_params),
            )
            .with(
                "list_tables",
                OperationDefinition::get(tables_path)
                    .require(&["dataset_id"])
                    .query(page_params),
            )
            .with(
                "get_table",
                OperationDefinition::get(table_path).require(&["dataset_id", "table_id"]),
            )
            .with(
                "insert_rows",
                OperationDefinition::post(insert_all_path)
                    .require(&["dataset_id", "table_id"])
                    .require_with("rows", is_non_empty_array)
                    .body(build_insert_rows),
            );
        Self { ops }
    }
}

impl Default for BigQueryConnector {
    fn default() -> Self {
        Self::new()
    }
}

fn queries_path(_: &Args) -> String {
    "/queries".to_string()
}

fn datasets_path(_: &Args) -> String {
    "/datasets".to_string()
}

fn tables_path(args: &Args) -> String {
    format!("/datasets/{}/tables", seg(args, "dataset_id"))
}

fn table_path(args: &Args) -> String {
    format!("{}/{}", tables_path(args), seg(args, "table_id"))
}

fn insert_all_path(args: &Args) -> String {
    format!("{}/insertAll", table_path(args))
}

fn page_params(args: &Args) -> Vec<(String, String)> {
    let mut params = present_params(args, &["pageToken"]);
    if let Some(max) = args.text("max_results") {
        params.push(("maxResults".to_string(), max));
    }
    params
}

fn build_query(args: &Args) -> Payload {
    let mut payload = Payload::new();
    copy_present(&mut payload, args, &["query"]);
    payload.insert(
        "useLegacySql".into(),
        json!(args.flag("use_legacy_sql")),
    );
    copy_present_as(&mut payload, args, "max_results", "maxResults");
    copy_present_as(&mut payload, args, "timeout_ms", "timeoutMs");
    copy_present_as(&mut payload, args, "location", "location");
    copy_present_as(&mut payload, args, "query_parameters", "queryParameters");
    if let Some(dataset) = args.text("dataset_id") {
        let project = args.text("project_id").unwrap_or_default();
        payload.insert(
            "defaultDataset".into(),
            json!({ "projectId": project, "datasetId": dataset }),
        );
    }
    payload
}

/// Each row becomes `{"json": row}`; an `insert_id_field` names the row key used
/// for best-effort de-duplication.
fn build_insert_rows(args: &Args) -> Payload {
    let id_field = args.str("insert_id_field");
    let rows: Vec<Value> = args
        .present("rows")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    let mut entry = json!({ "json": row });
                    if let Some(id) = id_field.and_then(|f| row.get(f)) {
                        entry["insertId"] = match id {
                            Value::String(s) => Value::String(s.clone()),
                            other => Value::String(other.to_string()),
                        };
                    }
                    entry
                })
                .collect()
        })
        .unwrap_or_default();

    let mut payload = Payload::new();
    payload.insert("kind".into(), json!("bigquery#tableDataInsertAllRequest"));
    payload.insert("rows".into(), Value::Array(rows));
    copy_present_as(&mut payload, args, "skip_invalid_rows", "skipInvalidRows");
    copy_present_as(&mut payload, args, "ignore_unknown_values", "ignoreUnknownValues");
    payload
}

impl Connector for BigQueryConnector {
    fn name(&self) -> &str {
        "bigquery"
    }

    fn service(&self) -> &str {
        "BigQuery"
    }

    fn operations(&self) -> &OperationTable {
        &self.ops
    }

    fn connection_fields(&self) -> &[&'static str] {
        &["project_id"]
    }

    fn credential_fields(&self) -> &[&'static str] {
        &["service_account_json"]
    }

    fn base_url(&self, args: &Args) -> String {
        format!(
            "https://bigquery.googleapis.com/bigquery/v2/projects/{}",
            seg(args, "project_id")
        )
    }

    fn credentials(&self, args: &Args) -> Credentials {
        Credentials::GoogleServiceAccount {
            key_json: service_account_json(args),
            scopes: vec![BIGQUERY_SCOPE.to_string()],
            subject: args.text("subject"),
        }
    }

    fn error_handling(&self) -> ErrorHandling {
        ErrorHandling::new(self.service()).parser(nested_error_message)
    }
}

/// The key may arrive as a JSON string or as an already-parsed object.
pub(crate) fn service_account_json(args: &Args) -> String {
    match args.present("service_account_json") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
