//! Google Docs API v1.

use serde_json::{json, Value};

use crate::auth::Credentials;
use crate::connectors::bigquery::service_account_json;
use crate::connectors::{nested_error_message, seg, Connector};
use crate::dispatch::args::Args;
use crate::dispatch::operation::{copy_present, OperationDefinition, OperationTable, Payload};
use crate::http::executor::ErrorHandling;

pub const DOCUMENTS_SCOPE: &str = "https://www.googleapis.com/auth/documents";
const BASE_URL: &str = "https://docs.googleapis.com/v1/documents";

pub struct GoogleDocsConnector {
    ops: OperationTable,
}

impl GoogleDocsConnector {
    pub fn new() -> Self {
        let ops = OperationTable::new()
            .with(
                "get_document",
                OperationDefinition::get(document_path).require(&["document_id"]),
            )
            .with(
                "create_document",
                OperationDefinition::post(root_path)
                    .require(&["title"])
                    .body(build_create),
            )
            .with(
                "append_text",
                OperationDefinition::post(batch_update_path)
                    .require(&["document_id", "text"])
                    .body(build_append),
            )
            .with(
                "replace_text",
                OperationDefinition::post(batch_update_path)
                    .require(&["document_id", "find_text"])
                    .body(build_replace),
            );
        Self { ops }
    }
}

impl Default for GoogleDocsConnector {
    fn default() -> Self {
        Self::new()
    }
}

fn root_path(_: &Args) -> String {
    String::new()
}

fn document_path(args: &Args) -> String {
    format!("/{}", seg(args, "document_id"))
}

fn batch_update_path(args: &Args) -> String {
    format!("{}:batchUpdate", document_path(args))
}

fn build_create(args: &Args) -> Payload {
    let mut payload = Payload::new();
    copy_present(&mut payload, args, &["title"]);
    payload
}

fn build_append(args: &Args) -> Payload {
    let text = args.text("text").unwrap_or_default();
    let mut payload = Payload::new();
    payload.insert(
        "requests".into(),
        json!([{ "insertText": { "endOfSegmentLocation": {}, "text": text } }]),
    );
    payload
}

/// An absent `replace_text` deletes every match.
fn build_replace(args: &Args) -> Payload {
    let find = args.text("find_text").unwrap_or_default();
    let replace = match args.get("replace_text") {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };
    let mut payload = Payload::new();
    payload.insert(
        "requests".into(),
        json!([{
            "replaceAllText": {
                "containsText": { "text": find, "matchCase": args.flag("match_case") },
                "replaceText": replace,
            }
        }]),
    );
    payload
}

impl Connector for GoogleDocsConnector {
    fn name(&self) -> &str {
        "google_docs"
    }

    fn service(&self) -> &str {
        "Google Docs"
    }

    fn operations(&self) -> &OperationTable {
        &self.ops
    }

    fn credential_fields(&self) -> &[&'static str] {
        &["service_account_json"]
    }

    fn base_url(&self, _args: &Args) -> String {
        BASE_URL.to_string()
    }

    fn credentials(&self, args: &Args) -> Credentials {
        Credentials::GoogleServiceAccount {
            key_json: service_account_json(args),
            scopes: vec![DOCUMENTS_SCOPE.to_string()],
            subject: args.text("subject"),
        }
    }

    fn error_handling(&self) -> ErrorHandling {
        ErrorHandling::new(self.service()).parser(nested_error_message)
    }
}
