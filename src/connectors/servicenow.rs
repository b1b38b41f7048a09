//! ServiceNow Table API (`https://{instance}.service-now.com/api/now/table`).

use serde_json::Value;

use crate::auth::Credentials;
use crate::connectors::{nested_error_message, seg, Connector};
use crate::dispatch::args::Args;
use crate::dispatch::operation::{
    copy_present, is_object, present_params, OperationDefinition, OperationTable, Payload,
};
use crate::http::executor::ErrorHandling;

pub struct ServiceNowConnector {
    ops: OperationTable,
}

impl ServiceNowConnector {
    pub fn new() -> Self {
        let ops = OperationTable::new()
            .with(
                "get_record",
                OperationDefinition::get(record_path)
                    .require(&["table", "sys_id"])
                    .query_keys(DISPLAY_QUERY, display_params),
            )
            .with(
                "list_records",
                OperationDefinition::get(table_path)
                    .require(&["table"])
                    .query_keys(LIST_QUERY, list_params),
            )
            .with(
                "create_record",
                OperationDefinition::post(table_path)
                    .require(&["table"])
                    .require_with("fields", is_object)
                    .body(fields_body),
            )
            .with(
                "update_record",
                OperationDefinition::put(record_path)
                    .require(&["table", "sys_id"])
                    .require_with("fields", is_object)
                    .body(fields_body),
            )
            .with(
                "create_incident",
                OperationDefinition::post(incident_path)
                    .require(&["short_description"])
                    .body(build_incident),
            );
        Self { ops }
    }
}

impl Default for ServiceNowConnector {
    fn default() -> Self {
        Self::new()
    }
}

fn table_path(args: &Args) -> String {
    format!("/{}", seg(args, "table"))
}

fn record_path(args: &Args) -> String {
    format!("/{}/{}", seg(args, "table"), seg(args, "sys_id"))
}

fn incident_path(_: &Args) -> String {
    "/incident".to_string()
}

const DISPLAY_QUERY: &[&str] = &["sysparm_fields", "sysparm_display_value"];

const LIST_QUERY: &[&str] = &[
    "sysparm_query",
    "sysparm_fields",
    "sysparm_offset",
    "sysparm_display_value",
];

fn display_params(args: &Args) -> Vec<(String, String)> {
    present_params(args, DISPLAY_QUERY)
}

fn list_params(args: &Args) -> Vec<(String, String)> {
    let mut params = present_params(args, LIST_QUERY);
    let limit = args.text("sysparm_limit").unwrap_or_else(|| "10".to_string());
    params.push(("sysparm_limit".to_string(), limit));
    params
}

/// The record body is the caller's `fields` object, passed through as-is.
fn fields_body(args: &Args) -> Payload {
    match args.present("fields") {
        Some(Value::Object(fields)) => fields.clone(),
        _ => Payload::new(),
    }
}

fn build_incident(args: &Args) -> Payload {
    let mut payload = Payload::new();
    copy_present(
        &mut payload,
        args,
        &[
            "short_description",
            "description",
            "urgency",
            "impact",
            "category",
            "caller_id",
            "assignment_group",
            "assigned_to",
        ],
    );
    payload
}

impl Connector for ServiceNowConnector {
    fn name(&self) -> &str {
        "servicenow"
    }

    fn service(&self) -> &str {
        "ServiceNow"
    }

    fn operations(&self) -> &OperationTable {
        &self.ops
    }

    fn connection_fields(&self) -> &[&'static str] {
        &["instance"]
    }

    fn credential_fields(&self) -> &[&'static str] {
        &["username", "password"]
    }

    fn base_url(&self, args: &Args) -> String {
        format!(
            "https://{}.service-now.com/api/now/table",
            seg(args, "instance")
        )
    }

    fn credentials(&self, args: &Args) -> Credentials {
        Credentials::Basic {
            username: args.text("username").unwrap_or_default(),
            password: args.text("password").unwrap_or_default(),
        }
    }

    fn error_handling(&self) -> ErrorHandling {
        ErrorHandling::new(self.service())
            .parser(nested_error_message)
            .request_error("Failed to connect to ServiceNow instance")
    }
}
